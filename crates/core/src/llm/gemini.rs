use crate::config::Settings;
use crate::domain::recommendation::GroundingSource;
use crate::llm::error::{FailureStage, ModelCallError};
use crate::llm::speech::{self, WAV_MIME};
use crate::llm::{
    AnalysisRequest, LlmClient, ModelResponse, Provider, SpeechAudio, SpeechRequest,
    SpeechSynthesizer,
};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_TTS_VOICE: &str = "Zephyr";

// No request timeout and no retries: a slow model call blocks the interaction.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    tts_model: String,
    tts_voice: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url = env_or("GEMINI_BASE_URL", DEFAULT_BASE_URL);
        let model = env_or("GEMINI_MODEL", DEFAULT_MODEL);
        let tts_model = env_or("GEMINI_TTS_MODEL", DEFAULT_TTS_MODEL);
        let tts_voice = env_or("GEMINI_TTS_VOICE", DEFAULT_TTS_VOICE);

        let http = reqwest::Client::builder()
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            tts_model,
            tts_voice,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model_path
        )
    }

    async fn generate_content(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> anyhow::Result<GenerateContentResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);

        let res = self
            .http
            .post(self.endpoint(model))
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            return Err(ModelCallError::new(
                Provider::Gemini,
                FailureStage::Http,
                format!("status={status}"),
            )
            .with_raw_output(text)
            .into());
        }

        serde_json::from_str::<GenerateContentResponse>(&text)
            .with_context(|| format!("failed to decode Gemini response: {text}"))
    }

    fn analysis_request(request: &AnalysisRequest) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(image) = &request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.media_type().mime().to_string(),
                    data: BASE64.encode(image.bytes()),
                },
            });
        }

        // JSON response mode cannot be combined with the search tool, hence the fence stripping.
        let tools = request.enable_search_grounding.then(|| {
            vec![Tool {
                google_search: serde_json::json!({}),
            }]
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            tools,
            generation_config: None,
        }
    }

    fn speech_request(&self, request: &SpeechRequest) -> GenerateContentRequest {
        let language_code = Some(request.voice_language_hint.trim().to_string())
            .filter(|s| !s.is_empty());

        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text {
                    text: request.text.clone(),
                }],
            }],
            tools: None,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.tts_voice.clone(),
                        },
                    },
                    language_code,
                },
            }),
        }
    }

    fn response_text(res: &GenerateContentResponse) -> String {
        let mut out = String::new();
        let Some(candidate) = res.candidates.first() else {
            return out;
        };
        for part in candidate.parts() {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }
        out
    }

    fn response_sources(res: &GenerateContentResponse) -> Vec<GroundingSource> {
        let mut out: Vec<GroundingSource> = Vec::new();
        let chunks = res
            .candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| m.grounding_chunks.as_slice())
            .unwrap_or_default();
        for chunk in chunks {
            let Some(web) = &chunk.web else { continue };
            let Some(uri) = web.uri.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
                continue;
            };
            if out.iter().any(|s| s.uri == uri) {
                continue;
            }
            let title = web
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(uri);
            out.push(GroundingSource {
                title: title.to_string(),
                uri: uri.to_string(),
            });
        }
        out
    }

    fn response_audio(res: &GenerateContentResponse) -> anyhow::Result<SpeechAudio> {
        let inline = res
            .candidates
            .first()
            .into_iter()
            .flat_map(|c| c.parts())
            .find_map(|p| p.inline_data.as_ref())
            .context("Gemini TTS response has no inline audio")?;
        let pcm = BASE64
            .decode(inline.data.as_bytes())
            .context("Gemini TTS audio base64 decode failed")?;
        let rate = speech::sample_rate_from_mime(inline.mime_type.as_deref());
        Ok(SpeechAudio {
            mime_type: WAV_MIME,
            bytes: speech::pcm16_to_wav(&pcm, rate)?,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate_analysis(&self, request: AnalysisRequest) -> anyhow::Result<ModelResponse> {
        let req = Self::analysis_request(&request);
        let res = self.generate_content(&self.model, &req).await?;

        let text = Self::response_text(&res);
        if text.trim().is_empty() {
            let finish_reason = res
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "none".to_string());
            return Err(ModelCallError::new(
                Provider::Gemini,
                FailureStage::Empty,
                format!("no text in response (finish_reason={finish_reason})"),
            )
            .into());
        }

        Ok(ModelResponse {
            text,
            sources: Self::response_sources(&res),
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, request: SpeechRequest) -> anyhow::Result<SpeechAudio> {
        let req = self.speech_request(&request);
        let res = self.generate_content(&self.tts_model, &req).await?;
        Self::response_audio(&res)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

impl Candidate {
    fn parts(&self) -> &[ResponsePart] {
        self.content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::ImagePayload;
    use serde_json::json;

    fn client() -> GeminiClient {
        GeminiClient {
            http: reqwest::Client::new(),
            api_key: "test-key".to_string(),
            base_url: "https://example.test/v1beta/".to_string(),
            model: DEFAULT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
        }
    }

    #[test]
    fn endpoint_prefixes_model_path() {
        let c = client();
        assert_eq!(
            c.endpoint("gemini-3-pro-preview"),
            "https://example.test/v1beta/models/gemini-3-pro-preview:generateContent"
        );
        assert_eq!(
            c.endpoint("models/custom"),
            "https://example.test/v1beta/models/custom:generateContent"
        );
    }

    #[test]
    fn analysis_request_carries_image_and_search_tool() {
        let image = ImagePayload::new(Some("image/png"), b"\x89PNG\r\n\x1a\n".to_vec()).unwrap();
        let req = GeminiClient::analysis_request(&AnalysisRequest {
            prompt: "prompt".to_string(),
            image: Some(image),
            enable_search_grounding: true,
        });
        let v = serde_json::to_value(&req).unwrap();
        let parts = &v["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], json!("prompt"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["inlineData"]["data"], json!("iVBORw0KGgo="));
        assert_eq!(v["tools"], json!([{"googleSearch": {}}]));
        assert!(v.get("generationConfig").is_none());
    }

    #[test]
    fn analysis_request_without_grounding_has_no_tools() {
        let req = GeminiClient::analysis_request(&AnalysisRequest {
            prompt: "prompt".to_string(),
            image: None,
            enable_search_grounding: false,
        });
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("tools").is_none());
        assert_eq!(v["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn speech_request_selects_voice_and_language() {
        let req = client().speech_request(&SpeechRequest {
            text: "నమస్కారం".to_string(),
            voice_language_hint: "te-IN".to_string(),
        });
        let v = serde_json::to_value(&req).unwrap();
        let config = &v["generationConfig"];
        assert_eq!(config["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            config["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            json!("Zephyr")
        );
        assert_eq!(config["speechConfig"]["languageCode"], json!("te-IN"));
    }

    #[test]
    fn extracts_text_and_deduplicated_sources() {
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "```json\n{\"a\":"},
                    {"text": "1}\n```"}
                ]},
                "finishReason": "STOP",
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://agmarknet.gov.in/a", "title": "Agmarknet"}},
                    {"web": {"uri": "https://agmarknet.gov.in/a", "title": "dup"}},
                    {"web": {"uri": "https://news.example/b"}},
                    {"retrievedContext": {}}
                ]}
            }]
        }))
        .unwrap();

        assert_eq!(GeminiClient::response_text(&res), "```json\n{\"a\":1}\n```");
        let sources = GeminiClient::response_sources(&res);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "Agmarknet");
        assert_eq!(sources[1].title, "https://news.example/b");
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let res: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(GeminiClient::response_text(&res), "");
        assert!(GeminiClient::response_sources(&res).is_empty());
    }

    #[test]
    fn decodes_tts_audio_into_wav() {
        let pcm = [1u8, 0, 2, 0];
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{
                "inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": BASE64.encode(pcm)}
            }]}}]
        }))
        .unwrap();

        let audio = GeminiClient::response_audio(&res).unwrap();
        assert_eq!(audio.mime_type, "audio/wav");
        assert_eq!(&audio.bytes[..4], b"RIFF");
        assert_eq!(&audio.bytes[44..], &pcm);
    }

    #[test]
    fn absurd_tts_rate_uses_default_rate() {
        let pcm = [1u8, 0, 2, 0];
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{
                "inlineData": {"mimeType": "audio/L16;codec=pcm;rate=3000000000", "data": BASE64.encode(pcm)}
            }]}}]
        }))
        .unwrap();

        let audio = GeminiClient::response_audio(&res).unwrap();
        assert_eq!(u32::from_le_bytes(audio.bytes[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(audio.bytes[28..32].try_into().unwrap()), 48_000);
    }

    #[test]
    fn missing_tts_audio_is_an_error() {
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "no audio"}]}}]
        }))
        .unwrap();
        assert!(GeminiClient::response_audio(&res).is_err());
    }
}
