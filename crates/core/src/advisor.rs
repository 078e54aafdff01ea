use crate::config::Settings;
use crate::domain::query::{ImagePayload, MarketQuery};
use crate::domain::recommendation::{Analysis, MarketRecommendation};
use crate::llm::error::{FailureStage, ModelCallError};
use crate::llm::gemini::GeminiClient;
use crate::llm::{
    json, prompt, AnalysisRequest, LlmClient, SpeechAudio, SpeechRequest, SpeechSynthesizer,
};
use crate::render::{self, RenderedOutcome};
use crate::session::{ChatMessage, MessageBody, Sender, Session, View, CHAT_HELP};
use std::sync::Arc;

pub const VOICE_LANGUAGE_HINT: &str = "te-IN";

/// Result of one submission: what to show, and the audio to attach if speech worked.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub outcome: RenderedOutcome,
    pub analysis: Option<Analysis>,
    pub audio: Option<SpeechAudio>,
}

#[derive(Clone)]
pub struct Advisor {
    llm: Arc<dyn LlmClient>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Advisor {
    pub fn new(llm: Arc<dyn LlmClient>, speech: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { llm, speech }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let gemini = Arc::new(GeminiClient::from_settings(settings)?);
        let speech: Option<Arc<dyn SpeechSynthesizer>> = if settings.speech_enabled {
            Some(gemini.clone())
        } else {
            None
        };
        Ok(Self::new(gemini, speech))
    }

    /// Prompt, invoke and parse. The error says which stage failed.
    pub async fn analyze(&self, query: &MarketQuery) -> anyhow::Result<Analysis> {
        let request = AnalysisRequest {
            prompt: prompt::build_prompt(query),
            image: query.image().cloned(),
            enable_search_grounding: true,
        };
        let response = self.llm.generate_analysis(request).await?;

        let recommendation = json::parse_recommendation(&response.text).map_err(|err| {
            ModelCallError::new(self.llm.provider(), FailureStage::Parse, format!("{err:#}"))
                .with_raw_output(response.text.clone())
        })?;

        Ok(Analysis {
            recommendation,
            sources: response.sources,
        })
    }

    /// [`Advisor::analyze`] with every failure collapsed to `None`.
    pub async fn advise(&self, query: &MarketQuery) -> Option<Analysis> {
        match self.analyze(query).await {
            Ok(analysis) => {
                tracing::info!(
                    crop = %query.crop(),
                    location = %query.location(),
                    recommendation = analysis.recommendation.recommendation.as_wire(),
                    sources = analysis.sources.len(),
                    "market analysis ready"
                );
                Some(analysis)
            }
            Err(err) => {
                if let Some(diag) = err.downcast_ref::<ModelCallError>() {
                    if let Some(raw) = diag.raw_output.as_deref() {
                        tracing::debug!(stage = diag.stage.as_str(), raw_output = raw, "rejected model output");
                    }
                }
                tracing::error!(
                    crop = %query.crop(),
                    location = %query.location(),
                    error = %format!("{err:#}"),
                    "market analysis unavailable"
                );
                None
            }
        }
    }

    /// Speech for the localized explanation. Failures are logged and otherwise invisible.
    pub async fn narrate(&self, rec: &MarketRecommendation) -> Option<SpeechAudio> {
        let speech = self.speech.as_ref()?;
        let request = SpeechRequest {
            text: rec.explanation_localized.clone(),
            voice_language_hint: VOICE_LANGUAGE_HINT.to_string(),
        };
        match speech.synthesize(request).await {
            Ok(audio) => Some(audio),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "speech synthesis failed; continuing without audio");
                None
            }
        }
    }

    /// Runs one submission against `session`: analysis, then speech, strictly in that order.
    pub async fn respond(&self, session: &mut Session, query: MarketQuery) -> Interaction {
        let line = query.summary();
        self.respond_as(session, line, query).await
    }

    /// Typed chat input. Text that does not name a known crop and location gets
    /// [`CHAT_HELP`] back and never reaches the model.
    pub async fn respond_to_chat(
        &self,
        session: &mut Session,
        text: &str,
        image: Option<ImagePayload>,
    ) -> Option<Interaction> {
        let text = text.trim();
        match MarketQuery::from_chat(text, image) {
            Ok(query) => Some(self.respond_as(session, text.to_string(), query).await),
            Err(err) => {
                tracing::info!(error = %err, "chat line not understood");
                session.push(ChatMessage::text(Sender::User, text));
                session.push(ChatMessage::text(Sender::Ai, CHAT_HELP));
                session.view = View::Chat;
                None
            }
        }
    }

    async fn respond_as(
        &self,
        session: &mut Session,
        line: String,
        query: MarketQuery,
    ) -> Interaction {
        let mut user = ChatMessage::text(Sender::User, line);
        user.has_image = query.image().is_some();
        session.push(user);
        session.view = View::Chat;

        let analysis = self.advise(&query).await;
        let outcome = render::render_outcome(analysis.as_ref(), &query);
        let audio = match &analysis {
            Some(a) => self.narrate(&a.recommendation).await,
            None => None,
        };

        let body = match &outcome {
            RenderedOutcome::Card(card) => MessageBody::Prediction { card: card.clone() },
            RenderedOutcome::Failure(notice) => MessageBody::Failure {
                notice: notice.clone(),
            },
        };
        session.push(ChatMessage::new(Sender::Ai, body));

        Interaction {
            outcome,
            analysis,
            audio,
        }
    }
}
