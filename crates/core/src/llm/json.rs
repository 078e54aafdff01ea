use crate::domain::contract::LlmMarketRecommendation;
use crate::domain::recommendation::MarketRecommendation;
use anyhow::{ensure, Context};

/// Removes a leading ```` ``` ```` / ```` ```json ```` fence and a trailing ```` ``` ````.
/// Text without fences is only trimmed, so applying this twice changes nothing.
pub fn strip_fences(text: &str) -> &str {
    let mut inner = text.trim();
    if let Some(rest) = inner.strip_prefix("```") {
        inner = rest;
        if inner
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            inner = &inner[4..];
        }
    }
    if let Some(rest) = inner.strip_suffix("```") {
        inner = rest;
    }
    inner.trim()
}

pub fn parse_recommendation(text: &str) -> anyhow::Result<MarketRecommendation> {
    let json_str = strip_fences(text);
    ensure!(!json_str.is_empty(), "LLM output is empty");
    let parsed = serde_json::from_str::<LlmMarketRecommendation>(json_str)
        .with_context(|| format!("LLM output is not valid JSON for recommendation schema: {json_str}"))?;
    parsed.validate_and_into_recommendation()
}

/// Like [`parse_recommendation`], but the failure reason is logged and dropped.
pub fn try_parse_recommendation(text: &str) -> Option<MarketRecommendation> {
    match parse_recommendation(text) {
        Ok(rec) => Some(rec),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "discarding unparseable model output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{QualityGrade, Recommendation, RiskLevel, TrendPoint};
    use serde_json::json;

    const TOMATO_BODY: &str = r#"{"currentPrice":1200,"predictedPrice":1400,"recommendation":"WAIT","risk":"LOW","explanation":"Prices rising","explanationTelugu":"ధరలు పెరుగుతున్నాయి","profitDelta":2000,"daysToWait":5}"#;

    fn tomato_recommendation() -> MarketRecommendation {
        MarketRecommendation {
            current_price: 1200.0,
            predicted_price: 1400.0,
            recommendation: Recommendation::Wait,
            risk: RiskLevel::Low,
            explanation: "Prices rising".to_string(),
            explanation_localized: "ధరలు పెరుగుతున్నాయి".to_string(),
            profit_delta: 2000.0,
            days_to_wait: 5,
            quality_grade: None,
            quality_assessment: None,
            trend: Vec::new(),
        }
    }

    #[test]
    fn strip_fences_handles_fenced_blocks() {
        let fenced = format!("```json\n{TOMATO_BODY}\n```\n");
        assert_eq!(strip_fences(&fenced), TOMATO_BODY);

        let bare_fence = format!("```\n{TOMATO_BODY}\n```");
        assert_eq!(strip_fences(&bare_fence), TOMATO_BODY);

        let one_line = format!("```JSON{TOMATO_BODY}```");
        assert_eq!(strip_fences(&one_line), TOMATO_BODY);
    }

    #[test]
    fn strip_fences_is_idempotent() {
        assert_eq!(strip_fences(TOMATO_BODY), TOMATO_BODY);
        let once = strip_fences("  ```json\n{\"a\":1}\n```  ");
        assert_eq!(strip_fences(once), once);
    }

    #[test]
    fn parses_fenced_response_equal_to_unfenced() {
        let fenced = format!("```json\n{TOMATO_BODY}\n```");
        let a = parse_recommendation(&fenced).unwrap();
        let b = parse_recommendation(TOMATO_BODY).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, tomato_recommendation());
    }

    #[test]
    fn round_trips_through_wire_shape() {
        let mut rec = tomato_recommendation();
        rec.recommendation = Recommendation::SellNow;
        rec.risk = RiskLevel::High;
        rec.profit_delta = -350.5;
        rec.quality_grade = Some(QualityGrade::A);
        rec.quality_assessment = Some("Firm and bright red".to_string());
        rec.trend = vec![
            TrendPoint {
                day: "Mon".to_string(),
                price: 1200.0,
            },
            TrendPoint {
                day: "Tue".to_string(),
                price: 1150.25,
            },
        ];

        let encoded = serde_json::to_string(&LlmMarketRecommendation::from(&rec)).unwrap();
        assert_eq!(parse_recommendation(&encoded).unwrap(), rec);
    }

    #[test]
    fn rejects_empty_and_prose() {
        assert!(try_parse_recommendation("").is_none());
        assert!(try_parse_recommendation("   \n").is_none());
        assert!(try_parse_recommendation("```json\n```").is_none());
        assert!(try_parse_recommendation("Sorry, I cannot access live data.").is_none());
    }

    #[test]
    fn rejects_invalid_enum() {
        let mut v: serde_json::Value = serde_json::from_str(TOMATO_BODY).unwrap();
        v["recommendation"] = json!("MAYBE");
        assert!(try_parse_recommendation(&v.to_string()).is_none());
    }

    #[test]
    fn rejects_missing_current_price() {
        let mut v: serde_json::Value = serde_json::from_str(TOMATO_BODY).unwrap();
        v.as_object_mut().unwrap().remove("currentPrice");
        let err = parse_recommendation(&v.to_string()).unwrap_err();
        assert!(format!("{err:#}").contains("currentPrice"));
    }

    #[test]
    fn rejects_wrong_top_level_shape() {
        let array = format!("[{TOMATO_BODY}]");
        assert!(try_parse_recommendation(&array).is_none());
        assert!(try_parse_recommendation("\"WAIT\"").is_none());
    }

    #[test]
    fn does_not_recover_json_embedded_in_prose() {
        let text = format!("Here is the analysis: {TOMATO_BODY} Hope this helps!");
        assert!(try_parse_recommendation(&text).is_none());
    }

    #[test]
    fn ignores_echoed_extra_keys() {
        let mut v: serde_json::Value = serde_json::from_str(TOMATO_BODY).unwrap();
        v["crop"] = json!("Tomato");
        v["unit"] = json!("kg");
        assert_eq!(
            parse_recommendation(&v.to_string()).unwrap(),
            tomato_recommendation()
        );
    }
}
