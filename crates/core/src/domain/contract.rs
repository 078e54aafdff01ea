use crate::domain::recommendation::{
    MarketRecommendation, QualityGrade, Recommendation, RiskLevel, TrendPoint,
};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};

/// The JSON object the model is asked to emit. Every required key must be present;
/// unknown keys (the model often echoes `crop`, `unit`, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMarketRecommendation {
    pub current_price: f64,
    pub predicted_price: f64,
    pub recommendation: String,
    pub risk: String,
    pub explanation: String,
    #[serde(rename = "explanationTelugu")]
    pub explanation_telugu: String,
    pub profit_delta: f64,
    pub days_to_wait: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_data: Option<Vec<LlmTrendPoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmTrendPoint {
    pub day: String,
    pub price: f64,
}

impl LlmMarketRecommendation {
    pub fn validate_and_into_recommendation(self) -> anyhow::Result<MarketRecommendation> {
        let current_price = positive_price("currentPrice", self.current_price)?;
        let predicted_price = positive_price("predictedPrice", self.predicted_price)?;

        let Some(recommendation) = Recommendation::from_wire(&self.recommendation) else {
            bail!(
                "recommendation must be SELL_NOW or WAIT (got {:?})",
                self.recommendation
            );
        };
        let Some(risk) = RiskLevel::from_wire(&self.risk) else {
            bail!("risk must be LOW, MEDIUM or HIGH (got {:?})", self.risk);
        };

        let explanation = self.explanation.trim().to_string();
        ensure!(!explanation.is_empty(), "explanation must be non-empty");
        let explanation_localized = self.explanation_telugu.trim().to_string();
        ensure!(
            !explanation_localized.is_empty(),
            "explanationTelugu must be non-empty"
        );

        ensure!(
            self.profit_delta.is_finite(),
            "profitDelta must be a finite number"
        );

        let days = self.days_to_wait;
        ensure!(
            days.is_finite() && days >= 0.0 && days.fract() == 0.0 && days <= u32::MAX as f64,
            "daysToWait must be a non-negative integer (got {days})"
        );

        let quality_grade = match self.quality_grade.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                QualityGrade::from_wire(s)
                    .with_context(|| format!("qualityGrade must be A, B or C (got {s:?})"))?,
            ),
        };

        let quality_assessment = self
            .quality_assessment
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut trend = Vec::new();
        for point in self.trend_data.unwrap_or_default() {
            let day = point.day.trim().to_string();
            ensure!(!day.is_empty(), "trendData day must be non-empty");
            let price = positive_price("trendData price", point.price)?;
            trend.push(TrendPoint { day, price });
        }

        Ok(MarketRecommendation {
            current_price,
            predicted_price,
            recommendation,
            risk,
            explanation,
            explanation_localized,
            profit_delta: self.profit_delta,
            days_to_wait: days as u32,
            quality_grade,
            quality_assessment,
            trend,
        })
    }
}

impl From<&MarketRecommendation> for LlmMarketRecommendation {
    fn from(rec: &MarketRecommendation) -> Self {
        let trend_data = (!rec.trend.is_empty()).then(|| {
            rec.trend
                .iter()
                .map(|p| LlmTrendPoint {
                    day: p.day.clone(),
                    price: p.price,
                })
                .collect()
        });

        Self {
            current_price: rec.current_price,
            predicted_price: rec.predicted_price,
            recommendation: rec.recommendation.as_wire().to_string(),
            risk: rec.risk.as_wire().to_string(),
            explanation: rec.explanation.clone(),
            explanation_telugu: rec.explanation_localized.clone(),
            profit_delta: rec.profit_delta,
            days_to_wait: f64::from(rec.days_to_wait),
            quality_grade: rec.quality_grade.map(|g| g.as_wire().to_string()),
            quality_assessment: rec.quality_assessment.clone(),
            trend_data,
        }
    }
}

fn positive_price(field: &str, value: f64) -> anyhow::Result<f64> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{field} must be a positive number (got {value})"
    );
    Ok(value)
}
