//! Maps an [`Analysis`] (or its absence) to what the result panel shows.
//!
//! Everything here is presentation data only: colors, copy and pre-formatted
//! money strings. Markup is produced by the service crate.

use crate::domain::query::{MarketQuery, Unit};
use crate::domain::recommendation::{
    Analysis, GroundingSource, MarketRecommendation, Recommendation, RiskLevel, TrendPoint,
};
use serde::Serialize;

pub const CURRENCY: &str = "₹";
pub const MAX_SOURCES: usize = 3;
pub const FAILURE_NOTICE_LOCALIZED: &str =
    "క్షమించండి, సర్వర్ సమస్య ఉంది. దయచేసి మళ్ళీ ప్రయత్నించండి.";
pub const FAILURE_NOTICE: &str = "Could not fetch market data. Please retry.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accent {
    Go,
    Hold,
}

impl Accent {
    pub fn for_recommendation(rec: Recommendation) -> Self {
        match rec {
            Recommendation::SellNow => Accent::Go,
            Recommendation::Wait => Accent::Hold,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Accent::Go => "#059669",
            Accent::Hold => "#4f46e5",
        }
    }
}

pub fn headline(rec: Recommendation) -> &'static str {
    match rec {
        Recommendation::SellNow => "అమ్మండి (SELL)",
        Recommendation::Wait => "ఆగండి (WAIT)",
    }
}

pub fn risk_color(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "#10b981",
        RiskLevel::Medium => "#f59e0b",
        RiskLevel::High => "#f43f5e",
    }
}

/// Short chat line posted with the card.
pub fn advisory_text(rec: &MarketRecommendation) -> String {
    match rec.recommendation {
        Recommendation::Wait => format!(
            "సలహా: ధరలు పెరిగే అవకాశం ఉంది, {} రోజులు ఆగండి.",
            rec.days_to_wait
        ),
        Recommendation::SellNow => "సలహా: ఇప్పుడే అమ్మండి, మార్కెట్ ధర బాగుంది.".to_string(),
    }
}

/// `1200` -> `₹1200`, `1150.5` -> `₹1150.50`. No digit grouping.
pub fn format_money(amount: f64) -> String {
    let amount = amount.abs();
    if amount.fract() == 0.0 {
        format!("{CURRENCY}{amount:.0}")
    } else {
        format!("{CURRENCY}{amount:.2}")
    }
}

pub fn format_unit_price(amount: f64, unit: Unit) -> String {
    format!("{} / {}", format_money(amount), unit.short())
}

pub fn format_profit(delta: f64) -> String {
    let sign = if delta < 0.0 { "-" } else { "+" };
    format!("{sign} {}", format_money(delta))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityBlock {
    pub grade: String,
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub day: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLink {
    pub label: String,
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationCard {
    pub title: String,
    pub accent: Accent,
    pub accent_color: &'static str,
    pub headline: &'static str,
    pub current_price: String,
    pub predicted_price: String,
    /// Present only for WAIT.
    pub profit_line: Option<String>,
    pub risk: RiskLevel,
    pub risk_color: &'static str,
    pub explanation_primary: String,
    pub explanation_secondary: String,
    pub advisory: String,
    pub quality: Option<QualityBlock>,
    pub trend: Vec<TrendRow>,
    pub sources: Vec<SourceLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNotice {
    pub localized: &'static str,
    pub message: &'static str,
}

impl Default for FailureNotice {
    fn default() -> Self {
        Self {
            localized: FAILURE_NOTICE_LOCALIZED,
            message: FAILURE_NOTICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedOutcome {
    Card(Box<RecommendationCard>),
    Failure(FailureNotice),
}

impl RenderedOutcome {
    pub fn card(&self) -> Option<&RecommendationCard> {
        match self {
            RenderedOutcome::Card(card) => Some(card.as_ref()),
            RenderedOutcome::Failure(_) => None,
        }
    }
}

pub fn render_card(
    rec: &MarketRecommendation,
    sources: &[GroundingSource],
    query: &MarketQuery,
) -> RecommendationCard {
    let unit = query.unit();
    let accent = Accent::for_recommendation(rec.recommendation);
    let profit_line = rec.is_wait().then(|| format_profit(rec.profit_delta));

    let quality = rec.quality_grade.map(|grade| QualityBlock {
        grade: grade.as_wire().to_string(),
        assessment: rec.quality_assessment.clone(),
    });

    let trend = rec
        .trend
        .iter()
        .map(|TrendPoint { day, price }| TrendRow {
            day: day.clone(),
            price: format_money(*price),
        })
        .collect();

    let sources = sources
        .iter()
        .take(MAX_SOURCES)
        .enumerate()
        .map(|(idx, s)| SourceLink {
            label: format!("MANDI SOURCE {}", idx + 1),
            title: s.title.clone(),
            uri: s.uri.clone(),
        })
        .collect();

    RecommendationCard {
        title: format!("{} Market Insight", query.crop()),
        accent,
        accent_color: accent.color(),
        headline: headline(rec.recommendation),
        current_price: format_unit_price(rec.current_price, unit),
        predicted_price: format_unit_price(rec.predicted_price, unit),
        profit_line,
        risk: rec.risk,
        risk_color: risk_color(rec.risk),
        explanation_primary: rec.explanation_localized.clone(),
        explanation_secondary: rec.explanation.clone(),
        advisory: advisory_text(rec),
        quality,
        trend,
        sources,
    }
}

pub fn render_outcome(analysis: Option<&Analysis>, query: &MarketQuery) -> RenderedOutcome {
    match analysis {
        Some(a) => RenderedOutcome::Card(Box::new(render_card(
            &a.recommendation,
            &a.sources,
            query,
        ))),
        None => RenderedOutcome::Failure(FailureNotice::default()),
    }
}
