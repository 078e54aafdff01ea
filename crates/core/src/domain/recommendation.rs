use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    SellNow,
    Wait,
}

impl Recommendation {
    pub fn as_wire(self) -> &'static str {
        match self {
            Recommendation::SellNow => "SELL_NOW",
            Recommendation::Wait => "WAIT",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim() {
            "SELL_NOW" => Some(Recommendation::SellNow),
            "WAIT" => Some(Recommendation::Wait),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_wire(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
}

impl QualityGrade {
    pub fn as_wire(self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim() {
            "A" => Some(QualityGrade::A),
            "B" => Some(QualityGrade::B),
            "C" => Some(QualityGrade::C),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: String,
    pub price: f64,
}

/// A sell/wait advisory. Model output reaches this type through
/// `LlmMarketRecommendation::validate_and_into_recommendation`, which trims and checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecommendation {
    pub current_price: f64,
    pub predicted_price: f64,
    pub recommendation: Recommendation,
    pub risk: RiskLevel,
    pub explanation: String,
    pub explanation_localized: String,
    /// Only meaningful when `recommendation` is `Wait`.
    pub profit_delta: f64,
    /// Only meaningful when `recommendation` is `Wait`.
    pub days_to_wait: u32,
    pub quality_grade: Option<QualityGrade>,
    pub quality_assessment: Option<String>,
    pub trend: Vec<TrendPoint>,
}

impl MarketRecommendation {
    pub fn is_wait(&self) -> bool {
        self.recommendation == Recommendation::Wait
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// A recommendation plus the web sources the model grounded it on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub recommendation: MarketRecommendation,
    pub sources: Vec<GroundingSource>,
}
