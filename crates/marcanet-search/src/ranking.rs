//! Risk ranking of similar marks.
//!
//! [`RiskRanker`] is the seam for an AI collaborator that judges how likely a
//! new mark is to clash with what the registry already holds.
//! [`HeuristicRanker`] implements it without any external service.

use crate::error::Result;
use marcanet_core::{
    MarkName, NiceClass, PhoneticResult, QueryRequest, TrademarkRecord, MAX_RESULT_CAP,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Highest viability any assessment may report.
pub const MAX_VIABILITY: u8 = 85;

/// Input to a ranker: the query and a deduplicated, bounded record list.
#[derive(Debug, Clone)]
pub struct RankingRequest {
    query_mark: MarkName,
    nice_class: Option<NiceClass>,
    records: Vec<TrademarkRecord>,
}

impl RankingRequest {
    /// Build a request, dropping repeated keys and anything past the cap.
    #[must_use]
    pub fn new(
        query_mark: MarkName,
        nice_class: Option<NiceClass>,
        records: impl IntoIterator<Item = TrademarkRecord>,
    ) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.key().to_string()))
            .take(MAX_RESULT_CAP)
            .collect();
        Self {
            query_mark,
            nice_class,
            records,
        }
    }

    /// Build a request from a finished phonetic search.
    #[must_use]
    pub fn from_search(request: &QueryRequest, result: &PhoneticResult) -> Self {
        Self::new(
            request.mark().clone(),
            request.nice_class(),
            result.records.iter().cloned(),
        )
    }

    #[must_use]
    pub fn query_mark(&self) -> &MarkName {
        &self.query_mark
    }

    #[must_use]
    pub fn nice_class(&self) -> Option<NiceClass> {
        self.nice_class
    }

    #[must_use]
    pub fn records(&self) -> &[TrademarkRecord] {
        &self.records
    }
}

/// A record with its conflict score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: TrademarkRecord,
    /// 0.0 (unrelated) to 1.0 (identical)
    pub score: f64,
}

/// How crowded the registry is around the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Reading of a viability percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViabilityBand {
    /// Not recommended
    VeryLow,
    /// Risky, consider alternatives
    Low,
    /// Possible with changes to the name or description
    Medium,
    /// Good chance of registration
    High,
}

impl ViabilityBand {
    #[must_use]
    pub fn classify(percent: u8) -> Self {
        match percent {
            0..=25 => Self::VeryLow,
            26..=50 => Self::Low,
            51..=65 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Advice shown to the applicant.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::VeryLow => "Very little chance; registering is not recommended",
            Self::Low => "Low chance; risky, consider alternatives",
            Self::Medium => "Possible with changes; add a slogan or adjust the description",
            Self::High => "Good chance; recommended for registration",
        }
    }
}

/// A ranker's verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Most conflicting records first
    pub ranked: Vec<ScoredRecord>,
    /// 0 to [`MAX_VIABILITY`]
    pub viability_percent: u8,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
}

impl RiskAssessment {
    #[must_use]
    pub fn band(&self) -> ViabilityBand {
        ViabilityBand::classify(self.viability_percent)
    }

    /// Plain-text executive summary of the assessment for `request`.
    #[must_use]
    pub fn summary(&self, request: &RankingRequest) -> String {
        let class = request
            .nice_class()
            .map_or_else(|| "not specified".to_string(), |c| c.to_string());
        let band = self.band();
        let mut summary = format!(
            "Mark: {}\nClass: {}\nViability: {}% ({:?})\nRisk level: {:?}\n{}\n",
            request.query_mark(),
            class,
            self.viability_percent,
            band,
            self.risk_level,
            band.description()
        );
        for factor in &self.risk_factors {
            summary.push_str("- ");
            summary.push_str(factor);
            summary.push('\n');
        }
        summary
    }
}

/// Judges conflict risk for a set of similar marks.
#[async_trait::async_trait]
pub trait RiskRanker: Send + Sync {
    async fn assess(&self, request: &RankingRequest) -> Result<RiskAssessment>;
}

/// Ranks by name similarity and scores viability from the number of
/// similar marks.
#[derive(Debug, Clone)]
pub struct HeuristicRanker {
    top_k: usize,
    class_bonus: f64,
}

impl Default for HeuristicRanker {
    fn default() -> Self {
        Self {
            top_k: 10,
            class_bonus: 0.15,
        }
    }
}

impl HeuristicRanker {
    /// Keep at most `top_k` records in the ranking.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn viability(similar: usize) -> (u8, RiskLevel) {
        match similar {
            0 => (75, RiskLevel::Low),
            1..=3 => (60, RiskLevel::Medium),
            4..=10 => (40, RiskLevel::High),
            _ => (25, RiskLevel::VeryHigh),
        }
    }

    fn score(&self, query: &str, nice_class: Option<NiceClass>, record: &TrademarkRecord) -> f64 {
        let name = similarity(query, &record.mark_name);
        let Some(class) = nice_class else {
            return name;
        };
        let weighted = name * (1.0 - self.class_bonus);
        if record.nice_classes.contains(&class.code()) {
            weighted + self.class_bonus
        } else {
            weighted
        }
    }
}

#[async_trait::async_trait]
impl RiskRanker for HeuristicRanker {
    async fn assess(&self, request: &RankingRequest) -> Result<RiskAssessment> {
        let query = request.query_mark().as_str();
        let mut ranked: Vec<ScoredRecord> = request
            .records()
            .iter()
            .map(|record| ScoredRecord {
                score: self.score(query, request.nice_class(), record),
                record: record.clone(),
            })
            .collect();
        // Stable: ties keep portal order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(self.top_k);

        let similar = request.records().len();
        let (viability_percent, risk_level) = Self::viability(similar);
        let risk_factors = if similar == 0 {
            Vec::new()
        } else {
            vec![format!("{similar} similar marks on record")]
        };

        tracing::debug!(
            "Heuristic assessment for {}: {}% ({:?})",
            query,
            viability_percent,
            risk_level
        );

        Ok(RiskAssessment {
            ranked,
            viability_percent: viability_percent.min(MAX_VIABILITY),
            risk_level,
            risk_factors,
        })
    }
}

/// Dice coefficient over character bigrams of the alphanumeric content.
#[allow(clippy::cast_precision_loss)]
fn similarity(a: &str, b: &str) -> f64 {
    let a = comparable(a);
    let b = comparable(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_bigrams = bigrams(&a);
    let mut b_bigrams = bigrams(&b);
    let total = a_bigrams.values().sum::<usize>() + b_bigrams.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }

    let mut shared = 0;
    for (pair, count) in a_bigrams {
        if let Some(other) = b_bigrams.get_mut(&pair) {
            let common = count.min(*other);
            shared += common;
            *other -= common;
        }
    }

    (2 * shared) as f64 / total as f64
}

fn comparable(text: &str) -> Vec<char> {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

fn bigrams(chars: &[char]) -> HashMap<(char, char), usize> {
    let mut map = HashMap::new();
    for pair in chars.windows(2) {
        *map.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, mark: &str, class: u8) -> TrademarkRecord {
        let mut record = TrademarkRecord::new(key, mark);
        record.nice_classes.insert(class);
        record
    }

    fn request(records: Vec<TrademarkRecord>) -> RankingRequest {
        RankingRequest::new(
            MarkName::new("Luna Azul").unwrap(),
            Some(NiceClass::new(30).unwrap()),
            records,
        )
    }

    #[test]
    fn test_similarity() {
        assert!((similarity("LUNA", "luna") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("LUNA AZUL", "LUNA AZULADA") > 0.7);
        assert!(similarity("LUNA", "TORNILLO") < 0.2);
        assert!(similarity("", "LUNA").abs() < f64::EPSILON);
    }

    #[test]
    fn test_request_dedups_and_bounds() {
        let records = (0..400).map(|i| record(&(i % 350).to_string(), "LUNA", 30));
        let request = request(records.collect());
        assert_eq!(request.records().len(), MAX_RESULT_CAP);
    }

    #[test]
    fn test_viability_band() {
        assert_eq!(ViabilityBand::classify(25), ViabilityBand::VeryLow);
        assert_eq!(ViabilityBand::classify(40), ViabilityBand::Low);
        assert_eq!(ViabilityBand::classify(60), ViabilityBand::Medium);
        assert_eq!(ViabilityBand::classify(75), ViabilityBand::High);
    }

    #[tokio::test]
    async fn test_no_similar_marks() {
        let assessment = HeuristicRanker::default()
            .assess(&request(Vec::new()))
            .await
            .unwrap();
        assert_eq!(assessment.viability_percent, 75);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.band(), ViabilityBand::High);
        assert!(assessment.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_orders_by_score() {
        let records = vec![
            record("1", "TORNILLOS DEL NORTE", 7),
            record("2", "LUNA AZUL", 30),
            record("3", "LUNA AZUL", 9),
            record("4", "LUNAZUL", 30),
        ];
        let assessment = HeuristicRanker::default()
            .with_top_k(3)
            .assess(&request(records))
            .await
            .unwrap();

        assert_eq!(assessment.viability_percent, 40);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.ranked.len(), 3);
        // Sharing the queried class outweighs a small spelling difference
        let keys: Vec<_> = assessment.ranked.iter().map(|r| r.record.key()).collect();
        assert_eq!(keys, ["2", "4", "3"]);
        assert!(assessment.ranked.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[tokio::test]
    async fn test_summary() {
        let request = request(vec![record("1", "LUNA AZUL", 30)]);
        let assessment = HeuristicRanker::default().assess(&request).await.unwrap();

        let summary = assessment.summary(&request);
        assert!(summary.contains("Mark: LUNA AZUL"));
        assert!(summary.contains("Class: 30"));
        assert!(summary.contains("Viability: 60% (Medium)"));
        assert!(summary.contains("Risk level: Medium"));
        assert!(summary.contains("- 1 similar marks on record"));
    }

    #[tokio::test]
    async fn test_crowded_registry() {
        let records = (0..12).map(|i| record(&i.to_string(), "LUNA", 30)).collect();
        let assessment = HeuristicRanker::default()
            .assess(&request(records))
            .await
            .unwrap();
        assert_eq!(assessment.viability_percent, 25);
        assert_eq!(assessment.risk_level, RiskLevel::VeryHigh);
        assert!(assessment.viability_percent <= MAX_VIABILITY);
    }
}
