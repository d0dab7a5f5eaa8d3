//! Coverage scoring.
//!
//! Coverage measures whether the critical (required) design questions were
//! addressed. Optional answers are qualitative detail and never move a score.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::engine::{InterviewEngine, Reachability};
use crate::session::Session;

/// Score below which a category is flagged as at risk
pub const DEFAULT_AT_RISK_THRESHOLD: f64 = 0.5;

/// Overall risk derived from the aggregate score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            RiskLevel::Low
        } else if score >= 0.7 {
            RiskLevel::Medium
        } else if score >= 0.5 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// A required question that can still be answered but has not been
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub question_id: String,
    pub category: String,
    pub prompt_text: String,
    pub severity: RiskLevel,
}

/// Completeness per category plus the aggregate.
///
/// Derived data: recompute it, never patch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub per_category: BTreeMap<String, f64>,
    pub aggregate_score: f64,
    pub at_risk_categories: BTreeSet<String>,
    pub threshold: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub gaps: Vec<CoverageGap>,
    /// Required questions ruled out by branches not taken
    #[serde(default)]
    pub unreachable_required: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl CoverageReport {
    pub fn category_score(&self, category: &str) -> Option<f64> {
        self.per_category.get(category).copied()
    }

    pub fn is_at_risk(&self, category: &str) -> bool {
        self.at_risk_categories.contains(category)
    }

    /// Equality on everything but `generated_at`
    pub fn same_scores(&self, other: &CoverageReport) -> bool {
        CoverageReport {
            generated_at: other.generated_at,
            ..self.clone()
        } == *other
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageScorer {
    threshold: f64,
}

impl Default for CoverageScorer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_AT_RISK_THRESHOLD,
        }
    }
}

impl CoverageScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a session of any status against the bank.
    ///
    /// Per category: answered required / reachable required, `1.0` when the
    /// category has no reachable required questions. The aggregate is the
    /// unweighted mean over every category in the bank.
    pub fn score(&self, session: &Session, bank: &QuestionBank) -> CoverageReport {
        let states = InterviewEngine::new(bank).reachability(session);

        let mut per_category = BTreeMap::new();
        let mut pending_gaps = Vec::new();
        let mut unreachable_required = Vec::new();

        for category in bank.categories() {
            let mut required = 0usize;
            let mut answered = 0usize;

            for (question, state) in states.iter().filter(|(q, _)| q.category == category) {
                if !question.required {
                    continue;
                }
                match state {
                    Reachability::Unreachable => {
                        unreachable_required.push(question.id.clone());
                    }
                    Reachability::Answered => {
                        required += 1;
                        answered += 1;
                    }
                    _ => {
                        required += 1;
                        pending_gaps.push(*question);
                    }
                }
            }

            let score = if required == 0 {
                1.0
            } else {
                answered as f64 / required as f64
            };
            per_category.insert(category.to_string(), score);
        }

        let aggregate_score = if per_category.is_empty() {
            1.0
        } else {
            per_category.values().sum::<f64>() / per_category.len() as f64
        };

        let at_risk_categories: BTreeSet<String> = per_category
            .iter()
            .filter(|(_, score)| **score < self.threshold)
            .map(|(category, _)| category.clone())
            .collect();

        let gaps = pending_gaps
            .into_iter()
            .map(|question| CoverageGap {
                question_id: question.id.clone(),
                category: question.category.clone(),
                prompt_text: question.prompt_text.clone(),
                severity: if at_risk_categories.contains(&question.category) {
                    RiskLevel::Critical
                } else {
                    RiskLevel::High
                },
            })
            .collect();

        tracing::debug!(
            session_id = %session.session_id,
            aggregate = aggregate_score,
            at_risk = at_risk_categories.len(),
            "Coverage scored"
        );

        CoverageReport {
            per_category,
            aggregate_score,
            at_risk_categories,
            threshold: self.threshold,
            risk_level: RiskLevel::from_score(aggregate_score),
            gaps,
            unreachable_required,
            generated_at: Utc::now(),
        }
    }
}
