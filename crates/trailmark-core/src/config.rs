//! Pipeline configuration. Every knob is an explicit parameter with a
//! default; `PipelineConfig::validate` rejects bad values at the call
//! boundary instead of clamping them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::EntryType;

pub const DEFAULT_SESSION_GAP_HOURS: f64 = 2.0;
pub const DEFAULT_QUICK_RESTART_MINUTES: f64 = 5.0;
pub const DEFAULT_MIN_ENTRIES_FOR_SESSION: usize = 2;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_TOKEN_BUDGET: i64 = 2000;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("similarity threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("token budget must not be negative, got {0}")]
    NegativeBudget(i64),

    #[error("session gap must be a positive number of hours, got {0}")]
    InvalidSessionGap(f64),

    #[error("quick-restart window must be a non-negative number of minutes, got {0}")]
    InvalidQuickRestart(f64),

    #[error("relevance weight `{name}` must be within [0, 1], got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("relevance weights must sum to 1.0, got {0}")]
    WeightSum(f64),
}

// ── Session segmentation ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_gap_hours: f64,
    pub quick_restart_minutes: f64,
    pub min_entries_for_session: usize,
    /// Entry types that open a new session (subject to the quick-restart window).
    pub marker_types: Vec<EntryType>,
    /// Case-insensitive phrases that mark a session as a continuation.
    pub continuation_markers: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_gap_hours: DEFAULT_SESSION_GAP_HOURS,
            quick_restart_minutes: DEFAULT_QUICK_RESTART_MINUTES,
            min_entries_for_session: DEFAULT_MIN_ENTRIES_FOR_SESSION,
            marker_types: vec![EntryType::SessionStart],
            continuation_markers: [
                "continuing",
                "continued from",
                "continue from",
                "resuming",
                "resumed",
                "picking up where",
                "pick up where",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.session_gap_hours.is_finite() || self.session_gap_hours <= 0.0 {
            return Err(ConfigError::InvalidSessionGap(self.session_gap_hours));
        }
        if !self.quick_restart_minutes.is_finite() || self.quick_restart_minutes < 0.0 {
            return Err(ConfigError::InvalidQuickRestart(self.quick_restart_minutes));
        }
        Ok(())
    }
}

// ── Relevance weights ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    pub context_type: f64,
    pub hook_source: f64,
    pub rich_tags: f64,
    pub recency: f64,
    pub work_continuity: f64,
    pub uniqueness: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            context_type: 0.40,
            hook_source: 0.20,
            rich_tags: 0.15,
            recency: 0.15,
            work_continuity: 0.08,
            uniqueness: 0.02,
        }
    }
}

impl RelevanceWeights {
    fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("context_type", self.context_type),
            ("hook_source", self.hook_source),
            ("rich_tags", self.rich_tags),
            ("recency", self.recency),
            ("work_continuity", self.work_continuity),
            ("uniqueness", self.uniqueness),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.named().iter().map(|(_, w)| w).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

// ── Whole pipeline ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub session: SessionConfig,
    pub similarity_threshold: f64,
    pub weights: RelevanceWeights,
    pub max_token_budget: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            weights: RelevanceWeights::default(),
            max_token_budget: DEFAULT_MAX_TOKEN_BUDGET,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.similarity_threshold)?;
        if self.max_token_budget < 0 {
            return Err(ConfigError::NegativeBudget(self.max_token_budget));
        }
        self.session.validate()?;
        self.weights.validate()
    }

    /// Budget as a count. Negative values are rejected by `validate`.
    pub fn token_budget(&self) -> usize {
        if self.max_token_budget <= 0 {
            return 0;
        }
        usize::try_from(self.max_token_budget).unwrap_or(usize::MAX)
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::ThresholdOutOfRange(threshold));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert!((cfg.weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(cfg.session.min_entries_for_session, 2);
        assert_eq!(cfg.token_budget(), 2000);
    }

    #[test]
    fn threshold_outside_unit_interval_rejected() {
        let cfg = PipelineConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ThresholdOutOfRange(1.5)));

        let cfg = PipelineConfig {
            similarity_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ThresholdOutOfRange(_))
        ));
    }

    #[test]
    fn negative_budget_rejected() {
        let cfg = PipelineConfig {
            max_token_budget: -1,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err, ConfigError::NegativeBudget(-1));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn zero_budget_is_allowed() {
        let cfg = PipelineConfig {
            max_token_budget: 0,
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.token_budget(), 0);
    }

    #[test]
    fn maximal_budget_is_valid() {
        let cfg = PipelineConfig {
            max_token_budget: i64::MAX,
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert!(cfg.token_budget() > 0);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let cfg = PipelineConfig {
            weights: RelevanceWeights {
                context_type: 0.9,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::WeightSum(_))));
    }

    #[test]
    fn negative_weight_named_in_error() {
        let weights = RelevanceWeights {
            recency: -0.15,
            context_type: 0.70,
            ..Default::default()
        };
        match weights.validate() {
            Err(ConfigError::InvalidWeight { name, .. }) => assert_eq!(name, "recency"),
            other => panic!("expected InvalidWeight, got {other:?}"),
        }
    }

    #[test]
    fn bad_session_gap_rejected() {
        let cfg = PipelineConfig {
            session: SessionConfig {
                session_gap_hours: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSessionGap(0.0)));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"max_token_budget": 400, "session": {"session_gap_hours": 1.0}}"#)
                .unwrap();
        assert_eq!(cfg.max_token_budget, 400);
        assert!((cfg.session.session_gap_hours - 1.0).abs() < 1e-9);
        assert_eq!(cfg.session.min_entries_for_session, 2);
        assert!((cfg.similarity_threshold - 0.7).abs() < 1e-9);
    }
}
