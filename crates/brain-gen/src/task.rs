//! Simulation task descriptors.
//!
//! `AlphaTask` is the externally persisted/submitted shape; its serialized
//! form must match the platform schema field-for-field.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fixed simulation settings attached to every generated alpha.
///
/// Constant for a run; not derived from fetched data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlphaSettings {
    pub instrument_type: String,
    pub region: String,
    pub universe: String,
    pub delay: u32,
    pub decay: u32,
    pub neutralization: String,
    pub truncation: Decimal,
    pub pasteurization: String,
    pub unit_handling: String,
    pub nan_handling: String,
    pub language: String,
    pub visualization: bool,
}

impl Default for AlphaSettings {
    fn default() -> Self {
        Self {
            instrument_type: "EQUITY".to_string(),
            region: "USA".to_string(),
            universe: "TOP3000".to_string(),
            delay: 1,
            decay: 0,
            neutralization: "SUBINDUSTRY".to_string(),
            truncation: dec!(0.01),
            pasteurization: "ON".to_string(),
            unit_handling: "VERIFY".to_string(),
            nan_handling: "ON".to_string(),
            language: "FASTEXPR".to_string(),
            visualization: false,
        }
    }
}

/// One submittable simulation task. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaTask {
    #[serde(rename = "type")]
    pub task_type: String,
    pub settings: AlphaSettings,
    pub regular: String,
}

impl AlphaTask {
    /// Wrap an expression with the run's settings as a REGULAR simulation.
    pub fn regular(expression: impl Into<String>, settings: AlphaSettings) -> Self {
        Self {
            task_type: "REGULAR".to_string(),
            settings,
            regular: expression.into(),
        }
    }
}

/// Build one task per expression, preserving order.
pub fn build_tasks(expressions: Vec<String>, settings: &AlphaSettings) -> Vec<AlphaTask> {
    expressions
        .into_iter()
        .map(|expression| AlphaTask::regular(expression, settings.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_wraps_expression() {
        let task = AlphaTask::regular(
            "group_rank(ts_zscore(f1_totalassets, 120), market)",
            AlphaSettings::default(),
        );
        assert_eq!(task.task_type, "REGULAR");
        assert_eq!(task.regular, "group_rank(ts_zscore(f1_totalassets, 120), market)");
    }

    #[test]
    fn test_settings_serialize_to_platform_schema() {
        let json = serde_json::to_value(AlphaSettings::default()).unwrap();
        assert_eq!(json["instrumentType"], "EQUITY");
        assert_eq!(json["region"], "USA");
        assert_eq!(json["universe"], "TOP3000");
        assert_eq!(json["delay"], 1);
        assert_eq!(json["decay"], 0);
        assert_eq!(json["neutralization"], "SUBINDUSTRY");
        assert_eq!(json["truncation"], 0.01);
        assert_eq!(json["pasteurization"], "ON");
        assert_eq!(json["unitHandling"], "VERIFY");
        assert_eq!(json["nanHandling"], "ON");
        assert_eq!(json["language"], "FASTEXPR");
        assert_eq!(json["visualization"], false);
    }

    #[test]
    fn test_task_type_field_serializes_as_type() {
        let task = AlphaTask::regular("expr", AlphaSettings::default());
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "REGULAR");
        assert_eq!(json["regular"], "expr");
        assert!(json["settings"].is_object());
    }

    #[test]
    fn test_build_tasks_preserves_order_and_count() {
        let expressions = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let tasks = build_tasks(expressions, &AlphaSettings::default());
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].regular, "a");
        assert_eq!(tasks[2].regular, "c");
    }
}
