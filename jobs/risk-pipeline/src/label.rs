//! Septic shock risk label (SIRS temperature and heart-rate criteria)

pub const FEVER_ABOVE_C: f64 = 38.0;
pub const HYPOTHERMIA_BELOW_C: f64 = 36.0;
pub const TACHYCARDIA_ABOVE_BPM: f64 = 90.0;

/// Name of the label column produced by the extract step.
pub const LABEL_COLUMN: &str = "septic_risk";

/// 1 when temperature is outside [36, 38] °C and heart rate exceeds 90 bpm,
/// else 0. Bounds are exclusive.
pub fn label_case_sql() -> String {
    format!(
        "CASE WHEN (body_temperature > {} OR body_temperature < {}) AND heart_rate > {} THEN 1 ELSE 0 END",
        FEVER_ABOVE_C, HYPOTHERMIA_BELOW_C, TACHYCARDIA_ABOVE_BPM
    )
}

/// Feature columns plus the label, read from `table` (`project.dataset.table`).
pub fn extract_query(table: &str) -> String {
    format!(
        "SELECT heart_rate, body_temperature, spO2, battery_level, {} AS {} FROM `{}`",
        label_case_sql(),
        LABEL_COLUMN,
        table
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_bounds_are_exclusive() {
        let sql = label_case_sql();
        // 38.0 and 36.0 are normal temperatures, 90 bpm is a normal heart rate.
        assert!(sql.contains(&format!("body_temperature > {}", FEVER_ABOVE_C)));
        assert!(sql.contains(&format!("body_temperature < {}", HYPOTHERMIA_BELOW_C)));
        assert!(sql.contains(&format!("heart_rate > {}", TACHYCARDIA_ABOVE_BPM)));
        assert!(!sql.contains(">="));
        assert!(!sql.contains("<="));
        assert_eq!((FEVER_ABOVE_C, HYPOTHERMIA_BELOW_C, TACHYCARDIA_ABOVE_BPM), (38.0, 36.0, 90.0));
    }

    #[test]
    fn test_sql_matches_rule_thresholds() {
        assert_eq!(
            label_case_sql(),
            "CASE WHEN (body_temperature > 38 OR body_temperature < 36) AND heart_rate > 90 THEN 1 ELSE 0 END"
        );
    }

    #[test]
    fn test_extract_query_names_table_and_label() {
        let sql = extract_query("p.d.t");
        assert!(sql.starts_with("SELECT heart_rate, body_temperature, spO2, battery_level, CASE"));
        assert!(sql.ends_with("AS septic_risk FROM `p.d.t`"));
    }
}
