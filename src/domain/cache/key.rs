//! Cache key builders

use chrono::NaiveDate;

/// Daily free-run counter of a workspace
pub fn default_provider_run_count_key(workspace_id: i64, date: NaiveDate) -> String {
    format!(
        "workspace:{}:{}:defaultProviderRunCount",
        workspace_id,
        date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_date_scoped() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(
            default_provider_run_count_key(42, date),
            "workspace:42:2024-03-09:defaultProviderRunCount"
        );
    }
}
