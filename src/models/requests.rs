//! Request DTOs for the statistics API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::aggregation::{ComputeError, Metric, TimeWindow};

/// Longest accepted email address
const MAX_EMAIL_LENGTH: usize = 254;

/// Request body for POST /auth/login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let email = self.email.trim();
        if email.is_empty() {
            return Some("Email cannot be empty".to_string());
        }
        if email.len() > MAX_EMAIL_LENGTH {
            return Some(format!(
                "Email exceeds maximum length of {} characters",
                MAX_EMAIL_LENGTH
            ));
        }
        if self.password.is_empty() {
            return Some("Password cannot be empty".to_string());
        }
        None
    }
}

/// Query string for GET /dashboard/stats
///
/// # Fields
/// - `window`: `all` (default), `today`, `<N>d`, or `YYYY-MM-DD..YYYY-MM-DD`
/// - `metrics`: comma-separated metric names, every metric when absent
/// - `tenant_id`: optional explicit tenant, must match the credential
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub metrics: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl StatsQuery {
    pub fn time_window(&self, today: NaiveDate) -> Result<TimeWindow, ComputeError> {
        match self.window.as_deref().map(str::trim) {
            None | Some("") => Ok(TimeWindow::all()),
            Some(spec) => TimeWindow::parse(spec, today),
        }
    }

    /// Requested metrics in request order, without duplicates.
    ///
    /// An explicit list that names no metric at all (`metrics=,`) is
    /// rejected rather than read as "every metric".
    pub fn metric_list(&self) -> Result<Vec<Metric>, ComputeError> {
        let raw = match self.metrics.as_deref().map(str::trim) {
            None | Some("") => return Ok(Metric::ALL.to_vec()),
            Some(raw) => raw,
        };

        let mut metrics = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let metric: Metric = name.parse()?;
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }

        if metrics.is_empty() {
            return Err(ComputeError::UnknownMetric(format!("no metric named in '{}'", raw)));
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_login_request_deserialize() {
        let json = r#"{"email": "seller@tenant-001.com", "password": "password123"}"#;
        let req: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.email, "seller@tenant-001.com");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_login_validate_empty_fields() {
        let req = LoginRequest {
            email: "  ".to_string(),
            password: "x".to_string(),
        };
        assert!(req.validate().is_some());

        let req = LoginRequest {
            email: "a@b.c".to_string(),
            password: String::new(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_stats_query_defaults() {
        let query = StatsQuery::default();
        assert_eq!(query.time_window(today()).unwrap(), TimeWindow::all());
        assert_eq!(query.metric_list().unwrap(), Metric::ALL.to_vec());
    }

    #[test]
    fn test_metric_list_dedupes_in_order() {
        let query = StatsQuery {
            metrics: Some("total_revenue, sales_count,total_revenue".to_string()),
            ..StatsQuery::default()
        };
        assert_eq!(
            query.metric_list().unwrap(),
            vec![Metric::TotalRevenue, Metric::SalesCount]
        );
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let query = StatsQuery {
            metrics: Some("sales_count,profit".to_string()),
            ..StatsQuery::default()
        };
        assert!(matches!(
            query.metric_list(),
            Err(ComputeError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_metric_list_of_only_separators_rejected() {
        for raw in [",", " , ,", ",,,"] {
            let query = StatsQuery {
                metrics: Some(raw.to_string()),
                ..StatsQuery::default()
            };
            assert!(
                matches!(query.metric_list(), Err(ComputeError::UnknownMetric(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_bad_window_rejected() {
        let query = StatsQuery {
            window: Some("yesterday-ish".to_string()),
            ..StatsQuery::default()
        };
        assert!(matches!(
            query.time_window(today()),
            Err(ComputeError::InvalidWindow(_))
        ));
    }
}
