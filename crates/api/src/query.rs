//! Query parameter types for API handlers.

use chrono::{DateTime, NaiveDate, Utc};
use envmon_core::types::Timestamp;
use serde::Deserialize;

use crate::error::AppError;

/// `?start=&end=` for the range endpoint.
///
/// Both bounds are required and inclusive. Each accepts an RFC 3339
/// timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeParams {
    pub fn bounds(&self) -> Result<(Timestamp, Timestamp), AppError> {
        Ok((
            parse_bound("start", self.start.as_deref())?,
            parse_bound("end", self.end.as_deref())?,
        ))
    }
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Timestamp, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Query parameter '{name}' is required")))?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(AppError::BadRequest(format!(
        "Query parameter '{name}' is not a valid timestamp: {raw}"
    )))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn params(start: Option<&str>, end: Option<&str>) -> RangeParams {
        RangeParams {
            start: start.map(String::from),
            end: end.map(String::from),
        }
    }

    #[test]
    fn rfc3339_bounds_are_normalised_to_utc() {
        let (start, end) = params(Some("2024-03-01T10:00:00+02:00"), Some("2024-03-01T12:00:00Z"))
            .bounds()
            .unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn bare_dates_mean_midnight_utc() {
        let (start, _) = params(Some("2024-03-01"), Some("2024-03-02")).bounds().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn missing_or_garbage_bounds_are_rejected() {
        assert_matches!(params(None, Some("2024-03-01")).bounds(), Err(AppError::BadRequest(msg)) => {
            assert!(msg.contains("'start'"));
        });
        assert_matches!(params(Some("2024-03-01"), Some("  ")).bounds(), Err(AppError::BadRequest(_)));
        assert_matches!(params(Some("yesterday"), Some("2024-03-01")).bounds(), Err(AppError::BadRequest(_)));
    }
}
