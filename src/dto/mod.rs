use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::{IntoParams, ToSchema};

use crate::dao::models::Millis;

pub mod achievements;
pub mod catalog;
pub mod forum;
pub mod health;
pub mod notifications;
pub mod online;
pub mod payments;
pub mod purchases;
pub mod recommendations;
pub mod reviews;
pub mod shopping;
pub mod social;
pub mod users;
pub mod validation;
pub mod workshop;

/// Render Unix milliseconds as an RFC 3339 timestamp.
pub fn format_millis(millis: Millis) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}

pub fn format_opt_millis(millis: Option<Millis>) -> Option<String> {
    millis.map(format_millis)
}

/// Parse an RFC 3339 timestamp into Unix milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<Millis> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .ok()
        .map(|at| (at.unix_timestamp_nanos() / 1_000_000) as Millis)
}

/// Offset paging parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SkipLimit {
    /// Number of records to skip.
    pub skip: Option<u64>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
}

impl SkipLimit {
    /// Resolve to `(skip, limit)` with `limit` clamped to `1..=max`.
    pub fn resolve(&self, default_limit: u64, max: u64) -> (u64, u64) {
        (
            self.skip.unwrap_or(0),
            self.limit.unwrap_or(default_limit).clamp(1, max),
        )
    }
}

/// One-based page paging used by search endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page number, starting at 1.
    pub page: Option<u64>,
    /// Records per page.
    pub per_page: Option<u64>,
}

impl PageParams {
    /// Resolve to `(page, per_page)` with `per_page` clamped to `1..=max`.
    pub fn resolve(&self, default_per_page: u64, max: u64) -> (u64, u64) {
        (
            self.page.unwrap_or(1).max(1),
            self.per_page.unwrap_or(default_per_page).clamp(1, max),
        )
    }
}

/// Number of pages needed to show `total` records.
pub fn total_pages(total: u64, per_page: u64) -> u64 {
    total.div_ceil(per_page.max(1))
}

/// Generic acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_millis_as_rfc3339() {
        assert_eq!(format_millis(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_millis(1_500), "1970-01-01T00:00:01.5Z");
    }

    #[test]
    fn limits_are_clamped() {
        let paging = SkipLimit {
            skip: Some(5),
            limit: Some(500),
        };
        assert_eq!(paging.resolve(20, 100), (5, 100));
        assert_eq!(SkipLimit::default().resolve(20, 100), (0, 20));
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(41, 20), 3);
        let params = PageParams {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(params.resolve(20, 100), (1, 100));
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(parse_timestamp("1970-01-01T00:00:01.5Z"), Some(1_500));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
