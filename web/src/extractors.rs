//! Custom Axum extractors.
//!
//! This module contains custom extractors for common HTTP patterns:
//! - [`Pagination`]: forgiving page/limit query parameters
//! - [`CorrelationId`]: extract or generate request correlation IDs
//!
//! # Examples
//!
//! ```ignore
//! use orderflow_web::extractors::{CorrelationId, Pagination};
//!
//! async fn handler(
//!     pagination: Pagination,
//!     correlation_id: CorrelationId,
//! ) -> Result<Json<Page>, AppError> {
//!     tracing::info!(
//!         correlation_id = %correlation_id.0,
//!         page = pagination.page,
//!         "Listing orders"
//!     );
//!     // ...
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Default page when the query does not specify one.
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size when the query does not specify one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Upper bound on the page size.
pub const MAX_LIMIT: u32 = 100;

/// Forgiving pagination parameters.
///
/// Reads `page` and `limit` from the query string. Missing, non-numeric, or
/// out-of-range values fall back to the defaults rather than rejecting the
/// request; `limit` is capped at [`MAX_LIMIT`]. A page past the end of the
/// data is not an error either, it just yields an empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Parse pagination from a raw query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let page = query_param(query, "page")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&p| p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let limit = query_param(query, "limit")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&l| l >= 1)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    /// Total number of pages for `total` items.
    #[must_use]
    pub const fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit as u64)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_query(parts.uri.query().unwrap_or("")))
    }
}

/// Find a query parameter's value without decoding.
///
/// The pagination parameters are plain integers, so percent-decoding is
/// unnecessary; anything that needs decoding fails the numeric parse and
/// falls back to the default.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Correlation ID for request tracing.
///
/// Extracts the correlation ID from the `X-Correlation-ID` header,
/// or generates a new UUID v4 if not present.
///
/// # Example
///
/// ```ignore
/// async fn handler(correlation_id: CorrelationId) -> String {
///     format!("Request ID: {}", correlation_id.0)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Try to extract from X-Correlation-ID header
        let correlation_id = parts
            .headers
            .get("X-Correlation-ID")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn pagination_defaults_when_query_is_empty() {
        assert_eq!(Pagination::from_query(""), Pagination::default());
    }

    #[test]
    fn pagination_reads_page_and_limit() {
        let p = Pagination::from_query("page=3&limit=25");
        assert_eq!(p.page, 3);
        assert_eq!(p.limit, 25);
    }

    #[test]
    fn pagination_tolerates_garbage_values() {
        let p = Pagination::from_query("page=abc&limit=xyz");
        assert_eq!(p, Pagination::default());

        let p = Pagination::from_query("page=-2&limit=0");
        assert_eq!(p, Pagination::default());
    }

    #[test]
    fn pagination_caps_the_limit() {
        let p = Pagination::from_query("limit=5000");
        assert_eq!(p.limit, MAX_LIMIT);
    }

    #[test]
    fn pagination_ignores_unrelated_params() {
        let p = Pagination::from_query("sort=desc&page=2");
        assert_eq!(p.page, 2);
        assert_eq!(p.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination {
            page: 1,
            limit: 10,
        };
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
    }

    #[tokio::test]
    async fn test_pagination_from_request_parts() {
        let req = Request::builder()
            .uri("/api/orders?page=2&limit=50")
            .body(())
            .expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let pagination = Pagination::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(pagination.page, 2);
        assert_eq!(pagination.limit, 50);
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header("X-Correlation-ID", uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_generates_new() {
        let req = Request::builder().body(()).expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_ne!(correlation_id.0, Uuid::nil());
    }
}
