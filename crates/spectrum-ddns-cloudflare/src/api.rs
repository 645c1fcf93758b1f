//! Cloudflare API v4 wire types and status mapping

use reqwest::StatusCode;
use serde::Deserialize;
use spectrum_ddns_core::{Error, Result};

/// Provider name used in errors and logs
pub const PROVIDER: &str = "cloudflare";

/// One entry of the `errors` (or `messages`) array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Response envelope wrapped around every API result
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    pub result: Option<T>,
    /// Paging details, present on list endpoints
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

/// Paging details of a list response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_count: u32,
}

impl<T> Envelope<T> {
    /// Unwrap the result, failing on `success = false` or a missing result
    pub fn into_result(self, context: &str) -> Result<T> {
        if !self.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{}: {}", context, join_messages(&self.errors)),
            ));
        }

        self.result
            .ok_or_else(|| Error::provider(PROVIDER, format!("{}: response carried no result", context)))
    }

    /// Unwrap the result of one page together with its paging details
    pub fn into_page(mut self, context: &str) -> Result<(T, Option<ResultInfo>)> {
        let info = self.result_info.take();
        self.into_result(context).map(|result| (result, info))
    }
}

/// A zone as returned by `GET /zones`
#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

fn join_messages(messages: &[ApiMessage]) -> String {
    if messages.is_empty() {
        return "request was not successful".to_string();
    }

    messages
        .iter()
        .map(|m| format!("{} (code {})", m.message, m.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-success HTTP status to an error
///
/// `body` is searched for the API's own error messages; it is never echoed
/// verbatim for authentication failures.
pub fn status_error(status: StatusCode, context: &str, body: &str) -> Error {
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .ok()
        .filter(|envelope| !envelope.errors.is_empty())
        .map(|envelope| join_messages(&envelope.errors))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API key/email or insufficient permissions (status {})",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, detail)),
        409 => Error::provider(
            PROVIDER,
            format!("{}: conflict, resource is being modified elsewhere: {}", context, detail),
        ),
        429 => Error::rate_limited(format!("{}: rate limit exceeded (status {})", context, status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: Cloudflare server error (transient): {} - {}", context, status, detail),
        ),
        _ => Error::provider(PROVIDER, format!("{}: {} - {}", context, status, detail)),
    }
}
