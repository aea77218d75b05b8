//! Wire types for the remote REST endpoints

use serde::Deserialize;

/// One page of `followers/ids`
#[derive(Debug, Clone, Deserialize)]
pub struct FollowerIdsPage {
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub next_cursor: i64,
}

/// Subset of `users/show` we care about
#[derive(Debug, Clone, Deserialize)]
pub struct UserDetails {
    pub screen_name: String,
}

/// Error body, in either of the two shapes the API has used
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorItem {
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best-effort human readable message, "unknown" when nothing parses
    pub(crate) fn message_from(body: &[u8]) -> String {
        let parsed: ApiErrorBody = serde_json::from_slice(body).unwrap_or_default();
        parsed
            .error
            .or_else(|| parsed.errors.into_iter().find_map(|e| e.message))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
