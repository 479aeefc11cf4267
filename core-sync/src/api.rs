//! Typed client for the remote catalog and user API.
//!
//! Thin wrapper over the host [`HttpClient`]: every endpoint the backend
//! exposes gets one method with typed request/response models. Wire format is
//! snake_case JSON throughout. The client performs no caching and no
//! connectivity checks; callers gate on the network monitor first.

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use core_catalog::models::{Mood, Track, TrackId, UserId, UserProfile};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Catalog listing filters, mirroring the server's query parameters.
///
/// An empty query lists everything. The mood sentinel `"All"` on the wire
/// means no mood filter, so `mood: None` here simply omits the parameter.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub mood: Option<Mood>,
    pub is_premium: Option<bool>,
    pub search: Option<String>,
}

/// Active subscription as the server reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: Uuid,
    pub user_id: UserId,
    pub is_active: bool,
    pub plan: String,
    pub price: f64,
    pub subscribed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response of `GET /api/subscription/status/{user_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionStatus {
    pub is_subscribed: bool,
    pub subscription: Option<SubscriptionInfo>,
}

/// Response of `POST /api/subscription/restore/{user_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreOutcome {
    pub restored: bool,
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct UserCreate<'a> {
    device_id: &'a str,
}

#[derive(Serialize)]
struct SubscriptionCreate {
    user_id: UserId,
}

#[derive(Deserialize)]
struct MoodsResponse {
    moods: Vec<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    detail: String,
}

/// Remote API client. Cheap to clone; shared via `Arc` in practice.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// `base_url` is the server root without the `/api` prefix or a trailing
    /// slash, e.g. `https://sadaa.example`.
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// List instrumentals with optional mood / premium / title-search filters.
    pub async fn list_instrumentals(&self, query: &CatalogQuery) -> Result<Vec<Track>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(mood) = &query.mood {
            params.push(("mood", mood.as_str().to_string()));
        }
        if let Some(is_premium) = query.is_premium {
            params.push(("is_premium", is_premium.to_string()));
        }
        if let Some(search) = &query.search {
            if !search.is_empty() {
                params.push(("search", search.clone()));
            }
        }
        self.get_json(&with_query("/api/instrumentals", &params)).await
    }

    /// Featured subset for the banner.
    pub async fn featured(&self) -> Result<Vec<Track>> {
        self.get_json("/api/instrumentals/featured").await
    }

    /// Single catalog record by id.
    pub async fn instrumental(&self, track_id: TrackId) -> Result<Track> {
        self.get_json(&format!("/api/instrumentals/{}", track_id)).await
    }

    /// Server-side mood vocabulary, including the `"All"` sentinel.
    pub async fn moods(&self) -> Result<Vec<String>> {
        let response: MoodsResponse = self.get_json("/api/moods").await?;
        Ok(response.moods)
    }

    /// Best-effort play-count bump. The backend treats this as advisory; a
    /// failure here never blocks playback.
    pub async fn increment_play_count(&self, track_id: TrackId) -> Result<()> {
        let path = format!("/api/instrumentals/{}/play", track_id);
        self.execute(HttpRequest::post(self.url(&path)).timeout(self.timeout))
            .await
            .map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Users & subscriptions
    // -------------------------------------------------------------------------

    /// Create-or-get the device-bound user. Idempotent on `device_id`.
    pub async fn create_or_get_user(&self, device_id: &str) -> Result<UserProfile> {
        let request = HttpRequest::post(self.url("/api/users"))
            .json(&UserCreate { device_id })?
            .timeout(self.timeout);
        let response = self.execute(request).await?;
        Ok(response.json()?)
    }

    pub async fn subscription_status(&self, user_id: UserId) -> Result<SubscriptionStatus> {
        self.get_json(&format!("/api/subscription/status/{}", user_id))
            .await
    }

    pub async fn subscribe(&self, user_id: UserId) -> Result<SubscriptionInfo> {
        let request = HttpRequest::post(self.url("/api/subscription/subscribe"))
            .json(&SubscriptionCreate { user_id })?
            .timeout(self.timeout);
        let response = self.execute(request).await?;
        Ok(response.json()?)
    }

    pub async fn restore(&self, user_id: UserId) -> Result<RestoreOutcome> {
        let path = format!("/api/subscription/restore/{}", user_id);
        let response = self
            .execute(HttpRequest::post(self.url(&path)).timeout(self.timeout))
            .await?;
        Ok(response.json()?)
    }

    // -------------------------------------------------------------------------
    // Advisory collection mirror (local always wins; push only)
    // -------------------------------------------------------------------------

    /// Mirror the local favorite ids to the server. Pull never happens: the
    /// local collection is authoritative.
    pub async fn push_favorites(&self, user_id: UserId, track_ids: &[TrackId]) -> Result<()> {
        let path = format!("/api/users/{}/favorites", user_id);
        let request = HttpRequest::new(bridge_traits::http::HttpMethod::Put, self.url(&path))
            .json(&track_ids)?
            .timeout(self.timeout);
        self.execute(request).await.map(|_| ())
    }

    /// Mirror the local playlists to the server, same push-only contract as
    /// [`Self::push_favorites`].
    pub async fn push_playlists(
        &self,
        user_id: UserId,
        playlists: &[core_catalog::models::Playlist],
    ) -> Result<()> {
        let path = format!("/api/users/{}/playlists", user_id);
        let request = HttpRequest::new(bridge_traits::http::HttpMethod::Put, self.url(&path))
            .json(&playlists)?
            .timeout(self.timeout);
        self.execute(request).await.map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = HttpRequest::get(self.url(path)).timeout(self.timeout);
        let response = self.execute(request).await?;
        Ok(response.json()?)
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            let message = match response.json::<ApiErrorBody>() {
                Ok(body) => body.detail,
                Err(_) => String::from_utf8_lossy(&response.body).into_owned(),
            };
            debug!(%url, status = response.status, "API request rejected");
            return Err(SyncError::Api {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }
}

/// Append query parameters, percent-encoding values.
fn with_query(path: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let encoded: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, percent_encode(value)))
        .collect();
    format!("{}?{}", path, encoded.join("&"))
}

/// Minimal percent-encoding: unreserved characters pass through, everything
/// else is `%XX`-escaped.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_building_skips_absent_filters() {
        assert_eq!(with_query("/api/instrumentals", &[]), "/api/instrumentals");
        assert_eq!(
            with_query(
                "/api/instrumentals",
                &[("mood", "Calm".to_string()), ("search", "morning dhikr".to_string())]
            ),
            "/api/instrumentals?mood=Calm&search=morning%20dhikr"
        );
    }

    #[test]
    fn percent_encoding_escapes_reserved_bytes() {
        assert_eq!(percent_encode("a b&c"), "a%20b%26c");
        assert_eq!(percent_encode("nasheed-01_x.~"), "nasheed-01_x.~");
    }

    #[test]
    fn restore_outcome_tolerates_missing_subscription() {
        let json = r#"{"restored": false, "message": "No active subscription found to restore"}"#;
        let outcome: RestoreOutcome = serde_json::from_str(json).unwrap();
        assert!(!outcome.restored);
        assert!(outcome.subscription.is_none());
    }
}
