use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::model::{GradeSections, ListRecord, RecordId};
use crate::query::{self, ListQuery, Page};
use crate::settings::Settings;

pub const DEFAULT_BASE_URL: &str = "https://asphaleia.onrender.com/api/v1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_LIST_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("list fetch failed after {attempts} attempts: {message}")]
    FetchFailed { attempts: u32, message: String },

    #[error("{message}")]
    RequestFailed { message: String },

    #[error("unexpected response shape: {message}")]
    InvalidResponse { message: String },

    #[error("transport error: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Mutation acknowledgement, i.e. the envelope minus the payload.
#[derive(Clone, Debug, Default)]
pub struct Ack {
    pub message: Option<String>,
}

/// Single poll of the enrollment device. Either side may arrive first.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BiometricReading {
    #[serde(default)]
    pub rfid: Option<String>,
    #[serde(default)]
    pub fingerprint_id: Option<String>,
}

impl BiometricReading {
    pub fn complete(&self) -> bool {
        self.rfid.is_some() && self.fingerprint_id.is_some()
    }
}

/// Per-status entry counts behind the dashboard pie chart.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatusBreakdown {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

#[derive(Clone, Debug)]
pub struct ApiOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    pub proxy: Option<String>,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            retries: DEFAULT_LIST_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            proxy: None,
        }
    }
}

/// Doubling backoff schedule for list retries.
pub fn backoff_delays(retries: u32, base: Duration) -> Vec<Duration> {
    (0..retries).map(|i| base * 2u32.pow(i)).collect()
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl ApiClient {
    pub fn new(options: ApiOptions) -> Result<Self, ApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("asphaleia-console/0.1"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(options.timeout);

        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let parsed = reqwest::Proxy::all(proxy).map_err(|e| ApiError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(parsed);
        }

        let http = builder
            .build()
            .map_err(|e| ApiError::ClientBuild { source: e })?;

        let base_url = options.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            retries: options.retries,
            backoff: options.backoff,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn map_send_error(e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport { source: e }
        }
    }

    /// Reads the `{success, message?, ...}` envelope. A non-2xx status
    /// or `success:false` becomes `RequestFailed` carrying the server
    /// message when there is one.
    async fn read_envelope(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(ApiError::RequestFailed {
                    message: format!("{fallback} (HTTP {status})"),
                })
            }
            Err(e) => return Err(Self::map_send_error(e)),
        };

        let success = body.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
        if !status.is_success() || !success {
            let message = body
                .get("message")
                .and_then(|v| v.as_str())
                .filter(|m| !m.trim().is_empty())
                .map(|m| m.to_string())
                .unwrap_or_else(|| fallback.to_string());
            return Err(ApiError::RequestFailed { message });
        }
        Ok(body)
    }

    async fn fetch_page_once<R: ListRecord>(
        &self,
        query: &ListQuery,
    ) -> Result<Page<R>, ApiError> {
        let response = self
            .http
            .get(self.url(&R::KIND.list_path()))
            .query(&query.to_pairs())
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let kind = R::KIND;
        let body =
            Self::read_envelope(response, &format!("failed to fetch {}", kind.plural())).await?;

        let items_raw = body
            .get(kind.items_key())
            .cloned()
            .unwrap_or(serde_json::Value::Array(Vec::new()));
        let items: Vec<R> =
            serde_json::from_value(items_raw).map_err(|e| ApiError::InvalidResponse {
                message: format!("bad {} array: {e}", kind.items_key()),
            })?;
        let total_count = body.get("total").and_then(|v| v.as_u64()).unwrap_or(0);

        Ok(Page {
            items,
            current_page: query.page(),
            total_pages: query::total_pages(total_count, query.limit()),
            total_count,
        })
    }

    /// Paginated list fetch. Timeouts are retried with doubling
    /// backoff up to the configured bound; anything left after that
    /// surfaces as `FetchFailed` so the caller can degrade to an
    /// empty page instead of crashing the view.
    pub async fn list<R: ListRecord>(&self, query: &ListQuery) -> Result<Page<R>, ApiError> {
        let mut attempts = 0u32;
        let mut delay = self.backoff;
        loop {
            attempts += 1;
            match self.fetch_page_once::<R>(query).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_timeout() && attempts <= self.retries => {
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    return Err(ApiError::FetchFailed {
                        attempts,
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    async fn mutate(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
        fallback: &str,
    ) -> Result<Ack, ApiError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(Self::map_send_error)?;
        let envelope = Self::read_envelope(response, fallback).await?;
        Ok(Ack {
            message: envelope
                .get("message")
                .and_then(|v| v.as_str())
                .map(|m| m.to_string()),
        })
    }

    pub async fn create<R: ListRecord>(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Ack, ApiError> {
        let kind = R::KIND;
        self.mutate(
            reqwest::Method::POST,
            &kind.register_path(),
            Some(payload),
            &format!("failed to register {}", kind.singular()),
        )
        .await
    }

    pub async fn update<R: ListRecord>(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Ack, ApiError> {
        let kind = R::KIND;
        self.mutate(
            reqwest::Method::PUT,
            &kind.update_path(),
            Some(payload),
            &format!("failed to update {}", kind.singular()),
        )
        .await
    }

    pub async fn delete_one<R: ListRecord>(&self, id: RecordId) -> Result<Ack, ApiError> {
        let kind = R::KIND;
        self.mutate(
            reqwest::Method::DELETE,
            &kind.delete_path(id),
            None,
            &format!("failed to delete {}", kind.singular()),
        )
        .await
    }

    pub async fn delete_bulk<R: ListRecord>(&self, ids: &[RecordId]) -> Result<Ack, ApiError> {
        let kind = R::KIND;
        let body = serde_json::json!({ "ids": ids });
        self.mutate(
            reqwest::Method::DELETE,
            &kind.bulk_delete_path(),
            Some(&body),
            &format!("failed to delete selected {}", kind.plural()),
        )
        .await
    }

    pub async fn grade_sections(&self) -> Result<GradeSections, ApiError> {
        let response = self
            .http
            .get(self.url("grade-sections"))
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let body = Self::read_envelope(response, "failed to fetch grade sections").await?;
        serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse {
            message: format!("bad grade-sections payload: {e}"),
        })
    }

    /// Per-status entry counts for the summary view. Filters follow
    /// the list encoding rules: absent filters are not sent.
    pub async fn entry_status(
        &self,
        filters: &[(String, String)],
    ) -> Result<StatusBreakdown, ApiError> {
        let pairs: Vec<_> = filters
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let response = self
            .http
            .get(self.url("entry/status"))
            .query(&pairs)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RequestFailed {
                message: format!("failed to fetch entry status (HTTP {status})"),
            });
        }
        response
            .json::<StatusBreakdown>()
            .await
            .map_err(Self::map_send_error)
    }

    /// One poll of the enrollment device; callers loop on this until
    /// both values arrive or their deadline passes.
    pub async fn fetch_biometric(&self) -> Result<BiometricReading, ApiError> {
        let response = self
            .http
            .get(self.url("arduino/fetch-biometric"))
            .send()
            .await
            .map_err(Self::map_send_error)?;
        response
            .json::<BiometricReading>()
            .await
            .map_err(Self::map_send_error)
    }

    pub async fn get_settings(&self) -> Result<Settings, ApiError> {
        let response = self
            .http
            .get(self.url("settings"))
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let body = Self::read_envelope(response, "failed to load settings").await?;
        let settings = body
            .get("settings")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        Settings::from_wire(&settings).ok_or_else(|| ApiError::InvalidResponse {
            message: "settings payload missing late_threshold".to_string(),
        })
    }

    pub async fn update_settings(&self, settings: &Settings) -> Result<Ack, ApiError> {
        let body = settings.to_wire();
        self.mutate(
            reqwest::Method::POST,
            "update-settings",
            Some(&body),
            "failed to update settings",
        )
        .await
    }

    pub async fn change_password(
        &self,
        current_username: &str,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<Ack, ApiError> {
        let body = serde_json::json!({
            "current_username": current_username,
            "username": username,
            "current_password": current_password,
            "new_password": new_password,
        });
        self.mutate(
            reqwest::Method::POST,
            "auth/change-password",
            Some(&body),
            "failed to change password",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Student;

    // A bound socket that is never accepted: connects land in the
    // kernel backlog and every request hangs until the client timeout.
    fn silent_server() -> (std::net::TcpListener, String) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/api/v1", listener.local_addr().unwrap());
        (listener, base_url)
    }

    fn stalled_client(base_url: String, retries: u32) -> ApiClient {
        ApiClient::new(ApiOptions {
            base_url,
            timeout: Duration::from_millis(200),
            retries,
            backoff: Duration::from_millis(10),
            proxy: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn list_retries_timeouts_and_reports_the_attempt_count() {
        let (_listener, base_url) = silent_server();
        let client = stalled_client(base_url, 2);

        let err = client
            .list::<Student>(&ListQuery::default())
            .await
            .unwrap_err();
        match err {
            ApiError::FetchFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mutations_time_out_after_a_single_attempt() {
        let (_listener, base_url) = silent_server();
        let client = stalled_client(base_url, 3);

        let started = std::time::Instant::now();
        let err = client.delete_one::<Student>(RecordId(5)).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout), "got {err:?}");
        // three retries would stack four timeout windows plus backoff
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[test]
    fn backoff_doubles_from_base() {
        let delays = backoff_delays(3, Duration::from_secs(2));
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new(ApiOptions {
            base_url: "https://example.test/api/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.url("students/register"),
            "https://example.test/api/v1/students/register"
        );
        assert_eq!(client.url("/settings"), "https://example.test/api/v1/settings");
    }
}
