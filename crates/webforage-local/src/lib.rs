use std::time::Duration;
use webforage_core::{Error, FetchBackend, FetchRequest, FetchResponse, Result};

pub mod expand;
pub mod extract;
pub mod links;
pub mod robots;
pub mod search;
pub mod textprep;

/// Compatible-token agent string; search surfaces and robots checks both see it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; webforage/0.1)";

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn default_user_agent() -> String {
    env("WEBFORAGE_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}

#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl LocalFetcher {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(default_user_agent())
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Result<Self> {
        let user_agent = user_agent.into();
        let client = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            // Client-wide ceilings so DNS/TLS/body stalls cannot hang a run.
            // Per-request timeouts (FetchRequest.timeout_ms) override within them.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client, user_agent })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let t_req = std::time::Instant::now();
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status,
            content_type,
            bytes,
            truncated,
            elapsed_ms: t_req.elapsed().as_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, response::Redirect, routing::get, Router};
    use std::net::SocketAddr;
    use std::sync::Mutex;

    // Env vars are process-global; serialize tests that mutate them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn fetch_truncates_body_at_max_bytes() {
        let app = Router::new().route(
            "/",
            get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "x".repeat(10_000)) }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let req = FetchRequest {
            url: format!("http://{}/", addr),
            timeout_ms: Some(2_000),
            max_bytes: Some(512),
        };
        let resp = fetcher.fetch(&req).await.unwrap();
        assert!(resp.truncated);
        assert_eq!(resp.bytes.len(), 512);
    }

    #[tokio::test]
    async fn fetch_reports_final_url_after_redirect() {
        let app = Router::new()
            .route("/", get(|| async { Redirect::permanent("/target") }))
            .route("/target", get(|| async { "landed" }));
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let req = FetchRequest {
            url: format!("http://{}/", addr),
            timeout_ms: Some(2_000),
            max_bytes: Some(10_000),
        };
        let resp = fetcher.fetch(&req).await.unwrap();
        assert_eq!(resp.url, format!("http://{}/", addr));
        assert!(resp.final_url.ends_with("/target"));
        assert_eq!(resp.text_lossy(), "landed");
    }

    #[tokio::test]
    async fn fetch_passes_through_error_status_as_ok() {
        let app = Router::new().route(
            "/missing",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "gone") }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let req = FetchRequest {
            url: format!("http://{}/missing", addr),
            timeout_ms: Some(2_000),
            max_bytes: Some(10_000),
        };
        let resp = fetcher.fetch(&req).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn fetch_sends_configured_user_agent() {
        let app = Router::new().route(
            "/",
            get(|headers: axum::http::HeaderMap| async move {
                headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string()
            }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::with_user_agent("webforage-test/9.9").unwrap();
        let req = FetchRequest {
            url: format!("http://{}/", addr),
            timeout_ms: Some(2_000),
            max_bytes: Some(10_000),
        };
        let resp = fetcher.fetch(&req).await.unwrap();
        assert_eq!(resp.text_lossy(), "webforage-test/9.9");
    }

    #[test]
    fn default_user_agent_honors_env_override() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let prev = std::env::var("WEBFORAGE_USER_AGENT").ok();

        std::env::set_var("WEBFORAGE_USER_AGENT", "custom-agent/1.0");
        assert_eq!(default_user_agent(), "custom-agent/1.0");

        std::env::set_var("WEBFORAGE_USER_AGENT", "   ");
        assert_eq!(default_user_agent(), DEFAULT_USER_AGENT);

        match prev {
            Some(v) => std::env::set_var("WEBFORAGE_USER_AGENT", v),
            None => std::env::remove_var("WEBFORAGE_USER_AGENT"),
        }
    }
}
