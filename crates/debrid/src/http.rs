//! Shared HTTP transport for debrid providers
//!
//! One retry ladder for every provider client:
//! - 429: exponential backoff starting at 2 s, doubling, up to 5 attempts
//! - other 4xx: fail fast, no retry
//! - 5xx / connection error / timeout: up to 5 attempts with backoff
//! - malformed JSON on success: logged, treated as an empty response
//!
//! Rate-limit scopes are acquired before the first attempt.

use crate::rate_limiter::RateLimiter;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, error, warn};

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub enum RequestBody {
    None,
    Json(Value),
    Form(Vec<(String, String)>),
}

pub struct DebridHttp {
    client: Client,
    limiter: RateLimiter,
    service: String,
}

impl DebridHttp {
    pub fn new(client: Client, service: impl Into<String>) -> Self {
        DebridHttp {
            client,
            limiter: RateLimiter::new(),
            service: service.into(),
        }
    }

    pub fn with_limiter(client: Client, service: impl Into<String>, limiter: RateLimiter) -> Self {
        DebridHttp {
            client,
            limiter,
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub async fn get_json(&self, url: &str, headers: &[(String, String)]) -> Result<Option<Value>> {
        self.request_json(Method::GET, url, headers, &RequestBody::None)
            .await
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Value,
    ) -> Result<Option<Value>> {
        self.request_json(Method::POST, url, headers, &RequestBody::Json(body))
            .await
    }

    pub async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        form: Vec<(String, String)>,
    ) -> Result<Option<Value>> {
        self.request_json(Method::POST, url, headers, &RequestBody::Form(form))
            .await
    }

    pub async fn request_json(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: &RequestBody,
    ) -> Result<Option<Value>> {
        self.limiter.acquire_for(url).await;

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), url)
                .timeout(Duration::from_secs(20));
            for (name, value) in headers {
                request = request.header(name, value);
            }
            request = match body {
                RequestBody::None => request,
                RequestBody::Json(json) => request.json(json),
                RequestBody::Form(form) => request.form(form),
            };

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return match response.json::<Value>().await {
                            Ok(value) => Ok(Some(value)),
                            Err(e) => {
                                error!("{}: invalid JSON response: {e}", self.service);
                                Ok(None)
                            }
                        };
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= MAX_ATTEMPTS {
                            return Err(StreamarrError::ProviderTransient {
                                service: self.service.clone(),
                                error: "rate limited past retry budget".to_string(),
                            });
                        }
                        warn!(
                            "{}: rate limited (attempt {attempt}/{MAX_ATTEMPTS}), waiting {backoff:?}",
                            self.service
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                        continue;
                    }
                    if status.is_client_error() {
                        error!("{}: client error HTTP {status} for {url}", self.service);
                        return Err(StreamarrError::ProviderClientError {
                            service: self.service.clone(),
                            status: status.as_u16(),
                        });
                    }
                    // 5xx
                    if attempt >= MAX_ATTEMPTS {
                        return Err(StreamarrError::ProviderTransient {
                            service: self.service.clone(),
                            error: format!("HTTP {status} after {attempt} attempts"),
                        });
                    }
                    warn!(
                        "{}: server error HTTP {status} (attempt {attempt}/{MAX_ATTEMPTS}), retrying in {backoff:?}",
                        self.service
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(if e.is_timeout() {
                            StreamarrError::Timeout {
                                operation: format!("{} request", self.service),
                            }
                        } else {
                            StreamarrError::ProviderTransient {
                                service: self.service.clone(),
                                error: e.to_string(),
                            }
                        });
                    }
                    warn!(
                        "{}: connection error (attempt {attempt}/{MAX_ATTEMPTS}): {e}, retrying in {backoff:?}",
                        self.service
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

/// Poll `check` at `interval` until it reports ready or `timeout` passes.
pub async fn wait_for_ready<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            debug!("readiness wait timed out after {timeout:?}");
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> DebridHttp {
        DebridHttp::new(Client::new(), "test-provider")
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_then_200_succeeds_after_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let result = http()
            .get_json(&format!("{}/check", server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(result.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_4xx_fails_fast_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let result = http().get_json(&format!("{}/check", server.uri()), &[]).await;
        assert!(matches!(
            result,
            Err(StreamarrError::ProviderClientError { status: 403, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_5xx_retried_then_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(502))
            .expect(5)
            .mount(&server)
            .await;

        let result = http().get_json(&format!("{}/check", server.uri()), &[]).await;
        assert!(matches!(
            result,
            Err(StreamarrError::ProviderTransient { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_json_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let result = http()
            .get_json(&format!("{}/check", server.uri()), &[])
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_ready_polls_until_true() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let ready = wait_for_ready(Duration::from_secs(10), Duration::from_secs(1), move || {
            let calls = calls_clone.clone();
            async move { calls.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;
        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
