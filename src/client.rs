use crate::config::CollectorConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const USER_AGENT: &str = "agents-census/0.3";

/// Network-level failure: the request never produced an HTTP status.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        HttpRequest {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        HttpRequest {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// `x-ratelimit-reset`, epoch seconds.
    pub rate_limit_reset: Option<i64>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_throttled(&self) -> bool {
        self.status == 403 || self.status == 429
    }
}

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Source of time and of every delay the collector takes.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Blocking transport against api.github.com with a bearer token.
pub struct GitHubTransport {
    http: reqwest::blocking::Client,
    token: String,
}

impl GitHubTransport {
    pub fn new(token: String) -> Result<Self, TransportError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError {
                url: USER_AGENT.to_string(),
                message: format!("can't create HTTP client: {}", e),
            })?;
        Ok(GitHubTransport { http, token })
    }
}

impl Transport for GitHubTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };
        let mut builder = builder
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let failed = |e: reqwest::Error| TransportError {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let resp = builder.send().map_err(failed)?;
        let status = resp.status().as_u16();
        let rate_limit_reset = resp
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok());
        let body = resp.text().map_err(failed)?;

        Ok(HttpResponse {
            status,
            rate_limit_reset,
            body,
        })
    }
}

/// Outcome of a single send.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Response(HttpResponse),
    Throttled(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    pub fallback_wait: Duration,
    pub reset_margin: Duration,
}

impl ThrottlePolicy {
    pub fn from_config(config: &CollectorConfig) -> Self {
        ThrottlePolicy {
            fallback_wait: config.fallback_wait(),
            reset_margin: config.reset_margin(),
        }
    }

    /// `reset - now + margin` when the reset hint is known, the fallback otherwise.
    /// Never shorter than the margin, even when the reset time has already passed.
    pub fn wait_for(&self, reset_epoch_secs: Option<i64>, now: DateTime<Utc>) -> Duration {
        match reset_epoch_secs {
            Some(reset) => {
                let margin_ms = self.reset_margin.as_millis() as i64;
                let wait_ms = reset
                    .saturating_mul(1000)
                    .saturating_sub(now.timestamp_millis())
                    .saturating_add(margin_ms);
                Duration::from_millis(wait_ms.max(margin_ms) as u64)
            }
            None => self.fallback_wait,
        }
    }
}

/// Wraps a transport with throttle detection. Only 403 and 429 are treated as throttling.
pub struct RateLimitedClient<T, C> {
    transport: T,
    clock: C,
    policy: ThrottlePolicy,
}

impl<T: Transport, C: Clock> RateLimitedClient<T, C> {
    pub fn new(transport: T, clock: C, policy: ThrottlePolicy) -> Self {
        RateLimitedClient {
            transport,
            clock,
            policy,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn attempt(&self, request: &HttpRequest) -> Result<Attempt, TransportError> {
        let resp = self.transport.send(request)?;
        if resp.is_throttled() {
            let wait = self.policy.wait_for(resp.rate_limit_reset, self.clock.now());
            return Ok(Attempt::Throttled(wait));
        }
        Ok(Attempt::Response(resp))
    }

    /// Sends `request`, sleeping through throttling and re-sending the identical request
    /// until a non-throttled response arrives. Transport errors are returned unchanged.
    pub fn call(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        loop {
            match self.attempt(request)? {
                Attempt::Response(resp) => return Ok(resp),
                Attempt::Throttled(wait) => {
                    warn!(
                        url = %request.url,
                        wait_secs = wait.as_secs_f64().ceil() as u64,
                        "rate limit hit, waiting before retrying"
                    );
                    self.clock.sleep(wait);
                }
            }
        }
    }

    pub fn pause(&self, duration: Duration) {
        self.clock.sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClock, ScriptedTransport};

    fn policy() -> ThrottlePolicy {
        ThrottlePolicy::from_config(&CollectorConfig::default())
    }

    #[test]
    fn wait_uses_reset_hint_plus_margin() {
        let clock = FakeClock::default();
        let reset = clock.now().timestamp() + 5;
        assert_eq!(
            policy().wait_for(Some(reset), clock.now()),
            Duration::from_secs(6)
        );
    }

    #[test]
    fn wait_falls_back_without_hint_and_never_drops_below_the_margin() {
        let clock = FakeClock::default();
        assert_eq!(policy().wait_for(None, clock.now()), Duration::from_secs(60));
        let long_past = clock.now().timestamp() - 600;
        assert_eq!(
            policy().wait_for(Some(long_past), clock.now()),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn stale_reset_hint_still_waits_between_retries() {
        let clock = FakeClock::default();
        let stale = clock.now().timestamp() - 30;
        let throttled = HttpResponse {
            status: 403,
            rate_limit_reset: Some(stale),
            body: String::new(),
        };
        let mut replies = vec![Ok(throttled); 4];
        replies.push(Ok(HttpResponse {
            status: 200,
            rate_limit_reset: None,
            body: "{}".to_string(),
        }));
        let client = RateLimitedClient::new(ScriptedTransport::new(replies), clock, policy());

        let resp = client.call(&HttpRequest::get("https://api.github.com/search/code?q=x")).unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(client.clock().sleeps(), vec![Duration::from_secs(1); 4]);
        assert_eq!(client.transport().requests().len(), 5);
    }

    #[test]
    fn call_retries_the_identical_request_after_throttling() {
        let clock = FakeClock::default();
        let reset = clock.now().timestamp() + 5;
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse {
                status: 429,
                rate_limit_reset: Some(reset),
                body: String::new(),
            }),
            Ok(HttpResponse {
                status: 403,
                rate_limit_reset: None,
                body: String::new(),
            }),
            Ok(HttpResponse {
                status: 200,
                rate_limit_reset: None,
                body: "{}".to_string(),
            }),
        ]);
        let client = RateLimitedClient::new(transport, clock, policy());

        let request = HttpRequest::get("https://api.github.com/search/code?q=x&page=3");
        let resp = client.call(&request).unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(
            client.clock().sleeps(),
            vec![Duration::from_secs(6), Duration::from_secs(60)]
        );
        assert_eq!(client.transport().requests(), vec![request.clone(); 3]);
    }

    #[test]
    fn call_does_not_retry_other_failures() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse {
            status: 500,
            rate_limit_reset: None,
            body: String::new(),
        })]);
        let client = RateLimitedClient::new(transport, FakeClock::default(), policy());

        let resp = client.call(&HttpRequest::get("https://example.test")).unwrap();
        assert_eq!(resp.status, 500);
        assert!(client.clock().sleeps().is_empty());
        assert_eq!(client.transport().requests().len(), 1);
    }
}
