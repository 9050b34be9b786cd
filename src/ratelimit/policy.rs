//! Rate Limit Policy Module
//!
//! Window, quota, key derivation and bypass rules for one limiter instance.

use std::fmt;
use std::sync::Arc;

use axum::extract::Request;

use crate::config::Config;
use crate::error::PolicyError;
use crate::ratelimit::client::{authenticated_user, client_ip};

/// Body message of a 429 response when none is configured.
pub const DEFAULT_MESSAGE: &str = "Too many requests, please try again later.";

/// Derives a bucket key from a request.
pub type KeyGenerator = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Returns true for requests that bypass limiting entirely.
pub type SkipPredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

// == Key Strategy ==
/// How a request is mapped to its counter bucket.
#[derive(Clone, Default)]
pub enum KeyStrategy {
    /// Client IP address
    #[default]
    Ip,
    /// Authenticated user id, falling back to the client IP
    User,
    /// Client IP combined with the request path
    IpAndEndpoint,
    /// Caller-supplied generator
    Custom(KeyGenerator),
}

impl KeyStrategy {
    pub fn key_for(&self, request: &Request) -> String {
        match self {
            KeyStrategy::Ip => client_ip(request),
            KeyStrategy::User => match authenticated_user(request) {
                Some(user) => format!("user:{}", user),
                None => client_ip(request),
            },
            KeyStrategy::IpAndEndpoint => {
                format!("{}:{}", client_ip(request), request.uri().path())
            }
            KeyStrategy::Custom(generator) => generator(request),
        }
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::Ip => f.write_str("Ip"),
            KeyStrategy::User => f.write_str("User"),
            KeyStrategy::IpAndEndpoint => f.write_str("IpAndEndpoint"),
            KeyStrategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

// == Rate Limit Policy ==
/// Immutable fixed-window policy, shared by every request through a limiter.
#[derive(Clone)]
pub struct RateLimitPolicy {
    window_ms: u64,
    max_requests: u64,
    message: String,
    key_strategy: KeyStrategy,
    skip: Option<SkipPredicate>,
}

impl RateLimitPolicy {
    pub fn builder() -> RateLimitPolicyBuilder {
        RateLimitPolicyBuilder::default()
    }

    /// Policy using the window and quota from `config`.
    pub fn from_config(config: &Config) -> Result<Self, PolicyError> {
        Self::builder()
            .window_ms(config.rate_limit_window_ms)
            .max_requests(config.rate_limit_max_requests)
            .build()
    }

    // == Presets ==
    /// General API traffic: 100 requests per 15 minutes per IP.
    pub fn api() -> Self {
        Self::preset(15 * 60 * 1000, 100, KeyStrategy::Ip, DEFAULT_MESSAGE)
    }

    /// Login and password reset: 5 attempts per 15 minutes per IP and route.
    pub fn auth() -> Self {
        Self::preset(
            15 * 60 * 1000,
            5,
            KeyStrategy::IpAndEndpoint,
            "Too many authentication attempts, please try again later.",
        )
    }

    /// Chat messages: 30 per minute per user.
    pub fn chat() -> Self {
        Self::preset(
            60 * 1000,
            30,
            KeyStrategy::User,
            "Too many messages, please slow down.",
        )
    }

    fn preset(window_ms: u64, max_requests: u64, key_strategy: KeyStrategy, message: &str) -> Self {
        Self {
            window_ms,
            max_requests,
            message: message.to_string(),
            key_strategy,
            skip: None,
        }
    }

    /// Returns a copy of this policy that bypasses requests matching `skip`.
    pub fn with_skip<F>(mut self, skip: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(skip));
        self
    }

    // == Accessors ==
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Window length in whole seconds, rounded up.
    pub fn window_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn key_strategy(&self) -> &KeyStrategy {
        &self.key_strategy
    }

    /// Bucket key for `request`, before the `ratelimit:` prefix.
    pub fn key_for(&self, request: &Request) -> String {
        self.key_strategy.key_for(request)
    }

    pub fn should_skip(&self, request: &Request) -> bool {
        self.skip.as_ref().is_some_and(|skip| skip(request))
    }
}

impl fmt::Debug for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitPolicy")
            .field("window_ms", &self.window_ms)
            .field("max_requests", &self.max_requests)
            .field("message", &self.message)
            .field("key_strategy", &self.key_strategy)
            .field("skip", &self.skip.is_some())
            .finish()
    }
}

// == Builder ==
/// Builder for [`RateLimitPolicy`]; `build` rejects a zero window or quota.
#[derive(Default)]
pub struct RateLimitPolicyBuilder {
    window_ms: Option<u64>,
    max_requests: Option<u64>,
    message: Option<String>,
    key_strategy: KeyStrategy,
    skip: Option<SkipPredicate>,
}

impl RateLimitPolicyBuilder {
    pub fn window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = Some(window_ms);
        self
    }

    pub fn max_requests(mut self, max_requests: u64) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn key_strategy(mut self, key_strategy: KeyStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    /// Uses `generator` to derive bucket keys.
    pub fn key_generator<F>(self, generator: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.key_strategy(KeyStrategy::Custom(Arc::new(generator)))
    }

    pub fn skip<F>(mut self, skip: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(skip));
        self
    }

    pub fn build(self) -> Result<RateLimitPolicy, PolicyError> {
        let defaults = Config::default();
        let window_ms = self.window_ms.unwrap_or(defaults.rate_limit_window_ms);
        let max_requests = self.max_requests.unwrap_or(defaults.rate_limit_max_requests);

        if window_ms == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        if max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests);
        }

        Ok(RateLimitPolicy {
            window_ms,
            max_requests,
            message: self.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            key_strategy: self.key_strategy,
            skip: self.skip,
        })
    }
}
