//! Retry policy and response classification shared by every endpoint.
//!
//! # Overview
//! Each logical call is sent, then its status is classified:
//! - `2xx` is a success;
//! - a status in the policy's retryable set is retried while attempts remain;
//! - anything else is a terminal rejection and is returned immediately.
//!
//! Two presets cover the ways the server is usually called:
//! [`RetryPolicy::per_call`] retries any `5xx` straight away, and
//! [`RetryPolicy::transport`] retries `429`/`500`/`502`/`503`/`504` and
//! connection failures with exponential backoff. The transport preset only
//! retries idempotent methods (`GET`, `PUT`, `DELETE`) and waits for the
//! server's `Retry-After` seconds on `413`/`429`/`503` when one is sent.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use bassa_core::retry::{Backoff, RetryPolicy};
//!
//! let policy = RetryPolicy::transport(3, Duration::from_millis(500));
//! assert_eq!(policy.max_attempts(), 4);
//! assert_eq!(policy.backoff().delay(1), Duration::ZERO);
//! assert_eq!(policy.backoff().delay(2), Duration::from_secs(1));
//! assert_eq!(policy.backoff().delay(3), Duration::from_secs(2));
//!
//! let once = RetryPolicy::from_budget(-1);
//! assert_eq!(once.max_attempts(), 1);
//! assert_eq!(*once.backoff(), Backoff::None);
//! ```

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::BassaError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Retries granted by [`RetryPolicy::default`].
pub const DEFAULT_RETRIES: u32 = 1;

/// Statuses retried by the transport-level preset.
pub const TRANSPORT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Methods the transport preset is allowed to resend.
pub const IDEMPOTENT_METHODS: [HttpMethod; 3] =
    [HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete];

/// Statuses whose `Retry-After` header is honored.
pub const RETRY_AFTER_STATUSES: [u16; 3] = [413, 429, 503];

/// Upper bound on a single exponential backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Delay inserted before each retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the same amount before every retry.
    Constant(Duration),
    /// Retry the first time immediately, then wait `factor * 2^(n - 1)`
    /// before the n-th retry, capped at `max`.
    Exponential { factor: Duration, max: Duration },
}

impl Backoff {
    /// Delay before the `retry`-th retry (1-indexed).
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Constant(delay) => *delay,
            Backoff::Exponential { .. } if retry <= 1 => Duration::ZERO,
            Backoff::Exponential { factor, max } => {
                let multiplier = 2u32.saturating_pow(retry - 1);
                factor.saturating_mul(multiplier).min(*max)
            }
        }
    }
}

/// Which statuses count as transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOn {
    /// Every `5xx` status.
    ServerErrors,
    /// Exactly the listed statuses.
    Statuses(Vec<u16>),
}

impl RetryOn {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            RetryOn::ServerErrors => (500..600).contains(&status),
            RetryOn::Statuses(statuses) => statuses.contains(&status),
        }
    }
}

/// How a single response is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Retry,
    Reject,
}

/// What happens after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send the request again after `delay`; `attempt` is the upcoming attempt number.
    Retry { delay: Duration, attempt: u32 },
    /// No attempts left.
    GiveUp,
}

/// Bounded retry strategy for one logical call.
///
/// A policy with `max_retries = n` sends a request at most `n + 1` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
    retry_on: RetryOn,
    retry_transport_errors: bool,
    /// `None` resends any method.
    retry_methods: Option<Vec<HttpMethod>>,
    respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::per_call(DEFAULT_RETRIES)
    }
}

impl RetryPolicy {
    /// Retry any `5xx` up to `retries` times with no delay. Transport
    /// failures are returned as-is.
    pub fn per_call(retries: u32) -> Self {
        Self {
            max_retries: retries,
            backoff: Backoff::None,
            retry_on: RetryOn::ServerErrors,
            retry_transport_errors: false,
            retry_methods: None,
            respect_retry_after: false,
        }
    }

    /// Build a per-call policy from a signed retry budget.
    ///
    /// A negative budget (conventionally `-1`) means "stop retrying": the
    /// request is sent exactly once.
    pub fn from_budget(budget: i64) -> Self {
        let retries = u32::try_from(budget.max(0)).unwrap_or(u32::MAX);
        Self::per_call(retries)
    }

    /// Retry `429`, `500`, `502`, `503`, `504` and connection failures up to
    /// `total` times, backing off exponentially from `backoff_factor`.
    ///
    /// `POST` is never resent: a failed write surfaces on the first attempt.
    pub fn transport(total: u32, backoff_factor: Duration) -> Self {
        Self {
            max_retries: total,
            backoff: Backoff::Exponential {
                factor: backoff_factor,
                max: MAX_BACKOFF,
            },
            retry_on: RetryOn::Statuses(TRANSPORT_RETRY_STATUSES.to_vec()),
            retry_transport_errors: true,
            retry_methods: Some(IDEMPOTENT_METHODS.to_vec()),
            respect_retry_after: true,
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Restrict retries to `methods`, or allow every method with `None`.
    #[must_use]
    pub fn with_retry_methods(mut self, methods: Option<Vec<HttpMethod>>) -> Self {
        self.retry_methods = methods;
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn retries_transport_errors(&self) -> bool {
        self.retry_transport_errors
    }

    pub fn retries_method(&self, method: HttpMethod) -> bool {
        self.retry_methods
            .as_ref()
            .map_or(true, |methods| methods.contains(&method))
    }

    /// Server-requested delay, in whole seconds, if this policy honors it.
    pub fn retry_after(&self, response: &HttpResponse) -> Option<Duration> {
        if !self.respect_retry_after || !RETRY_AFTER_STATUSES.contains(&response.status) {
            return None;
        }
        response
            .header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn classify(&self, status: u16) -> Verdict {
        if (200..300).contains(&status) {
            Verdict::Success
        } else if self.retry_on.matches(status) {
            Verdict::Retry
        } else {
            Verdict::Reject
        }
    }

    /// Decide what to do after attempt number `attempt` (1-indexed) failed
    /// with a retryable outcome.
    pub fn after_failure(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts() {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.backoff.delay(attempt),
            attempt: attempt + 1,
        }
    }
}

enum Failure {
    Status {
        status: u16,
        retry_after: Option<Duration>,
    },
    Transport(BassaError),
}

/// Send `request` through `transport` until it succeeds, is rejected, or
/// the policy runs out of attempts.
#[instrument(skip_all, fields(method = %request.method, url = %request.url))]
pub(crate) fn send_with_retry<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: &HttpRequest,
) -> Result<HttpResponse, BassaError>
where
    T: Transport + ?Sized,
{
    let mut attempt = 1;
    loop {
        let failure = match transport.send(request) {
            Ok(response) => {
                debug!(attempt, status = response.status, "response received");
                match policy.classify(response.status) {
                    Verdict::Success => return Ok(response),
                    Verdict::Retry if policy.retries_method(request.method) => Failure::Status {
                        status: response.status,
                        retry_after: policy.retry_after(&response),
                    },
                    Verdict::Retry | Verdict::Reject => {
                        return Err(BassaError::ServerRejected {
                            status: response.status,
                            body: response.body,
                        })
                    }
                }
            }
            Err(err @ BassaError::Transport { .. })
                if policy.retries_transport_errors() && policy.retries_method(request.method) =>
            {
                Failure::Transport(err)
            }
            Err(err) => return Err(err),
        };

        match policy.after_failure(attempt) {
            RetryDecision::Retry { delay, attempt: next } => {
                let delay = match &failure {
                    Failure::Status {
                        retry_after: Some(requested),
                        ..
                    } => *requested,
                    _ => delay,
                };
                match &failure {
                    Failure::Status { status, .. } => warn!(
                        attempt,
                        max_attempts = policy.max_attempts(),
                        status,
                        ?delay,
                        "transient status, retrying"
                    ),
                    Failure::Transport(err) => warn!(
                        attempt,
                        max_attempts = policy.max_attempts(),
                        error = %err,
                        ?delay,
                        "transport failure, retrying"
                    ),
                }
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt = next;
            }
            RetryDecision::GiveUp => {
                return Err(match failure {
                    Failure::Status { status, .. } => BassaError::RetriesExhausted {
                        attempts: attempt,
                        last_status: Some(status),
                    },
                    Failure::Transport(err) => err,
                });
            }
        }
    }
}
