//! Two-tier retrying request executor.
//!
//! Separates a server hiccup from an expired session: failures are retried
//! on a fixed interval inside a time window; once a window is spent the
//! failure is treated as session expiry and a re-login is forced, up to a
//! bounded number of re-logins. Exhausting that budget is a tagged error,
//! never an empty result.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::session::{AuthError, Session, SessionProvider};

/// Retry policy for one logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of re-logins before giving up.
    pub max_relogins: u32,
    /// Local-retry window; failures past this force a re-login.
    pub window_timeout: Duration,
    /// Sleep between local retries inside a window.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_relogins: 10,
            window_timeout: Duration::from_secs(300),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Terminal failure of an executed request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Every re-login window was spent without a successful response.
    #[error("{desc}: retry budget exhausted after {relogins} re-logins")]
    RetryBudgetExhausted { desc: String, relogins: u32 },

    /// A forced re-login could not obtain a session. Fatal to the request:
    /// without a session there is nothing left to retry with.
    #[error("{desc}: re-login failed: {source}")]
    Relogin {
        desc: String,
        #[source]
        source: AuthError,
    },
}

/// Executes single calls under the two-tier retry policy.
///
/// Holds a reference to the session provider so a re-login yields a fresh
/// session value, written through the caller's `&mut Session`. The caller's
/// loop adopts the replacement explicitly; there is no process-wide session.
pub struct RequestExecutor<'a, P: SessionProvider> {
    provider: &'a P,
    policy: RetryPolicy,
}

impl<'a, P: SessionProvider> RequestExecutor<'a, P> {
    pub fn new(provider: &'a P, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Run `op` until it succeeds or the re-login budget is spent.
    ///
    /// `op` is rebuilt from the current session on every attempt, so the
    /// attempt after a re-login already runs under the fresh session.
    /// `desc` names the call in logs and errors.
    pub async fn execute<T, F, Fut>(
        &self,
        session: &mut Session,
        desc: &str,
        op: F,
    ) -> Result<T, RequestError>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let mut relogins = 0u32;
        let mut window_start = Instant::now();

        loop {
            match op(session.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let elapsed = window_start.elapsed();
                    if elapsed < self.policy.window_timeout {
                        debug!(call = desc, error = %e, ?elapsed, "request failed, retrying");
                        tokio::time::sleep(self.policy.retry_delay).await;
                        continue;
                    }

                    if relogins >= self.policy.max_relogins {
                        warn!(call = desc, relogins, error = %e, "retry budget exhausted");
                        return Err(RequestError::RetryBudgetExhausted {
                            desc: desc.to_string(),
                            relogins,
                        });
                    }

                    relogins += 1;
                    warn!(
                        call = desc,
                        relogin = relogins,
                        error = %e,
                        "retry window spent, forcing re-login"
                    );
                    let fresh = self.provider.sign_in().await.map_err(|source| {
                        RequestError::Relogin {
                            desc: desc.to_string(),
                            source,
                        }
                    })?;
                    *session = fresh;
                    window_start = Instant::now();
                }
            }
        }
    }
}
