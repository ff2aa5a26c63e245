//! In-memory fixed-window rate limiting middleware.
//!
//! Each client key (peer IP) gets a request counter that resets at discrete
//! window boundaries. The window map is the only shared mutable state in the
//! whole request path, so its consistency story lives here: the
//! read-check-increment sequence runs as one critical section under a single
//! [`std::sync::Mutex`]. The lock is held only for the map bookkeeping and
//! never across an `.await`, so contention is bounded by a few hash
//! operations per request. Under concurrent load from one key with limit K,
//! exactly K requests are accepted — an increment can never be lost and two
//! racing requests can never both observe the last free slot.
//!
//! Limits are fixed at construction time; there is no runtime reload. Window
//! entries are created lazily and never evicted, so the map grows with the
//! number of distinct client keys seen.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;
use tokio::time::Instant;

use crate::{
    Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

// Per-client window state, created lazily on first request.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

// Outcome of consulting the limiter for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accept { remaining: u32, reset_in: Duration },
    Reject { retry_after: Duration },
}

/// Fixed-window request limiter, one counter per client key.
///
/// Injected into the pipeline at construction time by the composition root —
/// never process-wide implicit state.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use modulith::security::RateLimitMiddleware;
///
/// // 60 requests per rolling-start 60-second window.
/// let limiter = RateLimitMiddleware::new(60, Duration::from_secs(60));
/// ```
pub struct RateLimitMiddleware {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimitMiddleware {
    /// Creates a limiter allowing `max_requests` per `window` per client key.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Consult and update the window for `key` at time `now`.
    ///
    /// This is the whole fixed-window algorithm, atomic under the map lock:
    /// (re)initialize an expired or missing window, reject without
    /// incrementing when the counter is at the limit, otherwise increment
    /// and accept.
    fn check(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = windows.entry(key.to_owned()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        if window.count >= self.max_requests {
            return Decision::Reject {
                retry_after: window.reset_at - now,
            };
        }

        window.count += 1;
        Decision::Accept {
            remaining: self.max_requests - window.count,
            reset_in: window.reset_at - now,
        }
    }
}

// Seconds until reset, rounded up so a client never retries too early.
fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

// Current unix timestamp in whole seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Middleware for RateLimitMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let key = ctx.request().client_key();
        let decision = self.check(&key, Instant::now());
        // Anchor the advertised reset time to the moment the window was
        // consulted, not to when the downstream handler finishes.
        let checked_at = unix_now();
        let max_requests = self.max_requests;

        Box::pin(async move {
            match decision {
                Decision::Reject { retry_after } => {
                    tracing::warn!(client = %key, "rate limit exceeded");
                    Response::json(
                        StatusCode::TooManyRequests,
                        &json!({
                            "error": "Too Many Requests",
                            "message": "Rate limit exceeded. Please try again later.",
                        }),
                    )
                    .header("Retry-After", ceil_secs(retry_after).to_string())
                }
                Decision::Accept { remaining, reset_in } => {
                    let reset = checked_at + ceil_secs(reset_in);
                    let mut response = next.run(ctx).await;
                    response.set_header("X-RateLimit-Limit", max_requests.to_string());
                    response.set_header("X-RateLimit-Remaining", remaining.to_string());
                    response.set_header("X-RateLimit-Reset", reset.to_string());
                    response
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::middleware::{MiddlewareHandler, from_middleware};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const WINDOW: Duration = Duration::from_secs(60);

    fn make_ctx() -> Context {
        let raw = b"GET /api HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = Request::parse(raw).unwrap().0;
        Context::new(request.with_peer("192.0.2.1:9999".parse().unwrap()))
    }

    // ── Decision logic ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn fixed_window_accepts_then_rejects_then_resets() {
        let limiter = RateLimitMiddleware::new(2, WINDOW);
        let now = Instant::now();

        assert!(matches!(
            limiter.check("c", now),
            Decision::Accept { remaining: 1, .. }
        ));
        assert!(matches!(
            limiter.check("c", now),
            Decision::Accept { remaining: 0, .. }
        ));
        assert!(matches!(limiter.check("c", now), Decision::Reject { .. }));

        // After the window elapses the counter starts fresh.
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(
            limiter.check("c", Instant::now()),
            Decision::Accept { remaining: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_does_not_consume_quota() {
        let limiter = RateLimitMiddleware::new(1, WINDOW);
        let now = Instant::now();

        assert!(matches!(limiter.check("c", now), Decision::Accept { .. }));
        // Rejected requests never push reset_at or the counter further.
        let Decision::Reject { retry_after: first } = limiter.check("c", now) else {
            panic!("expected Reject");
        };
        let Decision::Reject { retry_after: second } = limiter.check("c", now) else {
            panic!("expected Reject");
        };
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = RateLimitMiddleware::new(1, WINDOW);
        let now = Instant::now();

        assert!(matches!(limiter.check("a", now), Decision::Accept { .. }));
        assert!(matches!(limiter.check("a", now), Decision::Reject { .. }));
        assert!(matches!(limiter.check("b", now), Decision::Accept { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down_within_window() {
        let limiter = RateLimitMiddleware::new(1, WINDOW);
        let start = Instant::now();
        limiter.check("c", start);

        tokio::time::advance(Duration::from_secs(20)).await;
        match limiter.check("c", Instant::now()) {
            Decision::Reject { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(40));
            }
            other => panic!("expected Reject, got {other:?}"),
        }
    }

    // ── Middleware integration ────────────────────────────────────────────────

    fn terminal() -> MiddlewareHandler {
        Arc::new(|_ctx, _next| Box::pin(async { Response::new(StatusCode::Ok).body("hit") }))
    }

    async fn dispatch(limiter: &Arc<RateLimitMiddleware>) -> Response {
        let chain = vec![from_middleware(Arc::clone(limiter)), terminal()];
        crate::middleware::Next::new(chain).run(make_ctx()).await
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_200_200_429_then_fresh_window() {
        let limiter = Arc::new(RateLimitMiddleware::new(2, WINDOW));

        assert_eq!(dispatch(&limiter).await.status(), StatusCode::Ok);
        assert_eq!(dispatch(&limiter).await.status(), StatusCode::Ok);

        let rejected = dispatch(&limiter).await;
        assert_eq!(rejected.status(), StatusCode::TooManyRequests);
        assert_eq!(rejected.headers().get("retry-after"), Some("60"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(dispatch(&limiter).await.status(), StatusCode::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_responses_carry_quota_headers() {
        let limiter = Arc::new(RateLimitMiddleware::new(3, WINDOW));

        let first = dispatch(&limiter).await;
        assert_eq!(first.headers().get("x-ratelimit-limit"), Some("3"));
        assert_eq!(first.headers().get("x-ratelimit-remaining"), Some("2"));
        assert!(first.headers().contains("x-ratelimit-reset"));

        let second = dispatch(&limiter).await;
        assert_eq!(second.headers().get("x-ratelimit-remaining"), Some("1"));

        let third = dispatch(&limiter).await;
        assert_eq!(third.headers().get("x-ratelimit-remaining"), Some("0"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_header_anchored_at_check_time_with_ceil_rounding() {
        let limiter = Arc::new(RateLimitMiddleware::new(3, WINDOW));

        // Move half a second into the window so the remaining duration has a
        // fractional part that must round up, like Retry-After does.
        dispatch(&limiter).await;
        tokio::time::advance(Duration::from_millis(500)).await;

        let before = unix_now();
        let response = dispatch(&limiter).await;
        let reset: u64 = response
            .headers()
            .get("x-ratelimit-reset")
            .unwrap()
            .parse()
            .unwrap();

        // reset_in is 59.5s here, so the ceil-rounded epoch is check time
        // plus 60 (one second of slack for a wall-clock boundary crossing).
        assert!(reset >= before + 60);
        assert!(reset <= before + 61);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_request_never_reaches_terminal() {
        let limiter = Arc::new(RateLimitMiddleware::new(1, WINDOW));
        dispatch(&limiter).await;
        let rejected = dispatch(&limiter).await;
        assert_eq!(rejected.status(), StatusCode::TooManyRequests);
        assert_ne!(rejected.body_ref(), b"hit");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_accept_exactly_the_limit() {
        const LIMIT: u32 = 5;
        const TOTAL: u32 = 32;

        let limiter = Arc::new(RateLimitMiddleware::new(LIMIT, WINDOW));
        let accepted = Arc::new(AtomicU32::new(0));
        let rejected = Arc::new(AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..TOTAL {
            let limiter = Arc::clone(&limiter);
            let accepted = Arc::clone(&accepted);
            let rejected = Arc::clone(&rejected);
            tasks.push(tokio::spawn(async move {
                match limiter.check("same-client", Instant::now()) {
                    Decision::Accept { .. } => accepted.fetch_add(1, Ordering::SeqCst),
                    Decision::Reject { .. } => rejected.fetch_add(1, Ordering::SeqCst),
                };
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Race-freedom: exactly LIMIT accepted, never more.
        assert_eq!(accepted.load(Ordering::SeqCst), LIMIT);
        assert_eq!(rejected.load(Ordering::SeqCst), TOTAL - LIMIT);
    }
}
