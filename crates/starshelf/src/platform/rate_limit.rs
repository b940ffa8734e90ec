use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default pacing for remote calls.
pub mod rate_limits {
    use std::time::Duration;

    /// Minimum spacing between Notion API calls.
    pub const NOTION_MIN_INTERVAL: Duration = Duration::from_millis(100);
}

/// Enforces a minimum interval between consecutive remote calls.
///
/// The quota has a burst of one: a call arriving after the interval has
/// elapsed proceeds immediately, a call arriving sooner waits only for the
/// remainder of the interval.
///
/// # Example
///
/// ```ignore
/// use starshelf::platform::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::with_min_interval(Duration::from_millis(100));
///
/// // Before each API call:
/// limiter.wait().await;
/// client.some_api_call().await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    min_interval: Duration,
}

impl ApiRateLimiter {
    /// Create a limiter spacing calls at least `min_interval` apart.
    ///
    /// A zero interval is clamped to one millisecond.
    pub fn with_min_interval(min_interval: Duration) -> Self {
        let min_interval = min_interval.max(Duration::from_millis(1));
        let quota = Quota::with_period(min_interval).unwrap_or_else(|| {
            Quota::per_second(std::num::NonZeroU32::MIN)
        });

        Self {
            inner: Arc::new(RateLimiter::direct(quota)),
            min_interval,
        }
    }

    /// The enforced spacing between calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
