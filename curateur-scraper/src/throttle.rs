//! Per-endpoint sliding-window rate limiting with adaptive backoff.
//!
//! Before each call a worker acquires a slot: timestamps older than the
//! window are evicted, and if the window is full the worker sleeps until
//! the head timestamp expires. A rate-exceeded response doubles a backoff
//! multiplier (1x, 2x, 4x, 8x, capped) applied to the Provider's
//! Retry-After; any successful call resets it.
//!
//! State is shared across workers; updates are serialized per call under
//! one mutex, and the lock is never held across a sleep.

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Provider endpoints with independent throttle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// match-by-identity (jeuInfos)
    GameInfo,
    /// search-by-name (jeuRecherche)
    Search,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameInfo => "jeuInfos",
            Self::Search => "jeuRecherche",
        }
    }
}

/// Cap of `calls` per sliding `window`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub calls: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn per_minute(calls: u32) -> Self {
        Self {
            calls,
            window: Duration::from_secs(60),
        }
    }
}

/// Throttle statistics for the platform summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleStats {
    pub total_wait: Duration,
    pub events_429: u32,
    pub max_multiplier: u32,
    pub recent_calls: usize,
}

#[derive(Debug)]
struct EndpointState {
    history: VecDeque<Instant>,
    consecutive_429: u32,
    multiplier: u32,
    next_allowed: Option<Instant>,
    total_wait: Duration,
    events_429: u32,
    max_multiplier: u32,
}

impl EndpointState {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            consecutive_429: 0,
            multiplier: 1,
            next_allowed: None,
            total_wait: Duration::ZERO,
            events_429: 0,
            max_multiplier: 1,
        }
    }

    /// Time until a call is permitted, or `None` if it may go now.
    fn time_until_permitted(&mut self, now: Instant, limit: RateLimit) -> Option<Duration> {
        if let Some(next) = self.next_allowed {
            if now < next {
                return Some(next - now);
            }
            self.next_allowed = None;
        }

        let window_start = now.checked_sub(limit.window);
        while let Some(&head) = self.history.front() {
            match window_start {
                Some(start) if head < start => {
                    self.history.pop_front();
                }
                _ => break,
            }
        }

        if self.history.len() >= limit.calls as usize {
            let head = *self.history.front().expect("non-empty window");
            let wait_until = head + limit.window;
            if wait_until > now {
                return Some(wait_until - now);
            }
            self.history.pop_front();
        }

        None
    }
}

/// Shared per-endpoint throttle.
pub struct Throttle {
    limit: RateLimit,
    default_retry_after: Duration,
    states: Mutex<HashMap<Endpoint, EndpointState>>,
}

impl Throttle {
    pub fn new(limit: RateLimit, default_retry_after: Duration) -> Self {
        Self {
            limit,
            default_retry_after,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// The effective limit honours the lower of the Provider-reported cap
    /// and an operator override, with a floor of one call per window;
    /// exceeding the Provider cap is never permitted.
    pub fn effective_limit(provider_cap: Option<u32>, override_cap: Option<u32>) -> u32 {
        let limit = match (provider_cap, override_cap) {
            (Some(p), Some(o)) => p.min(o),
            (Some(p), None) => p,
            (None, Some(o)) => o,
            (None, None) => 60,
        };
        limit.max(1)
    }

    /// Wait until a call to `endpoint` is allowed, then claim the slot.
    /// The timestamp is pushed before the HTTP request is issued.
    /// Returns how long the caller was made to wait.
    pub async fn acquire(&self, endpoint: Endpoint) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut states = self.states.lock().await;
                let state = states.entry(endpoint).or_insert_with(EndpointState::new);
                let now = Instant::now();
                match state.time_until_permitted(now, self.limit) {
                    None => {
                        state.history.push_back(now);
                        state.total_wait += waited;
                        return waited;
                    }
                    Some(wait) => wait,
                }
            };
            log::debug!(
                "Throttle wait on {}: {:.1}s",
                endpoint.as_str(),
                wait.as_secs_f64()
            );
            sleep(wait).await;
            waited += wait;
        }
    }

    /// Record a rate-exceeded response: bump the consecutive counter,
    /// compute the capped multiplier, set the next-allowed time, and clear
    /// the call window to be conservative.
    pub async fn on_rate_limited(&self, endpoint: Endpoint, retry_after: Option<Duration>) {
        let mut states = self.states.lock().await;
        let state = states.entry(endpoint).or_insert_with(EndpointState::new);

        state.consecutive_429 += 1;
        state.events_429 += 1;
        let exponent = (state.consecutive_429 - 1).min(3);
        state.multiplier = 1u32 << exponent;
        state.max_multiplier = state.max_multiplier.max(state.multiplier);

        let base = retry_after.unwrap_or(self.default_retry_after);
        let backoff = base * state.multiplier;
        state.next_allowed = Some(Instant::now() + backoff);
        state.history.clear();

        log::warn!(
            "Rate limit hit on {}: backing off {:.0}s ({}x after {} consecutive)",
            endpoint.as_str(),
            backoff.as_secs_f64(),
            state.multiplier,
            state.consecutive_429,
        );
    }

    /// Record a successful call: the backoff multiplier resets to 1x.
    pub async fn on_success(&self, endpoint: Endpoint) {
        let mut states = self.states.lock().await;
        if let Some(state) = states.get_mut(&endpoint) {
            if state.consecutive_429 > 0 {
                log::info!(
                    "Backoff reset on {} after successful call",
                    endpoint.as_str()
                );
            }
            state.consecutive_429 = 0;
            state.multiplier = 1;
        }
    }

    pub async fn stats(&self, endpoint: Endpoint) -> ThrottleStats {
        let states = self.states.lock().await;
        match states.get(&endpoint) {
            Some(state) => ThrottleStats {
                total_wait: state.total_wait,
                events_429: state.events_429,
                max_multiplier: state.max_multiplier,
                recent_calls: state.history.len(),
            },
            None => ThrottleStats::default(),
        }
    }

    #[cfg(test)]
    async fn multiplier(&self, endpoint: Endpoint) -> u32 {
        self.states
            .lock()
            .await
            .get(&endpoint)
            .map_or(1, |s| s.multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(calls: u32, window_s: u64) -> Throttle {
        Throttle::new(
            RateLimit {
                calls,
                window: Duration::from_secs(window_s),
            },
            Duration::from_secs(60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_spaced_by_window() {
        let t = throttle(2, 1);
        let start = Instant::now();
        for _ in 0..10 {
            t.acquire(Endpoint::GameInfo).await;
        }
        // 2 calls per second: calls 3..10 must wait, completing no
        // earlier than 4 seconds in.
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn window_under_cap_never_waits() {
        let t = throttle(10, 1);
        let start = Instant::now();
        for _ in 0..5 {
            let waited = t.acquire(Endpoint::GameInfo).await;
            assert_eq!(waited, Duration::ZERO);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn multiplier_doubles_and_caps_at_8() {
        let t = throttle(10, 1);
        for expected in [1u32, 2, 4, 8, 8] {
            t.on_rate_limited(Endpoint::GameInfo, Some(Duration::from_secs(1)))
                .await;
            assert_eq!(t.multiplier(Endpoint::GameInfo).await, expected);
        }
        let stats = t.stats(Endpoint::GameInfo).await;
        assert_eq!(stats.events_429, 5);
        assert_eq!(stats.max_multiplier, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_multiplier() {
        let t = throttle(10, 1);
        t.on_rate_limited(Endpoint::GameInfo, Some(Duration::from_secs(1)))
            .await;
        t.on_rate_limited(Endpoint::GameInfo, Some(Duration::from_secs(1)))
            .await;
        assert_eq!(t.multiplier(Endpoint::GameInfo).await, 2);
        t.on_success(Endpoint::GameInfo).await;
        assert_eq!(t.multiplier(Endpoint::GameInfo).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_blocks_until_retry_after() {
        let t = throttle(10, 1);
        t.on_rate_limited(Endpoint::GameInfo, Some(Duration::from_secs(2)))
            .await;
        let start = Instant::now();
        let waited = t.acquire(Endpoint::GameInfo).await;
        assert!(waited >= Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn second_429_waits_twice_the_retry_after() {
        let t = throttle(10, 1);
        t.on_rate_limited(Endpoint::GameInfo, Some(Duration::from_secs(2)))
            .await;
        t.acquire(Endpoint::GameInfo).await;
        t.on_rate_limited(Endpoint::GameInfo, Some(Duration::from_secs(2)))
            .await;
        let start = Instant::now();
        t.acquire(Endpoint::GameInfo).await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_are_independent() {
        let t = throttle(1, 10);
        t.acquire(Endpoint::GameInfo).await;
        let start = Instant::now();
        t.acquire(Endpoint::Search).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn effective_limit_is_lower_bound() {
        assert_eq!(Throttle::effective_limit(Some(120), Some(60)), 60);
        assert_eq!(Throttle::effective_limit(Some(60), Some(120)), 60);
        assert_eq!(Throttle::effective_limit(Some(90), None), 90);
        assert_eq!(Throttle::effective_limit(None, Some(30)), 30);
    }

    #[test]
    fn effective_limit_floors_at_one_call() {
        assert_eq!(Throttle::effective_limit(Some(0), None), 1);
        assert_eq!(Throttle::effective_limit(None, Some(0)), 1);
        assert_eq!(Throttle::effective_limit(Some(0), Some(0)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_call_cap_does_not_panic() {
        // A cap of one call per window is the floor; the first acquire on
        // a fresh endpoint must claim the slot without waiting.
        let t = throttle(1, 1);
        let waited = t.acquire(Endpoint::GameInfo).await;
        assert_eq!(waited, Duration::ZERO);
        let start = Instant::now();
        t.acquire(Endpoint::GameInfo).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
