use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Servers,
    Help,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Servers => "Servers",
            View::Help => "Help",
        }
    }

    pub fn next(self) -> Self {
        match self {
            View::Servers => View::Help,
            View::Help => View::Servers,
        }
    }

    fn code(self) -> u8 {
        match self {
            View::Servers => 0,
            View::Help => 1,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => View::Servers,
            _ => View::Help,
        }
    }
}

pub type Liveness = Arc<dyn Fn() -> bool + Send + Sync>;

/// Which view the host currently shows. Pages get a liveness predicate bound
/// to their own view.
#[derive(Debug, Clone)]
pub struct ViewTracker {
    current: Arc<AtomicU8>,
}

impl ViewTracker {
    pub fn new(initial: View) -> Self {
        Self {
            current: Arc::new(AtomicU8::new(initial.code())),
        }
    }

    pub fn current(&self) -> View {
        View::from_code(self.current.load(Ordering::Relaxed))
    }

    pub fn set(&self, view: View) {
        self.current.store(view.code(), Ordering::Relaxed);
    }

    pub fn liveness_for(&self, view: View) -> Liveness {
        let current = Arc::clone(&self.current);
        Arc::new(move || View::from_code(current.load(Ordering::Relaxed)) == view)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Hosting view went away; the session disarmed itself.
    Stopped,
    /// A previous fetch is still outstanding.
    Skipped,
    /// Caller must issue exactly one fetch and call `finish` when it settles.
    Fetch,
}

pub struct PollSession {
    period: Duration,
    liveness: Liveness,
    ticker: Option<Interval>,
    refreshing: bool,
}

impl PollSession {
    pub fn new(period: Duration, liveness: Liveness) -> Self {
        Self {
            period,
            liveness,
            ticker: None,
            refreshing: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_live(&self) -> bool {
        (self.liveness)()
    }

    /// Re-arms the timer from scratch; any previous timer is dropped first.
    pub fn start(&mut self) {
        self.stop();
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
    }

    pub fn stop(&mut self) {
        self.ticker = None;
    }

    /// Resolves at the next tick; never resolves while idle.
    pub async fn next_tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn on_tick(&mut self) -> TickOutcome {
        if !self.is_live() {
            self.stop();
            return TickOutcome::Stopped;
        }
        if self.refreshing {
            return TickOutcome::Skipped;
        }
        self.refreshing = true;
        TickOutcome::Fetch
    }

    /// Releases the fetch guard; called whether the fetch succeeded or not.
    pub fn finish(&mut self) {
        self.refreshing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn session(live: Arc<AtomicBool>) -> PollSession {
        PollSession::new(
            DEFAULT_POLL_INTERVAL,
            Arc::new(move || live.load(Ordering::Relaxed)),
        )
    }

    #[test]
    fn second_tick_while_refreshing_is_skipped() {
        let mut poll = session(Arc::new(AtomicBool::new(true)));
        assert_eq!(poll.on_tick(), TickOutcome::Fetch);
        assert_eq!(poll.on_tick(), TickOutcome::Skipped);
        poll.finish();
        assert_eq!(poll.on_tick(), TickOutcome::Fetch);
    }

    #[tokio::test]
    async fn dead_view_stops_the_session() {
        let live = Arc::new(AtomicBool::new(true));
        let mut poll = session(Arc::clone(&live));
        poll.start();
        assert!(poll.is_active());

        live.store(false, Ordering::Relaxed);
        assert_eq!(poll.on_tick(), TickOutcome::Stopped);
        assert!(!poll.is_active());
        assert!(!poll.is_refreshing());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let mut poll = session(Arc::new(AtomicBool::new(true)));
        poll.stop();
        assert!(!poll.is_active());
        poll.start();
        poll.start();
        assert!(poll.is_active());
        poll.stop();
        poll.stop();
        assert!(!poll.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_fire_on_fixed_period() {
        let mut poll = session(Arc::new(AtomicBool::new(true)));
        poll.start();
        let started = Instant::now();
        poll.next_tick().await;
        assert_eq!(started.elapsed(), DEFAULT_POLL_INTERVAL);
        poll.next_tick().await;
        assert_eq!(started.elapsed(), DEFAULT_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_never_ticks() {
        let mut poll = session(Arc::new(AtomicBool::new(true)));
        let waited = tokio::time::timeout(Duration::from_secs(10), poll.next_tick()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn tracker_liveness_follows_current_view() {
        let tracker = ViewTracker::new(View::Servers);
        let live = tracker.liveness_for(View::Servers);
        assert!(live());
        tracker.set(View::Help);
        assert!(!live());
        assert_eq!(tracker.current(), View::Help);
    }
}
