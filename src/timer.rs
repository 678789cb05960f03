//! Coarse timer wheel: one periodic tick drives both per-connection
//! timeout dispatch and the cached wall-clock datestring used in
//! `Last-Modified` and access-log formatting.

use std::collections::{BTreeMap, HashMap};
use std::time::{Instant, SystemTime};

use mio::Token;

use crate::http_date::format_http_date;

/// What a fired timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Receive-side inactivity timeout.
    Receive,
    /// Send-side inactivity timeout.
    Send,
    /// Back-off before retrying `accept()` after FD/connection-table exhaustion.
    AcceptThrottle,
}

const ALL_KINDS: [TimerKind; 3] = [TimerKind::Receive, TimerKind::Send, TimerKind::AcceptThrottle];

/// A min-heap-by-deadline of one-shot timers, keyed by `(Token, TimerKind)`
/// so a connection's receive and send timeouts can be armed/disarmed
/// independently without colliding.
pub struct TimerWheel {
    started: Instant,
    entries: BTreeMap<(u64, u64), (Token, TimerKind)>,
    index: HashMap<(Token, TimerKind), (u64, u64)>,
    next_seq: u64,
    cached_date: Option<String>,
}

impl TimerWheel {
    /// Builds a wheel whose monotonic clock starts now.
    pub fn new() -> TimerWheel {
        TimerWheel {
            started: Instant::now(),
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            cached_date: None,
        }
    }

    /// Milliseconds elapsed since the wheel was created.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Arms (or re-arms) a timer for `token`/`kind` to fire `interval_ms`
    /// from now. `interval_ms == 0` just removes any existing timer,
    /// matching the reference implementation's "zero cancels" convention.
    pub fn add(&mut self, token: Token, kind: TimerKind, interval_ms: u64) {
        self.cancel(token, kind);
        if interval_ms == 0 {
            return;
        }
        let deadline = self.now_ms() + interval_ms;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((deadline, seq), (token, kind));
        self.index.insert((token, kind), (deadline, seq));
    }

    /// Cancels a single timer, if armed.
    pub fn cancel(&mut self, token: Token, kind: TimerKind) {
        if let Some(key) = self.index.remove(&(token, kind)) {
            self.entries.remove(&key);
        }
    }

    /// Cancels every timer belonging to `token` (connection teardown).
    pub fn cancel_all_for(&mut self, token: Token) {
        for kind in ALL_KINDS {
            self.cancel(token, kind);
        }
    }

    /// Advances the wheel: invalidates the cached datestring and returns
    /// every timer whose deadline has passed, removing them.
    pub fn tick(&mut self) -> Vec<(Token, TimerKind)> {
        self.cached_date = None;
        let now = self.now_ms();
        let mut expired = Vec::new();
        while let Some((&key, &val)) = self.entries.iter().next() {
            if key.0 > now {
                break;
            }
            self.entries.remove(&key);
            self.index.remove(&val);
            expired.push(val);
        }
        expired
    }

    /// The current wall-clock date, formatted RFC-1123-style, recomputed at
    /// most once per tick.
    pub fn date_string(&mut self) -> &str {
        if self.cached_date.is_none() {
            self.cached_date = Some(format_http_date(SystemTime::now()));
        }
        self.cached_date.as_deref().expect("just set above if it was None")
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        wheel.add(Token(2), TimerKind::Receive, 50);
        wheel.add(Token(1), TimerKind::Receive, 1);
        sleep(Duration::from_millis(60));
        let fired = wheel.tick();
        assert_eq!(vec![(Token(1), TimerKind::Receive), (Token(2), TimerKind::Receive)], fired);
    }

    #[test]
    fn re_arming_replaces_the_previous_deadline() {
        let mut wheel = TimerWheel::new();
        wheel.add(Token(1), TimerKind::Send, 1);
        wheel.add(Token(1), TimerKind::Send, 1000);
        sleep(Duration::from_millis(20));
        assert!(wheel.tick().is_empty(), "re-armed timer shouldn't have fired yet");
    }

    #[test]
    fn zero_interval_cancels() {
        let mut wheel = TimerWheel::new();
        wheel.add(Token(1), TimerKind::Receive, 1);
        wheel.add(Token(1), TimerKind::Receive, 0);
        sleep(Duration::from_millis(20));
        assert!(wheel.tick().is_empty());
    }

    #[test]
    fn cancel_all_for_removes_every_kind() {
        let mut wheel = TimerWheel::new();
        wheel.add(Token(1), TimerKind::Receive, 1);
        wheel.add(Token(1), TimerKind::Send, 1);
        wheel.cancel_all_for(Token(1));
        sleep(Duration::from_millis(20));
        assert!(wheel.tick().is_empty());
    }

    #[test]
    fn date_string_is_cached_until_the_next_tick() {
        let mut wheel = TimerWheel::new();
        let a = wheel.date_string().to_string();
        let b = wheel.date_string().to_string();
        assert_eq!(a, b);
        wheel.tick();
        // still likely equal within the same second, but must not panic and must recompute
        let _ = wheel.date_string();
    }
}
