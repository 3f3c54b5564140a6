//! deadline timers for the event loop
//!
//! three one-shot timers keyed by [`TimerKind`]. arming replaces the previous
//! deadline, stopping clears it. the loop sleeps until [`Timers::next_deadline`]
//! and dispatches whatever [`Timers::take_expired`] yields.

use std::time::{Duration, Instant};

const TIMER_COUNT: usize = 3;

#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// engine loss-detection / idle timer
    Retransmit = 0,
    /// request issue cadence
    Request = 1,
    /// grace period before closing
    Shutdown = 2,
}

impl TimerKind {
    pub const ALL: [TimerKind; TIMER_COUNT] =
        [TimerKind::Retransmit, TimerKind::Request, TimerKind::Shutdown];
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    deadlines: [Option<Instant>; TIMER_COUNT],
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// fire `kind` at `at`, replacing any earlier deadline
    #[inline]
    pub fn arm(&mut self, kind: TimerKind, at: Instant) {
        self.deadlines[kind as usize] = Some(at);
    }

    #[inline]
    pub fn arm_after(&mut self, kind: TimerKind, now: Instant, after: Duration) {
        self.arm(kind, now + after);
    }

    #[inline]
    pub fn stop(&mut self, kind: TimerKind) {
        self.deadlines[kind as usize] = None;
    }

    #[inline]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines[kind as usize].is_some()
    }

    #[inline]
    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines[kind as usize]
    }

    /// earliest armed deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// poll timeout relative to `now`, zero if a deadline already passed
    pub fn poll_timeout(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|at| at.saturating_duration_since(now))
    }

    /// disarm every timer due at `now` and yield them in deadline order.
    ///
    /// ties keep [`TimerKind::ALL`] order. each timer is yielded at most once
    /// per call even if its handler re-arms it for `now`.
    pub fn take_expired(&mut self, now: Instant) -> impl Iterator<Item = TimerKind> {
        let mut due: [Option<(Instant, TimerKind)>; TIMER_COUNT] = [None; TIMER_COUNT];

        for kind in TimerKind::ALL {
            let slot = &mut self.deadlines[kind as usize];
            if let Some(at) = *slot {
                if at <= now {
                    due[kind as usize] = Some((at, kind));
                    *slot = None;
                }
            }
        }

        due.sort_by_key(|d| d.map(|(at, _)| at));
        due.into_iter().flatten().map(|(_, kind)| kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_replaces() {
        let now = Instant::now();
        let mut timers = Timers::new();

        timers.arm_after(TimerKind::Retransmit, now, Duration::from_secs(5));
        timers.arm_after(TimerKind::Retransmit, now, Duration::from_millis(10));

        assert_eq!(
            timers.deadline(TimerKind::Retransmit),
            Some(now + Duration::from_millis(10))
        );
    }

    #[test]
    fn test_next_deadline() {
        let now = Instant::now();
        let mut timers = Timers::new();
        assert_eq!(timers.next_deadline(), None);
        assert_eq!(timers.poll_timeout(now), None);

        timers.arm_after(TimerKind::Shutdown, now, Duration::from_secs(1));
        timers.arm_after(TimerKind::Request, now, Duration::from_millis(100));

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(100)));
        assert_eq!(timers.poll_timeout(now), Some(Duration::from_millis(100)));

        timers.stop(TimerKind::Request);
        assert_eq!(timers.poll_timeout(now), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_take_expired_in_deadline_order() {
        let now = Instant::now();
        let mut timers = Timers::new();

        timers.arm_after(TimerKind::Retransmit, now, Duration::from_millis(30));
        timers.arm_after(TimerKind::Request, now, Duration::from_millis(10));
        timers.arm_after(TimerKind::Shutdown, now, Duration::from_secs(2));

        let fired: Vec<_> = timers
            .take_expired(now + Duration::from_millis(50))
            .collect();

        assert_eq!(fired, vec![TimerKind::Request, TimerKind::Retransmit]);
        assert!(!timers.is_armed(TimerKind::Request));
        assert!(!timers.is_armed(TimerKind::Retransmit));
        assert!(timers.is_armed(TimerKind::Shutdown));
    }

    #[test]
    fn test_nothing_due() {
        let now = Instant::now();
        let mut timers = Timers::new();
        timers.arm_after(TimerKind::Request, now, Duration::from_millis(100));

        assert_eq!(timers.take_expired(now).count(), 0);
        assert!(timers.is_armed(TimerKind::Request));
    }
}
