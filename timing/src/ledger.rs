//! per-request timing ledger
//!
//! one slot per request sequence number. a slot is opened when the request
//! stream is written and closed when the response stream delivers fin. slots
//! that never see fin stay incomplete and are skipped by the report.

use crate::histogram::Histogram;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// issue/completion instants for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Entry {
    begin: Option<Instant>,
    end: Option<Instant>,
}

impl Entry {
    /// instant the request was written
    #[inline]
    pub fn begin(&self) -> Option<Instant> {
        self.begin
    }

    /// instant the response delivered fin
    #[inline]
    pub fn end(&self) -> Option<Instant> {
        self.end
    }

    /// true once both instants are recorded
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.begin.is_some() && self.end.is_some()
    }

    /// end - begin, or None while incomplete
    #[inline]
    pub fn latency(&self) -> Option<Duration> {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) => Some(end.duration_since(begin)),
            _ => None,
        }
    }
}

/// fixed-capacity table indexed by request sequence number
#[derive(Debug, Clone)]
pub struct TimingLedger {
    entries: Box<[Entry]>,
}

impl TimingLedger {
    /// create a ledger with one empty slot per request
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![Entry::default(); capacity].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }

    /// record the issue instant of request `index`.
    ///
    /// returns false if the index is out of range or the slot was already opened.
    pub fn begin(&mut self, index: usize, at: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            log::debug!("ledger: begin for out-of-range slot {}", index);
            return false;
        };
        if entry.begin.is_some() {
            log::debug!("ledger: slot {} already opened", index);
            return false;
        }
        entry.begin = Some(at);
        true
    }

    /// record the completion instant of request `index`.
    ///
    /// only accepted for an opened slot without an end, and only when `at` is
    /// strictly later than the begin instant. returns whether it was recorded.
    pub fn end(&mut self, index: usize, at: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            log::debug!("ledger: end for out-of-range slot {}", index);
            return false;
        };
        match (entry.begin, entry.end) {
            (Some(begin), None) if at > begin => {
                entry.end = Some(at);
                true
            }
            (None, _) => {
                log::debug!("ledger: end for unopened slot {}", index);
                false
            }
            (Some(_), Some(_)) => {
                log::debug!("ledger: slot {} already complete", index);
                false
            }
            (Some(_), None) => {
                log::debug!("ledger: end for slot {} not after begin", index);
                false
            }
        }
    }

    /// number of complete slots
    pub fn completed(&self) -> usize {
        self.entries.iter().filter(|e| e.is_complete()).count()
    }

    /// indices of slots that never completed
    pub fn incomplete(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_complete())
            .map(|(i, _)| i)
    }

    /// write one `"<index>, <latency-ms>"` line per complete slot.
    ///
    /// returns the number of lines written.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<usize> {
        let mut lines = 0;
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(latency) = entry.latency() {
                writeln!(out, "{}, {}", index, latency.as_millis())?;
                lines += 1;
            }
        }
        out.flush()?;
        Ok(lines)
    }

    /// histogram of complete latencies in microseconds
    pub fn histogram(&self) -> Histogram {
        let mut hist = Histogram::new();
        for latency in self.entries.iter().filter_map(Entry::latency) {
            hist.record(latency.as_micros() as u64);
        }
        hist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_end() {
        let t0 = Instant::now();
        let mut ledger = TimingLedger::new(3);

        assert!(ledger.begin(0, t0));
        assert!(ledger.end(0, t0 + Duration::from_millis(50)));

        let entry = ledger.get(0).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.latency(), Some(Duration::from_millis(50)));
        assert_eq!(ledger.completed(), 1);
    }

    #[test]
    fn test_end_requires_begin() {
        let t0 = Instant::now();
        let mut ledger = TimingLedger::new(2);

        assert!(!ledger.end(1, t0));
        assert!(ledger.get(1).unwrap().end().is_none());
    }

    #[test]
    fn test_end_strictly_after_begin() {
        let t0 = Instant::now();
        let mut ledger = TimingLedger::new(1);

        ledger.begin(0, t0);
        assert!(!ledger.end(0, t0));
        assert!(ledger.end(0, t0 + Duration::from_micros(1)));
        // second fin is ignored
        assert!(!ledger.end(0, t0 + Duration::from_secs(1)));
        assert_eq!(ledger.get(0).unwrap().latency(), Some(Duration::from_micros(1)));
    }

    #[test]
    fn test_out_of_range() {
        let t0 = Instant::now();
        let mut ledger = TimingLedger::new(2);

        assert!(!ledger.begin(2, t0));
        assert!(!ledger.end(7, t0));
    }

    #[test]
    fn test_report_skips_incomplete() {
        let t0 = Instant::now();
        let mut ledger = TimingLedger::new(4);

        ledger.begin(0, t0);
        ledger.end(0, t0 + Duration::from_millis(12));
        ledger.begin(1, t0);
        ledger.begin(2, t0);
        ledger.end(2, t0 + Duration::from_millis(1500));

        let mut out = Vec::new();
        let lines = ledger.write_report(&mut out).unwrap();

        assert_eq!(lines, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "0, 12\n2, 1500\n");
        assert_eq!(ledger.incomplete().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_histogram_from_ledger() {
        let t0 = Instant::now();
        let mut ledger = TimingLedger::new(3);

        for i in 0..3 {
            ledger.begin(i, t0);
        }
        ledger.end(0, t0 + Duration::from_millis(10));
        ledger.end(1, t0 + Duration::from_millis(30));

        let hist = ledger.histogram();
        assert_eq!(hist.count(), 2);
        assert_eq!(hist.min(), 10_000);
        assert_eq!(hist.max(), 30_000);
        assert_eq!(hist.mean(), 20_000);
    }
}
