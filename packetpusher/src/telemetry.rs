//! Per-run telemetry accumulator and its merge algebra.
//!
//! Each worker fills exactly one [`Telemetry`]. The orchestrator's caller
//! folds them into a grand total with [`Telemetry::merge`]: counters add up,
//! while the time window stretches from the earliest start to the latest end.
//! A timestamp of `0.0` means "unset" and never wins a min/max comparison.
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::stats::StatsSnapshot;
use crate::util::{now_secs, per_second, to_megabytes};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    /// Seconds since the UNIX epoch, 0.0 when unset.
    pub start_time: f64,
    /// Seconds since the UNIX epoch, 0.0 when unset.
    pub end_time: f64,
}

fn earliest(a: f64, b: f64) -> f64 {
    match (a == 0.0, b == 0.0) {
        (true, _) => b,
        (_, true) => a,
        _ => a.min(b),
    }
}

fn latest(a: f64, b: f64) -> f64 {
    match (a == 0.0, b == 0.0) {
        (true, _) => b,
        (_, true) => a,
        _ => a.max(b),
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = now_secs();
    }

    pub fn end(&mut self) {
        self.end_time = now_secs().max(self.start_time);
    }

    pub fn is_started(&self) -> bool {
        self.start_time != 0.0
    }

    pub fn is_finished(&self) -> bool {
        self.end_time != 0.0
    }

    /// Copies an endpoint's cumulative data counters into this accumulator.
    pub fn record(&mut self, stats: &StatsSnapshot) {
        self.bytes_in = stats.bytes_received;
        self.bytes_out = stats.bytes_sent;
        self.packets_in = stats.packets_received;
        self.packets_out = stats.packets_sent;
    }

    /// Length of the measured window in seconds; 0 until both ends are set.
    pub fn elapsed(&self) -> f64 {
        if self.is_started() && self.is_finished() {
            self.end_time - self.start_time
        } else {
            0.0
        }
    }

    pub fn throughput_bytes_per_sec(&self) -> f64 {
        per_second((self.bytes_in + self.bytes_out) as f64, self.elapsed())
    }

    pub fn throughput_packets_per_sec(&self) -> f64 {
        per_second((self.packets_in + self.packets_out) as f64, self.elapsed())
    }

    pub fn mbytes_in(&self) -> f64 {
        to_megabytes(self.bytes_in)
    }

    pub fn mbytes_out(&self) -> f64 {
        to_megabytes(self.bytes_out)
    }

    /// Combines two accumulators without touching either.
    pub fn merge(&self, other: &Telemetry) -> Telemetry {
        Telemetry {
            bytes_in: self.bytes_in.saturating_add(other.bytes_in),
            bytes_out: self.bytes_out.saturating_add(other.bytes_out),
            packets_in: self.packets_in.saturating_add(other.packets_in),
            packets_out: self.packets_out.saturating_add(other.packets_out),
            start_time: earliest(self.start_time, other.start_time),
            end_time: latest(self.end_time, other.end_time),
        }
    }
}

impl Add for Telemetry {
    type Output = Telemetry;

    fn add(self, rhs: Telemetry) -> Telemetry {
        self.merge(&rhs)
    }
}

impl AddAssign for Telemetry {
    fn add_assign(&mut self, rhs: Telemetry) {
        *self = self.merge(&rhs);
    }
}

impl Sum for Telemetry {
    fn sum<I: Iterator<Item = Telemetry>>(iter: I) -> Telemetry {
        iter.fold(Telemetry::default(), |acc, t| acc.merge(&t))
    }
}

impl<'a> Sum<&'a Telemetry> for Telemetry {
    fn sum<I: Iterator<Item = &'a Telemetry>>(iter: I) -> Telemetry {
        iter.fold(Telemetry::default(), |acc, t| acc.merge(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(packets: u64, start: f64, end: f64) -> Telemetry {
        Telemetry {
            bytes_in: packets * 10,
            bytes_out: packets * 1024,
            packets_in: packets,
            packets_out: packets * 2,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_merge_saturates_counters() {
        let big = Telemetry {
            bytes_out: u64::MAX - 1,
            packets_out: u64::MAX,
            ..bucket(1, 1.0, 2.0)
        };
        let merged = big.merge(&bucket(4, 0.5, 3.0));
        assert_eq!(merged.bytes_out, u64::MAX);
        assert_eq!(merged.packets_out, u64::MAX);
        assert_eq!(merged.packets_in, 5);

        let total: Telemetry = [big, big, big].iter().sum();
        assert_eq!(total.packets_out, u64::MAX);
    }

    #[test]
    fn test_start_end_stamps() {
        let mut t = Telemetry::new();
        assert!(!t.is_started());
        assert_eq!(t.elapsed(), 0.0);
        t.start();
        assert!(t.is_started());
        assert_eq!(t.elapsed(), 0.0);
        t.end();
        assert!(t.end_time >= t.start_time);
        assert!(t.elapsed() >= 0.0);
    }

    #[test]
    fn test_derived_rates() {
        let t = Telemetry {
            bytes_in: 1000,
            bytes_out: 3000,
            packets_in: 1,
            packets_out: 3,
            start_time: 100.0,
            end_time: 102.0,
        };
        assert_eq!(t.elapsed(), 2.0);
        assert_eq!(t.throughput_bytes_per_sec(), 2000.0);
        assert_eq!(t.throughput_packets_per_sec(), 2.0);
    }

    #[test]
    fn test_zero_window_rates() {
        let t = bucket(5, 0.0, 0.0);
        assert_eq!(t.throughput_bytes_per_sec(), 0.0);
        assert_eq!(t.throughput_packets_per_sec(), 0.0);
    }

    #[test]
    fn test_merge_sums_counters() {
        let total = bucket(3, 10.0, 12.0).merge(&bucket(4, 11.0, 15.0));
        assert_eq!(total.packets_in, 7);
        assert_eq!(total.packets_out, 14);
        assert_eq!(total.bytes_in, 70);
        assert_eq!(total.bytes_out, 7 * 1024);
    }

    #[test]
    fn test_merge_time_window() {
        let total = bucket(1, 10.0, 12.0).merge(&bucket(1, 9.5, 11.0));
        assert_eq!(total.start_time, 9.5);
        assert_eq!(total.end_time, 12.0);
        assert_eq!(total.elapsed(), 2.5);
    }

    #[test]
    fn test_merge_ignores_unset_times() {
        let a = bucket(2, 10.0, 12.0);
        let unset = Telemetry::default();
        assert_eq!(unset.merge(&a), a);
        assert_eq!(a.merge(&unset), a);

        let only_start = bucket(0, 8.0, 0.0);
        let merged = a.merge(&only_start);
        assert_eq!(merged.start_time, 8.0);
        assert_eq!(merged.end_time, 12.0);
    }

    #[test]
    fn test_sum_matches_fold() {
        let parts = [bucket(1, 5.0, 6.0), bucket(2, 4.0, 9.0), bucket(3, 7.0, 8.0)];
        let total: Telemetry = parts.iter().sum();
        assert_eq!(total, parts[0] + parts[1] + parts[2]);
        assert_eq!(total.start_time, 4.0);
        assert_eq!(total.end_time, 9.0);
        assert_eq!(total.packets_in, 6);
    }

    #[test]
    fn test_record_copies_data_counters() {
        let snap = StatsSnapshot {
            packets_sent: 100,
            bytes_sent: 102_400,
            packets_received: 3,
            bytes_received: 3072,
            control_sent: 2,
            ..Default::default()
        };
        let mut t = Telemetry::new();
        t.record(&snap);
        assert_eq!(t.packets_out, 100);
        assert_eq!(t.bytes_out, 102_400);
        assert_eq!(t.packets_in, 3);
        assert_eq!(t.bytes_in, 3072);
    }
}
