//! Throughput analytics over output observations.
//!
//! Consecutive observations form intervals; each interval with positive
//! output and time deltas contributes a time-per-piece sample. Samples are
//! split into beginning, middle and end segments to show whether a worker
//! sped up over the course of a task.

use chrono::Duration;
use serde::Serialize;
use shopfloor_core::{OutputObservation, Time};

/// One valid interval between two consecutive observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    /// Earlier observation time
    pub from: Time,
    /// Later observation time
    pub to: Time,
    /// Pieces produced in the interval
    pub output_delta: u32,
    /// Elapsed seconds
    pub seconds: f64,
    /// Seconds per piece
    pub time_per_piece: f64,
}

/// Average pace over one segment of intervals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    /// Number of intervals in the segment
    pub intervals: usize,
    /// Mean seconds per piece, absent for an empty segment
    pub avg_time_per_piece: Option<f64>,
}

/// Analytics over a series with at least one valid interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Number of observations considered
    pub observations: usize,
    /// Consecutive pairs dropped for a non-positive output or time delta
    pub discarded_intervals: usize,
    /// Valid intervals in time order
    pub intervals: Vec<Interval>,
    /// First third of the intervals
    pub beginning: SegmentStats,
    /// Middle third of the intervals
    pub middle: SegmentStats,
    /// Last third of the intervals
    pub end: SegmentStats,
    /// Mean seconds per piece over every valid interval
    pub overall_avg_time_per_piece: f64,
    /// `(beginning - end) / beginning * 100`; positive means faster
    pub speedup_percentage: Option<f64>,
}

/// Result of [`compute_time_metrics`]. Insufficient data is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimeMetrics {
    /// Too few usable samples
    InsufficientData {
        /// Why nothing could be computed
        reason: String,
    },
    /// Computed analytics
    Computed(MetricsSummary),
}

impl TimeMetrics {
    /// The summary, if one was computed.
    pub fn summary(&self) -> Option<&MetricsSummary> {
        match self {
            TimeMetrics::Computed(summary) => Some(summary),
            TimeMetrics::InsufficientData { .. } => None,
        }
    }
}

/// Compute segmented and overall pace from observations in any order.
pub fn compute_time_metrics(observations: &[OutputObservation]) -> TimeMetrics {
    if observations.len() < 2 {
        return TimeMetrics::InsufficientData {
            reason: format!("need at least 2 observations, have {}", observations.len()),
        };
    }

    let mut sorted = observations.to_vec();
    sorted.sort_by_key(|o| (o.recorded_at, o.id));

    let mut intervals = Vec::with_capacity(sorted.len() - 1);
    let mut discarded = 0;
    for pair in sorted.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let output_delta = i64::from(b.cumulative_output) - i64::from(a.cumulative_output);
        let elapsed = seconds(b.recorded_at - a.recorded_at);
        if output_delta <= 0 || elapsed <= 0.0 {
            discarded += 1;
            continue;
        }
        intervals.push(Interval {
            from: a.recorded_at,
            to: b.recorded_at,
            output_delta: output_delta as u32,
            seconds: elapsed,
            time_per_piece: elapsed / output_delta as f64,
        });
    }

    if intervals.is_empty() {
        return TimeMetrics::InsufficientData {
            reason: format!("no interval with positive output and time across {} observations", sorted.len()),
        };
    }

    let (beginning_len, middle_len, _) = segment_sizes(intervals.len());
    let paces: Vec<f64> = intervals.iter().map(|i| i.time_per_piece).collect();
    let beginning = segment(&paces[..beginning_len]);
    let middle = segment(&paces[beginning_len..beginning_len + middle_len]);
    let end = segment(&paces[beginning_len + middle_len..]);

    let speedup_percentage = match (beginning.avg_time_per_piece, end.avg_time_per_piece) {
        (Some(b), Some(e)) if b != 0.0 => Some((b - e) / b * 100.0),
        _ => None,
    };

    TimeMetrics::Computed(MetricsSummary {
        observations: sorted.len(),
        discarded_intervals: discarded,
        overall_avg_time_per_piece: mean(&paces).unwrap_or_default(),
        intervals,
        beginning,
        middle,
        end,
        speedup_percentage,
    })
}

/// Split `n` intervals into (beginning, middle, end) counts.
///
/// Each segment gets `n / 3`; a remainder of one goes to the end, a remainder
/// of two to the end and the beginning.
fn segment_sizes(n: usize) -> (usize, usize, usize) {
    let base = n / 3;
    let rem = n % 3;
    let end = base + usize::from(rem >= 1);
    let beginning = base + usize::from(rem >= 2);
    (beginning, base, end)
}

fn segment(paces: &[f64]) -> SegmentStats {
    SegmentStats {
        intervals: paces.len(),
        avg_time_per_piece: mean(paces),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn seconds(delta: Duration) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}
