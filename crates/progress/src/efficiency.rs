//! Efficiency against a step's standard time.

use chrono::{NaiveTime, Timelike};
use serde::Serialize;
use shopfloor_core::{Error, Result, Time};

/// Parse an `HH:MM` clock time. Seconds, if present, are ignored.
pub fn parse_clock(text: &str) -> Result<NaiveTime> {
    let text = text.trim();
    let hhmm = text.get(..5).unwrap_or(text);
    NaiveTime::parse_from_str(hhmm, "%H:%M")
        .map_err(|_| Error::validation(format!("invalid clock time '{}', expected HH:MM", text)))
}

/// Work done in a window, measured against a standard time per piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfficiencyInput {
    /// Window length in seconds; may be zero or negative for bad input
    pub elapsed_seconds: i64,
    /// Pieces produced in the window
    pub output: u32,
    /// Standard seconds per piece for the step
    pub standard_seconds: u32,
}

impl EfficiencyInput {
    /// A same-day clock window, measured in whole minutes as `HH:MM`.
    /// An end at or before the start is not computable.
    pub fn from_clock(start: NaiveTime, end: NaiveTime, output: u32, standard_seconds: u32) -> Self {
        Self {
            elapsed_seconds: (minute_of_day(end) - minute_of_day(start)) * 60,
            output,
            standard_seconds,
        }
    }

    /// A window between two UTC timestamps, read as their `HH:MM` clock times.
    /// Callers check that both fall on the same date.
    pub fn from_timestamps(start: Time, end: Time, output: u32, standard_seconds: u32) -> Self {
        Self::from_clock(start.time(), end.time(), output, standard_seconds)
    }
}

fn minute_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour() * 60 + time.minute())
}

/// Computed efficiency figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyReport {
    /// Minutes in the window
    pub elapsed_minutes: f64,
    /// Minutes the output should take at standard time
    pub expected_minutes: f64,
    /// `round(expected / elapsed * 100)`
    pub efficiency_percent: i64,
    /// Output rate, one decimal
    pub pieces_per_hour: f64,
    /// Pieces the standard time allows in the window
    pub planned_for_elapsed: u32,
    /// `output - planned_for_elapsed`
    pub variance: i64,
}

/// Result of [`compute_efficiency`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Efficiency {
    /// Figures were computed
    Computed(EfficiencyReport),
    /// The window or standard time does not allow a figure
    NotComputable {
        /// What is missing
        reason: String,
    },
}

impl Efficiency {
    /// The report, if one was computed.
    pub fn report(&self) -> Option<&EfficiencyReport> {
        match self {
            Efficiency::Computed(report) => Some(report),
            Efficiency::NotComputable { .. } => None,
        }
    }
}

/// Compute efficiency for a window of work.
pub fn compute_efficiency(input: &EfficiencyInput) -> Efficiency {
    if input.elapsed_seconds <= 0 {
        return Efficiency::NotComputable {
            reason: "end time is not after start time".to_string(),
        };
    }
    if input.standard_seconds == 0 {
        return Efficiency::NotComputable {
            reason: "step has no standard time".to_string(),
        };
    }

    let elapsed = input.elapsed_seconds as f64 / 60.0;
    let output = f64::from(input.output);
    let standard = f64::from(input.standard_seconds);

    let expected = output * standard / 60.0;
    let planned_for_elapsed = (elapsed * 60.0 / standard).floor() as u32;

    Efficiency::Computed(EfficiencyReport {
        elapsed_minutes: elapsed,
        expected_minutes: expected,
        efficiency_percent: (expected / elapsed * 100.0).round() as i64,
        pieces_per_hour: (output / elapsed * 60.0 * 10.0).round() / 10.0,
        planned_for_elapsed,
        variance: i64::from(input.output) - i64::from(planned_for_elapsed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(text: &str) -> NaiveTime {
        parse_clock(text).unwrap()
    }

    #[test]
    fn test_on_standard() {
        let input = EfficiencyInput::from_clock(clock("09:00"), clock("09:50"), 100, 30);
        let report = compute_efficiency(&input);
        assert_eq!(
            report,
            Efficiency::Computed(EfficiencyReport {
                elapsed_minutes: 50.0,
                expected_minutes: 50.0,
                efficiency_percent: 100,
                pieces_per_hour: 120.0,
                planned_for_elapsed: 100,
                variance: 0,
            })
        );
    }

    #[test]
    fn test_below_standard() {
        // 40 pieces at 60s standard over 60 minutes.
        let input = EfficiencyInput::from_clock(clock("13:00"), clock("14:00"), 40, 60);
        let report = compute_efficiency(&input);
        let report = report.report().unwrap();
        assert_eq!(report.efficiency_percent, 67);
        assert_eq!(report.pieces_per_hour, 40.0);
        assert_eq!(report.planned_for_elapsed, 60);
        assert_eq!(report.variance, -20);
    }

    #[test]
    fn test_empty_or_reversed_window_not_computable() {
        let same = EfficiencyInput::from_clock(clock("09:00"), clock("09:00"), 10, 30);
        assert!(matches!(compute_efficiency(&same), Efficiency::NotComputable { .. }));
        let reversed = EfficiencyInput::from_clock(clock("17:00"), clock("08:00"), 10, 30);
        assert!(matches!(compute_efficiency(&reversed), Efficiency::NotComputable { .. }));
    }

    #[test]
    fn test_seconds_are_truncated_to_the_minute() {
        let start = NaiveTime::from_hms_opt(9, 0, 40).unwrap();
        let end = NaiveTime::from_hms_opt(9, 50, 10).unwrap();
        let input = EfficiencyInput::from_clock(start, end, 100, 30);
        assert_eq!(input.elapsed_seconds, 50 * 60);

        let day = chrono::NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let stamped = EfficiencyInput::from_timestamps(
            day.and_time(start).and_utc(),
            day.and_time(end).and_utc(),
            100,
            30,
        );
        assert_eq!(stamped, input);
        let report = compute_efficiency(&stamped);
        let report = report.report().unwrap();
        assert_eq!(report.efficiency_percent, 100);
        assert_eq!(report.variance, 0);
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(clock("07:05"), NaiveTime::from_hms_opt(7, 5, 0).unwrap());
        assert_eq!(clock("07:05:59"), NaiveTime::from_hms_opt(7, 5, 0).unwrap());
        assert!(matches!(parse_clock("7h05"), Err(Error::Validation(_))));
        assert!(parse_clock("").is_err());
    }
}
