//! Production history rows and per-worker efficiency summaries.

use std::collections::{BTreeMap, HashMap};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::efficiency::{compute_efficiency, parse_clock, Efficiency, EfficiencyInput};

/// One row of recorded production: a worker on a step for a clock window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    /// Product the work was for
    pub product_name: String,
    /// Step code, e.g. `CFA1`
    pub step_code: String,
    /// Worker display name
    pub worker_name: String,
    /// Day of work
    pub work_date: NaiveDate,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
    /// Completed units
    pub units_produced: u32,
}

/// Efficiency of a single record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordEfficiency {
    /// Step code of the record
    pub step_code: String,
    /// Day of work
    pub work_date: NaiveDate,
    /// Computed figures or why there are none
    pub efficiency: Efficiency,
}

/// Totals for one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    /// Worker display name
    pub worker_name: String,
    /// Records seen
    pub records: usize,
    /// Units over every record
    pub units: u64,
    /// Minutes over computable records
    pub minutes_worked: f64,
    /// Mean efficiency percent over computable records
    pub average_efficiency_percent: Option<f64>,
    /// Records without a computable efficiency
    pub skipped: usize,
    /// Per-record detail in input order
    pub details: Vec<RecordEfficiency>,
}

/// Evaluate one record against the standard times keyed by step code.
pub fn record_efficiency(record: &ProductionRecord, standard_times: &HashMap<String, u32>) -> Efficiency {
    let Some(&standard_seconds) = standard_times.get(&record.step_code) else {
        return Efficiency::NotComputable {
            reason: format!("no standard time for step '{}'", record.step_code),
        };
    };
    let window = parse_clock(&record.start_time).and_then(|s| Ok((s, parse_clock(&record.end_time)?)));
    match window {
        Ok((start, end)) => compute_efficiency(&EfficiencyInput::from_clock(
            start,
            end,
            record.units_produced,
            standard_seconds,
        )),
        Err(e) => Efficiency::NotComputable { reason: e.to_string() },
    }
}

/// Group records by worker and compute efficiency totals, ordered by worker name.
pub fn summarize_by_worker(
    records: &[ProductionRecord],
    standard_times: &HashMap<String, u32>,
) -> Vec<WorkerSummary> {
    let mut by_worker: BTreeMap<&str, Vec<&ProductionRecord>> = BTreeMap::new();
    for record in records {
        by_worker.entry(record.worker_name.as_str()).or_default().push(record);
    }

    by_worker
        .into_iter()
        .map(|(worker, rows)| {
            let details: Vec<RecordEfficiency> = rows
                .iter()
                .map(|r| RecordEfficiency {
                    step_code: r.step_code.clone(),
                    work_date: r.work_date,
                    efficiency: record_efficiency(r, standard_times),
                })
                .collect();

            let computed: Vec<_> = details.iter().filter_map(|d| d.efficiency.report()).collect();
            let average_efficiency_percent = if computed.is_empty() {
                None
            } else {
                Some(computed.iter().map(|r| r.efficiency_percent as f64).sum::<f64>() / computed.len() as f64)
            };

            WorkerSummary {
                worker_name: worker.to_string(),
                records: rows.len(),
                units: rows.iter().map(|r| u64::from(r.units_produced)).sum(),
                minutes_worked: computed.iter().map(|r| r.elapsed_minutes).sum(),
                average_efficiency_percent,
                skipped: details.len() - computed.len(),
                details,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(worker: &str, code: &str, start: &str, end: &str, units: u32) -> ProductionRecord {
        ProductionRecord {
            product_name: "Tenjam White".into(),
            step_code: code.into(),
            worker_name: worker.into(),
            work_date: NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            start_time: start.into(),
            end_time: end.into(),
            units_produced: units,
        }
    }

    fn standards() -> HashMap<String, u32> {
        HashMap::from([("CFA1".to_string(), 30), ("SEW1".to_string(), 60)])
    }

    #[test]
    fn test_summary_per_worker() {
        let records = vec![
            record("Cyndi", "CFA1", "09:00", "09:50", 100),
            record("Maricella", "SEW1", "13:00", "14:00", 40),
            record("Cyndi", "SEW1", "10:00", "11:00", 60),
            record("Cyndi", "UNKNOWN", "11:00", "12:00", 5),
        ];
        let summary = summarize_by_worker(&records, &standards());

        assert_eq!(summary.len(), 2);
        let cyndi = &summary[0];
        assert_eq!(cyndi.worker_name, "Cyndi");
        assert_eq!(cyndi.records, 3);
        assert_eq!(cyndi.units, 165);
        assert_eq!(cyndi.minutes_worked, 110.0);
        assert_eq!(cyndi.average_efficiency_percent, Some(100.0));
        assert_eq!(cyndi.skipped, 1);

        let maricella = &summary[1];
        assert_eq!(maricella.average_efficiency_percent, Some(67.0));
        assert_eq!(maricella.skipped, 0);
    }

    #[test]
    fn test_bad_clock_text_is_skipped() {
        let records = vec![record("Fransisco", "CFA1", "", "09:50", 10)];
        let summary = summarize_by_worker(&records, &standards());
        assert_eq!(summary[0].skipped, 1);
        assert_eq!(summary[0].average_efficiency_percent, None);
        assert_eq!(summary[0].minutes_worked, 0.0);
    }
}
