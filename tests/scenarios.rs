//! End-to-end scenarios and properties over the public tracker API.

use chrono::{NaiveDate, NaiveTime, Timelike};
use downtime_tracker::{
    Catalog, CorruptPolicy, CsvTable, Ledger, NewDowntime, Rejection, Store, Tracker,
    TrackerError, DEFAULT_FAULTS,
};
use proptest::prelude::*;
use tempfile::TempDir;

const MACHINES: [&str; 3] = ["LVD", "Euromac 1", "Euromac 2"];

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn lvd_single_entry_exports_one_row() {
    let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
    let record = tracker
        .record_downtime(
            "LVD",
            NewDowntime {
                date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                fault: "Idle time (800)".into(),
                start_time: hm(8, 0),
                duration_minutes: 45,
            },
        )
        .unwrap();
    assert_eq!(record.end_time(), hm(8, 45));

    let export = tracker.export("LVD").unwrap();
    let text = String::from_utf8(export.bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "Date,Fault,Start Time,Downtime (min),End Time",
            "2024-01-10,Idle time (800),08:00,45,08:45",
        ]
    );
    assert_eq!(export.file_name, "LVD_downtime_records.csv");
}

#[test]
fn default_catalog_can_be_pruned_to_one_but_not_zero() {
    let mut tracker = Tracker::in_memory(&MACHINES).unwrap();

    tracker.delete_fault("LVD", "Tool Broken (809)").unwrap();
    let expected: Vec<&str> = DEFAULT_FAULTS
        .iter()
        .copied()
        .filter(|f| *f != "Tool Broken (809)")
        .collect();
    assert_eq!(tracker.catalog("LVD").unwrap().labels(), expected.as_slice());

    for label in &expected[1..] {
        tracker.delete_fault("LVD", label).unwrap();
    }
    assert_eq!(tracker.catalog("LVD").unwrap().labels(), ["Idle time (800)"]);

    let err = tracker.delete_fault("LVD", "Idle time (800)").unwrap_err();
    assert!(matches!(err, TrackerError::Validation(Rejection::LastRemainingFault)));
    assert_eq!(tracker.catalog("LVD").unwrap().len(), 1);
}

#[test]
fn persistent_session_round_trips_through_files() {
    let dir = TempDir::new().unwrap();
    {
        let store = Store::open(dir.path(), CorruptPolicy::Abort).unwrap();
        let mut tracker = Tracker::open(&MACHINES, store).unwrap();
        tracker.add_fault("Euromac 2", "Punch stuck, \"T4\"").unwrap();
        tracker
            .record_downtime(
                "Euromac 2",
                NewDowntime {
                    date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                    fault: "Punch stuck, \"T4\"".into(),
                    start_time: hm(22, 15),
                    duration_minutes: 150,
                },
            )
            .unwrap();
    }

    let store = Store::open(dir.path(), CorruptPolicy::Abort).unwrap();
    let tracker = Tracker::open(&MACHINES, store).unwrap();
    let ledger = tracker.ledger("Euromac 2").unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.records()[0].end_time(), hm(0, 45));
    assert_eq!(ledger.records()[0].fault(), "Punch stuck, \"T4\"");
    assert!(tracker.ledger("LVD").unwrap().is_empty());
}

#[test]
fn malformed_file_stops_startup_unless_quarantined() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("LVD_downtime.csv"), "garbage\n1,2,3\n").unwrap();

    {
        let store = Store::open(dir.path(), CorruptPolicy::Abort).unwrap();
        let err = Tracker::open(&MACHINES, store).unwrap_err();
        assert!(matches!(err, TrackerError::Parse { .. }));
    }

    let store = Store::open(dir.path(), CorruptPolicy::Quarantine).unwrap();
    let tracker = Tracker::open(&MACHINES, store).unwrap();
    assert!(tracker.ledger("LVD").unwrap().is_empty());
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Append { fault: usize, h: u32, m: u32, minutes: u32 },
    Delete(Vec<usize>),
    AddFault(String),
    DeleteFault(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..16, 0u32..24, 0u32..60, 1u32..2000).prop_map(|(fault, h, m, minutes)| Op::Append {
            fault,
            h,
            m,
            minutes
        }),
        prop::collection::vec(1usize..8, 0..3).prop_map(Op::Delete),
        "[A-Za-z ,\"()0-9]{0,12}".prop_map(Op::AddFault),
        (0usize..16).prop_map(Op::DeleteFault),
    ]
}

proptest! {
    #[test]
    fn end_time_is_start_plus_duration_mod_day(h in 0u32..24, m in 0u32..60, minutes in 1u32..100_000) {
        let mut ledger = Ledger::new();
        let record = ledger
            .append(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), "x", hm(h, m), minutes)
            .unwrap();
        let expected = (h * 60 + m + minutes) % (24 * 60);
        prop_assert_eq!(record.end_time().hour() * 60 + record.end_time().minute(), expected);
    }

    #[test]
    fn tables_round_trip_after_any_history(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut ledger = Ledger::new();
        let mut catalog = Catalog::with_defaults();

        for op in ops {
            match op {
                Op::Append { fault, h, m, minutes } => {
                    let label = catalog.labels()[fault % catalog.len()].clone();
                    ledger
                        .append(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &label, hm(h, m), minutes)
                        .unwrap();
                }
                Op::Delete(rows) => {
                    let len = ledger.len();
                    let before = ledger.clone();
                    match ledger.delete_by_indices(rows.clone()) {
                        Ok(n) => prop_assert_eq!(ledger.len(), len - n),
                        Err(_) => prop_assert_eq!(&ledger, &before),
                    }
                    let numbers: Vec<usize> = ledger.rows().map(|(n, _)| n).collect();
                    prop_assert_eq!(numbers, (1..=ledger.len()).collect::<Vec<_>>());
                }
                Op::AddFault(label) => {
                    let before = catalog.len();
                    match catalog.add_fault(&label) {
                        Ok(_) => prop_assert_eq!(catalog.len(), before + 1),
                        Err(_) => prop_assert_eq!(catalog.len(), before),
                    }
                }
                Op::DeleteFault(i) => {
                    let label = catalog.labels()[i % catalog.len()].clone();
                    let before = catalog.len();
                    match catalog.delete_fault(&label) {
                        Ok(()) => prop_assert_eq!(catalog.len(), before - 1),
                        Err(_) => prop_assert_eq!(before, 1),
                    }
                }
            }
            prop_assert!(!catalog.is_empty());
        }

        let bytes = ledger.to_csv_bytes().unwrap();
        prop_assert_eq!(Ledger::from_csv_bytes(&bytes).unwrap(), ledger);
        let bytes = catalog.to_csv_bytes().unwrap();
        prop_assert_eq!(Catalog::from_csv_bytes(&bytes).unwrap(), catalog);
    }
}
