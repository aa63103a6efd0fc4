mod common;

use std::sync::Arc;

use anm_reports::{
    Anm, AnmReports, CacheableRepository, Dates, Error, FixedClock, Indicator, Metric,
    MetricsMonitor, ReportDataStore, ReportsDb, SaveOutcome,
};

use common::{MemoryStore, date, memory_reports, test_config};

#[test]
fn save_writes_quantity_identical_rows() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let outcome = reports
        .save("ANM1", "case-1", "ANC", "2024-05-10", Some("4"))
        .unwrap();

    assert_eq!(
        outcome,
        SaveOutcome {
            requested: 4,
            written: 4,
            failed: 0
        }
    );
    let rows = store.rows();
    assert_eq!(rows.len(), 4);
    for row in &rows {
        assert_eq!(row.anm.anm_identifier, "ANM1");
        assert_eq!(row.external_id, "case-1");
        assert_eq!(row.indicator.indicator, "ANC");
        assert_eq!(row.date.date, date(2024, 5, 10));
    }
    let mut ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn missing_quantity_writes_one_row() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let outcome = reports.save("ANM1", "case-1", "ANC", "2024-05-10", None).unwrap();

    assert!(outcome.is_complete());
    assert_eq!(store.rows().len(), 1);
}

#[test]
fn zero_quantity_writes_nothing() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let outcome = reports.save("ANM1", "case-1", "ANC", "2024-05-10", Some("0")).unwrap();

    assert_eq!(outcome.written, 0);
    assert!(store.rows().is_empty());
}

#[test]
fn negative_quantity_writes_nothing() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let outcome = reports.save("ANM1", "case-1", "ANC", "2024-05-10", Some("-1")).unwrap();

    assert_eq!(
        outcome,
        SaveOutcome {
            requested: 0,
            written: 0,
            failed: 0
        }
    );
    assert!(store.rows().is_empty());
}

#[test]
fn quantity_beyond_signed_range_is_rejected() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let err = reports
        .save("ANM1", "case-1", "ANC", "2024-05-10", Some("2147483648"))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidQuantity { .. }));
    assert_eq!(store.resolutions(), (0, 0, 0));
}

#[test]
fn repeated_saves_resolve_references_once() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    reports.save("ANM1", "case-1", "ANC", "2024-05-10", None).unwrap();
    reports.save("ANM1", "case-2", "ANC", "2024-05-10", Some("2")).unwrap();

    assert_eq!(store.resolutions(), (1, 1, 1));
    assert!(reports.anm_cache().is_cached(&Anm::new("ANM1")));
    assert!(reports.indicator_cache().is_cached(&Indicator::new("ANC")));
    assert!(reports.dates_cache().is_cached(&Dates::new(date(2024, 5, 10))));
}

#[test]
fn row_failure_is_counted_and_the_batch_continues() {
    let store = MemoryStore::new();
    store.fail_insert_attempts(&[1, 3]);
    let reports = memory_reports(&store, date(2024, 6, 15));

    let outcome = reports
        .save("ANM1", "case-1", "ANC", "2024-05-10", Some("5"))
        .unwrap();

    assert_eq!(
        outcome,
        SaveOutcome {
            requested: 5,
            written: 3,
            failed: 2
        }
    );
    assert!(!outcome.is_complete());
    assert_eq!(store.rows().len(), 3);
}

#[test]
fn row_failure_evicts_resolved_references() {
    let store = MemoryStore::new();
    store.fail_insert_attempts(&[0]);
    let reports = memory_reports(&store, date(2024, 6, 15));

    reports.save("ANM1", "case-1", "ANC", "2024-05-10", None).unwrap();

    assert!(!reports.anm_cache().is_cached(&Anm::new("ANM1")));
    assert!(!reports.indicator_cache().is_cached(&Indicator::new("ANC")));
    assert!(!reports.dates_cache().is_cached(&Dates::new(date(2024, 5, 10))));

    // The next save goes back to the store for all three.
    reports.save("ANM1", "case-1", "ANC", "2024-05-10", None).unwrap();
    assert_eq!(store.resolutions(), (2, 2, 2));
    assert_eq!(store.rows().len(), 1);
}

#[test]
fn malformed_date_fails_before_touching_the_store() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let err = reports
        .save("ANM1", "case-1", "ANC", "10-05-2024", None)
        .unwrap_err();

    assert!(matches!(err, Error::InvalidDate { ref value, .. } if value == "10-05-2024"));
    assert!(store.rows().is_empty());
    assert_eq!(store.resolutions(), (0, 0, 0));
}

#[test]
fn malformed_quantity_is_propagated() {
    let store = MemoryStore::new();
    let reports = memory_reports(&store, date(2024, 6, 15));

    let err = reports
        .save("ANM1", "case-1", "ANC", "2024-05-10", Some("three"))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidQuantity { .. }));
    assert!(store.rows().is_empty());
}

#[test]
fn save_records_cache_and_insert_probes() {
    let store = MemoryStore::new();
    let monitor = Arc::new(MetricsMonitor::new());
    let reports = AnmReports::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        monitor.clone(),
        &test_config(),
    )
    .unwrap()
    .with_clock(Arc::new(FixedClock(date(2024, 6, 15))));

    reports.save("ANM1", "case-1", "ANC", "2024-05-10", Some("2")).unwrap();
    reports.save("ANM1", "case-1", "ANC", "2024-05-11", None).unwrap();

    assert_eq!(monitor.stats(Metric::ReportingAnmReportsCacheTime).count, 2);
    assert_eq!(monitor.stats(Metric::ReportingAnmReportsInsertTime).count, 2);
}

#[test]
fn concurrent_saves_share_one_set_of_references() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = Arc::new(ReportsDb::open(dir.path().join("reports.db")).unwrap());
    let reports = Arc::new(
        AnmReports::from_db(db.clone(), Arc::new(MetricsMonitor::new()), &test_config())
            .unwrap()
            .with_clock(Arc::new(FixedClock(date(2024, 6, 15)))),
    );
    let quantities = [1u32, 2, 3, 4, 5, 6];

    std::thread::scope(|s| {
        for (worker, quantity) in quantities.iter().enumerate() {
            let reports = &reports;
            s.spawn(move || {
                let external_id = format!("case-{}", worker);
                let quantity = quantity.to_string();
                let outcome = reports
                    .save("ANM1", &external_id, "ANC", "2024-05-10", Some(quantity.as_str()))
                    .unwrap();
                assert!(outcome.is_complete());
            });
        }
    });

    let expected: u32 = quantities.iter().sum();
    assert_eq!(db.report_row_count().unwrap(), expected as usize);

    let rows = db.fetch_by_anm_and_date("ANM1", date(2024, 1, 1)).unwrap();
    assert_eq!(rows.len(), expected as usize);
    assert!(rows.iter().all(|row| row.anm == rows[0].anm));
    assert!(rows.iter().all(|row| row.indicator == rows[0].indicator));
    assert!(rows.iter().all(|row| row.date == rows[0].date));

    assert_eq!(CacheableRepository::<Anm>::find_all(db.as_ref()).unwrap().len(), 1);
    assert_eq!(CacheableRepository::<Indicator>::find_all(db.as_ref()).unwrap().len(), 1);
    assert_eq!(CacheableRepository::<Dates>::find_all(db.as_ref()).unwrap().len(), 1);
}
