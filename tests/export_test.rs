use std::{fs, sync::Arc};

use chrono::{NaiveDate, TimeDelta};
use stmtsnap::{
    AtomicProgress, BoundedPool, CancellationToken, Code, PoolOptions, SnapshotCapture,
    SnapshotRegistry, StatementKey, StatementStatsRow,
    export::{export_all, import_into, read_snapshot, snapshot_file_name, write_snapshot},
    source::memory::MemorySource,
};
use tempfile::TempDir;

fn create_test_capture() -> (SnapshotCapture, MemorySource) {
    let now = NaiveDate::from_ymd_opt(2024, 3, 7)
        .unwrap()
        .and_hms_opt(9, 5, 3)
        .unwrap();
    let source = MemorySource::new(now);
    for (i, sql_id) in ["4ztz048yfq32s", "b6usrg82hwsa3", "c8gnrhxma4tas"]
        .iter()
        .enumerate()
    {
        source.upsert(
            StatementStatsRow {
                key: StatementKey::new(*sql_id, format!("00000000{i:08X}"), "SH"),
                executions: 100 * (i as u64 + 1),
                elapsed_micros: 1_250_000 * (i as u64 + 1),
                cpu_micros: 750_000,
                buffer_gets: 9_000,
                disk_reads: 3,
                rows_processed: 42,
            },
            format!("SELECT /*+ FULL(s) */ SUM(amount_sold) FROM sales s /* {i} */"),
        );
    }

    let pool = BoundedPool::with_connections(
        vec![Box::new(source.connection())],
        PoolOptions::default(),
    );
    let capture = SnapshotCapture::new(
        Arc::new(pool),
        Arc::new(source.clone()),
        SnapshotRegistry::new(),
    );
    (capture, source)
}

#[test]
fn test_captured_snapshot_survives_export() {
    let (capture, _source) = create_test_capture();
    let id = capture
        .run(&AtomicProgress::new(), &CancellationToken::new())
        .unwrap();
    let original = capture.registry().get(id.as_str()).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join(snapshot_file_name(&id));
    write_snapshot(&path, &original).unwrap();

    let restored = read_snapshot(&path).unwrap();
    assert_eq!(&restored, original.as_ref());
    assert_eq!(restored.total_executions(), 600);
}

#[test]
fn test_export_all_then_import_into_fresh_registry() {
    let (capture, source) = create_test_capture();
    for _ in 0..3 {
        capture
            .run(&AtomicProgress::new(), &CancellationToken::new())
            .unwrap();
        source.advance(TimeDelta::minutes(15));
    }

    let dir = TempDir::new().unwrap();
    let paths = export_all(capture.registry(), dir.path()).unwrap();
    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "2024.03.07_09-05-03.snap",
            "2024.03.07_09-20-03.snap",
            "2024.03.07_09-35-03.snap"
        ]
    );

    let fresh = SnapshotRegistry::new();
    for path in paths.iter().rev() {
        import_into(&fresh, path).unwrap();
    }
    assert_eq!(fresh.list_ids(), capture.registry().list_ids());
}

#[test]
fn test_corrupted_file_is_rejected() {
    let (capture, _source) = create_test_capture();
    let id = capture
        .run(&AtomicProgress::new(), &CancellationToken::new())
        .unwrap();

    let dir = TempDir::new().unwrap();
    let paths = export_all(capture.registry(), dir.path()).unwrap();
    let path = &paths[0];

    let text = fs::read_to_string(path).unwrap();
    fs::write(path, text.replace("SUM(amount_sold)", "SUM(amount_sald)")).unwrap();

    let fresh = SnapshotRegistry::new();
    let err = import_into(&fresh, path).unwrap_err();
    assert_eq!(err.code(), Code::Corruption);
    assert!(!fresh.contains(id.as_str()));
}

#[test]
fn test_truncated_file_is_rejected() {
    let (capture, _source) = create_test_capture();
    capture
        .run(&AtomicProgress::new(), &CancellationToken::new())
        .unwrap();

    let dir = TempDir::new().unwrap();
    let paths = export_all(capture.registry(), dir.path()).unwrap();
    let data = fs::read(&paths[0]).unwrap();
    fs::write(&paths[0], &data[..data.len() / 2]).unwrap();

    assert!(read_snapshot(&paths[0]).unwrap_err().is_corruption());
}
