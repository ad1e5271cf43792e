use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use stmtsnap::{
    BoundedPool, CancellationToken, CaptureFailure, Code, ErrorReporter, Finish, PoolOptions,
    ProgressSink, Result, SnapshotCapture, SnapshotRegistry, StatementConnection, StatementKey,
    StatementStatsRow, Status,
    source::{StatsRows, memory::MemorySource},
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(u64),
    End(u64),
    Current(u64),
    Finished(Finish),
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<Event>>,
    cancel_at: Option<(u64, CancellationToken)>,
}

impl RecordingProgress {
    fn cancelling_at(value: u64, token: CancellationToken) -> Self {
        RecordingProgress {
            events: Mutex::new(Vec::new()),
            cancel_at: Some((value, token)),
        }
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn finished(&self) -> Vec<Finish> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Finished(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn set_start_value(&self, value: u64) {
        self.events.lock().push(Event::Start(value));
    }

    fn set_end_value(&self, value: u64) {
        self.events.lock().push(Event::End(value));
    }

    fn set_current_value(&self, value: u64) {
        self.events.lock().push(Event::Current(value));
        if let Some((at, token)) = &self.cancel_at
            && *at == value
        {
            token.cancel();
        }
    }

    fn inform_finished(&self, finish: Finish) {
        self.events.lock().push(Event::Finished(finish));
    }
}

#[derive(Default)]
struct RecordingReporter {
    failures: Mutex<Vec<CaptureFailure>>,
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, failure: &CaptureFailure) {
        self.failures.lock().push(failure.clone());
    }
}

/// Connection whose cursor dies after `rows_before_failure` rows, or whose
/// query fails outright when that is `None`.
struct FlakyConnection {
    rows: Vec<StatementStatsRow>,
    rows_before_failure: Option<usize>,
}

impl StatementConnection for FlakyConnection {
    fn query_statement_stats(&mut self) -> Result<StatsRows<'_>> {
        let Some(n) = self.rows_before_failure else {
            return Err(Status::source_unavailable(
                "ORA-03113: end-of-file on communication channel",
            ));
        };
        let rows = self.rows.clone().into_iter().take(n).map(Ok);
        let failure = std::iter::once(Err(Status::source_unavailable(
            "ORA-03135: connection lost contact",
        )));
        Ok(Box::new(rows.chain(failure)))
    }
}

fn instant(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 7)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn stats_row(sql_id: &str, executions: u64) -> StatementStatsRow {
    StatementStatsRow {
        key: StatementKey::new(sql_id, "000000008D2E5A10", "HR"),
        executions,
        elapsed_micros: 2_000_000,
        cpu_micros: 1_500_000,
        buffer_gets: 500,
        disk_reads: 2,
        rows_processed: 7,
    }
}

fn populated_source(n: usize) -> MemorySource {
    let source = MemorySource::new(instant(9, 5, 3));
    for i in 0..n {
        source.upsert(
            stats_row(&format!("sql{i:03}"), 10),
            format!("SELECT * FROM employees WHERE department_id = {i}"),
        );
    }
    source
}

fn create_test_capture(
    source: &MemorySource,
    connections: Vec<Box<dyn StatementConnection>>,
    options: PoolOptions,
) -> (SnapshotCapture, Arc<RecordingReporter>) {
    let pool = BoundedPool::with_connections(connections, options);
    let reporter = Arc::new(RecordingReporter::default());
    let capture = SnapshotCapture::new(
        Arc::new(pool),
        Arc::new(source.clone()),
        SnapshotRegistry::new(),
    )
    .with_reporter(reporter.clone());
    (capture, reporter)
}

fn memory_capture(source: &MemorySource) -> (SnapshotCapture, Arc<RecordingReporter>) {
    create_test_capture(
        source,
        vec![Box::new(source.connection())],
        PoolOptions::default(),
    )
}

#[test]
fn test_capture_example_row() {
    let source = MemorySource::new(instant(9, 5, 3));
    source.upsert(stats_row("g4pkmrqrgxg3b", 10), "SELECT * FROM employees");
    let (capture, _) = memory_capture(&source);

    let id = capture
        .run(&RecordingProgress::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(id.as_str(), "2024.03.07 09:05:03");

    let snapshot = capture.registry().get("2024.03.07 09:05:03").unwrap();
    assert_eq!(snapshot.len(), 1);
    let statement = &snapshot.statements()[0];
    assert_eq!(statement.executions, 10);
    assert_eq!(statement.elapsed_seconds, 2.0);
    assert_eq!(statement.cpu_seconds, 1.5);
    assert_eq!(statement.buffer_gets, 500);
    assert_eq!(statement.disk_reads, 2);
    assert_eq!(statement.rows_processed, 7);
    assert_eq!(statement.statement.text, "SELECT * FROM employees");
    assert_eq!(statement.statement.schema, "HR");
}

#[test]
fn test_progress_sequence() {
    let source = populated_source(3);
    let (capture, _) = memory_capture(&source);
    let progress = RecordingProgress::default();

    capture.run(&progress, &CancellationToken::new()).unwrap();

    assert_eq!(
        progress.events(),
        vec![
            Event::Start(0),
            Event::End(3),
            Event::Current(0),
            Event::Current(1),
            Event::Current(2),
            Event::Current(3),
            Event::Finished(Finish::Completed),
        ]
    );
}

#[test]
fn test_empty_shared_pool() {
    let source = populated_source(0);
    let (capture, _) = memory_capture(&source);
    let progress = RecordingProgress::default();

    let id = capture.run(&progress, &CancellationToken::new()).unwrap();

    assert!(capture.registry().get(id.as_str()).unwrap().is_empty());
    assert_eq!(progress.finished(), vec![Finish::Completed]);
}

#[test]
fn test_query_failure_discards_connection() {
    let source = populated_source(2);
    let connections: Vec<Box<dyn StatementConnection>> = vec![Box::new(FlakyConnection {
        rows: vec![],
        rows_before_failure: None,
    })];
    let (capture, reporter) = create_test_capture(&source, connections, PoolOptions::default());
    let progress = RecordingProgress::default();

    let err = capture.run(&progress, &CancellationToken::new()).unwrap_err();
    assert_eq!(err.code(), Code::SourceUnavailable);
    assert!(capture.registry().list_ids().is_empty());
    assert_eq!(progress.finished(), vec![Finish::Failed]);

    let stats = capture.pool().stats();
    assert_eq!(stats.acquires, 1);
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.capacity, 0);

    let failures = reporter.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].snapshot_id.as_ref().map(|id| id.as_str()),
        Some("2024.03.07 09:05:03")
    );
}

#[test]
fn test_cursor_failure_mid_stream() {
    let source = populated_source(5);
    let rows: Vec<_> = (0..5).map(|i| stats_row(&format!("sql{i:03}"), 10)).collect();
    let connections: Vec<Box<dyn StatementConnection>> = vec![Box::new(FlakyConnection {
        rows,
        rows_before_failure: Some(3),
    })];
    let (capture, reporter) = create_test_capture(&source, connections, PoolOptions::default());
    let progress = RecordingProgress::default();

    let err = capture.run(&progress, &CancellationToken::new()).unwrap_err();
    assert!(err.is_source_unavailable());
    assert!(progress.events().contains(&Event::Current(3)));
    assert!(!progress.events().contains(&Event::Current(4)));
    assert_eq!(progress.finished(), vec![Finish::Failed]);
    assert!(capture.registry().is_empty());

    let stats = capture.pool().stats();
    assert_eq!(stats.acquires, 1);
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.discarded, 1);
    assert_eq!(reporter.failures.lock().len(), 1);

    // No live connections remain, so the next run fails fast.
    let err = capture
        .run(&RecordingProgress::default(), &CancellationToken::new())
        .unwrap_err();
    assert!(err.is_pool_exhausted());
    assert_eq!(reporter.failures.lock().len(), 2);
}

#[test]
fn test_pool_exhausted_is_reported() {
    let source = populated_source(2);
    let (capture, reporter) = create_test_capture(
        &source,
        vec![Box::new(source.connection())],
        PoolOptions {
            max_size: 1,
            acquire_timeout: Some(Duration::from_millis(20)),
        },
    );
    let held = capture.pool().acquire().unwrap();
    let progress = RecordingProgress::default();

    let err = capture.run(&progress, &CancellationToken::new()).unwrap_err();
    assert!(err.is_pool_exhausted());
    assert_eq!(progress.finished(), vec![Finish::Failed]);
    assert!(capture.registry().is_empty());
    assert_eq!(reporter.failures.lock().len(), 1);

    capture.pool().release(held);
    assert!(
        capture
            .run(&RecordingProgress::default(), &CancellationToken::new())
            .is_ok()
    );
}

#[test]
fn test_cancel_between_rows() {
    let source = populated_source(5);
    let (capture, reporter) = memory_capture(&source);
    let token = CancellationToken::new();
    let progress = RecordingProgress::cancelling_at(2, token.clone());

    let err = capture.run(&progress, &token).unwrap_err();
    assert_eq!(err.code(), Code::Cancelled);
    assert_eq!(progress.finished(), vec![Finish::Cancelled]);
    assert!(!progress.events().contains(&Event::Current(3)));
    assert!(capture.registry().is_empty());
    assert!(reporter.failures.lock().is_empty());

    let stats = capture.pool().stats();
    assert_eq!(stats.acquires, 1);
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.discarded, 0);
    assert_eq!(capture.statistics().captures_cancelled(), 1);
}

#[test]
fn test_server_clock_used_for_id() {
    let source = populated_source(1);
    let (capture, _) = memory_capture(&source);

    source.set_now(instant(23, 59, 59));
    let id = capture
        .run(&RecordingProgress::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(id.as_str(), "2024.03.07 23:59:59");
    assert_eq!(id.instant().unwrap(), instant(23, 59, 59));
}

#[test]
fn test_same_second_collision_overwrites() {
    let source = populated_source(1);
    let (capture, _) = memory_capture(&source);

    let first = capture
        .run(&RecordingProgress::default(), &CancellationToken::new())
        .unwrap();
    source.upsert(stats_row("late", 1), "SELECT 1 FROM dual");
    let second = capture
        .run(&RecordingProgress::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(capture.registry().len(), 1);
    assert_eq!(capture.registry().get(first.as_str()).unwrap().len(), 2);
    assert_eq!(capture.statistics().snapshots_overwritten(), 1);
}
