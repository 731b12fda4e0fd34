//! Periodic snapshot persistence
//!
//! The engine loads the current snapshot into the store, writes it back
//! once, and then rewrites it every cooldown from a background task. The
//! next tick is only scheduled after the previous flush finished, and the
//! task exits when its cancellation token fires.

use super::memory::RecordStore;
use super::snapshot::{read_snapshot, write_snapshot, LoadPolicy, SnapshotFile};
use crate::error::SnapshotError;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct PersistenceOptions {
    /// Pause between the end of one flush and the start of the next
    pub cooldown: Duration,
    pub load_policy: LoadPolicy,
    /// Load the newest earlier snapshot when today's file does not exist yet
    pub carry_over: bool,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            load_policy: LoadPolicy::Skip,
            carry_over: false,
        }
    }
}

pub struct PersistenceEngine {
    store: Arc<RecordStore>,
    snapshot: SnapshotFile,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PersistenceEngine {
    /// Load the snapshot into `store`, flush once, and start the periodic task.
    ///
    /// The task stops when `cancel` is cancelled, either directly or through
    /// [`PersistenceEngine::stop`].
    pub async fn start(
        store: Arc<RecordStore>,
        snapshot: SnapshotFile,
        options: PersistenceOptions,
        cancel: CancellationToken,
    ) -> Result<Self, SnapshotError> {
        let today = Local::now().date_naive();
        let mut source = snapshot.path_for(today);
        if options.carry_over && !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            if let Some(previous) = snapshot.latest_before(today).await? {
                info!("Carrying over records from {}", previous.display());
                source = previous;
            }
        }

        let records = read_snapshot(&source, options.load_policy).await?;
        info!("Loaded {} records from {}", records.len(), source.display());
        store.restore(records).await;

        if let Err(e) = flush(&store, &snapshot, today).await {
            error!("Initial snapshot flush failed: {}", e);
        }

        let task = tokio::spawn(run_flush_loop(
            store.clone(),
            snapshot.clone(),
            options.cooldown,
            cancel.clone(),
        ));

        Ok(Self {
            store,
            snapshot,
            cancel,
            task,
        })
    }

    /// Cancel the periodic task, wait for an in-flight flush, then flush once
    /// more so nothing accepted since the last tick is lost.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Persistence task ended abnormally: {}", e);
        }
        match flush(&self.store, &self.snapshot, Local::now().date_naive()).await {
            Ok(count) => info!("Final snapshot written ({} records)", count),
            Err(e) => error!("Final snapshot flush failed: {}", e),
        }
    }
}

/// Write the store to the snapshot for `date`. A flush after midnight lands
/// in the new day's file.
async fn flush(
    store: &RecordStore,
    snapshot: &SnapshotFile,
    date: NaiveDate,
) -> Result<usize, SnapshotError> {
    let records = store.list().await;
    let path = snapshot.path_for(date);
    write_snapshot(&path, &records).await?;
    debug!("Flushed {} records to {}", records.len(), path.display());
    Ok(records.len())
}

async fn run_flush_loop(
    store: Arc<RecordStore>,
    snapshot: SnapshotFile,
    cooldown: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(cooldown) => {}
        }

        if let Err(e) = flush(&store, &snapshot, Local::now().date_naive()).await {
            error!("Snapshot flush failed, retrying in {:?}: {}", cooldown, e);
        }
    }
    debug!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use postkeep_types::Record;

    fn record(n: u32) -> Record {
        Record {
            unique_id: format!("00000000-0000-0000-0000-{:012}", n),
            username: format!("user{}", n),
            vote_count: n.to_string(),
            ..Default::default()
        }
    }

    fn today_path(snapshot: &SnapshotFile) -> std::path::PathBuf {
        snapshot.path_for(Local::now().date_naive())
    }

    fn options(cooldown: Duration) -> PersistenceOptions {
        PersistenceOptions {
            cooldown,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_writes_initial_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path(), "reddit");
        let store = Arc::new(RecordStore::new());

        let engine = PersistenceEngine::start(
            store,
            snapshot.clone(),
            options(Duration::from_secs(3600)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(today_path(&snapshot).exists());
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_periodic_flush_picks_up_new_records() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path(), "reddit");
        let store = Arc::new(RecordStore::new());

        let engine = PersistenceEngine::start(
            store.clone(),
            snapshot.clone(),
            options(Duration::from_millis(20)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        store.insert(record(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let on_disk = read_snapshot(&today_path(&snapshot), LoadPolicy::Abort)
            .await
            .unwrap();
        assert_eq!(on_disk, vec![record(1)]);
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_flushes_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path(), "reddit");
        let store = Arc::new(RecordStore::new());

        let engine = PersistenceEngine::start(
            store.clone(),
            snapshot.clone(),
            options(Duration::from_secs(3600)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        for n in 0..10 {
            store.insert(record(n)).await.unwrap();
        }
        engine.stop().await;

        let reloaded = Arc::new(RecordStore::new());
        let engine = PersistenceEngine::start(
            reloaded.clone(),
            snapshot,
            options(Duration::from_secs(3600)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(reloaded.list().await, store.list().await);
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_task() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let engine = PersistenceEngine::start(
            Arc::new(RecordStore::new()),
            SnapshotFile::new(dir.path(), "reddit"),
            options(Duration::from_millis(10)),
            cancel.clone(),
        )
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !engine.task.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("persistence task should exit after cancellation");
    }

    #[tokio::test]
    async fn test_failed_flush_does_not_stop_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("later");
        let snapshot = SnapshotFile::new(&target, "reddit");
        let store = Arc::new(RecordStore::new());

        let engine = PersistenceEngine::start(
            store.clone(),
            snapshot.clone(),
            options(Duration::from_millis(20)),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(flush(&store, &snapshot, Local::now().date_naive())
            .await
            .is_err());

        store.insert(record(7)).await.unwrap();
        tokio::fs::create_dir_all(&target).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let on_disk = read_snapshot(&today_path(&snapshot), LoadPolicy::Abort)
            .await
            .unwrap();
        assert_eq!(on_disk, vec![record(7)]);
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_flush_after_midnight_switches_file() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path(), "reddit");
        let store = RecordStore::new();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tuesday = monday.succ_opt().unwrap();

        store.insert(record(1)).await.unwrap();
        assert_eq!(flush(&store, &snapshot, monday).await.unwrap(), 1);

        store.insert(record(2)).await.unwrap();
        assert_eq!(flush(&store, &snapshot, tuesday).await.unwrap(), 2);

        let first = read_snapshot(&snapshot.path_for(monday), LoadPolicy::Abort)
            .await
            .unwrap();
        let second = read_snapshot(&snapshot.path_for(tuesday), LoadPolicy::Abort)
            .await
            .unwrap();
        assert_eq!(first, vec![record(1)]);
        assert_eq!(second, vec![record(1), record(2)]);
    }

    #[tokio::test]
    async fn test_carry_over_loads_previous_day() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path(), "reddit");
        let yesterday = Local::now().date_naive().pred_opt().unwrap();
        write_snapshot(&snapshot.path_for(yesterday), &[record(1), record(2)])
            .await
            .unwrap();

        let store = Arc::new(RecordStore::new());
        let engine = PersistenceEngine::start(
            store.clone(),
            snapshot.clone(),
            PersistenceOptions {
                carry_over: true,
                ..options(Duration::from_secs(3600))
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.len().await, 2);
        let today = read_snapshot(&today_path(&snapshot), LoadPolicy::Abort)
            .await
            .unwrap();
        assert_eq!(today, vec![record(1), record(2)]);
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_without_carry_over_new_day_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path(), "reddit");
        let yesterday = Local::now().date_naive().pred_opt().unwrap();
        write_snapshot(&snapshot.path_for(yesterday), &[record(1)])
            .await
            .unwrap();

        let store = Arc::new(RecordStore::new());
        let engine = PersistenceEngine::start(
            store.clone(),
            snapshot,
            options(Duration::from_secs(3600)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.len().await, 0);
        engine.stop().await;
    }
}
