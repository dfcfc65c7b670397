//! Concurrent batch dispatch: one blocking task per group.

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError};

use tracing::{debug, error, warn};

use crate::error::FileError;
use crate::models::Record;

/// One unit of batch work: an input file, or a link to print.
pub trait BatchItem: Send + Sync + 'static {
    /// Name used when reporting a failure of this item.
    fn label(&self) -> String;
}

impl BatchItem for PathBuf {
    fn label(&self) -> String {
        self.display().to_string()
    }
}

impl BatchItem for String {
    fn label(&self) -> String {
        self.clone()
    }
}

/// A file that could not be fully processed.
#[derive(Debug)]
pub struct FileFailure {
    /// Values gathered before the failure, when the run mode keeps them.
    pub partial: Option<Record>,
    pub error: FileError,
}

impl From<FileError> for FileFailure {
    fn from(error: FileError) -> Self {
        Self {
            partial: None,
            error,
        }
    }
}

/// Receives per-group progress. All methods default to no-ops.
pub trait ProgressObserver: Send + Sync {
    fn on_group_start(&self, _group: usize, _len: usize) {}

    /// `current` is 1-based within the group.
    fn on_item(&self, _group: usize, _current: usize, _len: usize) {}

    fn on_group_finish(&self, _group: usize) {}
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Everything gathered by a dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Rows keyed by file name, and therefore sorted by it.
    pub records: BTreeMap<String, Record>,
    pub succeeded: usize,
    /// `(file, reason)` for every failed file.
    pub failures: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Default)]
struct Collector {
    records: Mutex<BTreeMap<String, Record>>,
    failures: Mutex<Vec<(String, String)>>,
    succeeded: AtomicUsize,
}

impl Collector {
    fn store(&self, record: Record) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = records.insert(record.filename.clone(), record) {
            warn!("Duplicate file name {}, keeping the later row", previous.filename);
        }
    }

    fn fail(&self, item: &impl BatchItem, reason: String) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((item.label(), reason));
    }

    fn into_report(self) -> DispatchReport {
        let mut failures = self.failures.into_inner().unwrap_or_else(PoisonError::into_inner);
        failures.sort();
        DispatchReport {
            records: self.records.into_inner().unwrap_or_else(PoisonError::into_inner),
            succeeded: self.succeeded.into_inner(),
            failures,
        }
    }
}

static PANIC_LOGGING: Once = Once::new();

/// Route panic messages and backtraces through `tracing`.
///
/// Worker panics are caught per file; without this hook the backtrace of the
/// panic site would be lost.
pub fn install_panic_logging() {
    PANIC_LOGGING.call_once(|| {
        panic::set_hook(Box::new(|info| {
            let backtrace = Backtrace::force_capture();
            error!("worker panicked: {}\n{}", info, backtrace);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `worker` over every item, one blocking task per group.
///
/// Items of a group are processed in order. A panic inside `worker` fails
/// only that item; the group carries on with its next item. Returns after
/// every task has finished.
pub async fn dispatch<T, F>(
    groups: Vec<Vec<T>>,
    worker: Arc<F>,
    progress: Arc<dyn ProgressObserver>,
) -> DispatchReport
where
    T: BatchItem,
    F: Fn(&T) -> Result<Record, FileFailure> + Send + Sync + 'static,
{
    let collector = Arc::new(Collector::default());
    let mut handles = Vec::with_capacity(groups.len());

    for (index, group) in groups.into_iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let worker = Arc::clone(&worker);
        let progress = Arc::clone(&progress);
        let collector = Arc::clone(&collector);
        let first = group[0].label();

        let handle = tokio::task::spawn_blocking(move || {
            run_group(index, &group, worker.as_ref(), progress.as_ref(), &collector);
        });
        handles.push((index, first, handle));
    }

    for (index, first, handle) in handles {
        if let Err(e) = handle.await {
            // Per-item panics are caught inside the task; this is a last resort.
            error!("Group {} (starting at {}) aborted: {}", index, first, e);
        }
    }

    match Arc::try_unwrap(collector) {
        Ok(collector) => collector.into_report(),
        Err(_) => {
            error!("Result collector still shared after all groups joined");
            DispatchReport::default()
        }
    }
}

fn run_group<T, F>(
    index: usize,
    group: &[T],
    worker: &F,
    progress: &dyn ProgressObserver,
    collector: &Collector,
) where
    T: BatchItem,
    F: Fn(&T) -> Result<Record, FileFailure>,
{
    let len = group.len();
    progress.on_group_start(index, len);
    debug!("Group {} processing {} files", index, len);

    for (i, item) in group.iter().enumerate() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker(item)));

        match outcome {
            Ok(Ok(record)) => {
                collector.succeeded.fetch_add(1, Ordering::Relaxed);
                collector.store(record);
            }
            Ok(Err(failure)) => {
                warn!("Failed to process {}: {}", item.label(), failure.error);
                collector.fail(item, failure.error.to_string());
                if let Some(partial) = failure.partial {
                    collector.store(partial);
                }
            }
            Err(payload) => {
                let error = FileError::Panicked(panic_message(payload.as_ref()));
                error!("Failed to process {}: {}", item.label(), error);
                collector.fail(item, error.to_string());
            }
        }

        progress.on_item(index, i + 1, len);
    }

    progress.on_group_finish(index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("in/f{i:02}.pdf"))).collect()
    }

    fn record_for(file: &Path) -> Record {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        let mut record = Record::new(name.clone());
        record.insert("code", name);
        record
    }

    #[derive(Default)]
    struct Counting {
        items: AtomicUsize,
        groups: AtomicUsize,
    }

    impl ProgressObserver for Counting {
        fn on_item(&self, _group: usize, _current: usize, _len: usize) {
            self.items.fetch_add(1, Ordering::SeqCst);
        }

        fn on_group_finish(&self, _group: usize) {
            self.groups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_all_rows_sorted() {
        let groups = partition(&files(10), 3);
        assert_eq!(
            groups.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![4, 3, 3]
        );

        let progress = Arc::new(Counting::default());
        let report = dispatch(
            groups,
            Arc::new(|f: &PathBuf| -> Result<Record, FileFailure> { Ok(record_for(f)) }),
            progress.clone(),
        )
        .await;

        assert_eq!(report.succeeded, 10);
        assert_eq!(report.failed(), 0);
        let names: Vec<&String> = report.records.keys().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 10);
        assert_eq!(progress.items.load(Ordering::SeqCst), 10);
        assert_eq!(progress.groups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panic_isolated_to_one_file() {
        let groups = partition(&files(6), 2);
        let worker = |f: &PathBuf| -> Result<Record, FileFailure> {
            if f.ends_with("f02.pdf") {
                panic!("corrupt xref table");
            }
            Ok(record_for(f))
        };

        let report = dispatch(groups, Arc::new(worker), Arc::new(NoProgress)).await;

        assert_eq!(report.succeeded, 5);
        assert_eq!(report.failed(), 1);
        assert!(report.failures[0].1.contains("corrupt xref table"));
        assert!(!report.records.contains_key("f02.pdf"));
        // f04 shares the group with f02 and still ran.
        assert!(report.records.contains_key("f04.pdf"));
    }

    #[tokio::test]
    async fn test_failures_keep_partial_rows() {
        let worker = |f: &PathBuf| -> Result<Record, FileFailure> {
            let record = record_for(f);
            if f.ends_with("f01.pdf") {
                return Err(FileFailure {
                    partial: Some(record),
                    error: FileError::CoordinatesBlank,
                });
            }
            if f.ends_with("f02.pdf") {
                return Err(FileError::MissingPage {
                    page: 2,
                    file: "f02.pdf".to_string(),
                }
                .into());
            }
            Ok(record)
        };

        let report = dispatch(partition(&files(3), 1), Arc::new(worker), Arc::new(NoProgress)).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 2);
        assert!(report.records.contains_key("f01.pdf"));
        assert!(!report.records.contains_key("f02.pdf"));
    }

    #[test]
    fn test_collector_survives_poisoned_lock() {
        let collector = Collector::default();
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _records = collector.records.lock().unwrap();
                let _failures = collector.failures.lock().unwrap();
                panic!("poison both locks");
            })
            .join()
        });
        assert!(collector.records.is_poisoned());

        collector.store(record_for(Path::new("in/a.pdf")));
        collector.fail(&PathBuf::from("in/b.pdf"), "broken".to_string());

        let report = collector.into_report();
        assert!(report.records.contains_key("a.pdf"));
        assert_eq!(report.failures, vec![("in/b.pdf".to_string(), "broken".to_string())]);
    }

    #[tokio::test]
    async fn test_string_items() {
        let links = vec![
            "https://a.example/1".to_string(),
            "https://a.example/2".to_string(),
            "ftp://b.example/3".to_string(),
        ];
        let worker = |link: &String| -> Result<Record, FileFailure> {
            if !link.starts_with("https") {
                return Err(FileError::Unsupported(link.clone()).into());
            }
            Ok(Record::new(link.clone()))
        };

        let report = dispatch(partition(&links, 2), Arc::new(worker), Arc::new(NoProgress)).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures[0].0, "ftp://b.example/3");
    }

    #[tokio::test]
    async fn test_no_groups() {
        let report = dispatch(
            Vec::new(),
            Arc::new(|f: &PathBuf| -> Result<Record, FileFailure> { Ok(record_for(f)) }),
            Arc::new(NoProgress),
        )
        .await;
        assert!(report.records.is_empty());
    }
}
