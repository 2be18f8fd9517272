//! Fixed-size worker pool with per-task failure isolation

use anyhow::{Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

/// An independent unit of work
///
/// Tasks are immutable descriptors: everything they need is moved in, and
/// everything they produce comes back as `Output`.
pub trait PoolTask: Send + 'static {
    type Output: Send + 'static;

    /// Run the task body
    fn run(&self) -> Self::Output;

    /// Failure value reported when `run` panics
    fn on_panic(&self, message: String) -> Self::Output;
}

/// Human-readable text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Parallelism used when no worker count is configured
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Thread pool running [`PoolTask`]s
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool; `0` workers means one per available core
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 { default_workers() } else { workers };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ripper-worker-{}", i))
            .build()
            .context("Failed to start worker pool")?;

        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every task, handing each output to `on_result` on the calling
    /// thread as soon as it completes
    ///
    /// Completion order is arbitrary. Returns the number of results
    /// delivered, which always equals the number of tasks.
    pub fn execute<T, F>(&self, tasks: Vec<T>, mut on_result: F) -> usize
    where
        T: PoolTask,
        F: FnMut(T::Output),
    {
        let (tx, rx) = mpsc::channel();

        for task in tasks {
            let tx = tx.clone();
            self.pool.spawn(move || {
                let output = run_isolated(&task);
                // Release the descriptor (and anything it shares) before the
                // coordinator can observe the last result.
                drop(task);
                let _ = tx.send(output);
            });
        }
        drop(tx);

        let mut delivered = 0;
        for output in rx {
            on_result(output);
            delivered += 1;
        }
        delivered
    }

    /// Run every task and collect outputs in completion order
    pub fn run_all<T: PoolTask>(&self, tasks: Vec<T>) -> Vec<T::Output> {
        let mut outputs = Vec::with_capacity(tasks.len());
        self.execute(tasks, |output| outputs.push(output));
        outputs
    }
}

fn run_isolated<T: PoolTask>(task: &T) -> T::Output {
    match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(output) => output,
        Err(payload) => task.on_panic(panic_message(payload.as_ref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct NumberTask {
        n: usize,
        explode: bool,
    }

    impl PoolTask for NumberTask {
        type Output = (usize, Result<usize, String>);

        fn run(&self) -> Self::Output {
            if self.explode {
                panic!("task {} blew up", self.n);
            }
            (self.n, Ok(self.n * 2))
        }

        fn on_panic(&self, message: String) -> Self::Output {
            (self.n, Err(message))
        }
    }

    #[test]
    fn test_every_task_reports_once() {
        let pool = WorkerPool::new(4).unwrap();
        let tasks = (0..50).map(|n| NumberTask { n, explode: false }).collect();

        let outputs = pool.run_all(tasks);
        assert_eq!(outputs.len(), 50);
        let seen: HashSet<usize> = outputs.iter().map(|(n, _)| *n).collect();
        assert_eq!(seen.len(), 50);
        assert!(outputs.iter().all(|(n, r)| r == &Ok(n * 2)));
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let pool = WorkerPool::new(3).unwrap();
        let k = 12;
        let j = 7;
        let tasks = (0..k)
            .map(|n| NumberTask { n, explode: n == j })
            .collect();

        let outputs = pool.run_all(tasks);
        assert_eq!(outputs.len(), k);

        let failed: Vec<_> = outputs.iter().filter(|(_, r)| r.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, j);
        assert_eq!(failed[0].1, Err("task 7 blew up".to_string()));
    }

    #[test]
    fn test_unreadable_container_fails_alone() {
        use crate::batch::organizer::OutputOrganizer;
        use crate::batch::task::{ExtractionContext, ExtractionTask};
        use crate::extract::{EntropyConfig, ExtractionCascade, SignatureConfig};
        use std::path::PathBuf;
        use std::sync::Arc;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output");
        std::fs::create_dir_all(&output).unwrap();

        let ctx = Arc::new(ExtractionContext {
            cascade: ExtractionCascade::standard(SignatureConfig::default(), EntropyConfig::default()),
            organizer: OutputOrganizer::new(output.clone(), dir.path().join("staging"), ""),
        });

        let k = 6;
        let missing = dir.path().join("missing.wsb");
        let tasks: Vec<ExtractionTask> = (0..k)
            .map(|n| {
                let key = format!("bank{}", n);
                let source = if n == 3 {
                    missing.clone()
                } else {
                    let path = dir.path().join(format!("{}.wsb", key));
                    std::fs::write(&path, vec![n as u8 + 1; 64]).unwrap();
                    path
                };
                ExtractionTask::new(source, key, Arc::clone(&ctx))
            })
            .collect();

        let outcomes = WorkerPool::new(3).unwrap().run_all(tasks);
        assert_eq!(outcomes.len(), k);

        let failed: Vec<PathBuf> = outcomes
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| o.source.clone())
            .collect();
        assert_eq!(failed, vec![missing]);
        assert!(outcomes
            .iter()
            .filter(|o| !o.is_failed())
            .all(|o| o.substreams().len() == 1));
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(WorkerPool::new(2).unwrap().workers(), 2);
        assert!(WorkerPool::new(0).unwrap().workers() >= 1);
    }

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::new(1).unwrap();
        assert_eq!(pool.execute(Vec::<NumberTask>::new(), |_| {}), 0);
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
