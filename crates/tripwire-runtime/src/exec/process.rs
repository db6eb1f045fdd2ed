//! Process execution collaborator

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Captured output is truncated to this many bytes.
pub const OUTPUT_CAP: usize = 8 * 1024;

/// How one process invocation terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process ran to completion with this exit code
    Exited(i32),
    /// Process was terminated by this signal
    Signaled(i32),
    /// Process never started
    NoStart(String),
}

/// Outcome of one process invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub status: ProcessStatus,
    /// Combined stdout + stderr, capped at [`OUTPUT_CAP`]
    pub output: String,
    pub wall: Duration,
    pub user: Duration,
    pub system: Duration,
}

impl ProcessOutcome {
    pub fn exited(code: i32) -> Self {
        ProcessOutcome {
            status: ProcessStatus::Exited(code),
            output: String::new(),
            wall: Duration::ZERO,
            user: Duration::ZERO,
            system: Duration::ZERO,
        }
    }

    pub fn no_start(reason: impl Into<String>) -> Self {
        ProcessOutcome {
            status: ProcessStatus::NoStart(reason.into()),
            output: String::new(),
            wall: Duration::ZERO,
            user: Duration::ZERO,
            system: Duration::ZERO,
        }
    }
}

/// Runs one external process per call
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn run(&self, path: &str, args: &[String]) -> ProcessOutcome;
}

/// Executor backed by `tokio::process`
///
/// User/system durations are reported as zero; the portable child API does
/// not expose rusage.
#[derive(Debug, Default)]
pub struct SystemProcessExecutor;

#[async_trait]
impl ProcessExecutor for SystemProcessExecutor {
    async fn run(&self, path: &str, args: &[String]) -> ProcessOutcome {
        let start = Instant::now();
        let output = match tokio::process::Command::new(path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => return ProcessOutcome::no_start(e.to_string()),
        };
        let wall = start.elapsed();

        let status = match output.status.code() {
            Some(code) => ProcessStatus::Exited(code),
            None => ProcessStatus::Signaled(signal_of(&output.status)),
        };
        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        ProcessOutcome {
            status,
            output: cap_output(captured),
            wall,
            user: Duration::ZERO,
            system: Duration::ZERO,
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(0)
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> i32 {
    0
}

fn cap_output(mut s: String) -> String {
    if s.len() > OUTPUT_CAP {
        let mut end = OUTPUT_CAP;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Bounded wrapper around a process executor
///
/// Saturation blocks the calling invocation stage; the record stalls until a
/// slot frees up. There is no timeout.
#[derive(Clone)]
pub struct ProcessPool {
    inner: Arc<dyn ProcessExecutor>,
    slots: Arc<Semaphore>,
}

impl ProcessPool {
    pub fn new(inner: Arc<dyn ProcessExecutor>, slots: usize) -> Self {
        ProcessPool {
            inner,
            slots: Arc::new(Semaphore::new(slots)),
        }
    }

    pub async fn run(&self, path: &str, args: &[String]) -> ProcessOutcome {
        let permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => return ProcessOutcome::no_start("executor pool closed"),
        };
        let outcome = self.inner.run(path, args).await;
        drop(permit);
        outcome
    }
}

/// Test executor replaying scripted outcomes per path
///
/// Unscripted paths get exit 0. Every call is recorded for assertion.
#[derive(Default)]
pub struct ScriptedProcessExecutor {
    outcomes: Mutex<HashMap<String, VecDeque<ProcessOutcome>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, path: &str, outcome: ProcessOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessExecutor for ScriptedProcessExecutor {
    async fn run(&self, path: &str, args: &[String]) -> ProcessOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), args.to_vec()));
        self.outcomes
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| ProcessOutcome::exited(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_output_respects_char_boundary() {
        let s = "é".repeat(OUTPUT_CAP);
        let capped = cap_output(s);
        assert!(capped.len() <= OUTPUT_CAP);
        assert!(capped.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn test_scripted_outcomes_in_order() {
        let exec = ScriptedProcessExecutor::new();
        exec.script("/bin/probe", ProcessOutcome::exited(1));
        exec.script("/bin/probe", ProcessOutcome::exited(2));

        let first = exec.run("/bin/probe", &[]).await;
        let second = exec.run("/bin/probe", &[]).await;
        let default = exec.run("/bin/other", &["x".into()]).await;

        assert_eq!(first.status, ProcessStatus::Exited(1));
        assert_eq!(second.status, ProcessStatus::Exited(2));
        assert_eq!(default.status, ProcessStatus::Exited(0));
        assert_eq!(exec.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_pool_limits_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Gauge {
            live: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl ProcessExecutor for Gauge {
            async fn run(&self, _path: &str, _args: &[String]) -> ProcessOutcome {
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(live, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.live.fetch_sub(1, Ordering::SeqCst);
                ProcessOutcome::exited(0)
            }
        }

        let gauge = Arc::new(Gauge {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = ProcessPool::new(gauge.clone(), 2);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.run("/bin/x", &[]).await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }
}
