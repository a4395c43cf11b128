//! At most one supervised external job per tab, polled from outside on a fixed tick.
//!
//! Nothing here blocks on the job: every call is a bounded check-and-read. The launcher seam
//! ([`JobLauncher`]/[`JobProcess`]) is what tests replace.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::command::Invocation;
use crate::error::{Error, Result};
use crate::line_decor::decorate;

mod process;

pub use process::{ProcessLauncher, TerminalLauncher, terminal_argv};

/// Decorated output lines kept for failure statuses.
pub const TAIL_LINES: usize = 20;
/// Lines of that tail shown in a failure status.
const STATUS_TAIL_LINES: usize = 5;

/// How long, counted across ticks, an exited job's output may stay open before the
/// job is finalized anyway. Background children can inherit the pipes.
pub const OUTPUT_FLUSH_GRACE: Duration = Duration::from_secs(2);

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_STOPPED: &str = "Process stopped";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExit {
    /// `None` when the job was ended by a signal.
    pub code: Option<i32>,
}

impl JobExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait JobProcess: Send {
    fn pid(&self) -> Option<u32>;
    /// One buffered output line, if any is ready. Never blocks.
    fn try_read_line(&mut self) -> Option<String>;
    fn try_wait(&mut self) -> Result<Option<JobExit>>;
    /// Asks the job to terminate; does not wait for it.
    fn terminate(&mut self);
    fn suspend(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;

    /// True once no further output can arrive.
    fn output_closed(&self) -> bool {
        true
    }
}

pub trait JobLauncher: Send + Sync {
    fn start(&self, invocation: &Invocation) -> Result<Box<dyn JobProcess>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Launching,
    Running,
    Suspended,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Running | JobState::Suspended)
    }
}

/// What to do when asked to launch while a job is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaunchPolicy {
    /// Replace the handle; the earlier job keeps running unsupervised.
    #[default]
    Detach,
    /// Refuse until the active job is stopped or finishes.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub state: JobState,
    /// `None` means nothing new to show this tick.
    pub status: Option<String>,
    pub continue_polling: bool,
    pub elapsed_s: Option<u64>,
}

impl PollOutcome {
    fn idle(state: JobState) -> Self {
        Self {
            state,
            status: Some(STATUS_IDLE.to_string()),
            continue_polling: false,
            elapsed_s: None,
        }
    }

    /// Status text, falling back to an elapsed-time line when nothing new was read.
    pub fn display_text(&self) -> String {
        match (&self.status, self.elapsed_s) {
            (Some(s), _) => s.clone(),
            (None, Some(secs)) => format!("In progress: {secs}s"),
            (None, None) => String::new(),
        }
    }
}

pub struct Supervisor {
    launcher: Arc<dyn JobLauncher>,
    policy: RelaunchPolicy,
    job: Option<Box<dyn JobProcess>>,
    started: Option<Instant>,
    state: JobState,
    tail: VecDeque<String>,
    /// Exit seen while output was still open: when it was seen and the elapsed seconds then.
    exit_seen: Option<(Instant, u64)>,
    flush_grace: Duration,
    /// Stopped or replaced jobs, reaped on later ticks.
    detached: Vec<Box<dyn JobProcess>>,
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn JobLauncher>, policy: RelaunchPolicy) -> Self {
        Self {
            launcher,
            policy,
            job: None,
            started: None,
            state: JobState::Idle,
            tail: VecDeque::with_capacity(TAIL_LINES),
            exit_seen: None,
            flush_grace: OUTPUT_FLUSH_GRACE,
            detached: Vec::new(),
        }
    }

    pub fn with_flush_grace(mut self, grace: Duration) -> Self {
        self.flush_grace = grace;
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.job.as_ref().and_then(|j| j.pid())
    }

    pub fn tail(&self) -> impl Iterator<Item = &str> {
        self.tail.iter().map(String::as_str)
    }

    pub fn detached_len(&self) -> usize {
        self.detached.len()
    }

    pub fn launch(&mut self, invocation: &Invocation) -> Result<()> {
        if self.state.is_active() && self.started.is_some() {
            match self.policy {
                RelaunchPolicy::Reject => {
                    return Err(Error::validation(
                        "A job is already running; stop it before starting another",
                    ));
                }
                RelaunchPolicy::Detach => {
                    if let Some(old) = self.job.take() {
                        tracing::warn!(pid = ?old.pid(), "previous job left running unsupervised");
                        self.detached.push(old);
                    }
                }
            }
        }

        self.state = JobState::Launching;
        self.started = None;
        self.exit_seen = None;
        self.tail.clear();
        match self.launcher.start(invocation) {
            Ok(job) => {
                tracing::info!(pid = ?job.pid(), argv = %invocation.to_shell_string(), "job launched");
                self.job = Some(job);
                self.started = Some(Instant::now());
                self.state = JobState::Running;
                Ok(())
            }
            Err(e) => {
                tracing::error!(argv = %invocation.to_shell_string(), error = %e, "launch failed");
                self.job = None;
                self.state = JobState::Failed;
                Err(Error::launch(format!("Error launching: {e}")))
            }
        }
    }

    fn push_tail(&mut self, raw: &str) -> Option<String> {
        let line = decorate(raw);
        if line.is_empty() {
            return None;
        }
        if self.tail.len() == TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.clone());
        Some(line)
    }

    fn sweep_detached(&mut self) {
        self.detached.retain_mut(|job| {
            while job.try_read_line().is_some() {}
            !matches!(job.try_wait(), Ok(Some(_)) | Err(_))
        });
    }

    fn push_lines(&mut self, lines: Vec<String>) -> Option<String> {
        lines.iter().fold(None, |latest, l| self.push_tail(l).or(latest))
    }

    /// One tick. Reads everything buffered, not one line per tick, and reports the newest line;
    /// older ones only reach the tail. Reports the terminal status once the job has exited and
    /// its output is flushed.
    pub fn poll(&mut self) -> PollOutcome {
        self.sweep_detached();

        let (Some(started), Some(job)) = (self.started, self.job.as_mut()) else {
            self.started = None;
            return PollOutcome::idle(self.state);
        };

        let exit = job.try_wait();
        let lines: Vec<String> = std::iter::from_fn(|| job.try_read_line()).collect();
        let closed = job.output_closed();
        let pid = job.pid();
        let elapsed = started.elapsed().as_secs();
        let latest = self.push_lines(lines);

        match exit {
            Ok(None) => PollOutcome {
                state: self.state,
                status: latest,
                continue_polling: true,
                elapsed_s: Some(elapsed),
            },
            Ok(Some(exit)) => {
                let (seen, elapsed) = *self.exit_seen.get_or_insert((Instant::now(), elapsed));
                if !closed && seen.elapsed() < self.flush_grace {
                    return PollOutcome {
                        state: self.state,
                        status: latest,
                        continue_polling: true,
                        elapsed_s: Some(elapsed),
                    };
                }
                if !closed {
                    tracing::debug!(?pid, "output still open after exit; finalizing");
                }
                self.job = None;
                self.started = None;
                self.exit_seen = None;
                let status = if exit.success() {
                    self.state = JobState::Completed;
                    tracing::info!(?pid, elapsed_s = elapsed, "job finished");
                    format!("Done! ({elapsed}s)")
                } else {
                    self.state = JobState::Failed;
                    tracing::warn!(?pid, exit_code = ?exit.code, elapsed_s = elapsed, "job failed");
                    self.failure_status(exit, elapsed)
                };
                PollOutcome {
                    state: self.state,
                    status: Some(status),
                    continue_polling: false,
                    elapsed_s: Some(elapsed),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "could not query job state");
                if let Some(job) = self.job.take() {
                    self.detached.push(job);
                }
                self.started = None;
                self.exit_seen = None;
                self.state = JobState::Failed;
                PollOutcome {
                    state: self.state,
                    status: Some(format!("Error: {e}")),
                    continue_polling: false,
                    elapsed_s: Some(elapsed),
                }
            }
        }
    }

    fn failure_status(&self, exit: JobExit, elapsed: u64) -> String {
        let mut status = match exit.code {
            Some(code) => format!("Failed with exit code {code} ({elapsed}s)"),
            None => format!("Failed: terminated by signal ({elapsed}s)"),
        };
        let skip = self.tail.len().saturating_sub(STATUS_TAIL_LINES);
        let tail: Vec<&str> = self.tail.iter().skip(skip).map(String::as_str).collect();
        if !tail.is_empty() {
            status.push_str(": ");
            status.push_str(&tail.join(" | "));
        }
        status
    }

    /// Stops the tracked job, if any. Always reports stopped.
    pub fn terminate(&mut self) -> String {
        if let Some(mut job) = self.job.take() {
            tracing::info!(pid = ?job.pid(), "stopping job");
            job.terminate();
            self.detached.push(job);
            self.state = JobState::Stopped;
        }
        self.started = None;
        self.exit_seen = None;
        STATUS_STOPPED.to_string()
    }

    /// Toggles between running and suspended.
    pub fn toggle_pause(&mut self) -> Result<String> {
        let Some(job) = self.job.as_mut() else {
            return Err(Error::validation("Please run the training first"));
        };
        match self.state {
            JobState::Running => {
                job.suspend()?;
                self.state = JobState::Suspended;
                tracing::info!(pid = ?job.pid(), "job paused");
                Ok("Paused".to_string())
            }
            JobState::Suspended => {
                job.resume()?;
                self.state = JobState::Running;
                tracing::info!(pid = ?job.pid(), "job resumed");
                Ok("Resumed".to_string())
            }
            _ => Err(Error::validation("Please run the training first")),
        }
    }

    /// Terminates the tracked job and every detached one.
    pub fn shutdown(&mut self) {
        self.terminate();
        for job in &mut self.detached {
            job.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Script {
        lines: VecDeque<String>,
        exit: Option<JobExit>,
        terminated: bool,
        suspended: bool,
        /// Output pipe still held open, e.g. by a background child.
        open: bool,
    }

    struct FakeProcess(Arc<Mutex<Script>>);

    impl JobProcess for FakeProcess {
        fn pid(&self) -> Option<u32> {
            Some(42)
        }
        fn try_read_line(&mut self) -> Option<String> {
            self.0.lock().unwrap().lines.pop_front()
        }
        fn try_wait(&mut self) -> Result<Option<JobExit>> {
            Ok(self.0.lock().unwrap().exit)
        }
        fn output_closed(&self) -> bool {
            !self.0.lock().unwrap().open
        }
        fn terminate(&mut self) {
            let mut s = self.0.lock().unwrap();
            s.terminated = true;
            s.exit = Some(JobExit { code: None });
        }
        fn suspend(&mut self) -> Result<()> {
            self.0.lock().unwrap().suspended = true;
            Ok(())
        }
        fn resume(&mut self) -> Result<()> {
            self.0.lock().unwrap().suspended = false;
            Ok(())
        }
    }

    struct FakeLauncher {
        script: Arc<Mutex<Script>>,
        fail: bool,
    }

    impl JobLauncher for FakeLauncher {
        fn start(&self, _invocation: &Invocation) -> Result<Box<dyn JobProcess>> {
            if self.fail {
                return Err(Error::launch("No such file or directory"));
            }
            Ok(Box::new(FakeProcess(self.script.clone())))
        }
    }

    fn supervisor(policy: RelaunchPolicy) -> (Supervisor, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script::default()));
        let launcher = Arc::new(FakeLauncher {
            script: script.clone(),
            fail: false,
        });
        (Supervisor::new(launcher, policy), script)
    }

    fn inv() -> Invocation {
        Invocation::new(vec!["tool".into(), "run".into()])
    }

    #[test]
    fn idle_before_launch() {
        let (mut sup, _) = supervisor(RelaunchPolicy::Detach);
        let out = sup.poll();
        assert_eq!(out.status.as_deref(), Some("Idle"));
        assert!(!out.continue_polling);
    }

    #[test]
    fn newest_decorated_line_is_reported() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        sup.launch(&inv()).unwrap();
        assert_eq!(sup.state(), JobState::Running);

        let out = sup.poll();
        assert_eq!(out.status, None);
        assert!(out.continue_polling);
        assert_eq!(out.display_text(), "In progress: 0s");

        script
            .lock()
            .unwrap()
            .lines
            .extend(["│ step 1 │".to_string(), "│ step 2 │".to_string()]);
        let out = sup.poll();
        assert_eq!(out.status.as_deref(), Some("step 2"));
        assert_eq!(sup.tail().collect::<Vec<_>>(), ["step 1", "step 2"]);
    }

    #[test]
    fn exit_zero_reports_done_then_idle() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        sup.launch(&inv()).unwrap();
        script.lock().unwrap().exit = Some(JobExit { code: Some(0) });
        let out = sup.poll();
        assert_eq!(out.status.as_deref(), Some("Done! (0s)"));
        assert!(!out.continue_polling);
        assert_eq!(out.state, JobState::Completed);

        let out = sup.poll();
        assert_eq!(out.status.as_deref(), Some("Idle"));
    }

    #[test]
    fn exit_waits_for_open_output_without_blocking() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        sup.launch(&inv()).unwrap();
        {
            let mut s = script.lock().unwrap();
            s.exit = Some(JobExit { code: Some(0) });
            s.open = true;
        }
        let out = sup.poll();
        assert!(out.continue_polling);
        assert_eq!(out.status, None);
        assert_eq!(out.state, JobState::Running);

        {
            let mut s = script.lock().unwrap();
            s.lines.push_back("last words".into());
            s.open = false;
        }
        let out = sup.poll();
        assert_eq!(out.status.as_deref(), Some("Done! (0s)"));
        assert!(!out.continue_polling);
        assert_eq!(sup.tail().last(), Some("last words"));
    }

    #[test]
    fn open_output_is_abandoned_after_the_grace() {
        let (sup, script) = supervisor(RelaunchPolicy::Detach);
        let mut sup = sup.with_flush_grace(Duration::ZERO);
        sup.launch(&inv()).unwrap();
        {
            let mut s = script.lock().unwrap();
            s.exit = Some(JobExit { code: Some(4) });
            s.open = true;
        }
        let out = sup.poll();
        assert!(!out.continue_polling);
        assert_eq!(out.state, JobState::Failed);
        assert!(out.status.unwrap().contains("exit code 4"));
    }

    #[test]
    fn nonzero_exit_includes_code_and_tail() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        sup.launch(&inv()).unwrap();
        {
            let mut s = script.lock().unwrap();
            s.lines.push_back("colmap not found".into());
            s.exit = Some(JobExit { code: Some(3) });
        }
        let out = sup.poll();
        let status = out.status.unwrap();
        assert!(status.contains("exit code 3"), "status: {status}");
        assert!(status.contains("colmap not found"), "status: {status}");
        assert_eq!(out.state, JobState::Failed);
    }

    #[test]
    fn tail_is_bounded() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        sup.launch(&inv()).unwrap();
        script
            .lock()
            .unwrap()
            .lines
            .extend((0..50).map(|i| format!("line {i}")));
        sup.poll();
        assert_eq!(sup.tail().count(), TAIL_LINES);
        assert_eq!(sup.tail().next(), Some("line 30"));
    }

    #[test]
    fn terminate_is_idempotent() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        assert_eq!(sup.terminate(), "Process stopped");
        sup.launch(&inv()).unwrap();
        assert_eq!(sup.terminate(), "Process stopped");
        assert!(script.lock().unwrap().terminated);
        assert_eq!(sup.state(), JobState::Stopped);
        assert_eq!(sup.terminate(), "Process stopped");
        assert_eq!(sup.poll().status.as_deref(), Some("Idle"));
        // the stopped job was reaped by the poll above
        assert_eq!(sup.detached_len(), 0);
    }

    #[test]
    fn launch_failure_leaves_supervisor_usable() {
        let launcher = Arc::new(FakeLauncher {
            script: Arc::new(Mutex::new(Script::default())),
            fail: true,
        });
        let mut sup = Supervisor::new(launcher, RelaunchPolicy::Detach);
        let err = sup.launch(&inv()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Launch);
        assert!(err.to_string().starts_with("Error launching:"));
        assert_eq!(sup.poll().status.as_deref(), Some("Idle"));
    }

    #[test]
    fn relaunch_policies() {
        let (mut sup, _) = supervisor(RelaunchPolicy::Reject);
        sup.launch(&inv()).unwrap();
        let err = sup.launch(&inv()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let (mut sup, _) = supervisor(RelaunchPolicy::Detach);
        sup.launch(&inv()).unwrap();
        sup.launch(&inv()).unwrap();
        assert_eq!(sup.detached_len(), 1);
        assert_eq!(sup.state(), JobState::Running);
    }

    #[test]
    fn pause_toggles_and_requires_a_job() {
        let (mut sup, script) = supervisor(RelaunchPolicy::Detach);
        let err = sup.toggle_pause().unwrap_err();
        assert_eq!(err.to_string(), "Please run the training first");

        sup.launch(&inv()).unwrap();
        assert_eq!(sup.toggle_pause().unwrap(), "Paused");
        assert!(script.lock().unwrap().suspended);
        assert_eq!(sup.state(), JobState::Suspended);
        assert_eq!(sup.toggle_pause().unwrap(), "Resumed");
        assert!(!script.lock().unwrap().suspended);
    }
}
