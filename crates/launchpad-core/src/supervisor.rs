//! Process supervision and coordinated shutdown.
//!
//! The [`Supervisor`] owns the live-set of [`ManagedProcess`] entries in launch
//! order. Its loop runs on the caller's thread: each iteration reaps exited
//! processes, forwards whatever output the reader tasks have queued, then
//! sleeps for the poll interval. It never blocks on child I/O.
//!
//! Shutdown is idempotent. The loop uses [`Supervisor::stop_all`], which waits
//! without blocking the runtime so the readers keep collecting output while
//! the groups stop. [`Supervisor::shutdown`] is the blocking version for
//! callers outside the runtime and for `Drop`.

use crate::cancel::CancellationToken;
use crate::config::{LauncherConfig, ServiceName};
use crate::console;
use crate::error::{LaunchpadError, Result};
use crate::platform::{PlatformStrategy, TerminateMode};
use colored::Colorize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Lifecycle of a managed process as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code, `None` when ended by a signal.
    Exited(Option<i32>),
}

/// Destination for child output.
pub trait OutputSink {
    fn line(&mut self, service: ServiceName, stream: OutputStream, text: &str);
}

/// Echoes stdout verbatim and stderr in the warning color.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn line(&mut self, _service: ServiceName, stream: OutputStream, text: &str) {
        match stream {
            OutputStream::Stdout => println!("{}", text),
            OutputStream::Stderr => println!("{}", text.yellow()),
        }
    }
}

/// One line recorded by [`CapturedOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub service: ServiceName,
    pub stream: OutputStream,
    pub text: String,
}

/// Sink that records lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    lines: Arc<Mutex<Vec<CapturedLine>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn lines(&self) -> Vec<CapturedLine> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded text for one service and stream, in arrival order.
    pub fn text_of(&self, service: ServiceName, stream: OutputStream) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.service == service && l.stream == stream)
            .map(|l| l.text)
            .collect()
    }
}

impl OutputSink for CapturedOutput {
    fn line(&mut self, service: ServiceName, stream: OutputStream, text: &str) {
        let entry = CapturedLine {
            service,
            stream,
            text: text.to_string(),
        };
        match self.lines.lock() {
            Ok(mut lines) => lines.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// A running service: child handle, process group and queued output.
pub struct ManagedProcess {
    label: ServiceName,
    pid: u32,
    pgid: u32,
    child: Child,
    stdout_rx: mpsc::Receiver<String>,
    stderr_rx: mpsc::Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    state: ProcessState,
}

impl ManagedProcess {
    /// Take ownership of a freshly spawned child and start one reader task
    /// per piped stream.
    ///
    /// The child must lead its own process group, so the group id equals the
    /// child's pid. Must be called from within a tokio runtime.
    pub fn attach(label: ServiceName, mut child: Child) -> Result<Self> {
        let pid = child.id().ok_or_else(|| LaunchpadError::LaunchFailed {
            service: label.to_string(),
            message: "process exited before it could be tracked".to_string(),
        })?;

        let capacity = LauncherConfig::OUTPUT_QUEUE_CAPACITY;
        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stderr_tx, stderr_rx) = mpsc::channel(capacity);

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(label, OutputStream::Stdout, stdout, stdout_tx));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(label, OutputStream::Stderr, stderr, stderr_tx));
        }

        debug!("Tracking {} (pid {})", label, pid);
        Ok(Self {
            label,
            pid,
            pgid: pid,
            child,
            stdout_rx,
            stderr_rx,
            readers,
            state: ProcessState::Running,
        })
    }

    pub fn label(&self) -> ServiceName {
        self.label
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn pgid(&self) -> u32 {
        self.pgid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Non-blocking exit check. Returns true once the leader has exited.
    pub fn poll_exit(&mut self) -> Result<bool> {
        if let ProcessState::Exited(_) = self.state {
            return Ok(true);
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.state = ProcessState::Exited(status.code());
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(LaunchpadError::Io {
                message: format!("Failed to query status of {} (pid {}): {}", self.label, self.pid, e),
                path: None,
                source: Some(e),
            }),
        }
    }

    /// Every line queued so far, stdout first. Never waits.
    pub fn take_buffered(&mut self) -> (Vec<String>, Vec<String>) {
        (drain_queue(&mut self.stdout_rx), drain_queue(&mut self.stderr_rx))
    }

    /// Forward every queued line to `sink`. Returns the number of lines.
    pub fn drain_into(&mut self, sink: &mut dyn OutputSink) -> usize {
        let (stdout, stderr) = self.take_buffered();
        for line in &stdout {
            sink.line(self.label, OutputStream::Stdout, line);
        }
        for line in &stderr {
            sink.line(self.label, OutputStream::Stderr, line);
        }
        stdout.len() + stderr.len()
    }

    /// Forward output until both pipes reach end of file or `timeout` passes.
    ///
    /// Called once the leader has exited, so lines still in the pipe or in a
    /// reader's buffer are not lost. Returns the number of lines forwarded.
    pub async fn collect_output(
        &mut self,
        sink: &mut dyn OutputSink,
        timeout: Duration,
    ) -> usize {
        let label = self.label;
        let stdout_rx = &mut self.stdout_rx;
        let stderr_rx = &mut self.stderr_rx;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut forwarded = 0;
        let mut timed_out = false;

        while stdout_open || stderr_open {
            let next = tokio::time::timeout_at(deadline, async {
                tokio::select! {
                    line = stdout_rx.recv(), if stdout_open => (OutputStream::Stdout, line),
                    line = stderr_rx.recv(), if stderr_open => (OutputStream::Stderr, line),
                }
            })
            .await;

            match next {
                Ok((stream, Some(line))) => {
                    sink.line(label, stream, &line);
                    forwarded += 1;
                }
                Ok((OutputStream::Stdout, None)) => stdout_open = false,
                Ok((OutputStream::Stderr, None)) => stderr_open = false,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        if timed_out {
            debug!("{} output pipes still open, forwarding what is queued", label);
            forwarded += self.drain_into(sink);
        }
        forwarded
    }

    /// Whether the leader or any other member of its group is still alive.
    fn group_alive(&mut self, strategy: PlatformStrategy) -> bool {
        let leader_exited = self.poll_exit().unwrap_or(true);
        !leader_exited || strategy.group_has_members(self.pgid)
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("pgid", &self.pgid)
            .field("state", &self.state)
            .finish()
    }
}

fn drain_queue(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(line) => lines.push(line),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    lines
}

/// Read `stream` line by line into `tx`. Invalid UTF-8 is replaced, not fatal.
fn spawn_line_reader<R>(
    label: ServiceName,
    kind: OutputStream,
    stream: R,
    tx: mpsc::Sender<String>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c| c == '\n' || c == '\r')
                        .to_string();
                    if tx.send(line).await.is_err() {
                        // Receiver dropped: the process was removed.
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading {} {:?}: {}", label, kind, e);
                    break;
                }
            }
        }
    })
}

const GROUP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Every service exited on its own.
    AllExited,
    /// Cancellation was requested; all groups have been terminated.
    Interrupted,
}

/// Owns the live-set of managed processes.
pub struct Supervisor {
    strategy: PlatformStrategy,
    live: Vec<ManagedProcess>,
    sink: Box<dyn OutputSink>,
    poll_interval: Duration,
    terminate_timeout: Duration,
}

impl Supervisor {
    pub fn new(strategy: PlatformStrategy) -> Self {
        Self {
            strategy,
            live: Vec::new(),
            sink: Box::new(TerminalSink),
            poll_interval: LauncherConfig::POLL_INTERVAL,
            terminate_timeout: LauncherConfig::TERMINATE_TIMEOUT,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Time between the graceful and the forceful termination signal.
    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Add a process to the live-set. Process group ids must be unique.
    pub fn register(&mut self, process: ManagedProcess) -> Result<()> {
        if self.live.iter().any(|p| p.pgid == process.pgid) {
            return Err(LaunchpadError::DuplicateProcessGroup { pgid: process.pgid });
        }
        info!(
            "{} added to supervision (pid {})",
            process.label, process.pid
        );
        self.live.push(process);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Labels of the live-set in launch order.
    pub fn labels(&self) -> Vec<ServiceName> {
        self.live.iter().map(|p| p.label).collect()
    }

    /// Pids of the live-set in launch order.
    pub fn pids(&self) -> Vec<u32> {
        self.live.iter().map(|p| p.pid).collect()
    }

    /// One supervisor iteration: reap exited entries, forward queued output.
    ///
    /// Returns the services removed in this iteration.
    pub async fn poll_once(&mut self) -> Result<Vec<ServiceName>> {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.live.len() {
            if self.live[i].poll_exit()? {
                let mut process = self.live.remove(i);
                process
                    .collect_output(self.sink.as_mut(), LauncherConfig::OUTPUT_DRAIN_TIMEOUT)
                    .await;

                let code = match process.state {
                    ProcessState::Exited(Some(code)) => code.to_string(),
                    _ => "none (signal)".to_string(),
                };
                warn!(
                    "{} (pid {}) exited, exit code: {}",
                    process.label, process.pid, code
                );
                console::warning(&format!(
                    "{} (pid {}) exited, exit code: {}",
                    process.label, process.pid, code
                ));
                removed.push(process.label);
                continue;
            }
            self.live[i].drain_into(self.sink.as_mut());
            i += 1;
        }
        Ok(removed)
    }

    /// Supervise until the live-set is empty or `cancel` fires.
    ///
    /// Every return path leaves the live-set empty.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SupervisorExit> {
        info!("Monitoring {} service(s)", self.live.len());

        loop {
            if cancel.is_cancelled() {
                info!("Termination requested, stopping services");
                console::warning("Termination signal received, stopping services...");
                self.stop_all().await;
                return Ok(SupervisorExit::Interrupted);
            }

            if let Err(e) = self.poll_once().await {
                error!("Error while monitoring services: {}", e);
                console::failure(&format!("Error while monitoring services: {}", e));
                self.stop_all().await;
                return Err(e);
            }

            if self.live.is_empty() {
                warn!("All services stopped, launcher exiting");
                console::failure("All services stopped, launcher exiting");
                return Ok(SupervisorExit::AllExited);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Terminate every tracked process group and clear the live-set.
    ///
    /// All groups get the graceful signal first and share one timeout, after
    /// which survivors are killed. Failures are logged per entry and never
    /// stop the sequence. Output the services print while stopping is
    /// forwarded. Returns how many entries were tracked; a call on an empty
    /// live-set does nothing and returns 0.
    pub async fn stop_all(&mut self) -> usize {
        if self.live.is_empty() {
            return 0;
        }
        let count = self.live.len();
        info!("Stopping {} service(s)", count);

        self.signal_live(TerminateMode::Graceful);
        if !self.settle(self.terminate_timeout).await {
            self.signal_live(TerminateMode::Forceful);
            if !self.settle(self.terminate_timeout).await {
                warn!("Some process groups were still present after the forced kill");
            }
        }

        let mut stopped = std::mem::take(&mut self.live);
        for process in stopped.iter_mut() {
            process
                .collect_output(self.sink.as_mut(), LauncherConfig::OUTPUT_DRAIN_TIMEOUT)
                .await;
        }
        info!("All services stopped");
        count
    }

    /// Blocking form of [`Supervisor::stop_all`] for use outside the async
    /// loop. Only output already queued is forwarded.
    pub fn shutdown(&mut self) -> usize {
        if self.live.is_empty() {
            return 0;
        }
        let count = self.live.len();
        info!("Stopping {} service(s)", count);

        self.signal_live(TerminateMode::Graceful);
        if !self.wait_for_groups(self.terminate_timeout) {
            self.signal_live(TerminateMode::Forceful);
            if !self.wait_for_groups(self.terminate_timeout) {
                warn!("Some process groups were still present after the forced kill");
            }
        }

        for process in self.live.iter_mut() {
            process.drain_into(self.sink.as_mut());
        }
        self.live.clear();
        info!("All services stopped");
        count
    }

    /// Send `mode` to every group that still has a live member.
    fn signal_live(&mut self, mode: TerminateMode) {
        for process in self.live.iter_mut() {
            if !process.group_alive(self.strategy) {
                continue;
            }
            match mode {
                TerminateMode::Graceful => info!(
                    "Terminating {} (process group {})",
                    process.label, process.pgid
                ),
                TerminateMode::Forceful => warn!(
                    "{} (process group {}) did not stop in time, killing",
                    process.label, process.pgid
                ),
            }
            if let Err(e) = self.strategy.terminate_group(process.pgid, mode) {
                error!("{:?} termination of {} failed: {}", mode, process.label, e);
            }
        }
    }

    fn any_group_alive(&mut self) -> bool {
        let strategy = self.strategy;
        self.live.iter_mut().any(|p| p.group_alive(strategy))
    }

    /// Poll until no tracked group is alive, yielding to the runtime between
    /// checks. Returns false on timeout.
    async fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.any_group_alive() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(GROUP_CHECK_INTERVAL).await;
        }
    }

    /// Blocking form of [`Supervisor::settle`].
    fn wait_for_groups(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.any_group_alive() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(GROUP_CHECK_INTERVAL);
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_on_empty_supervisor_is_noop() {
        let mut supervisor = Supervisor::new(PlatformStrategy::current());
        assert_eq!(supervisor.shutdown(), 0);
        assert_eq!(supervisor.shutdown(), 0);
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_run_with_empty_live_set_returns_immediately() {
        let mut supervisor = Supervisor::new(PlatformStrategy::current());
        let exit = supervisor.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(exit, SupervisorExit::AllExited);
    }

    #[test]
    fn test_captured_output_filters_by_service() {
        let capture = CapturedOutput::new();
        let mut sink = capture.clone();
        sink.line(ServiceName::Backend, OutputStream::Stdout, "listening");
        sink.line(ServiceName::Frontend, OutputStream::Stderr, "warn");
        sink.line(ServiceName::Backend, OutputStream::Stdout, "ready");

        assert_eq!(
            capture.text_of(ServiceName::Backend, OutputStream::Stdout),
            vec!["listening", "ready"]
        );
        assert_eq!(capture.lines().len(), 3);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::platform::PlatformStrategy;
        use std::process::Stdio;

        fn spawn_shell(script: &str) -> Child {
            let mut cmd = tokio::process::Command::new("/bin/sh");
            cmd.arg("-c")
                .arg(script)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            PlatformStrategy::Unix.spawn_detached(&mut cmd);
            cmd.spawn().unwrap()
        }

        fn fast_supervisor(capture: &CapturedOutput) -> Supervisor {
            Supervisor::new(PlatformStrategy::Unix)
                .with_sink(Box::new(capture.clone()))
                .with_poll_interval(Duration::from_millis(20))
                .with_terminate_timeout(Duration::from_millis(300))
        }

        #[tokio::test]
        async fn test_duplicate_process_group_rejected() {
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            let first = ManagedProcess::attach(ServiceName::Backend, spawn_shell("sleep 5")).unwrap();
            let pgid = first.pgid();
            supervisor.register(first).unwrap();

            let mut second =
                ManagedProcess::attach(ServiceName::Frontend, spawn_shell("exit 0")).unwrap();
            second.pgid = pgid;
            let err = supervisor.register(second).unwrap_err();
            assert!(matches!(err, LaunchpadError::DuplicateProcessGroup { .. }));
            assert_eq!(supervisor.len(), 1);

            supervisor.shutdown();
        }

        #[tokio::test]
        async fn test_run_forwards_output_and_ends_when_all_exit() {
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            let child = spawn_shell("echo one; echo two; echo oops >&2; sleep 0.3; echo three");
            supervisor
                .register(ManagedProcess::attach(ServiceName::Backend, child).unwrap())
                .unwrap();

            let exit = supervisor.run(&CancellationToken::new()).await.unwrap();

            assert_eq!(exit, SupervisorExit::AllExited);
            assert!(supervisor.is_empty());
            assert_eq!(
                capture.text_of(ServiceName::Backend, OutputStream::Stdout),
                vec!["one", "two", "three"]
            );
            assert_eq!(
                capture.text_of(ServiceName::Backend, OutputStream::Stderr),
                vec!["oops"]
            );
        }

        #[tokio::test]
        async fn test_exited_entry_output_is_forwarded_completely() {
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            let child = spawn_shell("sleep 0.3; seq 1 3000; echo done >&2");
            supervisor
                .register(ManagedProcess::attach(ServiceName::Backend, child).unwrap())
                .unwrap();

            let exit = supervisor.run(&CancellationToken::new()).await.unwrap();

            assert_eq!(exit, SupervisorExit::AllExited);
            let stdout = capture.text_of(ServiceName::Backend, OutputStream::Stdout);
            assert_eq!(stdout.len(), 3000);
            assert_eq!(stdout.first().map(String::as_str), Some("1"));
            assert_eq!(stdout.last().map(String::as_str), Some("3000"));
            assert_eq!(
                capture.text_of(ServiceName::Backend, OutputStream::Stderr),
                vec!["done"]
            );
        }

        #[tokio::test]
        async fn test_exit_with_pipe_held_by_grandchild_is_bounded() {
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            // The background sleep inherits stdout and outlives the leader.
            let child = spawn_shell("echo last; sleep 5 & exit 0");
            let pgid = {
                let process = ManagedProcess::attach(ServiceName::Backend, child).unwrap();
                let pgid = process.pgid();
                supervisor.register(process).unwrap();
                pgid
            };

            let started = Instant::now();
            let exit = supervisor.run(&CancellationToken::new()).await.unwrap();

            assert_eq!(exit, SupervisorExit::AllExited);
            assert!(started.elapsed() < LauncherConfig::OUTPUT_DRAIN_TIMEOUT * 3);
            assert_eq!(
                capture.text_of(ServiceName::Backend, OutputStream::Stdout),
                vec!["last"]
            );
            let _ = PlatformStrategy::Unix.terminate_group(pgid, TerminateMode::Forceful);
        }

        #[tokio::test]
        async fn test_stop_all_forwards_output_printed_while_stopping() {
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            let child = spawn_shell(
                "trap 'echo shutting down; exit 0' TERM; echo ready; while true; do sleep 0.05; done",
            );
            supervisor
                .register(ManagedProcess::attach(ServiceName::Backend, child).unwrap())
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;

            assert_eq!(supervisor.stop_all().await, 1);
            assert!(supervisor.is_empty());
            assert_eq!(
                capture.text_of(ServiceName::Backend, OutputStream::Stdout),
                vec!["ready", "shutting down"]
            );
            assert_eq!(supervisor.stop_all().await, 0);
        }

        #[tokio::test]
        async fn test_exited_entry_removed_while_other_keeps_running() {
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            supervisor
                .register(
                    ManagedProcess::attach(ServiceName::Backend, spawn_shell("exit 3")).unwrap(),
                )
                .unwrap();
            supervisor
                .register(
                    ManagedProcess::attach(ServiceName::Frontend, spawn_shell("sleep 5")).unwrap(),
                )
                .unwrap();

            tokio::time::sleep(Duration::from_millis(200)).await;
            let removed = supervisor.poll_once().await.unwrap();

            assert_eq!(removed, vec![ServiceName::Backend]);
            assert_eq!(supervisor.labels(), vec![ServiceName::Frontend]);

            assert_eq!(supervisor.shutdown(), 1);
            assert!(supervisor.is_empty());
        }

        /// Size of a file a background loop appends to, sampled twice.
        async fn heartbeat_stopped(path: &std::path::Path) -> bool {
            let before = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(300)).await;
            let after = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            before == after
        }

        #[tokio::test]
        async fn test_cancel_terminates_group_including_grandchildren() {
            let temp_dir = tempfile::TempDir::new().unwrap();
            let heartbeat = temp_dir.path().join("heartbeat");
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            // The shell forks a grandchild that shares the group.
            let child = spawn_shell(&format!(
                "(while true; do echo x >> '{}'; sleep 0.05; done) & wait",
                heartbeat.display()
            ));
            supervisor
                .register(ManagedProcess::attach(ServiceName::Backend, child).unwrap())
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert!(!heartbeat_stopped(&heartbeat).await);

            let cancel = CancellationToken::new();
            cancel.cancel();
            let exit = supervisor.run(&cancel).await.unwrap();

            assert_eq!(exit, SupervisorExit::Interrupted);
            assert!(supervisor.is_empty());
            assert!(heartbeat_stopped(&heartbeat).await);
            assert_eq!(supervisor.shutdown(), 0);
        }

        #[tokio::test]
        async fn test_shutdown_escalates_when_term_is_ignored() {
            let temp_dir = tempfile::TempDir::new().unwrap();
            let heartbeat = temp_dir.path().join("heartbeat");
            let capture = CapturedOutput::new();
            let mut supervisor = fast_supervisor(&capture);
            let child = spawn_shell(&format!(
                "trap '' TERM; while true; do echo x >> '{}'; sleep 0.05; done",
                heartbeat.display()
            ));
            supervisor
                .register(ManagedProcess::attach(ServiceName::Frontend, child).unwrap())
                .unwrap();

            // Give the shell time to install the trap.
            tokio::time::sleep(Duration::from_millis(200)).await;
            let started = Instant::now();
            assert_eq!(supervisor.shutdown(), 1);

            assert!(started.elapsed() >= Duration::from_millis(300));
            assert!(supervisor.is_empty());
            assert!(heartbeat_stopped(&heartbeat).await);
        }
    }
}
