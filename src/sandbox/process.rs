//! Sandbox backed by child processes in throwaway directories
//!
//! Each execution gets its own temporary directory, a cleared environment and
//! one wall-clock deadline shared by the compile and run steps. On unix every
//! step runs in its own process group, and the whole group is killed when the
//! step exits, times out or is abandoned, so background children die with it.

use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::{CandidateCode, ExecutionOutcome, TargetLanguage};
use crate::sandbox::failure::{FailureDetail, FailureKind};
use crate::sandbox::plan::{Phase, RunPlan, RunStep};
use crate::sandbox::traits::Sandbox;

/// Default cap on captured bytes per stream (1 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long pipe readers get to drain after the child has exited or been killed
const DRAIN_GRACE: Duration = Duration::from_secs(1);

static RESIDUAL_RISK: Once = Once::new();

/// Configuration for the process sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Bytes kept per stream; the rest is read and discarded
    pub max_output_bytes: usize,
    /// Variables copied from the parent environment when set
    pub passthrough_env: Vec<String>,
    /// Interpreter/compiler overrides per language
    pub programs: HashMap<TargetLanguage, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            passthrough_env: vec!["PATH".to_string(), "LANG".to_string()],
            programs: HashMap::new(),
        }
    }
}

impl SandboxConfig {
    /// Set the per-stream capture limit
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Override the program used for a language
    pub fn program(mut self, language: TargetLanguage, program: impl Into<String>) -> Self {
        self.programs.insert(language, program.into());
        self
    }

    /// Add a variable to copy from the parent environment
    pub fn passthrough(mut self, key: impl Into<String>) -> Self {
        self.passthrough_env.push(key.into());
        self
    }
}

/// Bytes read from one stream, plus how many were dropped past the limit
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Captured {
    bytes: Vec<u8>,
    dropped: usize,
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Text with a trailing note when output was cut
    fn text_with_notice(&self) -> String {
        let mut text = self.text();
        if self.dropped > 0 {
            if !text.ends_with('\n') && !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("[output truncated: {} bytes omitted]\n", self.dropped));
        }
        text
    }
}

/// Capture shared between a pipe reader task and whoever collects it
type SharedCapture = Arc<Mutex<Captured>>;

/// Background task reading one child pipe
struct PipeReader {
    task: JoinHandle<()>,
    sink: SharedCapture,
}

impl PipeReader {
    fn spawn<R>(reader: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = SharedCapture::default();
        let task = tokio::spawn(read_limited(reader, limit, sink.clone()));
        Self { task, sink }
    }

    /// Wait briefly for EOF, then return whatever was read so far
    async fn finish(mut self) -> Captured {
        match tokio::time::timeout(DRAIN_GRACE, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("Pipe reader task failed: {}", e),
            Err(_) => {
                log::debug!("Pipe still open after {:?}, keeping partial output", DRAIN_GRACE);
                self.task.abort();
            }
        }
        self.sink.lock().map(|captured| captured.clone()).unwrap_or_default()
    }
}

/// Kills a step's process group when told to, or when dropped
struct ProcessGroup {
    id: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { id: child.id() }
    }

    fn kill(&mut self) {
        if let Some(id) = self.id.take() {
            kill_process_group(id);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// How one step ended
enum StepEnd {
    Exited {
        status: ExitStatus,
        stdout: Captured,
        stderr: Captured,
    },
    TimedOut,
    SpawnFailed(std::io::Error),
}

/// Executes candidates as local child processes.
///
/// This is best-effort isolation: a fresh directory, a scrubbed environment
/// and a hard deadline. It does not restrict network or filesystem access.
#[derive(Debug, Clone, Default)]
pub struct ProcessSandbox {
    config: SandboxConfig,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn warn_residual_risk() {
        RESIDUAL_RISK.call_once(|| {
            log::warn!(
                "Generated code runs as a local process with your user's permissions; \
                 only the directory, environment and run time are isolated"
            );
        });
    }

    fn command(&self, step: &RunStep, workdir: &Path, plan_env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args)
            .current_dir(workdir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        for key in &self.config.passthrough_env {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        cmd.env("HOME", workdir).env("TMPDIR", workdir);
        for (key, value) in plan_env {
            cmd.env(key, value);
        }
        cmd
    }

    async fn run_step(&self, step: &RunStep, workdir: &Path, plan_env: &[(String, String)], deadline: Instant) -> StepEnd {
        let mut child = match self.command(step, workdir, plan_env).spawn() {
            Ok(child) => child,
            Err(e) => return StepEnd::SpawnFailed(e),
        };
        let mut group = ProcessGroup::of(&child);

        let limit = self.config.max_output_bytes;
        let stdout = PipeReader::spawn(child.stdout.take(), limit);
        let stderr = PipeReader::spawn(child.stderr.take(), limit);

        let waited = tokio::time::timeout_at(deadline, child.wait()).await;
        // Leftover background processes go with the step, which also closes their pipes
        group.kill();
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                log::warn!("Failed waiting on {}: {}", step.display_name(), e);
                let _ = child.kill().await;
                stdout.finish().await;
                stderr.finish().await;
                return StepEnd::SpawnFailed(e);
            }
            Err(_) => {
                log::debug!("Deadline reached, killed process group of {}", step.display_name());
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill {}: {}", step.display_name(), e);
                }
                stdout.finish().await;
                stderr.finish().await;
                return StepEnd::TimedOut;
            }
        };

        StepEnd::Exited {
            status,
            stdout: stdout.finish().await,
            stderr: stderr.finish().await,
        }
    }

    async fn run_plan(&self, candidate: &CandidateCode, timeout: Duration) -> Result<String, FailureDetail> {
        let workdir = tempfile::Builder::new()
            .prefix("codemax-")
            .tempdir()
            .map_err(|e| FailureDetail::new(FailureKind::SpawnError, format!("failed to create sandbox directory: {}", e)))?;

        let program = self.config.programs.get(&candidate.language).map(String::as_str);
        let plan = RunPlan::for_language(candidate.language, workdir.path(), program);

        tokio::fs::write(workdir.path().join(plan.file_name), &candidate.source)
            .await
            .map_err(|e| FailureDetail::new(FailureKind::SpawnError, format!("failed to write {}: {}", plan.file_name, e)))?;

        let deadline = Instant::now() + timeout;
        let mut stdout = Captured::default();

        for step in &plan.steps {
            match self.run_step(step, workdir.path(), &plan.env, deadline).await {
                StepEnd::SpawnFailed(e) => {
                    return Err(FailureDetail::new(
                        FailureKind::SpawnError,
                        format!("failed to start {}: {}", step.display_name(), e),
                    ));
                }
                StepEnd::TimedOut => {
                    return Err(FailureDetail::new(
                        FailureKind::Timeout,
                        format!("execution exceeded {}ms and was terminated", timeout.as_millis()),
                    ));
                }
                StepEnd::Exited { status, stdout: out, stderr } if !status.success() => {
                    let kind = match step.phase {
                        Phase::Compile => FailureKind::CompileError,
                        Phase::Run => FailureKind::RuntimeError,
                    };
                    let diagnostics = if stderr.bytes.iter().all(u8::is_ascii_whitespace) {
                        out.text()
                    } else {
                        stderr.text()
                    };
                    return Err(FailureDetail::new(kind, format!("{} {}", step.display_name(), describe_status(&status)))
                        .with_output(diagnostics));
                }
                StepEnd::Exited { stdout: out, .. } => {
                    if step.phase == Phase::Run {
                        stdout = out;
                    }
                }
            }
        }

        // workdir drops here and removes everything the program wrote
        Ok(stdout.text_with_notice())
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(&self, candidate: &CandidateCode, timeout: Duration) -> ExecutionOutcome {
        if candidate.is_blank() {
            return ExecutionOutcome::failure(
                FailureDetail::new(FailureKind::EmptySource, "no code was found in the completion").to_message(),
            );
        }

        Self::warn_residual_risk();
        log::debug!(
            "Executing round {} {} candidate ({} bytes)",
            candidate.round,
            candidate.language,
            candidate.source.len()
        );

        match self.run_plan(candidate, timeout).await {
            Ok(stdout) => ExecutionOutcome::success(stdout),
            Err(detail) => {
                log::debug!("Round {} failed: {} {}", candidate.round, detail.kind, detail.summary);
                ExecutionOutcome::failure(detail.to_message())
            }
        }
    }

    fn description(&self) -> &str {
        "process"
    }
}

/// Read a pipe to EOF into `sink`, keeping at most `limit` bytes
async fn read_limited<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize, sink: SharedCapture) {
    let Some(mut reader) = reader else {
        return;
    };

    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let Ok(mut captured) = sink.lock() else {
                    break;
                };
                let room = limit.saturating_sub(captured.bytes.len());
                let keep = n.min(room);
                captured.bytes.extend_from_slice(&buf[..keep]);
                captured.dropped += n - keep;
            }
            Err(e) => {
                log::debug!("Pipe read failed: {}", e);
                break;
            }
        }
    }
}

/// SIGKILL every process in group `id`; a group that is already gone is fine
#[cfg(unix)]
fn kill_process_group(id: u32) {
    let Ok(pgid) = libc::pid_t::try_from(id) else {
        return;
    };
    // SAFETY: killpg only sends a signal and takes no pointers
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            log::warn!("Failed to kill process group {}: {}", pgid, err);
        }
    }
}

/// Without process groups only the direct child is killed, via `kill_on_drop`
#[cfg(not(unix))]
fn kill_process_group(_id: u32) {}

#[cfg(unix)]
fn describe_status(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exited with status {}", code),
        (None, Some(signal)) => format!("was killed by signal {}", signal),
        (None, None) => "exited abnormally".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with status {}", code),
        None => "exited abnormally".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(source: &str) -> CandidateCode {
        CandidateCode::new(source, 1, TargetLanguage::Shell)
    }

    fn sandbox() -> ProcessSandbox {
        ProcessSandbox::default()
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_config_default() {
        let config = SandboxConfig::default();
        assert_eq!(config.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert!(config.passthrough_env.contains(&"PATH".to_string()));
        assert!(config.programs.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = SandboxConfig::default()
            .max_output_bytes(64)
            .program(TargetLanguage::Python, "python3.12")
            .passthrough("JAVA_HOME");
        assert_eq!(config.max_output_bytes, 64);
        assert_eq!(config.programs.get(&TargetLanguage::Python).map(String::as_str), Some("python3.12"));
        assert!(config.passthrough_env.contains(&"JAVA_HOME".to_string()));
    }

    #[tokio::test]
    async fn test_success_returns_stdout_verbatim() {
        let outcome = sandbox().execute(&shell("printf 'hello\\n  world'"), TIMEOUT).await;
        assert_eq!(outcome, ExecutionOutcome::success("hello\n  world"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_runtime_error_with_stderr() {
        let outcome = sandbox()
            .execute(&shell("echo 'division by zero' >&2\nexit 3"), TIMEOUT)
            .await;
        let msg = outcome.error_message().unwrap();
        assert!(msg.starts_with("RuntimeError: `sh` exited with status 3"), "{}", msg);
        assert!(msg.contains("division by zero"));
    }

    #[tokio::test]
    async fn test_stdout_used_when_stderr_empty() {
        let outcome = sandbox().execute(&shell("echo 'assertion failed'\nexit 1"), TIMEOUT).await;
        assert!(outcome.error_message().unwrap().contains("assertion failed"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_failure() {
        let outcome = sandbox().execute(&shell("if then fi ((("), TIMEOUT).await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_empty_source() {
        let outcome = sandbox().execute(&shell("  \n\t"), TIMEOUT).await;
        assert!(outcome.error_message().unwrap().starts_with("EmptySource:"));
    }

    #[tokio::test]
    async fn test_timeout_kills_infinite_loop() {
        let started = std::time::Instant::now();
        let outcome = sandbox()
            .execute(&shell("while true; do :; done"), Duration::from_millis(300))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        let msg = outcome.error_message().unwrap();
        assert_eq!(msg, "Timeout: execution exceeded 300ms and was terminated");
    }

    #[tokio::test]
    async fn test_timeout_with_background_child_holding_pipe() {
        let started = std::time::Instant::now();
        let outcome = sandbox()
            .execute(&shell("sleep 30 &\nsleep 30"), Duration::from_millis(300))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.error_message().unwrap().starts_with("Timeout:"));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let sandbox = ProcessSandbox::new(
            SandboxConfig::default().program(TargetLanguage::Shell, "/nonexistent/codemax-shell"),
        );
        let outcome = sandbox.execute(&shell("echo hi"), TIMEOUT).await;
        let msg = outcome.error_message().unwrap();
        assert!(msg.starts_with("SpawnError: failed to start `codemax-shell`"), "{}", msg);
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let sandbox = ProcessSandbox::new(SandboxConfig::default().max_output_bytes(10));
        let outcome = sandbox.execute(&shell("printf '0123456789abcdef'"), TIMEOUT).await;
        match outcome {
            ExecutionOutcome::Success { stdout } => {
                assert!(stdout.starts_with("0123456789\n"));
                assert!(stdout.contains("[output truncated: 6 bytes omitted]"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_home_is_private_scratch_directory() {
        let outcome = sandbox().execute(&shell("printf '%s' \"$HOME\""), TIMEOUT).await;
        let ExecutionOutcome::Success { stdout: home } = outcome else {
            panic!("expected success");
        };
        assert!(home.contains("codemax-"), "{}", home);
        // Removed once the execution finishes
        assert!(!Path::new(&home).exists());
    }

    #[tokio::test]
    async fn test_environment_is_scrubbed() {
        // SAFETY: test-only; the variable name is unique to this test
        unsafe { std::env::set_var("CODEMAX_SECRET_FOR_TEST", "leak") };
        let outcome = sandbox()
            .execute(&shell("printf '%s' \"${CODEMAX_SECRET_FOR_TEST:-unset}\""), TIMEOUT)
            .await;
        assert_eq!(outcome, ExecutionOutcome::success("unset"));
    }

    #[tokio::test]
    async fn test_files_do_not_leak_between_executions() {
        let sandbox = sandbox();
        let first = sandbox.execute(&shell("echo data > state.txt"), TIMEOUT).await;
        assert!(first.is_success());
        let second = sandbox
            .execute(&shell("if [ -f state.txt ]; then echo present; else echo absent; fi"), TIMEOUT)
            .await;
        assert_eq!(second, ExecutionOutcome::success("absent\n"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let sandbox = sandbox();
        let a = shell("echo a > f; sleep 0.2; cat f");
        let b = shell("echo b > f; sleep 0.2; cat f");
        let (ra, rb) = tokio::join!(sandbox.execute(&a, TIMEOUT), sandbox.execute(&b, TIMEOUT));
        assert_eq!(ra, ExecutionOutcome::success("a\n"));
        assert_eq!(rb, ExecutionOutcome::success("b\n"));
    }

    #[tokio::test]
    async fn test_read_limited_counts_dropped_bytes() {
        let data: &[u8] = b"abcdefghij";
        let sink = SharedCapture::default();
        read_limited(Some(data), 4, sink.clone()).await;
        let captured = sink.lock().unwrap();
        assert_eq!(captured.bytes, b"abcd");
        assert_eq!(captured.dropped, 6);
    }

    #[tokio::test]
    async fn test_read_limited_none() {
        let sink = SharedCapture::default();
        read_limited::<&[u8]>(None, 4, sink.clone()).await;
        assert!(sink.lock().unwrap().bytes.is_empty());
    }

    #[tokio::test]
    async fn test_pipe_reader_keeps_partial_output_when_pipe_stays_open() {
        use tokio::io::AsyncWriteExt;
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"partial").await.unwrap();
        let captured = PipeReader::spawn(Some(reader), 1024).finish().await;
        assert_eq!(captured.bytes, b"partial");
        drop(writer);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_processes() {
        let outside = tempfile::TempDir::new().unwrap();
        let marker = outside.path().join("survivor");
        let source = format!("(sleep 1; echo alive > '{}') &\nsleep 30", marker.display());
        let outcome = sandbox().execute(&shell(&source), Duration::from_millis(300)).await;
        assert!(outcome.error_message().unwrap().starts_with("Timeout:"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "background process outlived the timeout");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_kills_background_processes() {
        let outside = tempfile::TempDir::new().unwrap();
        let marker = outside.path().join("survivor");
        let source = format!("(sleep 1; echo alive > '{}') &\necho done", marker.display());
        let outcome = sandbox().execute(&shell(&source), TIMEOUT).await;
        assert_eq!(outcome, ExecutionOutcome::success("done\n"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "background process outlived a finished step");
    }

    #[tokio::test]
    async fn test_output_kept_when_background_child_holds_pipe() {
        let started = std::time::Instant::now();
        let outcome = sandbox().execute(&shell("echo hi\nsleep 5 &"), TIMEOUT).await;
        assert_eq!(outcome, ExecutionOutcome::success("hi\n"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
