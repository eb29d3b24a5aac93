use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{NavError, NavResult};
use crate::perception::snapshot::RawSnapshot;
use crate::perception::source::PerceptionSource;
use crate::sequencer::executor::{ActionExecutor, ExecutorCommand, ExecutorResponse};

/// Request sent to the driver process over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DriverRequest<'a> {
    Snapshot {
        cmd: &'static str,
        timeout_ms: u64,
    },
    WaitActionable {
        cmd: &'static str,
        locator: &'a str,
        timeout_ms: u64,
    },
    Command {
        cmd: &'static str,
        command: &'a ExecutorCommand,
    },
    WaitSettle {
        cmd: &'static str,
        timeout_ms: u64,
    },
    Quit {
        cmd: &'static str,
    },
}

impl<'a> DriverRequest<'a> {
    pub fn snapshot(timeout: Duration) -> Self {
        DriverRequest::Snapshot {
            cmd: "snapshot",
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn wait_actionable(locator: &'a str, timeout: Duration) -> Self {
        DriverRequest::WaitActionable {
            cmd: "wait_actionable",
            locator,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn command(command: &'a ExecutorCommand) -> Self {
        DriverRequest::Command {
            cmd: "command",
            command,
        }
    }

    pub fn wait_settle(timeout: Duration) -> Self {
        DriverRequest::WaitSettle {
            cmd: "wait_settle",
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn quit() -> Self {
        DriverRequest::Quit { cmd: "quit" }
    }

    fn name(&self) -> &'static str {
        match self {
            DriverRequest::Snapshot { cmd, .. }
            | DriverRequest::WaitActionable { cmd, .. }
            | DriverRequest::Command { cmd, .. }
            | DriverRequest::WaitSettle { cmd, .. }
            | DriverRequest::Quit { cmd } => cmd,
        }
    }
}

/// Response read from the driver process over stdout (one JSON line).
#[derive(Debug, Default, Deserialize)]
pub struct DriverResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub snapshot: Option<RawSnapshot>,
    #[serde(default)]
    pub actionable: Option<bool>,
    #[serde(default)]
    pub settled: Option<bool>,
}

pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RESPONSE_MARGIN_MS: u64 = 1_000;
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounds on how long the engine waits for the driver process.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Wait for the ready signal after spawning
    pub startup_timeout: Duration,

    /// Wait for the answer to a command, which carries no timeout of its own
    pub command_timeout: Duration,

    /// Slack added to a request's own timeout before the driver is
    /// considered hung
    pub response_margin: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_millis(DEFAULT_STARTUP_TIMEOUT_MS),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            response_margin: Duration::from_millis(DEFAULT_RESPONSE_MARGIN_MS),
        }
    }
}

/// Long-lived driver process that both perceives and acts on the target.
///
/// Commands go out as NDJSON on stdin, answers come back one line each on
/// stdout. The process must print `{"ok":true,"ready":true}` once it can
/// accept requests. Stdout is read on a separate thread so every answer is
/// awaited with a deadline; a driver that misses one is killed and the
/// session is closed.
pub struct DriverSession {
    program: String,
    config: DriverConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Receiver<io::Result<String>>,
}

impl DriverSession {
    pub fn launch(program: &str, args: &[String]) -> NavResult<Self> {
        Self::launch_with(program, args, DriverConfig::default())
    }

    pub fn launch_with(program: &str, args: &[String], config: DriverConfig) -> NavResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| NavError::io(format!("spawning driver '{}'", program), e))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let lines = match stdout {
            Some(stdout) => spawn_reader(stdout),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(NavError::Perception(format!(
                    "driver '{}' has no stdout",
                    program
                )));
            }
        };

        let mut session = DriverSession {
            program: program.to_string(),
            child: Some(child),
            stdin,
            lines,
            config,
        };

        let ready = session.read_response("ready signal", session.config.startup_timeout)?;
        if !ready.ok || ready.ready != Some(true) {
            return Err(NavError::Perception(format!(
                "driver '{}' did not send a ready signal",
                program
            )));
        }
        debug!(program, "driver ready");

        Ok(session)
    }

    /// False once the driver has quit or was killed for missing a deadline.
    pub fn is_open(&self) -> bool {
        self.child.is_some()
    }

    fn send(&mut self, request: &DriverRequest, wait: Duration) -> NavResult<DriverResponse> {
        let json = serde_json::to_string(request)
            .map_err(|e| NavError::json(format!("encoding '{}' request", request.name()), e))?;

        let stdin = self.stdin.as_mut().ok_or_else(|| {
            NavError::Perception(format!("driver '{}' is closed", self.program))
        })?;
        writeln!(stdin, "{}", json)
            .and_then(|_| stdin.flush())
            .map_err(|e| NavError::io(format!("writing to driver '{}'", self.program), e))?;

        self.read_response(request.name(), wait)
    }

    /// Send and require `ok: true`.
    fn send_ok(&mut self, request: &DriverRequest, wait: Duration) -> NavResult<DriverResponse> {
        let response = self.send(request, wait)?;
        if !response.ok {
            return Err(NavError::Perception(format!(
                "driver '{}' failed: {}",
                request.name(),
                response.error.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(response)
    }

    fn read_response(&mut self, context: &str, wait: Duration) -> NavResult<DriverResponse> {
        let line = match self.lines.recv_timeout(wait) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => return Err(NavError::io(format!("reading driver {}", context), e)),
            Err(RecvTimeoutError::Timeout) => {
                warn!(program = %self.program, context, wait_ms = wait.as_millis() as u64, "driver hung, killing it");
                self.kill();
                return Err(NavError::Perception(format!(
                    "driver '{}' gave no {} within {}ms",
                    self.program,
                    context,
                    wait.as_millis()
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(NavError::Perception(format!(
                    "no {} from driver '{}' (process exited)",
                    context, self.program
                )));
            }
        };

        if line.trim().is_empty() {
            return Err(NavError::Perception(format!(
                "empty {} from driver '{}'",
                context, self.program
            )));
        }

        serde_json::from_str(line.trim())
            .map_err(|e| NavError::json(format!("driver {}", context), e))
    }

    /// Ask the driver to exit and reap it. Safe to call more than once.
    pub fn quit(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Some(mut stdin) = self.stdin.take() {
            let request = serde_json::to_string(&DriverRequest::quit()).unwrap_or_default();
            let _ = writeln!(stdin, "{}", request).and_then(|_| stdin.flush());
        }

        let deadline = Instant::now() + QUIT_TIMEOUT;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }
        warn!(program = %self.program, "driver ignored quit, killing it");
        let _ = child.kill();
        let _ = child.wait();
    }

    fn kill(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn deadline(&self, timeout: Duration) -> Duration {
        timeout + self.config.response_margin
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        self.quit();
    }
}

/// Forward stdout lines to a channel until EOF or a read error.
fn spawn_reader(stdout: ChildStdout) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

impl PerceptionSource for DriverSession {
    fn capture(&mut self, timeout: Duration) -> NavResult<RawSnapshot> {
        let response = self.send_ok(&DriverRequest::snapshot(timeout), self.deadline(timeout))?;
        response
            .snapshot
            .ok_or_else(|| NavError::Perception("snapshot response carried no snapshot".into()))
    }
}

impl ActionExecutor for DriverSession {
    fn wait_for_actionable(&mut self, locator: &str, timeout: Duration) -> bool {
        let wait = self.deadline(timeout);
        match self.send_ok(&DriverRequest::wait_actionable(locator, timeout), wait) {
            Ok(response) => response.actionable.unwrap_or(false),
            Err(e) => {
                warn!(locator, error = %e, "actionable wait failed");
                false
            }
        }
    }

    fn execute(&mut self, command: &ExecutorCommand) -> ExecutorResponse {
        let wait = self.deadline(self.config.command_timeout);
        match self.send(&DriverRequest::command(command), wait) {
            Ok(response) if response.ok => ExecutorResponse::ok(),
            Ok(response) => ExecutorResponse::rejected(
                response.error.unwrap_or_else(|| "driver rejected command".into()),
            ),
            Err(e) => ExecutorResponse::rejected(e.to_string()),
        }
    }

    fn wait_for_settle(&mut self, timeout: Duration) -> bool {
        let wait = self.deadline(timeout);
        match self.send_ok(&DriverRequest::wait_settle(timeout), wait) {
            Ok(response) => response.settled.unwrap_or(true),
            Err(e) => {
                warn!(error = %e, "settle wait failed");
                false
            }
        }
    }
}
