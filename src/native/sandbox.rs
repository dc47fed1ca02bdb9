use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, Command},
    task::JoinHandle,
    time::timeout,
};
use uuid::Uuid;

use crate::{
    constants::FAULT_EXIT_CODE,
    core::traits::sandbox::{RunOutcome, Sandbox},
};

const SOURCE_FILE: &str = "solution.py";
const FAULT_FILE: &str = "fault.txt";
const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

/// Fixed driver program. The candidate source never becomes part of it:
/// the driver receives the source path, the fault path and the fault exit
/// code as arguments.
const HARNESS: &str = r#"
import sys

def _main():
    sys.stdin.reconfigure(encoding="utf-8")
    sys.stdout.reconfigure(encoding="utf-8")
    source_path, fault_path, fault_code = sys.argv[1], sys.argv[2], int(sys.argv[3])
    with open(source_path, encoding="utf-8") as f:
        source = f.read()
    data = sys.stdin.read()
    namespace = {"__name__": "__solution__"}
    try:
        exec(compile(source, "solution.py", "exec"), namespace)
        solve = namespace.get("solve")
        out = solve(data.strip()) if callable(solve) else ""
    except Exception as e:
        sys.stdout.flush()
        with open(fault_path, "w", encoding="utf-8") as f:
            f.write(str(e))
        sys.exit(fault_code)
    print(out, end="")

_main()
"#;

/// Runs Python candidates as one child process per call, each in its own
/// process group and scratch directory.
#[derive(Clone, Debug)]
pub struct ProcessSandbox {
    python_path: PathBuf,
    work_dir: PathBuf,
    output_limit: usize,
}

impl ProcessSandbox {
    pub fn new<T, U>(python_path: T, work_dir: U) -> Self
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        ProcessSandbox {
            python_path: python_path.as_ref().into(),
            work_dir: work_dir.as_ref().into(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Caps captured stdout and stderr, each, at `bytes`.
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    async fn run_in(&self, run_dir: &Path, source: &str, input: &str, limit: Duration) -> RunOutcome {
        let source_path = run_dir.join(SOURCE_FILE);
        let fault_path = run_dir.join(FAULT_FILE);

        if let Err(e) = fs::write(&source_path, source).await {
            return RunOutcome::RuntimeError {
                message: format!("Failed to write source: {}", e),
            };
        }

        let mut cmd = Command::new(&self.python_path);
        cmd.arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .arg(&source_path)
            .arg(&fault_path)
            .arg(FAULT_EXIT_CODE.to_string())
            .current_dir(run_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::RuntimeError {
                    message: format!("Failed to spawn process: {}", e),
                };
            }
        };

        let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
        let mut stdin_task = feed_stdin(&mut child, input.to_string());
        let mut stdout_task = capture(child.stdout.take(), self.output_limit);
        let mut stderr_task = capture(child.stderr.take(), self.output_limit);

        let waited = timeout(limit, child.wait()).await;
        // Nothing the candidate started may outlive the call, whatever way it ended.
        kill_group(pgid);
        stdin_task.abort();

        let status = match waited {
            Ok(status) => status,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!("Failed to kill child: {}", e);
                }
                for task in [&mut stdout_task, &mut stderr_task] {
                    task.abort();
                    let _ = task.await;
                }
                return RunOutcome::TimedOut;
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                return RunOutcome::RuntimeError {
                    message: format!("Failed to wait for process: {}", e),
                };
            }
        };

        // The group is gone, so the pipes close unless a process left it.
        let drained = timeout(limit, async {
            ((&mut stdout_task).await, (&mut stderr_task).await)
        })
        .await;
        let (stdout, stderr) = match drained {
            Ok((Ok(Ok(stdout)), Ok(Ok(stderr)))) => (stdout, stderr),
            Ok(_) => {
                return RunOutcome::RuntimeError {
                    message: "Failed to capture process output".to_string(),
                };
            }
            Err(_) => {
                for task in [&mut stdout_task, &mut stderr_task] {
                    task.abort();
                }
                return RunOutcome::RuntimeError {
                    message: "Output pipes still open after the process exited".to_string(),
                };
            }
        };

        classify(status, stdout, stderr, &fault_path).await
    }
}

#[async_trait::async_trait]
impl Sandbox for ProcessSandbox {
    #[tracing::instrument(skip(self, source, input))]
    async fn run(&self, source: &str, input: &str, timeout: Duration) -> RunOutcome {
        let run_dir = self.work_dir.join(Uuid::new_v4().to_string());
        if let Err(e) = fs::create_dir_all(&run_dir).await {
            return RunOutcome::RuntimeError {
                message: format!("Failed to create run directory: {}", e),
            };
        }

        let outcome = self.run_in(&run_dir, source, input, timeout).await;

        if let Err(e) = fs::remove_dir_all(&run_dir).await {
            tracing::warn!("Failed to remove {}: {}", run_dir.display(), e);
        }
        tracing::debug!("Run outcome: {:?}", outcome);

        outcome
    }
}

fn feed_stdin(child: &mut Child, input: String) -> JoinHandle<()> {
    let stdin = child.stdin.take();
    tokio::spawn(async move {
        if let Some(mut stdin) = stdin {
            // The candidate may exit without reading; a broken pipe is expected then.
            let _ = stdin.write_all(input.as_bytes()).await;
        }
    })
}

/// Drains the pipe to EOF, keeping at most `limit` bytes.
fn capture<R>(pipe: Option<R>, limit: usize) -> JoinHandle<std::io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut kept = Vec::new();
        let Some(mut pipe) = pipe else {
            return Ok(String::new());
        };

        let mut buf = [0u8; 8192];
        loop {
            let n = pipe.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let room = limit.saturating_sub(kept.len());
            kept.extend_from_slice(&buf[..n.min(room)]);
        }

        Ok(String::from_utf8_lossy(&kept).to_string())
    })
}

/// Kills every process left in the candidate's group. The group may
/// already be empty.
fn kill_group(pgid: Option<Pid>) {
    let Some(pgid) = pgid else {
        return;
    };
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::debug!("killpg({}) failed: {}", pgid, e),
    }
}

async fn classify(status: ExitStatus, stdout: String, stderr: String, fault_path: &Path) -> RunOutcome {
    if status.success() {
        return RunOutcome::Success { stdout, stderr };
    }

    if status.code() == Some(FAULT_EXIT_CODE) {
        if let Ok(message) = fs::read_to_string(fault_path).await {
            return RunOutcome::Raised { message };
        }
    }

    let stderr = stderr.trim();
    let message = match status.code() {
        Some(code) => format!("Process exited with status {}", code),
        None => format!("Process terminated: {}", status),
    };
    RunOutcome::RuntimeError {
        message: if stderr.is_empty() {
            message
        } else {
            format!("{}: {}", message, stderr)
        },
    }
}
