//! A tool for executing commands.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;

/// Represents a command executor.
///
/// # Example
///
/// ```rust,no_run
/// # use std::path::PathBuf;
/// # use std::time::Duration;
/// # use ytdownhub::executor::Executor;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = Executor {
///     executable_path: PathBuf::from("yt-dlp"),
///     timeout: Duration::from_secs(30),
///     args: vec!["--version".to_string()],
/// };
///
/// let output = executor.execute().await?;
/// println!("Output: {}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Executor {
    /// The path to the command executable.
    pub executable_path: PathBuf,
    /// The timeout for the process.
    pub timeout: Duration,

    /// The arguments to pass to the command.
    pub args: Vec<String>,
}

/// Represents the output of a process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// The stdout of the process.
    pub stdout: String,
    /// The stderr of the process.
    pub stderr: String,
    /// The exit code of the process, `-1` when it was killed by a signal.
    pub code: i32,
}

impl ProcessOutput {
    /// Whether the process exited with code zero.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

impl Executor {
    /// Executes the command and returns the output.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be executed, if it exited
    /// with a non-zero code, or if the process timed out.
    pub async fn execute(&self) -> Result<ProcessOutput> {
        let output = self.stream(|_| {}).await?;
        if output.success() {
            return Ok(output);
        }

        Err(Error::Command(format!(
            "Process failed with code {}: {}",
            output.code, output.stderr
        )))
    }

    /// Executes the command, handing every stdout line to `on_line` as soon as it is read.
    ///
    /// Unlike [`Executor::execute`], a non-zero exit code is not an error: the caller
    /// decides what the code means. The child is killed if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be spawned, if its output
    /// could not be read, or if the process timed out.
    pub async fn stream(&self, mut on_line: impl FnMut(&str)) -> Result<ProcessOutput> {
        debug!("Executing command: {:?}", self);

        let mut command = Command::new(&self.executable_path);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            command.creation_flags(0x08000000);
        }

        command.args(&self.args);
        let mut child = command.spawn()?;

        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stdout".to_string()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stderr".to_string()))?;

        // stderr is drained on its own task so a chatty child cannot block on a full pipe
        // while we are busy with stdout.
        let stderr_task = spawn_reader(stderr_handle);

        let run = read_until_exit(&mut child, stdout_handle, &mut on_line);
        let outcome = tokio::time::timeout(self.timeout, run).await;

        let (stdout, code) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!("Process timed out after {:?}, killing it", self.timeout);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill process after timeout: {}", e);
                }
                stderr_task.abort();

                return Err(Error::Timeout(self.timeout));
            }
        };

        let stderr = match stderr_task.await {
            Ok(Ok(buffer)) => String::from_utf8_lossy(&buffer).into_owned(),
            Ok(Err(e)) => return Err(Error::IO(e)),
            Err(e) => return Err(Error::Runtime(e)),
        };

        debug!("Process exited with code {}", code);
        Ok(ProcessOutput {
            stdout,
            stderr,
            code,
        })
    }
}

fn spawn_reader(handle: ChildStderr) -> JoinHandle<std::io::Result<Vec<u8>>> {
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        tokio::io::copy(&mut BufReader::new(handle), &mut buffer).await?;
        Ok(buffer)
    })
}

async fn read_until_exit(
    child: &mut Child,
    stdout: tokio::process::ChildStdout,
    on_line: &mut impl FnMut(&str),
) -> Result<(String, i32)> {
    let mut lines = BufReader::new(stdout).lines();
    let mut captured = String::new();

    while let Some(line) = lines.next_line().await? {
        on_line(&line);
        captured.push_str(&line);
        captured.push('\n');
    }

    let status = child.wait().await?;
    Ok((captured, status.code().unwrap_or(-1)))
}
