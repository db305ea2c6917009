use async_trait::async_trait;
use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command as TokioCommand;

/// Lines of stderr kept when a tool failure is reported.
const STDERR_TAIL_LINES: usize = 12;

// Every adapter that shells out goes through this so tests can script the tool's output
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<Output>;
}

pub struct RealCommandRunner;

#[async_trait]
impl CommandRunner for RealCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<Output> {
        tracing::debug!(program, args = ?args, "spawning external tool");
        TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

/// Exit code as text, or the signal description when there is none.
pub fn describe_status(output: &Output) -> String {
    match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => output.status.to_string(),
    }
}

/// Last few non-empty lines of stderr; tools like ffmpeg print a banner first.
pub fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join("\n")
}

pub fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    pub fn create_mock_std_output(stdout_str: &str, stderr_str: &str, code: i32) -> std::io::Result<Output> {
        Ok(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout_str.as_bytes().to_vec(),
            stderr: stderr_str.as_bytes().to_vec(),
        })
    }
}
