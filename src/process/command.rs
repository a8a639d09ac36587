use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, trace};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::process::{ProcessError, ProcessResult};

/// Command wrapper for helper process execution
#[derive(Debug, Clone)]
pub struct Command {
    /// Program to execute
    program: String,

    /// Arguments to pass to the program
    args: Vec<String>,

    /// Environment variables
    env_vars: HashMap<String, String>,
}

impl Command {
    /// Create a new command
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: HashMap::new(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.args.push(arg.into());
        }
        self
    }

    /// Add an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars.insert(key.into(), val.into());
        self
    }

    /// Run to completion and return stdout.
    ///
    /// The child is killed if it outlives `timeout_duration`. A non-zero exit
    /// or empty stdout is an error.
    pub async fn output(&self, timeout_duration: Duration) -> ProcessResult<String> {
        debug!("Running command: {} {:?}", self.program, self.args);

        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, val) in &self.env_vars {
            cmd.env(key, val);
        }

        let child = cmd.spawn().map_err(ProcessError::SpawnError)?;

        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ProcessError::SpawnError(e)),
            Err(_) => return Err(ProcessError::Timeout(timeout_duration)),
        };

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!("[{}] stderr: {}", self.program, line);
        }

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit(output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("[{}] stdout: {} bytes", self.program, stdout.len());

        if stdout.trim().is_empty() {
            return Err(ProcessError::EmptyOutput);
        }

        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_captures_stdout() {
        let out = Command::new("sh")
            .args(["-c", "echo hello"])
            .output(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let result = Command::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .output(Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(ProcessError::NonZeroExit(_))));
    }

    #[tokio::test]
    async fn test_empty_output_is_an_error() {
        let result = Command::new("sh")
            .args(["-c", "true"])
            .output(Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(ProcessError::EmptyOutput)));
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let result = Command::new("sleep")
            .arg("5")
            .output(Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(ProcessError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let result = Command::new("/nonexistent/metricsd-helper")
            .output(Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ProcessError::SpawnError(_))));
    }
}
