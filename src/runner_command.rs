//! Batch runner backed by an external command.
//!
//! The launch request is written to the command's stdin as JSON. The
//! command is expected to submit it to whatever batch service it fronts and
//! print the resulting run handle as the first non-empty line of stdout. A
//! non-zero exit status means the submission was not accepted.
//!
//! ```toml
//! [runner]
//! command = "emr-launch"
//! args = ["--region", "us-east-1"]
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::RunnerConfig;
use crate::flow::LaunchRequest;
use crate::traits::BatchRunner;

pub struct CommandRunner {
    config: RunnerConfig,
}

impl CommandRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BatchRunner for CommandRunner {
    async fn launch(&self, request: &LaunchRequest) -> Result<String> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to execute '{}'", self.config.command))?;

        // The request may exceed the pipe buffer, so it is fed while the
        // output is drained.
        let stdin = child.stdin.take();
        let feed = async move {
            match stdin {
                Some(mut stdin) => match stdin.write_all(&payload).await {
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                },
                None => Ok(()),
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.with_context(|| format!("Failed to wait for '{}'", self.config.command))?;

        // A runner that exits early without reading the request reports the
        // reason on stderr; its exit status decides.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{}' exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            );
        }
        fed.with_context(|| "Failed to write launch request")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(handle) => Ok(handle.to_string()),
            None => bail!("'{}' printed no run handle", self.config.command),
        }
    }
}
