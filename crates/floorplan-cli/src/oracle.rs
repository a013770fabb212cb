//! Orientation oracle backed by an external program.

use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::{io::AsyncWriteExt, process::Command};

use floorplan::{
    RawJudgments,
    orientation::{OracleError, OrientationOracle, OrientationRequest},
};

/// Runs a program once per orientation request.
///
/// The request is written to the program's stdin as JSON and the judgment
/// payload is read from its stdout. Prose around the JSON object is
/// tolerated. The program is killed if the engine's attempt timeout fires.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    command: String,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl OrientationOracle for CommandOracle {
    async fn judge(&self, request: &OrientationRequest) -> Result<RawJudgments, OracleError> {
        let unavailable = |err: &dyn std::fmt::Display| {
            OracleError::Unavailable(format!("{}: {err}", self.command))
        };

        let payload = serde_json::to_vec(request).map_err(|err| unavailable(&err))?;
        debug!(
            command = self.command.as_str(),
            section = request.section();
            "Invoking oracle command"
        );

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| unavailable(&err))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|err| unavailable(&err))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| unavailable(&err))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Unavailable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(response = stdout.as_ref(); "Oracle response");
        Ok(floorplan_parser::parse_judgments(&stdout)?)
    }
}
