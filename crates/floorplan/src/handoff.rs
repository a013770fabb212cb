//! Handoff of target object graphs to the execution collaborator.
//!
//! An [`Automation`] instantiates a [`TargetObjectGraph`] in the simulation
//! engine and reports back. The compiler surfaces the collaborator's log but
//! never interprets it, and never retries a failed handoff.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::process::Command;

use crate::{config::AutomationConfig, mapping::TargetObjectGraph};

/// Outcome reported by the execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    success: bool,
    log: Option<String>,
}

impl ExecutionReport {
    pub fn new(success: bool, log: Option<String>) -> Self {
        Self { success, log }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Diagnostic output of the collaborator, if it produced any.
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }
}

/// The collaborator could not be driven to a report.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("{0}")]
    Unreachable(String),

    #[error("no report within {} ms", .0.as_millis())]
    TimedOut(Duration),
}

/// An execution collaborator.
#[async_trait]
pub trait Automation: Send + Sync {
    /// Builds the model described by `graph` at `destination`.
    ///
    /// A collaborator that ran but failed returns `Ok` with an unsuccessful
    /// [`ExecutionReport`].
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError`] when the collaborator cannot be reached or
    /// does not answer in time.
    async fn execute(
        &self,
        graph: &TargetObjectGraph,
        destination: &Path,
    ) -> Result<ExecutionReport, HandoffError>;
}

/// Writes the target graph as JSON next to the destination.
///
/// For a destination `plant.spp` the graph lands in `plant.target.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHandoff;

impl FileHandoff {
    pub fn target_path(destination: &Path) -> PathBuf {
        let stem = destination
            .file_stem()
            .map_or_else(|| "model".into(), |stem| stem.to_string_lossy());
        destination.with_file_name(format!("{stem}.target.json"))
    }
}

#[async_trait]
impl Automation for FileHandoff {
    async fn execute(
        &self,
        graph: &TargetObjectGraph,
        destination: &Path,
    ) -> Result<ExecutionReport, HandoffError> {
        let path = Self::target_path(destination);
        let json = graph
            .to_json()
            .map_err(|err| HandoffError::Unreachable(err.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|err| HandoffError::Unreachable(format!("{}: {err}", path.display())))?;

        info!(path:? = path; "Target graph handed off to file");
        Ok(ExecutionReport::new(
            true,
            Some(format!("target graph written to {}", path.display())),
        ))
    }
}

/// Runs an external program on the target graph.
///
/// The graph is written to a temporary file; the program is called as
/// `command [args...] <graph.json> <destination>` and must exit within the
/// configured timeout. Its combined output becomes the report log.
#[derive(Debug, Clone)]
pub struct CommandAutomation {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAutomation {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    /// Builds the automation from configuration, if a command is configured.
    pub fn from_config(config: &AutomationConfig) -> Option<Self> {
        config
            .command()
            .map(|command| Self::new(command, config.args().to_vec(), config.timeout()))
    }
}

#[async_trait]
impl Automation for CommandAutomation {
    async fn execute(
        &self,
        graph: &TargetObjectGraph,
        destination: &Path,
    ) -> Result<ExecutionReport, HandoffError> {
        let unreachable = |err: &dyn std::fmt::Display| HandoffError::Unreachable(err.to_string());

        let json = graph.to_json().map_err(|err| unreachable(&err))?;
        let mut graph_file = tempfile::Builder::new()
            .prefix("floorplan-target-")
            .suffix(".json")
            .tempfile()
            .map_err(|err| unreachable(&err))?;
        graph_file
            .write_all(json.as_bytes())
            .and_then(|()| graph_file.flush())
            .map_err(|err| unreachable(&err))?;

        debug!(
            command = self.command.as_str(),
            graph:? = graph_file.path(),
            destination:? = destination;
            "Running automation command"
        );

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(graph_file.path())
            .arg(destination)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| HandoffError::TimedOut(self.timeout))?
            .map_err(|err| HandoffError::Unreachable(format!("{}: {err}", self.command)))?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        let log = (!log.trim().is_empty()).then(|| log.trim_end().to_string());

        let success = output.status.success();
        if success {
            info!(command = self.command.as_str(); "Automation command succeeded");
        } else {
            warn!(
                command = self.command.as_str(),
                status:% = output.status;
                "Automation command failed"
            );
        }
        Ok(ExecutionReport::new(success, log))
    }
}
