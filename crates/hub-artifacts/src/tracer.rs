//! Tracer trait: how a traced (TorchScript) model file is obtained.
//!
//! Implementations:
//! - `HubTracedFile` - downloads a pre-traced file published in the model repo
//! - `LocalTracedFile` - copies a traced file that already exists on disk
//! - `CommandTracer` - runs an external exporter process
//!
//! Tracing executes the model inside its training framework, so it always
//! happens out of process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;

use ml_registry::TaskType;

use crate::download::HubClient;
use crate::error::{AcquireError, Result};

/// File name of the traced model inside an output directory
pub const TRACED_MODEL_FILE: &str = "traced_pytorch_model.pt";

#[async_trait]
pub trait Tracer: Send + Sync {
    /// Produce the traced model for `model` and `task` at `dest`.
    async fn trace(&self, model: &str, task: TaskType, dest: &Path) -> Result<()>;
}

/// Downloads a traced model file published alongside the hub model.
pub struct HubTracedFile {
    hub: HubClient,
    file: String,
}

impl HubTracedFile {
    pub fn new(hub: HubClient, file: impl Into<String>) -> Self {
        Self {
            hub,
            file: file.into(),
        }
    }
}

#[async_trait]
impl Tracer for HubTracedFile {
    async fn trace(&self, model: &str, _task: TaskType, dest: &Path) -> Result<()> {
        self.hub.fetch(model, &self.file, dest).await?;
        Ok(())
    }
}

/// Copies an existing traced model file.
pub struct LocalTracedFile {
    path: PathBuf,
}

impl LocalTracedFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Tracer for LocalTracedFile {
    async fn trace(&self, _model: &str, _task: TaskType, dest: &Path) -> Result<()> {
        if same_file(&self.path, dest).await {
            return Ok(());
        }
        fs::copy(&self.path, dest).await.map_err(|e| {
            AcquireError::Trace(format!("Failed to copy {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}

/// Whether `a` and `b` resolve to the same existing file.
///
/// `fs::copy` of a file onto itself truncates it.
pub(crate) async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Runs an external exporter.
///
/// `{model}`, `{task}` and `{output}` in the arguments are replaced with the
/// hub model id, the task tag and the destination path.
///
/// # Example
/// ```ignore
/// let tracer = CommandTracer::new(
///     "python3",
///     vec!["trace.py".into(), "--model".into(), "{model}".into(), "--out".into(), "{output}".into()],
/// );
/// ```
pub struct CommandTracer {
    program: String,
    args: Vec<String>,
}

impl CommandTracer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, model: &str, task: TaskType, dest: &Path) -> Vec<String> {
        let output = dest.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{model}", model)
                    .replace("{task}", task.as_str())
                    .replace("{output}", &output)
            })
            .collect()
    }
}

#[async_trait]
impl Tracer for CommandTracer {
    async fn trace(&self, model: &str, task: TaskType, dest: &Path) -> Result<()> {
        let args = self.expand_args(model, task, dest);
        tracing::info!("Tracing {} with `{} {}`", model, self.program, args.join(" "));

        // Stale output from an earlier run must not pass for a fresh trace
        if fs::try_exists(dest).await? {
            fs::remove_file(dest).await?;
        }

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| AcquireError::Trace(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquireError::Trace(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if !fs::try_exists(dest).await? {
            return Err(AcquireError::Trace(format!(
                "{} finished but did not write {}",
                self.program,
                dest.display()
            )));
        }

        Ok(())
    }
}
