//! Workflow configuration loaded from a TOML file.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! The defaults are the strict policies: in-order stage advancement and
//! delivery updates only after completion.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, WorkflowError};

/// How a first (non-version) attachment interacts with the stage pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageOrder {
    /// Only the area the document is waiting on may add its first attachment.
    #[default]
    Strict,
    /// Any area's first attachment advances the document one step.
    ///
    /// The step is taken from the current state. The attaching area never
    /// picks the target stage, so stages are not skipped or revisited.
    Permissive,
}

/// What an actor without `see-all-documents` or `register-document-sales`
/// gets back from a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisibilityPolicy {
    /// Every document, so other areas can follow the flow.
    #[default]
    Permissive,
    /// Only documents pending on, or already holding files for, an area the
    /// actor can attach to.
    AreaScoped,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub stage_order: StageOrder,

    #[serde(default)]
    pub visibility: VisibilityPolicy,

    #[serde(default = "default_delivery_requires_completion")]
    pub delivery_requires_completion: bool,

    /// Directory of the sled database.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_delivery_requires_completion() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("order-workflow.db")
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stage_order: StageOrder::default(),
            visibility: VisibilityPolicy::default(),
            delivery_requires_completion: default_delivery_requires_completion(),
            database_path: default_database_path(),
        }
    }
}

impl WorkflowConfig {
    /// Loads the configuration at `path`, or the defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No workflow config found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| WorkflowError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| WorkflowError::Config(e.to_string()))
    }

    /// Opens the sled database this configuration points at.
    pub fn open_database(&self) -> Result<sled::Db> {
        Ok(sled::open(&self.database_path)?)
    }
}
