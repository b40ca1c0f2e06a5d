//! Error taxonomy for configuration loading and run dispatch.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading a run configuration. All are fatal at load time:
/// no partially parsed configuration is ever returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read action document {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse action document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing OpMode '{0}'")]
    NotFound(String),

    #[error("malformed document: {0}")]
    MalformedStructure(String),

    #[error("element '{0}' missing or empty")]
    MissingField(String),

    #[error("invalid value '{value}' in element '{field}'")]
    InvalidValue { field: String, value: String },

    #[error("unknown {kind} '{name}'")]
    UnknownEnumValue { kind: &'static str, name: String },

    #[error("unexpected element <{element}> under <{parent}>")]
    UnexpectedElement { parent: String, element: String },

    #[error("only one OCV_CHOICE element is allowed")]
    DuplicateBranch,

    #[error("OCV_CHOICE must name each target zone exactly once (found {found} zone elements)")]
    IncompleteBranchTable { found: usize },
}

/// Failures that stop a run once dispatch has started.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no support for the command {0}")]
    UnsupportedCommand(String),

    #[error("zone classification failed: {0:#}")]
    ClassificationFailed(#[source] anyhow::Error),

    #[error("invalid value '{value}' for attribute '{attribute}' of {command}")]
    InvalidValue {
        command: String,
        attribute: String,
        value: String,
    },

    #[error("{0} reached without a branch table")]
    MissingBranchTable(String),

    #[error("device failure: {0:#}")]
    Device(#[source] anyhow::Error),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl RunError {
    /// Wrap a collaborator failure, keeping cancellation distinct from faults.
    pub fn from_device(err: anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.is::<Interrupted>()) {
            return RunError::Interrupted(Interrupted);
        }
        RunError::Device(err)
    }
}

/// Cooperative cancellation requested by the host. Not a fault: it must pass
/// through every layer unchanged and never be held on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run interrupted by stop request")]
pub struct Interrupted;
