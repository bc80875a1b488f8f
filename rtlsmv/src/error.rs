use crate::code_writer;

use thiserror::Error;

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a design from being read or dumped.
///
/// None of these are recoverable within a run: the module being dumped is abandoned and any text already written is not meaningful.
#[derive(Debug, Error)]
pub enum Error {
    #[error("module `{module}`: unsupported {construct}")]
    UnsupportedConstruct { module: String, construct: String },

    #[error("module `{module}`: cell `{cell}` {reason}; run `{remedy}` first")]
    UnsupportedMemoryConfiguration {
        module: String,
        cell: String,
        reason: String,
        remedy: String,
    },

    #[error("module `{module}`: internal consistency error: {message}")]
    InternalConsistency { module: String, message: String },

    #[error("can't find top module `{0}`")]
    TopModuleNotFound(String),

    #[error("malformed netlist: {0}")]
    Netlist(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    CodeWriter(#[from] code_writer::Error),
}

impl Error {
    pub(crate) fn unsupported(module: &str, construct: impl Into<String>) -> Error {
        Error::UnsupportedConstruct {
            module: module.to_string(),
            construct: construct.into(),
        }
    }

    pub(crate) fn consistency(module: &str, message: impl Into<String>) -> Error {
        Error::InternalConsistency {
            module: module.to_string(),
            message: message.into(),
        }
    }
}
