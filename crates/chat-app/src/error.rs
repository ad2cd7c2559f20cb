use std::path::PathBuf;

use chatbox_reply::CatalogError;
use chatbox_storage::StorageError;
use snafu::Snafu;

/// Failures that stop the terminal client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to open chat storage at {path:?} on `{stage}`: {source}"))]
    OpenStorage {
        stage: &'static str,
        path: PathBuf,
        source: StorageError,
    },
    #[snafu(display("failed to load reply catalog on `{stage}`: {source}"))]
    LoadCatalog {
        stage: &'static str,
        source: CatalogError,
    },
    #[snafu(display("failed to read terminal input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write terminal output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;
