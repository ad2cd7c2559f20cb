use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CatalogError {
    #[snafu(display("failed to read reply catalog at {path:?} on `{stage}`: {source}"))]
    ReadCatalog {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse reply catalog on `{stage}`: {source}"))]
    ParseCatalog {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("reply catalog needs {expected} canned replies, found {found}"))]
    MissingReplies {
        stage: &'static str,
        expected: usize,
        found: usize,
    },
    #[snafu(display("reply catalog has no cards"))]
    EmptyCards { stage: &'static str },
}

pub type CatalogResult<T> = Result<T, CatalogError>;
