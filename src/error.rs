//src/error.rs

use thiserror::Error;

/// Fatal problems with the report itself. A report carrying a "no hits"
/// message is not an error and never produces one of these.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized report format: expected XML or JSON, found {0:?}")]
    UnknownFormat(String),

    /// The nesting of the report does not match what the engine emits.
    #[error("Malformed report at `{path}`: expected {expected}, found {found}")]
    Shape {
        path: String,
        expected: &'static str,
        found: String,
    },

    /// Well-formed nesting, but a value breaks a precondition.
    #[error("Invalid report at `{path}`: {reason}")]
    Invalid { path: String, reason: String },
}

/// Failure of the taxonomy collaborator. Never fatal to the pipeline.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Taxonomy lookup unavailable: {0}")]
    Unavailable(String),
}

/// Why a forest could not be built. The bundle still gets produced.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("no hit could be resolved against the taxonomy")]
    NoResolvedHits,

    #[error("ancestor lookup failed: {0}")]
    Lookup(#[from] LookupError),
}
