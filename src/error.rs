//! Diagnostic error types for kgstore.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Lookups that find nothing are not errors:
//! they return `None`, `false` or an empty collection.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for kgstore.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

/// Errors raised while mutating a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("node ID space exhausted: ID {next} is already taken")]
    #[diagnostic(
        code(kgstore::graph::ids_exhausted),
        help(
            "No node ID is left above the highest one in use. The graph holds a node \
             with ID i64::MAX, usually from an explicit ID or a hand-edited counter."
        )
    )]
    IdsExhausted { next: i64 },

    #[error("rejected triple ({subject}, {predicate}, {object}): {reason}")]
    #[diagnostic(
        code(kgstore::graph::rejected_triple),
        help("The graph refused this triple. Check the reason and adjust the input.")
    )]
    RejectedTriple {
        subject: String,
        predicate: String,
        object: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(kgstore::store::io),
        help(
            "A filesystem operation failed. Check that the parent directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode knowledge graph: {message}")]
    #[diagnostic(
        code(kgstore::store::encode),
        help("Serialization of the in-memory graph failed. The file on disk was left untouched.")
    )]
    Encode { message: String },

    #[error("failed to decode knowledge graph: {message}")]
    #[diagnostic(
        code(kgstore::store::decode),
        help(
            "The persisted data is not a valid knowledge graph for this codec. \
             Files written with the binary codec cannot be read with the json codec \
             and vice versa: check the --codec flag or the `codec` config key."
        )
    )]
    Decode { message: String },

    #[error("no knowledge graph data: input is empty")]
    #[diagnostic(
        code(kgstore::store::empty),
        help("An empty input holds no graph yet. Start from a fresh graph instead.")
    )]
    EmptyInput,
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid triple: {component} must not be empty")]
    #[diagnostic(
        code(kgstore::engine::invalid_triple),
        help(
            "Every triple needs a non-empty subject, predicate and object. \
             Empty labels cannot be found again by any query."
        )
    )]
    InvalidTriple { component: &'static str },

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(kgstore::engine::config_read),
        help("Ensure the config file exists and is readable.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(kgstore::engine::config_parse),
        help("Check the TOML syntax. Valid keys are `codec` (\"binary\" or \"json\") and `case_sensitive`.")
    )]
    ConfigParse { path: String, message: String },
}

/// Convenience alias for functions returning kgstore results.
pub type KgResult<T> = std::result::Result<T, KgError>;
