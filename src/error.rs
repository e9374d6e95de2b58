//! Error types for the build pipeline.
//!
//! Every external tool failure is detected by exit status alone.

use std::path::PathBuf;

/// Result alias used throughout the library.
pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A translation unit failed to compile.
    #[error("{} compilation error{}", .source_file.display(), fmt_code(.code))]
    Compile {
        source_file: PathBuf,
        code: Option<i32>,
    },

    /// The production or test link failed.
    #[error("linking error while producing {}{}", .output.display(), fmt_code(.code))]
    Link { output: PathBuf, code: Option<i32> },

    /// Renaming a symbol inside a staged object failed.
    #[error("symbol rename {from}={to} failed in {}: {reason}", .object.display())]
    SymbolPatch {
        object: PathBuf,
        from: String,
        to: String,
        reason: String,
    },

    /// The external tool could not be started at all.
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The external tool ran past the configured timeout and was killed.
    #[error("'{program}' did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no *.{extension} source files found under {}", .root.display())]
    NoSources { root: PathBuf, extension: String },

    #[error("special module {} not found", .path.display())]
    MissingModule { path: PathBuf },

    /// Two sources would be staged under the same object name.
    #[error(
        "{} and {} would both compile to {stem}.o",
        .first.display(),
        .second.display()
    )]
    DuplicateObject {
        stem: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The staged objects were rewritten by the test patch and cannot be
    /// linked into a production binary again without recompiling.
    #[error(
        "objects in {} carry renamed entry symbols; rebuild to recompile them",
        .dir.display()
    )]
    StalePatchedObjects { dir: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" (exit code {})", c),
        None => " (terminated by signal)".to_string(),
    }
}
