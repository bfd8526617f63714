use std::{
    fmt, io,
    path::{Path, PathBuf},
};

/// Position of a line inside a test definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File the line was read from.
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// Byte offset of the start of the line.
    pub offset: u64,
}

impl Location {
    pub fn new(path: &Path, line: usize, offset: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            line,
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// An error from verify.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A line matches no known instruction, or a `define` is malformed.
    #[error("{loc}: {reason}: `{text}`")]
    Syntax {
        loc: Location,
        text: String,
        reason: &'static str,
    },

    /// `test:` inside an open block, `endtest` or a keyword outside of one,
    /// or end of file inside a block.
    #[error("{loc}: {reason}: `{text}`")]
    Scope {
        loc: Location,
        text: String,
        reason: &'static str,
    },

    /// A test block closed without all required fields.
    #[error("{loc}: test `{name}` is missing required field(s): {missing}")]
    MissingField {
        loc: Location,
        name: String,
        missing: String,
    },

    /// The index and a fresh scan both failed to locate the test.
    #[error("test {config}::{name} not found")]
    TestNotFound { config: String, name: String },

    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// Index storage exists but cannot be decoded.
    #[error("corrupt index {}: {msg}", path.display())]
    Index { path: PathBuf, msg: String },

    #[error("{0}")]
    Config(String),

    /// A build or run step could not be started or its task died.
    #[error("{label}: {msg}")]
    Exec { label: String, msg: String },
}

impl VerifyError {
    /// Attach a path to an I/O error.
    pub fn io(path: &Path, source: io::Error) -> Self {
        VerifyError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for errors produced by malformed test definitions.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            VerifyError::Syntax { .. }
                | VerifyError::Scope { .. }
                | VerifyError::MissingField { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;

// Helper method to collapse nested Results
pub trait RichResult<T, E> {
    fn collapse(self) -> std::result::Result<T, E>;
}

impl<T, E> RichResult<T, E> for std::result::Result<std::result::Result<T, E>, E> {
    fn collapse(self) -> std::result::Result<T, E> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e),
        }
    }
}
