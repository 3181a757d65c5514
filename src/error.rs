//! Error types for transducer construction, training, and scoring.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or using a string-edit model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A symbol was looked up in a frozen alphabet that has never seen it.
    ///
    /// Returned instead of growing the alphabet once [`freeze`] has been
    /// called. Callers decide whether to skip the offending string or abort.
    ///
    /// [`freeze`]: crate::alphabet::CharacterAlphabet::freeze
    #[error("symbol {0:?} is not in the frozen alphabet")]
    UnknownSymbol(char),

    /// A phonetic dictionary file was unreadable or malformed.
    ///
    /// Initialization of the collaborator fails as a whole; no partially
    /// loaded entries are kept.
    #[error("failed to load phonetic dictionary {}: {}", .path.display(), .reason)]
    DictionaryLoad {
        /// Path of the dictionary file.
        path: PathBuf,
        /// What went wrong, including a line number where applicable.
        reason: String,
    },

    /// A corpus file was unreadable or structurally invalid.
    #[error("failed to load corpus {}: {}", .path.display(), .reason)]
    CorpusLoad {
        /// Path of the corpus file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A model type named on the command line or in configuration is not one
    /// this crate implements.
    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    /// The requested operation is declared by the contract but intentionally
    /// not implemented.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// An underlying I/O failure.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for string-edit model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
