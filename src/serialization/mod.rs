//! Model snapshot serialization.
//!
//! A trained model is persisted as a [`ModelSnapshot`]: the alphabet's
//! symbols in index order plus the flat numeric parameter tables of both
//! sub-models. Formats are pluggable through [`ModelSerializer`], with
//! bincode and JSON implementations provided.
//!
//! # Example
//!
//! ```rust,ignore
//! use stochastic_edit::serialization::{BincodeSerializer, ModelSerializer, ModelSnapshot};
//! use std::fs::File;
//!
//! let snapshot = ModelSnapshot::new(&alphabet, model);
//! BincodeSerializer::serialize(&snapshot, File::create("model.bin")?)?;
//!
//! let restored = BincodeSerializer::deserialize(File::open("model.bin")?)?;
//! let (alphabet, model) = restored.restore();
//! ```

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::alphabet::CharacterAlphabet;
use crate::transducer::BackoffEditModel;

mod bincode_impl;
mod json_impl;

pub use bincode_impl::BincodeSerializer;
pub use json_impl::JsonSerializer;

/// Everything needed to reconstruct a trained model: alphabet symbols in
/// index order and the full parameter tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Alphabet symbols, index order.
    pub symbols: Vec<char>,
    /// The model parameters.
    pub model: BackoffEditModel,
}

impl ModelSnapshot {
    /// Capture `model` together with the alphabet it was trained against.
    pub fn new(alphabet: &CharacterAlphabet, model: BackoffEditModel) -> Self {
        ModelSnapshot {
            symbols: alphabet.symbols().to_vec(),
            model,
        }
    }

    /// Rebuild the (frozen) alphabet and model.
    pub fn restore(self) -> (CharacterAlphabet, BackoffEditModel) {
        (CharacterAlphabet::from_symbols(self.symbols), self.model)
    }
}

/// Trait for reading and writing model snapshots in one format.
pub trait ModelSerializer {
    /// Write `snapshot` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    fn serialize<W: Write>(snapshot: &ModelSnapshot, writer: W) -> Result<(), SerializationError>;

    /// Read a snapshot from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or reading fails.
    fn deserialize<R: Read>(reader: R) -> Result<ModelSnapshot, SerializationError>;
}

/// Errors that can occur during snapshot serialization/deserialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// Error during bincode encoding/decoding.
    #[error("bincode error")]
    Bincode(#[from] bincode::Error),
    /// Error during JSON encoding/decoding.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
