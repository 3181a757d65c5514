//! # stochastic-edit
//!
//! A probabilistic string-edit transducer for name matching.
//!
//! The crate learns a model of p(surface spelling | canonical spelling) as a
//! distribution over character edit sequences (COPY, SUBSTITUTE, INSERT,
//! DELETE, interleaved through EDIT and NOEDIT regions), trained with
//! Expectation-Maximization over exact alignment marginals. Trained models
//! score whether two name strings plausibly denote the same entity
//! (aliasing, transliteration, spelling variation).
//!
//! ## Example
//!
//! ```rust
//! use stochastic_edit::prelude::*;
//!
//! let mut alphabet = CharacterAlphabet::new();
//! let corpus: Vec<TrainingPair> = [("john", "jon"), ("smith", "smyth")]
//!     .iter()
//!     .map(|(canonical, surface)| {
//!         let x = AlignedString::new(canonical, &mut alphabet).unwrap();
//!         let y = AlignedString::new(surface, &mut alphabet).unwrap();
//!         TrainingPair::new(Some(x), y)
//!     })
//!     .collect();
//! alphabet.freeze();
//!
//! let mut model = BackoffEditModel::for_alphabet(&alphabet);
//! model.em_step(&corpus);
//!
//! let same = model.logp(corpus[0].input.as_ref(), &corpus[0].output);
//! assert!(same.is_finite() && same < 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aligned;
pub mod alphabet;
pub mod corpus;
pub mod error;
pub mod phonetic;
pub mod transducer;

#[cfg(feature = "serialization")]
pub mod serialization;

/// Common imports for convenient usage.
pub mod prelude {
    pub use crate::aligned::AlignedString;
    pub use crate::alphabet::CharacterAlphabet;
    pub use crate::corpus::AliasCorpus;
    pub use crate::error::{ModelError, Result};
    pub use crate::phonetic::{ArpabetDictionary, IdentityAligner, PhoneticAligner};
    pub use crate::transducer::{
        BackoffEditModel, EditOp, RegionState, StringEditModel, TrainingPair,
    };

    #[cfg(feature = "serialization")]
    pub use crate::serialization::{
        BincodeSerializer, JsonSerializer, ModelSerializer, ModelSnapshot,
    };
}
