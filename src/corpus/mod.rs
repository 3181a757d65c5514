//! Alias-list corpus loading and training-pair assembly.
//!
//! A corpus file has one entity per line: tab-separated name fields, the
//! first being the canonical name and the rest its aliases.
//!
//! ```text
//! John Smith\tJon Smith\tJohnny Smith
//! Acme Corporation\tAcme Corp\tACME
//! ```
//!
//! Fields shorter than 3 characters or containing non-ASCII characters are
//! dropped, and lines left with fewer than 2 fields are skipped; skip counts
//! are logged. Surviving entities become weighted (canonical, alias)
//! [`TrainingPair`]s.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use tracing::info;

use crate::aligned::AlignedString;
use crate::alphabet::CharacterAlphabet;
use crate::error::{ModelError, Result};
use crate::phonetic::PhoneticAligner;
use crate::transducer::TrainingPair;

/// Minimum length for a name field to survive filtering.
const MIN_NAME_LEN: usize = 3;

/// An entity alias list: canonical names with their aliases.
#[derive(Debug, Clone, Default)]
pub struct AliasCorpus {
    /// One entry per surviving entity; the canonical name comes first.
    entities: Vec<Vec<String>>,
    /// Lines dropped by filtering.
    skipped: usize,
    /// Lines read.
    total: usize,
}

impl AliasCorpus {
    /// Load a corpus from a tab-separated alias file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::CorpusLoad`] if the file cannot be read.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fail = |reason: String| ModelError::CorpusLoad {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let reader = BufReader::new(file);
        let mut lines = Vec::new();
        for line in reader.lines() {
            lines.push(line.map_err(|e| fail(e.to_string()))?);
        }
        Ok(Self::from_lines(lines))
    }

    /// Build a corpus from in-memory lines, applying the same filtering as
    /// [`load`](AliasCorpus::load).
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corpus = AliasCorpus::default();
        for line in lines {
            let line = line.as_ref();
            if line.is_empty() {
                corpus.skipped += 1;
                continue;
            }
            corpus.total += 1;

            let fields: Vec<String> = line
                .split('\t')
                .filter(|t| keep_name(t))
                .map(|t| t.to_string())
                .collect();
            if fields.len() <= 1 {
                corpus.skipped += 1;
                continue;
            }
            corpus.entities.push(fields);
        }
        info!(
            entities = corpus.entities.len(),
            skipped = corpus.skipped,
            total = corpus.total,
            "alias corpus loaded"
        );
        corpus
    }

    /// Number of surviving entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Number of lines dropped by filtering.
    pub fn num_skipped(&self) -> usize {
        self.skipped
    }

    /// The name lists, canonical name first.
    pub fn entities(&self) -> &[Vec<String>] {
        &self.entities
    }

    /// All distinct names (canonical and alias).
    pub fn unique_names(&self) -> BTreeSet<&str> {
        self.entities
            .iter()
            .flat_map(|e| e.iter().map(|s| s.as_str()))
            .collect()
    }

    /// Distinct uppercase letter-only tokens of length > 2 across all
    /// names, for building a phonetic dictionary.
    pub fn dump_tokens(&self) -> BTreeSet<String> {
        let mut tokens = BTreeSet::new();
        for name in self.unique_names() {
            for token in name.split_whitespace() {
                let cleaned: String = token
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .flat_map(|c| c.to_uppercase())
                    .collect();
                if cleaned.len() > 2 {
                    tokens.insert(cleaned);
                }
            }
        }
        tokens
    }

    /// Assemble training pairs, growing `alphabet` with every character
    /// seen.
    ///
    /// Each pair maps the canonical name (input) to one of its aliases
    /// (output) with weight 1. With `all_aliases` every alias of every
    /// entity is used; otherwise one alias is drawn at random per entity.
    /// `flip` swaps inputs and outputs.
    ///
    /// # Errors
    ///
    /// Propagates [`UnknownSymbol`](ModelError::UnknownSymbol) if `alphabet`
    /// is already frozen and a name contains an unseen character.
    pub fn training_pairs<R: Rng>(
        &self,
        alphabet: &mut CharacterAlphabet,
        aligner: &dyn PhoneticAligner,
        flip: bool,
        all_aliases: bool,
        rng: &mut R,
    ) -> Result<Vec<TrainingPair>> {
        let mut pairs = Vec::new();
        for entity in &self.entities {
            let canonical = &entity[0];
            let aliases = &entity[1..];
            let chosen: &[String] = if all_aliases {
                aliases
            } else {
                let at = rng.gen_range(0..aliases.len());
                std::slice::from_ref(&aliases[at])
            };
            for alias in chosen {
                let (input, output) = if flip {
                    (alias.as_str(), canonical.as_str())
                } else {
                    (canonical.as_str(), alias.as_str())
                };
                let input = AlignedString::with_aligner(input, alphabet, aligner)?;
                let output = AlignedString::with_aligner(output, alphabet, aligner)?;
                pairs.push(TrainingPair::new(Some(input), output));
            }
        }
        Ok(pairs)
    }
}

/// Whether a raw name field survives filtering: at least [`MIN_NAME_LEN`]
/// characters, ASCII only.
fn keep_name(field: &str) -> bool {
    field.len() >= MIN_NAME_LEN && field.chars().all(|c| c.is_ascii())
}

/// Case- and punctuation-normalize a name: uppercase, keep only
/// alphanumerics and spaces.
pub fn normalize(name: &str) -> String {
    name.chars()
        .flat_map(|c| c.to_uppercase())
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}
