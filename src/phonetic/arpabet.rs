//! ARPAbet phonetic dictionary with per-grapheme alignments.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::alphabet::SymbolId;
use crate::error::{ModelError, Result};
use crate::phonetic::{PhoneAlignment, PhoneticAligner};

/// Phone classes: vowel, consonant, or neither.
const CLASS_VOWEL: &str = "V";
const CLASS_CONSONANT: &str = "C";
const CLASS_NONE: &str = "NONE";

/// ARPAbet phones grouped by class. `EPS` marks a phone row with no
/// grapheme; `OOD` marks characters not covered by the dictionary.
const VOWELS: &[&str] = &[
    // Monophthongs
    "AO", "AA", "IY", "UW", "EH", "IH", "UH", "AH", "AX", "AE",
    // Diphthongs
    "EY", "AY", "OW", "AW", "OY",
    // R-colored vowels
    "ER", "AXR", "EH R", "UH R", "AA R", "IH R", "IY R", "AW R",
];
const CONSONANTS: &[&str] = &[
    // Stops
    "P", "B", "T", "D", "K", "G",
    // Affricates
    "CH", "JH",
    // Fricatives
    "F", "V", "TH", "DH", "S", "Z", "SH", "ZH", "HH",
    // Nasals
    "M", "EM", "N", "EN", "NG", "ENG",
    // Liquids
    "L", "EL", "R", "DX", "NX",
    // Semi-vowels
    "Y", "W", "Q",
];

/// One dictionary entry: phones and phone classes aligned to the headword's
/// graphemes, in grapheme order.
#[derive(Debug, Clone)]
struct Entry {
    phones: Vec<u16>,
    classes: Vec<u16>,
}

/// A word-to-pronunciation map with per-character alignments.
///
/// The phone inventory (ARPAbet phones plus `EPS` and `OOD`) is built at
/// construction; [`load`](ArpabetDictionary::load) reads a dictionary file of
/// the form
///
/// ```text
/// WORD n
/// g1 P1
/// ...
/// gn Pn
/// ```
///
/// where each of the `n` rows pairs a grapheme (or `EPS` for an inserted
/// phone) with an ARPAbet phone. Trailing stress digits on vowels are
/// stripped.
///
/// Until a file has been loaded, [`is_loaded`](PhoneticAligner::is_loaded)
/// is `false` and [`AlignedString`](crate::aligned::AlignedString)
/// construction falls back to the identity alignment.
#[derive(Debug, Clone)]
pub struct ArpabetDictionary {
    phone_index: FxHashMap<String, u16>,
    phone_names: Vec<String>,
    class_index: FxHashMap<String, u16>,
    class_names: Vec<String>,
    /// Phone id -> class id.
    phone_class: Vec<u16>,
    /// Uppercase headword -> aligned pronunciation.
    entries: FxHashMap<String, Entry>,
    ood_phone: u16,
    loaded: bool,
}

impl ArpabetDictionary {
    /// Build the phone inventory with no entries loaded.
    pub fn new() -> Self {
        let mut dict = ArpabetDictionary {
            phone_index: FxHashMap::default(),
            phone_names: Vec::new(),
            class_index: FxHashMap::default(),
            class_names: Vec::new(),
            phone_class: Vec::new(),
            entries: FxHashMap::default(),
            ood_phone: 0,
            loaded: false,
        };
        for phone in VOWELS {
            dict.add_phone(phone, CLASS_VOWEL);
        }
        for phone in CONSONANTS {
            dict.add_phone(phone, CLASS_CONSONANT);
        }
        dict.add_phone("EPS", CLASS_NONE);
        dict.ood_phone = dict.add_phone("OOD", CLASS_NONE);
        dict
    }

    fn add_phone(&mut self, phone: &str, class: &str) -> u16 {
        let class_id = match self.class_index.get(class) {
            Some(&id) => id,
            None => {
                let id = self.class_names.len() as u16;
                self.class_index.insert(class.to_string(), id);
                self.class_names.push(class.to_string());
                id
            }
        };
        let phone_id = self.phone_names.len() as u16;
        self.phone_index.insert(phone.to_string(), phone_id);
        self.phone_names.push(phone.to_string());
        self.phone_class.push(class_id);
        phone_id
    }

    /// Load dictionary entries from an aligned pronunciation file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DictionaryLoad`] if the file is unreadable or
    /// malformed (bad header, truncated alignment block, unknown phone).
    /// On error no entries are kept; the dictionary stays in its prior state.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let fail = |reason: String| ModelError::DictionaryLoad {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let reader = BufReader::new(file);

        let mut entries: FxHashMap<String, Entry> = FxHashMap::default();
        let mut word: Option<String> = None;
        let mut remaining = 0usize;
        let mut phones = Vec::new();
        let mut classes = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| fail(format!("line {}: {}", lineno + 1, e)))?;
            let fields: SmallVec<[&str; 2]> = line.split_whitespace().collect();

            if word.is_none() {
                if fields.is_empty() {
                    continue;
                }
                if fields.len() < 2 {
                    return Err(fail(format!("line {}: expected `WORD n` header", lineno + 1)));
                }
                let count: usize = fields[1].parse().map_err(|_| {
                    fail(format!("line {}: bad alignment count {:?}", lineno + 1, fields[1]))
                })?;
                if count == 0 {
                    return Err(fail(format!("line {}: empty alignment", lineno + 1)));
                }
                word = Some(fields[0].to_string());
                remaining = count;
                phones = Vec::with_capacity(count);
                classes = Vec::with_capacity(count);
            } else {
                if fields.len() < 2 {
                    return Err(fail(format!(
                        "line {}: expected `grapheme phone` alignment row",
                        lineno + 1
                    )));
                }
                let phone = strip_stress(fields[1]);
                let id = *self
                    .phone_index
                    .get(phone)
                    .ok_or_else(|| fail(format!("line {}: unknown phone {:?}", lineno + 1, phone)))?;
                phones.push(id);
                classes.push(self.phone_class[id as usize]);
                remaining -= 1;
                if remaining == 0 {
                    let headword = word.take().unwrap_or_default();
                    entries.insert(
                        headword,
                        Entry {
                            phones: std::mem::take(&mut phones),
                            classes: std::mem::take(&mut classes),
                        },
                    );
                }
            }
        }
        if let Some(w) = word {
            return Err(fail(format!("truncated alignment block for {:?}", w)));
        }

        self.entries = entries;
        self.loaded = true;
        Ok(())
    }

    /// Number of phones in the inventory.
    pub fn num_phones(&self) -> usize {
        self.phone_names.len()
    }

    /// Number of phone classes.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Number of loaded headwords.
    pub fn num_words(&self) -> usize {
        self.entries.len()
    }

    /// Phone id of the out-of-dictionary sentinel.
    pub fn ood_phone(&self) -> u16 {
        self.ood_phone
    }

    /// Name of a phone id.
    pub fn phone_name(&self, phone: u16) -> Option<&str> {
        self.phone_names.get(phone as usize).map(|s| s.as_str())
    }

    /// Class id of a phone id.
    pub fn class_of(&self, phone: u16) -> Option<u16> {
        self.phone_class.get(phone as usize).copied()
    }

    /// Name of a class id.
    pub fn class_name(&self, class: u16) -> Option<&str> {
        self.class_names.get(class as usize).map(|s| s.as_str())
    }
}

impl Default for ArpabetDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl PhoneticAligner for ArpabetDictionary {
    /// Align `text` against the loaded entries.
    ///
    /// The string is uppercased and split on whitespace; punctuation is
    /// trimmed off the ends of each token, and the remaining letter core is
    /// matched whole against the dictionary if it is at least 3 characters
    /// long. A match copies the entry's phones onto the core's character
    /// span. Every other position keeps the `OOD` phone.
    fn align(&self, text: &str, glyphs: &[SymbolId]) -> PhoneAlignment {
        let len = glyphs.len();
        let ood_class = self.phone_class[self.ood_phone as usize];
        let mut phones = vec![self.ood_phone; len];
        let mut classes = vec![ood_class; len];

        let upper: SmallVec<[char; 32]> = text
            .chars()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .collect();

        let mut i = 0;
        while i < len {
            if upper[i].is_whitespace() {
                i += 1;
                continue;
            }
            let start = i;
            while i < len && !upper[i].is_whitespace() {
                i += 1;
            }
            let span = &upper[start..i];
            // Trim punctuation off the ends; a token with interior
            // punctuation has no dictionary form and stays OOD.
            let head = span.iter().take_while(|c| !c.is_alphabetic()).count();
            let tail = span.iter().rev().take_while(|c| !c.is_alphabetic()).count();
            if head + tail >= span.len() {
                continue;
            }
            let core = &span[head..span.len() - tail];
            if core.len() < 3 || !core.iter().all(|c| c.is_alphabetic()) {
                continue;
            }
            let token: String = core.iter().collect();
            if let Some(entry) = self.entries.get(&token) {
                let n = core.len().min(entry.phones.len());
                let at = start + head;
                phones[at..at + n].copy_from_slice(&entry.phones[..n]);
                classes[at..at + n].copy_from_slice(&entry.classes[..n]);
            }
        }

        PhoneAlignment { phones, classes }
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Strip a trailing stress digit: `AA1` -> `AA`.
fn strip_stress(phone: &str) -> &str {
    phone.trim_end_matches(|c: char| c.is_ascii_digit())
}
