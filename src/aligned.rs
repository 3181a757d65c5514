//! Per-string bundles of glyph and phone codes.

use crate::alphabet::{CharacterAlphabet, SymbolId};
use crate::error::Result;
use crate::phonetic::{IdentityAligner, PhoneticAligner};

/// An immutable string annotated with parallel code arrays.
///
/// Four arrays (glyph codes, uppercase glyph codes, phone codes, and
/// phone-class codes) are produced once at construction and all have
/// exactly one entry per character. Strings are read-only afterwards; the
/// model core consumes only the glyph codes, while the phone arrays carry
/// the optional phonetic annotation.
///
/// Construction grows the alphabet with any unseen characters (including
/// uppercase forms); on a frozen alphabet an unseen character is an
/// [`UnknownSymbol`](crate::error::ModelError::UnknownSymbol) error.
#[derive(Debug, Clone)]
pub struct AlignedString {
    raw: String,
    glyphs: Vec<SymbolId>,
    upper_glyphs: Vec<SymbolId>,
    phones: Vec<u16>,
    phone_classes: Vec<u16>,
}

impl AlignedString {
    /// Annotate `text` with the identity phone alignment.
    pub fn new(text: &str, alphabet: &mut CharacterAlphabet) -> Result<Self> {
        Self::with_aligner(text, alphabet, &IdentityAligner)
    }

    /// Annotate `text`, taking phone arrays from `aligner`.
    ///
    /// An aligner that is not [`loaded`](PhoneticAligner::is_loaded) falls
    /// back to the identity alignment.
    pub fn with_aligner(
        text: &str,
        alphabet: &mut CharacterAlphabet,
        aligner: &dyn PhoneticAligner,
    ) -> Result<Self> {
        let mut glyphs = Vec::with_capacity(text.len());
        let mut upper_glyphs = Vec::with_capacity(text.len());
        for c in text.chars() {
            glyphs.push(alphabet.index_of(c)?);
            let upper = c.to_uppercase().next().unwrap_or(c);
            upper_glyphs.push(alphabet.index_of(upper)?);
        }

        let alignment = if aligner.is_loaded() {
            aligner.align(text, &glyphs)
        } else {
            IdentityAligner.align(text, &glyphs)
        };
        debug_assert_eq!(alignment.phones.len(), glyphs.len());
        debug_assert_eq!(alignment.classes.len(), glyphs.len());

        Ok(AlignedString {
            raw: text.to_string(),
            glyphs,
            upper_glyphs,
            phones: alignment.phones,
            phone_classes: alignment.classes,
        })
    }

    /// Number of characters.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether the string is empty.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// The original text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Glyph code at character position `pos`.
    pub fn glyph_at(&self, pos: usize) -> SymbolId {
        self.glyphs[pos]
    }

    /// Uppercase glyph code at character position `pos`.
    pub fn upper_glyph_at(&self, pos: usize) -> SymbolId {
        self.upper_glyphs[pos]
    }

    /// Phone code at character position `pos`.
    pub fn phone_at(&self, pos: usize) -> u16 {
        self.phones[pos]
    }

    /// Phone-class code at character position `pos`.
    pub fn class_at(&self, pos: usize) -> u16 {
        self.phone_classes[pos]
    }

    /// All glyph codes.
    pub fn glyphs(&self) -> &[SymbolId] {
        &self.glyphs
    }

    /// All uppercase glyph codes.
    pub fn upper_glyphs(&self) -> &[SymbolId] {
        &self.upper_glyphs
    }

    /// All phone codes.
    pub fn phones(&self) -> &[u16] {
        &self.phones
    }

    /// All phone-class codes.
    pub fn phone_classes(&self) -> &[u16] {
        &self.phone_classes
    }
}
