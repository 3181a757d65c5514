//! Phonetic dictionary loading and alignment.

use std::io::Write;

use stochastic_edit::prelude::*;

const SMITH_DICT: &str = "\
SMITH 5
S S
M M
I IH1
T TH
H EPS
JON 3
J JH
O AA1
N N
";

fn dict_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_aligned_entries() {
    let file = dict_file(SMITH_DICT);
    let mut dict = ArpabetDictionary::new();
    dict.load(file.path()).unwrap();

    assert!(dict.is_loaded());
    assert_eq!(dict.num_words(), 2);
}

#[test]
fn alignment_covers_matched_token_spans() {
    let file = dict_file(SMITH_DICT);
    let mut dict = ArpabetDictionary::new();
    dict.load(file.path()).unwrap();

    let mut alphabet = CharacterAlphabet::new();
    let s = AlignedString::with_aligner("Bob Smith", &mut alphabet, &dict).unwrap();
    assert_eq!(s.len(), 9);

    // "Bob" is not in the dictionary: its positions carry the OOD phone.
    for pos in 0..4 {
        assert_eq!(s.phone_at(pos), dict.ood_phone());
    }
    // "Smith" is matched; position 4 is 'S'.
    let s_phone = s.phone_at(4);
    assert_eq!(dict.phone_name(s_phone), Some("S"));
    assert_eq!(dict.class_name(s.class_at(4)).unwrap(), "C");
    // 'i' is a vowel, stress digit stripped.
    assert_eq!(dict.phone_name(s.phone_at(6)), Some("IH"));
    assert_eq!(dict.class_name(s.class_at(6)).unwrap(), "V");
    // Silent 'h' is EPS with class NONE.
    assert_eq!(dict.phone_name(s.phone_at(8)), Some("EPS"));
    assert_eq!(dict.class_name(s.class_at(8)).unwrap(), "NONE");
}

#[test]
fn trailing_punctuation_is_trimmed_before_matching() {
    let file = dict_file(SMITH_DICT);
    let mut dict = ArpabetDictionary::new();
    dict.load(file.path()).unwrap();

    let mut alphabet = CharacterAlphabet::new();
    let s = AlignedString::with_aligner("Smith, Jon", &mut alphabet, &dict).unwrap();

    // "Smith," matches SMITH on the letter core; the comma stays OOD.
    assert_eq!(dict.phone_name(s.phone_at(0)), Some("S"));
    assert_eq!(dict.phone_name(s.phone_at(4)), Some("EPS"));
    assert_eq!(s.phone_at(5), dict.ood_phone());
    // "Jon" still matches after the punctuated token.
    assert_eq!(dict.phone_name(s.phone_at(7)), Some("JH"));
    assert_eq!(dict.phone_name(s.phone_at(9)), Some("N"));
}

#[test]
fn interior_punctuation_leaves_token_unmatched() {
    let file = dict_file("OBRIEN 6\nO OW1\nB B\nR R\nI IY1\nE EPS\nN N\n");
    let mut dict = ArpabetDictionary::new();
    dict.load(file.path()).unwrap();

    let mut alphabet = CharacterAlphabet::new();
    let s = AlignedString::with_aligner("O'Brien", &mut alphabet, &dict).unwrap();
    assert!(s.phones().iter().all(|&p| p == dict.ood_phone()));
}

#[test]
fn short_tokens_stay_out_of_dictionary() {
    let file = dict_file(SMITH_DICT);
    let mut dict = ArpabetDictionary::new();
    dict.load(file.path()).unwrap();

    let mut alphabet = CharacterAlphabet::new();
    // "Jo" is under the 3-character threshold even though "JON" is close.
    let s = AlignedString::with_aligner("Jo", &mut alphabet, &dict).unwrap();
    assert!(s.phones().iter().all(|&p| p == dict.ood_phone()));
}

#[test]
fn malformed_count_fails_loading() {
    let file = dict_file("SMITH five\nS S\n");
    let mut dict = ArpabetDictionary::new();
    match dict.load(file.path()) {
        Err(ModelError::DictionaryLoad { .. }) => {}
        other => panic!("expected DictionaryLoad, got {:?}", other),
    }
    assert!(!dict.is_loaded());
    assert_eq!(dict.num_words(), 0);
}

#[test]
fn truncated_block_fails_loading() {
    let file = dict_file("SMITH 5\nS S\nM M\n");
    let mut dict = ArpabetDictionary::new();
    assert!(dict.load(file.path()).is_err());
    assert!(!dict.is_loaded());
}

#[test]
fn unknown_phone_fails_loading() {
    let file = dict_file("ABC 1\nA QQX\n");
    let mut dict = ArpabetDictionary::new();
    match dict.load(file.path()) {
        Err(ModelError::DictionaryLoad { reason, .. }) => {
            assert!(reason.contains("QQX"), "reason was {:?}", reason);
        }
        other => panic!("expected DictionaryLoad, got {:?}", other),
    }
}

#[test]
fn failed_reload_preserves_previous_entries() {
    let good = dict_file(SMITH_DICT);
    let bad = dict_file("BROKEN 2\nB B\n");

    let mut dict = ArpabetDictionary::new();
    dict.load(good.path()).unwrap();
    assert_eq!(dict.num_words(), 2);

    assert!(dict.load(bad.path()).is_err());
    // The earlier load is intact.
    assert!(dict.is_loaded());
    assert_eq!(dict.num_words(), 2);
}

#[test]
fn missing_file_fails_loading() {
    let mut dict = ArpabetDictionary::new();
    assert!(dict.load("/nonexistent/dictionary/path").is_err());
}
