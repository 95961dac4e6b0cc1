//! Option-letter alphabet
//!
//! Source exams label options with either Latin letters (A–E) or Hebrew
//! letters (א–ה). Everything downstream of the extraction edge works with the
//! Latin alphabet only; normalization happens exactly once, here.

use std::fmt;

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// Hebrew option letters and their Latin equivalents.
static HEBREW_LETTERS: phf::Map<char, char> = phf_map! {
    'א' => 'A',
    'ב' => 'B',
    'ג' => 'C',
    'ד' => 'D',
    'ה' => 'E',
};

/// One of the five recognized option letters, in alphabet order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
    E,
}

impl OptionLetter {
    /// The full option alphabet in order.
    pub const ALL: [OptionLetter; 5] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
        OptionLetter::E,
    ];

    /// Parse a single character, accepting Latin (either case) and Hebrew.
    pub fn from_char(c: char) -> Option<Self> {
        let c = HEBREW_LETTERS.get(&c).copied().unwrap_or(c);
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLetter::A),
            'B' => Some(OptionLetter::B),
            'C' => Some(OptionLetter::C),
            'D' => Some(OptionLetter::D),
            'E' => Some(OptionLetter::E),
            _ => None,
        }
    }

    /// Parse a letter field as it appears on the wire ("A", "a.", "ב)", ...).
    ///
    /// Takes the first letter-like character and ignores trailing punctuation.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().chars().find_map(Self::from_char)
    }

    /// The Latin character for this letter.
    pub fn as_char(self) -> char {
        match self {
            OptionLetter::A => 'A',
            OptionLetter::B => 'B',
            OptionLetter::C => 'C',
            OptionLetter::D => 'D',
            OptionLetter::E => 'E',
        }
    }

    /// Zero-based position in the alphabet.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_latin_both_cases() {
        assert_eq!(OptionLetter::from_char('A'), Some(OptionLetter::A));
        assert_eq!(OptionLetter::from_char('c'), Some(OptionLetter::C));
        assert_eq!(OptionLetter::from_char('F'), None);
    }

    #[test]
    fn normalizes_hebrew_letters() {
        assert_eq!(OptionLetter::from_char('א'), Some(OptionLetter::A));
        assert_eq!(OptionLetter::from_char('ב'), Some(OptionLetter::B));
        assert_eq!(OptionLetter::from_char('ג'), Some(OptionLetter::C));
        assert_eq!(OptionLetter::from_char('ד'), Some(OptionLetter::D));
        assert_eq!(OptionLetter::from_char('ה'), Some(OptionLetter::E));
    }

    #[test]
    fn parse_tolerates_punctuation() {
        assert_eq!(OptionLetter::parse(" a. "), Some(OptionLetter::A));
        assert_eq!(OptionLetter::parse("ד)"), Some(OptionLetter::D));
        assert_eq!(OptionLetter::parse("(E)"), Some(OptionLetter::E));
        assert_eq!(OptionLetter::parse("12"), None);
    }

    #[test]
    fn alphabet_is_ordered() {
        let mut sorted = OptionLetter::ALL;
        sorted.sort();
        assert_eq!(sorted, OptionLetter::ALL);
        assert_eq!(OptionLetter::D.index(), 3);
    }
}
