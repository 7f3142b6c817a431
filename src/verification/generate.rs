//! # Code Generation
//!
//! Tokens are drawn from a restricted alphabet that excludes characters
//! prone to transcription error (I, O, 0, 1) and grouped for readability:
//! `XXX-XXX-XXX-XXX` with the default shape.

use rand::rngs::OsRng;
use rand::Rng;

use crate::core::config::CodeShape;

/// Unambiguous code alphabet: A-Z and 2-9 minus I, O, 0, 1
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Produce one random token in the configured shape
pub fn generate_token(shape: &CodeShape) -> String {
    let mut rng = OsRng;
    let mut token = String::with_capacity(shape.groups * (shape.group_len + 1));

    for group in 0..shape.groups {
        if group > 0 {
            token.push('-');
        }
        for _ in 0..shape.group_len {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            token.push(CODE_ALPHABET[idx] as char);
        }
    }

    token
}

/// Normalize user input to the stored form: trim, uppercase, and collapse
/// whitespace runs into the group separator.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_gap = false;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            in_gap = true;
            continue;
        }
        if in_gap {
            out.push('-');
            in_gap = false;
        }
        out.push(c.to_ascii_uppercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let shape = CodeShape::default();
        let token = generate_token(&shape);
        assert_eq!(token.len(), 15); // 4 groups of 3 plus 3 dashes
        let groups: Vec<&str> = token.split('-').collect();
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.len() == 3));
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_characters() {
        for banned in ['I', 'O', '0', '1'] {
            assert!(!CODE_ALPHABET.contains(&(banned as u8)));
        }

        let shape = CodeShape::default();
        for _ in 0..50 {
            let token = generate_token(&shape);
            assert!(token
                .chars()
                .filter(|c| *c != '-')
                .all(|c| CODE_ALPHABET.contains(&(c as u8))));
        }
    }

    #[test]
    fn test_tokens_vary() {
        let shape = CodeShape::default();
        let a = generate_token(&shape);
        let b = generate_token(&shape);
        // astronomically unlikely to collide
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(normalize("  abc-def-ghj-klm  "), "ABC-DEF-GHJ-KLM");
    }

    #[test]
    fn test_normalize_collapses_whitespace_to_dashes() {
        assert_eq!(normalize("ABC DEF  GHJ\tKLM"), "ABC-DEF-GHJ-KLM");
    }

    #[test]
    fn test_normalize_keeps_existing_dashes() {
        assert_eq!(normalize("abc-def"), "ABC-DEF");
    }
}
