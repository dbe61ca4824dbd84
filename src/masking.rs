//! Reversible masking of sensitive literals.
//!
//! Every sensitive value is replaced by an opaque token derived from a hash of
//! the value, so the same object produces the same token (and therefore the
//! same cache key) on every run without revealing the value itself.
//!
//! Substitution is a single leftmost-longest pass, so a value that is a prefix
//! of another never splits it and inserted tokens are never rescanned.
//!
//! ```text
//! "Ingress uses the service shop/cart which does not exist."
//!        │ mask
//!        ▼
//! "Ingress uses the service 7QK2M0ZC1XAB/R4D9LW0P2HVE which does not exist."
//! ```

use crate::analyzer::types::Sensitive;
use crate::error::MaskingError;
use aho_corasick::{AhoCorasick, MatchKind};

/// Length of a mask token.
pub const TOKEN_LEN: usize = 12;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_ATTEMPTS: u32 = 16;

/// Deterministic mask token for `value`.
pub fn mask_token(value: &str) -> String {
    derive_token(value, 0)
}

fn derive_token(value: &str, salt: u32) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&salt.to_le_bytes());
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();

    digest
        .as_bytes()
        .iter()
        .take(TOKEN_LEN)
        .map(|b| TOKEN_ALPHABET[*b as usize % TOKEN_ALPHABET.len()] as char)
        .collect()
}

/// Replace every `unmasked` value in `text` with its `masked` token.
pub fn mask(text: &str, pairs: &[Sensitive]) -> String {
    substitute(
        text,
        pairs
            .iter()
            .map(|p| (p.unmasked.as_str(), p.masked.as_str())),
    )
}

/// Exact inverse of [`mask`].
pub fn unmask(text: &str, pairs: &[Sensitive]) -> String {
    substitute(
        text,
        pairs
            .iter()
            .map(|p| (p.masked.as_str(), p.unmasked.as_str())),
    )
}

fn substitute<'a>(text: &str, mapping: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut patterns: Vec<&str> = Vec::new();
    let mut replacements: Vec<&str> = Vec::new();
    for (from, to) in mapping {
        // First pair wins for a repeated value
        if from.is_empty() || patterns.contains(&from) {
            continue;
        }
        patterns.push(from);
        replacements.push(to);
    }

    if patterns.is_empty() {
        return text.to_string();
    }

    match AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(&patterns)
    {
        Ok(ac) => ac.replace_all(text, &replacements),
        Err(e) => {
            log::warn!("Falling back to sequential substitution: {}", e);
            let mut order: Vec<usize> = (0..patterns.len()).collect();
            order.sort_by_key(|&i| std::cmp::Reverse(patterns[i].len()));
            order.into_iter().fold(text.to_string(), |acc, i| {
                acc.replace(patterns[i], replacements[i])
            })
        }
    }
}

/// The substitution table used for one prompt.
///
/// Built from the sensitive pairs of every failure in a result: values are
/// deduplicated, and tokens are re-derived with a salt whenever they would be
/// ambiguous against the text being masked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskTable {
    pairs: Vec<Sensitive>,
}

impl MaskTable {
    /// Resolve a sound table for masking `corpus`.
    pub fn resolve<'a>(
        pairs: impl IntoIterator<Item = &'a Sensitive>,
        corpus: &str,
    ) -> Result<Self, MaskingError> {
        let mut unique: Vec<&Sensitive> = Vec::new();
        for pair in pairs {
            if pair.unmasked.is_empty() || unique.iter().any(|u| u.unmasked == pair.unmasked) {
                continue;
            }
            unique.push(pair);
        }

        for attempt in 0..MAX_ATTEMPTS {
            let candidate: Vec<Sensitive> = unique
                .iter()
                .map(|p| Sensitive {
                    unmasked: p.unmasked.clone(),
                    masked: if attempt == 0 && !p.masked.is_empty() {
                        p.masked.clone()
                    } else {
                        derive_token(&p.unmasked, attempt)
                    },
                })
                .collect();

            if is_sound(&candidate, corpus) {
                return Ok(Self { pairs: candidate });
            }
            log::debug!("Mask tokens ambiguous on attempt {}, re-deriving", attempt);
        }

        Err(MaskingError::Ambiguous(MAX_ATTEMPTS))
    }

    /// The resolved pairs.
    pub fn pairs(&self) -> &[Sensitive] {
        &self.pairs
    }

    pub fn mask(&self, text: &str) -> String {
        mask(text, &self.pairs)
    }

    pub fn unmask(&self, text: &str) -> String {
        unmask(text, &self.pairs)
    }

    /// Fails if `masked` still contains any sensitive value.
    pub fn check_complete(&self, masked: &str) -> Result<(), MaskingError> {
        if self.pairs.iter().any(|p| masked.contains(&p.unmasked)) {
            return Err(MaskingError::Incomplete);
        }
        Ok(())
    }
}

fn is_sound(pairs: &[Sensitive], corpus: &str) -> bool {
    for (i, pair) in pairs.iter().enumerate() {
        if pair.masked.is_empty() || corpus.contains(&pair.masked) {
            return false;
        }
        if pairs[..i].iter().any(|other| other.masked == pair.masked) {
            return false;
        }
        if pairs.iter().any(|other| pair.masked.contains(&other.unmasked)) {
            return false;
        }
    }

    let masked = mask(corpus, pairs);
    !pairs.iter().any(|p| masked.contains(&p.unmasked)) && unmask(&masked, pairs) == corpus
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pairs(values: &[&str]) -> Vec<Sensitive> {
        values.iter().map(|v| Sensitive::new(*v)).collect()
    }

    #[test]
    fn tokens_are_deterministic_and_opaque() {
        let a = mask_token("payments");
        assert_eq!(a, mask_token("payments"));
        assert_eq!(a.len(), TOKEN_LEN);
        assert_ne!(a, "payments");
        assert_ne!(a, mask_token("payment"));
    }

    #[test]
    fn masks_every_occurrence() {
        let p = pairs(&["shop", "cart"]);
        let text = "Ingress uses the service shop/cart in shop which does not exist.";
        let masked = mask(text, &p);
        assert!(!masked.contains("shop"));
        assert!(!masked.contains("cart"));
        assert_eq!(masked.matches(&p[0].masked).count(), 2);
        assert_eq!(unmask(&masked, &p), text);
    }

    #[test]
    fn longer_value_wins_over_its_prefix() {
        let p = pairs(&["default", "default-backend"]);
        let text = "Ingress uses the service default/default-backend which does not exist.";
        let masked = mask(text, &p);
        assert!(masked.contains(&p[1].masked));
        assert_eq!(unmask(&masked, &p), text);
    }

    #[test]
    fn table_deduplicates_values_across_failures() {
        let shared = pairs(&["prod", "api", "prod"]);
        let table = MaskTable::resolve(&shared, "prod/api and prod").unwrap();
        assert_eq!(table.pairs().len(), 2);
    }

    #[test]
    fn table_rederives_token_already_in_corpus() {
        let pair = Sensitive::new("web");
        let corpus = format!("web collides with {}", pair.masked);
        let table = MaskTable::resolve([&pair], &corpus).unwrap();

        assert_ne!(table.pairs()[0].masked, pair.masked);
        let masked = table.mask(&corpus);
        table.check_complete(&masked).unwrap();
        assert_eq!(table.unmask(&masked), corpus);
    }

    #[test]
    fn corpus_containing_every_salted_token_is_ambiguous() {
        let value = Sensitive {
            unmasked: "x".to_string(),
            masked: String::new(),
        };
        let tokens: Vec<String> = (0..MAX_ATTEMPTS).map(|s| derive_token("x", s)).collect();
        let corpus = format!("x {}", tokens.join(" "));
        assert_eq!(
            MaskTable::resolve([&value], &corpus),
            Err(MaskingError::Ambiguous(MAX_ATTEMPTS))
        );
    }

    proptest! {
        #[test]
        fn round_trip_restores_text(
            values in prop::collection::vec("[a-z][a-z0-9-]{3,12}", 1..5),
            filler in prop::collection::vec("[ a-z./,:]{0,20}", 1..6),
        ) {
            let p: Vec<Sensitive> = values.iter().map(|v| Sensitive::new(v.as_str())).collect();
            let mut text = String::new();
            for (i, chunk) in filler.iter().enumerate() {
                text.push_str(chunk);
                text.push_str(&values[i % values.len()]);
            }

            let masked = mask(&text, &p);
            prop_assert_eq!(unmask(&masked, &p), text);
        }

        #[test]
        fn masked_text_contains_no_sensitive_value(
            values in prop::collection::vec("[a-z]{4,12}", 1..5),
            filler in "[ a-z./]{0,40}",
        ) {
            let p: Vec<Sensitive> = values.iter().map(|v| Sensitive::new(v.as_str())).collect();
            let text = format!("{} {} {}", values.join("/"), filler, values.join(" "));

            let masked = mask(&text, &p);
            for value in &values {
                prop_assert!(!masked.contains(value.as_str()));
            }
        }
    }
}
