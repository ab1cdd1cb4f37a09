use once_cell::sync::Lazy;
use regex::Regex;

static EDGE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s\p{P}]+|[\s\p{P}]+$").expect("valid edge-noise pattern"));

/// Derives the cache and lookup key for a selected token.
///
/// Leading and trailing Unicode whitespace and punctuation are stripped and the
/// remainder is lowercased. Interior characters are left alone, so hyphenated
/// or apostrophised forms keep their shape. An empty result means "no lookup".
pub fn normalize(raw: &str) -> String {
    EDGE_NOISE.replace_all(raw, "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whitespace_and_punctuation_then_lowercases() {
        assert_eq!(normalize("  Kurinji!  "), "kurinji");
        assert_eq!(normalize("«Mullai»,"), "mullai");
        assert_eq!(normalize("\t(neithal)\n"), "neithal");
    }

    #[test]
    fn punctuation_only_is_empty() {
        assert_eq!(normalize("—"), "");
        assert_eq!(normalize(" ... "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn interior_punctuation_survives() {
        assert_eq!(normalize("Marutham-Palai."), "marutham-palai");
    }

    #[test]
    fn tamil_script_keeps_vowel_signs() {
        assert_eq!(normalize("“குறிஞ்சி”"), "குறிஞ்சி");
        assert_eq!(normalize("முல்லை।"), "முல்லை");
    }
}
