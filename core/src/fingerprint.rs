// Cache key generation. The composite string and hash algorithm are part of
// the public contract: any change here invalidates every existing cache row.

use md5::{Digest, Md5};

/// Derive the 32-hex-character cache key for a translation request.
///
/// Leading/trailing whitespace of `text` is stripped; internal whitespace,
/// HTML tags, and template placeholders (`{name}`, `%s`, `{0}`) are preserved
/// verbatim. Language codes are lowercased and trimmed, but — unlike
/// [`normalize_language_code`] — underscores are *not* converted to hyphens:
/// `EN` and `en` collide, `zh_TW` and `zh-TW` do not. `format` defaults to
/// `"plain"` when absent.
pub fn generate_cache_key(text: &str, source_lang: &str, target_lang: &str, format: Option<&str>) -> String {
    let normalized_text = text.trim();
    let normalized_source = source_lang.to_lowercase();
    let normalized_source = normalized_source.trim();
    let normalized_target = target_lang.to_lowercase();
    let normalized_target = normalized_target.trim();
    let normalized_format = format.unwrap_or("plain").to_lowercase();
    let normalized_format = normalized_format.trim();

    let composite = format!(
        "{}|{}|{}|{}",
        normalized_source, normalized_target, normalized_format, normalized_text
    );

    let mut hasher = Md5::new();
    hasher.update(composite.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Lowercase, trim, and convert underscores to hyphens (`zh_TW` -> `zh-tw`).
///
/// Used for display and for backends that expect canonical BCP-47-ish form.
/// Deliberately *not* used inside [`generate_cache_key`] — the two functions'
/// divergence is part of the documented cache-key contract, not a bug.
pub fn normalize_language_code(lang: &str) -> String {
    lang.trim().to_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_key_generation_is_deterministic() {
        let key1 = generate_cache_key("Hello", "en", "zh-tw", None);
        let key2 = generate_cache_key("Hello", "en", "zh-tw", None);
        assert_eq!(key1, key2);
        assert_eq!(key1.len(), 32);
    }

    #[test]
    fn different_text_different_key() {
        let key1 = generate_cache_key("Hello", "en", "zh-tw", None);
        let key2 = generate_cache_key("World", "en", "zh-tw", None);
        assert_ne!(key1, key2);
    }

    #[test]
    fn different_languages_different_key() {
        let key1 = generate_cache_key("Hello", "en", "zh-tw", None);
        let key2 = generate_cache_key("Hello", "en", "ja", None);
        let key3 = generate_cache_key("Hello", "de", "zh-tw", None);
        assert_ne!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn leading_trailing_whitespace_is_stripped() {
        let key1 = generate_cache_key("Hello", "en", "zh-tw", None);
        let key2 = generate_cache_key("  Hello  ", "en", "zh-tw", None);
        assert_eq!(key1, key2);
    }

    #[test]
    fn internal_whitespace_is_preserved() {
        let key1 = generate_cache_key("Hello World", "en", "zh-tw", None);
        let key2 = generate_cache_key("HelloWorld", "en", "zh-tw", None);
        assert_ne!(key1, key2);
    }

    #[test]
    fn language_codes_are_case_insensitive() {
        let key1 = generate_cache_key("Hello", "EN", "ZH-TW", None);
        let key2 = generate_cache_key("Hello", "en", "zh-tw", None);
        assert_eq!(key1, key2);
    }

    #[test]
    fn format_affects_key() {
        let key1 = generate_cache_key("Hello", "en", "zh-tw", Some("plain"));
        let key2 = generate_cache_key("Hello", "en", "zh-tw", Some("html"));
        assert_ne!(key1, key2);
    }

    #[test]
    fn missing_format_defaults_to_plain() {
        let key1 = generate_cache_key("Hello", "en", "zh-tw", None);
        let key2 = generate_cache_key("Hello", "en", "zh-tw", Some("plain"));
        assert_eq!(key1, key2);
    }

    #[test]
    fn html_tags_and_variables_are_preserved_in_key() {
        let key1 = generate_cache_key("<b>Hello</b>", "en", "zh-tw", None);
        let key2 = generate_cache_key("Hello", "en", "zh-tw", None);
        assert_ne!(key1, key2);

        let key3 = generate_cache_key("Hello {name}", "en", "zh-tw", None);
        let key4 = generate_cache_key("Hello name", "en", "zh-tw", None);
        assert_ne!(key3, key4);
    }

    #[test]
    fn normalize_lowercases() {
        assert_eq!(normalize_language_code("EN"), "en");
        assert_eq!(normalize_language_code("ZH-TW"), "zh-tw");
    }

    #[test]
    fn normalize_converts_underscore_to_hyphen() {
        assert_eq!(normalize_language_code("zh_TW"), "zh-tw");
        assert_eq!(normalize_language_code("pt_BR"), "pt-br");
    }

    #[test]
    fn normalize_strips_whitespace() {
        assert_eq!(normalize_language_code("  en  "), "en");
    }

    #[test]
    fn fingerprint_does_not_apply_underscore_normalization() {
        // Documented asymmetry: fingerprint lowercases+trims only.
        let underscored = generate_cache_key("Hello", "zh_TW", "en", None);
        let hyphenated = generate_cache_key("Hello", "zh-TW", "en", None);
        assert_ne!(underscored, hyphenated);
    }
}
