//! File names from user-entered titles

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::ExportError;

/// Lowercase, accents stripped, runs of anything else collapsed to one hyphen
///
/// Returns None when nothing usable is left.
pub fn slugify(title: &str) -> Option<String> {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    (!slug.is_empty()).then_some(slug)
}

/// `<slug>.json` for a scene title
pub fn export_file_name(title: &str) -> Result<String, ExportError> {
    slugify(title)
        .map(|slug| format!("{slug}.json"))
        .ok_or(ExportError::EmptyTitle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_strips_accents_and_punctuation() {
        assert_eq!(slugify("Héllo World!!").as_deref(), Some("hello-world"));
        assert_eq!(slugify("  --Crème  Brûlée--  ").as_deref(), Some("creme-brulee"));
        assert_eq!(slugify("Track #2: Ñandú").as_deref(), Some("track-2-nandu"));
    }

    #[test]
    fn test_slugify_rejects_empty() {
        assert_eq!(slugify("   "), None);
        assert_eq!(slugify("!!!"), None);
        assert_eq!(slugify(""), None);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("My Run").unwrap(), "my-run.json");
        assert!(matches!(export_file_name("  "), Err(ExportError::EmptyTitle)));
    }

    proptest! {
        #[test]
        fn test_slug_shape(title in "\\PC{0,40}") {
            if let Some(slug) = slugify(&title) {
                prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
                prop_assert!(!slug.contains("--"));
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                // Already a slug
                prop_assert_eq!(slugify(&slug), Some(slug.clone()));
            }
        }
    }
}
