use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const LOGO_DIR: &str = "assets/img/logo/";
pub const LOGO_EXT: &str = ".png";

/// Lowercase ASCII slug: accents are folded, every other run of
/// non-alphanumeric characters becomes a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.nfkd().filter(|ch| !is_combining_mark(*ch)) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn logo_path(slug: &str) -> String {
    format!("{LOGO_DIR}{slug}{LOGO_EXT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_joins_words() {
        assert_eq!(slugify("My Soft"), "my-soft");
        assert_eq!(slugify("  Libre   Office!! "), "libre-office");
        assert_eq!(slugify("C++ / Rust"), "c-rust");
    }

    #[test]
    fn slugify_folds_accents() {
        assert_eq!(slugify("Évolution Café"), "evolution-cafe");
        assert_eq!(slugify("Ångström"), "angstrom");
    }

    #[test]
    fn slugify_handles_empty_input() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn logo_path_uses_slug() {
        assert_eq!(logo_path(&slugify("My Soft")), "assets/img/logo/my-soft.png");
    }
}
