//! Small string helpers shared by the abbreviator and the name parser.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Strip diacritics: decompose, drop combining marks, recompose.
///
/// `"Muséum"` becomes `"Museum"`, `"Års"` becomes `"Ars"`. Characters without
/// an ASCII base (e.g. `"ß"`) are kept as they are.
pub fn to_ascii(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Split `s` on any of the characters in `seps`, dropping empty fields.
pub fn split_any<'a>(s: &'a str, seps: &str) -> Vec<&'a str> {
    s.split(|c: char| seps.contains(c))
        .filter(|f| !f.is_empty())
        .collect()
}

/// Trim leading and trailing characters that are neither letters, digits nor `&`.
pub fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !(c.is_alphanumeric() || c == '&'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(to_ascii("Muséum"), "Museum");
        assert_eq!(to_ascii("Års-berättelse"), "Ars-berattelse");
        assert_eq!(to_ascii("plain"), "plain");
    }

    #[test]
    fn splits_on_any_separator() {
        assert_eq!(
            split_any("Zool.-Botan. d'histoire", " .-'"),
            vec!["Zool", "Botan", "d", "histoire"]
        );
        assert!(split_any("...", " .").is_empty());
    }

    #[test]
    fn cleans_punctuation() {
        assert_eq!(clean_token("Skalitzky,"), "Skalitzky");
        assert_eq!(clean_token("(1884)"), "1884");
        assert_eq!(clean_token("&"), "&");
        assert_eq!(clean_token("(4):"), "4");
    }
}
