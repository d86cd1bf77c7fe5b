use once_cell::sync::Lazy;
use regex::Regex;

pub const TAG_SEPARATOR: char = '#';

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[+-]?[0-9]+\s*$").unwrap());

/// Result of reading a boolean cell. Anything that is neither `oui`, `non`
/// nor empty comes back untouched so the caller can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolCell {
    Value(bool),
    Unset,
    Other(String),
}

impl BoolCell {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoolCell::Value(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, BoolCell::Other(_))
    }
}

pub fn to_boolean(raw: &str) -> BoolCell {
    match raw.to_lowercase().as_str() {
        "oui" => BoolCell::Value(true),
        "non" => BoolCell::Value(false),
        "" => BoolCell::Unset,
        _ => BoolCell::Other(raw.to_string()),
    }
}

/// Numeric coercion on the leading digits of the cell: `"12abc"` is 12,
/// `"abc"` is 0. Out-of-range values saturate.
pub fn to_integer(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let mut chars = trimmed.chars().peekable();
    let negative = match chars.peek() {
        Some('-') => {
            chars.next();
            true
        }
        Some('+') => {
            chars.next();
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    for ch in chars {
        let Some(digit) = ch.to_digit(10) else {
            break;
        };
        value = value.saturating_mul(10).saturating_add(digit as i64);
    }
    if negative {
        -value
    } else {
        value
    }
}

pub fn is_integer(raw: &str) -> bool {
    INTEGER_RE.is_match(raw)
}

/// Splits a tag cell on `#`, dropping blanks and repeated tokens while
/// keeping first-seen order.
pub fn split_tags(raw: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = Vec::new();
    for token in raw.split(TAG_SEPARATOR) {
        let token = token.trim();
        if token.is_empty() || tokens.contains(&token) {
            continue;
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_cells_are_case_insensitive() {
        assert_eq!(to_boolean("OUI"), BoolCell::Value(true));
        assert_eq!(to_boolean("Oui"), BoolCell::Value(true));
        assert_eq!(to_boolean("non"), BoolCell::Value(false));
        assert_eq!(to_boolean("NON"), BoolCell::Value(false));
        assert_eq!(to_boolean(""), BoolCell::Unset);
    }

    #[test]
    fn unknown_boolean_is_returned_unchanged() {
        assert_eq!(to_boolean("x"), BoolCell::Other("x".to_string()));
        assert_eq!(to_boolean("True"), BoolCell::Other("True".to_string()));
        assert!(!to_boolean("yes").is_valid());
        assert!(to_boolean("").is_valid());
    }

    #[test]
    fn integer_coercion_reads_leading_digits() {
        assert_eq!(to_integer("42"), 42);
        assert_eq!(to_integer(" -7"), -7);
        assert_eq!(to_integer("+3"), 3);
        assert_eq!(to_integer("12abc"), 12);
        assert_eq!(to_integer("abc"), 0);
        assert_eq!(to_integer(""), 0);
        assert_eq!(to_integer("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn integer_check_rejects_partial_numbers() {
        assert!(is_integer("2017"));
        assert!(is_integer(" -1 "));
        assert!(!is_integer("12abc"));
        assert!(!is_integer("1.5"));
        assert!(!is_integer(""));
    }

    #[test]
    fn tag_tokens_are_set_like() {
        assert_eq!(split_tags("A#B#A"), vec!["A", "B"]);
        assert_eq!(split_tags(" Cloud # #Security#"), vec!["Cloud", "Security"]);
        assert!(split_tags("").is_empty());
    }
}
