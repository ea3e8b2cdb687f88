//! Cleaning of column labels and of individual cell values.
//!
//! All the functions here are total: malformed input degrades to a no-value
//! or to a best-effort cleaned string, never to an error.

use regex::Regex;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn non_word_re() -> &'static Regex {
    static NON_WORD_RE: OnceLock<Regex> = OnceLock::new();
    NON_WORD_RE.get_or_init(|| Regex::new(r"[^a-z0-9_]").expect("valid non-word regex"))
}

fn underscores_re() -> &'static Regex {
    static UNDERSCORES_RE: OnceLock<Regex> = OnceLock::new();
    UNDERSCORES_RE.get_or_init(|| Regex::new(r"_+").expect("valid underscores regex"))
}

/// Turns a raw column label into a token of lowercase ascii word characters.
///
/// Runs of whitespace become one underscore, everything outside `[a-z0-9_]` is
/// dropped, runs of underscores are collapsed and the result is trimmed of
/// underscores. If nothing is left, the original label is returned unchanged.
///
/// ```
/// use applicant_merge::normalize_header;
///
/// assert_eq!(normalize_header("Identity Number :"), "identity_number");
/// assert_eq!(normalize_header("City/Town"), "citytown");
/// ```
pub fn normalize_header(label: &str) -> String {
    let lowered = label.to_lowercase();
    let spaced = whitespace_re().replace_all(&lowered, "_");
    let stripped = non_word_re().replace_all(&spaced, "");
    let collapsed = underscores_re().replace_all(&stripped, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        label.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Trims and title-cases free text. Blank text is a no-value.
///
/// A letter is upper-cased when it starts a word (the previous character is
/// not a letter) and lower-cased otherwise, so `" o'NEIL "` becomes `"O'Neil"`.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut res = String::with_capacity(trimmed.len());
    let mut prev_cased = false;
    for c in trimmed.chars() {
        if c.is_alphabetic() {
            if prev_cased {
                res.extend(c.to_lowercase());
            } else {
                // Only the first letter of a multi-letter uppercase stays upper ("ß" gives "Ss").
                let mut upper = c.to_uppercase();
                if let Some(first) = upper.next() {
                    res.push(first);
                }
                for rest in upper {
                    res.extend(rest.to_lowercase());
                }
            }
            prev_cased = true;
        } else {
            res.push(c);
            prev_cased = false;
        }
    }
    Some(res)
}

/// Keeps the digits of a phone number, and a leading `+`.
///
/// ```
/// use applicant_merge::normalize_phone;
///
/// assert_eq!(normalize_phone(Some("+27 82 123 4567")), Some("+27821234567".to_string()));
/// assert_eq!(normalize_phone(Some("")), None);
/// ```
pub fn normalize_phone(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut res = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        res.push('+');
    }
    res.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    if res.is_empty() || res == "+" {
        None
    } else {
        Some(res)
    }
}

/// Removes all the whitespace from identifiers (identity numbers, postal codes,
/// tax numbers). Other characters are kept as they are.
pub fn normalize_id_like(value: Option<&str>) -> Option<String> {
    let res: String = value?.chars().filter(|c| !c.is_whitespace()).collect();
    if res.is_empty() {
        None
    } else {
        Some(res)
    }
}
