use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const LIGATURES: [(&str, &str); 5] = [
    ("\u{FB00}", "ff"),
    ("\u{FB01}", "fi"),
    ("\u{FB02}", "fl"),
    ("\u{FB03}", "ffi"),
    ("\u{FB04}", "ffl"),
];

/// Normalize an accumulated question or option string.
///
/// Applies Unicode NFC normalization, expands the common Latin ligatures,
/// removes the replacement character, collapses every whitespace run to a
/// single space, and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    let mut result: String = text.nfc().collect();

    for (lig, replacement) in &LIGATURES {
        result = result.replace(lig, replacement);
    }

    result = result.replace('\u{FFFD}', "");

    static RE_WS: OnceLock<Regex> = OnceLock::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&result, " ").trim().to_string()
}

/// Append `fragment` to `buf`, separated by a single space.
pub fn join_with_space(buf: &mut String, fragment: &str) {
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(fragment);
}
