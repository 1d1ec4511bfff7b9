//! Text normalisation and alphabetic tokenisation shared by the build and inference paths.

/// Literal escape sequences rewritten to real control characters, longest first.
const ESCAPE_REWRITES: [(&str, &str); 4] = [
    ("\\r\\n", "\n"),
    ("\\n", "\n"),
    ("\\r", "\n"),
    ("\\t", "\t"),
];

/// Decodes raw bytes as UTF-8, falling back to Latin-1 when the payload is not valid UTF-8.
///
/// Every byte maps to the code point of the same value under the fallback, so decoding never
/// fails and never drops input.
#[must_use]
pub fn decode_lossless(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => latin1_to_string(bytes),
    }
}

/// Interprets each byte as a Latin-1 code point.
#[must_use]
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Produces the canonical lowercase text used for tokenisation.
///
/// Literal `\r\n`, `\n`, `\r` and `\t` escapes become real newlines and tabs, carriage returns
/// become newlines, and the result is lowercased.
#[must_use]
pub fn normalize(bytes: &[u8]) -> String {
    let mut text = decode_lossless(bytes);
    for (escape, replacement) in ESCAPE_REWRITES {
        if text.contains(escape) {
            text = text.replace(escape, replacement);
        }
    }
    if text.contains('\r') {
        text = text.replace("\r\n", "\n").replace('\r', "\n");
    }
    text.to_lowercase()
}

/// Splits normalised text on every run of non-alphabetic characters.
///
/// Order and duplicates are preserved; empty pieces are never returned.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Convenience wrapper running [`normalize`] followed by [`tokenize`].
#[must_use]
pub fn normalize_and_tokenize(bytes: &[u8]) -> Vec<String> {
    tokenize(&normalize(bytes))
}
