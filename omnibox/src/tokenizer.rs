//! Word tokenizer shared by indexing and live input.
//!
//! Tokens are maximal runs of alphanumeric characters, lowercased. Everything
//! else (whitespace, `://`, `.`, `/`, `?`) is a separator, so
//! `https://www.GitHub.com/foo-bar` yields `https www github com foo bar`.

/// Split `text` into lowercase word tokens, in left-to-right order.
pub fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_alphanumeric() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_alphanumeric() {
            i += 1;
        }
        let token: String = chars[start..i].iter().flat_map(|c| c.to_lowercase()).collect();
        tokens.push(token);
    }
    tokens
}

/// Tokenize and drop repeated tokens, keeping first occurrences in order.
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
