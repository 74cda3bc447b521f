//! Tokenization shared by the model-backed classifiers.

/// Split text into word tokens of two or more characters.
///
/// Equivalent to the `\b\w\w+\b` token pattern the bundled artifacts were
/// exported with.
pub(crate) fn tokenize(text: &str, lowercase: bool) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(|t| {
            if lowercase {
                t.to_lowercase()
            } else {
                t.to_string()
            }
        })
        .collect()
}

/// Build space-joined n-grams for every n in `min..=max`.
pub(crate) fn ngrams(tokens: &[String], min: usize, max: usize) -> Vec<String> {
    let min = min.max(1);
    let mut out = Vec::new();
    for n in min..=max {
        if n > tokens.len() {
            break;
        }
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}
