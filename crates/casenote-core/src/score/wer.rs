//! Word error rate over lowercase word tokens.

/// Split into lowercase word tokens: maximal runs of ASCII alphanumerics
/// and apostrophes.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '\'' {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Word error rate: token-level edit distance divided by the reference
/// length. An empty reference scores 0.0 against an empty hypothesis and
/// 1.0 against anything else.
pub fn wer(reference: &str, hypothesis: &str) -> f64 {
    let r = tokenize(reference);
    let h = tokenize(hypothesis);

    if r.is_empty() {
        return if h.is_empty() { 0.0 } else { 1.0 };
    }

    // Levenshtein over tokens, one rolling row.
    let mut prev: Vec<usize> = (0..=h.len()).collect();
    let mut curr = vec![0usize; h.len() + 1];

    for (i, r_tok) in r.iter().enumerate() {
        curr[0] = i + 1;
        for (j, h_tok) in h.iter().enumerate() {
            let cost = usize::from(r_tok != h_tok);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[h.len()] as f64 / r.len() as f64
}
