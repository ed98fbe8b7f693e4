//! Tokenization shared by the lexical index and the hashing embedder.
//!
//! Lowercases, folds Latin diacritics (`á` → `a`, `ñ` → `n`), splits on
//! anything that is not alphanumeric, and drops Spanish and English stop
//! words. No stemming is applied.

/// Spanish and English function words ignored when scoring.
const STOP_WORDS: &[&str] = &[
    // Spanish
    "a", "al", "algo", "ante", "asi", "como", "con", "cual", "cuales", "cuando", "de", "del",
    "desde", "donde", "el", "ella", "ellos", "en", "entre", "es", "esa", "ese", "eso", "esta",
    "este", "esto", "fue", "ha", "hay", "la", "las", "le", "les", "lo", "los", "mas", "me", "mi",
    "muy", "no", "nos", "o", "para", "pero", "por", "porque", "que", "quien", "se", "ser", "si",
    "sin", "sobre", "son", "su", "sus", "tambien", "te", "tu", "un", "una", "uno", "unos", "unas",
    "y", "ya", "yo",
    // English
    "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in", "is",
    "it", "its", "of", "on", "or", "the", "this", "that", "to", "was", "what", "which", "with",
];

/// Split `text` into normalized, stop-word-free terms.
pub fn tokenize(text: &str) -> Vec<String> {
    fold_case(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Lowercase and strip Latin diacritics.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).map(fold).collect()
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
