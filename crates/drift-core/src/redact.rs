use regex::Regex;
use std::sync::OnceLock;

fn patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // user:password@ in URLs (clone URLs after substitution)
            (r"([a-zA-Z][a-zA-Z0-9+.\-]*://)[^/@\s]+@", "${1}[MASKED]@"),
            // API keys
            (r"sk-[a-zA-Z0-9]{20,}", "[MASKED]"),
            (r"gh[pousr]_[a-zA-Z0-9]{20,}", "[MASKED]"),
            // Bearer tokens
            (r"Bearer\s+[a-zA-Z0-9._\-]+", "Bearer [MASKED]"),
            // key=value patterns
            (
                r"(?i)(password|secret|token|key|api_key|apikey)=[^\s&]+",
                "${1}=[MASKED]",
            ),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Mask credentials in text before it reaches logs or error messages.
pub fn mask_secrets(text: &str) -> String {
    let mut result = text.to_string();
    for (re, replacement) in patterns() {
        result = re.replace_all(&result, *replacement).into_owned();
    }
    result
}
