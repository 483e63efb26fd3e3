use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static NATURAL_LOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bln\b").expect("natural log pattern is valid"));

static SUBSCRIPT_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"x_\{\s*(\d+)\s*\}|x_(\d+)").expect("subscript pattern is valid")
});

// Numbers are consumed first so an exponent is never read as a name, while
// a name glued to a number (`2y1`) is still captured.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?|([A-Za-z_][A-Za-z0-9_]*)")
        .expect("identifier pattern is valid")
});

/// Canonical form fed to the allowlist check and the parser. Idempotent.
pub fn normalize(expr: &str) -> String {
    let ascii: String = expr
        .trim()
        .chars()
        .map(|c| match c {
            '\u{2217}' | '\u{22C5}' | '\u{00D7}' | '\u{00B7}' => '*',
            '\u{2212}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();

    let logs = NATURAL_LOG.replace_all(&ascii, "log");
    let variables = SUBSCRIPT_VARIABLE.replace_all(&logs, "x${1}${2}");
    variables.replace('^', "**")
}

/// Every identifier-like token, sorted and deduplicated. The exponent of a
/// number (the `e5` in `1e5`) is not an identifier; a name written straight
/// after a number (the `y1` in `2y1`) is.
pub fn extract_identifiers(normalized: &str) -> BTreeSet<String> {
    IDENTIFIER
        .captures_iter(normalized)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_glyphs_and_notation() {
        assert_eq!(normalize("  x_1 × x_{2} − ln(x1) "), "x1 * x2 - log(x1)");
        assert_eq!(normalize("x1^2 + x_{ 3 }^2"), "x1**2 + x3**2");
        assert_eq!(normalize("2⋅x1 — 1"), "2*x1 - 1");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("ln(x_1)^2 × sin(x_{2})");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_ln_only_as_whole_word() {
        assert_eq!(normalize("lnx + ln(x1)"), "lnx + log(x1)");
    }

    #[test]
    fn test_extract_identifiers() {
        let ids = extract_identifiers("sin(x1) + 1e5 * y1 - x1");
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["sin", "x1", "y1"]);
    }

    #[test]
    fn test_identifiers_after_numbers() {
        let ids = extract_identifiers("2y1 + 3.5e2x2 + 1e + .5z");
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["e", "x2", "y1", "z"]);
    }
}
