//! Small text helpers shared by error messages and relation inference.

/// Join items as an English list: "a", "a and b", "a, b and c".
///
/// An empty iterator renders as "<none>" so error messages stay readable.
pub fn and_<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: std::fmt::Display,
{
    let items: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    match items.len() {
        0 => "<none>".to_string(),
        1 => items.into_iter().next().unwrap(),
        _ => {
            let (last, rest) = items.split_last().unwrap();
            format!("{} and {}", rest.join(", "), last)
        }
    }
}

/// Compute the plural form of a table name.
///
/// Covers the forms back-reference inference relies on: sibilant endings
/// get "es", consonant-"y" becomes "ies", everything else appends "s".
pub fn plural(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.is_empty() && !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{word}s")
}
