//! User-facing issue lists collected from concurrent sub-tasks.

use std::collections::HashSet;

/// Merge issue messages into a single display list.
///
/// Empty strings are dropped and duplicates collapse onto their first
/// occurrence, so the result keeps first-seen order.
///
/// `Option<String>` items can be flattened in by the caller:
///
/// ```rust
/// # use mien_pipeline::merge_issues;
/// let front: Option<&str> = Some("Front photo: face not found");
/// let side: Option<&str> = None;
/// let merged = merge_issues(front.into_iter().chain(side).chain(["", "Front photo: face not found"]));
/// assert_eq!(merged, vec!["Front photo: face not found".to_owned()]);
/// ```
#[must_use]
pub fn merge_issues<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for item in items {
        let item = item.as_ref();
        if item.is_empty() || !seen.insert(item.to_owned()) {
            continue;
        }
        merged.push(item.to_owned());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_seen_order() {
        let merged = merge_issues(["b", "a", "b", "c", "a"]);
        assert_eq!(merged, vec!["b", "a", "c"]);
    }

    #[test]
    fn drops_empty_strings() {
        let merged = merge_issues(["", "x", ""]);
        assert_eq!(merged, vec!["x"]);
    }

    #[test]
    fn flattens_optional_messages() {
        let items = [
            None,
            Some("timeout".to_owned()),
            Some(String::new()),
            Some("timeout".to_owned()),
        ];
        let merged = merge_issues(items.iter().flatten());
        assert_eq!(merged, vec!["timeout"]);
    }

    #[test]
    fn empty_input_yields_empty_list() {
        assert!(merge_issues(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn whitespace_is_not_dropped() {
        assert_eq!(merge_issues([" "]), vec![" "]);
    }
}
