use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::constants::DEFAULT_VALUE;
use crate::store::{VariableStore, format_value};
use crate::transcript::Entry;

static RETRIEVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*get\s+([A-Za-z0-9_]+)\s*\}\}").unwrap());

/// Replace every `{{get name}}` in `text` with the variable's current value,
/// or the default when it was never set.
///
/// Returns `None` when `text` holds no retrieval directive, otherwise the
/// rewritten text and the number of replacements.
pub fn substitute_text(text: &str, store: &VariableStore) -> Option<(String, usize)> {
    let mut count = 0;
    let replaced = RETRIEVAL.replace_all(text, |caps: &Captures| {
        count += 1;
        format_value(store.value(&caps[1]).unwrap_or(DEFAULT_VALUE))
    });
    if count == 0 {
        return None;
    }
    Some((replaced.into_owned(), count))
}

/// Substitute retrievals in the newest entry only, and only if an assistant
/// wrote it. Earlier entries are never rewritten. The entry is left
/// byte-for-byte unchanged when it has no retrieval directive.
///
/// Returns the number of replacements made.
pub fn substitute_latest(entries: &mut [Entry], store: &VariableStore) -> usize {
    let Some(latest) = entries.last_mut() else {
        return 0;
    };
    if !latest.is_assistant() || latest.text.is_empty() {
        return 0;
    }
    match substitute_text(&latest.text, store) {
        Some((text, count)) => {
            latest.text = text;
            count
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(commands: &[&str]) -> VariableStore {
        let mut store = VariableStore::new();
        for c in commands {
            store.execute(c);
        }
        store
    }

    #[test]
    fn test_substitutes_known_value() {
        let store = store_with(&["hp = 12"]);
        let (text, count) = substitute_text("HP: {{get hp}}", &store).unwrap();
        assert_eq!(text, "HP: 12");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unknown_defaults_to_zero() {
        let store = VariableStore::new();
        let (text, _) = substitute_text("{{get unknown_var}}", &store).unwrap();
        assert_eq!(text, "0");
    }

    #[test]
    fn test_whitespace_tolerant() {
        let store = store_with(&["a = 1.5"]);
        let (text, count) = substitute_text("{{  get   a }}|{{get a}}", &store).unwrap();
        assert_eq!(text, "1.5|1.5");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_case_sensitive_keyword() {
        let store = store_with(&["a = 1"]);
        assert_eq!(substitute_text("{{GET a}}", &store), None);
    }

    #[test]
    fn test_no_retrieval_returns_none() {
        let store = store_with(&["a = 1"]);
        assert_eq!(substitute_text("{{a += 1}} plain", &store), None);
    }

    #[test]
    fn test_latest_only() {
        let store = store_with(&["x = 4"]);
        let mut entries = vec![
            Entry::assistant("old {{get x}}"),
            Entry::assistant("new {{get x}}"),
        ];
        assert_eq!(substitute_latest(&mut entries, &store), 1);
        assert_eq!(entries[0].text, "old {{get x}}");
        assert_eq!(entries[1].text, "new 4");
    }

    #[test]
    fn test_latest_user_entry_untouched() {
        let store = store_with(&["x = 4"]);
        let mut entries = vec![Entry::user("{{get x}}")];
        assert_eq!(substitute_latest(&mut entries, &store), 0);
        assert_eq!(entries[0].text, "{{get x}}");
    }

    #[test]
    fn test_latest_empty_transcript() {
        let store = VariableStore::new();
        let mut entries: Vec<Entry> = Vec::new();
        assert_eq!(substitute_latest(&mut entries, &store), 0);
    }
}
