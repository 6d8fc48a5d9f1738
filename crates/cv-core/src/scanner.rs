use std::sync::LazyLock;

use regex::Regex;

use crate::store::VariableStore;
use crate::transcript::Entry;

/// Any `{{...}}` on one line, shortest match first.
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").unwrap());

/// Counters from one recompute pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Assistant entries with text that were searched for directives.
    pub entries_scanned: usize,
    /// Mutation directives applied.
    pub applied: usize,
    /// Directives that did not mutate: retrievals and malformed commands.
    pub skipped: usize,
}

/// Command strings of every directive in `text`, left to right, with the
/// braces and surrounding whitespace stripped.
pub fn extract_commands(text: &str) -> impl Iterator<Item = &str> {
    DIRECTIVE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Rebuild `store` from the whole transcript.
///
/// Entries apply in transcript order and directives within an entry left to
/// right, so `+=`/`-=` sequences see the values written before them. Only
/// assistant entries are scanned. Never substitutes text.
pub fn recompute(store: &mut VariableStore, entries: &[Entry]) -> ScanReport {
    store.reset();
    let mut report = ScanReport::default();

    for entry in entries {
        if !entry.is_assistant() || entry.text.is_empty() {
            continue;
        }
        report.entries_scanned += 1;

        for command in extract_commands(&entry.text) {
            if store.execute(command) {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_commands() {
        let commands: Vec<&str> =
            extract_commands("a {{ x = 1 }} b {{get x}} c {{}}").collect();
        assert_eq!(commands, vec!["x = 1", "get x", ""]);
    }

    #[test]
    fn test_extract_is_non_greedy() {
        let commands: Vec<&str> = extract_commands("{{a = 1}}{{b = 2}}").collect();
        assert_eq!(commands, vec!["a = 1", "b = 2"]);
    }

    #[test]
    fn test_extract_does_not_span_lines() {
        let commands: Vec<&str> = extract_commands("{{a =\n 1}}").collect();
        assert!(commands.is_empty());
    }

    #[test]
    fn test_across_entries_in_order() {
        let mut store = VariableStore::new();
        let entries = vec![Entry::assistant("{{x += 5}}"), Entry::assistant("{{x -= 2}}")];
        let report = recompute(&mut store, &entries);
        assert_eq!(store.get("x"), 3.0);
        assert_eq!(report.entries_scanned, 2);
        assert_eq!(report.applied, 2);
    }

    #[test]
    fn test_order_within_entry() {
        let mut store = VariableStore::new();
        recompute(&mut store, &[Entry::assistant("{{x=10}}{{x-=3}}")]);
        assert_eq!(store.get("x"), 7.0);

        recompute(&mut store, &[Entry::assistant("{{x-=3}}{{x=10}}")]);
        assert_eq!(store.get("x"), 10.0);
    }

    #[test]
    fn test_user_entries_ignored() {
        let mut store = VariableStore::new();
        let entries = vec![Entry::user("{{x = 5}}"), Entry::user("{{y += 1}}")];
        let report = recompute(&mut store, &entries);
        assert!(store.is_empty());
        assert_eq!(report.entries_scanned, 0);
    }

    #[test]
    fn test_retrievals_counted_as_skipped() {
        let mut store = VariableStore::new();
        let report = recompute(
            &mut store,
            &[Entry::assistant("{{x = 2}} now {{get x}} and {{x ** 2}}")],
        );
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.get("x"), 2.0);
    }

    #[test]
    fn test_recompute_resets_previous_state() {
        let mut store = VariableStore::new();
        recompute(&mut store, &[Entry::assistant("{{stale = 1}}")]);
        recompute(&mut store, &[Entry::assistant("{{fresh = 2}}")]);
        assert!(!store.contains("stale"));
        assert_eq!(store.get("fresh"), 2.0);
    }

    #[test]
    fn test_empty_transcript() {
        let mut store = VariableStore::new();
        store.execute("x = 1");
        let report = recompute(&mut store, &[]);
        assert!(store.is_empty());
        assert_eq!(report, ScanReport::default());
    }
}
