use serde::Serialize;

use crate::display;
use crate::host::{Host, Trigger};
use crate::scanner::{ScanReport, recompute};
use crate::store::VariableStore;
use crate::substitute::substitute_latest;
use crate::transcript::Entry;

/// What one trigger did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    /// False when the host had no transcript to scan.
    pub recomputed: bool,
    pub variables: usize,
    pub applied: usize,
    pub substitutions: usize,
    pub refreshed: bool,
}

/// Owns the variable mapping and reacts to host triggers.
///
/// Every trigger rebuilds the mapping from the full transcript. A received
/// entry additionally gets its `{{get name}}` directives replaced, using the
/// mapping that was just rebuilt.
#[derive(Debug, Default)]
pub struct VariableTracker {
    store: VariableStore,
}

impl VariableTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// Rebuild the mapping from `entries`. Idempotent.
    pub fn recompute(&mut self, entries: &[Entry]) -> ScanReport {
        recompute(&mut self.store, entries)
    }

    pub fn handle<H: Host + ?Sized>(&mut self, trigger: Trigger, host: &mut H) -> TriggerOutcome {
        let Some(entries) = host.transcript() else {
            tracing::debug!("{trigger}: no transcript available, keeping current state");
            return TriggerOutcome {
                variables: self.store.len(),
                ..TriggerOutcome::default()
            };
        };

        let report = recompute(&mut self.store, entries);
        tracing::debug!(
            "{trigger}: scanned {} entries, applied {}, skipped {}",
            report.entries_scanned,
            report.applied,
            report.skipped
        );

        let substitutions = if trigger.substitutes() {
            substitute_latest(entries, &self.store)
        } else {
            0
        };

        let refreshed = substitutions > 0;
        if refreshed {
            tracing::debug!("{trigger}: substituted {substitutions} retrievals, refreshing");
            host.refresh();
        }

        TriggerOutcome {
            recomputed: true,
            variables: self.store.len(),
            applied: report.applied,
            substitutions,
            refreshed,
        }
    }

    /// Display text for the current mapping.
    pub fn display(&self, placeholder: &str) -> String {
        display::render(&self.store, placeholder)
    }
}
