//! Chat variable engine.
//!
//! Derives named numeric variables from `{{name op value}}` directives in
//! the assistant messages of a chat transcript, and splices current values
//! into the newest message wherever it says `{{get name}}`.
//!
//! Zero I/O: the transcript and the refresh hook come from a [`Host`].

pub mod constants;
pub mod directive;
pub mod display;
pub mod host;
pub mod scanner;
pub mod store;
pub mod substitute;
pub mod tracker;
pub mod transcript;

pub use constants::{DEFAULT_SETTLE_DELAY_MS, DEFAULT_VALUE, EMPTY_PLACEHOLDER};
pub use directive::{Directive, Operator, Rejection, parse_command};
pub use display::render;
pub use host::{Host, Trigger};
pub use scanner::{ScanReport, extract_commands, recompute};
pub use store::{VariableStore, format_value};
pub use substitute::{substitute_latest, substitute_text};
pub use tracker::{TriggerOutcome, VariableTracker};
pub use transcript::{Entry, Role};
