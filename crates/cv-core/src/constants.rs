/// Value a variable takes before its first mutation, and the text a
/// retrieval of an unknown variable is replaced with.
pub const DEFAULT_VALUE: f64 = 0.0;

/// Display text when no variable has been set yet.
pub const EMPTY_PLACEHOLDER: &str = "No variables detected yet";

/// Delay between a host trigger and the recompute it causes, in milliseconds.
/// Gives the host time to finish appending the entry that fired the trigger.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
