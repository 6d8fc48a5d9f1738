use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transcript::Entry;

/// The application that owns the transcript.
pub trait Host {
    /// The current transcript, oldest entry first. `None` when no chat is
    /// open; the tracker then leaves its state as it is.
    fn transcript(&mut self) -> Option<&mut [Entry]>;

    /// Re-render after the newest entry's text was rewritten.
    fn refresh(&mut self);
}

/// External events that make the tracker recompute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    EntryReceived,
    EntryEdited,
    TranscriptSwitched,
    TranscriptLoaded,
}

impl Trigger {
    pub const ALL: [Trigger; 4] = [
        Trigger::EntryReceived,
        Trigger::EntryEdited,
        Trigger::TranscriptSwitched,
        Trigger::TranscriptLoaded,
    ];

    /// Whether the trigger runs the retrieval substitution pass after the
    /// recompute. Only a newly received entry is rewritten; edits and
    /// transcript changes never touch message text.
    pub fn substitutes(self) -> bool {
        matches!(self, Trigger::EntryReceived)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::EntryReceived => "entry_received",
            Trigger::EntryEdited => "entry_edited",
            Trigger::TranscriptSwitched => "transcript_switched",
            Trigger::TranscriptLoaded => "transcript_loaded",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Host for Vec<Entry> {
    fn transcript(&mut self) -> Option<&mut [Entry]> {
        Some(self.as_mut_slice())
    }

    fn refresh(&mut self) {}
}
