use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::wire::ActionSet;

pub const DEFAULT_HISTORY_WINDOW: usize = 100;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A screen the model was shown, as base64 PNG, with the text that accompanied it.
    Observation { image_png_b64: String, prompt: String },
    /// Buttons the agent pressed for one decision.
    Action { buttons: ActionSet },
    /// Synthetic marker placed ahead of a windowed view.
    TruncationMarker,
}

static TRUNCATION_MARKER: HistoryEntry = HistoryEntry::TruncationMarker;

/// Append-only conversation log. Only the newest `window` entries can ever be sent, so only
/// those are retained; `appended` keeps the full count for truncation and step accounting.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    window: usize,
    appended: usize,
    actions: u64,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl HistoryBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(window.min(256)),
            window,
            appended: 0,
            actions: 0,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if matches!(entry, HistoryEntry::Action { .. }) {
            self.actions = self.actions.saturating_add(1);
        }
        self.appended = self.appended.saturating_add(1);
        self.entries.push_back(entry);
        while self.entries.len() > self.window {
            self.entries.pop_front();
        }
    }

    /// Total entries ever appended.
    pub fn len(&self) -> usize {
        self.appended
    }

    pub fn is_empty(&self) -> bool {
        self.appended == 0
    }

    /// Number of agent-action entries ever appended.
    pub fn action_count(&self) -> u64 {
        self.actions
    }

    pub fn is_truncated(&self) -> bool {
        self.appended > self.window
    }

    /// The view sent with a request: an optional truncation marker followed by the newest
    /// `window` entries, oldest first.
    pub fn outbound(&self) -> Vec<&HistoryEntry> {
        let mut view = Vec::with_capacity(self.entries.len() + 1);
        if self.is_truncated() {
            view.push(&TRUNCATION_MARKER);
        }
        view.extend(self.entries.iter());
        view
    }
}

/// Outcome of replacing the notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotesUpdate {
    pub chars: usize,
    pub truncated_from: Option<usize>,
}

/// Free-text scratchpad owned by the loop. Every update replaces the whole text.
#[derive(Debug, Clone)]
pub struct Notes {
    text: String,
    limit_chars: usize,
}

impl Notes {
    pub fn new(limit_chars: usize) -> Self {
        Self {
            text: String::new(),
            limit_chars,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces the notes, keeping at most `limit_chars` characters.
    pub fn replace(&mut self, text: impl Into<String>) -> NotesUpdate {
        let mut text = text.into();
        let total = text.chars().count();
        let truncated_from = if total > self.limit_chars {
            if let Some((idx, _)) = text.char_indices().nth(self.limit_chars) {
                text.truncate(idx);
            }
            Some(total)
        } else {
            None
        };
        self.text = text;
        NotesUpdate {
            chars: total.min(self.limit_chars),
            truncated_from,
        }
    }

    /// Text of the per-request notes message.
    pub fn prompt_text(&self) -> String {
        if self.text.is_empty() {
            "You do not have any notes yet. Use the update_notes function to add notes.".to_string()
        } else {
            format!("Your current notes are {}", self.text)
        }
    }
}
