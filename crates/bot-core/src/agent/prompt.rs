use crate::llm::{ChatMessage, ContentPart};

use super::memory::{DEFAULT_HISTORY_WINDOW, HistoryBuffer, HistoryEntry, Notes};

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are playing Pokémon Red on a GameBoy emulator. Your goal is to become the Pokémon Champion \
by collecting all eight gym badges and defeating the Elite Four.

Controls are exposed as functions:
- press_up, press_down, press_left, press_right move the player and the menu cursor.
- press_a confirms, talks to people, reads signs and picks battle moves.
- press_b cancels and backs out of menus.
- press_start opens the main menu (party, items, save).
- press_select is rarely needed.
- wait lets the game run without input, useful while text scrolls or animations play.
- update_notes replaces your notes. Use it to remember goals, locations and what you tried.

Every turn you get the current screen as an image. Call one or more functions; several button \
functions in the same turn are pressed together (for example press_up and press_a).

You also see your most recent turns. When in doubt, make the move a typical player would make \
and keep the game moving forward.";

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    /// Text sent with the screen being decided on.
    pub current_screen_text: String,
    /// Text stored with a screen once it moves into history.
    pub history_screen_text: String,
    pub truncation_notice: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            current_screen_text:
                "This is the most recent screen of the game. Which button should you press next?"
                    .to_string(),
            history_screen_text: "Which button should you press next?".to_string(),
            truncation_notice: truncation_notice(DEFAULT_HISTORY_WINDOW),
        }
    }
}

/// Notice sent ahead of a history view cut down to `window` entries.
pub fn truncation_notice(window: usize) -> String {
    format!("Note: History has been truncated to last {window} interactions...")
}

pub fn entry_to_message(entry: &HistoryEntry, cfg: &PromptConfig) -> ChatMessage {
    match entry {
        HistoryEntry::Observation {
            image_png_b64,
            prompt,
        } => ChatMessage::user_parts(vec![
            ContentPart::text(prompt.clone()),
            ContentPart::png(image_png_b64, Some("high")),
        ]),
        HistoryEntry::Action { buttons } => {
            ChatMessage::assistant(format!("I press {}", buttons.describe()))
        }
        HistoryEntry::TruncationMarker => ChatMessage::user(cfg.truncation_notice.clone()),
    }
}

/// Assembles one request: system prompt, windowed history (with truncation marker when
/// needed), the current notes, then the current screen.
pub fn build_messages(
    cfg: &PromptConfig,
    history: &HistoryBuffer,
    notes: &Notes,
    current_png_b64: &str,
) -> Vec<ChatMessage> {
    let outbound = history.outbound();
    let mut messages = Vec::with_capacity(outbound.len() + 3);
    messages.push(ChatMessage::system(cfg.system_prompt.clone()));
    messages.extend(outbound.into_iter().map(|e| entry_to_message(e, cfg)));
    messages.push(ChatMessage::user(notes.prompt_text()));
    messages.push(ChatMessage::user_parts(vec![
        ContentPart::text(cfg.current_screen_text.clone()),
        ContentPart::png(current_png_b64, None),
    ]));
    messages
}
