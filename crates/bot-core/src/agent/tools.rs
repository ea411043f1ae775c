use serde::{Deserialize, Serialize};
use serde_json::json;

use super::wire::{Button, ToolCall, UPDATE_NOTES_TOOL, WAIT_TOOL};

/// Default cap advertised to the model for `update_notes`.
pub const NOTES_LIMIT_CHARS: usize = 2000;

/// A function the model may invoke. Serialized as the `function` object of a chat tool entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

fn no_arguments() -> serde_json::Value {
    json!({ "type": "object", "properties": {} })
}

fn button_label(button: Button) -> &'static str {
    match button {
        Button::Up => "up",
        Button::Down => "down",
        Button::Left => "left",
        Button::Right => "right",
        Button::A => "A",
        Button::B => "B",
        Button::Start => "Start",
        Button::Select => "Select",
    }
}

/// The fixed tool catalog: eight button presses, `wait`, and `update_notes`.
pub fn tool_catalog(notes_limit: usize) -> Vec<ToolDefinition> {
    let mut tools: Vec<ToolDefinition> = Button::ALL
        .into_iter()
        .map(|button| ToolDefinition {
            name: button.tool_name().to_string(),
            description: format!("Press the {} button on the GameBoy", button_label(button)),
            parameters: no_arguments(),
        })
        .collect();

    tools.push(ToolDefinition {
        name: WAIT_TOOL.to_string(),
        description: "Do nothing and let the game run for a while".to_string(),
        parameters: no_arguments(),
    });
    tools.push(ToolDefinition {
        name: UPDATE_NOTES_TOOL.to_string(),
        description: format!(
            "Replace your notes with new text. Notes are limited to {notes_limit} characters and \
             are shown to you on every turn."
        ),
        parameters: json!({
            "type": "object",
            "properties": {
                "notes": {
                    "type": "string",
                    "description": "The full new text of your notes"
                }
            },
            "required": ["notes"]
        }),
    });
    tools
}

pub fn tool_name_for_call(call: &ToolCall) -> &'static str {
    match call {
        ToolCall::Press(button) => button.tool_name(),
        ToolCall::Wait => WAIT_TOOL,
        ToolCall::UpdateNotes(_) => UPDATE_NOTES_TOOL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::wire::FunctionCallWire;

    #[test]
    fn catalog_has_every_button_plus_wait_and_notes() {
        let tools = tool_catalog(NOTES_LIMIT_CHARS);
        assert_eq!(tools.len(), 10);
        for button in Button::ALL {
            assert!(tools.iter().any(|t| t.name == button.tool_name()));
        }
        let notes = tools.iter().find(|t| t.name == UPDATE_NOTES_TOOL).unwrap();
        assert!(notes.description.contains("2000"));
        assert_eq!(notes.parameters["properties"]["notes"]["type"], "string");
    }

    #[test]
    fn every_catalog_name_parses() {
        for tool in tool_catalog(NOTES_LIMIT_CHARS) {
            let args = if tool.name == UPDATE_NOTES_TOOL {
                "{\"notes\":\"x\"}"
            } else {
                "{}"
            };
            let call = ToolCall::try_from(&FunctionCallWire::new(tool.name.clone(), args)).unwrap();
            assert_eq!(tool_name_for_call(&call), tool.name);
        }
    }
}
