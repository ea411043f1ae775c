use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UPDATE_NOTES_TOOL: &str = "update_notes";
pub const WAIT_TOOL: &str = "wait";

/// A GameBoy joypad button. The serialized form is the identifier the emulator bridge expects.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
            Button::Start => "start",
            Button::Select => "select",
        }
    }

    /// Name of the model-facing tool that presses this button.
    pub fn tool_name(self) -> &'static str {
        match self {
            Button::Up => "press_up",
            Button::Down => "press_down",
            Button::Left => "press_left",
            Button::Right => "press_right",
            Button::A => "press_a",
            Button::B => "press_b",
            Button::Start => "press_start",
            Button::Select => "press_select",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.tool_name() == name)
    }
}

/// Buttons requested in a single decision, pressed together.
///
/// Insertion order is kept (it shows up in history text); duplicates are dropped.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ActionSet {
    buttons: Vec<Button>,
}

impl ActionSet {
    pub fn insert(&mut self, button: Button) -> bool {
        if self.buttons.contains(&button) {
            return false;
        }
        self.buttons.push(button);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn contains(&self, button: Button) -> bool {
        self.buttons.contains(&button)
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// Human readable form used in history, e.g. `up and a`.
    pub fn describe(&self) -> String {
        self.buttons
            .iter()
            .map(|b| b.name())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

impl FromIterator<Button> for ActionSet {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut set = ActionSet::default();
        for button in iter {
            set.insert(button);
        }
        set
    }
}

/// One function invocation as returned by the chat endpoint. `arguments` is a JSON document
/// encoded as a string.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FunctionCallWire {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCallWire {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpdateNotesArgs {
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Press(Button),
    Wait,
    UpdateNotes(UpdateNotesArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolParseError {
    #[error("unsupported tool name: {0}")]
    UnsupportedToolName(String),
    #[error("invalid tool arguments: {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

impl TryFrom<&FunctionCallWire> for ToolCall {
    type Error = ToolParseError;

    fn try_from(wire: &FunctionCallWire) -> Result<Self, Self::Error> {
        let name = wire.name.trim().to_ascii_lowercase();
        if let Some(button) = Button::from_tool_name(&name) {
            return Ok(ToolCall::Press(button));
        }
        match name.as_str() {
            WAIT_TOOL => Ok(ToolCall::Wait),
            UPDATE_NOTES_TOOL => {
                let args = serde_json::from_str::<UpdateNotesArgs>(&wire.arguments).map_err(|e| {
                    ToolParseError::InvalidArguments {
                        tool: UPDATE_NOTES_TOOL,
                        reason: e.to_string(),
                    }
                })?;
                Ok(ToolCall::UpdateNotes(args))
            }
            other => Err(ToolParseError::UnsupportedToolName(other.to_string())),
        }
    }
}

/// What a single model response asks the loop to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePlan {
    /// Raw tool names in response order, for logging.
    pub tool_names: Vec<String>,
    pub buttons: ActionSet,
    pub wait_requested: bool,
    /// Every `update_notes` invocation in response order; malformed payloads are kept as errors.
    pub notes_updates: Vec<Result<String, ToolParseError>>,
    pub rejected: Vec<ToolParseError>,
}

impl ResponsePlan {
    pub fn from_calls(calls: &[FunctionCallWire]) -> Self {
        let mut plan = ResponsePlan::default();
        for call in calls {
            plan.tool_names.push(call.name.clone());
            match ToolCall::try_from(call) {
                Ok(ToolCall::Press(button)) => {
                    plan.buttons.insert(button);
                }
                Ok(ToolCall::Wait) => plan.wait_requested = true,
                Ok(ToolCall::UpdateNotes(args)) => plan.notes_updates.push(Ok(args.notes)),
                Err(err @ ToolParseError::InvalidArguments { .. }) => {
                    plan.notes_updates.push(Err(err))
                }
                Err(err) => plan.rejected.push(err),
            }
        }
        plan
    }

    /// True when the response resolves to no button press (empty, `wait` only, or only
    /// unrecognised names once notes updates are consumed).
    pub fn is_idle(&self) -> bool {
        self.buttons.is_empty()
    }
}
