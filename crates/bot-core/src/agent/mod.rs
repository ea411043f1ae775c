//! Decision loop: tool contract, history and notes, prompt assembly, and the frame-paced
//! harness that drives an [`emulator::Emulator`] from model tool calls.

pub mod display;
pub mod emulator;
pub mod harness;
pub mod r#loop;
pub mod memory;
pub mod prompt;
pub mod screenshots;
pub mod tools;
pub mod wire;

pub use wire::{ActionSet, Button, FunctionCallWire, ToolCall, ToolParseError};

pub use r#loop::AgentLoop;
