//! Core of the GameBoy agent: emulator boundary, screen encoding, chat-model client,
//! and the decision loop that ties them together.
//!
//! The runner binary supplies the concrete emulator bridge and process wiring; everything
//! here is testable against in-memory fakes.

pub mod agent;
pub mod config;
pub mod llm;
pub mod progress;
pub mod screen;
