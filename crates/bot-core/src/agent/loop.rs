use super::harness::HarnessConfig;
use super::memory::{HistoryBuffer, HistoryEntry, Notes, NotesUpdate};
use super::prompt::{PromptConfig, build_messages, truncation_notice};
use super::screenshots::ScreenshotRecorder;
use super::tools::{ToolDefinition, tool_catalog};
use super::wire::ActionSet;
use crate::llm::ChatRequest;

/// State owned by one run of the decision loop.
#[derive(Debug)]
pub struct AgentLoop {
    pub cfg: HarnessConfig,
    pub prompt_cfg: PromptConfig,
    pub tools: Vec<ToolDefinition>,
    pub history: HistoryBuffer,
    pub notes: Notes,
    pub screenshots: Option<ScreenshotRecorder>,
    /// The run ends once the action count exceeds this.
    pub max_steps: u64,
    pub frame_count: u64,
}

impl AgentLoop {
    pub fn new(cfg: HarnessConfig, max_steps: u64) -> Self {
        let prompt_cfg = PromptConfig {
            truncation_notice: truncation_notice(cfg.history_window),
            ..PromptConfig::default()
        };
        Self {
            prompt_cfg,
            tools: tool_catalog(cfg.notes_limit),
            history: HistoryBuffer::new(cfg.history_window),
            notes: Notes::new(cfg.notes_limit),
            screenshots: None,
            max_steps,
            frame_count: 0,
            cfg,
        }
    }

    pub fn with_screenshots(mut self, recorder: ScreenshotRecorder) -> Self {
        self.screenshots = Some(recorder);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.prompt_cfg.system_prompt = system_prompt.into();
        self
    }

    pub fn build_request(&self, current_png_b64: &str) -> ChatRequest {
        ChatRequest {
            messages: build_messages(&self.prompt_cfg, &self.history, &self.notes, current_png_b64),
            tools: self.tools.clone(),
        }
    }

    pub fn actions(&self) -> u64 {
        self.history.action_count()
    }

    pub fn budget_exceeded(&self) -> bool {
        self.actions() > self.max_steps
    }

    pub fn record_observation(&mut self, image_png_b64: String) {
        self.history.push(HistoryEntry::Observation {
            image_png_b64,
            prompt: self.prompt_cfg.history_screen_text.clone(),
        });
    }

    pub fn record_action(&mut self, buttons: ActionSet) {
        self.history.push(HistoryEntry::Action { buttons });
    }

    pub fn replace_notes(&mut self, text: String) -> NotesUpdate {
        self.notes.replace(text)
    }

    pub fn screenshots_saved(&self) -> u32 {
        self.screenshots.as_ref().map_or(0, ScreenshotRecorder::saved)
    }
}
