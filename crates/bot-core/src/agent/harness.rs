use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::AgentLoop;
use super::display::DisplaySink;
use super::emulator::Emulator;
use super::memory::DEFAULT_HISTORY_WINDOW;
use super::tools::NOTES_LIMIT_CHARS;
use super::wire::{ActionSet, ResponsePlan};
use crate::llm::{ChatRequest, ChatResponse};
use crate::progress::check_progress;

pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ChatResponse>> + Send + 'a>>;
}

/// Loop pacing. Every field can be overridden from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Frames between decision requests.
    pub decision_interval: u32,
    /// Frames requested buttons are held before release.
    pub hold_frames: u32,
    /// Frames advanced when a decision presses nothing. Twice `decision_interval` when unset.
    pub wait_frames: Option<u32>,
    /// Frames advanced after start, before the first decision.
    pub boot_frames: u32,
    pub history_window: usize,
    pub notes_limit: usize,
    /// Frames between display refreshes and quit checks.
    pub display_interval: u32,
    pub screenshot_interval_secs: u64,
    /// Actions between progress checks; 0 disables them.
    pub eval_interval: u64,
    pub screenshot_root: PathBuf,
    pub screenshots_enabled: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            decision_interval: 60,
            hold_frames: 5,
            wait_frames: None,
            boot_frames: 60,
            history_window: DEFAULT_HISTORY_WINDOW,
            notes_limit: NOTES_LIMIT_CHARS,
            display_interval: 2,
            screenshot_interval_secs: 10,
            eval_interval: 100,
            screenshot_root: PathBuf::from("screenshots"),
            screenshots_enabled: true,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.decision_interval == 0 {
            anyhow::bail!("decision_interval must be at least 1");
        }
        if self.display_interval == 0 {
            anyhow::bail!("display_interval must be at least 1");
        }
        if self.history_window == 0 {
            anyhow::bail!("history_window must be at least 1");
        }
        Ok(())
    }

    pub fn wait_frames(&self) -> u32 {
        self.wait_frames
            .unwrap_or_else(|| self.decision_interval.saturating_mul(2))
    }

    pub fn screenshot_interval(&self) -> Duration {
        Duration::from_secs(self.screenshot_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Pressed(ActionSet),
    Waited { frames: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionReport {
    pub decision: Decision,
    pub notes_applied: usize,
    pub notes_rejected: usize,
    /// Set when this decision triggered a progress check.
    pub badges: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The display sink asked to quit.
    UserQuit,
    /// The shutdown future resolved (Ctrl-C in the runner).
    Interrupted,
    StepBudgetExceeded { budget: u64 },
    /// Any error escaping the loop. Holds the full error chain.
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub termination: Termination,
    pub frames: u64,
    pub actions: u64,
    pub screenshots: u32,
}

/// Decision phase: capture, ask the model, apply notes, then press or idle.
pub async fn decide(
    agent: &mut AgentLoop,
    emulator: &dyn Emulator,
    llm: &dyn LlmClient,
) -> anyhow::Result<DecisionReport> {
    let frame = emulator.screen().await.context("capture screen")?;
    let image = frame.encode_png_base64()?;
    let request = agent.build_request(&image);
    let response = llm.complete(request).await.context("model request")?;
    agent.record_observation(image);

    let plan = ResponsePlan::from_calls(&response.function_calls);
    for rejected in &plan.rejected {
        warn!(error = %rejected, "agent.tool_rejected");
    }

    let mut notes_applied = 0;
    let mut notes_rejected = 0;
    for update in &plan.notes_updates {
        match update {
            Ok(text) => {
                let applied = agent.replace_notes(text.clone());
                if let Some(total) = applied.truncated_from {
                    warn!(
                        chars = total,
                        limit = agent.cfg.notes_limit,
                        "agent.notes truncated"
                    );
                }
                info!(chars = applied.chars, "agent.notes");
                notes_applied += 1;
            }
            Err(err) => {
                warn!(error = %err, "agent.notes skipped");
                notes_rejected += 1;
            }
        }
    }

    let decision = if plan.is_idle() {
        let frames = agent.cfg.wait_frames();
        emulator.tick(frames).await?;
        Decision::Waited { frames }
    } else {
        let buttons = plan.buttons.clone();
        agent.record_action(buttons.clone());
        emulator
            .press_and_tick(buttons.clone(), agent.cfg.hold_frames)
            .await?;
        Decision::Pressed(buttons)
    };

    info!(
        tools = ?plan.tool_names,
        wait = plan.wait_requested,
        notes = notes_applied,
        frame = agent.frame_count,
        actions = agent.actions(),
        "agent.decision"
    );

    let mut badges = None;
    if matches!(decision, Decision::Pressed(_))
        && agent.cfg.eval_interval > 0
        && agent.actions() % agent.cfg.eval_interval == 0
    {
        badges = Some(check_progress(emulator).await?);
    }

    Ok(DecisionReport {
        decision,
        notes_applied,
        notes_rejected,
        badges,
    })
}

/// One frame of the loop. Returns a termination once the run should end.
pub async fn step(
    agent: &mut AgentLoop,
    emulator: &dyn Emulator,
    llm: &dyn LlmClient,
    display: &mut dyn DisplaySink,
    now: Instant,
) -> anyhow::Result<Option<Termination>> {
    if agent.frame_count % u64::from(agent.cfg.decision_interval) == 0 {
        decide(agent, emulator, llm).await?;
    } else {
        emulator.tick(1).await?;
    }

    if agent.frame_count % u64::from(agent.cfg.display_interval) == 0 {
        if display.wants_frames() {
            let frame = emulator.screen().await?;
            display.present(&frame);
        }
        if display.quit_requested() {
            return Ok(Some(Termination::UserQuit));
        }
    }

    if let Some(recorder) = agent.screenshots.as_mut()
        && recorder.is_due(now)
    {
        let frame = emulator.screen().await?;
        let path = recorder.save(&frame, now)?;
        info!(path = %path.display(), "agent.screenshot");
    }

    agent.frame_count += 1;

    if agent.budget_exceeded() {
        return Ok(Some(Termination::StepBudgetExceeded {
            budget: agent.max_steps,
        }));
    }
    Ok(None)
}

async fn drive(
    agent: &mut AgentLoop,
    emulator: &dyn Emulator,
    llm: &dyn LlmClient,
    display: &mut dyn DisplaySink,
) -> anyhow::Result<Termination> {
    agent.cfg.validate()?;
    emulator.start().await.context("emulator start")?;
    if agent.cfg.boot_frames > 0 {
        emulator.tick(agent.cfg.boot_frames).await?;
    }
    info!(max_steps = agent.max_steps, "agent.started");

    loop {
        if let Some(termination) = step(agent, emulator, llm, display, Instant::now()).await? {
            return Ok(termination);
        }
    }
}

/// Runs the loop until a termination condition, then always stops the emulator.
///
/// `shutdown` is polled ahead of the loop on every wake-up; when it resolves the run ends
/// as `Interrupted`.
pub async fn run<S>(
    agent: &mut AgentLoop,
    emulator: &dyn Emulator,
    llm: &dyn LlmClient,
    display: &mut dyn DisplaySink,
    shutdown: S,
) -> RunOutcome
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let termination = tokio::select! {
        biased;
        _ = &mut shutdown => Termination::Interrupted,
        res = drive(agent, emulator, llm, display) => match res {
            Ok(termination) => termination,
            Err(err) => {
                error!(error = ?err, "agent.fatal");
                Termination::Fatal(format!("{err:#}"))
            }
        },
    };

    if let Err(err) = emulator.stop().await {
        warn!(error = %format!("{err:#}"), "agent.emulator_stop_failed");
    }

    let outcome = RunOutcome {
        termination,
        frames: agent.frame_count,
        actions: agent.actions(),
        screenshots: agent.screenshots_saved(),
    };
    info!(
        termination = ?outcome.termination,
        frames = outcome.frames,
        actions = outcome.actions,
        screenshots = outcome.screenshots,
        "agent.stop"
    );
    outcome
}
