mod remote;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gb_bot_core::agent::AgentLoop;
use gb_bot_core::agent::display::{DisplaySink, HeadlessDisplay, StdinQuitDisplay};
use gb_bot_core::agent::harness::{HarnessConfig, LlmClient, Termination, run};
use gb_bot_core::agent::screenshots::{ScreenshotRecorder, run_id};
use gb_bot_core::config::{
    AgentConfig, ConfigLoader, DEFAULT_EMULATION_SPEED, DEFAULT_MAX_STEPS, GameConfig,
    ROM_PATH_VAR,
};
use gb_bot_core::llm::{ChatCompletionsClient, ChatRequest, ChatResponse};

use remote::RemoteEmulator;

#[derive(Parser, Debug)]
#[command(
    name = "gb-bot",
    version,
    about = "Plays a GameBoy ROM by asking a vision chat model which buttons to press."
)]
struct Args {
    /// ROM file to load. Falls back to ROM_PATH.
    #[arg(long, value_name = "PATH")]
    rom: Option<PathBuf>,

    /// Emulation speed multiplier.
    #[arg(long, default_value_t = DEFAULT_EMULATION_SPEED)]
    speed: f32,

    /// Maximum number of agent actions before the run stops.
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    interactions: u64,

    /// Emulator bridge control address.
    #[arg(long, env = "GB_BOT_EMULATOR_ADDR", default_value = "127.0.0.1:7879")]
    emulator_addr: String,

    /// TOML file overriding loop pacing.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop when a line reading `q` arrives on stdin.
    #[arg(long)]
    quit_on_stdin: bool,

    /// Do not write periodic screenshots.
    #[arg(long)]
    no_screenshots: bool,
}

struct RunnerLlm {
    client: ChatCompletionsClient,
}

impl LlmClient for RunnerLlm {
    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ChatResponse>> + Send + 'a>> {
        Box::pin(async move { self.client.complete(&request).await })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_harness_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let mut cfg = match &args.config {
        Some(path) => ConfigLoader::parse_from_file::<HarnessConfig>(path)?,
        None => HarnessConfig::default(),
    };
    if args.no_screenshots {
        cfg.screenshots_enabled = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Loads `.env` from the working directory or a parent, if present. Existing process
/// variables win.
fn load_env_file() -> anyhow::Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err).context("load .env"),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file()?;
    let args = Args::parse();
    init_tracing();
    if let Some(path) = &env_file {
        info!(path = %path.display(), "loaded env file");
    }

    let agent_cfg = AgentConfig::from_env()?;

    let game = match GameConfig::resolve(
        args.rom.clone(),
        std::env::var(ROM_PATH_VAR).ok(),
        args.interactions,
        args.speed,
    ) {
        Ok(game) => game,
        Err(err) => {
            error!(error = %err, "config");
            return Ok(());
        }
    };

    let harness_cfg = load_harness_config(&args)?;

    let llm = RunnerLlm {
        client: ChatCompletionsClient::new(&agent_cfg),
    };
    info!(
        model = %agent_cfg.model,
        endpoint = llm.client.endpoint(),
        rom = %game.rom_path.display(),
        speed = game.emulation_speed,
        max_steps = game.max_steps,
        "gb-bot starting"
    );

    let emulator =
        RemoteEmulator::connect(&args.emulator_addr, game.rom_path.clone(), game.emulation_speed)
            .await?;

    let mut agent = AgentLoop::new(harness_cfg.clone(), game.max_steps);
    if harness_cfg.screenshots_enabled {
        let id = run_id(time::OffsetDateTime::now_utc())?;
        let recorder = ScreenshotRecorder::new(
            &harness_cfg.screenshot_root,
            &id,
            harness_cfg.screenshot_interval(),
            Instant::now(),
        );
        info!(dir = %recorder.dir().display(), "screenshots enabled");
        agent = agent.with_screenshots(recorder);
    }

    let mut display: Box<dyn DisplaySink> = if args.quit_on_stdin {
        Box::new(StdinQuitDisplay::spawn())
    } else {
        Box::new(HeadlessDisplay)
    };

    let outcome = run(
        &mut agent,
        &emulator,
        &llm,
        display.as_mut(),
        shutdown_signal(),
    )
    .await;

    match outcome.termination {
        Termination::Fatal(msg) => anyhow::bail!("run failed: {msg}"),
        termination => {
            info!(
                ?termination,
                frames = outcome.frames,
                actions = outcome.actions,
                screenshots = outcome.screenshots,
                "gb-bot finished"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn cli_defaults() {
        let args = Args::try_parse_from(["gb-bot", "--rom", "red.gb"]).unwrap();
        assert_eq!(args.rom, Some(PathBuf::from("red.gb")));
        assert_eq!(args.speed, 2.0);
        assert_eq!(args.interactions, 10_000);
        assert!(!args.quit_on_stdin);
        assert!(!args.no_screenshots);
    }

    #[test]
    fn cli_overrides() {
        let args = Args::try_parse_from([
            "gb-bot",
            "--speed",
            "4",
            "--interactions",
            "5",
            "--emulator-addr",
            "10.0.0.2:9000",
            "--quit-on-stdin",
            "--no-screenshots",
        ])
        .unwrap();
        assert_eq!(args.rom, None);
        assert_eq!(args.speed, 4.0);
        assert_eq!(args.interactions, 5);
        assert_eq!(args.emulator_addr, "10.0.0.2:9000");
        assert!(args.quit_on_stdin);
    }

    #[test]
    fn env_file_supplies_credentials_and_rom() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_KEY=secret\nROM_PATH=roms/red.gb\n# comment\n")?;
        let vars = dotenvy::from_path_iter(&path)?.collect::<Result<HashMap<_, _>, _>>()?;

        let agent = AgentConfig::from_lookup(|key| vars.get(key).cloned())?;
        assert_eq!(agent.api_key, "secret");
        let game = GameConfig::resolve(None, vars.get(ROM_PATH_VAR).cloned(), 5, 2.0)?;
        assert_eq!(game.rom_path, PathBuf::from("roms/red.gb"));
        Ok(())
    }

    #[test]
    fn no_screenshots_flag_disables_recorder() -> anyhow::Result<()> {
        let args = Args::try_parse_from(["gb-bot", "--no-screenshots"])?;
        let cfg = load_harness_config(&args)?;
        assert!(!cfg.screenshots_enabled);
        assert_eq!(cfg.decision_interval, 60);
        Ok(())
    }

    #[test]
    fn pacing_file_is_applied() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pacing.toml");
        std::fs::write(&path, "hold_frames = 8\nwait_frames = 30\n")?;
        let args = Args::try_parse_from([
            "gb-bot".into(),
            "--config".into(),
            path.into_os_string(),
        ])?;
        let cfg = load_harness_config(&args)?;
        assert_eq!(cfg.hold_frames, 8);
        assert_eq!(cfg.wait_frames(), 30);
        assert!(cfg.screenshots_enabled);
        Ok(())
    }
}
