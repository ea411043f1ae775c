use tracing::info;

use crate::agent::emulator::Emulator;

/// Pokémon Red/Blue: one bit per gym badge.
pub const BADGES_ADDRESS: u16 = 0xD356;

pub fn badge_count(flags: u8) -> u8 {
    flags.count_ones() as u8
}

/// Reads the badge byte and logs the count. Observational only.
pub async fn check_progress(emulator: &dyn Emulator) -> anyhow::Result<u8> {
    let flags = emulator.read_memory(BADGES_ADDRESS).await?;
    let badges = badge_count(flags);
    info!(badges, "agent.progress");
    Ok(badges)
}
