use std::future::Future;
use std::pin::Pin;

use super::wire::ActionSet;
use crate::screen::Frame;

/// Boundary the decision loop uses to drive the emulator.
///
/// Calls are issued strictly one after another from the loop; implementations may still use
/// interior mutability (e.g. a locked connection) since every method takes `&self`.
pub trait Emulator: Send + Sync {
    /// Loads the ROM and runs the first frame.
    fn start<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Advances `frames` frames with no input held.
    fn tick<'a>(
        &'a self,
        frames: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Presses every button in `buttons`, advances `frames` frames, then releases them.
    fn press_and_tick<'a>(
        &'a self,
        buttons: ActionSet,
        frames: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn screen<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Frame>> + Send + 'a>>;

    fn read_memory<'a>(
        &'a self,
        address: u16,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u8>> + Send + 'a>>;

    /// Releases the emulator session. Called once on every exit path.
    fn stop<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}
