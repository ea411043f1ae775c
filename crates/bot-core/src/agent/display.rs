use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::warn;

use crate::screen::Frame;

/// Where refreshed frames go, and where a user can ask the run to stop.
pub trait DisplaySink: Send {
    /// Whether `present` wants frames. Sinks that only watch for quit return false so the loop
    /// can skip the capture.
    fn wants_frames(&self) -> bool {
        false
    }

    fn present(&mut self, _frame: &Frame) {}

    fn quit_requested(&self) -> bool;
}

/// No output, never quits.
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl DisplaySink for HeadlessDisplay {
    fn quit_requested(&self) -> bool {
        false
    }
}

/// Quits when a line reading `q` arrives on stdin.
#[derive(Debug, Clone)]
pub struct StdinQuitDisplay {
    quit: Arc<AtomicBool>,
}

impl StdinQuitDisplay {
    /// Watches stdin on a detached OS thread, outside the async runtime, so runtime shutdown
    /// never waits on a pending read.
    pub fn spawn() -> Self {
        let quit = Arc::new(AtomicBool::new(false));
        let flag = quit.clone();
        let spawned = thread::Builder::new()
            .name("stdin-quit".to_string())
            .spawn(move || watch_lines(std::io::stdin().lock(), &flag));
        if let Err(err) = spawned {
            warn!(error = %err, "display.stdin watcher unavailable");
        }
        Self { quit }
    }
}

/// Sets `quit` once a quit line is read. Returns at end of input or on a read error.
fn watch_lines(reader: impl BufRead, quit: &AtomicBool) {
    for line in reader.lines() {
        let Ok(line) = line else {
            return;
        };
        if is_quit_line(&line) {
            quit.store(true, Ordering::SeqCst);
            return;
        }
    }
}

impl DisplaySink for StdinQuitDisplay {
    fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}

fn is_quit_line(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn quit_line_matching() {
        assert!(is_quit_line("q"));
        assert!(is_quit_line(" Q \r"));
        assert!(!is_quit_line("quit"));
        assert!(!is_quit_line(""));
    }

    #[test]
    fn watcher_sets_flag_on_quit_line() {
        let quit = AtomicBool::new(false);
        watch_lines(Cursor::new("hello\n\n q \nafter\n"), &quit);
        assert!(quit.load(Ordering::SeqCst));

        let quit = AtomicBool::new(false);
        watch_lines(Cursor::new("quit\nqq\n"), &quit);
        assert!(!quit.load(Ordering::SeqCst));
    }

    #[test]
    fn runtime_drops_promptly_with_stdin_watcher_running() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let display = rt.block_on(async { StdinQuitDisplay::spawn() });

        let started = Instant::now();
        drop(rt);
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(display);
    }

    #[test]
    fn headless_never_quits_or_wants_frames() {
        let display = HeadlessDisplay;
        assert!(!display.quit_requested());
        assert!(!display.wants_frames());
    }
}
