use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::screen::Frame;

/// Timestamp naming one run's screenshot directory, e.g. `2024-05-01_13-45-09` (UTC).
pub fn run_id(at: OffsetDateTime) -> anyhow::Result<String> {
    at.format(format_description!(
        "[year]-[month]-[day]_[hour]-[minute]-[second]"
    ))
    .context("format run id")
}

/// Saves a numbered PNG at most once per `interval` of wall-clock time.
#[derive(Debug, Clone)]
pub struct ScreenshotRecorder {
    dir: PathBuf,
    interval: Duration,
    last_save: Instant,
    counter: u32,
}

impl ScreenshotRecorder {
    /// `started` is the reference point for the first interval.
    pub fn new(root: &Path, run_id: &str, interval: Duration, started: Instant) -> Self {
        Self {
            dir: root.join(run_id),
            interval,
            last_save: started,
            counter: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Screenshots written so far.
    pub fn saved(&self) -> u32 {
        self.counter
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_save) >= self.interval
    }

    pub fn save(&mut self, frame: &Frame, now: Instant) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create screenshot dir {}", self.dir.display()))?;
        let path = self.dir.join(format!("screenshot_{:04}.png", self.counter));
        frame.save_png(&path)?;
        self.counter += 1;
        self.last_save = now;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_format() {
        let at = OffsetDateTime::from_unix_timestamp(1_714_571_109).unwrap();
        assert_eq!(run_id(at).unwrap(), "2024-05-01_13-45-09");
    }

    #[test]
    fn not_due_before_interval() {
        let t0 = Instant::now();
        let rec = ScreenshotRecorder::new(Path::new("shots"), "run", Duration::from_secs(10), t0);
        assert!(!rec.is_due(t0));
        assert!(!rec.is_due(t0 + Duration::from_millis(9_999)));
        assert!(rec.is_due(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn numbering_is_zero_padded_and_increasing() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let t0 = Instant::now();
        let mut rec = ScreenshotRecorder::new(root.path(), "run-a", Duration::from_secs(10), t0);
        let frame = Frame::solid([1, 2, 3]);

        let mut now = t0;
        let mut names = Vec::new();
        for _ in 0..3 {
            now += Duration::from_secs(10);
            assert!(rec.is_due(now));
            let path = rec.save(&frame, now)?;
            assert!(!rec.is_due(now + Duration::from_secs(1)));
            names.push(path.file_name().unwrap().to_string_lossy().into_owned());
        }

        assert_eq!(
            names,
            vec![
                "screenshot_0000.png",
                "screenshot_0001.png",
                "screenshot_0002.png"
            ]
        );
        assert_eq!(rec.saved(), 3);
        assert!(root.path().join("run-a").join("screenshot_0002.png").is_file());
        Ok(())
    }
}
