use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use time::{macros::format_description, OffsetDateTime};
use tracing::{info, warn};

/// Append-only mission event sink. One call per event.
pub trait MissionLog: Send + Sync {
    fn append(&self, line: &str);
}

impl<T: MissionLog + ?Sized> MissionLog for Arc<T> {
    fn append(&self, line: &str) {
        (**self).append(line)
    }
}

/// `flight_<UTC timestamp>.txt`, one line per event prefixed with seconds
/// since the log was opened. Lines are also emitted as `tracing` events.
pub struct FlightLog {
    path: PathBuf,
    out: Mutex<LineWriter<File>>,
    opened: Instant,
}

impl FlightLog {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        let stamp = now
            .format(format_description!("[year]_[month]_[day]-[hour]_[minute]_[second]"))
            .context("format log timestamp")?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;

        let path = dir.join(format!("flight_{}.txt", stamp));
        let file = File::create(&path).with_context(|| format!("create flight log {}", path.display()))?;
        let mut out = LineWriter::new(file);
        writeln!(out, "# sortie flight log, opened {} UTC", stamp).context("write flight log header")?;

        Ok(Self { path, out: Mutex::new(out), opened: Instant::now() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MissionLog for FlightLog {
    fn append(&self, line: &str) {
        info!(target: "flight", "{}", line);
        let t = self.opened.elapsed().as_secs_f64();
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "[{:>8.1}s] {}", t, line) {
            warn!("flight log write failed ({}): {}", self.path.display(), e);
        }
    }
}

/// Keeps lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).iter().filter(|l| l.contains(needle)).count()
    }
}

impl MissionLog for MemoryLog {
    fn append(&self, line: &str) {
        info!(target: "flight", "{}", line);
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_keeps_order() {
        let log = MemoryLog::new();
        log.append("first");
        log.append("second");
        assert_eq!(log.lines(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(log.count_containing("sec"), 1);
    }

    #[test]
    fn shared_log_appends_through_arc() {
        let log = Arc::new(MemoryLog::new());
        let sink: &dyn MissionLog = &log;
        sink.append("via arc");
        assert_eq!(log.lines(), vec!["via arc".to_string()]);
    }

    #[test]
    fn flight_log_writes_timestamped_lines() {
        let dir = std::env::temp_dir().join(format!("sortie-log-{}-{}", std::process::id(), line!()));
        let log = FlightLog::create(&dir).unwrap();
        log.append("Arming motors");
        log.append("Completed");

        let name = log.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("flight_") && name.ends_with(".txt"), "{name}");

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# sortie flight log"));
        assert!(lines[1].ends_with("] Arming motors"));
        assert!(lines[2].ends_with("] Completed"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
