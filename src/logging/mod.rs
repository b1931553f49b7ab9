//! Transcript of inbound traffic on disk.
//!
//! When enabled, every received message is appended in wire form to a daily
//! file named `<target>_<date>.log` in the configured directory (default:
//! `~/.local/share/tirc/logs/`). Channel messages go to the channel's file,
//! everything else to `server`.

use crate::config::LoggingConfig;
use crate::irc::message::Message;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Appends received messages to per-target daily log files.
///
/// File handles are cached per target for the current day; handles for
/// earlier days are closed when the first file of a new day is opened.
pub struct Transcript {
    enabled: bool,
    log_dir: PathBuf,
    file_handles: HashMap<String, fs::File>,
}

impl Transcript {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.enabled,
            log_dir: expand_home(&config.log_dir),
            file_handles: HashMap::new(),
        }
    }

    /// Record `msg`. No-op if the transcript is disabled.
    pub fn record(&mut self, msg: &Message) {
        if !self.enabled {
            return;
        }

        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let filename = format!("{}_{}.log", target_of(msg), date);
        let filepath = self.log_dir.join(&filename);

        if !self.file_handles.contains_key(&filename) {
            let today = format!("_{date}.log");
            self.file_handles.retain(|name, _| name.ends_with(&today));
            let opened = fs::create_dir_all(&self.log_dir).and_then(|_| {
                OpenOptions::new().create(true).append(true).open(&filepath)
            });
            match opened {
                Ok(file) => {
                    self.file_handles.insert(filename.clone(), file);
                }
                Err(e) => {
                    warn!(path = %filepath.display(), error = %e, "cannot open transcript file");
                    return;
                }
            }
        }

        if let Some(handle) = self.file_handles.get_mut(&filename) {
            let timestamp = chrono::Local::now().format("%H:%M:%S");
            if let Err(e) = writeln!(handle, "[{}] {}", timestamp, msg) {
                warn!(path = %filepath.display(), error = %e, "transcript write failed");
            }
        }
    }
}

/// File stem for `msg`: the channel of a channel PRIVMSG, else `server`.
fn target_of(msg: &Message) -> String {
    let channel = match msg.command() {
        "PRIVMSG" => msg.field("msgtarget").filter(|t| t.starts_with(['#', '&'])),
        _ => None,
    };

    // Sanitize target for filename
    channel
        .unwrap_or("server")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '#' { c } else { '_' })
        .collect()
}

fn expand_home(dir: &str) -> PathBuf {
    match dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(dir)),
        None => PathBuf::from(dir),
    }
}
