//! Flat-file outcome log.
//!
//! Per-day `claimed_*.txt` / `failed_*.txt` files with `address----key`
//! lines, mirrored by in-memory sets for dedup. Recording a claim for an
//! address that previously failed removes it from the failed file.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::domain::now_reference;
use crate::error::Result;

const SEPARATOR: &str = "----";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Claimed,
    Failed,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Claimed => "claimed",
            Status::Failed => "failed",
        }
    }
}

#[derive(Default)]
struct LogState {
    claimed: HashSet<String>,
    failed: HashSet<String>,
}

/// Durable per-run claim outcome record
pub struct OutcomeLog {
    dir: PathBuf,
    date: String,
    state: Mutex<LogState>,
}

impl OutcomeLog {
    /// Open today's outcome files under `dir`, loading prior entries
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let date = now_reference().format("%Y_%m_%d").to_string();
        let log = Self {
            dir,
            date,
            state: Mutex::new(LogState::default()),
        };

        {
            let mut state = log.state.lock().expect("outcome log lock");
            state.claimed = log.load(Status::Claimed)?;
            state.failed = log.load(Status::Failed)?;
            info!(
                claimed = state.claimed.len(),
                failed = state.failed.len(),
                "outcome log loaded"
            );
        }

        Ok(log)
    }

    fn path_for(&self, status: Status) -> PathBuf {
        self.dir
            .join(format!("{}_{}.txt", status.as_str(), self.date))
    }

    fn load(&self, status: Status) -> Result<HashSet<String>> {
        let path = self.path_for(status);
        let mut addresses = HashSet::new();

        if path.exists() {
            for line in fs::read_to_string(&path)?.lines() {
                if let Some((address, _key)) = line.trim().split_once(SEPARATOR) {
                    addresses.insert(address.to_string());
                }
            }
        }

        Ok(addresses)
    }

    /// Record a successful claim. Idempotent; clears any prior failure entry.
    pub fn record_claimed(&self, address: &str, private_key: &str) -> Result<()> {
        let mut state = self.state.lock().expect("outcome log lock");

        if state.failed.remove(address) {
            self.remove_line(Status::Failed, address)?;
            debug!(%address, "removed from failed record");
        }

        if state.claimed.contains(address) {
            return Ok(());
        }

        self.append_line(Status::Claimed, address, private_key)?;
        state.claimed.insert(address.to_string());
        Ok(())
    }

    /// Record a failed claim. Idempotent.
    pub fn record_failed(&self, address: &str, private_key: &str) -> Result<()> {
        let mut state = self.state.lock().expect("outcome log lock");

        if state.failed.contains(address) {
            return Ok(());
        }

        self.append_line(Status::Failed, address, private_key)?;
        state.failed.insert(address.to_string());
        Ok(())
    }

    pub fn is_claimed(&self, address: &str) -> bool {
        self.state
            .lock()
            .expect("outcome log lock")
            .claimed
            .contains(address)
    }

    /// (claimed, failed) entry counts
    pub fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().expect("outcome log lock");
        (state.claimed.len(), state.failed.len())
    }

    fn append_line(&self, status: Status, address: &str, private_key: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(status))?;
        writeln!(file, "{}{}{}", address, SEPARATOR, private_key)?;
        Ok(())
    }

    fn remove_line(&self, status: Status, address: &str) -> Result<()> {
        let path = self.path_for(status);
        if !path.exists() {
            return Ok(());
        }

        let prefix = format!("{}{}", address, SEPARATOR);
        let content = fs::read_to_string(&path)?;
        let kept: Vec<&str> = content
            .lines()
            .filter(|line| !line.starts_with(&prefix))
            .collect();

        let mut rewritten = kept.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        fs::write(&path, rewritten)?;
        Ok(())
    }
}
