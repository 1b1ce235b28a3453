//! Hot reload of rule files via a `notify` watcher.
//!
//! The parent directory of every rule file is watched non-recursively, so
//! editors that replace files by rename are still picked up. Change
//! notifications for the rule files trigger [`Reloader::reload`]; bursts are
//! coalesced by a [`Cooldown`] and the reload runs once the burst has settled,
//! so a save that truncates before writing is read whole.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::Reloader;

/// Settle period after the first change of a burst; the reload runs when it ends.
pub const RELOAD_COOLDOWN: Duration = Duration::from_secs(1);

/// Capacity of the notification channel; overflow is dropped, reloads are coalesced anyway.
const EVENT_BUFFER: usize = 64;

/// Errors starting the watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("rules file {} has no parent directory", .0.display())]
    NoParent(PathBuf),
}

// ── Cool-down ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CooldownState {
    Idle,
    CoolingDown { until: Instant },
}

/// Two-state reload gate.
///
/// `Idle` admits a trigger and moves to `CoolingDown`; triggers are refused
/// until the period elapses, after which the next trigger is admitted again.
/// This bounds reloads to one per burst, not to a strict rate.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    state: CooldownState,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: CooldownState::Idle,
        }
    }

    /// Admit a trigger at `now`, entering the cooling-down state if admitted.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if let CooldownState::CoolingDown { until } = self.state {
            if now < until {
                return false;
            }
            self.state = CooldownState::Idle;
        }
        self.state = CooldownState::CoolingDown {
            until: now + self.period,
        };
        true
    }

    /// Time left before the current cool-down ends.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.state {
            CooldownState::Idle => Duration::ZERO,
            CooldownState::CoolingDown { until } => until.saturating_duration_since(now),
        }
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        match self.state {
            CooldownState::Idle => true,
            CooldownState::CoolingDown { until } => now >= until,
        }
    }
}

// ── Watcher ─────────────────────────────────────────────────────────

/// Running rule watcher. Dropping it stops both the OS watch and the reload task.
pub struct RuleWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl RuleWatcher {
    /// Watch the reloader's files and reload on change.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(reloader: Arc<Reloader>, cooldown: Duration) -> Result<Self, WatchError> {
        let targets: BTreeSet<PathBuf> = reloader.files().iter().map(|p| absolute(p)).collect();
        let mut dirs = BTreeSet::new();
        for target in &targets {
            let parent = target
                .parent()
                .ok_or_else(|| WatchError::NoParent(target.clone()))?;
            dirs.insert(parent.to_path_buf());
        }

        let (tx, rx) = mpsc::channel::<Event>(EVENT_BUFFER);
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    // Runs on the notify thread; never block it.
                    let _ = tx.try_send(event);
                }
                Err(e) => warn!(error = %e, "rules watcher error"),
            })?;

        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }
        info!(files = ?targets, "watch of rules enabled");

        let task = tokio::spawn(reload_loop(rx, targets, reloader, Cooldown::new(cooldown)));
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for RuleWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload_loop(
    mut rx: mpsc::Receiver<Event>,
    targets: BTreeSet<PathBuf>,
    reloader: Arc<Reloader>,
    mut cooldown: Cooldown,
) {
    while let Some(event) = rx.recv().await {
        if !is_content_change(&event.kind) {
            continue;
        }
        if !event.paths.iter().any(|p| targets.contains(&absolute(p))) {
            continue;
        }
        if !cooldown.try_begin(Instant::now()) {
            debug!(paths = ?event.paths, "change ignored during reload cool-down");
            continue;
        }

        info!(paths = ?event.paths, "changes detected");
        tokio::time::sleep(cooldown.remaining(Instant::now())).await;
        let mut coalesced = 0usize;
        while rx.try_recv().is_ok() {
            coalesced += 1;
        }
        debug!(coalesced, "rules change burst settled");

        let reloader = Arc::clone(&reloader);
        match tokio::task::spawn_blocking(move || reloader.reload()).await {
            Ok(_) => {}
            Err(e) => warn!(error = %e, "rules reload task failed"),
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    )
}

/// Best-effort absolute form of `path` for comparing watcher paths.
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // A file that is mid-replace may not exist; canonicalize its directory instead.
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
