use crate::error::Result;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Debouncing { deadline: Instant },
}

/// Trailing-edge debounce gate in front of the build. Every change restarts
/// the quiescence window; a build fires once the window elapses untouched.
#[derive(Debug)]
pub struct RebuildScheduler {
    window: Duration,
    state: SchedulerState,
    cycles: u64,
}

impl Default for RebuildScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RebuildScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn notify(&mut self, now: Instant) {
        self.state = SchedulerState::Debouncing {
            deadline: now + self.window,
        };
    }

    /// Returns true, and goes back to idle, when the window has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            SchedulerState::Debouncing { deadline } if now >= deadline => {
                self.state = SchedulerState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Debouncing { deadline } => Some(deadline),
        }
    }

    /// Drives the scheduler from a change channel until every sender is
    /// gone. `build` runs on this thread, so cycles never overlap; changes
    /// made while it runs queue up and start a fresh window afterwards.
    pub fn run<F: FnMut(u64)>(&mut self, events: &Receiver<()>, mut build: F) {
        loop {
            let Some(deadline) = self.next_deadline() else {
                match events.recv() {
                    Ok(()) => self.notify(Instant::now()),
                    Err(_) => return,
                }
                continue;
            };

            let now = Instant::now();
            if self.poll(now) {
                self.fire(&mut build);
                continue;
            }

            match events.recv_timeout(deadline - now) {
                Ok(()) => self.notify(Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    if self.poll(Instant::now()) {
                        self.fire(&mut build);
                    }
                    return;
                }
            }
        }
    }

    fn fire<F: FnMut(u64)>(&mut self, build: &mut F) {
        self.cycles += 1;
        tracing::debug!(cycle = self.cycles, "debounce window elapsed");
        build(self.cycles);
    }
}

/// Forwards create, modify and remove events under the watched paths into
/// a scheduler channel. Watching stops when this is dropped.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    pub fn new(paths: &[&Path], events: Sender<()>) -> Result<Self> {
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) if is_source_change(&event.kind) => {
                    tracing::trace!(paths = ?event.paths, "source changed");
                    let _ = events.send(());
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "watch error"),
            },
            Config::default(),
        )?;

        for path in paths {
            if path.exists() {
                watcher.watch(path, RecursiveMode::Recursive)?;
            } else {
                tracing::warn!(path = %path.display(), "not watching missing path");
            }
        }

        Ok(Self { _watcher: watcher })
    }
}

fn is_source_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
