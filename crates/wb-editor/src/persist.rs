//! Debounced persistence.
//!
//! Every mutating scene event bumps a version counter and re-arms a single
//! debounce timer, so a burst of edits is written once. A save happens only
//! when the scene is dirty and the version moved since the last write;
//! comparing counters stands in for diffing the document.
//!
//! Timers come from an injected [`Scheduler`], so tests drive time with
//! [`ManualScheduler`] instead of sleeping.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wb_core::{SceneModel, WhiteboardDocument};

pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Handle of a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub u64);

/// Cancellable one-shot timers. When a timer fires, the owner of the
/// session calls [`crate::WhiteboardSession::on_timer`] with its id.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Wall clock in Unix milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

// ─── Virtual clock ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ManualState {
    now_ms: i64,
    next_id: u64,
    timers: Vec<(TimerId, i64)>,
}

/// A virtual clock and timer queue. Clones share state, so one handle can
/// be given to a session while the test (or the wasm bridge) keeps another
/// to advance time.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new(start_ms: i64) -> Self {
        let scheduler = Self::default();
        scheduler.state.borrow_mut().now_ms = start_ms;
        scheduler
    }

    /// Move time forward by `ms`, returning every timer that came due, in
    /// due order.
    pub fn advance(&self, ms: i64) -> Vec<TimerId> {
        let target = self.state.borrow().now_ms + ms;
        self.advance_to(target)
    }

    pub fn advance_to(&self, now_ms: i64) -> Vec<TimerId> {
        let mut state = self.state.borrow_mut();
        state.now_ms = state.now_ms.max(now_ms);
        let now = state.now_ms;
        let mut due: Vec<(TimerId, i64)> = Vec::new();
        state.timers.retain(|&(id, at)| {
            if at <= now {
                due.push((id, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(id, at)| (at, id.0));
        due.into_iter().map(|(id, _)| id).collect()
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn now(&self) -> i64 {
        self.state.borrow().now_ms
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let due = state.now_ms + delay.as_millis() as i64;
        state.timers.push((id, due));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.state.borrow_mut().timers.retain(|&(t, _)| t != id);
    }
}

impl Clock for ManualScheduler {
    fn now_ms(&self) -> i64 {
        self.now()
    }
}

// ─── Save coordinator ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SaveCoordinator {
    dirty: bool,
    version: u64,
    last_saved: u64,
    /// The last handed-out snapshot was never written.
    unwritten: bool,
    pending: Option<TimerId>,
    debounce: Duration,
    writes: u64,
}

impl Default for SaveCoordinator {
    fn default() -> Self {
        Self::new(SAVE_DEBOUNCE)
    }
}

impl SaveCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            dirty: false,
            version: 0,
            last_saved: 0,
            unwritten: false,
            pending: None,
            debounce,
            writes: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_saved_version(&self) -> u64 {
        self.last_saved
    }

    pub fn has_pending_timer(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of documents handed out for writing so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Record a mutation and (re)arm the debounce timer.
    pub fn mark_dirty(&mut self, timers: &mut dyn Scheduler) {
        self.dirty = true;
        self.version += 1;
        self.rearm(timers);
    }

    /// Push the pending save back by one debounce interval without bumping
    /// the version.
    pub fn defer(&mut self, timers: &mut dyn Scheduler) {
        self.rearm(timers);
    }

    fn rearm(&mut self, timers: &mut dyn Scheduler) {
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
        self.pending = Some(timers.schedule(self.debounce));
    }

    /// Claim a fired timer. Returns `false` for ids this coordinator no
    /// longer waits on.
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Snapshot the scene if anything changed since the last write.
    pub fn perform_save(&mut self, scene: &SceneModel) -> Option<WhiteboardDocument> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        if self.version == self.last_saved && !self.unwritten {
            return None;
        }
        self.last_saved = self.version;
        self.unwritten = false;
        self.writes += 1;
        log::debug!("saving whiteboard at version {}", self.version);
        Some(scene.serialize())
    }

    /// Cancel the debounce and save right away.
    pub fn force_save(
        &mut self,
        timers: &mut dyn Scheduler,
        scene: &SceneModel,
    ) -> Option<WhiteboardDocument> {
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
        self.perform_save(scene)
    }

    /// The host could not write the last snapshot. The scene stays dirty
    /// so the next edit or forced save writes it again.
    pub fn save_failed(&mut self) {
        self.dirty = true;
        self.unwritten = true;
    }

    /// Forget any pending save, e.g. after a fresh load replaced the scene.
    pub fn reset(&mut self, timers: &mut dyn Scheduler) {
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
        self.dirty = false;
        self.unwritten = false;
        self.last_saved = self.version;
    }
}
