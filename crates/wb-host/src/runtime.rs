//! Running a session and its host together on tokio.
//!
//! [`TokioScheduler`] backs the session's debounce timers with
//! `tokio::time::sleep` tasks that report back over a channel.
//! [`SessionRuntime`] owns both halves in-process and shuttles messages
//! between them until neither has anything left to say.

use crate::panel::WhiteboardHost;
use crate::workspace::{FileIo, HostUi};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wb_editor::WhiteboardSession;
use wb_editor::input::InputEvent;
use wb_editor::persist::{Scheduler, TimerId};

/// How often the workspace is polled for watch events.
pub const WATCH_POLL: Duration = Duration::from_millis(100);

/// A message exchange that has not settled after this many rounds is
/// abandoned for now; the next pump picks it up again.
const MAX_PUMP_ROUNDS: usize = 32;

/// Timers as spawned sleep tasks. Must be used inside a tokio runtime.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerId>,
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// The scheduler and the receiver fired timer ids arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            next_id: 0,
            tasks: HashMap::new(),
        };
        (scheduler, rx)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.tasks.retain(|_, task| !task.is_finished());
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(id);
        });
        self.tasks.insert(id, task);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}

pub struct SessionRuntime<F: FileIo, U: HostUi> {
    session: WhiteboardSession,
    host: WhiteboardHost<F, U>,
}

impl<F: FileIo, U: HostUi> SessionRuntime<F, U> {
    pub fn new(session: WhiteboardSession, host: WhiteboardHost<F, U>) -> Self {
        Self { session, host }
    }

    pub fn session(&self) -> &WhiteboardSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WhiteboardSession {
        &mut self.session
    }

    pub fn host(&self) -> &WhiteboardHost<F, U> {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut WhiteboardHost<F, U> {
        &mut self.host
    }

    pub fn into_parts(self) -> (WhiteboardSession, WhiteboardHost<F, U>) {
        (self.session, self.host)
    }

    /// Ask the host for the document and load it.
    pub fn start(&mut self) {
        self.session.request_state();
        self.pump();
    }

    /// Deliver messages both ways, plus any pending watch events, until
    /// quiet. Returns how many messages moved.
    pub fn pump(&mut self) -> usize {
        let mut moved = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let commands = self.session.take_outbound();
            let mut round = commands.len();
            for command in commands {
                self.host.handle(command);
            }
            round += self.host.pump_watch();
            let events = self.host.take_events();
            round += events.len();
            for event in events {
                self.session.handle_host_event(event);
            }
            if round == 0 {
                return moved;
            }
            moved += round;
        }
        log::warn!("message pump still busy after {MAX_PUMP_ROUNDS} rounds");
        moved
    }

    pub fn input(&mut self, event: &InputEvent) -> bool {
        let consumed = self.session.handle_input(event);
        self.pump();
        consumed
    }

    pub fn fire(&mut self, id: TimerId) {
        self.session.on_timer(id);
        self.pump();
    }

    /// Serve until `shutdown` resolves or the input channel closes, then
    /// write out anything unsaved.
    pub async fn run(
        mut self,
        mut timers: mpsc::UnboundedReceiver<TimerId>,
        mut input: mpsc::UnboundedReceiver<InputEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Self {
        tokio::pin!(shutdown);
        let mut poll = tokio::time::interval(WATCH_POLL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("shutting down");
                    break;
                }
                Some(id) = timers.recv() => self.fire(id),
                event = input.recv() => match event {
                    Some(event) => {
                        self.input(&event);
                    }
                    None => {
                        log::debug!("input closed");
                        break;
                    }
                },
                _ = poll.tick() => {
                    self.pump();
                }
            }
        }

        self.session.force_save();
        self.pump();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn timers_fire_in_due_order() {
        let (mut timers, mut fired) = TokioScheduler::new();
        let late = timers.schedule(Duration::from_millis(500));
        let early = timers.schedule(Duration::from_millis(100));
        let cancelled = timers.schedule(Duration::from_millis(300));
        timers.cancel(cancelled);

        assert_eq!(fired.recv().await, Some(early));
        assert_eq!(fired.recv().await, Some(late));
        drop(timers);
        assert_eq!(fired.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_timer() {
        let (mut timers, mut fired) = TokioScheduler::new();
        let first = timers.schedule(Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(200)).await;
        timers.cancel(first);
        let second = timers.schedule(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        assert_eq!(fired.recv().await, Some(second));
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
