//! Concurrent intake of newline-delimited watch events.
//!
//! Each line is one watch event. Events for distinct objects run
//! concurrently on a bounded task set. Events for one object run one at a
//! time in arrival order: the read loop keeps a queue per object and starts
//! the next event only when the previous one has finished, including any
//! redelivery of a deferred event. Reading pauses while too many events are
//! outstanding.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use reporting_engine::{DispatchOutcome, Dispatcher, WatchEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Outstanding events allowed per dispatch permit before reading pauses.
const BACKLOG_PER_PERMIT: usize = 16;

/// Redelivery policy for deferred events.
#[derive(Debug, Clone, Copy)]
pub struct DeferPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

/// Counts of final outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub skipped: usize,
    /// Still deferred after the last attempt.
    pub abandoned: usize,
    pub failed: usize,
    /// Lines that were not watch events.
    pub malformed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Applied => self.applied += 1,
            DispatchOutcome::Skipped(_) => self.skipped += 1,
            DispatchOutcome::Deferred(_) => self.abandoned += 1,
            DispatchOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Per-object FIFO of events waiting behind the one in flight.
///
/// A key is present exactly while an event for that object is in flight and
/// is removed once its queue drains.
#[derive(Debug, Default)]
struct ObjectQueues {
    waiting: HashMap<String, VecDeque<WatchEvent>>,
    outstanding: usize,
}

impl ObjectQueues {
    /// Accept an event. Returns it back when it can start right away.
    fn admit(&mut self, key: String, event: WatchEvent) -> Option<WatchEvent> {
        self.outstanding += 1;
        match self.waiting.entry(key) {
            Entry::Occupied(mut queue) => {
                queue.get_mut().push_back(event);
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::new());
                Some(event)
            }
        }
    }

    /// The in-flight event of `key` finished. Returns the next one to start.
    fn complete(&mut self, key: &str) -> Option<WatchEvent> {
        self.outstanding = self.outstanding.saturating_sub(1);
        let next = self.waiting.get_mut(key)?.pop_front();
        if next.is_none() {
            self.waiting.remove(key);
        }
        next
    }

    fn outstanding(&self) -> usize {
        self.outstanding
    }

    #[cfg(test)]
    fn objects(&self) -> usize {
        self.waiting.len()
    }
}

/// Tasks in flight and the object each one belongs to.
struct InFlight {
    tasks: JoinSet<DispatchOutcome>,
    keys: HashMap<Id, String>,
    queues: ObjectQueues,
}

pub struct EventRunner {
    dispatcher: Arc<Dispatcher>,
    permits: Arc<Semaphore>,
    policy: DeferPolicy,
    backlog: usize,
}

impl EventRunner {
    pub fn new(dispatcher: Arc<Dispatcher>, max_concurrent: usize, policy: DeferPolicy) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            dispatcher,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            policy,
            backlog: max_concurrent * BACKLOG_PER_PERMIT,
        }
    }

    /// Read events until end of input and wait for all of them to finish.
    pub async fn run<R>(self: Arc<Self>, reader: R) -> std::io::Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = RunSummary::default();
        let mut flight = InFlight {
            tasks: JoinSet::new(),
            keys: HashMap::new(),
            queues: ObjectQueues::default(),
        };
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: WatchEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed watch event");
                    summary.malformed += 1;
                    continue;
                }
            };

            let key = object_key(&event);
            if let Some(event) = flight.queues.admit(key.clone(), event) {
                self.start(&mut flight, key, event);
            }

            while flight.queues.outstanding() >= self.backlog {
                let Some(done) = flight.tasks.join_next_with_id().await else {
                    break;
                };
                self.finish(&mut flight, &mut summary, done);
            }
        }

        while let Some(done) = flight.tasks.join_next_with_id().await {
            self.finish(&mut flight, &mut summary, done);
        }

        info!(?summary, "Input exhausted");
        Ok(summary)
    }

    fn start(self: &Arc<Self>, flight: &mut InFlight, key: String, event: WatchEvent) {
        let runner = Arc::clone(self);
        let handle = flight
            .tasks
            .spawn(async move { runner.deliver(event).await });
        flight.keys.insert(handle.id(), key);
    }

    fn finish(
        self: &Arc<Self>,
        flight: &mut InFlight,
        summary: &mut RunSummary,
        done: Result<(Id, DispatchOutcome), JoinError>,
    ) {
        let (id, outcome) = match done {
            Ok(finished) => finished,
            Err(e) => {
                error!(error = %e, "Event task panicked");
                (e.id(), DispatchOutcome::Failed(e.to_string()))
            }
        };
        summary.record(&outcome);

        let Some(key) = flight.keys.remove(&id) else {
            return;
        };
        if let Some(next) = flight.queues.complete(&key) {
            self.start(flight, key, next);
        }
    }

    /// Dispatch one event, redelivering it while it defers. Later events for
    /// the same object wait until this returns.
    async fn deliver(&self, event: WatchEvent) -> DispatchOutcome {
        let mut attempt = 1;
        loop {
            let outcome = {
                let Ok(_permit) = self.permits.acquire().await else {
                    return DispatchOutcome::Failed("dispatcher shut down".to_string());
                };
                self.dispatcher.handle_watch_event(event.clone()).await
            };

            if !outcome.is_retryable() {
                return outcome;
            }
            if attempt >= self.policy.max_attempts {
                warn!(attempt, %outcome, "Giving up on deferred event");
                return outcome;
            }
            debug!(attempt, %outcome, delay = ?self.policy.delay, "Redelivering later");
            tokio::time::sleep(self.policy.delay).await;
            attempt += 1;
        }
    }
}

fn object_key(event: &WatchEvent) -> String {
    match event.object_meta() {
        Ok(object) => format!(
            "{}/{}/{}",
            object.kind,
            object.metadata.namespace.unwrap_or_default(),
            object.metadata.name
        ),
        Err(_) => String::new(),
    }
}
