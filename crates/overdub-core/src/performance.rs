//! Timer-driven replay of an event log into live documents.
//!
//! A performance walks the log in timestamp order, one record per tick,
//! translating each recorded position through the target document's
//! [`OffsetTracker`] before applying it. The stepping core is pure: it knows
//! nothing about wall-clock time beyond computing the delay to the next
//! record, so every timing property is testable without a runtime. The async
//! drivers ([`Performance::run`] and [`Performance::play`]) arm one sleep at
//! a time around that core.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use std::time::Duration;

use overdub_proto::{DocumentId, EventRecord, Payload};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::document::DocumentHost;
use crate::eval::{DiscardSink, EvalSink};
use crate::event_log::EventLog;
use crate::offset_tracker::OffsetTracker;
use crate::takes;

/// Lowest accepted playback speed; keeps every delay finite.
const MIN_PLAYBACK_SPEED: f64 = 0.1;

/// Lifecycle of one performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Tunables for a performance.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    speed: f64,
}

impl PlayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the speed multiplier, clamped to a workable minimum.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.max(MIN_PLAYBACK_SPEED);
        self
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

/// Control messages accepted while a performance plays.
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    Pause,
    Resume,
    SetSpeed(f64),
    Stop,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("performance is {state:?}; playback starts from Idle")]
    NotIdle { state: PlaybackState },
}

/// One replayed record, after position reconciliation.
#[derive(Debug, Clone)]
pub struct AppliedAction {
    /// Document the action landed in (take-qualified when forked).
    pub target: DocumentId,
    pub timestamp: Duration,
    /// Position actually applied at, in current-document coordinates.
    pub position: usize,
    pub payload: Payload,
}

/// Counters accumulated over one performance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub applied: usize,
    pub eval_failures: usize,
}

/// Replays an event log into documents provided by a [`DocumentHost`].
pub struct Performance<H, S = DiscardSink> {
    host: H,
    sink: S,
    config: PlayerConfig,
    state: PlaybackState,
    streams: BTreeMap<DocumentId, VecDeque<EventRecord>>,
    pending: BinaryHeap<Reverse<(Duration, DocumentId)>>,
    trackers: BTreeMap<DocumentId, OffsetTracker>,
    destinations: BTreeMap<DocumentId, DocumentId>,
    used_destinations: BTreeSet<DocumentId>,
    virtual_now: Duration,
    observer: Option<Box<dyn FnMut(&AppliedAction) + Send>>,
    summary: PlaybackSummary,
}

impl<H: DocumentHost> Performance<H> {
    /// Snapshots the log's merged records into per-document streams.
    pub fn new(log: &EventLog, host: H) -> Self {
        let mut streams: BTreeMap<DocumentId, VecDeque<EventRecord>> = BTreeMap::new();
        for record in log.records() {
            streams
                .entry(record.target.clone())
                .or_default()
                .push_back(record.clone());
        }
        let pending = streams
            .iter()
            .filter_map(|(target, queue)| {
                queue
                    .front()
                    .map(|record| Reverse((record.timestamp, target.clone())))
            })
            .collect();
        Self {
            host,
            sink: DiscardSink,
            config: PlayerConfig::default(),
            state: PlaybackState::Idle,
            streams,
            pending,
            trackers: BTreeMap::new(),
            destinations: BTreeMap::new(),
            used_destinations: BTreeSet::new(),
            virtual_now: Duration::ZERO,
            observer: None,
            summary: PlaybackSummary::default(),
        }
    }
}

impl<H: DocumentHost, S: EvalSink> Performance<H, S> {
    /// Swaps the evaluation sink.
    #[must_use]
    pub fn with_sink<S2: EvalSink>(self, sink: S2) -> Performance<H, S2> {
        Performance {
            host: self.host,
            sink,
            config: self.config,
            state: self.state,
            streams: self.streams,
            pending: self.pending,
            trackers: self.trackers,
            destinations: self.destinations,
            used_destinations: self.used_destinations,
            virtual_now: self.virtual_now,
            observer: self.observer,
            summary: self.summary,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs a hook called after every applied action.
    #[must_use]
    pub fn with_observer(mut self, observer: impl FnMut(&AppliedAction) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn speed(&self) -> f64 {
        self.config.speed
    }

    pub fn summary(&self) -> PlaybackSummary {
        self.summary
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Hands the host (and its rendered documents) back.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Destination names this performance has materialized.
    pub fn used_destinations(&self) -> impl Iterator<Item = &DocumentId> {
        self.used_destinations.iter()
    }

    /// Marks a name as an already-performed destination, so a replay
    /// targeting it forks a new take. Seed this from earlier performances.
    pub fn mark_destination_used(&mut self, id: impl Into<DocumentId>) {
        self.used_destinations.insert(id.into());
    }

    /// Registers a user edit on `document` so later replayed positions
    /// account for it. Scheduler-originated edits never come through here.
    pub fn note_live_edit(
        &mut self,
        document: &DocumentId,
        position: usize,
        length: usize,
        is_deletion: bool,
    ) {
        self.trackers
            .entry(document.clone())
            .or_default()
            .record_edit(position, length, is_deletion);
    }

    /// `Idle -> Running`. An empty log finishes immediately.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Idle {
            return Err(PlaybackError::NotIdle { state: self.state });
        }
        if self.pending.is_empty() {
            info!("event log empty; nothing to perform");
            self.state = PlaybackState::Finished;
            return Ok(());
        }
        let records: usize = self.streams.values().map(VecDeque::len).sum();
        info!(
            documents = self.streams.len(),
            records,
            speed = self.config.speed,
            "performance starting"
        );
        self.state = PlaybackState::Running;
        Ok(())
    }

    /// Speed-scaled delay until the next pending record. `None` unless
    /// running.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.state != PlaybackState::Running {
            return None;
        }
        let Reverse((timestamp, _)) = self.pending.peek()?;
        let gap = timestamp.saturating_sub(self.virtual_now);
        Some(Duration::from_secs_f64(
            gap.as_secs_f64() / self.config.speed,
        ))
    }

    /// Applies the next pending record and returns the delay to the one
    /// after it. `None` when the performance is not running or just
    /// finished.
    pub fn step(&mut self) -> Option<Duration> {
        if self.state != PlaybackState::Running {
            debug!(state = ?self.state, "step ignored; performance not running");
            return None;
        }
        let Reverse((timestamp, target)) = self.pending.pop()?;
        let Some(record) = self
            .streams
            .get_mut(&target)
            .and_then(|queue| queue.pop_front())
        else {
            warn!(%target, "pending entry without a stream record");
            return self.after_step();
        };
        self.virtual_now = timestamp;
        if let Some(next) = self.streams.get(&target).and_then(|queue| queue.front()) {
            self.pending.push(Reverse((next.timestamp, target)));
        }
        self.apply(record);
        self.summary.applied += 1;
        self.after_step()
    }

    /// `Running -> Paused`; the read position in the log is kept, not
    /// wall-clock time. A diagnostic no-op in any other state.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Running {
            debug!(state = ?self.state, "pause ignored; performance not running");
            return;
        }
        self.state = PlaybackState::Paused;
        info!(applied = self.summary.applied, "performance paused");
    }

    /// `Paused -> Running`, re-arming from the remembered log position.
    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!(state = ?self.state, "resume ignored; performance not paused");
            return;
        }
        self.state = PlaybackState::Running;
        info!("performance resumed");
    }

    /// Changes speed for delays computed from now on; an already-armed
    /// timer keeps its original duration.
    pub fn set_speed(&mut self, speed: f64) {
        self.config.speed = speed.max(MIN_PLAYBACK_SPEED);
        debug!(speed = self.config.speed, "playback speed changed");
    }

    /// Ends the performance immediately.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Finished {
            return;
        }
        self.state = PlaybackState::Finished;
        info!(applied = self.summary.applied, "performance stopped");
    }

    /// Applies every remaining record without honoring delays.
    pub fn run_to_end(&mut self) -> Result<PlaybackSummary, PlaybackError> {
        if self.state == PlaybackState::Idle {
            self.start()?;
        }
        while self.state == PlaybackState::Running {
            self.step();
        }
        Ok(self.summary)
    }

    /// Plays to completion in real time, honoring speed-scaled delays.
    pub async fn run(&mut self) -> Result<PlaybackSummary, PlaybackError> {
        if self.state == PlaybackState::Idle {
            self.start()?;
        }
        while self.state == PlaybackState::Running {
            match self.next_delay() {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    self.step();
                }
                None => break,
            }
        }
        Ok(self.summary)
    }

    /// Plays in real time while listening for control commands.
    ///
    /// One timer is armed at a time; a command arriving mid-wait is handled
    /// and the same deadline re-armed, so a speed change never rescales the
    /// timer already in flight. When every controller is gone the
    /// performance keeps playing uncontrolled, unless it was left paused, in
    /// which case nothing could ever resume it and it stops.
    pub async fn play(
        &mut self,
        mut commands: mpsc::Receiver<PlayerCommand>,
    ) -> Result<PlaybackSummary, PlaybackError> {
        if self.state == PlaybackState::Idle {
            self.start()?;
        }
        let mut deadline: Option<Instant> = None;
        let mut controls_open = true;
        loop {
            match self.state {
                PlaybackState::Idle | PlaybackState::Finished => break,
                PlaybackState::Paused => {
                    if !controls_open {
                        warn!("paused with every controller gone; stopping");
                        self.stop();
                        break;
                    }
                    match commands.recv().await {
                        Some(command) => self.handle_command(command),
                        None => controls_open = false,
                    }
                }
                PlaybackState::Running => {
                    let Some(delay) = self.next_delay() else { break };
                    let until = match deadline {
                        Some(until) => until,
                        None => {
                            let until = Instant::now() + delay;
                            deadline = Some(until);
                            until
                        }
                    };
                    if controls_open {
                        tokio::select! {
                            () = tokio::time::sleep_until(until) => {
                                deadline = None;
                                self.step();
                            }
                            command = commands.recv() => match command {
                                Some(command) => {
                                    self.handle_command(command);
                                    if self.state != PlaybackState::Running {
                                        deadline = None;
                                    }
                                }
                                None => controls_open = false,
                            }
                        }
                    } else {
                        tokio::time::sleep_until(until).await;
                        deadline = None;
                        self.step();
                    }
                }
            }
        }
        Ok(self.summary)
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Resume => self.resume(),
            PlayerCommand::SetSpeed(speed) => self.set_speed(speed),
            PlayerCommand::Stop => self.stop(),
        }
    }

    fn after_step(&mut self) -> Option<Duration> {
        if self.pending.is_empty() {
            self.state = PlaybackState::Finished;
            info!(applied = self.summary.applied, "performance finished");
            return None;
        }
        self.next_delay()
    }

    fn apply(&mut self, record: EventRecord) {
        let destination = self.destination_for(&record.target);
        let tracker = self.trackers.entry(destination.clone()).or_default();
        let doc = self.host.materialize(&destination);
        let resolved = tracker.resolve(record.position).min(doc.len_chars());
        match &record.payload {
            Payload::Text(text) => {
                if record.length > 0 {
                    // The recorded change replaced a span; replaying removes
                    // the span it replaced before inserting.
                    let replaced = record.length.min(doc.len_chars() - resolved);
                    doc.delete(resolved, replaced);
                    tracker.discount_edit(resolved, replaced, true);
                }
                doc.insert(resolved, text);
                tracker.discount_edit(resolved, text.chars().count(), false);
            }
            Payload::Delete => {
                let removed = record.length.min(doc.len_chars() - resolved);
                if removed > 0 {
                    doc.delete(resolved, removed);
                    tracker.discount_edit(resolved, removed, true);
                }
            }
            Payload::Eval {
                procedure,
                arguments,
            } => {
                if let Err(error) = self.sink.invoke(procedure, arguments) {
                    warn!(%error, "evaluation failed; playback continues");
                    self.summary.eval_failures += 1;
                }
            }
            Payload::Mode(mode) => doc.set_mode(mode),
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(&AppliedAction {
                target: destination,
                timestamp: record.timestamp,
                position: resolved,
                payload: record.payload,
            });
        }
    }

    /// Maps a record's target to the document it lands in, forking a
    /// take-qualified name when the target was already performed.
    fn destination_for(&mut self, target: &DocumentId) -> DocumentId {
        if let Some(existing) = self.destinations.get(target) {
            return existing.clone();
        }
        let destination = if self.used_destinations.contains(target) {
            let fresh = takes::free_take_name(target.as_str(), |candidate| {
                self.used_destinations
                    .contains(&DocumentId::from(candidate))
            });
            info!(
                original = %target,
                take = %fresh,
                "destination already performed; materializing a new take"
            );
            DocumentId::from(fresh)
        } else {
            target.clone()
        };
        self.destinations
            .insert(target.clone(), destination.clone());
        self.used_destinations.insert(destination.clone());
        destination
    }
}
