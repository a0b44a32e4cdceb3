use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::event::{CursorMotion, CursorUpdate, Payload, PlaybackNotice, RecordedMessage, Topic};
use super::source::{EventSource, RecordingFile};
use super::time::{ClockTranslator, Timestamp};
use crate::error::{Error, Result};

/// `jumpto` values below this are offsets from the session begin, larger
/// ones are absolute recording timestamps.
pub const RELATIVE_JUMP_LIMIT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Offset in seconds from the current cursor.
    By(i64),
    /// Negative: session end. Below `RELATIVE_JUMP_LIMIT`: offset from the
    /// session begin. Otherwise an absolute timestamp in seconds.
    To(i64),
    At(Timestamp),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub delivered: u64,
    pub skipped: u64,
    pub restarts: u64,
}

#[derive(Debug)]
struct Control {
    state: PlaybackState,
    paused: bool,
    stop: bool,
    restart: bool,
    pending_jump: Option<Timestamp>,
    cursor: Timestamp,
    begin: Timestamp,
    end: Timestamp,
    session_begin: Timestamp,
    session_end: Timestamp,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            paused: false,
            stop: false,
            restart: false,
            pending_jump: None,
            cursor: Timestamp::default(),
            begin: Timestamp::MIN,
            end: Timestamp::MAX,
            session_begin: Timestamp::default(),
            session_end: Timestamp::default(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable control surface used by the coding thread.
///
/// Pause and resume notices are sent from here so they go out even when the
/// playback loop is idle after `Finished`.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
    notices: mpsc::Sender<PlaybackNotice>,
}

impl SchedulerHandle {
    /// Returns false if playback was already stopped.
    pub fn pause(&self) -> bool {
        let mut control = self.shared.lock();
        if control.stop {
            return false;
        }
        if !control.paused {
            info!("Paused");
            control.paused = true;
            if control.state == PlaybackState::Playing {
                control.state = PlaybackState::Paused;
            }
            self.shared.wake.notify_all();
            drop(control);
            self.announce(PlaybackNotice::Paused);
        }
        true
    }

    pub fn resume(&self) -> bool {
        let mut control = self.shared.lock();
        if control.stop {
            return false;
        }
        if control.paused {
            info!("Resumed");
            control.paused = false;
            if control.state == PlaybackState::Paused {
                control.state = PlaybackState::Playing;
            }
            self.shared.wake.notify_all();
            drop(control);
            self.announce(PlaybackNotice::Resumed);
        }
        true
    }

    fn announce(&self, notice: PlaybackNotice) {
        if let Err(e) = self.notices.try_send(notice) {
            debug!("{:?} notice not delivered: {}", notice, e);
        }
    }

    pub fn toggle_pause(&self) -> bool {
        if self.is_paused() {
            self.resume()
        } else {
            self.pause()
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// Move the cursor and restart playback from there. Returns the clamped
    /// new position, or `None` once stopped.
    pub fn seek(&self, target: SeekTarget) -> Option<Timestamp> {
        let mut control = self.shared.lock();
        if control.stop {
            return None;
        }
        let wanted = match target {
            SeekTarget::By(secs) => control.cursor.offset(secs as f64),
            SeekTarget::To(secs) if secs < 0 => control.session_end,
            SeekTarget::To(secs) if secs < RELATIVE_JUMP_LIMIT => control.session_begin.offset(secs as f64),
            SeekTarget::To(secs) => Timestamp::from_secs(secs as f64),
            SeekTarget::At(time) => time,
        };
        let begin = wanted.clamp_to(control.session_begin, control.session_end);
        debug!("seek {:?} -> {:.3}", target, begin.secs);

        control.begin = begin;
        control.cursor = begin;
        control.pending_jump = Some(begin);
        control.restart = true;
        self.shared.wake.notify_all();
        Some(begin)
    }

    pub fn stop(&self) {
        let mut control = self.shared.lock();
        if !control.stop {
            info!("Stopping playback.");
        }
        control.stop = true;
        control.paused = false;
        self.shared.wake.notify_all();
    }

    pub fn cursor(&self) -> Timestamp {
        self.shared.lock().cursor
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state
    }
}

/// Sending halves, owned by the scheduler thread.
#[derive(Debug)]
pub struct PlaybackOutputs {
    cursor: mpsc::Sender<CursorUpdate>,
    notices: mpsc::Sender<PlaybackNotice>,
    payloads: HashMap<Topic, mpsc::Sender<Payload>>,
}

/// Receiving halves: one bounded channel per notification kind and one per topic.
#[derive(Debug)]
pub struct PlaybackReceivers {
    pub cursor: mpsc::Receiver<CursorUpdate>,
    pub notices: mpsc::Receiver<PlaybackNotice>,
    pub payloads: HashMap<Topic, mpsc::Receiver<Payload>>,
}

pub fn playback_channels(capacity: usize) -> (PlaybackOutputs, PlaybackReceivers) {
    let (cursor_tx, cursor_rx) = mpsc::channel(capacity);
    let (notice_tx, notice_rx) = mpsc::channel(capacity);
    let mut payload_tx = HashMap::new();
    let mut payload_rx = HashMap::new();
    for topic in Topic::ALL {
        let (tx, rx) = mpsc::channel(capacity);
        payload_tx.insert(topic, tx);
        payload_rx.insert(topic, rx);
    }
    (
        PlaybackOutputs { cursor: cursor_tx, notices: notice_tx, payloads: payload_tx },
        PlaybackReceivers { cursor: cursor_rx, notices: notice_rx, payloads: payload_rx },
    )
}

enum Flow {
    Go,
    Restart,
    Stop,
}

/// Replays a recording in real time on a dedicated thread.
///
/// The loop never touches annotation state; it only publishes cursor updates,
/// lifecycle notices and payloads over bounded channels.
pub struct PlaybackScheduler {
    source: Option<Box<dyn EventSource>>,
    shared: Arc<Shared>,
    outputs: PlaybackOutputs,
}

impl PlaybackScheduler {
    pub fn new(outputs: PlaybackOutputs) -> Self {
        Self {
            source: None,
            shared: Arc::new(Shared::default()),
            outputs,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
            notices: self.outputs.notices.clone(),
        }
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(Timestamp, Timestamp)> {
        let source = RecordingFile::open(path)?;
        self.load(Box::new(source))
    }

    /// Install an opened source and reset the playing range to the whole session.
    pub fn load(&mut self, source: Box<dyn EventSource>) -> Result<(Timestamp, Timestamp)> {
        let (begin, end) = source.bounds();
        {
            let mut control = self.shared.lock();
            if matches!(control.state, PlaybackState::Playing | PlaybackState::Paused) {
                return Err(Error::AlreadyRunning);
            }
            control.state = PlaybackState::Loaded;
            control.session_begin = begin;
            control.session_end = end;
            control.begin = begin;
            control.end = end;
            control.cursor = begin;
            control.restart = false;
            control.pending_jump = None;
            control.stop = false;
            control.paused = false;
        }
        self.source = Some(source);
        if self.outputs.notices.try_send(PlaybackNotice::Loaded { begin, end }).is_err() {
            warn!("Loaded notice dropped: notice channel unavailable");
        }
        Ok((begin, end))
    }

    /// Run on a dedicated OS thread named `playback`.
    pub fn spawn(mut self) -> Result<JoinHandle<Result<PlaybackSummary>>> {
        let handle = std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || self.start())?;
        Ok(handle)
    }

    /// Blocking playback loop. Returns once `stop` is requested or every
    /// consumer has gone away.
    pub fn start(&mut self) -> Result<PlaybackSummary> {
        let mut source = self.source.take().ok_or(Error::NotLoaded)?;
        {
            let mut control = self.shared.lock();
            if control.state != PlaybackState::Loaded {
                self.source = Some(source);
                return Err(Error::AlreadyRunning);
            }
            control.state = if control.paused {
                PlaybackState::Paused
            } else {
                PlaybackState::Playing
            };
        }
        info!("Starting to play the recording");
        self.notify(PlaybackNotice::Started);

        let result = self.play(source.as_mut());
        self.source = Some(source);

        self.shared.lock().state = PlaybackState::Stopped;
        self.notify(PlaybackNotice::Stopped);
        match &result {
            Ok(summary) => info!(
                "Playback stopped: {} delivered, {} skipped, {} restarts",
                summary.delivered, summary.skipped, summary.restarts
            ),
            Err(e) => error!("Playback aborted: {}", e),
        }
        result
    }

    fn play(&self, source: &mut dyn EventSource) -> Result<PlaybackSummary> {
        let mut summary = PlaybackSummary::default();
        let mut first_pass = true;

        'session: loop {
            let Some((begin, end)) = self.next_range() else {
                break;
            };
            if !first_pass {
                summary.restarts += 1;
            }
            first_pass = false;

            if !self.publish_cursor(begin, CursorMotion::Jump) {
                break;
            }
            let mut translator = ClockTranslator::new(begin, Instant::now());

            for item in source.read_range(begin, end)? {
                match self.checkpoint(&mut translator) {
                    Flow::Go => {}
                    Flow::Restart => continue 'session,
                    Flow::Stop => break 'session,
                }
                let message = match item {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Skipping undecodable message: {}", e);
                        summary.skipped += 1;
                        continue;
                    }
                };

                while !self.wait_until(translator.translate(message.time)) {
                    match self.checkpoint(&mut translator) {
                        Flow::Go => {}
                        Flow::Restart => continue 'session,
                        Flow::Stop => break 'session,
                    }
                }

                if self.restart_requested() {
                    continue 'session;
                }
                if !self.publish_cursor(message.time, CursorMotion::Advance) {
                    break 'session;
                }
                self.dispatch(message);
                summary.delivered += 1;
            }

            info!("Reached end of range at {:.3}", end.secs);
            self.notify(PlaybackNotice::Finished);
            match self.wait_for_restart() {
                Flow::Stop => break,
                _ => continue,
            }
        }

        Ok(summary)
    }

    /// Take the range to play next, clearing the restart request.
    fn next_range(&self) -> Option<(Timestamp, Timestamp)> {
        let mut control = self.shared.lock();
        if control.stop {
            return None;
        }
        control.restart = false;
        control.pending_jump = None;
        Some((control.begin, control.end))
    }

    fn restart_requested(&self) -> bool {
        self.shared.lock().restart
    }

    /// Honor pause, stop and restart requests. While paused this blocks on the
    /// condition variable, then shifts the translator by the paused duration.
    fn checkpoint(&self, translator: &mut ClockTranslator) -> Flow {
        let mut control = self.shared.lock();

        if control.paused && !control.stop {
            let paused_at = Instant::now();
            loop {
                control = self
                    .shared
                    .wake
                    .wait_while(control, |c| c.paused && !c.stop && c.pending_jump.is_none())
                    .unwrap_or_else(PoisonError::into_inner);

                // A seek while paused moves the cursor right away.
                if let Some(jump) = control.pending_jump.take() {
                    drop(control);
                    self.publish_cursor(jump, CursorMotion::Jump);
                    control = self.shared.lock();
                    continue;
                }
                break;
            }

            translator.shift(paused_at.elapsed());
        }

        if control.stop {
            Flow::Stop
        } else if control.restart {
            Flow::Restart
        } else {
            Flow::Go
        }
    }

    /// Sleep until `deadline`. Returns false if a control request woke us first.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut control = self.shared.lock();
        loop {
            if control.stop || control.restart || control.paused {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            control = self
                .shared
                .wake
                .wait_timeout(control, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn wait_for_restart(&self) -> Flow {
        let control = self.shared.lock();
        let control = self
            .shared
            .wake
            .wait_while(control, |c| !c.stop && !c.restart)
            .unwrap_or_else(PoisonError::into_inner);
        if control.stop {
            Flow::Stop
        } else {
            Flow::Restart
        }
    }

    /// Returns false when the coding thread has hung up.
    fn publish_cursor(&self, time: Timestamp, motion: CursorMotion) -> bool {
        let session_begin = {
            let mut control = self.shared.lock();
            control.cursor = time;
            control.session_begin
        };
        let update = CursorUpdate {
            time,
            elapsed: time.since(session_begin),
            motion,
        };
        if self.outputs.cursor.blocking_send(update).is_err() {
            warn!("Cursor receiver closed; stopping playback");
            self.shared.lock().stop = true;
            return false;
        }
        true
    }

    fn notify(&self, notice: PlaybackNotice) {
        if self.outputs.notices.blocking_send(notice).is_err() {
            debug!("notice {:?} dropped: receiver closed", notice);
        }
    }

    fn dispatch(&self, message: RecordedMessage) {
        let Some(tx) = self.outputs.payloads.get(&message.topic) else {
            return;
        };
        let payload = Payload {
            topic: message.topic,
            time: message.time,
            data: message.data,
        };
        if let Err(mpsc::error::TrySendError::Full(p)) = tx.try_send(payload) {
            debug!("{} renderer lagging; dropped frame at {:.3}", p.topic.name(), p.time.secs);
        }
    }
}
