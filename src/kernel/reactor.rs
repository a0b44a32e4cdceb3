use serde_json::json;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event::{CursorUpdate, PlaybackNotice};
use super::scheduler::{SchedulerHandle, SeekTarget};
use crate::annotation::diff::DiffSummary;
use crate::annotation::store;
use crate::annotation::{AnnotationSession, AnnotationSet};
use crate::command::{Command, Reply};

/// A command plus the channel its reply goes back on.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

impl CommandRequest {
    pub fn new(command: Command) -> (Self, oneshot::Receiver<Reply>) {
        let (reply, rx) = oneshot::channel();
        (Self { command, reply }, rx)
    }
}

/// Receivers the coding thread reacts to.
#[derive(Debug)]
pub struct ReactorInputs {
    pub cursor: mpsc::Receiver<CursorUpdate>,
    pub notices: mpsc::Receiver<PlaybackNotice>,
    pub commands: mpsc::Receiver<CommandRequest>,
}

/// The coding thread: sole owner and writer of the annotation session.
pub struct Reactor {
    session: AnnotationSession,
    scheduler: SchedulerHandle,
    autosave: Option<Duration>,
    last_diff: Option<AnnotationSet>,
}

impl Reactor {
    pub fn new(session: AnnotationSession, scheduler: SchedulerHandle, autosave: Option<Duration>) -> Self {
        Self {
            session,
            scheduler,
            autosave,
            last_diff: None,
        }
    }

    pub fn session(&self) -> &AnnotationSession {
        &self.session
    }

    pub fn into_session(self) -> AnnotationSession {
        self.session
    }

    pub fn handle_cursor(&mut self, update: CursorUpdate) {
        self.session.on_cursor(update);
    }

    pub fn handle_notice(&mut self, notice: PlaybackNotice) {
        debug!("notice: {:?}", notice);
        match notice {
            PlaybackNotice::Loaded { begin, end } => {
                if self.session.bounds() != Some((begin, end)) {
                    self.session.initialize(begin, end);
                }
            }
            PlaybackNotice::Resumed => self.session.on_resume(),
            PlaybackNotice::Finished => {
                info!("End of recording reached at {:.3}", self.session.cursor().secs);
                self.autosave_now();
            }
            PlaybackNotice::Started | PlaybackNotice::Paused | PlaybackNotice::Stopped => {}
        }
    }

    /// Apply one validated command.
    pub fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::Annotation { stream, label } => match self.session.new_annotation(stream, label) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::bad_request(e),
            },
            Command::Pause => {
                self.scheduler.pause();
                Reply::ok()
            }
            Command::Resume => {
                self.scheduler.resume();
                Reply::ok()
            }
            Command::TogglePause => {
                self.scheduler.toggle_pause();
                Reply::with(json!(self.scheduler.is_paused()))
            }
            Command::IsPaused => Reply::with(json!(self.scheduler.is_paused())),
            Command::JumpBy(secs) => self.seek(SeekTarget::By(secs)),
            Command::JumpTo(secs) => self.seek(SeekTarget::To(secs)),
            Command::ClearAll => {
                self.session.reset();
                Reply::ok()
            }
            Command::Save(path) => match self.session.save(path.as_deref()) {
                Ok(Some(written)) => Reply::with(json!(written.display().to_string())),
                Ok(None) => Reply::with(json!(null)),
                Err(e) => Reply::bad_request(e),
            },
            Command::Load(path) => match self.session.load(&path) {
                Ok(()) => Reply::with(json!(self.session.set().len())),
                Err(e) => Reply::bad_request(e),
            },
            Command::Diff(path) => match self.session.diff_against(&path) {
                Ok(diffed) => {
                    let summary = DiffSummary::of(&diffed);
                    info!("Diff against {:?}: {} conflict(s)", path, summary.total_conflicts());
                    self.last_diff = Some(diffed);
                    match serde_json::to_value(&summary) {
                        Ok(body) => Reply::with(body),
                        Err(e) => Reply::bad_request(e),
                    }
                }
                Err(e) => Reply::bad_request(e),
            },
            Command::SaveDiff(path) => match &self.last_diff {
                Some(diffed) => match store::write_file(&path, diffed) {
                    Ok(()) => Reply::with(json!(path.display().to_string())),
                    Err(e) => Reply::bad_request(e),
                },
                None => Reply::bad_request("no diff computed yet"),
            },
        }
    }

    fn seek(&mut self, target: SeekTarget) -> Reply {
        match self.scheduler.seek(target) {
            Some(position) => Reply::with(json!(position.secs)),
            None => Reply::bad_request("playback stopped"),
        }
    }

    fn autosave_now(&mut self) {
        if let Err(e) = self.session.save(None) {
            error!("Autosave failed: {}", e);
        }
    }

    /// Async driver: feeds notifications and commands to the synchronous steps
    /// until cancelled or every input has closed.
    pub async fn run(&mut self, mut inputs: ReactorInputs, shutdown: CancellationToken) {
        info!("Reactor started");

        let period = self.autosave.unwrap_or(Duration::from_secs(3600));
        let mut autosave = interval_at(Instant::now() + period, period);
        autosave.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let autosave_enabled = self.autosave.is_some();

        let mut cursor_open = true;
        let mut notices_open = true;
        let mut commands_open = true;

        while cursor_open || notices_open || commands_open {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Reactor shutting down");
                    break;
                }
                update = inputs.cursor.recv(), if cursor_open => match update {
                    Some(update) => self.handle_cursor(update),
                    None => cursor_open = false,
                },
                notice = inputs.notices.recv(), if notices_open => match notice {
                    Some(notice) => self.handle_notice(notice),
                    None => notices_open = false,
                },
                request = inputs.commands.recv(), if commands_open => match request {
                    Some(CommandRequest { command, reply }) => {
                        let response = self.handle_command(command);
                        if reply.send(response).is_err() {
                            warn!("Command reply dropped: requester went away");
                        }
                    }
                    None => commands_open = false,
                },
                _ = autosave.tick(), if autosave_enabled => self.autosave_now(),
            }
        }

        // Drain what the scheduler published before it exited.
        while let Ok(update) = inputs.cursor.try_recv() {
            self.handle_cursor(update);
        }
        info!("Reactor stopped at cursor {:.3}", self.session.cursor().secs);
    }
}
