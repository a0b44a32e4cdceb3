use serde::{Deserialize, Serialize};
use super::time::Timestamp;

/// Recorded streams the scheduler knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    EnvCamera,
    CameraPurple,
    CameraYellow,
    SandtrayBackground,
    AudioPurple,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::EnvCamera,
        Topic::CameraPurple,
        Topic::CameraYellow,
        Topic::SandtrayBackground,
        Topic::AudioPurple,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Topic::EnvCamera => "env_camera",
            Topic::CameraPurple => "camera_purple",
            Topic::CameraYellow => "camera_yellow",
            Topic::SandtrayBackground => "sandtray_background",
            Topic::AudioPurple => "audio_purple",
        }
    }

    /// `None` for topics outside the known set; those messages are ignored.
    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// One message as stored in a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub topic: Topic,
    pub time: Timestamp,
    pub data: Vec<u8>,
}

/// Distinguishes normal playback advance from a discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorMotion {
    Advance,
    /// Seek, restart or initial positioning. Never a monotonic continuation.
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorUpdate {
    pub time: Timestamp,
    /// Seconds since the session begin.
    pub elapsed: f64,
    pub motion: CursorMotion,
}

/// Payload routed to the renderer of its topic.
#[derive(Debug, Clone)]
pub struct Payload {
    pub topic: Topic,
    pub time: Timestamp,
    pub data: Vec<u8>,
}

/// Lifecycle notices from the scheduler thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackNotice {
    Loaded { begin: Timestamp, end: Timestamp },
    Started,
    Paused,
    Resumed,
    /// Reached the end of the playing range; seeks still restart playback.
    Finished,
    /// Scheduler thread exited after `stop`.
    Stopped,
}
