use serde::{Deserialize, Serialize};

use crate::annotation::collection::{AnnotationCollection, LockState};

/// An independently coded track: the shared context or one of two subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Global,
    Purple,
    Yellow,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Global, Channel::Purple, Channel::Yellow];

    pub fn index(self) -> usize {
        match self {
            Channel::Global => 0,
            Channel::Purple => 1,
            Channel::Yellow => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Global => "global",
            Channel::Purple => "purple",
            Channel::Yellow => "yellow",
        }
    }

    /// Key used in annotation files. The shared track is stored as `general`.
    pub fn file_key(self) -> &'static str {
        match self {
            Channel::Global => "general",
            Channel::Purple => "purple",
            Channel::Yellow => "yellow",
        }
    }

    pub fn from_file_key(key: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.file_key() == key)
    }
}

/// Command target. `Both` addresses the two subject channels at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Global,
    Purple,
    Yellow,
    Both,
}

impl Stream {
    pub fn from_name(name: &str) -> Option<Stream> {
        match name {
            "global" => Some(Stream::Global),
            "purple" => Some(Stream::Purple),
            "yellow" => Some(Stream::Yellow),
            "both" => Some(Stream::Both),
            _ => None,
        }
    }

    pub fn channels(self) -> &'static [Channel] {
        match self {
            Stream::Global => &[Channel::Global],
            Stream::Purple => &[Channel::Purple],
            Stream::Yellow => &[Channel::Yellow],
            Stream::Both => &[Channel::Purple, Channel::Yellow],
        }
    }
}

/// One collection per channel.
#[derive(Debug, Clone)]
pub struct AnnotationSet {
    collections: [AnnotationCollection; 3],
}

impl Default for AnnotationSet {
    fn default() -> Self {
        Self::new(LockState::Unlocked)
    }
}

impl AnnotationSet {
    pub fn new(default_lock: LockState) -> Self {
        Self {
            collections: [
                AnnotationCollection::new(default_lock),
                AnnotationCollection::new(default_lock),
                AnnotationCollection::new(default_lock),
            ],
        }
    }

    pub fn get(&self, channel: Channel) -> &AnnotationCollection {
        &self.collections[channel.index()]
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut AnnotationCollection {
        &mut self.collections[channel.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &AnnotationCollection)> {
        Channel::ALL.into_iter().zip(self.collections.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Channel, &mut AnnotationCollection)> {
        Channel::ALL.into_iter().zip(self.collections.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.collections.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.iter().all(|c| c.is_empty())
    }

    pub fn clear(&mut self) {
        for collection in &mut self.collections {
            collection.clear();
        }
    }
}
