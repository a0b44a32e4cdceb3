//! Static label table: every coding label, its category and its display style.
//!
//! The table is a `static` array built at compile time and never mutated.
//! Lookups are linear scans over a handful of entries.

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Mutually exclusive groupings of labels. At most one label per category is
/// active on a channel at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TaskEngagement,
    SocialEngagement,
    SocialAttitude,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::TaskEngagement,
        Category::SocialEngagement,
        Category::SocialAttitude,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::TaskEngagement => 0,
            Category::SocialEngagement => 1,
            Category::SocialAttitude => 2,
        }
    }

    /// The `OTHER_<category>` sentinel emitted for diff conflicts.
    pub fn conflict_label(self) -> Label {
        match self {
            Category::TaskEngagement => Label::OtherTaskEngagement,
            Category::SocialEngagement => Label::OtherSocialEngagement,
            Category::SocialAttitude => Label::OtherSocialAttitude,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::TaskEngagement => "task_engagement",
            Category::SocialEngagement => "social_engagement",
            Category::SocialAttitude => "social_attitude",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    GoalOriented,
    Aimless,
    AdultSeeking,
    NoPlay,
    OtherTaskEngagement,

    Solitary,
    Onlooker,
    Parallel,
    Associative,
    Cooperative,
    OtherSocialEngagement,

    Prosocial,
    Adversarial,
    Assertive,
    Frustrated,
    Passive,
    OtherSocialAttitude,

    /// Query sentinel: no interval covers the requested time.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelStyle {
    pub color: &'static str,
    pub line: LineStyle,
}

pub const CONFLICT_STYLE: LabelStyle = LabelStyle { color: "#ff0000", line: LineStyle::Solid };

#[derive(Debug, Clone, Copy)]
pub struct LabelEntry {
    pub label: Label,
    pub name: &'static str,
    pub category: Option<Category>,
    pub style: LabelStyle,
}

const fn entry(label: Label, name: &'static str, category: Category, color: &'static str, line: LineStyle) -> LabelEntry {
    LabelEntry { label, name, category: Some(category), style: LabelStyle { color, line } }
}

use Category::{SocialAttitude, SocialEngagement, TaskEngagement};
use LineStyle::{Dashed, Dotted, Solid};

pub static LABELS: [LabelEntry; 18] = [
    entry(Label::GoalOriented, "goaloriented", TaskEngagement, "#4CAF50", Solid),
    entry(Label::Aimless, "aimless", TaskEngagement, "#ff6f00", Solid),
    entry(Label::AdultSeeking, "adultseeking", TaskEngagement, "#E57373", Dashed),
    entry(Label::NoPlay, "noplay", TaskEngagement, "#E3F2FD", Dotted),
    entry(Label::OtherTaskEngagement, "other_task_engagement", TaskEngagement, CONFLICT_STYLE.color, Solid),
    entry(Label::Solitary, "solitary", SocialEngagement, "#9fa8da", Solid),
    entry(Label::Onlooker, "onlooker", SocialEngagement, "#00bcd4", Solid),
    entry(Label::Parallel, "parallel", SocialEngagement, "#e6ee9c", Solid),
    entry(Label::Associative, "associative", SocialEngagement, "#ffeb3b", Solid),
    entry(Label::Cooperative, "cooperative", SocialEngagement, "#ffc107", Solid),
    entry(Label::OtherSocialEngagement, "other_social_engagement", SocialEngagement, CONFLICT_STYLE.color, Solid),
    entry(Label::Prosocial, "prosocial", SocialAttitude, "#4CAF50", Solid),
    entry(Label::Adversarial, "adversarial", SocialAttitude, "#ff6f00", Solid),
    entry(Label::Assertive, "assertive", SocialAttitude, "#26a69a", Solid),
    entry(Label::Frustrated, "frustrated", SocialAttitude, "#9c27b0", Solid),
    entry(Label::Passive, "passive", SocialAttitude, "#E3F2FD", Dotted),
    entry(Label::OtherSocialAttitude, "other_social_attitude", SocialAttitude, CONFLICT_STYLE.color, Solid),
    LabelEntry {
        label: Label::Missing,
        name: "missing",
        category: None,
        style: LabelStyle { color: "#000000", line: Dotted },
    },
];

impl Label {
    fn entry(self) -> &'static LabelEntry {
        // Every variant has exactly one row; the table is checked in tests.
        LABELS
            .iter()
            .find(|e| e.label == self)
            .unwrap_or(&LABELS[LABELS.len() - 1])
    }

    /// Resolve a persisted or transmitted label name. `missing` is a query
    /// sentinel and is never a valid input.
    pub fn from_name(name: &str) -> Result<Label> {
        LABELS
            .iter()
            .find(|e| e.name == name && e.label != Label::Missing)
            .map(|e| e.label)
            .ok_or_else(|| Error::UnknownLabel(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// `None` only for `Missing`.
    pub fn category(self) -> Option<Category> {
        self.entry().category
    }

    pub fn style(self) -> LabelStyle {
        if self.is_conflict() {
            CONFLICT_STYLE
        } else {
            self.entry().style
        }
    }

    pub fn is_conflict(self) -> bool {
        matches!(
            self,
            Label::OtherTaskEngagement | Label::OtherSocialEngagement | Label::OtherSocialAttitude
        )
    }

    /// Labels a coder may pick: everything except the sentinels.
    pub fn is_codable(self) -> bool {
        self != Label::Missing && !self.is_conflict()
    }

    pub fn codable() -> impl Iterator<Item = Label> {
        LABELS.iter().map(|e| e.label).filter(|l| l.is_codable())
    }
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Label::from_name(&name).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
