use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label used when a playlist entry carries no `group-title`
pub const DEFAULT_GROUP: &str = "Uncategorized";

/// Label used when a playlist entry carries neither `tvg-name` nor a display name
pub const DEFAULT_CHANNEL_NAME: &str = "Unknown Channel";

/// A single playable playlist entry
///
/// `id` falls back to the entry's position when the playlist has no `tvg-id`,
/// so it is not guaranteed to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub logo: String,
    pub url: String,
    pub group: String,
}

/// A parsed playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub channels: Vec<Channel>,
    /// Guide location advertised by the header (`x-tvg-url` / `url-tvg`)
    pub guide_url: Option<String>,
}

/// A validated guide entry
///
/// `channel_id` references a [`Channel::id`] but is not enforced: programs may
/// point at channels absent from the current playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channel_id: String,
}

impl Program {
    /// Whether the program is airing at `at`
    pub fn is_airing(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Channels sharing a `group` label, sorted by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub name: String,
    pub channels: Vec<Channel>,
}

/// Everything one load cycle produced, ready for a presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedCatalog {
    pub channels: Vec<Channel>,
    pub groups: Vec<ChannelGroup>,
    pub programs: Vec<Program>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl LoadedCatalog {
    /// Programs scheduled for one channel, in start order
    pub fn programs_for<'a>(&'a self, channel_id: &'a str) -> impl Iterator<Item = &'a Program> + 'a {
        self.programs
            .iter()
            .filter(move |program| program.channel_id == channel_id)
    }
}
