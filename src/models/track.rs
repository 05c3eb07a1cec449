use super::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// Duration assumed for tracks whose source reports nothing usable.
pub const DEFAULT_TRACK_DURATION_SECONDS: u32 = 180;

/// Raw durations above this are taken to be milliseconds.
const MILLISECONDS_THRESHOLD: f64 = 1000.0;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A schedulable track tied to its artist's home location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTrack {
    pub track_id: String,
    pub title: String,
    pub duration_seconds: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub artist_id: String,
    pub artist_name: String,
    #[serde(default)]
    pub artist_tags: Vec<String>,
    pub artist_location: Option<GeoPoint>,
    /// Position in the source's preference ranking, lower is better.
    pub rank: f64,
    /// Source quality score, higher is better.
    pub quality_score: f64,
}

impl CandidateTrack {
    /// Key used for per-artist counting.
    pub fn artist_key(&self) -> String {
        normalize_name(&self.artist_name)
    }

    pub fn title_key(&self) -> String {
        normalize_name(&self.title)
    }

    pub fn has_meaningful_title(&self) -> bool {
        is_meaningful_title(&self.title)
    }

    /// `artist|title` pair, or `None` when the title is a placeholder.
    pub fn title_artist_key(&self) -> Option<String> {
        self.has_meaningful_title()
            .then(|| format!("{}|{}", self.artist_key(), self.title_key()))
    }
}

/// Convert whatever the source reported into whole seconds.
///
/// Non-finite or non-positive values fall back to [`DEFAULT_TRACK_DURATION_SECONDS`]; values
/// above 1000 are milliseconds and are rounded up.
pub fn normalize_duration(raw: Option<f64>) -> u32 {
    match raw {
        Some(value) if value.is_finite() && value > 0.0 => {
            if value > MILLISECONDS_THRESHOLD {
                (value / 1000.0).ceil() as u32
            } else {
                (value.round() as u32).max(1)
            }
        }
        _ => DEFAULT_TRACK_DURATION_SECONDS,
    }
}

/// Lower-case, trimmed, with internal whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn is_meaningful_title(title: &str) -> bool {
    let normalized = normalize_name(title);
    !normalized.is_empty() && normalized != UNKNOWN_TITLE.to_lowercase()
}
