use super::geo::GeoPoint;
use super::track::CandidateTrack;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Track,
    Bio,
}

/// One entry of the produced playlist, in presentation order.
///
/// Only the public response fields are serialized; the ids and the accounted duration stay
/// internal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistItem {
    pub track: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_tags: Option<Vec<String>>,
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(skip)]
    pub track_id: Option<String>,
    #[serde(skip)]
    pub artist_id: String,
    #[serde(skip)]
    pub duration_seconds: u32,
}

impl PlaylistItem {
    pub fn from_track(track: &CandidateTrack) -> Self {
        Self {
            track: track.title.clone(),
            artist: track.artist_name.clone(),
            artist_tags: None,
            location: track.artist_location,
            comment: None,
            kind: ItemKind::Track,
            track_id: Some(track.track_id.clone()),
            artist_id: track.artist_id.clone(),
            duration_seconds: track.duration_seconds,
        }
    }

    /// Spoken biography for the artist of `track`.
    pub fn bio_for(track: &CandidateTrack, duration_seconds: u32) -> Self {
        Self {
            track: String::new(),
            artist: track.artist_name.clone(),
            artist_tags: Some(track.artist_tags.clone()),
            location: track.artist_location,
            comment: Some(format!("Biography of {}", track.artist_name)),
            kind: ItemKind::Bio,
            track_id: None,
            artist_id: track.artist_id.clone(),
            duration_seconds,
        }
    }

    pub fn is_bio(&self) -> bool {
        self.kind == ItemKind::Bio
    }
}
