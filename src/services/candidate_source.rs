use crate::error::Result;
use crate::models::{CandidateTrack, GeoPoint};
use async_trait::async_trait;
use std::collections::HashSet;

/// Where candidate tracks come from.
///
/// Implementations return tracks whose artist lies within `max_radius_km` of at least one
/// checkpoint, best preference match first, at most `max_results` of them.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn fetch_candidates(
        &self,
        journey_id: &str,
        checkpoints: &[GeoPoint],
        max_radius_km: f64,
        max_results: usize,
    ) -> Result<Vec<CandidateTrack>>;
}

/// Candidates accumulated over successive radius attempts, unique by track id.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    tracks: Vec<CandidateTrack>,
    ids: HashSet<String>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tracks not seen before and return how many were new.
    pub fn merge(&mut self, batch: Vec<CandidateTrack>) -> usize {
        let before = self.tracks.len();
        for track in batch {
            if self.ids.insert(track.track_id.clone()) {
                self.tracks.push(track);
            }
        }
        self.tracks.len() - before
    }

    pub fn tracks(&self) -> &[CandidateTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
