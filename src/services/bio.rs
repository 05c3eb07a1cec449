use crate::models::{CandidateTrack, PlaylistItem};
use rand::Rng;

/// Time left when a bio is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BioBudget {
    pub segment_remaining: u32,
    pub total_remaining: u32,
}

/// Decides whether a spoken artist biography follows an accepted track.
///
/// Each artist gets at most one bio; the caller tracks which artists already have one.
#[derive(Debug, Clone, Copy)]
pub struct BioInserter {
    probability: f64,
    duration_seconds: u32,
}

impl BioInserter {
    pub fn new(probability: f64, duration_seconds: u32) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            duration_seconds,
        }
    }

    pub fn maybe_insert<R: Rng>(
        &self,
        track: &CandidateTrack,
        artist_has_bio: bool,
        budget: BioBudget,
        rng: &mut R,
    ) -> Option<PlaylistItem> {
        if artist_has_bio {
            return None;
        }
        if rng.gen::<f64>() >= self.probability {
            return None;
        }
        if self.duration_seconds > budget.segment_remaining || self.duration_seconds > budget.total_remaining {
            tracing::debug!(
                "Bio for {} skipped, {}s does not fit (segment {}s, total {}s)",
                track.artist_name,
                self.duration_seconds,
                budget.segment_remaining,
                budget.total_remaining
            );
            return None;
        }
        Some(PlaylistItem::bio_for(track, self.duration_seconds))
    }
}
