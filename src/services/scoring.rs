//! Candidate scoring
//!
//! Every candidate gets one scalar cost per checkpoint; lower is better. Distance, rank and
//! quality score are normalized against the candidates currently in play for that checkpoint,
//! so the same track can cost differently at different points of the route.

use crate::models::{CandidateTrack, GeoPoint};
use std::collections::HashMap;

/// Share of the cost taken by distance when the artist location is known.
pub const DISTANCE_WEIGHT: f64 = 0.7;
/// Split of the non-distance share between rank and quality score.
pub const RANK_SHARE: f64 = 0.66;
pub const SCORE_SHARE: f64 = 0.34;

pub const ARTIST_PENALTY_STEP: f64 = 0.15;
pub const ARTIST_PENALTY_CAP: f64 = 0.6;

/// Cost used when every candidate has the same quality score.
const NEUTRAL_SCORE_COST: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub distance_km: Option<f64>,
    pub distance: f64,
    pub rank: f64,
    pub score: f64,
    pub artist_penalty: f64,
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub track: &'a CandidateTrack,
    pub cost: CostBreakdown,
}

/// Normalization bounds observed over one candidate set.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    max_distance_km: f64,
    max_rank: f64,
    min_score: f64,
    max_score: f64,
}

impl Bounds {
    fn observe(distances: &[Option<f64>], candidates: &[&CandidateTrack]) -> Self {
        let max_distance_km = distances.iter().flatten().copied().fold(0.0, f64::max);
        let max_rank = candidates.iter().map(|c| c.rank).fold(0.0, f64::max);
        let min_score = candidates
            .iter()
            .map(|c| c.quality_score)
            .fold(f64::INFINITY, f64::min);
        let max_score = candidates
            .iter()
            .map(|c| c.quality_score)
            .fold(f64::NEG_INFINITY, f64::max);

        Self {
            max_distance_km,
            max_rank,
            min_score,
            max_score,
        }
    }

    fn distance_cost(&self, distance_km: Option<f64>) -> f64 {
        match distance_km {
            Some(d) if self.max_distance_km > 0.0 => (d / self.max_distance_km).clamp(0.0, 1.0),
            Some(_) => 0.0,
            None => 1.0,
        }
    }

    fn rank_cost(&self, rank: f64) -> f64 {
        if self.max_rank > 0.0 {
            (rank / self.max_rank).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn score_cost(&self, score: f64) -> f64 {
        let spread = self.max_score - self.min_score;
        if !spread.is_finite() || spread <= f64::EPSILON {
            NEUTRAL_SCORE_COST
        } else {
            (1.0 - (score - self.min_score) / spread).clamp(0.0, 1.0)
        }
    }
}

/// Penalty for artists already scheduled, capped so repeats are discouraged but not banned.
pub fn artist_recency_penalty(prior_selections: u32) -> f64 {
    (f64::from(prior_selections) * ARTIST_PENALTY_STEP).min(ARTIST_PENALTY_CAP)
}

/// Score `candidates` against `checkpoint` and return them cheapest first.
///
/// `artist_counts` is keyed by normalized artist name. Ties keep the input order.
pub fn score_candidates<'a>(
    checkpoint: &GeoPoint,
    candidates: &[&'a CandidateTrack],
    artist_counts: &HashMap<String, u32>,
) -> Vec<ScoredCandidate<'a>> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let distances: Vec<Option<f64>> = candidates
        .iter()
        .map(|c| c.artist_location.map(|loc| checkpoint.distance_km(&loc)))
        .collect();
    let bounds = Bounds::observe(&distances, candidates);

    let mut scored: Vec<ScoredCandidate<'a>> = candidates
        .iter()
        .zip(distances)
        .map(|(&track, distance_km)| {
            let prior = artist_counts.get(&track.artist_key()).copied().unwrap_or(0);
            ScoredCandidate {
                track,
                cost: combine(&bounds, track, distance_km, prior),
            }
        })
        .collect();

    scored.sort_by(|a, b| a.cost.total.total_cmp(&b.cost.total));
    scored
}

fn combine(bounds: &Bounds, track: &CandidateTrack, distance_km: Option<f64>, prior: u32) -> CostBreakdown {
    let distance = bounds.distance_cost(distance_km);
    let rank = bounds.rank_cost(track.rank);
    let score = bounds.score_cost(track.quality_score);
    let artist_penalty = artist_recency_penalty(prior);

    let distance_weight = if distance_km.is_some() { DISTANCE_WEIGHT } else { 0.0 };
    let preference_weight = 1.0 - distance_weight;

    let total = distance_weight * distance
        + preference_weight * (RANK_SHARE * rank + SCORE_SHARE * score)
        + artist_penalty;

    CostBreakdown {
        distance_km,
        distance,
        rank,
        score,
        artist_penalty,
        total,
    }
}
