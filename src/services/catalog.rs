//! In-memory candidate source
//!
//! Ranks a local catalog against the journey's preference tags. A track qualifies when its
//! artist is within the search radius of any checkpoint and its tag set differs from the
//! preferences by at most `max_tag_diff` tags (symmetric difference).

use crate::error::Result;
use crate::models::track::{UNKNOWN_ARTIST, UNKNOWN_TITLE};
use crate::models::{normalize_duration, CandidateTrack, GeoPoint};
use crate::services::candidate_source::CandidateSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTrack {
    pub track_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Seconds, or milliseconds when above 1000.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub artist_id: String,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub artist_tags: Vec<String>,
    #[serde(default)]
    pub artist_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    pub tracks: Vec<CatalogTrack>,
    /// Preference tags per journey id.
    #[serde(default)]
    pub journeys: HashMap<String, Vec<String>>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

fn tag_set(tags: &[String]) -> HashSet<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug)]
struct Match<'a> {
    track: &'a CatalogTrack,
    diff: usize,
    inter: usize,
    size: usize,
    nearest_km: f64,
}

impl Match<'_> {
    fn order(&self, other: &Self) -> Ordering {
        self.diff
            .cmp(&other.diff)
            .then_with(|| other.inter.cmp(&self.inter))
            .then_with(|| self.size.cmp(&other.size))
            .then_with(|| self.nearest_km.total_cmp(&other.nearest_km))
            .then_with(|| self.track.track_id.cmp(&other.track.track_id))
    }
}

pub struct CatalogCandidateSource {
    catalog: Catalog,
    max_tag_diff: usize,
}

impl CatalogCandidateSource {
    pub fn new(catalog: Catalog, max_tag_diff: usize) -> Self {
        Self {
            catalog,
            max_tag_diff,
        }
    }

    /// Ranked candidates for `journey_id` around `checkpoints`.
    pub fn rank(
        &self,
        journey_id: &str,
        checkpoints: &[GeoPoint],
        max_radius_km: f64,
        max_results: usize,
    ) -> Vec<CandidateTrack> {
        let preferences = self
            .catalog
            .journeys
            .get(journey_id)
            .map(|tags| tag_set(tags))
            .unwrap_or_default();

        if preferences.is_empty() {
            tracing::debug!("Journey {} has no stored preferences, not filtering by tags", journey_id);
        }

        let mut matches: Vec<Match> = self
            .catalog
            .tracks
            .iter()
            .filter_map(|track| {
                let location = track.artist_location?;
                let nearest_km = checkpoints
                    .iter()
                    .map(|c| c.distance_km(&location))
                    .fold(f64::INFINITY, f64::min);
                if nearest_km > max_radius_km {
                    return None;
                }

                let tags = tag_set(&track.tags);
                let (diff, inter) = if preferences.is_empty() {
                    (0, 0)
                } else {
                    let inter = tags.intersection(&preferences).count();
                    (preferences.len() + tags.len() - 2 * inter, inter)
                };
                if diff > self.max_tag_diff {
                    return None;
                }

                Some(Match {
                    track,
                    diff,
                    inter,
                    size: tags.len(),
                    nearest_km,
                })
            })
            .collect();

        matches.sort_by(|a, b| a.order(b));
        matches.truncate(max_results);

        matches
            .into_iter()
            .enumerate()
            .map(|(position, m)| CandidateTrack {
                track_id: m.track.track_id.clone(),
                title: m.track.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                duration_seconds: normalize_duration(m.track.duration),
                tags: m.track.tags.clone(),
                artist_id: m.track.artist_id.clone(),
                artist_name: m
                    .track
                    .artist_name
                    .as_deref()
                    .unwrap_or(UNKNOWN_ARTIST)
                    .trim()
                    .to_string(),
                artist_tags: m.track.artist_tags.clone(),
                artist_location: m.track.artist_location,
                rank: (position + 1) as f64,
                quality_score: (self.max_tag_diff as f64 - m.diff as f64) * 100.0 + m.inter as f64 * 10.0
                    - m.size as f64,
            })
            .collect()
    }
}

#[async_trait]
impl CandidateSource for CatalogCandidateSource {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn fetch_candidates(
        &self,
        journey_id: &str,
        checkpoints: &[GeoPoint],
        max_radius_km: f64,
        max_results: usize,
    ) -> Result<Vec<CandidateTrack>> {
        Ok(self.rank(journey_id, checkpoints, max_radius_km, max_results))
    }
}
