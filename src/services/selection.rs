//! Selection Engine
//!
//! Walks the checkpoints in route order and fills each one's time allowance with the cheapest
//! eligible candidates, picking at random among the best few for variety.
//!
//! States:
//! 1. SegmentActive - fill the current checkpoint until its allowance is used or nothing fits
//! 2. AdvanceSegment - move to the next checkpoint without emitting anything
//! 3. Done - total budget spent, checkpoints exhausted, pool empty or stop requested
//!
//! Eligibility is tried in tiers: strict, then without the duplicate-title check, then with a
//! segment overflow allowance. The artist cap and the total budget hold in every tier.

use crate::config::CurationConfig;
use crate::models::{CandidateTrack, GeoPoint, PlaylistItem};
use crate::services::bio::{BioBudget, BioInserter};
use crate::services::route_segmenter::RouteSegments;
use crate::services::scoring::score_candidates;
use crate::services::stop::StopSignal;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Candidates considered after sorting by cost.
pub const SHORTLIST_SIZE: usize = 12;
/// The pick is uniform over this many of the cheapest shortlisted candidates.
pub const PICK_FROM_TOP: usize = 5;

/// Maximum tracks per artist for a route with `segment_count` checkpoints.
pub fn artist_cap(segment_count: usize) -> u32 {
    (segment_count.div_ceil(6) as u32).max(1)
}

/// Request-scoped bookkeeping, created fresh for every selection pass.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    pub used_track_ids: HashSet<String>,
    /// Normalized `artist|title` pairs for meaningful titles.
    pub seen_title_artist_pairs: HashSet<String>,
    /// Keyed by normalized artist name.
    pub artist_play_count: HashMap<String, u32>,
    /// Keyed by artist id.
    pub artists_with_bio: HashSet<String>,
}

impl SelectionState {
    pub fn plays_for(&self, track: &CandidateTrack) -> u32 {
        self.artist_play_count.get(&track.artist_key()).copied().unwrap_or(0)
    }

    fn record(&mut self, track: &CandidateTrack) {
        self.used_track_ids.insert(track.track_id.clone());
        if let Some(pair) = track.title_artist_key() {
            self.seen_title_artist_pairs.insert(pair);
        }
        *self.artist_play_count.entry(track.artist_key()).or_insert(0) += 1;
    }

    fn is_duplicate_title(&self, track: &CandidateTrack) -> bool {
        track
            .title_artist_key()
            .is_some_and(|pair| self.seen_title_artist_pairs.contains(&pair))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTier {
    /// Every constraint enforced.
    Strict,
    /// Duplicate-title check dropped.
    RelaxedTitle,
    /// Segment allowance may be exceeded by the overflow tolerance.
    Overflow,
}

impl SelectionTier {
    pub const ALL: [SelectionTier; 3] = [
        SelectionTier::Strict,
        SelectionTier::RelaxedTitle,
        SelectionTier::Overflow,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Remaining {
    segment: u32,
    total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    SegmentActive { index: usize, limit: u32, used: u32 },
    AdvanceSegment { index: usize },
    Done,
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub items: Vec<PlaylistItem>,
    pub state: SelectionState,
    /// Seconds consumed by all items.
    pub scheduled_seconds: u32,
    pub artist_cap: u32,
    pub tier_counts: HashMap<SelectionTier, usize>,
    /// A stop request cut the pass short.
    pub interrupted: bool,
}

impl SelectionOutcome {
    pub fn track_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_bio()).count()
    }
}

pub struct SelectionEngine<'a, R: Rng> {
    segments: &'a RouteSegments,
    overflow_tolerance: u32,
    bio: BioInserter,
    rng: &'a mut R,
    stop: Option<&'a StopSignal>,
}

impl<'a, R: Rng> SelectionEngine<'a, R> {
    pub fn new(segments: &'a RouteSegments, config: &CurationConfig, rng: &'a mut R) -> Self {
        Self {
            segments,
            overflow_tolerance: config.segment_overflow_tolerance_seconds,
            bio: BioInserter::new(config.bio_trigger_probability, config.bio_duration_seconds),
            rng,
            stop: None,
        }
    }

    pub fn with_stop(mut self, stop: &'a StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Schedule tracks from `candidates` into at most `total_seconds`.
    pub fn run(mut self, candidates: &[CandidateTrack], total_seconds: u32) -> SelectionOutcome {
        let cap = artist_cap(self.segments.len());
        let mut outcome = SelectionOutcome {
            items: Vec::new(),
            state: SelectionState::default(),
            scheduled_seconds: 0,
            artist_cap: cap,
            tier_counts: HashMap::new(),
            interrupted: false,
        };

        let mut seen_ids = HashSet::new();
        let mut pool: Vec<&CandidateTrack> = candidates
            .iter()
            .filter(|c| seen_ids.insert(c.track_id.as_str()))
            .collect();

        if pool.is_empty() || self.segments.is_empty() || total_seconds == 0 {
            return outcome;
        }

        info!(
            "Planning playlist over {} segments with artist cap {} ({} candidates, {}s)",
            self.segments.len(),
            cap,
            pool.len(),
            total_seconds
        );

        let mut machine = self.enter_segment(0, total_seconds, 0, &mut outcome);

        loop {
            machine = match machine {
                EngineState::Done => break,
                EngineState::AdvanceSegment { index } => {
                    self.enter_segment(index + 1, total_seconds, outcome.scheduled_seconds, &mut outcome)
                }
                EngineState::SegmentActive { index, limit, used } => {
                    let remaining = Remaining {
                        segment: limit.saturating_sub(used),
                        total: total_seconds.saturating_sub(outcome.scheduled_seconds),
                    };
                    let location = self.segments.checkpoints[index].location;

                    let (chosen, tier) = match self.select_next(&pool, &outcome.state, cap, location, remaining) {
                        Some(pick) => pick,
                        None => {
                            if used == 0 {
                                warn!(
                                    "Segment {}: no suitable tracks found (respecting artist cap)",
                                    index + 1
                                );
                            }
                            machine = EngineState::AdvanceSegment { index };
                            continue;
                        }
                    };

                    outcome.items.push(PlaylistItem::from_track(chosen));
                    outcome.state.record(chosen);
                    *outcome.tier_counts.entry(tier).or_insert(0) += 1;
                    let mut used = used + chosen.duration_seconds;
                    outcome.scheduled_seconds += chosen.duration_seconds;

                    debug!(
                        track_id = %chosen.track_id,
                        title = %chosen.title,
                        artist = %chosen.artist_name,
                        duration = chosen.duration_seconds,
                        artist_count = outcome.state.plays_for(chosen),
                        tier = ?tier,
                        "Added track"
                    );

                    // Same-titled entries are the same song, whatever their ids.
                    let title_key = chosen.has_meaningful_title().then(|| chosen.title_key());
                    pool.retain(|c| {
                        c.track_id != chosen.track_id
                            && title_key.as_ref().map_or(true, |key| c.title_key() != *key)
                    });

                    let budget = BioBudget {
                        segment_remaining: limit.saturating_sub(used),
                        total_remaining: total_seconds.saturating_sub(outcome.scheduled_seconds),
                    };
                    let has_bio = outcome.state.artists_with_bio.contains(&chosen.artist_id);
                    if let Some(bio) = self.bio.maybe_insert(chosen, has_bio, budget, &mut *self.rng) {
                        debug!("Added bio after track for {}", chosen.artist_name);
                        outcome.state.artists_with_bio.insert(chosen.artist_id.clone());
                        used += bio.duration_seconds;
                        outcome.scheduled_seconds += bio.duration_seconds;
                        outcome.items.push(bio);
                    }

                    if outcome.scheduled_seconds >= total_seconds || pool.is_empty() {
                        EngineState::Done
                    } else if used >= limit {
                        EngineState::AdvanceSegment { index }
                    } else {
                        EngineState::SegmentActive { index, limit, used }
                    }
                }
            };
        }

        info!(
            "Assembled playlist: {} items ({} tracks) covering {}s of {}s",
            outcome.items.len(),
            outcome.track_count(),
            outcome.scheduled_seconds,
            total_seconds
        );
        outcome
    }

    fn enter_segment(
        &self,
        index: usize,
        total_seconds: u32,
        scheduled: u32,
        outcome: &mut SelectionOutcome,
    ) -> EngineState {
        if index >= self.segments.len() || scheduled >= total_seconds {
            return EngineState::Done;
        }
        if self.stop.is_some_and(|s| s.is_stopped()) {
            warn!("Selection stopped before segment {}", index + 1);
            outcome.interrupted = true;
            return EngineState::Done;
        }

        let remaining = total_seconds - scheduled;
        let limit = self.segments.checkpoints[index].time_allowance_seconds.min(remaining);
        debug!(
            "Segment {}/{}: limit {}s, remaining {}s",
            index + 1,
            self.segments.len(),
            limit,
            remaining
        );
        EngineState::SegmentActive { index, limit, used: 0 }
    }

    fn select_next<'p>(
        &mut self,
        pool: &[&'p CandidateTrack],
        state: &SelectionState,
        cap: u32,
        location: GeoPoint,
        remaining: Remaining,
    ) -> Option<(&'p CandidateTrack, SelectionTier)> {
        for tier in SelectionTier::ALL {
            let eligible: Vec<&CandidateTrack> = pool
                .iter()
                .copied()
                .filter(|c| self.is_eligible(c, state, cap, remaining, tier))
                .collect();
            if eligible.is_empty() {
                continue;
            }

            let scored = score_candidates(&location, &eligible, &state.artist_play_count);
            let shortlist = &scored[..scored.len().min(SHORTLIST_SIZE)];
            let pick = self.rng.gen_range(0..shortlist.len().min(PICK_FROM_TOP));
            return Some((shortlist[pick].track, tier));
        }
        None
    }

    fn is_eligible(
        &self,
        track: &CandidateTrack,
        state: &SelectionState,
        cap: u32,
        remaining: Remaining,
        tier: SelectionTier,
    ) -> bool {
        if state.used_track_ids.contains(&track.track_id) {
            return false;
        }
        if tier == SelectionTier::Strict && state.is_duplicate_title(track) {
            return false;
        }
        if state.plays_for(track) >= cap {
            return false;
        }
        if track.duration_seconds > remaining.total {
            return false;
        }
        let allowance = match tier {
            SelectionTier::Overflow => self.overflow_tolerance,
            _ => 0,
        };
        track.duration_seconds <= remaining.segment.saturating_add(allowance)
    }
}
