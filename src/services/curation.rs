use crate::config::CurationConfig;
use crate::error::{AppError, Result};
use crate::models::{CurationRequest, PlaylistItem};
use crate::services::candidate_source::{CandidatePool, CandidateSource};
use crate::services::route_segmenter::segment_route;
use crate::services::selection::{SelectionEngine, SelectionOutcome};
use crate::services::stop::StopSignal;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// One pass of the radius expansion loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusAttempt {
    pub radius_km: f64,
    /// Rows returned by the source at this radius.
    pub fetched: usize,
    /// Rows not already in the pool.
    pub new_candidates: usize,
    pub pool_size: usize,
    pub items: usize,
    pub fill_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationOutcome {
    pub playlist: Vec<PlaylistItem>,
    pub fill_percentage: f64,
    /// Radius of the last attempt that ran.
    pub radius_km: f64,
    pub candidate_pool_size: usize,
    pub attempts: Vec<RadiusAttempt>,
    /// Stopped by cancellation or timeout before a normal finish.
    pub cancelled: bool,
}

/// Scheduled seconds of `items` as a percentage of `total_seconds`.
pub fn fill_percentage(items: &[PlaylistItem], total_seconds: u32) -> f64 {
    if total_seconds == 0 {
        return 0.0;
    }
    let scheduled: u64 = items.iter().map(|i| u64::from(i.duration_seconds)).sum();
    scheduled as f64 / f64::from(total_seconds) * 100.0
}

/// Widens the candidate search radius until the playlist is full enough.
pub struct CurationEngine {
    source: Arc<dyn CandidateSource>,
    config: CurationConfig,
}

impl CurationEngine {
    pub fn new(source: Arc<dyn CandidateSource>, config: CurationConfig) -> Self {
        Self { source, config }
    }

    pub async fn curate<R: Rng + Send>(
        &self,
        request: &CurationRequest,
        rng: &mut R,
        stop: &StopSignal,
    ) -> Result<CurationOutcome> {
        request.validate_request()?;
        self.config
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let total_seconds = request.total_seconds();
        let segments = segment_route(&request.points, total_seconds, self.config.segment_window_seconds);
        let checkpoints = segments.locations();

        tracing::info!(
            "Curating journey {}: {}s over {} route points, {} checkpoints of {}s",
            request.journey_id,
            total_seconds,
            request.points.len(),
            segments.len(),
            segments.per_segment_seconds
        );

        let mut pool = CandidatePool::new();
        let mut attempts: Vec<RadiusAttempt> = Vec::new();
        let mut best: Option<SelectionOutcome> = None;
        let mut cancelled = false;
        let mut radius = self.config.initial_radius_km.min(self.config.max_radius_km);

        loop {
            if stop.is_stopped() {
                cancelled = true;
                break;
            }

            tracing::info!("Fetching candidates from {} within {}km", self.source.name(), radius);
            let fetch = self.source.fetch_candidates(
                &request.journey_id,
                &checkpoints,
                radius,
                self.config.max_candidates_per_fetch,
            );
            let fetched = tokio::select! {
                biased;
                _ = stop.stopped() => None,
                result = fetch => Some(result),
            };

            let batch = match fetched {
                None => {
                    tracing::warn!("Curation stopped while fetching at {}km", radius);
                    cancelled = true;
                    break;
                }
                Some(Ok(batch)) => batch,
                Some(Err(e)) => {
                    tracing::warn!("Candidate fetch at {}km failed, continuing without it: {}", radius, e);
                    Vec::new()
                }
            };

            let fetched_count = batch.len();
            let new_candidates = pool.merge(batch);

            let selection = SelectionEngine::new(&segments, &self.config, &mut *rng)
                .with_stop(stop)
                .run(pool.tracks(), total_seconds);
            let fill = fill_percentage(&selection.items, total_seconds);

            tracing::info!(
                radius_km = radius,
                fetched = fetched_count,
                new_candidates,
                pool_size = pool.len(),
                items = selection.items.len(),
                fill_percentage = fill,
                "Radius attempt complete"
            );
            attempts.push(RadiusAttempt {
                radius_km: radius,
                fetched: fetched_count,
                new_candidates,
                pool_size: pool.len(),
                items: selection.items.len(),
                fill_percentage: fill,
            });

            let interrupted = selection.interrupted;
            // A run cut short keeps the earlier playlist if that one was fuller.
            let keep = match &best {
                Some(previous) if interrupted => selection.scheduled_seconds > previous.scheduled_seconds,
                _ => true,
            };
            if keep {
                best = Some(selection);
            }

            if interrupted {
                cancelled = true;
                break;
            }
            if fill >= self.config.fill_threshold_percent || radius >= self.config.max_radius_km {
                break;
            }
            radius = (radius + self.config.radius_increment_km).min(self.config.max_radius_km);
        }

        let playlist = best.map(|s| s.items).unwrap_or_default();
        let fill = fill_percentage(&playlist, total_seconds);
        let final_radius = attempts.last().map(|a| a.radius_km).unwrap_or(radius);

        if fill < self.config.fill_threshold_percent {
            tracing::warn!(
                "Playlist for journey {} only reached {:.1}% fill at {}km",
                request.journey_id,
                fill,
                final_radius
            );
        }
        tracing::info!(
            journey_id = %request.journey_id,
            fill_percentage = fill,
            radius_km = final_radius,
            candidate_pool_size = pool.len(),
            attempts = attempts.len(),
            cancelled,
            "Curation finished with {} items",
            playlist.len()
        );

        Ok(CurationOutcome {
            playlist,
            fill_percentage: fill,
            radius_km: final_radius,
            candidate_pool_size: pool.len(),
            attempts,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateTrack, GeoPoint};
    use crate::services::selection::artist_cap;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Responder = Box<dyn Fn(usize, f64) -> Option<Result<Vec<CandidateTrack>>> + Send + Sync>;

    /// Answers each call through `respond(call_index, radius)`; `None` never resolves.
    struct FakeSource {
        calls: AtomicUsize,
        respond: Responder,
    }

    impl FakeSource {
        fn new(respond: impl Fn(usize, f64) -> Option<Result<Vec<CandidateTrack>>> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                respond: Box::new(respond),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CandidateSource for FakeSource {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_candidates(
            &self,
            _journey_id: &str,
            _checkpoints: &[GeoPoint],
            max_radius_km: f64,
            _max_results: usize,
        ) -> Result<Vec<CandidateTrack>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match (self.respond)(call, max_radius_km) {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn track(id: usize, duration: u32) -> CandidateTrack {
        CandidateTrack {
            track_id: format!("t{}", id),
            title: format!("Track {}", id),
            duration_seconds: duration,
            tags: vec!["indie".to_string()],
            artist_id: format!("a{}", id),
            artist_name: format!("Artist {}", id),
            artist_tags: vec![],
            // Within a few km of the route start.
            artist_location: Some(GeoPoint::new(45.0 + id as f64 * 0.003, 7.0)),
            rank: (id + 1) as f64,
            quality_score: 100.0 - id as f64,
        }
    }

    fn request(duration: f64) -> CurationRequest {
        CurationRequest {
            journey_id: "journey-1".to_string(),
            points: vec![GeoPoint::new(45.0, 7.0), GeoPoint::new(45.02, 7.01)],
            duration_seconds: duration,
        }
    }

    fn quiet_config() -> CurationConfig {
        CurationConfig {
            bio_trigger_probability: 0.0,
            ..CurationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_nearby_candidates_fill_first_attempt() {
        // Ten tracks averaging 200s.
        let source = FakeSource::new(|_, _| {
            Some(Ok((0..10).map(|i| track(i, if i % 2 == 0 { 150 } else { 250 })).collect()))
        });
        let engine = CurationEngine::new(source.clone(), quiet_config());

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = engine
                .curate(&request(1200.0), &mut rng, &StopSignal::never())
                .await
                .unwrap();

            assert!(outcome.fill_percentage >= 80.0, "fill {}", outcome.fill_percentage);
            assert_eq!(outcome.attempts.len(), 1);
            assert_eq!(outcome.radius_km, 30.0);
            assert!(!outcome.cancelled);

            let mut per_artist: HashMap<&str, u32> = HashMap::new();
            for item in &outcome.playlist {
                *per_artist.entry(item.artist.as_str()).or_insert(0) += 1;
            }
            assert!(per_artist.values().all(|&n| n <= artist_cap(4)));
        }
        assert_eq!(source.calls(), 10);
    }

    #[tokio::test]
    async fn test_no_candidates_anywhere_yields_empty_playlist() {
        let source = FakeSource::new(|_, _| Some(Ok(Vec::new())));
        let engine = CurationEngine::new(source.clone(), CurationConfig::default());
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = engine
            .curate(&request(900.0), &mut rng, &StopSignal::never())
            .await
            .unwrap();

        assert!(outcome.playlist.is_empty());
        assert_eq!(outcome.fill_percentage, 0.0);
        let radii: Vec<f64> = outcome.attempts.iter().map(|a| a.radius_km).collect();
        assert_eq!(radii, vec![30.0, 50.0, 70.0, 90.0, 110.0, 130.0, 150.0]);
        assert_eq!(source.calls(), 7);
    }

    #[tokio::test]
    async fn test_failing_source_is_treated_as_empty() {
        let source = FakeSource::new(|call, _| {
            if call == 0 {
                Some(Err(AppError::ExternalApi("connection reset".to_string())))
            } else {
                Some(Ok((0..10).map(|i| track(i, 200)).collect()))
            }
        });
        let engine = CurationEngine::new(source.clone(), quiet_config());
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = engine
            .curate(&request(600.0), &mut rng, &StopSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.attempts[0].fetched, 0);
        assert_eq!(outcome.attempts[1].radius_km, 50.0);
        assert!(!outcome.playlist.is_empty());
    }

    #[tokio::test]
    async fn test_radius_and_pool_grow_monotonically() {
        // Each wider radius reveals two more tracks, re-sending the closer ones.
        let source = FakeSource::new(|_, radius| {
            let visible = ((radius - 10.0) / 10.0) as usize;
            Some(Ok((0..visible).map(|i| track(i, 200)).collect()))
        });
        let engine = CurationEngine::new(source, quiet_config());
        let mut rng = StdRng::seed_from_u64(9);

        let outcome = engine
            .curate(&request(3600.0), &mut rng, &StopSignal::never())
            .await
            .unwrap();

        assert!(outcome.attempts.len() > 1);
        for pair in outcome.attempts.windows(2) {
            assert!(pair[1].radius_km > pair[0].radius_km);
            assert!(pair[1].pool_size >= pair[0].pool_size);
            assert_eq!(pair[1].pool_size, pair[0].pool_size + pair[1].new_candidates);
        }
        assert!(outcome.radius_km <= 150.0);
        assert_eq!(outcome.candidate_pool_size, outcome.attempts.last().unwrap().pool_size);
    }

    #[tokio::test]
    async fn test_last_step_is_clamped_to_ceiling() {
        let source = FakeSource::new(|_, _| Some(Ok(Vec::new())));
        let config = CurationConfig {
            initial_radius_km: 140.0,
            ..CurationConfig::default()
        };
        let engine = CurationEngine::new(source, config);
        let mut rng = StdRng::seed_from_u64(2);

        let outcome = engine
            .curate(&request(600.0), &mut rng, &StopSignal::never())
            .await
            .unwrap();
        let radii: Vec<f64> = outcome.attempts.iter().map(|a| a.radius_km).collect();
        assert_eq!(radii, vec![140.0, 150.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_partial_playlist() {
        // The first radius yields one track, the wider fetch hangs.
        let source = FakeSource::new(|call, _| (call == 0).then(|| Ok(vec![track(0, 200)])));
        let engine = CurationEngine::new(source.clone(), quiet_config());
        let mut rng = StdRng::seed_from_u64(4);
        let stop = StopSignal::with_timeout(CancellationToken::new(), Duration::from_secs(25));

        let outcome = engine.curate(&request(1800.0), &mut rng, &stop).await.unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.playlist.len(), 1);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = FakeSource::new(|_, _| Some(Ok(vec![track(0, 200)])));
        let engine = CurationEngine::new(source.clone(), quiet_config());
        let token = CancellationToken::new();
        token.cancel();
        let mut rng = StdRng::seed_from_u64(4);

        let outcome = engine
            .curate(&request(600.0), &mut rng, &StopSignal::new(token))
            .await
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.playlist.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_fetching() {
        let source = FakeSource::new(|_, _| Some(Ok(Vec::new())));
        let engine = CurationEngine::new(source.clone(), CurationConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let mut bad = request(600.0);
        bad.points.truncate(1);

        let err = engine
            .curate(&bad, &mut rng, &StopSignal::never())
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_fill_percentage() {
        let items: Vec<PlaylistItem> = [200, 100]
            .iter()
            .enumerate()
            .map(|(i, &d)| PlaylistItem::from_track(&track(i, d)))
            .collect();
        assert_eq!(fill_percentage(&items, 600), 50.0);
        assert_eq!(fill_percentage(&items, 0), 0.0);
        assert_eq!(fill_percentage(&[], 600), 0.0);
    }
}
