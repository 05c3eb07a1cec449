use crate::error::{AppError, Result};
use crate::models::track::{UNKNOWN_ARTIST, UNKNOWN_TITLE};
use crate::models::{normalize_duration, CandidateTrack, GeoPoint};
use crate::services::candidate_source::CandidateSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Candidate source backed by a Postgres RPC exposed through the Supabase REST gateway.
#[derive(Debug, Clone)]
pub struct SupabaseCandidateSource {
    base_url: String,
    service_role: String,
    rpc: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct RpcArgs<'a> {
    p_journey_id: &'a str,
    p_lats: Vec<f64>,
    p_lons: Vec<f64>,
    p_limit: usize,
    p_max_km: f64,
}

#[derive(Debug, Deserialize)]
struct RpcCandidate {
    track_id: String,
    #[serde(default)]
    rank: Option<f64>,
    #[allow(dead_code)]
    #[serde(default)]
    distance_km: Option<f64>,
    title: Option<String>,
    duration: Option<f64>,
    tags: Option<Vec<String>>,
    artist_id: String,
    artist_name: Option<String>,
    artist_tags: Option<Vec<String>>,
    artist_lat: Option<f64>,
    artist_lon: Option<f64>,
    score: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct NormalizationStats {
    defaulted_durations: usize,
    converted_from_ms: usize,
}

impl RpcCandidate {
    fn into_candidate(self, stats: &mut NormalizationStats) -> CandidateTrack {
        match self.duration {
            Some(d) if d.is_finite() && d > 1000.0 => stats.converted_from_ms += 1,
            Some(d) if d.is_finite() && d > 0.0 => {}
            _ => stats.defaulted_durations += 1,
        }

        let artist_location = match (self.artist_lat, self.artist_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };

        CandidateTrack {
            track_id: self.track_id,
            title: self.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            duration_seconds: normalize_duration(self.duration),
            tags: self.tags.unwrap_or_default(),
            artist_id: self.artist_id,
            artist_name: self
                .artist_name
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
                .trim()
                .to_string(),
            artist_tags: self.artist_tags.unwrap_or_default(),
            artist_location,
            rank: self.rank.unwrap_or(0.0),
            quality_score: self.score.unwrap_or(0.0),
        }
    }
}

fn normalize_rows(rows: Vec<RpcCandidate>) -> (Vec<CandidateTrack>, NormalizationStats) {
    let mut stats = NormalizationStats::default();
    let tracks = rows.into_iter().map(|row| row.into_candidate(&mut stats)).collect();
    (tracks, stats)
}

impl SupabaseCandidateSource {
    pub fn new(base_url: String, service_role: String, rpc: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role,
            rpc,
            client: Client::new(),
        }
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, self.rpc)
    }
}

#[async_trait]
impl CandidateSource for SupabaseCandidateSource {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn fetch_candidates(
        &self,
        journey_id: &str,
        checkpoints: &[GeoPoint],
        max_radius_km: f64,
        max_results: usize,
    ) -> Result<Vec<CandidateTrack>> {
        let url = self.rpc_url();
        let args = RpcArgs {
            p_journey_id: journey_id,
            p_lats: checkpoints.iter().map(|p| p.lat).collect(),
            p_lons: checkpoints.iter().map(|p| p.lon).collect(),
            p_limit: max_results,
            p_max_km: max_radius_km,
        };

        tracing::debug!("Calling {} within {}km of {} checkpoints", url, max_radius_km, checkpoints.len());

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_role)
            .bearer_auth(&self.service_role)
            .json(&args)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Candidate RPC error: {} - {}", status, body);
            return Err(AppError::ExternalApi(format!(
                "RPC returned status: {} - {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Failed to read response: {}", e)))?;

        let rows: Vec<RpcCandidate> = serde_json::from_str(&body).map_err(|e| {
            AppError::ExternalApi(format!(
                "Failed to parse response: {} - Response: {}",
                e,
                body.chars().take(200).collect::<String>()
            ))
        })?;

        let (tracks, stats) = normalize_rows(rows);
        if stats.defaulted_durations > 0 {
            tracing::warn!(count = stats.defaulted_durations, "Filled missing or invalid durations with defaults");
        }
        if stats.converted_from_ms > 0 {
            tracing::info!(count = stats.converted_from_ms, "Converted durations from milliseconds to seconds");
        }
        tracing::debug!("RPC returned {} candidates at {}km", tracks.len(), max_radius_km);

        Ok(tracks)
    }
}
