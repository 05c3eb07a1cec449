use anyhow::Context;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tunables for one curation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CurationConfig {
    /// Starting search radius for the candidate fetch.
    pub initial_radius_km: f64,
    /// Radius ceiling; the last attempt always runs at exactly this value.
    pub max_radius_km: f64,
    pub radius_increment_km: f64,
    /// Checkpoint granularity along the route.
    pub segment_window_seconds: u32,
    pub bio_duration_seconds: u32,
    /// Chance of a bio after each accepted track (0.0 to 1.0).
    pub bio_trigger_probability: f64,
    /// How far a fallback-tier track may run past its segment.
    pub segment_overflow_tolerance_seconds: u32,
    pub fill_threshold_percent: f64,
    pub max_candidates_per_fetch: usize,
    /// Preference-match looseness, only read by candidate sources.
    pub max_tag_symmetric_difference: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            initial_radius_km: 30.0,
            max_radius_km: 150.0,
            radius_increment_km: 20.0,
            segment_window_seconds: 300,
            bio_duration_seconds: 60,
            bio_trigger_probability: 0.10,
            segment_overflow_tolerance_seconds: 30,
            fill_threshold_percent: 80.0,
            max_candidates_per_fetch: 200,
            max_tag_symmetric_difference: 2,
        }
    }
}

impl CurationConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let radii = [self.initial_radius_km, self.max_radius_km, self.radius_increment_km];
        if radii.iter().any(|r| !r.is_finite()) {
            return Err(anyhow::anyhow!("Search radii must be finite numbers"));
        }
        if self.initial_radius_km <= 0.0 {
            return Err(anyhow::anyhow!("INITIAL_RADIUS_KM must be positive"));
        }
        if self.initial_radius_km > self.max_radius_km {
            return Err(anyhow::anyhow!(
                "INITIAL_RADIUS_KM ({}) must not exceed MAX_RADIUS_KM ({})",
                self.initial_radius_km,
                self.max_radius_km
            ));
        }
        if self.radius_increment_km <= 0.0 {
            return Err(anyhow::anyhow!("RADIUS_INCREMENT_KM must be positive"));
        }
        if self.segment_window_seconds == 0 {
            return Err(anyhow::anyhow!("SEGMENT_WINDOW_SECONDS must be positive"));
        }
        if !(0.0..=1.0).contains(&self.bio_trigger_probability) {
            return Err(anyhow::anyhow!(
                "BIO_TRIGGER_PROBABILITY must be between 0 and 1, got {}",
                self.bio_trigger_probability
            ));
        }
        if !self.fill_threshold_percent.is_finite() || self.fill_threshold_percent < 0.0 {
            return Err(anyhow::anyhow!("FILL_THRESHOLD_PERCENT must be a non-negative number"));
        }
        if self.max_candidates_per_fetch == 0 {
            return Err(anyhow::anyhow!("MAX_CANDIDATES must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub supabase_service_role: Option<String>,
    /// Name of the ranked-candidates RPC function.
    pub candidate_rpc: String,
    /// Execution ceiling for a single curation request.
    pub curation_timeout: Duration,
    pub curation: CurationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. `from_env` feeds it the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CurationConfig::default();

        let curation = CurationConfig {
            initial_radius_km: parse_or(&lookup, "INITIAL_RADIUS_KM", defaults.initial_radius_km)?,
            max_radius_km: parse_or(&lookup, "MAX_RADIUS_KM", defaults.max_radius_km)?,
            radius_increment_km: parse_or(&lookup, "RADIUS_INCREMENT_KM", defaults.radius_increment_km)?,
            segment_window_seconds: parse_or(&lookup, "SEGMENT_WINDOW_SECONDS", defaults.segment_window_seconds)?,
            bio_duration_seconds: parse_or(&lookup, "BIO_DURATION_SECONDS", defaults.bio_duration_seconds)?,
            bio_trigger_probability: parse_or(&lookup, "BIO_TRIGGER_PROBABILITY", defaults.bio_trigger_probability)?,
            segment_overflow_tolerance_seconds: parse_or(
                &lookup,
                "SEGMENT_OVERFLOW_TOLERANCE_SECONDS",
                defaults.segment_overflow_tolerance_seconds,
            )?,
            fill_threshold_percent: parse_or(&lookup, "FILL_THRESHOLD_PERCENT", defaults.fill_threshold_percent)?,
            max_candidates_per_fetch: parse_or(&lookup, "MAX_CANDIDATES", defaults.max_candidates_per_fetch)?,
            max_tag_symmetric_difference: parse_or(&lookup, "MAX_TAG_DIFF", defaults.max_tag_symmetric_difference)?,
        };
        curation.validate()?;

        let timeout_secs: u64 = parse_or(&lookup, "CURATION_TIMEOUT_SECONDS", 25)?;

        Ok(Config {
            supabase_url: lookup("SUPABASE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            supabase_service_role: lookup("SUPABASE_SERVICE_ROLE")
                .or_else(|| lookup("SUPABASE_SERVICE_ROLE_KEY"))
                .filter(|key| !key.is_empty()),
            candidate_rpc: lookup("CANDIDATE_RPC")
                .unwrap_or_else(|| "score_candidates_by_path_geog".to_string()),
            curation_timeout: Duration::from_secs(timeout_secs),
            curation,
        })
    }

    /// Supabase credentials, required only when the RPC candidate source is used.
    pub fn supabase_credentials(&self) -> Result<(String, String), anyhow::Error> {
        match (&self.supabase_url, &self.supabase_service_role) {
            (Some(url), Some(key)) => Ok((url.clone(), key.clone())),
            (url, key) => Err(anyhow::anyhow!(
                "SUPABASE_URL and SUPABASE_SERVICE_ROLE must be set (url set: {}, service role set: {})",
                url.is_some(),
                key.is_some()
            )),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.curation, CurationConfig::default());
        assert_eq!(config.candidate_rpc, "score_candidates_by_path_geog");
        assert_eq!(config.curation_timeout, Duration::from_secs(25));
        assert!(config.supabase_credentials().is_err());
    }

    #[test]
    fn test_overrides_and_service_role_fallback() {
        let config = Config::from_lookup(lookup_from(&[
            ("SUPABASE_URL", "https://example.supabase.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
            ("INITIAL_RADIUS_KM", "10"),
            ("RADIUS_INCREMENT_KM", "5.5"),
            ("BIO_TRIGGER_PROBABILITY", "0"),
            ("MAX_CANDIDATES", "50"),
        ]))
        .unwrap();

        let (url, key) = config.supabase_credentials().unwrap();
        assert_eq!(url, "https://example.supabase.co");
        assert_eq!(key, "secret");
        assert_eq!(config.curation.initial_radius_km, 10.0);
        assert_eq!(config.curation.radius_increment_km, 5.5);
        assert_eq!(config.curation.bio_trigger_probability, 0.0);
        assert_eq!(config.curation.max_candidates_per_fetch, 50);
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("MAX_RADIUS_KM", "far")])).unwrap_err();
        assert!(err.to_string().contains("MAX_RADIUS_KM"));
    }

    #[test]
    fn test_inconsistent_radii_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("INITIAL_RADIUS_KM", "200")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("RADIUS_INCREMENT_KM", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BIO_TRIGGER_PROBABILITY", "1.5")])).is_err());
    }
}
