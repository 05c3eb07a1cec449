use super::geo::GeoPoint;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest journey accepted, 48 hours.
pub const MAX_DURATION_SECONDS: f64 = 172_800.0;

/// A request to curate a playlist for one journey.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CurationRequest {
    #[validate(length(min = 1, message = "journeyId is required"))]
    pub journey_id: String,
    /// Ordered route points; see [`GeoPoint`] for the coordinate convention.
    #[validate(length(min = 2, message = "a route needs at least two points"))]
    pub points: Vec<GeoPoint>,
    #[serde(alias = "duration")]
    pub duration_seconds: f64,
}

impl CurationRequest {
    /// Reject the request before any scoring work happens.
    pub fn validate_request(&self) -> crate::error::Result<()> {
        if self.journey_id.trim().is_empty() {
            return Err(AppError::Validation("journeyId is required".to_string()));
        }
        self.validate()?;

        if let Some(index) = self.points.iter().position(|p| !p.is_valid()) {
            return Err(AppError::Validation(format!(
                "point {} is not a valid coordinate",
                index
            )));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(AppError::Validation(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration_seconds
            )));
        }
        if self.duration_seconds > MAX_DURATION_SECONDS {
            return Err(AppError::Validation(format!(
                "duration must not exceed {} seconds, got {}",
                MAX_DURATION_SECONDS, self.duration_seconds
            )));
        }
        Ok(())
    }

    /// Requested duration in whole seconds, rounded up.
    pub fn total_seconds(&self) -> u32 {
        self.duration_seconds.ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(points: usize, duration: f64) -> CurationRequest {
        CurationRequest {
            journey_id: "journey-1".to_string(),
            points: (0..points).map(|i| GeoPoint::new(i as f64, 0.0)).collect(),
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request(2, 600.0).validate_request().is_ok());
    }

    #[test]
    fn test_rejections() {
        let mut missing_id = request(2, 600.0);
        missing_id.journey_id = "  ".to_string();

        let mut bad_point = request(3, 600.0);
        bad_point.points[1] = GeoPoint::new(f64::NAN, 0.0);

        for invalid in [
            missing_id,
            request(1, 600.0),
            request(2, 0.0),
            request(2, -5.0),
            request(2, f64::INFINITY),
            bad_point,
        ] {
            let err = invalid.validate_request().unwrap_err();
            assert!(err.is_rejection(), "expected a validation error, got {:?}", err);
        }
    }

    #[test]
    fn test_duration_ceiling() {
        assert!(request(2, MAX_DURATION_SECONDS).validate_request().is_ok());
        assert_eq!(request(2, MAX_DURATION_SECONDS).total_seconds(), 172_800);

        for too_long in [MAX_DURATION_SECONDS + 1.0, 5e9, 1e12] {
            let err = request(2, too_long).validate_request().unwrap_err();
            assert!(err.is_rejection(), "{} should be rejected, got {:?}", too_long, err);
        }
    }

    #[test]
    fn test_deserializes_original_payload_shape() {
        let json = r#"{"journeyId": "j", "points": [{"x": 1.0, "y": 2.0}, {"lat": 3.0, "lon": 4.0}], "duration": 900}"#;
        let req: CurationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.points[0], GeoPoint::new(1.0, 2.0));
        assert_eq!(req.total_seconds(), 900);
    }
}
