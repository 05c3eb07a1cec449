//! Route segmentation
//!
//! Turns the ordered route points and a travel duration into evenly time-spaced checkpoints.
//! Each checkpoint gets the same time allowance; the last one is trimmed by the scheduler
//! against the remaining total.

use crate::models::GeoPoint;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Checkpoint {
    pub location: GeoPoint,
    pub time_allowance_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteSegments {
    pub checkpoints: Vec<Checkpoint>,
    pub per_segment_seconds: u32,
}

impl RouteSegments {
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn locations(&self) -> Vec<GeoPoint> {
        self.checkpoints.iter().map(|c| c.location).collect()
    }
}

/// Sample `ceil(total / min(window, total))` checkpoints evenly across the point indices.
///
/// An empty route or zero duration yields no checkpoints.
pub fn segment_route(points: &[GeoPoint], total_seconds: u32, window_seconds: u32) -> RouteSegments {
    if points.is_empty() || total_seconds == 0 || window_seconds == 0 {
        return RouteSegments::default();
    }

    let per_segment = window_seconds.min(total_seconds);
    let count = total_seconds.div_ceil(per_segment).max(1) as usize;
    let last_index = points.len() - 1;

    let checkpoints = (0..count)
        .map(|i| {
            let t = if count == 1 {
                0.0
            } else {
                i as f64 / (count - 1) as f64
            };
            let idx = ((t * last_index as f64).floor() as usize).min(last_index);
            Checkpoint {
                location: points[idx],
                time_allowance_seconds: per_segment,
            }
        })
        .collect();

    RouteSegments {
        checkpoints,
        per_segment_seconds: per_segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<GeoPoint> {
        (0..n).map(|i| GeoPoint::new(45.0 + i as f64 * 0.01, 7.0)).collect()
    }

    #[test]
    fn test_two_points_ten_minutes() {
        let points = line(2);
        let segments = segment_route(&points, 600, 300);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments.per_segment_seconds, 300);
        assert!(segments.checkpoints.iter().all(|c| c.time_allowance_seconds == 300));
        assert_eq!(segments.checkpoints[0].location, points[0]);
        assert_eq!(segments.checkpoints[1].location, points[1]);
    }

    #[test]
    fn test_short_trip_gets_a_single_checkpoint() {
        let points = line(5);
        let segments = segment_route(&points, 120, 300);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments.per_segment_seconds, 120);
        assert_eq!(segments.checkpoints[0].location, points[0]);
    }

    #[test]
    fn test_partial_window_rounds_up() {
        let segments = segment_route(&line(10), 1000, 300);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments.checkpoints[3].location, line(10)[9]);
    }

    #[test]
    fn test_more_checkpoints_than_points() {
        let points = line(3);
        let segments = segment_route(&points, 3000, 300);
        assert_eq!(segments.len(), 10);
        // Floored fractional index: 0,0,0,0,0,1,1,1,1,2
        assert_eq!(segments.checkpoints[4].location, points[0]);
        assert_eq!(segments.checkpoints[5].location, points[1]);
        assert_eq!(segments.checkpoints[9].location, points[2]);
    }

    #[test]
    fn test_degenerate_inputs_yield_nothing() {
        assert!(segment_route(&[], 600, 300).is_empty());
        assert!(segment_route(&line(2), 0, 300).is_empty());
    }

    #[test]
    fn test_segmenting_is_pure() {
        let points = line(7);
        assert_eq!(segment_route(&points, 4321, 300), segment_route(&points, 4321, 300));
    }
}
