//! Wheel geometry — prize index ↔ angular sector ↔ target rotation
//!
//! The wheel is split into `N` equal segments; segment `i` covers
//! `[360·i/N, 360·(i+1)/N)` degrees in the wheel's own frame. The pointer is
//! fixed at angle 0 (top). Rotating the wheel by `R` degrees moves a point at
//! wheel angle `θ` to `θ + R`, so a segment sits under the pointer when
//! `(midpoint + R) mod 360 == 0`.
//!
//! Rotation values are accumulated across spins and never reset, so the
//! animation never snaps back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Degrees in a full turn
pub const FULL_TURN: f64 = 360.0;

/// Geometry error
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Wheel has no segments")]
    NoSegments,

    #[error("Segment {index} out of range for {total} segments")]
    IndexOutOfRange { index: usize, total: usize },
}

/// Angular slice of the wheel for one prize
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelSegment {
    pub index: usize,
    /// Inclusive start, in [0, 360)
    pub start_angle: f64,
    /// Exclusive end, in (0, 360]
    pub end_angle: f64,
}

impl WheelSegment {
    pub fn width(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn midpoint(&self) -> f64 {
        (self.start_angle + self.end_angle) / 2.0
    }

    pub fn contains(&self, angle: f64) -> bool {
        let angle = normalize_degrees(angle);
        angle >= self.start_angle && angle < self.end_angle
    }
}

/// Map any angle into [0, 360)
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= FULL_TURN { 0.0 } else { normalized }
}

fn boundary(index: usize, total: usize) -> f64 {
    FULL_TURN * index as f64 / total as f64
}

/// Bounds of segment `index` on a wheel of `total` segments
pub fn segment_for(index: usize, total: usize) -> Result<WheelSegment, GeometryError> {
    if total == 0 {
        return Err(GeometryError::NoSegments);
    }
    if index >= total {
        return Err(GeometryError::IndexOutOfRange { index, total });
    }
    Ok(WheelSegment {
        index,
        start_angle: normalize_degrees(boundary(index, total)),
        end_angle: boundary(index + 1, total),
    })
}

/// All segments of a wheel, in index order
pub fn segments(total: usize) -> Vec<WheelSegment> {
    (0..total)
        .filter_map(|index| segment_for(index, total).ok())
        .collect()
}

/// Center angle of segment `index`
pub fn segment_midpoint(index: usize, total: usize) -> Result<f64, GeometryError> {
    segment_for(index, total).map(|s| s.midpoint())
}

/// Rotation offset that brings a segment midpoint under the pointer,
/// starting from an unrotated wheel
fn pointer_offset(midpoint: f64) -> f64 {
    normalize_degrees(FULL_TURN - midpoint)
}

/// Rotation that lands segment `segment_index` under the pointer
///
/// `current_rotation + minimum_full_turns·360 + (360 − midpoint) mod 360`.
/// The offset is measured from `current_rotation`, so the pointer is centered
/// on the segment whenever `current_rotation` is a whole number of turns; use
/// [`aligned_rotation`] for an arbitrary starting orientation.
pub fn target_rotation(
    segment_index: usize,
    total_segments: usize,
    current_rotation: f64,
    minimum_full_turns: u32,
) -> Result<f64, GeometryError> {
    let midpoint = segment_midpoint(segment_index, total_segments)?;
    let mut offset = pointer_offset(midpoint);
    if minimum_full_turns == 0 && offset == 0.0 {
        offset = FULL_TURN;
    }
    Ok(current_rotation + f64::from(minimum_full_turns) * FULL_TURN + offset)
}

/// Smallest rotation ≥ `current_rotation + minimum_full_turns·360` whose
/// absolute orientation centers segment `segment_index` under the pointer
///
/// Never returns `current_rotation` itself: an already aligned wheel with no
/// required turns still spins one full turn.
pub fn aligned_rotation(
    segment_index: usize,
    total_segments: usize,
    current_rotation: f64,
    minimum_full_turns: u32,
) -> Result<f64, GeometryError> {
    let midpoint = segment_midpoint(segment_index, total_segments)?;
    let floor = current_rotation + f64::from(minimum_full_turns) * FULL_TURN;
    let mut offset = normalize_degrees(pointer_offset(midpoint) - normalize_degrees(floor));
    if minimum_full_turns == 0 && offset == 0.0 {
        offset = FULL_TURN;
    }
    Ok(floor + offset)
}

/// Index of the segment under the pointer after rotating by `rotation`
pub fn segment_under_pointer(rotation: f64, total_segments: usize) -> Result<usize, GeometryError> {
    if total_segments == 0 {
        return Err(GeometryError::NoSegments);
    }
    // The pointer reads wheel angle -rotation
    let angle = normalize_degrees(-rotation);
    let index = (angle / FULL_TURN * total_segments as f64).floor() as usize;
    Ok(index.min(total_segments - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segments_partition_full_turn() {
        for total in 1..=37 {
            let segs = segments(total);
            assert_eq!(segs.len(), total);
            assert_eq!(segs[0].start_angle, 0.0);
            assert_eq!(segs[total - 1].end_angle, FULL_TURN);
            for pair in segs.windows(2) {
                assert_eq!(pair[0].end_angle, pair[1].start_angle);
            }
            let sum: f64 = segs.iter().map(WheelSegment::width).sum();
            assert_relative_eq!(sum, FULL_TURN, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_segment_errors() {
        assert_eq!(segment_for(0, 0), Err(GeometryError::NoSegments));
        assert_eq!(
            segment_for(8, 8),
            Err(GeometryError::IndexOutOfRange { index: 8, total: 8 })
        );
    }

    #[test]
    fn test_eight_segment_wheel() {
        let seg = segment_for(0, 8).unwrap();
        assert_eq!(seg.start_angle, 0.0);
        assert_eq!(seg.end_angle, 45.0);
        assert_eq!(seg.midpoint(), 22.5);
        assert!(seg.contains(44.9));
        assert!(!seg.contains(45.0));
        assert!(seg.contains(360.0));
    }

    #[test]
    fn test_target_rotation_scenario() {
        assert_relative_eq!(target_rotation(0, 8, 0.0, 2).unwrap(), 1057.5);
    }

    #[test]
    fn test_target_rotation_offset_property() {
        for total in 1..=12 {
            for index in 0..total {
                for current in [0.0, 17.0, 359.0, 1057.5, 7200.25] {
                    let target = target_rotation(index, total, current, 0).unwrap();
                    assert!(target > current);
                    let mid = segment_midpoint(index, total).unwrap();
                    assert_relative_eq!(
                        normalize_degrees(target - current),
                        normalize_degrees(FULL_TURN - mid),
                        epsilon = 1e-9
                    );
                }
            }
        }
    }

    #[test]
    fn test_aligned_rotation_lands_on_segment() {
        for total in 1..=12 {
            for index in 0..total {
                for current in [0.0, 17.0, 359.0, 1057.5, 7200.25] {
                    for turns in [0, 1, 5] {
                        let target = aligned_rotation(index, total, current, turns).unwrap();
                        let floor = current + f64::from(turns) * FULL_TURN;
                        assert!(target >= floor);
                        assert!(target - floor <= FULL_TURN);
                        assert_eq!(segment_under_pointer(target, total).unwrap(), index);
                    }
                }
            }
        }
    }

    #[test]
    fn test_aligned_matches_target_on_whole_turns() {
        for index in 0..8 {
            assert_relative_eq!(
                aligned_rotation(index, 8, 720.0, 3).unwrap(),
                target_rotation(index, 8, 720.0, 3).unwrap()
            );
        }
    }

    #[test]
    fn test_already_aligned_wheel_still_moves() {
        // Segment 0 of a single-segment wheel is centered at 180
        let current = 180.0;
        let target = aligned_rotation(0, 1, current, 0).unwrap();
        assert_relative_eq!(target, current + FULL_TURN);
    }

    #[test]
    fn test_segment_under_pointer() {
        assert_eq!(segment_under_pointer(0.0, 8).unwrap(), 0);
        // Rotating by 337.5 puts the 22.5° midpoint of segment 0 at the top
        assert_eq!(segment_under_pointer(337.5, 8).unwrap(), 0);
        assert_eq!(segment_under_pointer(-22.5 - 45.0, 8).unwrap(), 1);
        assert_eq!(segment_under_pointer(45.0, 8).unwrap(), 7);
        assert_eq!(segment_under_pointer(1.0, 0), Err(GeometryError::NoSegments));
    }
}
