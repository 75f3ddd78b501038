//! Geometric feature extraction from landmark frames.
//!
//! Turns raw 3-D landmark arrays into a fixed 33-float, scale-invariant
//! feature vector per frame: 7 hand-shape values, 18 hand-position values
//! and 8 lip values. Temporal velocity and acceleration come from the two
//! preceding frames, so the first two frames of any stream never produce a
//! feature vector.
//!
//! An incomplete frame (missing or non-finite landmarks, degenerate
//! normalization) yields `None`. That is a normal outcome signalling the
//! caller to drop the frame, not an error.

use crate::defaults::{FEATURE_DIM, HAND_POS_DIM, HAND_SHAPE_DIM, LIPS_DIM, NORM_EPSILON};
use crate::landmarks::{LandmarkFrame, Point3};

/// Face landmark pair spanning the face width, used as the global
/// normalization reference.
const FACE_WIDTH_PAIR: (usize, usize) = (454, 234);

/// Hand landmark pair spanning the palm, used to normalize hand-shape
/// distances. Falls back to the face width when absent or degenerate.
const HAND_SPAN_PAIR: (usize, usize) = (0, 9);

/// Hand landmarks probed against the face for position features.
const POSITION_HAND_INDICES: [usize; 3] = [8, 9, 12];

/// Face landmarks probed for position features. Index 200 (chin) also
/// contributes an angle immediately after its distance.
const POSITION_FACE_INDICES: [usize; 5] = [234, 200, 214, 454, 280];

/// Face landmark paired with an angle in [`POSITION_FACE_INDICES`].
const ANGLE_FACE_INDEX: usize = 200;

/// Wrist-to-fingertip pairs for the hand-shape distances.
const FINGER_PAIRS: [(usize, usize); 5] = [(0, 4), (0, 8), (0, 12), (0, 16), (0, 20)];

/// Fingertip tracked for hand velocity.
const VELOCITY_FINGERTIP: usize = 8;

/// Mouth corner landmarks.
const MOUTH_CORNERS: (usize, usize) = (61, 291);

/// Upper/lower lip landmarks.
const LIP_VERTICAL: (usize, usize) = (0, 17);

/// Lip center landmark tracked for velocity and acceleration.
const LIP_CENTER: usize = 0;

/// Outer lip polygon, in ring order.
const LIP_OUTER_RING: [usize; 20] = [
    61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 375, 321, 405, 314, 17, 84, 181, 91, 146,
];

/// Euclidean distance between two points.
pub fn scalar_distance(a: Point3, b: Point3) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dz = b.z - a.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Absolute polygon area of a closed 2-D ring via the shoelace formula.
pub fn polygon_area(points: &[(f32, f32)]) -> f32 {
    if points.is_empty() {
        return 0.0;
    }

    let n = points.len();
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 * points[j].1;
        area -= points[j].0 * points[i].1;
    }
    area.abs() * 0.5
}

/// Mean interior angle over `(prev, curr, next)` triplets of a cyclic
/// polyline. Triplets with a zero-norm edge are skipped.
pub fn mean_contour_curvature(points: &[(f32, f32)]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let mut sum = 0.0f32;
    let mut count = 0usize;

    for i in 0..n {
        let p_prev = points[(i + n - 1) % n];
        let p_curr = points[i];
        let p_next = points[(i + 1) % n];

        let v1 = (p_prev.0 - p_curr.0, p_prev.1 - p_curr.1);
        let v2 = (p_next.0 - p_curr.0, p_next.1 - p_curr.1);

        let norm1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
        let norm2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
        if norm1 < NORM_EPSILON || norm2 < NORM_EPSILON {
            continue;
        }

        let cosang = ((v1.0 * v2.0 + v1.1 * v2.1) / (norm1 * norm2)).clamp(-1.0, 1.0);
        sum += cosang.acos();
        count += 1;
    }

    if count == 0 { 0.0 } else { sum / count as f32 }
}

/// Angle at `b` formed by the segments `b→a` and `b→c`, in radians.
/// Returns 0 when either segment has a near-zero norm.
pub fn vector_angle(a: Point3, b: Point3, c: Point3) -> f32 {
    let v1 = Point3::new(a.x - b.x, a.y - b.y, a.z - b.z);
    let v2 = Point3::new(c.x - b.x, c.y - b.y, c.z - b.z);

    let dot = v1.x * v2.x + v1.y * v2.y + v1.z * v2.z;
    let norm1 = (v1.x * v1.x + v1.y * v1.y + v1.z * v1.z).sqrt();
    let norm2 = (v2.x * v2.x + v2.y * v2.y + v2.z * v2.z).sqrt();
    if norm1 < NORM_EPSILON || norm2 < NORM_EPSILON {
        return 0.0;
    }

    (dot / (norm1 * norm2)).clamp(-1.0, 1.0).acos()
}

/// One frame's extracted features, grouped the way the sequence model
/// consumes them.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFeatures {
    /// 5 wrist-to-fingertip distances plus fingertip velocity (Δx, Δy).
    pub hand_shape: [f32; HAND_SHAPE_DIM],
    /// 15 hand-to-face distances interleaved with 3 angles.
    pub hand_position: [f32; HAND_POS_DIM],
    /// Mouth opening, lip area, curvature, lip-center velocity and
    /// acceleration.
    pub lips: [f32; LIPS_DIM],
}

impl FrameFeatures {
    /// An all-zero frame, used for right-padding inference windows.
    pub fn zeroed() -> Self {
        Self {
            hand_shape: [0.0; HAND_SHAPE_DIM],
            hand_position: [0.0; HAND_POS_DIM],
            lips: [0.0; LIPS_DIM],
        }
    }

    /// Flattens into the 33-float wire order: hand shape, hand position,
    /// lips.
    pub fn flatten(&self) -> [f32; FEATURE_DIM] {
        let mut out = [0.0; FEATURE_DIM];
        out[..HAND_SHAPE_DIM].copy_from_slice(&self.hand_shape);
        out[HAND_SHAPE_DIM..HAND_SHAPE_DIM + HAND_POS_DIM].copy_from_slice(&self.hand_position);
        out[HAND_SHAPE_DIM + HAND_POS_DIM..].copy_from_slice(&self.lips);
        out
    }

    /// Rebuilds a frame from the 33-float wire order.
    pub fn from_flat(values: &[f32; FEATURE_DIM]) -> Self {
        let mut features = Self::zeroed();
        features
            .hand_shape
            .copy_from_slice(&values[..HAND_SHAPE_DIM]);
        features
            .hand_position
            .copy_from_slice(&values[HAND_SHAPE_DIM..HAND_SHAPE_DIM + HAND_POS_DIM]);
        features
            .lips
            .copy_from_slice(&values[HAND_SHAPE_DIM + HAND_POS_DIM..]);
        features
    }
}

/// Stateless extractor turning landmark frames into [`FrameFeatures`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Creates a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extracts the 33-float feature vector for `current`.
    ///
    /// `prev` and `prev2` are the landmark frames at t−1 and t−2; both are
    /// required for the velocity and acceleration components, so `None`
    /// for either makes the whole frame invalid.
    ///
    /// Returns `None` whenever a required landmark is missing or
    /// non-finite, or a normalization divisor underflows.
    pub fn extract(
        &self,
        current: &LandmarkFrame,
        prev: Option<&LandmarkFrame>,
        prev2: Option<&LandmarkFrame>,
    ) -> Option<FrameFeatures> {
        // Normalization references.
        let fw_a = current.face_point(FACE_WIDTH_PAIR.0)?;
        let fw_b = current.face_point(FACE_WIDTH_PAIR.1)?;
        let face_width = scalar_distance(fw_a, fw_b);
        if face_width <= NORM_EPSILON {
            return None;
        }

        let mut hand_span = face_width;
        if let (Some(wrist), Some(knuckle)) = (
            current.hand_point(HAND_SPAN_PAIR.0),
            current.hand_point(HAND_SPAN_PAIR.1),
        ) {
            let span = scalar_distance(wrist, knuckle);
            if span > NORM_EPSILON {
                hand_span = span;
            }
        }

        // Hand-to-face distances and angles, in fixed cross-product order.
        let mut hand_position = [0.0f32; HAND_POS_DIM];
        let mut pos_idx = 0;
        for &hand_idx in &POSITION_HAND_INDICES {
            let hp = current.hand_point(hand_idx)?;
            for &face_idx in &POSITION_FACE_INDICES {
                let fp = current.face_point(face_idx)?;
                hand_position[pos_idx] = scalar_distance(hp, fp) / face_width;
                pos_idx += 1;

                if face_idx == ANGLE_FACE_INDEX {
                    let dx = (fp.x - hp.x) / face_width;
                    let dy = (fp.y - hp.y) / face_width;
                    hand_position[pos_idx] = dy.atan2(dx);
                    pos_idx += 1;
                }
            }
        }
        debug_assert_eq!(pos_idx, HAND_POS_DIM);

        // Wrist-to-fingertip distances.
        let mut hand_shape = [0.0f32; HAND_SHAPE_DIM];
        for (i, &(wrist_idx, tip_idx)) in FINGER_PAIRS.iter().enumerate() {
            let wrist = current.hand_point(wrist_idx)?;
            let tip = current.hand_point(tip_idx)?;
            hand_shape[i] = scalar_distance(wrist, tip) / hand_span;
        }

        // Lip geometry.
        let mut lips = [0.0f32; LIPS_DIM];
        let corner_a = current.face_point(MOUTH_CORNERS.0)?;
        let corner_b = current.face_point(MOUTH_CORNERS.1)?;
        lips[0] = scalar_distance(corner_a, corner_b) / face_width;

        let upper = current.face_point(LIP_VERTICAL.0)?;
        let lower = current.face_point(LIP_VERTICAL.1)?;
        lips[1] = scalar_distance(upper, lower) / face_width;

        let mut ring = [(0.0f32, 0.0f32); LIP_OUTER_RING.len()];
        for (slot, &idx) in ring.iter_mut().zip(LIP_OUTER_RING.iter()) {
            let p = current.face_point(idx)?;
            *slot = (p.x, p.y);
        }
        lips[2] = polygon_area(&ring) / (face_width * face_width);
        lips[3] = mean_contour_curvature(&ring);

        // Motion features require both history frames.
        let prev = prev?;
        let prev2 = prev2?;

        let lip_now = current.face_point(LIP_CENTER)?;
        let lip_prev = prev.face_point(LIP_CENTER)?;
        let lip_prev2 = prev2.face_point(LIP_CENTER)?;

        let vel_x = (lip_now.x - lip_prev.x) / face_width;
        let vel_y = (lip_now.y - lip_prev.y) / face_width;
        lips[4] = vel_x;
        lips[5] = vel_y;

        let prev_vel_x = (lip_prev.x - lip_prev2.x) / face_width;
        let prev_vel_y = (lip_prev.y - lip_prev2.y) / face_width;
        lips[6] = vel_x - prev_vel_x;
        lips[7] = vel_y - prev_vel_y;

        let tip_now = current.hand_point(VELOCITY_FINGERTIP)?;
        let tip_prev = prev.hand_point(VELOCITY_FINGERTIP)?;
        hand_shape[5] = (tip_now.x - tip_prev.x) / hand_span;
        hand_shape[6] = (tip_now.y - tip_prev.y) / hand_span;

        Some(FrameFeatures {
            hand_shape,
            hand_position,
            lips,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A landmark frame complete enough for every feature to extract.
    ///
    /// Face points sit on a unit-ish grid so that face width is 1.0;
    /// hand points are offset so distances are non-degenerate.
    fn complete_frame(offset: f32) -> LandmarkFrame {
        let mut face = vec![Point3::new(0.0, 0.0, 0.0); 455];
        // Face width anchors: d(454, 234) = 1.
        face[454] = Point3::new(1.0, 0.0, 0.0);
        face[234] = Point3::new(0.0, 0.0, 0.0);
        face[200] = Point3::new(0.5, 0.8, 0.0);
        face[214] = Point3::new(0.2, 0.6, 0.0);
        face[280] = Point3::new(0.8, 0.6, 0.0);
        // Lip ring: spread points on a small circle so area and curvature
        // are non-zero.
        for (i, &idx) in LIP_OUTER_RING.iter().enumerate() {
            let theta = (i as f32) * std::f32::consts::TAU / 20.0;
            face[idx] = Point3::new(
                0.5 + 0.1 * theta.cos() + offset,
                0.5 + 0.05 * theta.sin(),
                0.0,
            );
        }
        face[61] = Point3::new(0.4 + offset, 0.5, 0.0);
        face[291] = Point3::new(0.6 + offset, 0.5, 0.0);
        face[0] = Point3::new(0.5 + offset, 0.45, 0.0);
        face[17] = Point3::new(0.5 + offset, 0.55, 0.0);

        let mut hand = vec![Point3::new(0.0, 0.0, 0.0); 21];
        hand[0] = Point3::new(0.0 + offset, 1.0, 0.0);
        hand[9] = Point3::new(0.0 + offset, 1.5, 0.0);
        hand[4] = Point3::new(0.1 + offset, 1.2, 0.0);
        hand[8] = Point3::new(0.2 + offset, 1.3, 0.0);
        hand[12] = Point3::new(0.3 + offset, 1.4, 0.0);
        hand[16] = Point3::new(0.4 + offset, 1.45, 0.0);
        hand[20] = Point3::new(0.5 + offset, 1.5, 0.0);

        LandmarkFrame::new(face, hand, vec![])
    }

    #[test]
    fn test_scalar_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 0.0);
        assert!((scalar_distance(a, b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_area_unit_square() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert!((polygon_area(&square) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_area_orientation_independent() {
        let cw = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];
        assert!((polygon_area(&cw) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_area_empty() {
        assert_eq!(polygon_area(&[]), 0.0);
    }

    #[test]
    fn test_curvature_of_square_is_right_angle() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let curvature = mean_contour_curvature(&square);
        assert!((curvature - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_curvature_skips_degenerate_triplets() {
        // Two coincident points produce zero-norm edges; the remaining
        // triplets still average.
        let points = [(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0)];
        let curvature = mean_contour_curvature(&points);
        assert!(curvature.is_finite());
    }

    #[test]
    fn test_curvature_too_few_points() {
        assert_eq!(mean_contour_curvature(&[(0.0, 0.0), (1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_vector_angle_right_angle() {
        let angle = vector_angle(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_vector_angle_degenerate_is_zero() {
        let p = Point3::new(0.5, 0.5, 0.5);
        assert_eq!(vector_angle(p, p, Point3::new(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_extract_complete_frame() {
        let extractor = FeatureExtractor::new();
        let prev2 = complete_frame(0.0);
        let prev = complete_frame(0.01);
        let current = complete_frame(0.02);

        let features = extractor
            .extract(&current, Some(&prev), Some(&prev2))
            .expect("complete frame should extract");

        assert_eq!(features.hand_shape.len(), 7);
        assert_eq!(features.hand_position.len(), 18);
        assert_eq!(features.lips.len(), 8);
        assert!(features.flatten().iter().all(|v| v.is_finite()));
        // Constant motion: non-zero velocity, near-zero acceleration.
        assert!(features.lips[4].abs() > 0.0);
        assert!(features.lips[6].abs() < 1e-5);
    }

    #[test]
    fn test_extract_empty_frame_is_invalid() {
        let extractor = FeatureExtractor::new();
        let empty = LandmarkFrame::default();
        let prev = complete_frame(0.0);
        assert!(extractor.extract(&empty, Some(&prev), Some(&prev)).is_none());
    }

    #[test]
    fn test_extract_requires_both_history_frames() {
        let extractor = FeatureExtractor::new();
        let current = complete_frame(0.0);
        let prev = complete_frame(0.0);

        assert!(extractor.extract(&current, None, None).is_none());
        assert!(extractor.extract(&current, Some(&prev), None).is_none());
        assert!(extractor.extract(&current, None, Some(&prev)).is_none());
    }

    #[test]
    fn test_extract_degenerate_face_width_is_invalid() {
        let extractor = FeatureExtractor::new();
        let mut frame = complete_frame(0.0);
        frame.face[454] = frame.face[234];
        let prev = complete_frame(0.0);
        assert!(extractor.extract(&frame, Some(&prev), Some(&prev)).is_none());
    }

    #[test]
    fn test_extract_missing_hand_is_invalid() {
        let extractor = FeatureExtractor::new();
        let mut frame = complete_frame(0.0);
        frame.hand.clear();
        let prev = complete_frame(0.0);
        assert!(extractor.extract(&frame, Some(&prev), Some(&prev)).is_none());
    }

    #[test]
    fn test_extract_non_finite_landmark_is_invalid() {
        let extractor = FeatureExtractor::new();
        let mut frame = complete_frame(0.0);
        frame.face[200] = Point3::new(f32::NAN, 0.0, 0.0);
        let prev = complete_frame(0.0);
        assert!(extractor.extract(&frame, Some(&prev), Some(&prev)).is_none());
    }

    #[test]
    fn test_degenerate_hand_span_falls_back_to_face_width() {
        let extractor = FeatureExtractor::new();
        let prev2 = complete_frame(0.0);
        let prev = complete_frame(0.0);
        let mut current = complete_frame(0.0);
        // Collapse the palm; distances should then be normalized by the
        // face width (1.0), not blow up.
        current.hand[9] = current.hand[0];
        let features = extractor
            .extract(&current, Some(&prev), Some(&prev2))
            .expect("fallback span should keep the frame valid");
        assert!(features.hand_shape.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_flatten_round_trip() {
        let extractor = FeatureExtractor::new();
        let prev2 = complete_frame(0.0);
        let prev = complete_frame(0.01);
        let current = complete_frame(0.02);
        let features = extractor
            .extract(&current, Some(&prev), Some(&prev2))
            .unwrap();

        let flat = features.flatten();
        let rebuilt = FrameFeatures::from_flat(&flat);
        assert_eq!(features, rebuilt);
    }

    #[test]
    fn test_flatten_order_is_shape_position_lips() {
        let mut features = FrameFeatures::zeroed();
        features.hand_shape[0] = 1.0;
        features.hand_position[0] = 2.0;
        features.lips[0] = 3.0;

        let flat = features.flatten();
        assert_eq!(flat[0], 1.0);
        assert_eq!(flat[7], 2.0);
        assert_eq!(flat[25], 3.0);
    }
}
