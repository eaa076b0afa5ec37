// src/detection/landmarks.rs
//
// COCO-17 landmark indices and the body-part aggregates the tracker,
// possession resolver and travel check read from a pose.

use crate::types::{PersonDetection, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

pub const TORSO: [Landmark; 4] = [
    Landmark::LeftShoulder,
    Landmark::RightShoulder,
    Landmark::LeftHip,
    Landmark::RightHip,
];

pub const LOWER_BODY: [Landmark; 4] = [
    Landmark::LeftHip,
    Landmark::RightHip,
    Landmark::LeftKnee,
    Landmark::RightKnee,
];

pub const WRISTS: [Landmark; 2] = [Landmark::LeftWrist, Landmark::RightWrist];

fn visible(person: &PersonDetection, set: &[Landmark], min_confidence: f32) -> Vec<Point> {
    set.iter()
        .map(|l| person.keypoints[*l as usize])
        .filter(|k| k.confidence >= min_confidence)
        .map(|k| k.point())
        .collect()
}

/// Torso centroid (shoulders + hips). Falls back to the mean of every
/// visible landmark when the torso is occluded.
pub fn body_centroid(person: &PersonDetection, min_confidence: f32) -> Option<Point> {
    Point::mean(&visible(person, &TORSO, min_confidence)).or_else(|| {
        let all: Vec<Point> = person
            .keypoints
            .iter()
            .filter(|k| k.confidence >= min_confidence)
            .map(|k| k.point())
            .collect();
        Point::mean(&all)
    })
}

/// Hip/knee centroid used for displacement while holding the ball.
pub fn lower_body_centroid(person: &PersonDetection, min_confidence: f32) -> Option<Point> {
    Point::mean(&visible(person, &LOWER_BODY, min_confidence))
}

pub fn wrists(person: &PersonDetection, min_confidence: f32) -> Vec<Point> {
    visible(person, &WRISTS, min_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Keypoint, NUM_LANDMARKS};

    fn person_with(points: &[(Landmark, f32, f32, f32)]) -> PersonDetection {
        let mut keypoints = [Keypoint {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }; NUM_LANDMARKS];
        for (l, x, y, c) in points {
            keypoints[*l as usize] = Keypoint {
                x: *x,
                y: *y,
                confidence: *c,
            };
        }
        PersonDetection {
            keypoints,
            team: None,
        }
    }

    #[test]
    fn test_torso_centroid_ignores_low_confidence() {
        let p = person_with(&[
            (Landmark::LeftShoulder, 100.0, 100.0, 0.9),
            (Landmark::RightShoulder, 140.0, 100.0, 0.9),
            (Landmark::LeftHip, 100.0, 200.0, 0.9),
            (Landmark::RightHip, 500.0, 900.0, 0.1),
        ]);
        let c = body_centroid(&p, 0.3).unwrap();
        assert!((c.x - 113.333).abs() < 0.01);
        assert!((c.y - 133.333).abs() < 0.01);
    }

    #[test]
    fn test_centroid_falls_back_to_visible_landmarks() {
        let p = person_with(&[(Landmark::Nose, 50.0, 20.0, 0.8)]);
        assert_eq!(body_centroid(&p, 0.3), Some(Point::new(50.0, 20.0)));
        assert_eq!(lower_body_centroid(&p, 0.3), None);
    }

    #[test]
    fn test_no_visible_landmarks() {
        let p = person_with(&[]);
        assert_eq!(body_centroid(&p, 0.3), None);
        assert!(wrists(&p, 0.3).is_empty());
    }
}
