//! Per-bone matrix keyframe tracks and named frame ranges

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Transform};

/// Named frame interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationRange {
    /// Range name
    pub name: String,
    /// First frame (inclusive)
    pub from: f32,
    /// Last frame (inclusive)
    pub to: f32,
}

impl AnimationRange {
    /// Create a range
    pub fn new(name: impl Into<String>, from: f32, to: f32) -> Self {
        Self {
            name: name.into(),
            from,
            to,
        }
    }

    /// Whether `frame` falls inside the range bounds
    pub fn contains(&self, frame: f32) -> bool {
        frame >= self.from && frame <= self.to
    }
}

/// Matrix value at a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixKey {
    /// Frame number
    pub frame: f32,
    /// Local bone matrix at that frame
    pub value: Mat4,
}

/// Keyframes driving one bone's local matrix
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationTrack {
    /// Track name
    pub name: String,
    keys: Vec<MatrixKey>,
    ranges: BTreeMap<String, AnimationRange>,
}

impl AnimationTrack {
    /// Create an empty track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Keys ordered by frame
    pub fn keys(&self) -> &[MatrixKey] {
        &self.keys
    }

    /// Insert a key, keeping frame order. A key at an existing frame replaces it.
    pub fn add_key(&mut self, frame: f32, value: Mat4) {
        let at = self.keys.partition_point(|k| k.frame < frame);
        match self.keys.get_mut(at) {
            Some(existing) if existing.frame == frame => existing.value = value,
            _ => self.keys.insert(at, MatrixKey { frame, value }),
        }
    }

    /// Register a named range unless one with that name already exists
    pub fn create_range(&mut self, name: &str, from: f32, to: f32) {
        self.ranges
            .entry(name.to_string())
            .or_insert_with(|| AnimationRange::new(name, from, to));
    }

    /// Remove a named range, optionally stripping the keys inside its bounds
    pub fn delete_range(&mut self, name: &str, delete_frames: bool) {
        let Some(range) = self.ranges.remove(name) else {
            return;
        };
        if delete_frames {
            self.keys.retain(|key| !range.contains(key.frame));
        }
    }

    /// Look up a named range
    pub fn range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.get(name)
    }

    /// All named ranges, ordered by name
    pub fn ranges(&self) -> impl Iterator<Item = &AnimationRange> {
        self.ranges.values()
    }

    /// Frame of the last key, zero for an empty track
    pub fn highest_frame(&self) -> f32 {
        self.keys.iter().fold(0.0_f32, |highest, key| highest.max(key.frame))
    }

    /// Sample the track at `frame`.
    ///
    /// Keys are decomposed into position/rotation/scale and blended with
    /// lerp/slerp; frames outside the keyed interval clamp to the end keys.
    pub fn sample(&self, frame: f32) -> Option<Mat4> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        if frame >= last.frame {
            return Some(last.value);
        }

        let next = self.keys.partition_point(|k| k.frame <= frame);
        let (a, b) = (&self.keys[next - 1], &self.keys[next]);
        let span = b.frame - a.frame;
        if span <= f32::EPSILON {
            return Some(a.value);
        }

        let t = (frame - a.frame) / span;
        let from = Transform::from_matrix(&a.value);
        let to = Transform::from_matrix(&b.value);
        Some(from.interpolate(&to, t).to_matrix())
    }

    pub(crate) fn push_key_unordered(&mut self, key: MatrixKey) {
        self.keys.push(key);
    }

    pub(crate) fn sort_keys(&mut self) {
        self.keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    fn translation(x: f32) -> Mat4 {
        Mat4::new_translation(&Vec3::new(x, 0.0, 0.0))
    }

    fn walk_track() -> AnimationTrack {
        let mut track = AnimationTrack::new("bone");
        for frame in [0.0, 10.0, 20.0, 30.0, 40.0] {
            track.add_key(frame, translation(frame));
        }
        track
    }

    #[test]
    fn test_add_key_keeps_order() {
        let mut track = AnimationTrack::new("bone");
        track.add_key(10.0, translation(1.0));
        track.add_key(0.0, translation(0.0));
        track.add_key(5.0, translation(0.5));
        track.add_key(5.0, translation(0.7));

        let frames: Vec<f32> = track.keys().iter().map(|k| k.frame).collect();
        assert_eq!(frames, vec![0.0, 5.0, 10.0]);
        assert_relative_eq!(track.keys()[1].value, translation(0.7));
    }

    #[test]
    fn test_create_range_keeps_first_definition() {
        let mut track = walk_track();
        track.create_range("walk", 0.0, 30.0);
        track.create_range("walk", 5.0, 6.0);

        assert_eq!(track.range("walk"), Some(&AnimationRange::new("walk", 0.0, 30.0)));
    }

    #[test]
    fn test_delete_range_with_and_without_frames() {
        let mut track = walk_track();
        track.create_range("walk", 10.0, 30.0);
        track.delete_range("walk", false);
        assert!(track.range("walk").is_none());
        assert_eq!(track.keys().len(), 5);

        track.create_range("walk", 10.0, 30.0);
        track.delete_range("walk", true);
        let frames: Vec<f32> = track.keys().iter().map(|k| k.frame).collect();
        assert_eq!(frames, vec![0.0, 40.0]);
    }

    #[test]
    fn test_sample_interpolates_and_clamps() {
        let track = walk_track();

        assert_relative_eq!(track.sample(15.0).unwrap(), translation(15.0), epsilon = 1e-5);
        assert_relative_eq!(track.sample(-5.0).unwrap(), translation(0.0));
        assert_relative_eq!(track.sample(99.0).unwrap(), translation(40.0));
        assert!(AnimationTrack::new("empty").sample(0.0).is_none());
        assert_relative_eq!(track.highest_frame(), 40.0);
    }
}
