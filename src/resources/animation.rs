//! Animation clips as parsed from model assets.
//!
//! A clip is a set of channels; every channel animates one property of one
//! node (addressed by name) over a shared timeline. Clips are pure data;
//! playing them is the job of [`crate::playback`].

use cgmath::InnerSpace;

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    // TODO: implement morphing
    Other,
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
            Keyframes::Scale(v) => v.len(),
            Keyframes::Other => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Only the keyframe values are kept; tangents are dropped when parsing.
    CubicSpline,
}

/// A sampled value for a single node property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pose {
    Translation(cgmath::Vector3<f32>),
    Rotation(cgmath::Quaternion<f32>),
    Scale(cgmath::Vector3<f32>),
}

#[derive(Clone, Debug)]
pub struct AnimationChannel {
    /// Name of the animated node.
    pub target: String,
    pub keyframes: Keyframes,
    pub timestamps: Vec<f32>,
    pub interpolation: Interpolation,
}

impl AnimationChannel {
    pub fn duration(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }

    /**
     * Samples the channel at `time` seconds.
     *
     * Times before the first keyframe yield the first value and times after
     * the last keyframe yield the last value, so a finished channel holds
     * its final pose.
     */
    pub fn sample(&self, time: f32) -> Option<Pose> {
        let len = self.timestamps.len().min(self.keyframes.len());
        if len == 0 {
            return None;
        }
        let (idx, factor) = locate(&self.timestamps[..len], time);
        let next = (idx + 1).min(len - 1);
        let factor = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear | Interpolation::CubicSpline => factor,
        };
        let pose = match &self.keyframes {
            Keyframes::Translation(values) => {
                Pose::Translation(values[idx] + (values[next] - values[idx]) * factor)
            }
            Keyframes::Scale(values) => {
                Pose::Scale(values[idx] + (values[next] - values[idx]) * factor)
            }
            Keyframes::Rotation(values) => {
                let (from, to) = (values[idx], values[next]);
                let rotation = if factor <= 0.0 {
                    from
                } else if factor >= 1.0 {
                    to
                } else {
                    from.slerp(to, factor)
                };
                Pose::Rotation(rotation.normalize())
            }
            Keyframes::Other => return None,
        };
        Some(pose)
    }
}

/// Index of the keyframe at or before `time` and the blend factor towards the next one.
fn locate(timestamps: &[f32], time: f32) -> (usize, f32) {
    let last = timestamps.len() - 1;
    if time <= timestamps[0] {
        return (0, 0.0);
    }
    if time >= timestamps[last] {
        return (last, 0.0);
    }
    let idx = timestamps
        .windows(2)
        .position(|w| time >= w[0] && time < w[1])
        .unwrap_or(last);
    if idx >= last {
        return (last, 0.0);
    }
    let span = timestamps[idx + 1] - timestamps[idx];
    let factor = if span > 0.0 {
        (time - timestamps[idx]) / span
    } else {
        0.0
    };
    (idx, factor)
}

/// An animation clip: a named set of channels with a common duration.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<AnimationChannel>,
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: &str, channels: Vec<AnimationChannel>) -> Self {
        let duration = channels
            .iter()
            .map(AnimationChannel::duration)
            .fold(0.0, f32::max);
        Self {
            name: name.to_string(),
            channels,
            duration,
        }
    }
}
