//! Animation playback.
//!
//! A [`Mixer`] drives every clip embedded in one loaded model. All clips are
//! started together when the mixer is bound, play exactly once and hold
//! their final pose. There is no looping or blending.
//!
//! The mixer does not borrow the model. Channel targets are resolved to child
//! index paths once at bind time and the model root is passed to every
//! [`Mixer::advance`] call.

use instant::{Duration, Instant};

use crate::{
    data_structures::scene_graph::SceneNode,
    resources::animation::{AnimationClip, Pose},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    Once,
}

/// One running clip and the nodes its channels drive.
#[derive(Debug)]
pub struct ClipAction {
    clip: AnimationClip,
    /// Per channel, the path from the model root to the animated node.
    bindings: Vec<Option<Vec<usize>>>,
    time: f32,
    running: bool,
    loop_mode: LoopMode,
    clamp_when_finished: bool,
}

impl ClipAction {
    fn new(clip: AnimationClip, root: &SceneNode) -> Self {
        let bindings = clip
            .channels
            .iter()
            .map(|channel| {
                let path = bind_target(root, &channel.target);
                if path.is_none() {
                    log::debug!(
                        "clip {} targets missing node {}",
                        clip.name,
                        channel.target
                    );
                }
                path
            })
            .collect();
        Self {
            clip,
            bindings,
            time: 0.0,
            running: false,
            loop_mode: LoopMode::Once,
            clamp_when_finished: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.clip.name
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn duration(&self) -> f32 {
        self.clip.duration
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.clip.duration
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn clamp_when_finished(&self) -> bool {
        self.clamp_when_finished
    }

    fn play(&mut self) {
        self.time = 0.0;
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn advance(&mut self, root: &mut SceneNode, delta: f32) {
        if !self.running {
            return;
        }
        self.time = (self.time + delta).min(self.clip.duration);
        self.apply(root);
        if self.is_finished() {
            // clamped: the final pose stays applied, the action goes idle
            self.running = false;
        }
    }

    fn apply(&self, root: &mut SceneNode) {
        for (channel, binding) in self.clip.channels.iter().zip(&self.bindings) {
            let Some(path) = binding else {
                continue;
            };
            let (Some(node), Some(pose)) = (root.node_at_path_mut(path), channel.sample(self.time))
            else {
                continue;
            };
            match pose {
                Pose::Translation(position) => node.transform.position = position,
                Pose::Rotation(rotation) => node.transform.rotation = rotation,
                Pose::Scale(scale) => node.transform.scale = scale,
            }
        }
    }
}

/// Path to the first node named `target` below `root`. The root itself is
/// never animated, its transform belongs to normalization.
fn bind_target(root: &SceneNode, target: &str) -> Option<Vec<usize>> {
    root.get_children()
        .iter()
        .enumerate()
        .find_map(|(idx, child)| {
            child.path_to(target).map(|mut path| {
                path.insert(0, idx);
                path
            })
        })
}

/// Advances all clip actions of one model.
#[derive(Debug, Default)]
pub struct Mixer {
    actions: Vec<ClipAction>,
    time: f32,
}

impl Mixer {
    /**
     * Binds `clips` to `root` and starts all of them.
     *
     * Returns `None` when there is nothing to play.
     */
    pub fn bind(root: &SceneNode, clips: Vec<AnimationClip>) -> Option<Mixer> {
        if clips.is_empty() {
            return None;
        }
        let actions = clips
            .into_iter()
            .map(|clip| {
                let mut action = ClipAction::new(clip, root);
                action.play();
                action
            })
            .collect();
        Some(Mixer { actions, time: 0.0 })
    }

    /// Moves every running action forward by `delta` seconds and poses `root`.
    pub fn advance(&mut self, root: &mut SceneNode, delta: f32) {
        if !(delta.is_finite() && delta >= 0.0) {
            log::warn!("ignoring invalid animation delta {delta}");
            return;
        }
        self.time += delta;
        for action in self.actions.iter_mut() {
            action.advance(root, delta);
        }
    }

    /// Halts every action. The mixer is inert afterwards.
    pub fn stop_all(&mut self) {
        self.actions.iter_mut().for_each(ClipAction::stop);
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_active(&self) -> bool {
        self.actions.iter().any(ClipAction::is_running)
    }
}

/// Consumes a mixer after halting its actions.
pub fn dispose(mut mixer: Mixer) {
    mixer.stop_all();
    log::debug!("disposed mixer with {} actions", mixer.actions.len());
}

/// Measures the real time between rendered frames.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Time since the previous call (or since construction).
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        delta
    }

    pub fn tick_seconds(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
