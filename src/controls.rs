//! Camera controls seen from the loading session.
//!
//! The session only ever moves the orbit target onto a freshly loaded model;
//! everything else about camera handling belongs to the embedding application.

use cgmath::{EuclideanSpace, Point3, Rad, Vector3};

pub trait Controls {
    fn set_target(&mut self, target: Point3<f32>);

    fn update(&mut self);
}

/// Orbits an eye point around `target` at a fixed distance.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub distance: f32,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
    eye: Point3<f32>,
}

impl OrbitControls {
    /// Keeps the eye off the poles where the view direction degenerates.
    const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

    pub fn new(distance: f32, yaw: Rad<f32>, pitch: Rad<f32>) -> Self {
        let mut controls = Self {
            target: Point3::origin(),
            distance,
            yaw,
            pitch,
            eye: Point3::origin(),
        };
        controls.update();
        controls
    }

    pub fn eye(&self) -> Point3<f32> {
        self.eye
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(10.0, Rad(0.0), Rad(0.3))
    }
}

impl Controls for OrbitControls {
    fn set_target(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    fn update(&mut self) {
        self.pitch = Rad(self.pitch.0.clamp(-Self::MAX_PITCH, Self::MAX_PITCH));
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let offset = Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw);
        self.eye = self.target + offset * self.distance;
    }
}
