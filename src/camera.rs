// src/camera.rs
use glam::{Mat4, Vec3};

/// Perspective camera with position and Euler rotation (yaw, pitch).
///
/// The camera carries no GPU state of its own; the scene pushes its
/// matrices into Scene-scope attribute runtimes by name.
#[derive(Debug)]
pub struct Camera {
    pub position: Vec3,
    /// yaw: rotation around Y axis (radians). pitch: rotation around X axis (radians).
    pub yaw: f32,
    pub pitch: f32,

    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(
        position: Vec3,
        yaw: f32,
        pitch: f32,
        fovy_radians: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        Self {
            position,
            yaw,
            pitch,
            fovy: fovy_radians,
            aspect,
            znear,
            zfar,
        }
    }

    /// Unit forward vector from yaw/pitch.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw).normalize_or_zero()
    }

    /// Build view matrix from position + yaw/pitch (right-handed, Y up).
    pub fn view_matrix(&self) -> Mat4 {
        let target = self.position + self.forward();
        Mat4::look_at_rh(self.position, target, Vec3::Y)
    }

    /// Build projection matrix (perspective).
    pub fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }

    /// Update aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn set_position(&mut self, pos: Vec3) {
        self.position = pos;
    }

    pub fn set_rotation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
    }

    /// Point the camera at `target` from its current position.
    pub fn look_at(&mut self, target: Vec3) {
        let dir = (target - self.position).normalize_or_zero();
        self.pitch = dir.y.asin();
        self.yaw = dir.x.atan2(dir.z);
    }
}
