// src/lighting.rs
use glam::Vec3;

/// A directional light. Direction points from the light toward the scene;
/// the scene broadcasts it into Scene-scope runtimes as `lightDirection`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    pub fn directional(direction: Vec3) -> Self {
        Self {
            direction,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Direction as a unit vector. A zero direction stays zero rather
    /// than producing NaN.
    pub fn normalized_direction(&self) -> Vec3 {
        self.direction.normalize_or_zero()
    }
}

impl Default for Light {
    /// Sun-like key light from above and behind the viewer.
    fn default() -> Self {
        Self::directional(Vec3::new(-0.4, -1.0, -0.3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_defaults() {
        let light = Light::directional(Vec3::NEG_Y);
        assert_eq!(light.color, Vec3::ONE);
        assert_eq!(light.intensity, 1.0);
        assert_eq!(light.normalized_direction(), Vec3::NEG_Y);
    }

    #[test]
    fn builders_override_color_and_intensity() {
        let light = Light::directional(Vec3::NEG_Y)
            .with_color(Vec3::new(1.0, 0.9, 0.7))
            .with_intensity(2.5);
        assert_eq!(light.color, Vec3::new(1.0, 0.9, 0.7));
        assert_eq!(light.intensity, 2.5);
        assert_eq!(light.direction, Vec3::NEG_Y);
    }

    #[test]
    fn normalization_handles_zero_direction() {
        let light = Light::directional(Vec3::ZERO);
        assert_eq!(light.normalized_direction(), Vec3::ZERO);

        let light = Light::directional(Vec3::new(0.0, -2.0, 0.0));
        assert!((light.normalized_direction() - Vec3::NEG_Y).length() < 1e-6);
    }
}
