//! Light types for the scene

use glam::Vec3;

/// Uniform light added to every surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub colour: Vec3,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            colour: Vec3::splat(0.03),
        }
    }
}

impl AmbientLight {
    pub fn new(colour: Vec3) -> Self {
        Self { colour }
    }
}

/// Directional light (like the sun)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub colour: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            colour: Vec3::ONE,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, colour: Vec3) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            colour,
        }
    }
}

/// Point light with constant/linear/quadratic falloff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub colour: Vec3,
    /// x = constant, y = linear, z = quadratic
    pub falloff: Vec3,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            colour: Vec3::ONE,
            falloff: Vec3::new(1.0, 0.09, 0.032),
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, colour: Vec3, falloff: Vec3) -> Self {
        Self {
            position,
            colour,
            falloff,
        }
    }

    /// Intensity multiplier at `distance`, as the shaders compute it
    pub fn attenuation(&self, distance: f32) -> f32 {
        let f = self.falloff;
        let denominator = f.x + f.y * distance + f.z * distance * distance;
        if denominator > 0.0 {
            1.0 / denominator
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attenuation() {
        let light = PointLight::new(Vec3::ZERO, Vec3::ONE, Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(light.attenuation(0.0), 1.0);
        assert_eq!(light.attenuation(2.0), 1.0 / 3.0);

        let unlit = PointLight::new(Vec3::ZERO, Vec3::ONE, Vec3::ZERO);
        assert_eq!(unlit.attenuation(1.0), 0.0);
    }

    #[test]
    fn test_sun_direction_is_normalized() {
        let sun = DirectionalLight::new(Vec3::new(0.0, -4.0, 0.0), Vec3::ONE);
        assert_eq!(sun.direction, -Vec3::Y);
    }
}
