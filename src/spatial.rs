//! Spatialization
//!
//! Positions live on the horizontal plane: `x` to the right of the listener,
//! `z` toward the back of the room (the listener faces `-z`). The listener
//! sits at the origin and never moves.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// A point on the room plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, z: 0.0 };

    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Map a normalized room coordinate (each axis in `[0, 1]`, as a UI
    /// would report a drop point) to room units centred on the listener
    pub fn from_normalized(nx: f64, nz: f64, room_scale: f64) -> Self {
        Self {
            x: (nx - 0.5) * room_scale,
            z: (nz - 0.5) * room_scale,
        }
    }

    pub fn distance(&self) -> f64 {
        self.x.hypot(self.z)
    }

    pub fn offset_by(&self, dx: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }
}

/// Exponential distance attenuation plus equal-power stereo panning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spatializer {
    /// Distance inside which a source plays at full gain
    pub ref_distance: f64,
    pub max_distance: f64,
    pub rolloff: f64,
}

impl Default for Spatializer {
    fn default() -> Self {
        Self {
            ref_distance: 1.0,
            max_distance: 10_000.0,
            rolloff: 1.0,
        }
    }
}

impl Spatializer {
    /// Gain factor for a source `distance` units from the listener
    pub fn attenuation(&self, distance: f64) -> f64 {
        let d = distance.clamp(self.ref_distance, self.max_distance);
        (d / self.ref_distance).powf(-self.rolloff)
    }

    /// Left and right gains for a source at `position`
    pub fn gains(&self, position: Position) -> (f64, f64) {
        let distance = position.distance();
        let pan = if distance > 0.0 {
            (position.x / distance).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let theta = (pan + 1.0) * FRAC_PI_4;
        let gain = self.attenuation(distance);
        (theta.cos() * gain, theta.sin() * gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_model() {
        let s = Spatializer::default();
        assert_relative_eq!(s.attenuation(0.0), 1.0);
        assert_relative_eq!(s.attenuation(1.0), 1.0);
        assert_relative_eq!(s.attenuation(2.0), 0.5);
        assert_relative_eq!(s.attenuation(4.0), 0.25);
    }

    #[test]
    fn test_rolloff_and_max_distance() {
        let s = Spatializer {
            rolloff: 2.0,
            max_distance: 8.0,
            ..Spatializer::default()
        };
        assert_relative_eq!(s.attenuation(2.0), 0.25);
        // Beyond max_distance the gain stops falling
        assert_relative_eq!(s.attenuation(100.0), s.attenuation(8.0));
    }

    #[test]
    fn test_centre_is_equal_power() {
        let s = Spatializer::default();
        let (l, r) = s.gains(Position::new(0.0, -1.0));
        assert_relative_eq!(l, r, epsilon = 1e-12);
        assert_relative_eq!(l * l + r * r, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hard_right() {
        let s = Spatializer::default();
        let (l, r) = s.gains(Position::new(2.0, 0.0));
        assert!(l.abs() < 1e-12);
        assert_relative_eq!(r, 0.5);
    }

    #[test]
    fn test_from_normalized() {
        let p = Position::from_normalized(0.75, 0.25, 15.0);
        assert_relative_eq!(p.x, 3.75);
        assert_relative_eq!(p.z, -3.75);
        assert_eq!(Position::from_normalized(0.5, 0.5, 15.0), Position::ORIGIN);
    }
}
