//! Autonomous movement
//!
//! A [`MovementProfile`] maps elapsed time to an offset on the room plane.
//! Every moving voice owns one driver inside a single [`MovementScheduler`],
//! which the engine ticks once per animation frame.

use crate::spatial::Position;
use crate::voice::VoiceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Trajectory shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementKind {
    #[default]
    #[serde(rename = "static")]
    Static,
    #[serde(rename = "circle")]
    Circle,
    #[serde(rename = "backforth", alias = "back-forth")]
    BackForth,
    #[serde(rename = "closefar", alias = "close-far")]
    CloseFar,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Static => "static",
            MovementKind::Circle => "circle",
            MovementKind::BackForth => "backforth",
            MovementKind::CloseFar => "closefar",
        }
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(MovementKind::Static),
            "circle" => Ok(MovementKind::Circle),
            "backforth" | "back-forth" => Ok(MovementKind::BackForth),
            "closefar" | "close-far" => Ok(MovementKind::CloseFar),
            other => Err(format!("unknown movement type: {}", other)),
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movement settings of one voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementProfile {
    #[serde(rename = "type")]
    pub kind: MovementKind,
    pub speed: f64,
    pub distance: f64,
}

impl Default for MovementProfile {
    fn default() -> Self {
        Self {
            kind: MovementKind::Static,
            speed: 1.0,
            distance: 3.0,
        }
    }
}

impl MovementProfile {
    /// Range accepted for `speed` by the settings panel
    pub const SPEED_RANGE: (f64, f64) = (0.1, 3.0);
    /// Range accepted for `distance` by the settings panel
    pub const DISTANCE_RANGE: (f64, f64) = (1.0, 6.0);

    pub fn new(kind: MovementKind, speed: f64, distance: f64) -> Self {
        Self {
            kind,
            speed,
            distance,
        }
    }

    /// Build a profile with speed and distance forced into their ranges.
    /// NaN falls back to the default value.
    pub fn clamped(kind: MovementKind, speed: f64, distance: f64) -> Self {
        let defaults = Self::default();
        let fit = |value: f64, (min, max): (f64, f64), default: f64| {
            if value.is_nan() {
                default
            } else {
                value.clamp(min, max)
            }
        };
        Self {
            kind,
            speed: fit(speed, Self::SPEED_RANGE, defaults.speed),
            distance: fit(distance, Self::DISTANCE_RANGE, defaults.distance),
        }
    }

    /// This profile with speed and distance forced into their ranges
    pub fn sanitized(self) -> Self {
        Self::clamped(self.kind, self.speed, self.distance)
    }

    pub fn is_static(&self) -> bool {
        self.kind == MovementKind::Static
    }

    /// Offset from the anchor after `elapsed` seconds
    pub fn offset(&self, elapsed: f64) -> (f64, f64) {
        let t = elapsed * self.speed;
        let d = self.distance;
        match self.kind {
            MovementKind::Static => (0.0, 0.0),
            MovementKind::Circle => (d * t.cos(), d * t.sin()),
            MovementKind::BackForth => (d * t.sin(), 0.0),
            MovementKind::CloseFar => (0.0, d * (t.sin() + 1.0) / 2.0 + 1.0),
        }
    }
}

/// Point movement offsets are applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovementAnchor {
    /// Room origin, where the listener sits
    #[default]
    Listener,
    /// Where the voice was placed when movement started
    Placement,
}

impl MovementAnchor {
    pub fn resolve(&self, placement: Position) -> Position {
        match self {
            MovementAnchor::Listener => Position::ORIGIN,
            MovementAnchor::Placement => placement,
        }
    }
}

/// Position produced by a driver tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementUpdate {
    pub voice: VoiceId,
    pub generation: u64,
    pub position: Position,
}

#[derive(Debug, Clone)]
struct Driver {
    generation: u64,
    profile: MovementProfile,
    anchor: Position,
    started_at: f64,
}

/// Registry of running movement drivers
#[derive(Debug, Default)]
pub struct MovementScheduler {
    drivers: BTreeMap<VoiceId, Driver>,
}

impl MovementScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start driving `voice`. Returns false when the profile is static or a
    /// driver for the same activation is already running.
    pub fn start(
        &mut self,
        voice: VoiceId,
        generation: u64,
        profile: MovementProfile,
        anchor: Position,
        now: f64,
    ) -> bool {
        if profile.is_static() {
            return false;
        }
        if let Some(existing) = self.drivers.get(&voice) {
            if existing.generation == generation {
                return false;
            }
        }
        self.drivers.insert(
            voice,
            Driver {
                generation,
                profile,
                anchor,
                started_at: now,
            },
        );
        true
    }

    /// Returns whether a driver was running
    pub fn stop(&mut self, voice: VoiceId) -> bool {
        self.drivers.remove(&voice).is_some()
    }

    pub fn is_running(&self, voice: VoiceId) -> bool {
        self.drivers.contains_key(&voice)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Evaluate every driver at time `now`
    pub fn tick(&self, now: f64) -> Vec<MovementUpdate> {
        self.drivers
            .iter()
            .map(|(&voice, driver)| {
                let elapsed = (now - driver.started_at).max(0.0);
                let (dx, dz) = driver.profile.offset(elapsed);
                MovementUpdate {
                    voice,
                    generation: driver.generation,
                    position: driver.anchor.offset_by(dx, dz),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wire_names() {
        let kind: MovementKind = serde_json::from_str("\"close-far\"").unwrap();
        assert_eq!(kind, MovementKind::CloseFar);
        assert_eq!(
            serde_json::to_string(&MovementKind::BackForth).unwrap(),
            "\"backforth\""
        );
        assert_eq!("circle".parse::<MovementKind>(), Ok(MovementKind::Circle));
        assert!("spiral".parse::<MovementKind>().is_err());
    }

    #[test]
    fn test_circle_radius() {
        let profile = MovementProfile::new(MovementKind::Circle, 1.5, 3.0);
        for i in 0..200 {
            let (x, z) = profile.offset(i as f64 * 0.37);
            assert_relative_eq!(x.hypot(z), 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_close_far_stays_in_front() {
        let profile = MovementProfile::new(MovementKind::CloseFar, 2.0, 4.0);
        for i in 0..500 {
            let (x, z) = profile.offset(i as f64 * 0.05);
            assert_eq!(x, 0.0);
            assert!((1.0..=5.0 + 1e-12).contains(&z));
        }
    }

    #[test]
    fn test_clamped_ranges() {
        let low = MovementProfile::clamped(MovementKind::CloseFar, -2.0, 0.0);
        assert_eq!(low.speed, 0.1);
        assert_eq!(low.distance, 1.0);

        let high = MovementProfile::new(MovementKind::Circle, 10.0, f64::INFINITY).sanitized();
        assert_eq!(high, MovementProfile::new(MovementKind::Circle, 3.0, 6.0));

        let nan = MovementProfile::clamped(MovementKind::BackForth, f64::NAN, f64::NAN);
        assert_eq!(nan.speed, 1.0);
        assert_eq!(nan.distance, 3.0);
    }

    #[test]
    fn test_back_forth() {
        let profile = MovementProfile::new(MovementKind::BackForth, 1.0, 2.0);
        let (x, z) = profile.offset(std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(x, 2.0);
        assert_eq!(z, 0.0);
        assert_eq!(MovementProfile::default().offset(10.0), (0.0, 0.0));
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut scheduler = MovementScheduler::new();
        let circle = MovementProfile::new(MovementKind::Circle, 1.0, 3.0);
        assert!(scheduler.start(VoiceId(1), 1, circle, Position::ORIGIN, 0.0));
        assert!(!scheduler.start(VoiceId(1), 1, circle, Position::ORIGIN, 5.0));
        assert_eq!(scheduler.len(), 1);

        // Still timed from the first start
        let update = scheduler.tick(0.0)[0];
        assert_relative_eq!(update.position.x, 3.0);
    }

    #[test]
    fn test_static_is_never_driven() {
        let mut scheduler = MovementScheduler::new();
        assert!(!scheduler.start(
            VoiceId(1),
            1,
            MovementProfile::default(),
            Position::ORIGIN,
            0.0
        ));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_stopped_driver_yields_nothing() {
        let mut scheduler = MovementScheduler::new();
        let profile = MovementProfile::new(MovementKind::BackForth, 1.0, 2.0);
        scheduler.start(VoiceId(4), 2, profile, Position::ORIGIN, 0.0);
        assert!(scheduler.stop(VoiceId(4)));
        assert!(!scheduler.stop(VoiceId(4)));
        assert!(scheduler.tick(1.0).is_empty());
    }

    #[test]
    fn test_placement_anchor() {
        let placed = Position::new(2.0, -1.0);
        assert_eq!(MovementAnchor::Listener.resolve(placed), Position::ORIGIN);
        assert_eq!(MovementAnchor::Placement.resolve(placed), placed);

        let mut scheduler = MovementScheduler::new();
        let profile = MovementProfile::new(MovementKind::CloseFar, 1.0, 2.0);
        scheduler.start(VoiceId(2), 1, profile, placed, 0.0);
        let update = scheduler.tick(0.0)[0];
        assert_relative_eq!(update.position.x, 2.0);
        assert_relative_eq!(update.position.z, 1.0);
        assert_eq!(update.generation, 1);
    }
}
