//! Sample-accurate parameter automation
//!
//! Gains and panner coordinates change through scheduled [`ParamChange`]s
//! rather than direct writes, so that fades and position updates stay
//! click-free. Ramps are measured in frames of the audio clock.

/// A scheduled change to an automated parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    /// Jump to a value, cancelling any ramp in progress
    Set(f64),
    /// Ramp linearly from the current value to `target` over `frames` samples
    LinearRamp { target: f64, frames: u64 },
}

/// A parameter that follows linear ramps one sample at a time
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatedParam {
    value: f64,
    target: f64,
    step: f64,
    remaining: u64,
}

impl AutomatedParam {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply a change, replacing any ramp in progress
    pub fn apply(&mut self, change: ParamChange) {
        match change {
            ParamChange::Set(value) | ParamChange::LinearRamp { target: value, frames: 0 } => {
                self.value = value;
                self.target = value;
                self.step = 0.0;
                self.remaining = 0;
            }
            ParamChange::LinearRamp { target, frames } => {
                self.target = target;
                self.step = (target - self.value) / frames as f64;
                self.remaining = frames;
            }
        }
    }

    /// Return the current value and advance one sample
    pub fn next_value(&mut self) -> f64 {
        let current = self.value;
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                // Land exactly on the target regardless of rounding in `step`
                self.value = self.target;
            } else {
                self.value += self.step;
            }
        }
        current
    }
}

impl Default for AutomatedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_set_is_immediate() {
        let mut param = AutomatedParam::new(0.0);
        param.apply(ParamChange::Set(0.7));
        assert_eq!(param.next_value(), 0.7);
        assert_eq!(param.value(), 0.7);
    }

    #[test]
    fn test_linear_ramp_reaches_target() {
        let mut param = AutomatedParam::new(0.0);
        param.apply(ParamChange::LinearRamp {
            target: 1.0,
            frames: 4,
        });
        let values: Vec<f64> = (0..5).map(|_| param.next_value()).collect();
        assert_relative_eq!(values[0], 0.0);
        assert_relative_eq!(values[1], 0.25);
        assert_relative_eq!(values[2], 0.5);
        assert_relative_eq!(values[3], 0.75);
        assert_eq!(values[4], 1.0);
        assert_eq!(param.next_value(), 1.0);
    }

    #[test]
    fn test_ramp_is_monotonic() {
        let mut param = AutomatedParam::new(0.4);
        param.apply(ParamChange::LinearRamp {
            target: 0.0,
            frames: 22050,
        });
        let mut last = f64::INFINITY;
        for _ in 0..22050 {
            let v = param.next_value();
            assert!(v <= last);
            last = v;
        }
        assert_eq!(param.value(), 0.0);
    }

    #[test]
    fn test_new_ramp_starts_from_current_value() {
        let mut param = AutomatedParam::new(0.0);
        param.apply(ParamChange::LinearRamp {
            target: 1.0,
            frames: 10,
        });
        for _ in 0..5 {
            param.next_value();
        }
        param.apply(ParamChange::LinearRamp {
            target: 0.0,
            frames: 5,
        });
        assert_relative_eq!(param.next_value(), 0.5, epsilon = 1e-12);
        for _ in 0..4 {
            param.next_value();
        }
        assert_eq!(param.value(), 0.0);
    }

    #[test]
    fn test_zero_length_ramp_jumps() {
        let mut param = AutomatedParam::new(2.0);
        param.apply(ParamChange::LinearRamp {
            target: -1.0,
            frames: 0,
        });
        assert_eq!(param.value(), -1.0);
    }
}
