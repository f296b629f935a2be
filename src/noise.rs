//! Procedural noise buffers
//!
//! Buffers are generated once per voice and looped by
//! [`BufferPlayer`](crate::modules::BufferPlayer); the generator itself
//! never wraps.
//! Output is not reproducible unless a seeded RNG is passed to
//! [`NoiseGenerator::generate_with`].

use rand::Rng;

/// Spectral color of a noise buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseColor {
    /// Flat spectrum, uniform samples in [-1, 1]
    White,
    /// Roughly -3 dB/octave
    Pink,
    /// Roughly -6 dB/octave (leaky random walk)
    Brown,
}

/// Six-pole IIR approximation of a 1/f filter.
///
/// State lives for exactly one generation call.
#[derive(Debug, Default)]
struct PinkFilter {
    b: [f64; 7],
}

impl PinkFilter {
    fn process(&mut self, white: f64) -> f64 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let out = (b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362) * 0.11;
        // b6 feeds the next sample only
        b[6] = white * 0.115926;
        out
    }
}

/// Leaky integrator producing brown noise
#[derive(Debug, Default)]
struct BrownIntegrator {
    last: f64,
}

impl BrownIntegrator {
    fn process(&mut self, white: f64) -> f64 {
        self.last = (self.last + 0.02 * white) / 1.02;
        self.last * 3.5
    }
}

/// Generator for white, pink and brown noise buffers
pub struct NoiseGenerator;

impl NoiseGenerator {
    /// Number of samples produced for a duration at a sample rate
    pub fn buffer_len(duration_seconds: f64, sample_rate: f64) -> usize {
        let len = (duration_seconds * sample_rate).round();
        if len.is_finite() && len > 0.0 {
            len as usize
        } else {
            0
        }
    }

    /// Generate a buffer using the thread-local RNG
    pub fn generate(color: NoiseColor, duration_seconds: f64, sample_rate: f64) -> Vec<f32> {
        Self::generate_with(&mut rand::thread_rng(), color, duration_seconds, sample_rate)
    }

    /// Generate a buffer drawing white samples from `rng`
    pub fn generate_with<R: Rng>(
        rng: &mut R,
        color: NoiseColor,
        duration_seconds: f64,
        sample_rate: f64,
    ) -> Vec<f32> {
        let len = Self::buffer_len(duration_seconds, sample_rate);
        let mut white = move || rng.gen_range(-1.0..=1.0_f64);

        match color {
            NoiseColor::White => (0..len).map(|_| white() as f32).collect(),
            NoiseColor::Pink => {
                let mut filter = PinkFilter::default();
                (0..len).map(|_| filter.process(white()) as f32).collect()
            }
            NoiseColor::Brown => {
                let mut integrator = BrownIntegrator::default();
                (0..len).map(|_| integrator.process(white()) as f32).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_buffer_length() {
        for &(duration, rate) in &[(2.0, 44100.0), (0.5, 48000.0), (1.25, 8000.0)] {
            for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
                let buffer = NoiseGenerator::generate(color, duration, rate);
                assert_eq!(buffer.len(), (duration * rate) as usize);
            }
        }
    }

    #[test]
    fn test_degenerate_durations() {
        assert!(NoiseGenerator::generate(NoiseColor::White, 0.0, 44100.0).is_empty());
        assert!(NoiseGenerator::generate(NoiseColor::Pink, -1.0, 44100.0).is_empty());
        assert!(NoiseGenerator::generate(NoiseColor::Brown, f64::NAN, 44100.0).is_empty());
    }

    #[test]
    fn test_white_range() {
        let buffer = NoiseGenerator::generate(NoiseColor::White, 1.0, 44100.0);
        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_colored_noise_headroom() {
        let mut rng = StdRng::seed_from_u64(7);
        for color in [NoiseColor::Pink, NoiseColor::Brown] {
            let buffer = NoiseGenerator::generate_with(&mut rng, color, 10.0, 44100.0);
            let peak = buffer.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
            assert!(peak < 1.5, "{:?} peak {} would clip", color, peak);

            let rms = (buffer.iter().map(|s| (s * s) as f64).sum::<f64>()
                / buffer.len() as f64)
                .sqrt();
            assert!(rms > 0.01 && rms < 0.5, "{:?} rms {}", color, rms);
        }
    }

    #[test]
    fn test_pink_filter_first_sample() {
        let mut filter = PinkFilter::default();
        let out = filter.process(1.0);
        let expected = (0.0555179 + 0.0750759 + 0.1538520 + 0.3104856 + 0.5329522 - 0.0168980
            + 0.5362)
            * 0.11;
        approx::assert_relative_eq!(out, expected, epsilon = 1e-12);
        // b6 only contributes from the second sample on
        approx::assert_relative_eq!(filter.b[6], 0.115926);
    }

    #[test]
    fn test_brown_is_smoother_than_white() {
        let mut rng = StdRng::seed_from_u64(11);
        let white = NoiseGenerator::generate_with(&mut rng, NoiseColor::White, 1.0, 8000.0);
        let brown = NoiseGenerator::generate_with(&mut rng, NoiseColor::Brown, 1.0, 8000.0);
        let mean_step = |b: &[f32]| {
            b.windows(2).map(|w| (w[1] - w[0]).abs() as f64).sum::<f64>() / b.len() as f64
        };
        assert!(mean_step(&brown) < mean_step(&white) / 4.0);
    }
}
