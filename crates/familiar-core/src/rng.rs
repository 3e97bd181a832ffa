//! Random Streams
//!
//! Every stochastic decision in the core draws from a single `RandomStream`,
//! in a fixed order, so a run is fully determined by its seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Sequential sampler used by the simulation core.
pub trait RandomStream {
    /// Uniform draw in [0, 1).
    fn uniform(&mut self) -> f64;

    /// Standard normal draw.
    fn gaussian(&mut self) -> f64;

    /// Gamma draw with the given shape and unit scale.
    fn gamma_shape(&mut self, shape: f64) -> f64;

    /// True with probability `p`. Certain outcomes consume no draw.
    fn bernoulli(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.uniform() < p
        }
    }

    /// Uniform index in [0, n). Returns 0 without drawing when `n <= 1`.
    fn index(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        ((self.uniform() * n as f64) as usize).min(n - 1)
    }

    /// Gamma draw parameterized by its mean and squared coefficient of
    /// variation. A non-positive variance returns the mean unchanged.
    fn gamma(&mut self, mean: f64, variance: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        if variance <= 0.0 {
            return mean;
        }
        let shape = 1.0 / variance;
        let scale = mean * variance;
        self.gamma_shape(shape) * scale
    }

    /// Beta draw with the given mean, where `variance` is the fraction of the
    /// maximum variance `mean * (1 - mean)`.
    fn beta(&mut self, mean: f64, variance: f64) -> f64 {
        if variance <= 0.0 {
            return mean;
        }
        let mean = mean.clamp(1e-6, 1.0 - 1e-6);
        let kappa = (1.0 / variance.min(0.999) - 1.0).max(1e-3);
        let a = self.gamma_shape(mean * kappa);
        let b = self.gamma_shape((1.0 - mean) * kappa);
        if a + b <= 0.0 {
            mean
        } else {
            a / (a + b)
        }
    }

    /// Normal draw around `mean`, clamped into `[min, max]`.
    fn clamped_gaussian(&mut self, mean: f64, std: f64, min: f64, max: f64) -> f64 {
        (mean + self.gaussian() * std).clamp(min, max)
    }
}

/// Default stream backed by `SmallRng`.
#[derive(Debug, Clone)]
pub struct SeededStream {
    rng: SmallRng,
    spare: Option<f64>,
}

impl SeededStream {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            spare: None,
        }
    }
}

impl RandomStream for SeededStream {
    fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn gaussian(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // Box-Muller; u1 is kept away from zero for the log
        let u1 = self.rng.gen::<f64>().max(1e-12);
        let u2 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;
        self.spare = Some(radius * theta.sin());
        radius * theta.cos()
    }

    fn gamma_shape(&mut self, shape: f64) -> f64 {
        if shape <= 0.0 {
            return 0.0;
        }
        if shape < 1.0 {
            let boost = self.uniform().max(1e-12).powf(1.0 / shape);
            return self.gamma_shape(shape + 1.0) * boost;
        }
        // Marsaglia-Tsang
        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let x = self.gaussian();
            let v = 1.0 + c * x;
            if v <= 0.0 {
                continue;
            }
            let v = v * v * v;
            let u = self.uniform();
            if u < 1.0 - 0.0331 * x * x * x * x
                || u.max(1e-300).ln() < 0.5 * x * x + d * (1.0 - v + v.ln())
            {
                return d * v;
            }
        }
    }
}
