use displaydoc::Display;
use ndarray::Array2;
use rand::Rng;
use thiserror::Error;

use crate::utils::{
    glorot_normal_weights_init,
    glorot_uniform_weights_init,
    he_normal_weights_init,
    he_uniform_weights_init,
};

/// How strictly forward and backward passes have to alternate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pairing {
    /// Every `forward` must be followed by a `backward` before the next `forward`.
    Strict,
    /// A `forward` replaces a still pending cache, e.g. when evaluating in between training steps.
    Relaxed,
}

impl Default for Pairing {
    fn default() -> Self {
        Pairing::Relaxed
    }
}

/// Weight initializers for randomly created layers.
///
/// See the corresponding functions in [`crate::utils`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Initializer {
    HeNormal,
    HeUniform,
    GlorotNormal,
    GlorotUniform,
}

impl Default for Initializer {
    /// He-Normal, which is suited for ReLU layers.
    fn default() -> Self {
        Initializer::HeNormal
    }
}

impl Initializer {
    /// Creates a `(output_size, input_size)` weight matrix.
    pub fn weights<R>(self, rng: &mut R, input_size: usize, output_size: usize) -> Array2<f32>
    where
        R: Rng + ?Sized,
    {
        let dim = (output_size, input_size);
        match self {
            Initializer::HeNormal => he_normal_weights_init(rng, dim),
            Initializer::HeUniform => he_uniform_weights_init(rng, dim),
            Initializer::GlorotNormal => glorot_normal_weights_init(rng, dim),
            Initializer::GlorotUniform => glorot_uniform_weights_init(rng, dim),
        }
    }
}

/// The configuration of newly created layers.
#[derive(Clone, Debug)]
pub struct Config {
    pairing: Pairing,
    initializer: Initializer,
    bias_init: f32,
}

/// Potential errors of the layer configuration.
#[derive(Copy, Clone, Debug, Display, Error, PartialEq)]
pub enum Error {
    /// Invalid bias initialization value, expected a finite value
    BiasInit,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pairing: Pairing::default(),
            initializer: Initializer::default(),
            bias_init: 0.,
        }
    }
}

impl Config {
    pub fn pairing(&self) -> Pairing {
        self.pairing
    }

    pub fn with_pairing(self, pairing: Pairing) -> Self {
        Self { pairing, ..self }
    }

    pub fn initializer(&self) -> Initializer {
        self.initializer
    }

    pub fn with_initializer(self, initializer: Initializer) -> Self {
        Self {
            initializer,
            ..self
        }
    }

    /// The constant all biases start with.
    pub fn bias_init(&self) -> f32 {
        self.bias_init
    }

    /// Sets the bias initialization value.
    ///
    /// # Errors
    /// Fails if the value is not finite.
    pub fn with_bias_init(self, bias_init: f32) -> Result<Self, Error> {
        if bias_init.is_finite() {
            Ok(Self { bias_init, ..self })
        } else {
            Err(Error::BiasInit)
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pairing(), Pairing::Relaxed);
        assert_eq!(config.initializer(), Initializer::HeNormal);
        assert_eq!(config.bias_init(), 0.);
    }

    #[test]
    fn test_with_bias_init() {
        let config = Config::default().with_bias_init(0.25).unwrap();
        assert_eq!(config.bias_init(), 0.25);

        assert_eq!(
            Config::default().with_bias_init(f32::NAN).unwrap_err(),
            Error::BiasInit
        );
        assert_eq!(
            Config::default()
                .with_bias_init(f32::NEG_INFINITY)
                .unwrap_err(),
            Error::BiasInit
        );
    }

    #[test]
    fn test_initializer_creates_output_by_input_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for initializer in [
            Initializer::HeNormal,
            Initializer::HeUniform,
            Initializer::GlorotNormal,
            Initializer::GlorotUniform,
        ]
        .iter()
        {
            let weights = initializer.weights(&mut rng, 3, 5);
            assert_eq!(weights.shape(), &[5, 3]);
        }
    }
}
