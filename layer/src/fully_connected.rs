//! Dense layers with an activation function on top.
//!
//! The forward pass runs the affine transform and then the activation function,
//! the backward pass masks the gradient with the activation derivatives and then
//! back-propagates through the affine transform.
use ndarray::{Array1, Array2, ArrayView1, ArrayViewD, ArrayViewMutD, NdFloat};
use rand::Rng;

use crate::{
    activation::{Activation, ActivationFunction, Linear, Relu, Sigmoid, Tanh},
    config::{Config, Pairing},
    dense::Dense,
    utils::IncompatibleMatrices,
    Layer,
    PassError,
    PassState,
};

/// A dense layer with reLu activation.
pub type ReluLayer<A = f32> = FullyConnected<Relu, A>;

/// A dense layer with sigmoid activation.
pub type SigmoidLayer<A = f32> = FullyConnected<Sigmoid, A>;

/// A dense layer with tanh activation.
pub type TanhLayer<A = f32> = FullyConnected<Tanh, A>;

/// A dense layer without (i.e. with identity) activation.
pub type LinearLayer<A = f32> = FullyConnected<Linear, A>;

/// A dense feed forward layer computing `activation(W·x + b)`.
#[derive(Clone, Debug)]
pub struct FullyConnected<AF, A = f32>
where
    AF: ActivationFunction<A>,
    A: NdFloat,
{
    dense: Dense<A>,
    activation: Activation<AF, A>,
}

impl<AF, A> FullyConnected<AF, A>
where
    AF: ActivationFunction<A>,
    A: NdFloat,
{
    pub fn new(
        weights: Array2<A>,
        bias: Array1<A>,
        activation_function: AF,
    ) -> Result<Self, IncompatibleMatrices> {
        Dense::new(weights, bias).map(|dense| Self::from_dense(dense, activation_function))
    }

    pub fn from_dense(dense: Dense<A>, activation_function: AF) -> Self {
        Self {
            dense,
            activation: Activation::new(activation_function),
        }
    }

    pub fn with_pairing(self, pairing: Pairing) -> Self {
        Self {
            dense: self.dense.with_pairing(pairing),
            activation: self.activation.with_pairing(pairing),
        }
    }

    pub fn dense(&self) -> &Dense<A> {
        &self.dense
    }

    /// Mutable access to the affine parameters, e.g. to apply gradients.
    pub fn dense_mut(&mut self) -> &mut Dense<A> {
        &mut self.dense
    }

    pub fn activation_function(&self) -> &AF {
        self.activation.activation_function()
    }

    /// Runs the layer without touching the forward caches.
    pub fn run(&self, input: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        let z_out = self.dense.run(input)?;
        Ok(self.activation.run(z_out.view()))
    }
}

impl<AF> FullyConnected<AF, f32>
where
    AF: ActivationFunction<f32> + Default,
{
    /// Creates a layer with random weights using the default [`Config`].
    pub fn create(input_size: usize, output_size: usize) -> Self {
        Self::create_with(
            &mut rand::thread_rng(),
            input_size,
            output_size,
            &Config::default(),
        )
    }

    pub fn create_with<R>(
        rng: &mut R,
        input_size: usize,
        output_size: usize,
        config: &Config,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let dense = Dense::create_with(rng, input_size, output_size, config);
        Self::from_dense(dense, AF::default()).with_pairing(config.pairing())
    }
}

impl<AF, A> Layer<A> for FullyConnected<AF, A>
where
    AF: ActivationFunction<A>,
    A: NdFloat,
{
    fn input_size(&self) -> Option<usize> {
        Some(self.dense.input_size())
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.dense.output_size())
    }

    fn state(&self) -> PassState {
        self.dense.state()
    }

    fn forward(&mut self, input: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        let z_out = self.dense.forward(input)?;
        self.activation.forward(z_out.view()).map_err(|error| {
            self.dense.reset();
            error
        })
    }

    fn backward(&mut self, grad_output: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        let grad_z = self.activation.backward(grad_output)?;
        self.dense.backward(grad_z.view())
    }

    fn reset(&mut self) {
        self.activation.reset();
        self.dense.reset();
    }

    fn parameters(&mut self) -> Vec<ArrayViewMutD<'_, A>> {
        self.dense.parameters()
    }

    fn parameter_gradients(&self) -> Vec<ArrayViewD<'_, A>> {
        self.dense.parameter_gradients()
    }
}
