//! Pointwise activation functions and the parameterless activation layer.
use ndarray::{
    Array,
    Array1,
    ArrayBase,
    ArrayView1,
    ArrayViewD,
    ArrayViewMutD,
    Data,
    DataMut,
    DataOwned,
    Dimension,
    NdFloat,
};

use crate::{check_size, config::Pairing, Layer, PassCache, PassError, PassState};

/// Trait representing a pointwise activation function.
pub trait ActivationFunction<A> {
    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Applies the activation function to given array.
    ///
    /// In most cases this will call `input.mapv_inplace` and
    /// apply some function element wise.
    fn apply_to<S, D>(&self, input: ArrayBase<S, D>) -> ArrayBase<S, D>
    where
        S: DataOwned<Elem = A> + DataMut<Elem = A>,
        D: Dimension;

    /// The derivatives of the activation function at the given pre-activation values.
    fn partial_derivatives_at<S, D>(&self, input: ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
        D: Dimension;
}

/// reLu activation function.
///
/// The derivative at exactly `0` is `0`, i.e. a unit which is exactly
/// at the kink does not propagate gradients.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl<A> ActivationFunction<A> for Relu
where
    A: NdFloat,
{
    const NAME: &'static str = "relu";

    fn apply_to<S, D>(&self, mut input: ArrayBase<S, D>) -> ArrayBase<S, D>
    where
        S: DataOwned<Elem = A> + DataMut<Elem = A>,
        D: Dimension,
    {
        input.mapv_inplace(|v| A::max(A::zero(), v));
        input
    }

    fn partial_derivatives_at<S, D>(&self, input: ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        input.mapv(|v| if v > A::zero() { A::one() } else { A::zero() })
    }
}

/// Linear activation function.
///
/// Like common this is a identity function used
/// in cases where there no activation function is needed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl<A> ActivationFunction<A> for Linear
where
    A: NdFloat,
{
    const NAME: &'static str = "linear";

    fn apply_to<S, D>(&self, input: ArrayBase<S, D>) -> ArrayBase<S, D>
    where
        S: DataOwned<Elem = A> + DataMut<Elem = A>,
        D: Dimension,
    {
        input
    }

    fn partial_derivatives_at<S, D>(&self, input: ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        input.mapv(|_| A::one())
    }
}

/// Logistic sigmoid activation function.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sigmoid;

/// `1 / (1 + e^-v)` without overflowing `e^-v` for large negative `v`.
fn sigmoid<A>(v: A) -> A
where
    A: NdFloat,
{
    if v >= A::zero() {
        A::one() / (A::one() + (-v).exp())
    } else {
        let e = v.exp();
        e / (A::one() + e)
    }
}

impl<A> ActivationFunction<A> for Sigmoid
where
    A: NdFloat,
{
    const NAME: &'static str = "sigmoid";

    fn apply_to<S, D>(&self, mut input: ArrayBase<S, D>) -> ArrayBase<S, D>
    where
        S: DataOwned<Elem = A> + DataMut<Elem = A>,
        D: Dimension,
    {
        input.mapv_inplace(sigmoid);
        input
    }

    fn partial_derivatives_at<S, D>(&self, input: ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        input.mapv(|v| {
            let s = sigmoid(v);
            s * (A::one() - s)
        })
    }
}

/// Hyperbolic tangent activation function.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tanh;

impl<A> ActivationFunction<A> for Tanh
where
    A: NdFloat,
{
    const NAME: &'static str = "tanh";

    fn apply_to<S, D>(&self, mut input: ArrayBase<S, D>) -> ArrayBase<S, D>
    where
        S: DataOwned<Elem = A> + DataMut<Elem = A>,
        D: Dimension,
    {
        input.mapv_inplace(A::tanh);
        input
    }

    fn partial_derivatives_at<S, D>(&self, input: ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        input.mapv(|v| {
            let t = v.tanh();
            A::one() - t * t
        })
    }
}

/// A parameterless layer applying an activation function.
///
/// It accepts inputs of any size and keeps the last forward input
/// to mask the gradient in the backward pass.
#[derive(Clone, Debug)]
pub struct Activation<AF, A = f32>
where
    AF: ActivationFunction<A>,
    A: NdFloat,
{
    activation_function: AF,
    cache: PassCache<A>,
}

impl<AF, A> Default for Activation<AF, A>
where
    AF: ActivationFunction<A> + Default,
    A: NdFloat,
{
    fn default() -> Self {
        Self::new(AF::default())
    }
}

impl<AF, A> Activation<AF, A>
where
    AF: ActivationFunction<A>,
    A: NdFloat,
{
    pub fn new(activation_function: AF) -> Self {
        Self {
            activation_function,
            cache: PassCache::new(Pairing::default()),
        }
    }

    pub fn with_pairing(mut self, pairing: Pairing) -> Self {
        self.cache.set_pairing(pairing);
        self
    }

    pub fn activation_function(&self) -> &AF {
        &self.activation_function
    }

    /// Applies the activation function without touching the forward cache.
    pub fn run(&self, input: ArrayView1<A>) -> Array1<A> {
        self.activation_function.apply_to(input.to_owned())
    }
}

impl<AF, A> Layer<A> for Activation<AF, A>
where
    AF: ActivationFunction<A>,
    A: NdFloat,
{
    fn input_size(&self) -> Option<usize> {
        None
    }

    fn output_size(&self) -> Option<usize> {
        None
    }

    fn state(&self) -> PassState {
        self.cache.state()
    }

    fn forward(&mut self, input: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        self.cache.check_forward(AF::NAME)?;
        let output = self.run(input.view());
        self.cache.store(AF::NAME, input.to_owned())?;
        Ok(output)
    }

    fn backward(&mut self, grad_output: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        let input = self.cache.pending(AF::NAME)?;
        check_size(AF::NAME, input.len(), grad_output.len())?;
        let grad_input =
            self.activation_function.partial_derivatives_at(input.view()) * &grad_output;
        self.cache.clear(AF::NAME);
        Ok(grad_input)
    }

    fn reset(&mut self) {
        self.cache.clear(AF::NAME);
    }

    fn parameters(&mut self) -> Vec<ArrayViewMutD<'_, A>> {
        Vec::new()
    }

    fn parameter_gradients(&self) -> Vec<ArrayViewD<'_, A>> {
        Vec::new()
    }
}
