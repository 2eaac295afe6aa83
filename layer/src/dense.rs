use std::ops::{DivAssign, MulAssign};

use log::debug;
use ndarray::{
    Array1,
    Array2,
    ArrayView1,
    ArrayView2,
    ArrayViewD,
    ArrayViewMutD,
    Axis,
    NdFloat,
};
use rand::Rng;

use crate::{
    check_size,
    config::{Config, Pairing},
    utils::IncompatibleMatrices,
    Layer,
    PassCache,
    PassError,
    PassState,
};

/// A dense (fully connected) feed forward layer without activation function.
///
/// The weights have the shape `(outputs, inputs)` and the layer computes
/// `W·x + b`. Activation functions are composed on top of it, see
/// [`crate::fully_connected::FullyConnected`].
#[derive(Clone, Debug)]
pub struct Dense<A = f32>
where
    A: NdFloat,
{
    weights: Array2<A>,
    bias: Array1<A>,
    gradients: DenseGradientSet<A>,
    cache: PassCache<A>,
}

impl<A> Dense<A>
where
    A: NdFloat,
{
    const NAME: &'static str = "dense";

    pub fn new(weights: Array2<A>, bias: Array1<A>) -> Result<Self, IncompatibleMatrices> {
        if weights.shape()[0] == bias.shape()[0] {
            Ok(Self::new_unchecked(weights, bias, Pairing::default()))
        } else {
            Err(IncompatibleMatrices::new(
                "dense/weights",
                weights.raw_dim(),
                "dense/bias",
                bias.raw_dim(),
                "expected weights[0] == bias[0] for adding the bias to the outputs",
            ))
        }
    }

    fn new_unchecked(weights: Array2<A>, bias: Array1<A>, pairing: Pairing) -> Self {
        debug!(
            "{}: created with {} inputs and {} outputs",
            Self::NAME,
            weights.ncols(),
            weights.nrows(),
        );
        let gradients = DenseGradientSet::zeros(weights.ncols(), weights.nrows());
        Self {
            weights,
            bias,
            gradients,
            cache: PassCache::new(pairing),
        }
    }

    pub fn with_pairing(mut self, pairing: Pairing) -> Self {
        self.cache.set_pairing(pairing);
        self
    }

    pub fn weights(&self) -> ArrayView2<A> {
        self.weights.view()
    }

    pub fn bias(&self) -> ArrayView1<A> {
        self.bias.view()
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    /// The gradients of the last backward pass, zeros before the first one.
    pub fn gradients(&self) -> &DenseGradientSet<A> {
        &self.gradients
    }

    /// Applies the affine transform without touching the forward cache.
    pub fn run(&self, input: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        check_size(Self::NAME, self.input_size(), input.len())?;
        Ok(self.weights.dot(&input) + &self.bias)
    }

    /// Calculates the gradients of a dense layer based on the relevant partial derivatives.
    ///
    /// The `partials` are the derivatives of the loss wrt. the outputs of this layer.
    pub fn gradients_from_partials_1d(
        input: ArrayView1<A>,
        partials: ArrayView1<A>,
    ) -> DenseGradientSet<A> {
        // The formula for bias at index i is:  `b_i = x_i + b_i` of which the derivative wrt. b_i is `1`
        let bias_gradients = partials.to_owned();

        // For the weight matrix we need the outer product of the partial derivatives `p_i`
        // and the inputs `s_j`:
        //
        // ```
        // J = [
        //  [ p_0 * s_0   p_0 * s_1 … ]
        //  [ p_1 * s_0   p_1 * s_1 … ]
        //  ⋮
        // ]
        // ```
        //
        // With dimensions [i, j], matching the weights.
        let weight_gradients = partials
            .insert_axis(Axis(1))
            .dot(&input.insert_axis(Axis(0)));

        DenseGradientSet {
            weight_gradients,
            bias_gradients,
        }
    }

    /// Adds given gradients to the weight and bias matrices.
    ///
    /// An optimizer scales the gradients, e.g. by `-learning_rate`, before
    /// adding them.
    ///
    /// # Errors
    /// Fails without touching the parameters if the gradients don't have the
    /// shape of the weights.
    pub fn add_gradients(
        &mut self,
        gradients: &DenseGradientSet<A>,
    ) -> Result<(), IncompatibleMatrices> {
        if self.weights.shape() != gradients.weight_gradients.shape() {
            return Err(IncompatibleMatrices::new(
                "dense/weights",
                self.weights.raw_dim(),
                "gradients/weights",
                gradients.weight_gradients.raw_dim(),
                "expected gradients of the same shape as the weights",
            ));
        }
        self.weights += &gradients.weight_gradients;
        self.bias += &gradients.bias_gradients;
        Ok(())
    }
}

impl Dense<f32> {
    /// Creates a layer with random weights using the default [`Config`].
    pub fn create(input_size: usize, output_size: usize) -> Self {
        Self::create_with(
            &mut rand::thread_rng(),
            input_size,
            output_size,
            &Config::default(),
        )
    }

    /// Creates a layer with weights from the configured initializer.
    pub fn create_with<R>(
        rng: &mut R,
        input_size: usize,
        output_size: usize,
        config: &Config,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let weights = config.initializer().weights(rng, input_size, output_size);
        let bias = Array1::from_elem(output_size, config.bias_init());
        Self::new_unchecked(weights, bias, config.pairing())
    }
}

impl<A> Layer<A> for Dense<A>
where
    A: NdFloat,
{
    fn input_size(&self) -> Option<usize> {
        Some(Dense::input_size(self))
    }

    fn output_size(&self) -> Option<usize> {
        Some(Dense::output_size(self))
    }

    fn state(&self) -> PassState {
        self.cache.state()
    }

    fn forward(&mut self, input: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        self.cache.check_forward(Self::NAME)?;
        let output = self.run(input)?;
        self.cache.store(Self::NAME, input.to_owned())?;
        Ok(output)
    }

    fn backward(&mut self, grad_output: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        let input = self.cache.pending(Self::NAME)?;
        check_size(Self::NAME, self.weights.nrows(), grad_output.len())?;
        self.gradients = Self::gradients_from_partials_1d(input.view(), grad_output);
        let grad_input = self.weights.t().dot(&grad_output);
        self.cache.clear(Self::NAME);
        Ok(grad_input)
    }

    fn reset(&mut self) {
        self.cache.clear(Self::NAME);
    }

    fn parameters(&mut self) -> Vec<ArrayViewMutD<'_, A>> {
        vec![
            self.weights.view_mut().into_dyn(),
            self.bias.view_mut().into_dyn(),
        ]
    }

    fn parameter_gradients(&self) -> Vec<ArrayViewD<'_, A>> {
        vec![
            self.gradients.weight_gradients.view().into_dyn(),
            self.gradients.bias_gradients.view().into_dyn(),
        ]
    }
}

/// A gradient set containing gradients for all parameters in a dense layer.
#[derive(Debug, Clone)]
pub struct DenseGradientSet<A = f32>
where
    A: NdFloat,
{
    weight_gradients: Array2<A>,
    bias_gradients: Array1<A>,
}

impl<A> DenseGradientSet<A>
where
    A: NdFloat,
{
    pub fn new(
        weight_gradients: Array2<A>,
        bias_gradients: Array1<A>,
    ) -> Result<Self, IncompatibleMatrices> {
        if weight_gradients.nrows() == bias_gradients.len() {
            Ok(Self {
                weight_gradients,
                bias_gradients,
            })
        } else {
            Err(IncompatibleMatrices::new(
                "gradients/weights",
                weight_gradients.raw_dim(),
                "gradients/bias",
                bias_gradients.raw_dim(),
                "expected weights[0] == bias[0]",
            ))
        }
    }

    fn zeros(input_size: usize, output_size: usize) -> Self {
        Self {
            weight_gradients: Array2::zeros((output_size, input_size)),
            bias_gradients: Array1::zeros(output_size),
        }
    }

    pub fn weight_gradients(&self) -> &Array2<A> {
        &self.weight_gradients
    }

    pub fn bias_gradients(&self) -> &Array1<A> {
        &self.bias_gradients
    }

    /// Adds the gradients of `other` to these gradients.
    ///
    /// # Errors
    /// Fails without touching `self` if both sets differ in shape.
    pub fn merge(&mut self, other: &Self) -> Result<(), IncompatibleMatrices> {
        // the bias length always matches the number of weight rows
        if self.weight_gradients.shape() != other.weight_gradients.shape() {
            return Err(IncompatibleMatrices::new(
                "gradients/weights",
                self.weight_gradients.raw_dim(),
                "gradients/weights",
                other.weight_gradients.raw_dim(),
                "expected gradient sets of the same shape",
            ));
        }
        self.weight_gradients += &other.weight_gradients;
        self.bias_gradients += &other.bias_gradients;
        Ok(())
    }

    /// Merge multiple gradients for the same shared weights.
    ///
    /// This will just sum them up. If there are no gradient sets `None` is returned.
    ///
    /// # Errors
    /// Fails if the gradient sets differ in shape.
    pub fn merge_shared(
        gradients_for_shared_weights: impl IntoIterator<Item = Self>,
    ) -> Result<Option<Self>, IncompatibleMatrices> {
        gradients_for_shared_weights
            .into_iter()
            .try_fold(None, |sum: Option<Self>, set| match sum {
                Some(mut sum) => sum.merge(&set).map(|_| Some(sum)),
                None => Ok(Some(set)),
            })
    }

    /// Merges the gradients of a batch of samples into their mean.
    ///
    /// If there are no gradient sets `None` is returned.
    ///
    /// # Errors
    /// Fails if the gradient sets differ in shape.
    pub fn mean_of(
        gradient_sets: impl IntoIterator<Item = Self>,
    ) -> Result<Option<Self>, IncompatibleMatrices> {
        let mut count = A::zero();
        let sum = Self::merge_shared(gradient_sets.into_iter().inspect(|_| count += A::one()))?;
        Ok(sum.map(|mut sum| {
            sum /= count;
            sum
        }))
    }
}

impl<A> MulAssign<A> for DenseGradientSet<A>
where
    A: NdFloat,
{
    fn mul_assign(&mut self, rhs: A) {
        self.weight_gradients *= rhs;
        self.bias_gradients *= rhs;
    }
}

impl<A> DivAssign<A> for DenseGradientSet<A>
where
    A: NdFloat,
{
    fn div_assign(&mut self, rhs: A) {
        self.weight_gradients /= rhs;
        self.bias_gradients /= rhs;
    }
}
