use log::{debug, trace};
use ndarray::{Array1, ArrayView1, ArrayViewD, ArrayViewMutD, NdFloat};

use crate::{utils::IncompatibleMatrices, Layer, Pass, PassError, PassState};

/// An ordered stack of layers, each one feeding the next.
///
/// The stack owns its layers and can be moved to another thread. A failing
/// pass aborts the pass of the whole stack and resets all layers, so no layer
/// keeps a half finished cache. A `forward` rejected by the first layer touched
/// no layer at all, it keeps the pending caches.
pub struct Sequential<A = f32>
where
    A: NdFloat,
{
    layers: Vec<Box<dyn Layer<A> + Send>>,
    /// The output size of the stack so far, `None` if no layer fixed it yet.
    width: Option<usize>,
    state: PassState,
}

impl<A> Default for Sequential<A>
where
    A: NdFloat,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Sequential<A>
where
    A: NdFloat,
{
    const NAME: &'static str = "sequential";

    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            width: None,
            state: PassState::Ready,
        }
    }

    /// Appends a layer to the end of the stack.
    ///
    /// # Errors
    /// Fails if the input size of the layer doesn't match the current output size.
    pub fn push<L>(&mut self, layer: L) -> Result<(), IncompatibleMatrices>
    where
        L: Layer<A> + Send + 'static,
    {
        if let (Some(width), Some(input_size)) = (self.width, layer.input_size()) {
            if width != input_size {
                return Err(IncompatibleMatrices::new(
                    "sequential/output",
                    (width,),
                    "layer/input",
                    (input_size,),
                    "expected the layer input to match the output of the previous layer",
                ));
            }
        }
        self.width = layer.output_size().or(self.width);
        self.layers.push(Box::new(layer));
        debug!(
            "sequential: added layer {} with output size {:?}",
            self.layers.len(),
            self.width,
        );
        Ok(())
    }

    /// Builder version of [`Sequential::push()`].
    pub fn with_layer<L>(mut self, layer: L) -> Result<Self, IncompatibleMatrices>
    where
        L: Layer<A> + Send + 'static,
    {
        self.push(layer)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> impl Iterator<Item = &(dyn Layer<A> + Send)> {
        self.layers.iter().map(|layer| &**layer)
    }

    fn enter(&mut self, state: PassState) {
        if self.state != state {
            trace!("{}: {} -> {}", Self::NAME, self.state, state);
            self.state = state;
        }
    }

    fn abort(&mut self, error: PassError) -> PassError {
        debug!("sequential: aborting pass: {}", error);
        self.reset();
        error
    }
}

impl<A> Layer<A> for Sequential<A>
where
    A: NdFloat,
{
    fn input_size(&self) -> Option<usize> {
        // shape preserving layers in front take whatever the first sized layer takes
        self.layers.iter().find_map(|layer| layer.input_size())
    }

    fn output_size(&self) -> Option<usize> {
        self.width
    }

    fn state(&self) -> PassState {
        self.state
    }

    fn forward(&mut self, input: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        let result = self
            .layers
            .iter_mut()
            .enumerate()
            .try_fold(input.to_owned(), |output, (idx, layer)| {
                layer.forward(output.view()).map_err(|error| (idx, error))
            });
        match result {
            Ok(output) => {
                self.enter(PassState::HasCache);
                Ok(output)
            }
            Err((
                0,
                error @ PassError::StatePrecondition {
                    pass: Pass::Forward,
                    ..
                },
            )) => Err(error),
            Err((_, error)) => Err(self.abort(error)),
        }
    }

    fn backward(&mut self, grad_output: ArrayView1<A>) -> Result<Array1<A>, PassError> {
        if self.state == PassState::Ready {
            return Err(PassError::StatePrecondition {
                layer: Self::NAME,
                pass: Pass::Backward,
                state: PassState::Ready,
            });
        }
        let result = self
            .layers
            .iter_mut()
            .rev()
            .try_fold(grad_output.to_owned(), |grad, layer| layer.backward(grad.view()));
        match result {
            Ok(grad_input) => {
                self.enter(PassState::Ready);
                Ok(grad_input)
            }
            Err(error) => Err(self.abort(error)),
        }
    }

    fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.reset();
        }
        self.enter(PassState::Ready);
    }

    fn parameters(&mut self) -> Vec<ArrayViewMutD<'_, A>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.parameters())
            .collect()
    }

    fn parameter_gradients(&self) -> Vec<ArrayViewD<'_, A>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.parameter_gradients())
            .collect()
    }
}
