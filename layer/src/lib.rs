//! Feed-forward network layers with forward evaluation and back-propagation.
//!
//! Every layer follows the same per-step protocol:
//!
//! ```ascii
//! Ready --forward--> HasCache --backward--> Ready
//! ```
//!
//! `forward` caches whatever the following `backward` needs (for a [`dense::Dense`]
//! layer the input, for an [`activation::Activation`] the pre-activation values),
//! `backward` consumes that cache. Calling `backward` in the `Ready` state is a
//! [`PassError::StatePrecondition`]. Whether a second `forward` in the `HasCache`
//! state is an error too depends on the [`config::Pairing`] of the layer.
//!
//! Layers are meant to be driven by one training worker at a time, there is no
//! internal locking.
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod activation;
pub mod config;
pub mod dense;
pub mod fully_connected;
pub mod sequential;
pub mod utils;

use displaydoc::Display;
use log::trace;
use ndarray::{Array1, ArrayView1, ArrayViewD, ArrayViewMutD, NdFloat};
use thiserror::Error;

use crate::config::Pairing;

/// The two passes of back-propagation.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Pass {
    /// forward
    Forward,
    /// backward
    Backward,
}

/// The state of a layer between passes.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum PassState {
    /// ready
    Ready,
    /// waiting for backward
    HasCache,
}

/// Failed to run a pass through a layer.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum PassError {
    /// {layer}: expected a vector with {expected} elements, got {got}
    DimensionMismatch {
        layer: &'static str,
        expected: usize,
        got: usize,
    },
    /// {layer}: can't run the {pass} pass while {state}
    StatePrecondition {
        layer: &'static str,
        pass: Pass,
        state: PassState,
    },
}

/// Fails with [`PassError::DimensionMismatch`] if `got != expected`.
pub(crate) fn check_size(layer: &'static str, expected: usize, got: usize) -> Result<(), PassError> {
    if expected == got {
        Ok(())
    } else {
        Err(PassError::DimensionMismatch {
            layer,
            expected,
            got,
        })
    }
}

/// The uniform interface of all layers.
///
/// `parameters()` and `parameter_gradients()` always return lists of the same
/// length and with pairwise equal shapes. The gradients are the ones of the
/// last `backward` pass (zeros before the first one).
pub trait Layer<A = f32>
where
    A: NdFloat,
{
    /// The expected input size, `None` if the layer accepts any size.
    fn input_size(&self) -> Option<usize>;

    /// The produced output size, `None` if it's always the input size.
    fn output_size(&self) -> Option<usize>;

    fn state(&self) -> PassState;

    /// Runs the forward pass and caches what the backward pass needs.
    fn forward(&mut self, input: ArrayView1<A>) -> Result<Array1<A>, PassError>;

    /// Runs the backward pass for the gradient of the loss wrt. the last output.
    ///
    /// Returns the gradient wrt. the last input and keeps the parameter gradients.
    fn backward(&mut self, grad_output: ArrayView1<A>) -> Result<Array1<A>, PassError>;

    /// Drops any pending forward cache.
    fn reset(&mut self);

    /// Mutable views of all parameters, e.g. for an optimizer.
    fn parameters(&mut self) -> Vec<ArrayViewMutD<'_, A>>;

    /// Views of the gradients aligned with [`Layer::parameters()`].
    fn parameter_gradients(&self) -> Vec<ArrayViewD<'_, A>>;
}

/// Holds the data a forward pass leaves for the following backward pass.
#[derive(Clone, Debug)]
pub(crate) struct PassCache<A> {
    pending: Option<Array1<A>>,
    pairing: Pairing,
}

impl<A> PassCache<A>
where
    A: NdFloat,
{
    pub(crate) fn new(pairing: Pairing) -> Self {
        Self {
            pending: None,
            pairing,
        }
    }

    pub(crate) fn set_pairing(&mut self, pairing: Pairing) {
        self.pairing = pairing;
    }

    pub(crate) fn state(&self) -> PassState {
        if self.pending.is_some() {
            PassState::HasCache
        } else {
            PassState::Ready
        }
    }

    /// Stores the forward data, overwriting a pending one only with relaxed pairing.
    pub(crate) fn store(&mut self, layer: &'static str, data: Array1<A>) -> Result<(), PassError> {
        self.check_forward(layer)?;
        trace!("{}: {} -> {}", layer, self.state(), PassState::HasCache);
        self.pending = Some(data);
        Ok(())
    }

    /// The pending forward data, the cache is left untouched.
    pub(crate) fn pending(&self, layer: &'static str) -> Result<&Array1<A>, PassError> {
        self.pending.as_ref().ok_or(PassError::StatePrecondition {
            layer,
            pass: Pass::Backward,
            state: PassState::Ready,
        })
    }

    pub(crate) fn clear(&mut self, layer: &'static str) {
        if self.pending.take().is_some() {
            trace!("{}: {} -> {}", layer, PassState::HasCache, PassState::Ready);
        }
    }

    /// Fails if a forward pass isn't allowed in the current state.
    pub(crate) fn check_forward(&self, layer: &'static str) -> Result<(), PassError> {
        if self.pairing == Pairing::Strict && self.pending.is_some() {
            Err(PassError::StatePrecondition {
                layer,
                pass: Pass::Forward,
                state: PassState::HasCache,
            })
        } else {
            Ok(())
        }
    }
}
