//! Assertions shared by the tests of the workspace.

mod approx_eq;

pub use approx_eq::{FloatLeaves, Leaf};
#[doc(hidden)]
pub use approx_eq::float_leaves;
#[doc(hidden)]
pub use float_cmp::approx_eq;
