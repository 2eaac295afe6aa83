use std::f32::consts::SQRT_2;

use displaydoc::Display;
use ndarray::{Array2, Dimension, IntoDimension, Ix, Ix2, IxDyn};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use thiserror::Error;

/// Can't combine {name_left}({shape_left:?}) with {name_right}({shape_right:?}): {hint}
#[derive(Debug, Display, Error)]
pub struct IncompatibleMatrices {
    name_left: &'static str,
    shape_left: IxDyn,
    name_right: &'static str,
    shape_right: IxDyn,
    hint: &'static str,
}

impl IncompatibleMatrices {
    pub fn new(
        name_left: &'static str,
        shape_left: impl IntoDimension,
        name_right: &'static str,
        shape_right: impl IntoDimension,
        hint: &'static str,
    ) -> Self {
        Self {
            name_left,
            shape_left: shape_left.into_dimension().into_dyn(),
            name_right,
            shape_right: shape_right.into_dimension().into_dyn(),
            hint,
        }
    }
}

/// Samples from `N(0, std_dev²)` truncated at 2σ.
fn truncated_normal<R>(rng: &mut R, dim: Ix2, std_dev: f32) -> Array2<f32>
where
    R: Rng + ?Sized,
{
    let dist = Normal::new(0., std_dev)
        .expect("callers only pass positive and finite standard deviations");
    let limit = 2. * std_dev;

    Array2::from_shape_simple_fn(dim, || loop {
        let res = dist.sample(rng);
        if -limit <= res && res <= limit {
            break res;
        }
    })
}

/// He-Normal Initializer
///
/// Weights for layer `j` are sampled from following normal distribution:
///
/// ```ascii
/// W_j ~ N(μ=0, σ²=2/n_j)
/// ```
///
/// Where `n_j` is the number of input units of this layer.
/// As weights have the shape `(outputs, inputs)` this is the
/// number of columns of `W_j`.
///
/// Furthermore as we want to avoid exceedingly large values
/// we truncate the normal distribution at 2σ.
///
/// Source:
///
/// - Website: https://www.cv-foundation.org/openaccess/content_iccv_2015/html/He_Delving_Deep_into_ICCV_2015_paper.html
/// - Pdf: https://www.cv-foundation.org/openaccess/content_iccv_2015/papers/He_Delving_Deep_into_ICCV_2015_paper.pdf
pub fn he_normal_weights_init<R>(rng: &mut R, dim: impl IntoDimension<Dim = Ix2>) -> Array2<f32>
where
    R: Rng + ?Sized,
{
    let dim = dim.into_dimension();
    let nr_columns = dim[1];

    // Avoids problems with by-0 division.
    if nr_columns == 0 {
        return Array2::zeros(dim);
    }

    truncated_normal(rng, dim, SQRT_2 / (nr_columns as f32).sqrt())
}

/// He-Uniform Initializer
///
/// Weights for layer `j` are sampled from a uniform distribution over
/// `[-√(6/n_j); √(6/n_j)]`.
///
/// Where `n_j` is the number of input units (columns) of `W_j`.
pub fn he_uniform_weights_init<R>(rng: &mut R, dim: impl IntoDimension<Dim = Ix2>) -> Array2<f32>
where
    R: Rng + ?Sized,
{
    let dim = dim.into_dimension();
    let nr_columns = dim[1];

    // Avoids problems with by-0 division.
    if nr_columns == 0 {
        return Array2::zeros(dim);
    }

    let limit = (6.0 / nr_columns as f32).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);

    Array2::from_shape_simple_fn(dim, || dist.sample(rng))
}

/// Glorot-Normal Initializer
///
/// Weights for layer `j` are sampled from following normal distribution:
///
/// ```ascii
/// W_j ~ N(μ=0, σ²=2/(n_j + o_j))
/// ```
///
/// Where `n_j` is the number of input units and `o_j` the number of output
/// units of this layer, i.e. the sum of both dimensions of `W_j`.
///
/// Like for He-Normal the distribution is truncated at 2σ.
///
/// Source:
///
/// - Website: https://proceedings.mlr.press/v9/glorot10a.html
/// - Pdf: https://proceedings.mlr.press/v9/glorot10a/glorot10a.pdf
pub fn glorot_normal_weights_init<R>(rng: &mut R, dim: impl IntoDimension<Dim = Ix2>) -> Array2<f32>
where
    R: Rng + ?Sized,
{
    let dim = dim.into_dimension();
    let in_plus_out: Ix = dim.slice().iter().sum();

    // Avoids problems with by-0 division.
    if in_plus_out == 0 {
        return Array2::zeros(dim);
    }

    truncated_normal(rng, dim, SQRT_2 / (in_plus_out as f32).sqrt())
}

/// Glorot-Uniform Initializer
///
/// Weights for layer `j` are sampled from a uniform distribution over
/// `[-√(6/(n_j+o_j)); √(6/(n_j+o_j))]`.
pub fn glorot_uniform_weights_init<R>(
    rng: &mut R,
    dim: impl IntoDimension<Dim = Ix2>,
) -> Array2<f32>
where
    R: Rng + ?Sized,
{
    let dim = dim.into_dimension();
    let in_plus_out: Ix = dim.slice().iter().sum();

    // Avoids problems with by-0 division.
    if in_plus_out == 0 {
        return Array2::zeros(dim);
    }

    let limit = (6.0 / in_plus_out as f32).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);

    Array2::from_shape_simple_fn(dim, || dist.sample(rng))
}
