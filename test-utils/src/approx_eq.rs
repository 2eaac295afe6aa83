use ndarray::{ArrayBase, Data, Dimension, IntoDimension, Ix};

/// A float leaf together with its index in the flattened value.
pub type Leaf = (Vec<Ix>, f64);

/// Asserts that two floats or containers of floats are approximately equal.
///
/// The first argument is the float type the comparison runs in. Leaves are
/// compared with [`float_cmp`] using a margin of `ulps` (default `2`) and
/// `epsilon` (default `0`). Both inputs must have the same shape. Two NaNs
/// count as equal.
///
/// ```
/// use ndarray::arr2;
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(f32, 0.15039155, 0.1503916, ulps = 3);
/// assert_approx_eq!(f64, 0.25, 0.2500001, epsilon = 1e-6);
/// assert_approx_eq!(f32, arr2(&[[1., 2.], [3., 4.]]), vec![vec![1., 2.], vec![3., 4.]]);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($t:ty, $left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = 0., ulps = 2)
    };
    ($t:ty, $left:expr, $right:expr, ulps = $ulps:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = 0., ulps = $ulps)
    };
    ($t:ty, $left:expr, $right:expr, epsilon = $epsilon:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = $epsilon, ulps = 2)
    };
    ($t:ty, $left:expr, $right:expr, epsilon = $epsilon:expr, ulps = $ulps:expr $(,)?) => {{
        let epsilon: $t = $epsilon;
        let ulps = $ulps;
        let left = $crate::float_leaves(&$left);
        let right = $crate::float_leaves(&$right);
        std::assert_eq!(
            left.len(),
            right.len(),
            "the compared values have a different number of elements",
        );
        for ((index, left), (right_index, right)) in left.into_iter().zip(right) {
            std::assert_eq!(
                index, right_index,
                "the compared values have different shapes",
            );
            let (left, right) = (left as $t, right as $t);
            std::assert!(
                (left.is_nan() && right.is_nan())
                    || $crate::approx_eq!($t, left, right, epsilon = epsilon, ulps = ulps),
                "values differ at index {:?}: {:?} != {:?} (epsilon = {:?}, ulps = {:?})",
                index,
                left,
                right,
                epsilon,
                ulps,
            );
        }
    }};
}

/// Flattens floats and containers of floats into their leaves.
///
/// Leaves are pushed in logical order, their indices start with `prefix`.
pub trait FloatLeaves {
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>);
}

impl FloatLeaves for f32 {
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>) {
        leaves.push((prefix.to_vec(), f64::from(*self)));
    }
}

impl FloatLeaves for f64 {
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>) {
        leaves.push((prefix.to_vec(), *self));
    }
}

impl<T> FloatLeaves for &T
where
    T: FloatLeaves + ?Sized,
{
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>) {
        (**self).push_leaves(prefix, leaves);
    }
}

impl<T> FloatLeaves for [T]
where
    T: FloatLeaves,
{
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>) {
        for (idx, value) in self.iter().enumerate() {
            let mut index = prefix.to_vec();
            index.push(idx);
            value.push_leaves(&index, leaves);
        }
    }
}

impl<T> FloatLeaves for Vec<T>
where
    T: FloatLeaves,
{
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>) {
        self.as_slice().push_leaves(prefix, leaves);
    }
}

impl<S, D> FloatLeaves for ArrayBase<S, D>
where
    S: Data,
    S::Elem: FloatLeaves,
    D: Dimension,
{
    fn push_leaves(&self, prefix: &[Ix], leaves: &mut Vec<Leaf>) {
        for (idx, value) in self.indexed_iter() {
            let mut index = prefix.to_vec();
            index.extend_from_slice(idx.into_dimension().slice());
            value.push_leaves(&index, leaves);
        }
    }
}

#[doc(hidden)]
pub fn float_leaves<T>(value: &T) -> Vec<Leaf>
where
    T: FloatLeaves + ?Sized,
{
    let mut leaves = Vec::new();
    value.push_leaves(&[], &mut leaves);
    leaves
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2, Array2};

    use super::*;

    #[test]
    fn test_leaves_are_in_logical_order() {
        let transposed = arr2(&[[1.0f32, 3.0], [2.0, 4.0]]).reversed_axes();
        assert_eq!(
            float_leaves(&transposed),
            vec![
                (vec![0, 0], 1.0),
                (vec![0, 1], 2.0),
                (vec![1, 0], 3.0),
                (vec![1, 1], 4.0),
            ],
        );
        assert_eq!(
            float_leaves(&vec![arr1(&[0.5f64]), arr1(&[1.5])]),
            vec![(vec![0, 0], 0.5), (vec![1, 0], 1.5)],
        );
    }

    #[test]
    fn test_f32_arrays() {
        assert_approx_eq!(f32, arr1(&[0.1f32 + 0.2, 1.0]), arr1(&[0.3, 1.0]));
        assert_approx_eq!(f32, &arr2(&[[1.0f32, f32::NAN]]).view(), vec![vec![1.0, f32::NAN]]);
    }

    #[test]
    fn test_f64_arrays() {
        let sum = arr2(&[[0.1f64 + 0.2, 1e-9]]);
        assert_approx_eq!(f64, sum, arr2(&[[0.3, 0.0]]), epsilon = 1e-8);
        assert_approx_eq!(f64, sum.into_dyn(), vec![vec![0.3, 1e-9]], ulps = 1);
    }

    #[test]
    fn test_comparing_as_f32_ignores_f64_precision() {
        assert_approx_eq!(f32, 1.0f64, 1.0 + 1e-12);
    }

    #[test]
    #[should_panic(expected = "values differ at index [0, 1]")]
    fn test_different_values_fail() {
        assert_approx_eq!(f64, arr2(&[[1.0, 2.0]]), arr2(&[[1.0, 2.001]]), epsilon = 1e-4);
    }

    #[test]
    #[should_panic(expected = "different shapes")]
    fn test_different_shapes_fail() {
        assert_approx_eq!(f32, Array2::<f32>::zeros((2, 2)), arr1(&[0.0f32; 4]));
    }

    #[test]
    #[should_panic(expected = "different number of elements")]
    fn test_different_lengths_fail() {
        assert_approx_eq!(f32, arr1(&[1.0f32]), arr1(&[1.0f32, 2.0]));
    }
}
