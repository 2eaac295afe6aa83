//! Compares the analytic gradients of the backward pass with central differences.

use layer::{
    activation::{Relu, Sigmoid, Tanh},
    fully_connected::{FullyConnected, ReluLayer, SigmoidLayer, TanhLayer},
    sequential::Sequential,
    Layer,
};
use ndarray::{Array1, Array2, ArrayD};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Uniform;
use rstest::rstest;
use test_utils::assert_approx_eq;

const STEP: f64 = 1e-6;
const TOLERANCE: f64 = 1e-4;
/// Minimal distance of reLu pre-activations from the kink at `0`.
const KINK_MARGIN: f64 = 1e-2;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_vector(rng: &mut StdRng, len: usize) -> Array1<f64> {
    let dist = Uniform::new_inclusive(-1., 1.);
    Array1::from_shape_simple_fn(len, || rng.sample(dist))
}

fn random_matrix(rng: &mut StdRng, rows: usize, columns: usize) -> Array2<f64> {
    let dist = Uniform::new_inclusive(-1., 1.);
    Array2::from_shape_simple_fn((rows, columns), || rng.sample(dist))
}

/// A random reLu layer whose pre-activations for `input` keep away from the kink.
fn random_relu_layer(rng: &mut StdRng, input: &Array1<f64>, outputs: usize) -> ReluLayer<f64> {
    loop {
        let layer = ReluLayer::<f64>::new(
            random_matrix(rng, outputs, input.len()),
            random_vector(rng, outputs),
            Relu,
        )
        .unwrap();
        let z_out = layer.dense().run(input.view()).unwrap();
        if z_out.iter().all(|z| z.abs() > KINK_MARGIN) {
            break layer;
        }
    }
}

/// The loss `upstream · layer(input)`, its gradient wrt. the output is `upstream`.
fn loss(layer: &mut dyn Layer<f64>, input: &Array1<f64>, upstream: &Array1<f64>) -> f64 {
    let output = layer.forward(input.view()).unwrap();
    layer.reset();
    output.dot(upstream)
}

fn numeric_input_gradient(
    layer: &mut dyn Layer<f64>,
    input: &Array1<f64>,
    upstream: &Array1<f64>,
) -> Array1<f64> {
    Array1::from_shape_fn(input.len(), |idx| {
        let mut plus = input.clone();
        plus[idx] += STEP;
        let mut minus = input.clone();
        minus[idx] -= STEP;
        (loss(layer, &plus, upstream) - loss(layer, &minus, upstream)) / (2. * STEP)
    })
}

fn shift_parameter(layer: &mut dyn Layer<f64>, parameter: usize, element: usize, delta: f64) {
    let mut parameters = layer.parameters();
    if let Some(value) = parameters[parameter].iter_mut().nth(element) {
        *value += delta;
    }
}

fn numeric_parameter_gradients(
    layer: &mut dyn Layer<f64>,
    input: &Array1<f64>,
    upstream: &Array1<f64>,
) -> Vec<ArrayD<f64>> {
    let shapes = layer
        .parameters()
        .iter()
        .map(|parameter| parameter.raw_dim())
        .collect::<Vec<_>>();

    shapes
        .into_iter()
        .enumerate()
        .map(|(parameter, shape)| {
            let mut gradient = ArrayD::zeros(shape);
            for (element, value) in gradient.iter_mut().enumerate() {
                shift_parameter(layer, parameter, element, STEP);
                let loss_plus = loss(layer, input, upstream);
                shift_parameter(layer, parameter, element, -2. * STEP);
                let loss_minus = loss(layer, input, upstream);
                shift_parameter(layer, parameter, element, STEP);
                *value = (loss_plus - loss_minus) / (2. * STEP);
            }
            gradient
        })
        .collect()
}

fn assert_gradients_match(layer: &mut dyn Layer<f64>, input: &Array1<f64>, upstream: &Array1<f64>) {
    layer.forward(input.view()).unwrap();
    let grad_input = layer.backward(upstream.view()).unwrap();
    let parameter_gradients = layer
        .parameter_gradients()
        .into_iter()
        .map(|gradient| gradient.to_owned())
        .collect::<Vec<_>>();

    let numeric = numeric_input_gradient(layer, input, upstream);
    assert_approx_eq!(f64, grad_input, numeric, epsilon = TOLERANCE);

    let numeric = numeric_parameter_gradients(layer, input, upstream);
    assert_eq!(parameter_gradients.len(), numeric.len());
    for (analytic, numeric) in parameter_gradients.iter().zip(&numeric) {
        assert_eq!(analytic.shape(), numeric.shape());
        assert_approx_eq!(f64, analytic, numeric, epsilon = TOLERANCE);
    }
}

#[rstest(seed, case(1), case(2), case(3), case(4), case(5))]
fn test_relu_layer_gradients(seed: u64) {
    init_logging();
    let mut rng = StdRng::seed_from_u64(seed);
    let input = random_vector(&mut rng, 3);
    let upstream = random_vector(&mut rng, 2);
    let mut layer = random_relu_layer(&mut rng, &input, 2);

    assert_gradients_match(&mut layer, &input, &upstream);
}

#[rstest(seed, case(6), case(7), case(8))]
fn test_smooth_layer_gradients(seed: u64) {
    init_logging();
    let mut rng = StdRng::seed_from_u64(seed);
    let input = random_vector(&mut rng, 3);
    let upstream = random_vector(&mut rng, 2);

    let mut sigmoid: SigmoidLayer<f64> =
        FullyConnected::new(random_matrix(&mut rng, 2, 3), random_vector(&mut rng, 2), Sigmoid)
            .unwrap();
    assert_gradients_match(&mut sigmoid, &input, &upstream);

    let mut tanh: TanhLayer<f64> =
        FullyConnected::new(random_matrix(&mut rng, 2, 3), random_vector(&mut rng, 2), Tanh)
            .unwrap();
    assert_gradients_match(&mut tanh, &input, &upstream);
}

#[rstest(seed, case(9), case(10))]
fn test_stacked_layer_gradients(seed: u64) {
    init_logging();
    let mut rng = StdRng::seed_from_u64(seed);
    let input = random_vector(&mut rng, 3);
    let upstream = random_vector(&mut rng, 2);

    let tanh: TanhLayer<f64> =
        FullyConnected::new(random_matrix(&mut rng, 2, 4), random_vector(&mut rng, 2), Tanh)
            .unwrap();
    let mut stack = Sequential::new()
        .with_layer(random_relu_layer(&mut rng, &input, 4))
        .unwrap()
        .with_layer(tanh)
        .unwrap();

    assert_gradients_match(&mut stack, &input, &upstream);
}
