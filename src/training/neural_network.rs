//! Feed-forward regression network
//!
//! Dense layers with ReLU activations and inverted dropout, trained on mean
//! squared error with the Adam optimizer.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KeeperError, Result};

/// Activation function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Linear (identity)
    Linear,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Linear => z.clone(),
        }
    }

    fn derivative(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array2::ones(z.raw_dim()),
        }
    }
}

/// A hidden dense layer and the dropout applied to its output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HiddenLayer {
    pub units: usize,
    /// Fraction of units zeroed during training
    pub dropout: f64,
}

impl HiddenLayer {
    pub fn new(units: usize, dropout: f64) -> Self {
        Self { units, dropout }
    }
}

/// Adam optimizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layers, input side first
    pub hidden_layers: Vec<HiddenLayer>,
    /// Activation for hidden layers
    pub activation: Activation,
    /// Activation of the single output unit
    pub output_activation: Activation,
    pub optimizer: AdamConfig,
    pub epochs: usize,
    pub batch_size: usize,
    /// Seed for weight init, shuffling and dropout masks
    pub random_state: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![
                HiddenLayer::new(256, 0.4),
                HiddenLayer::new(128, 0.3),
                HiddenLayer::new(64, 0.0),
                HiddenLayer::new(32, 0.0),
            ],
            activation: Activation::ReLU,
            output_activation: Activation::ReLU,
            optimizer: AdamConfig::default(),
            epochs: 30,
            batch_size: 64,
            random_state: None,
        }
    }
}

impl NetworkConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_hidden_layers(mut self, layers: Vec<HiddenLayer>) -> Self {
        self.hidden_layers = layers;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    weights: Array2<f64>,
    biases: Array1<f64>,
    activation: Activation,
    dropout: f64,
}

/// First and second moment estimates for one layer
struct AdamState {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

/// Per-layer values kept from the forward pass for backpropagation
struct ForwardCache {
    inputs: Vec<Array2<f64>>,
    z_values: Vec<Array2<f64>>,
    masks: Vec<Option<Array2<f64>>>,
    output: Array2<f64>,
}

/// Regression network with one output unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNetRegressor {
    config: NetworkConfig,
    layers: Vec<DenseLayer>,
    n_features: usize,
    loss_history: Vec<f64>,
    is_fitted: bool,
}

/// Untrained network with the default churn architecture:
/// 256 (dropout 0.4), 128 (dropout 0.3), 64, 32, then one output unit.
pub fn create_model(n_features: usize) -> NeuralNetRegressor {
    NeuralNetRegressor::new(NetworkConfig::default(), n_features)
}

fn make_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

impl NeuralNetRegressor {
    /// Build the layers with Glorot-uniform weights and zero biases
    pub fn new(config: NetworkConfig, n_features: usize) -> Self {
        let mut rng = make_rng(config.random_state);

        let mut sizes = vec![n_features];
        sizes.extend(config.hidden_layers.iter().map(|l| l.units));
        sizes.push(1);

        let n_hidden = config.hidden_layers.len();
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let (n_in, n_out) = (pair[0], pair[1]);
                let limit = (6.0 / (n_in + n_out) as f64).sqrt();
                let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-limit..=limit));
                let (activation, dropout) = if i < n_hidden {
                    (config.activation, config.hidden_layers[i].dropout)
                } else {
                    (config.output_activation, 0.0)
                };
                DenseLayer {
                    weights,
                    biases: Array1::zeros(n_out),
                    activation,
                    dropout,
                }
            })
            .collect();

        Self {
            config,
            layers,
            n_features,
            loss_history: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Units per dense layer, output included
    pub fn layer_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.biases.len()).collect()
    }

    /// Mean training loss of each epoch of the last fit
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    fn check_features(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(KeeperError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Train with mini-batch Adam
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.check_features(x)?;
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(KeeperError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(KeeperError::TrainingError("Empty dataset".into()));
        }

        // Offset so shuffling does not replay the init stream
        let mut rng = make_rng(self.config.random_state.map(|s| s.wrapping_add(1)));
        let mut state: Vec<AdamState> = self
            .layers
            .iter()
            .map(|l| AdamState {
                m_w: Array2::zeros(l.weights.raw_dim()),
                v_w: Array2::zeros(l.weights.raw_dim()),
                m_b: Array1::zeros(l.biases.len()),
                v_b: Array1::zeros(l.biases.len()),
            })
            .collect();

        let batch_size = self.config.batch_size.max(1);
        let mut step = 0i32;
        self.loss_history.clear();

        for epoch in 0..self.config.epochs {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch: Array1<f64> = batch.iter().map(|&i| y[i]).collect();

                let cache = self.forward(&x_batch, Some(&mut rng));
                let residual = &cache.output.column(0) - &y_batch;
                epoch_loss += residual.mapv(|r| r * r).sum();

                let gradients = self.backward(&cache, &y_batch);
                step += 1;
                self.apply_adam(&gradients, &mut state, step);
            }

            let loss = epoch_loss / n_samples as f64;
            debug!(epoch = epoch + 1, loss, "Network epoch");
            self.loss_history.push(loss);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Predict without dropout
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(KeeperError::ModelNotFitted);
        }
        self.check_features(x)?;
        Ok(self.forward(x, None).output.column(0).to_owned())
    }

    /// Dropout masks are drawn only when an rng is supplied
    fn forward(&self, x: &Array2<f64>, mut rng: Option<&mut Xoshiro256PlusPlus>) -> ForwardCache {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut z_values = Vec::with_capacity(self.layers.len());
        let mut masks = Vec::with_capacity(self.layers.len());
        let mut a = x.clone();

        for layer in &self.layers {
            let z = a.dot(&layer.weights) + &layer.biases;
            let mut out = layer.activation.apply(&z);

            let mask = match rng.as_deref_mut() {
                Some(rng) if layer.dropout > 0.0 => {
                    let keep = 1.0 - layer.dropout;
                    let mask = Array2::from_shape_fn(out.raw_dim(), |_| {
                        if rng.gen::<f64>() < keep {
                            1.0 / keep
                        } else {
                            0.0
                        }
                    });
                    out *= &mask;
                    Some(mask)
                }
                _ => None,
            };

            inputs.push(std::mem::replace(&mut a, out));
            z_values.push(z);
            masks.push(mask);
        }

        ForwardCache {
            inputs,
            z_values,
            masks,
            output: a,
        }
    }

    fn backward(&self, cache: &ForwardCache, y: &Array1<f64>) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.len() as f64;
        let y_2d = y.view().insert_axis(Axis(1));

        // d(MSE)/d(output)
        let mut delta = (&cache.output - &y_2d) * (2.0 / n);
        let mut gradients = Vec::with_capacity(self.layers.len());

        for (i, layer) in self.layers.iter().enumerate().rev() {
            if let Some(mask) = &cache.masks[i] {
                delta *= mask;
            }
            delta *= &layer.activation.derivative(&cache.z_values[i]);

            let grad_w = cache.inputs[i].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));

            if i > 0 {
                delta = delta.dot(&layer.weights.t());
            }
            gradients.push((grad_w, grad_b));
        }

        gradients.reverse();
        gradients
    }

    fn apply_adam(&mut self, gradients: &[(Array2<f64>, Array1<f64>)], state: &mut [AdamState], step: i32) {
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config.optimizer;
        let lr_t = learning_rate * (1.0 - beta2.powi(step)).sqrt() / (1.0 - beta1.powi(step));

        for ((layer, s), (grad_w, grad_b)) in self.layers.iter_mut().zip(state.iter_mut()).zip(gradients) {
            s.m_w = &s.m_w * beta1 + grad_w * (1.0 - beta1);
            s.v_w = &s.v_w * beta2 + &grad_w.mapv(|g| g * g) * (1.0 - beta2);
            s.m_b = &s.m_b * beta1 + grad_b * (1.0 - beta1);
            s.v_b = &s.v_b * beta2 + &grad_b.mapv(|g| g * g) * (1.0 - beta2);

            layer.weights -= &(&s.m_w / &s.v_w.mapv(|v| v.sqrt() + epsilon) * lr_t);
            layer.biases -= &(&s.m_b / &s.v_b.mapv(|v| v.sqrt() + epsilon) * lr_t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> NetworkConfig {
        NetworkConfig::default()
            .with_hidden_layers(vec![HiddenLayer::new(8, 0.2), HiddenLayer::new(4, 0.0)])
            .with_epochs(5)
            .with_batch_size(4)
            .with_random_state(42)
    }

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 3), |(i, j)| ((i + j) % 5) as f64 / 5.0);
        let y = x.column(0).mapv(|v| if v > 0.4 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_default_architecture() {
        let model = create_model(12);
        assert_eq!(model.layer_sizes(), vec![256, 128, 64, 32, 1]);
        assert_eq!(model.config().epochs, 30);
        assert_eq!(model.config().batch_size, 64);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = create_model(3);
        let (x, _) = toy_data();
        assert!(matches!(model.predict(&x), Err(KeeperError::ModelNotFitted)));
    }

    #[test]
    fn test_fit_records_losses() {
        let (x, y) = toy_data();
        let mut model = NeuralNetRegressor::new(small_config(), 3);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.loss_history().len(), 5);
        assert!(model.loss_history().iter().all(|l| l.is_finite()));

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.len(), 20);
        // ReLU output
        assert!(predictions.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_seeded_training_is_deterministic() {
        let (x, y) = toy_data();
        let mut a = NeuralNetRegressor::new(small_config(), 3);
        let mut b = NeuralNetRegressor::new(small_config(), 3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_feature_count_mismatch() {
        let (x, y) = toy_data();
        let mut model = NeuralNetRegressor::new(small_config(), 4);
        assert!(matches!(model.fit(&x, &y), Err(KeeperError::ShapeError { .. })));
    }
}
