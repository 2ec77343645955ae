//! Q-value networks for the Flappy Bird agent
//!
//! Two fixed architectures are provided, one per [`StateKind`]:
//!
//! ```text
//! Vector: [batch, 1, 1, 8]
//!   ↓ Flatten: [batch, 8]
//!   ↓ Linear(8 → 16) + LeakyReLU(0.2)
//!   ↓ Linear(16 → 16) + LeakyReLU(0.2)
//!   ↓ Linear(16 → 8) + LeakyReLU(0.2)
//!   ↓ Linear(8 → 2) → Q-values
//!
//! Image: [batch, 3, 36, 64]
//!   ↓ Conv2d(3→8, k=8, s=2) + LeakyReLU(0.2)   → [batch, 8, 15, 29]
//!   ↓ Conv2d(8→16, k=4, s=2) + LeakyReLU(0.2)  → [batch, 16, 6, 13]
//!   ↓ Flatten: [batch, 1248]
//!   ↓ Linear(1248 → 16) + LeakyReLU(0.2)
//!   ↓ Linear(16 → 8) + LeakyReLU(0.2)
//!   ↓ Linear(8 → 2) → Q-values
//! ```
//!
//! The second axis of the input is the observation window, so stacked image
//! frames act as input channels.
//!
//! # Example
//!
//! ```rust
//! use flappy_rl::rl::{QNetworkConfig, StateKind};
//! use burn::backend::ndarray::NdArrayDevice;
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! let device = NdArrayDevice::default();
//! let config = QNetworkConfig::for_state_kind(StateKind::Vector, 2);
//! let network = config.init::<NdArray<f32>>(&device);
//!
//! let q_values = network.forward(Tensor::zeros([4, 1, 1, 8], &device));
//! assert_eq!(q_values.dims(), [4, 2]);
//! ```

use std::fmt;

use burn::{
    module::Module,
    nn::{
        Linear, LinearConfig,
        conv::{Conv2d, Conv2dConfig},
    },
    tensor::{Tensor, activation::leaky_relu, backend::Backend},
};

use super::observation::StateKind;

/// Slope of every LeakyReLU activation
const NEGATIVE_SLOPE: f64 = 0.2;

/// A convolution layer description: output channels, square kernel, stride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSpec {
    pub channels: usize,
    pub kernel: usize,
    pub stride: usize,
}

impl ConvSpec {
    /// Output length of a valid (unpadded) convolution along one axis
    fn output_len(&self, input: usize) -> usize {
        (input - self.kernel) / self.stride + 1
    }
}

/// Configuration of a [`QNetwork`]
#[derive(Debug, Clone, PartialEq)]
pub struct QNetworkConfig {
    /// Number of stacked observations fed at once
    pub window_length: usize,

    /// `[rows, cols]` of a single observation
    pub frame_dims: [usize; 2],

    /// Number of Q-values to output
    pub num_actions: usize,

    /// Convolution layers applied before flattening (empty for vectors)
    pub conv_layers: Vec<ConvSpec>,

    /// Widths of the hidden fully connected layers
    pub hidden_layers: Vec<usize>,
}

impl QNetworkConfig {
    /// Multilayer perceptron over one vector observation
    pub fn vector(num_actions: usize) -> Self {
        Self {
            window_length: 1,
            frame_dims: StateKind::Vector.frame_dims(),
            num_actions,
            conv_layers: Vec::new(),
            hidden_layers: vec![16, 16, 8],
        }
    }

    /// Small convolutional network over the last three image frames
    pub fn image(num_actions: usize) -> Self {
        Self {
            window_length: 3,
            frame_dims: StateKind::Image.frame_dims(),
            num_actions,
            conv_layers: vec![
                ConvSpec {
                    channels: 8,
                    kernel: 8,
                    stride: 2,
                },
                ConvSpec {
                    channels: 16,
                    kernel: 4,
                    stride: 2,
                },
            ],
            hidden_layers: vec![16, 8],
        }
    }

    pub fn for_state_kind(kind: StateKind, num_actions: usize) -> Self {
        match kind {
            StateKind::Vector => Self::vector(num_actions),
            StateKind::Image => Self::image(num_actions),
        }
    }

    /// Number of features entering the first fully connected layer
    pub fn flattened_dim(&self) -> usize {
        if self.conv_layers.is_empty() {
            return self.window_length * self.frame_dims[0] * self.frame_dims[1];
        }

        let [mut rows, mut cols] = self.frame_dims;
        for spec in &self.conv_layers {
            rows = spec.output_len(rows);
            cols = spec.output_len(cols);
        }
        let channels = self.conv_layers.last().map_or(0, |spec| spec.channels);
        channels * rows * cols
    }

    /// Initialize a network with fresh weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        let mut in_channels = self.window_length;
        let convs = self
            .conv_layers
            .iter()
            .map(|spec| {
                let conv = Conv2dConfig::new(
                    [in_channels, spec.channels],
                    [spec.kernel, spec.kernel],
                )
                .with_stride([spec.stride, spec.stride])
                .init(device);
                in_channels = spec.channels;
                conv
            })
            .collect();

        let mut in_features = self.flattened_dim();
        let hidden = self
            .hidden_layers
            .iter()
            .map(|&width| {
                let layer = LinearConfig::new(in_features, width).init(device);
                in_features = width;
                layer
            })
            .collect();

        QNetwork {
            convs,
            hidden,
            output: LinearConfig::new(in_features, self.num_actions).init(device),
        }
    }
}

impl fmt::Display for QNetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [rows, cols] = self.frame_dims;
        write!(f, "input [{}, {rows}, {cols}]", self.window_length)?;
        for spec in &self.conv_layers {
            write!(
                f,
                " -> conv({}, {k}x{k}, s{})",
                spec.channels,
                spec.stride,
                k = spec.kernel
            )?;
        }
        write!(f, " -> flatten({})", self.flattened_dim())?;
        for width in &self.hidden_layers {
            write!(f, " -> dense({width})")?;
        }
        write!(f, " -> dense({})", self.num_actions)
    }
}

/// Feed-forward network mapping an observation window to one Q-value per action
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    convs: Vec<Conv2d<B>>,
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass
    ///
    /// `input` has shape `[batch, window, rows, cols]`; the result is
    /// `[batch, num_actions]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = input;
        for conv in &self.convs {
            x = leaky_relu(conv.forward(x), NEGATIVE_SLOPE);
        }

        let [batch_size, channels, height, width] = x.dims();
        let mut x = x.reshape([batch_size, channels * height * width]);

        for layer in &self.hidden {
            x = leaky_relu(layer.forward(x), NEGATIVE_SLOPE);
        }

        self.output.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_vector_forward_shape() {
        let device = NdArrayDevice::default();
        let network = QNetworkConfig::vector(2).init::<TestBackend>(&device);

        for batch_size in [1, 4, 32] {
            let q_values = network.forward(Tensor::zeros([batch_size, 1, 1, 8], &device));
            assert_eq!(q_values.dims(), [batch_size, 2]);
        }
    }

    #[test]
    fn test_image_forward_shape() {
        let device = NdArrayDevice::default();
        let network = QNetworkConfig::image(2).init::<TestBackend>(&device);

        let q_values = network.forward(Tensor::zeros([2, 3, 36, 64], &device));
        assert_eq!(q_values.dims(), [2, 2]);
    }

    #[test]
    fn test_flattened_dims() {
        assert_eq!(QNetworkConfig::vector(2).flattened_dim(), 8);
        assert_eq!(QNetworkConfig::image(2).flattened_dim(), 16 * 6 * 13);
    }

    #[test]
    fn test_parameter_counts() {
        let device = NdArrayDevice::default();

        let vector = QNetworkConfig::vector(2).init::<TestBackend>(&device);
        // 8*16+16 + 16*16+16 + 16*8+8 + 8*2+2
        assert_eq!(vector.num_params(), 570);

        let image = QNetworkConfig::image(2).init::<TestBackend>(&device);
        // conv: 3*8*64+8, 8*16*16+16; dense: 1248*16+16, 16*8+8, 8*2+2
        assert_eq!(image.num_params(), 1544 + 2064 + 19984 + 136 + 18);
    }

    #[test]
    fn test_window_sets_input_channels() {
        let device = NdArrayDevice::default();
        let config = QNetworkConfig {
            window_length: 4,
            ..QNetworkConfig::image(2)
        };
        let network = config.init::<TestBackend>(&device);

        let q_values = network.forward(Tensor::zeros([1, 4, 36, 64], &device));
        assert_eq!(q_values.dims(), [1, 2]);
    }

    #[test]
    fn test_summary_lists_layers() {
        let summary = QNetworkConfig::image(2).to_string();
        assert_eq!(
            summary,
            "input [3, 36, 64] -> conv(8, 8x8, s2) -> conv(16, 4x4, s2) -> flatten(1248) \
             -> dense(16) -> dense(8) -> dense(2)"
        );
    }

    #[test]
    fn test_gradient_flow() {
        let device = NdArrayDevice::default();
        let network = QNetworkConfig::image(2).init::<TestAutodiffBackend>(&device);

        let input = Tensor::ones([1, 3, 36, 64], &device).require_grad();
        let loss = network.forward(input.clone()).sum();
        let gradients = loss.backward();

        let grad = input.grad(&gradients).expect("input should receive gradients");
        let grad_data: TensorData = grad.into_data();
        let grad_sum: f32 = grad_data.as_slice::<f32>().unwrap().iter().map(|g| g.abs()).sum();
        assert!(grad_sum > 0.0, "gradients should be non-zero");
    }

    #[test]
    fn test_deterministic_forward() {
        let device = NdArrayDevice::default();
        let network = QNetworkConfig::vector(2).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], [1, 1, 1, 8]),
            &device,
        );

        let first = network.forward(input.clone()).into_data();
        let second = network.forward(input).into_data();
        assert_eq!(first, second);
    }
}
