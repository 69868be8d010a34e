use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Side length of an MNIST image.
pub const IMAGE_SIZE: usize = 28;

const CONV1_CHANNELS: usize = 8;
const CONV2_CHANNELS: usize = 16;

/// Spatial size after the two 2x2 poolings.
const POOLED_SIZE: usize = IMAGE_SIZE / 4;

/// Selects the stochastic layers' behavior for a forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dropout is applied.
    Train,
    /// Dropout is the identity.
    Eval,
}

/// Small two-stage convolutional classifier for 28x28 grayscale digits.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    fc: Linear<B>,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 0.25)]
    pub dropout: f64,
}

impl ModelConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let conv1 = Conv2dConfig::new([1, CONV1_CHANNELS], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([CONV1_CHANNELS, CONV2_CHANNELS], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let fc = LinearConfig::new(CONV2_CHANNELS * POOLED_SIZE * POOLED_SIZE, NUM_CLASSES)
            .init(device);

        Model {
            conv1,
            conv2,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc,
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Model<B> {
    /// Computes the class logits.
    ///
    /// # Shapes
    ///   - Images [batch_size, 1, 28, 28]
    ///   - Output [batch_size, 10]
    pub fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let x = match mode {
            Mode::Train => self.dropout.forward(x),
            Mode::Eval => x,
        };

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        self.fc.forward(x)
    }
}
