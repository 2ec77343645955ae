//! Backend type aliases and device selection
//!
//! Both networks are small enough that the CPU NdArray backend is used for
//! training and inference alike.

use burn::backend::{
    Autodiff,
    ndarray::{NdArray, NdArrayDevice},
};

/// Backend the agent trains on
pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Backend without gradient tracking, used for target networks and evaluation
pub type InferenceBackend = NdArray<f32>;

/// The CPU device
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;

    #[test]
    fn test_backends_share_device() {
        let device = default_device();
        let train = Tensor::<TrainingBackend, 1>::ones([3], &device);
        let infer = Tensor::<InferenceBackend, 1>::ones([3], &device);
        assert_eq!(train.inner().into_data(), infer.into_data());
    }
}
