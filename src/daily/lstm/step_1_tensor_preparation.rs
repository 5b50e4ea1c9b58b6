// External crates
use burn::tensor::{backend::Backend, Tensor, TensorData};
use ndarray::ArrayView2;

// Internal modules
use crate::daily::step_1_window_builder::WindowSet;

/// Converts every window into a tensor of shape `[n, lookback, features]`.
pub fn windows_to_tensor<B: Backend>(windows: &WindowSet, device: &B::Device) -> Tensor<B, 3> {
    let shape = [windows.len(), windows.lookback(), windows.n_features()];
    let data: Vec<f32> = windows.inputs().iter().map(|v| *v as f32).collect();
    Tensor::from_data(TensorData::new(data, shape), device)
}

/// Converts the targets into a column tensor of shape `[n, 1]`.
pub fn targets_to_tensor<B: Backend>(windows: &WindowSet, device: &B::Device) -> Tensor<B, 2> {
    let data: Vec<f32> = windows.targets().iter().map(|v| *v as f32).collect();
    Tensor::from_data(TensorData::new(data, [windows.len(), 1]), device)
}

/// A single window as a batch of one, `[1, lookback, features]`.
pub fn window_to_tensor<B: Backend>(window: ArrayView2<'_, f64>, device: &B::Device) -> Tensor<B, 3> {
    let (lookback, features) = window.dim();
    let data: Vec<f32> = window.iter().map(|v| *v as f32).collect();
    Tensor::from_data(TensorData::new(data, [1, lookback, features]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily::step_1_window_builder::WindowBuilder;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::Array2;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_tensor_shapes_and_values() {
        let matrix = Array2::from_shape_fn((6, 2), |(r, c)| (r * 2 + c) as f64);
        let windows = WindowBuilder::new(3, 0).build(&matrix).unwrap();
        let device = NdArrayDevice::default();

        let x = windows_to_tensor::<TestBackend>(&windows, &device);
        let y = targets_to_tensor::<TestBackend>(&windows, &device);
        assert_eq!(x.dims(), [3, 3, 2]);
        assert_eq!(y.dims(), [3, 1]);

        let values = x.to_data().to_vec::<f32>().unwrap();
        // Second window starts at row 1
        assert_eq!(values[6], 2.0);
        let targets = y.to_data().to_vec::<f32>().unwrap();
        assert_eq!(targets, vec![6.0, 8.0, 10.0]);

        let single = window_to_tensor::<TestBackend>(windows.window(2), &device);
        assert_eq!(single.dims(), [1, 3, 2]);
    }
}
