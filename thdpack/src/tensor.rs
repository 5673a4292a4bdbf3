//! Tensor trait definition

use std::fmt;

use crate::dtype::DType;

/// Where a tensor's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host memory
    Cpu,
    /// CUDA device with the given ordinal
    Cuda(usize),
    /// NPU device with the given ordinal
    Npu(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Self::Npu(ordinal) => write!(f, "npu:{ordinal}"),
        }
    }
}

/// Core tensor trait that defines the interface for all tensor implementations
///
/// Different backends implement this trait to provide hardware-specific
/// storage while packing code stays backend-agnostic.
pub trait Tensor: Sized {
    /// Returns the shape of the tensor as a slice of dimensions
    fn shape(&self) -> &[usize];

    /// Returns the data type of tensor elements
    fn dtype(&self) -> DType;

    /// Returns the device the tensor's storage lives on
    fn device(&self) -> Device;

    /// Create a view with a different shape (same data, same number of elements).
    ///
    /// # Panics
    /// Panics if the new shape has a different number of elements.
    #[must_use]
    fn reshape(&self, shape: &[usize]) -> Self;

    /// Create a zero-copy sub-slice view starting at element `offset` with the
    /// given `shape`.
    ///
    /// # Panics
    /// Panics if the view extends beyond the backing allocation.
    #[must_use]
    fn slice_view(&self, offset: usize, shape: &[usize]) -> Self;

    /// Returns the total number of elements in the tensor
    fn numel(&self) -> usize {
        self.shape().iter().product()
    }

    /// Returns the number of dimensions (rank) of the tensor
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements in one step along dimension 0.
    fn row_numel(&self) -> usize {
        self.shape().iter().skip(1).product()
    }

    /// Returns the size of the tensor data in bytes
    fn size_in_bytes(&self) -> usize {
        self.numel() * self.dtype().size_in_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[derive(Clone)]
    struct FakeTensor {
        shape: Vec<usize>,
        dtype: DType,
    }

    impl Tensor for FakeTensor {
        fn shape(&self) -> &[usize] {
            &self.shape
        }

        fn dtype(&self) -> DType {
            self.dtype
        }

        fn device(&self) -> Device {
            Device::Cpu
        }

        fn reshape(&self, shape: &[usize]) -> Self {
            let new_numel: usize = shape.iter().product();
            assert_eq!(self.numel(), new_numel);
            Self {
                shape: shape.to_vec(),
                dtype: self.dtype,
            }
        }

        fn slice_view(&self, _offset: usize, shape: &[usize]) -> Self {
            Self {
                shape: shape.to_vec(),
                dtype: self.dtype,
            }
        }
    }

    fn fake(shape: &[usize], dtype: DType) -> FakeTensor {
        FakeTensor {
            shape: shape.to_vec(),
            dtype,
        }
    }

    #[test]
    fn test_numel() {
        assert_eq!(fake(&[2, 3, 4], DType::I64).numel(), 24);
        assert_eq!(fake(&[], DType::I64).numel(), 1);
    }

    #[test]
    fn test_row_numel() {
        assert_eq!(fake(&[2, 8], DType::I64).row_numel(), 8);
        assert_eq!(fake(&[16, 4, 32], DType::BF16).row_numel(), 128);
        assert_eq!(fake(&[5], DType::I32).row_numel(), 1);
    }

    #[test]
    fn test_ndim() {
        assert_eq!(fake(&[2, 3], DType::F16).ndim(), 2);
    }

    #[test]
    fn test_reshape_unsqueeze() {
        let t = fake(&[8, 4], DType::BF16);
        assert_eq!(t.reshape(&[1, 8, 4]).shape(), &[1, 8, 4]);
    }

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(fake(&[2, 3], DType::I64).size_in_bytes(), 48);
        assert_eq!(fake(&[2, 3], DType::Bool).size_in_bytes(), 6);
        assert_eq!(fake(&[4], DType::BF16).size_in_bytes(), 8);
    }

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Npu(3).to_string(), "npu:3");
        assert_eq!(Device::Cuda(0).to_string(), "cuda:0");
    }
}
