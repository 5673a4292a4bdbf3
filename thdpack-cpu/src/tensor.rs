//! CPU tensor implementation.

use std::sync::Arc;

use bytemuck::Pod;
use thdpack::dtype::{DType, TensorDType};
use thdpack::tensor::{Device, Tensor};

/// A CPU-resident tensor backed by shared byte storage.
///
/// Uses `Arc<Vec<u8>>` so clones and `slice_view` are cheap (shared backing).
/// Writes go through `Arc::make_mut`, so a tensor that shares storage is
/// copied before it is modified.
#[derive(Clone)]
pub struct CpuTensor {
    data: Arc<Vec<u8>>,
    offset: usize,
    shape: Vec<usize>,
    dtype: DType,
}

impl std::fmt::Debug for CpuTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuTensor")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .finish_non_exhaustive()
    }
}

impl CpuTensor {
    /// Create a tensor from a typed slice.
    #[must_use]
    pub fn from_slice<T: TensorDType + Pod>(shape: &[usize], data: &[T]) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            numel,
            "data len {} != shape product {numel}",
            data.len()
        );
        Self {
            data: Arc::new(bytemuck::cast_slice(data).to_vec()),
            offset: 0,
            shape: shape.to_vec(),
            dtype: T::DTYPE,
        }
    }

    /// Create a `Bool` tensor.
    #[must_use]
    pub fn from_bool(shape: &[usize], data: &[bool]) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(data.len(), numel);
        Self {
            data: Arc::new(data.iter().map(|&b| u8::from(b)).collect()),
            offset: 0,
            shape: shape.to_vec(),
            dtype: DType::Bool,
        }
    }

    /// Create a tensor from raw bytes with a given dtype.
    #[must_use]
    pub fn from_raw(shape: &[usize], dtype: DType, data: Vec<u8>) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(data.len(), numel * dtype.size_in_bytes());
        Self {
            data: Arc::new(data),
            offset: 0,
            shape: shape.to_vec(),
            dtype,
        }
    }

    /// Create a zero-filled tensor.
    #[must_use]
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            data: Arc::new(vec![0u8; numel * dtype.size_in_bytes()]),
            offset: 0,
            shape: shape.to_vec(),
            dtype,
        }
    }

    /// Get the data as a typed slice.
    ///
    /// # Panics
    /// Panics if `T` does not match the tensor's dtype.
    #[must_use]
    pub fn as_slice<T: TensorDType + Pod>(&self) -> &[T] {
        assert_eq!(self.dtype, T::DTYPE, "expected {} tensor", T::DTYPE);
        if self.numel() == 0 {
            // Empty storage has no aligned pointer to cast.
            return &[];
        }
        bytemuck::cast_slice(self.as_bytes())
    }

    /// Copy the data out as a typed Vec.
    ///
    /// # Panics
    /// Panics if `T` does not match the tensor's dtype.
    #[must_use]
    pub fn to_vec<T: TensorDType + Pod>(&self) -> Vec<T> {
        self.as_slice::<T>().to_vec()
    }

    /// Get the data of a `Bool` tensor, one byte per element.
    ///
    /// # Panics
    /// Panics if dtype is not Bool.
    #[must_use]
    pub fn as_bool_bytes(&self) -> &[u8] {
        assert_eq!(self.dtype, DType::Bool, "expected Bool tensor");
        self.as_bytes()
    }

    /// Convert a `Bool` tensor to a Vec of bools.
    ///
    /// # Panics
    /// Panics if dtype is not Bool.
    #[must_use]
    pub fn to_bool_vec(&self) -> Vec<bool> {
        self.as_bool_bytes().iter().map(|&b| b != 0).collect()
    }

    /// Get the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let start = self.offset;
        let end = start + self.size_in_bytes();
        &self.data[start..end]
    }

    /// Get the raw bytes mutably, detaching from any shared storage first.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let start = self.offset;
        let end = start + self.size_in_bytes();
        let data = Arc::make_mut(&mut self.data);
        &mut data[start..end]
    }

    /// Whether both tensors view the same allocation.
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Tensor for CpuTensor {
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
        assert_eq!(
            self.numel(),
            new_numel,
            "reshape: {} elements != {new_numel} elements",
            self.numel()
        );
        Self {
            data: Arc::clone(&self.data),
            offset: self.offset,
            shape: shape.to_vec(),
            dtype: self.dtype,
        }
    }

    fn slice_view(&self, offset: usize, shape: &[usize]) -> Self {
        let elem_size = self.dtype.size_in_bytes();
        let byte_offset = self.offset + offset * elem_size;
        let new_numel: usize = shape.iter().product();
        assert!(
            byte_offset + new_numel * elem_size <= self.data.len(),
            "slice_view out of bounds"
        );
        Self {
            data: Arc::clone(&self.data),
            offset: byte_offset,
            shape: shape.to_vec(),
            dtype: self.dtype,
        }
    }
}
