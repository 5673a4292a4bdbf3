//! TransferOps implementation for CpuBackend.
//!
//! Host and device are the same memory, so the upload completes before it
//! returns; that trivially satisfies the stream-ordering contract.

use thdpack::backend::TransferOps;
use thdpack::Result;

use crate::tensor::CpuTensor;
use crate::CpuBackend;

impl TransferOps for CpuBackend {
    fn upload_indices_async(_device: &(), data: &[i64]) -> Result<CpuTensor> {
        Ok(CpuTensor::from_slice(&[data.len()], data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thdpack::dtype::DType;
    use thdpack::tensor::Tensor;

    #[test]
    fn test_upload_indices() {
        let t = CpuBackend::upload_indices_async(&(), &[0, 3, 4]).unwrap();
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.dtype(), DType::I64);
        assert_eq!(t.as_slice::<i64>(), &[0, 3, 4]);
    }

    #[test]
    fn test_upload_empty() {
        let t = CpuBackend::upload_indices_async(&(), &[]).unwrap();
        assert_eq!(t.shape(), &[0]);
        assert!(t.as_slice::<i64>().is_empty());
    }
}
