//! TensorFactory implementation for CpuBackend.

use thdpack::backend::TensorFactory;
use thdpack::dtype::DType;
use thdpack::Result;

use crate::tensor::CpuTensor;
use crate::CpuBackend;

impl TensorFactory for CpuBackend {
    fn zeros(_device: &(), shape: &[usize], dtype: DType) -> Result<CpuTensor> {
        Ok(CpuTensor::zeros(shape, dtype))
    }

    fn from_i32_slice(_device: &(), shape: &[usize], data: &[i32]) -> Result<CpuTensor> {
        check_len(shape, data.len())?;
        Ok(CpuTensor::from_slice(shape, data))
    }

    fn from_i64_slice(_device: &(), shape: &[usize], data: &[i64]) -> Result<CpuTensor> {
        check_len(shape, data.len())?;
        Ok(CpuTensor::from_slice(shape, data))
    }
}

fn check_len(shape: &[usize], len: usize) -> Result<()> {
    let numel: usize = shape.iter().product();
    if numel != len {
        return Err(thdpack::Error::ShapeMismatch {
            expected: shape.to_vec(),
            got: vec![len],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thdpack::tensor::Tensor;

    #[test]
    fn test_zeros_keeps_dtype() {
        let t = CpuBackend::zeros(&(), &[3, 2], DType::BF16).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.dtype(), DType::BF16);
        assert!(t.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_i32_slice() {
        let t = CpuBackend::from_i32_slice(&(), &[3], &[0, 3, 8]).unwrap();
        assert_eq!(t.as_slice::<i32>(), &[0, 3, 8]);
    }

    #[test]
    fn test_from_i64_slice_len_mismatch() {
        let err = CpuBackend::from_i64_slice(&(), &[4], &[1, 2]).unwrap_err();
        assert!(matches!(err, thdpack::Error::ShapeMismatch { .. }));
    }
}
