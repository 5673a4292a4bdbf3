//! CopyOps implementation for CpuBackend.

use thdpack::backend::CopyOps;
use thdpack::tensor::Tensor;
use thdpack::{Error, Result};

use crate::tensor::CpuTensor;
use crate::CpuBackend;

impl CopyOps for CpuBackend {
    fn copy_rows(
        dst: &mut CpuTensor,
        dst_start: usize,
        src: &CpuTensor,
        src_start: usize,
        len: usize,
    ) -> Result<()> {
        if dst.dtype() != src.dtype() {
            return Err(Error::dtype_mismatch(dst.dtype(), src.dtype()));
        }
        if dst.ndim() == 0 || src.ndim() == 0 || dst.shape()[1..] != src.shape()[1..] {
            return Err(Error::ShapeMismatch {
                expected: dst.shape().to_vec(),
                got: src.shape().to_vec(),
            });
        }
        if len == 0 {
            return Ok(());
        }
        if dst_start + len > dst.shape()[0] || src_start + len > src.shape()[0] {
            return Err(Error::InvalidShape(format!(
                "copy_rows: [{src_start}, {}) of {} rows into [{dst_start}, {}) of {} rows",
                src_start + len,
                src.shape()[0],
                dst_start + len,
                dst.shape()[0]
            )));
        }

        let row_bytes = dst.row_numel() * dst.dtype().size_in_bytes();
        let src_bytes = &src.as_bytes()[src_start * row_bytes..(src_start + len) * row_bytes];
        dst.as_bytes_mut()[dst_start * row_bytes..(dst_start + len) * row_bytes]
            .copy_from_slice(src_bytes);
        Ok(())
    }
}
