//! MaskOps implementation for CpuBackend.

use thdpack::backend::MaskOps;
use thdpack::dtype::DType;
use thdpack::tensor::Tensor;
use thdpack::{Error, Result};

use crate::tensor::CpuTensor;
use crate::CpuBackend;

impl MaskOps for CpuBackend {
    fn count_true_rows(mask: &CpuTensor) -> Result<Vec<usize>> {
        let (_, seq) = mask_dims(mask)?;
        if seq == 0 {
            return Ok(vec![0; mask.shape()[0]]);
        }
        Ok(mask
            .as_bool_bytes()
            .chunks_exact(seq)
            .map(|row| row.iter().filter(|&&b| b != 0).count())
            .collect())
    }

    fn masked_select_row(input: &CpuTensor, mask: &CpuTensor, row: usize) -> Result<CpuTensor> {
        let (batch, seq) = mask_dims(mask)?;
        check_batched(input.shape(), batch, seq, row)?;

        let inner: usize = input.shape()[2..].iter().product();
        let row_bytes = inner * input.dtype().size_in_bytes();
        let mask_row = &mask.as_bool_bytes()[row * seq..(row + 1) * seq];
        let data = &input.as_bytes()[row * seq * row_bytes..(row + 1) * seq * row_bytes];

        let mut out = Vec::with_capacity(mask_row.len() * row_bytes);
        let mut count = 0usize;
        for (pos, _) in mask_row.iter().enumerate().filter(|(_, &m)| m != 0) {
            out.extend_from_slice(&data[pos * row_bytes..(pos + 1) * row_bytes]);
            count += 1;
        }

        let mut shape = Vec::with_capacity(input.ndim() - 1);
        shape.push(count);
        shape.extend_from_slice(&input.shape()[2..]);
        Ok(CpuTensor::from_raw(&shape, input.dtype(), out))
    }

    fn masked_scatter_row(
        dst: &mut CpuTensor,
        mask: &CpuTensor,
        row: usize,
        src: &CpuTensor,
    ) -> Result<()> {
        let (batch, seq) = mask_dims(mask)?;
        check_batched(dst.shape(), batch, seq, row)?;
        if src.dtype() != dst.dtype() {
            return Err(Error::dtype_mismatch(dst.dtype(), src.dtype()));
        }
        if src.ndim() == 0 || src.shape()[1..] != dst.shape()[2..] {
            return Err(Error::ShapeMismatch {
                expected: dst.shape()[2..].to_vec(),
                got: src.shape().get(1..).unwrap_or_default().to_vec(),
            });
        }

        let mask_row = &mask.as_bool_bytes()[row * seq..(row + 1) * seq];
        let available = mask_row.iter().filter(|&&m| m != 0).count();
        let src_rows = src.shape()[0];
        if src_rows > available {
            return Err(Error::InvalidShape(format!(
                "masked_scatter_row: {src_rows} source rows for {available} masked positions"
            )));
        }

        let row_bytes = src.row_numel() * src.dtype().size_in_bytes();
        let src_bytes = src.as_bytes();
        let base = row * seq * row_bytes;
        let dst_bytes = dst.as_bytes_mut();
        let positions = mask_row
            .iter()
            .enumerate()
            .filter(|(_, &m)| m != 0)
            .map(|(pos, _)| pos);
        for (k, pos) in positions.take(src_rows).enumerate() {
            let at = base + pos * row_bytes;
            dst_bytes[at..at + row_bytes]
                .copy_from_slice(&src_bytes[k * row_bytes..(k + 1) * row_bytes]);
        }
        Ok(())
    }
}

fn mask_dims(mask: &CpuTensor) -> Result<(usize, usize)> {
    if mask.dtype() != DType::Bool {
        return Err(Error::dtype_mismatch(DType::Bool, mask.dtype()));
    }
    match mask.shape() {
        &[batch, seq] => Ok((batch, seq)),
        other => Err(Error::InvalidShape(format!(
            "expected a 2-D (batch, seq) mask, got shape {other:?}"
        ))),
    }
}

fn check_batched(shape: &[usize], batch: usize, seq: usize, row: usize) -> Result<()> {
    if shape.len() < 2 || shape[0] != batch || shape[1] != seq {
        return Err(Error::ShapeMismatch {
            expected: vec![batch, seq],
            got: shape.to_vec(),
        });
    }
    if row >= batch {
        return Err(Error::InvalidShape(format!(
            "row {row} out of range for batch of {batch}"
        )));
    }
    Ok(())
}
