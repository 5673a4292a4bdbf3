//! Packing of padded, masked batches into the ragged `thd` layout.
//!
//! Padding is stripped from every sample, the valid length is re-padded up
//! to the parallel alignment unit, and all samples are laid back-to-back in
//! one buffer. With context parallelism each rank keeps only its two chunks
//! of every sample (see [`load_balanced_chunks`]), so the buffer holds
//! `sum(padded) / cp_size` rows.
//!
//! ```text
//! mask  [1 1 1 0 0 0 0 0]      padded_len 3     cu_seqlens_padded [0, 3, 8]
//!       [1 1 1 1 1 0 0 0]      padded_len 5     buffer [a0 a1 a2 b0 b1 b2 b3 b4]
//! ```

use crate::backend::PackingOps;
use crate::dtype::DType;
use crate::packed_seq::{CpAttentionIndex, PackedSeqParams, QkvFormat};
use crate::parallel::{align_size, load_balanced_chunks, pad_to_align, ParallelState};
use crate::qkv_index::compute_qkv_index;
use crate::tensor::Tensor;
use crate::{Error, Result};

/// Pack a batch for the fused ragged-attention kernel.
///
/// `input_ids` has shape `(batch, seq, ...)` and `attention_mask` shape
/// `(batch, seq)` with `Bool` entries. When `pre_process` is false (a
/// downstream pipeline stage that already holds packed hidden states), the
/// buffer is not built and `input_ids` is returned as-is alongside the
/// descriptor. Otherwise the packed buffer is returned with shape
/// `(1, sum(padded) / cp_size, ...)`.
///
/// The descriptor always carries the query/kv index split over the
/// per-rank offsets.
///
/// # Errors
/// Returns an error if the mask does not match the batch, a parallel width
/// is zero, the context-parallel rank is out of range, or the backend fails
/// an allocation or copy.
pub fn preprocess_packed_seqs<B: PackingOps>(
    device: &B::DeviceHandle,
    input_ids: &B::Tensor,
    attention_mask: &B::Tensor,
    pre_process: bool,
    parallel: &dyn ParallelState,
) -> Result<(B::Tensor, PackedSeqParams<B::Tensor>)> {
    pack::<B>(
        device,
        input_ids,
        attention_mask,
        pre_process,
        parallel,
        true,
    )
}

pub(crate) fn pack<B: PackingOps>(
    device: &B::DeviceHandle,
    input_ids: &B::Tensor,
    attention_mask: &B::Tensor,
    pre_process: bool,
    parallel: &dyn ParallelState,
    attach_cp_index: bool,
) -> Result<(B::Tensor, PackedSeqParams<B::Tensor>)> {
    check_batch(input_ids.shape(), attention_mask)?;
    let batch_size = input_ids.shape()[0];

    let tp_size = parallel.tensor_parallel_world_size();
    let cp_size = parallel.context_parallel_world_size();
    let cp_rank = parallel.context_parallel_rank();
    if tp_size == 0 || cp_size == 0 {
        return Err(Error::InvalidParallelConfig(format!(
            "parallel widths must be > 0 (tp={tp_size}, cp={cp_size})"
        )));
    }
    if cp_rank >= cp_size {
        return Err(Error::InvalidParallelConfig(format!(
            "context-parallel rank {cp_rank} out of range for cp={cp_size}"
        )));
    }
    let align = align_size(tp_size, cp_size);

    let seqlens = B::count_true_rows(attention_mask)?;
    let seqlens_padded: Vec<usize> = seqlens
        .iter()
        .map(|&len| len + pad_to_align(len, align))
        .collect();
    let cu_seqlens = prefix_sums(&seqlens);
    let cu_seqlens_padded = prefix_sums(&seqlens_padded);
    let max_seqlen = seqlens_padded.iter().copied().max().unwrap_or(0);
    let total_padded = cu_seqlens_padded[batch_size];

    tracing::debug!(
        batch_size,
        align,
        valid_tokens = cu_seqlens[batch_size],
        total_padded,
        tp_size,
        cp_size,
        cp_rank,
        pre_process,
        "packing sequences"
    );

    let packed = if pre_process {
        let mut shape = input_ids.shape()[1..].to_vec();
        shape[0] = total_padded / cp_size;
        let mut buffer = B::zeros(device, &shape, input_ids.dtype())?;
        for i in 0..batch_size {
            let valid = B::masked_select_row(input_ids, attention_mask, i)?;
            fill_sample::<B>(
                &mut buffer,
                &valid,
                cu_seqlens_padded[i],
                seqlens_padded[i],
                cp_size,
                cp_rank,
            )?;
        }
        let mut unsqueezed = Vec::with_capacity(shape.len() + 1);
        unsqueezed.push(1);
        unsqueezed.extend_from_slice(&shape);
        buffer.reshape(&unsqueezed)
    } else {
        input_ids.clone()
    };

    let cu_i32 = to_i32(&cu_seqlens_padded)?;
    let cu_tensor = B::from_i32_slice(device, &[cu_i32.len()], &cu_i32)?;

    let cp_index = if attach_cp_index {
        let div_cp: Vec<usize> = cu_seqlens_padded.iter().map(|&c| c / cp_size).collect();
        let index = compute_qkv_index::<B>(device, &div_cp)?;
        let div_i32 = to_i32(&div_cp)?;
        let div_tensor = B::from_i32_slice(device, &[div_i32.len()], &div_i32)?;
        Some(CpAttentionIndex::new(index, div_tensor))
    } else {
        None
    };

    let params = PackedSeqParams {
        qkv_format: QkvFormat::Thd,
        cu_seqlens_q: cu_tensor.clone(),
        cu_seqlens_kv: cu_tensor.clone(),
        max_seqlen_q: max_seqlen,
        max_seqlen_kv: max_seqlen,
        cu_seqlens_q_padded: cu_tensor.clone(),
        cu_seqlens_kv_padded: cu_tensor,
        host_cu_seqlens_padded: cu_seqlens_padded,
        cp_index,
    };

    Ok((packed, params))
}

/// Write one sample's valid rows into its slot of the packed buffer.
///
/// Without context parallelism the rows land at `offset` unchanged. With it,
/// this rank's front chunk goes first and its mirrored back chunk right
/// after; whatever part of a chunk falls beyond the valid rows stays zero.
fn fill_sample<B: PackingOps>(
    buffer: &mut B::Tensor,
    valid: &B::Tensor,
    offset: usize,
    padded_len: usize,
    cp_size: usize,
    cp_rank: usize,
) -> Result<()> {
    let valid_len = valid.shape()[0];
    if cp_size <= 1 {
        return B::copy_rows(buffer, offset, valid, 0, valid_len);
    }

    let start = offset / cp_size;
    let (front, back) = load_balanced_chunks(padded_len, cp_size, cp_rank);

    let front_len = valid_len.saturating_sub(front.start).min(front.len);
    if front_len > 0 {
        B::copy_rows(buffer, start, valid, front.start, front_len)?;
    }

    let back_end = back.end().min(valid_len);
    if back_end > back.start {
        B::copy_rows(buffer, start + front.len, valid, back.start, back_end - back.start)?;
    }

    tracing::trace!(
        offset,
        padded_len,
        valid_len,
        front_len,
        back_len = back_end.saturating_sub(back.start),
        "placed sample chunks"
    );
    Ok(())
}

/// Validate a `(batch, seq, ...)` batch against its `(batch, seq)` mask.
pub(crate) fn check_batch<T: Tensor>(batch_shape: &[usize], mask: &T) -> Result<()> {
    if batch_shape.len() < 2 {
        return Err(Error::InvalidShape(format!(
            "expected a (batch, seq, ...) tensor, got shape {batch_shape:?}"
        )));
    }
    if mask.dtype() != DType::Bool {
        return Err(Error::dtype_mismatch(DType::Bool, mask.dtype()));
    }
    if mask.shape() != &batch_shape[..2] {
        return Err(Error::ShapeMismatch {
            expected: batch_shape[..2].to_vec(),
            got: mask.shape().to_vec(),
        });
    }
    Ok(())
}

/// `[0, a, a+b, ...]` for lengths `[a, b, ...]`.
fn prefix_sums(lens: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(lens.len() + 1);
    let mut acc = 0usize;
    out.push(acc);
    for &len in lens {
        acc += len;
        out.push(acc);
    }
    out
}

fn to_i32(values: &[usize]) -> Result<Vec<i32>> {
    values
        .iter()
        .map(|&v| {
            i32::try_from(v).map_err(|_| {
                Error::InvalidShape(format!("cumulative length {v} does not fit in i32"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sums() {
        assert_eq!(prefix_sums(&[3, 5]), vec![0, 3, 8]);
        assert_eq!(prefix_sums(&[]), vec![0]);
        assert_eq!(prefix_sums(&[0, 4, 0]), vec![0, 0, 4, 4]);
    }

    #[test]
    fn test_to_i32_overflow() {
        assert_eq!(to_i32(&[0, 7]).unwrap(), vec![0, 7]);
        let too_big = usize::try_from(i32::MAX).unwrap() + 1;
        assert!(matches!(to_i32(&[too_big]), Err(Error::InvalidShape(_))));
    }
}
