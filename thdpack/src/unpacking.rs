//! Unpacking of ragged model output back into a padded batch.
//!
//! Inverse of [`preprocess_packed_seqs`](crate::preprocess_packed_seqs):
//! with context parallelism the per-rank shards are all-gathered first and
//! every rank's front/back chunks are put back at their original positions.

use crate::backend::{CommOps, PackingOps};
use crate::packed_seq::PackedSeqParams;
use crate::packing::check_batch;
use crate::parallel::{load_balanced_chunks, ParallelState};
use crate::tensor::Tensor;
use crate::{Error, Result};

/// Scatter packed output `(1, total / cp_size, ...)` back to
/// `(batch_size, seq_len, ...)`.
///
/// Positions where `attention_mask` is false are zero. When `post_process`
/// is false (not the last pipeline stage) `output` is returned unchanged.
///
/// Every rank of the context-parallel group must call this together, since
/// it all-gathers `output` through `comm`.
///
/// # Errors
/// Returns an error if shapes disagree with `params` or the mask, the
/// gather does not return one shard per rank, or a backend op fails.
#[allow(clippy::too_many_arguments)]
pub fn postprocess_packed_seqs<B: PackingOps + CommOps>(
    device: &B::DeviceHandle,
    output: &B::Tensor,
    params: &PackedSeqParams<B::Tensor>,
    attention_mask: &B::Tensor,
    batch_size: usize,
    seq_len: usize,
    post_process: bool,
    parallel: &dyn ParallelState,
    comm: &B::Comm,
) -> Result<B::Tensor> {
    if !post_process {
        return Ok(output.clone());
    }

    let out_shape = output.shape().to_vec();
    if out_shape.len() < 2 || out_shape[0] != 1 {
        return Err(Error::InvalidShape(format!(
            "expected packed output of shape (1, tokens, ...), got {out_shape:?}"
        )));
    }
    let mut shape = vec![batch_size, seq_len];
    shape.extend_from_slice(&out_shape[2..]);
    check_batch(&shape, attention_mask)?;
    if params.batch_size() != batch_size {
        return Err(Error::ShapeMismatch {
            expected: vec![batch_size + 1],
            got: vec![params.host_cu_seqlens_padded.len()],
        });
    }

    let cp_size = parallel.context_parallel_world_size().max(1);
    let cu = &params.host_cu_seqlens_padded;
    let token_shape = &out_shape[1..];
    let inner_shape = &out_shape[2..];
    if token_shape[0] != params.total_padded() / cp_size {
        return Err(Error::ShapeMismatch {
            expected: vec![1, params.total_padded() / cp_size],
            got: out_shape[..2].to_vec(),
        });
    }
    let valid = B::count_true_rows(attention_mask)?;

    tracing::debug!(
        batch_size,
        seq_len,
        cp_size,
        packed_tokens = token_shape[0],
        "unpacking sequences"
    );

    let mut unpacked = B::zeros(device, &shape, output.dtype())?;

    if cp_size <= 1 {
        let tokens = output.reshape(token_shape);
        for (i, &len) in valid.iter().enumerate() {
            let rows = rows_view(&tokens, cu[i], len, inner_shape);
            B::masked_scatter_row(&mut unpacked, attention_mask, i, &rows)?;
        }
        return Ok(unpacked);
    }

    let gathered = B::all_gather(comm, output)?;
    if gathered.len() != cp_size {
        return Err(Error::Comm(format!(
            "all_gather returned {} shards for a group of {cp_size}",
            gathered.len()
        )));
    }
    let shards: Vec<B::Tensor> = gathered.iter().map(|t| t.reshape(token_shape)).collect();

    for (i, &len) in valid.iter().enumerate() {
        let chunk = params.padded_len(i) / cp_size;
        let full = chunk * cp_size;
        let packed_start = cu[i] / cp_size;

        let mut sample_shape = vec![full];
        sample_shape.extend_from_slice(inner_shape);
        let mut sample = B::zeros(device, &sample_shape, output.dtype())?;
        for (rank, shard) in shards.iter().enumerate() {
            let (front, back) = load_balanced_chunks(full, cp_size, rank);
            B::copy_rows(&mut sample, front.start, shard, packed_start, front.len)?;
            B::copy_rows(
                &mut sample,
                back.start,
                shard,
                packed_start + front.len,
                back.len,
            )?;
        }

        let rows = rows_view(&sample, 0, len.min(full), inner_shape);
        B::masked_scatter_row(&mut unpacked, attention_mask, i, &rows)?;
    }

    Ok(unpacked)
}

/// View of rows `[start, start + len)` of a tensor whose rows have `inner` shape.
fn rows_view<T: Tensor>(tensor: &T, start: usize, len: usize, inner: &[usize]) -> T {
    let row_numel: usize = inner.iter().product();
    let mut shape = Vec::with_capacity(inner.len() + 1);
    shape.push(len);
    shape.extend_from_slice(inner);
    tensor.slice_view(start * row_numel, &shape)
}
