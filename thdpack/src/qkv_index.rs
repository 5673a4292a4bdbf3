//! Query / key-value index split for context-parallel causal attention.
//!
//! Each sample's span in the flattened per-rank token stream is cut at its
//! midpoint: the front half is key/value-only context, the back half is the
//! query region. The fused NPU attention kernel uses the two index lists to
//! balance causal-mask work across context-parallel ranks.

use crate::backend::TransferOps;
use crate::Result;

/// Query and key/value positions, uploaded to the device.
#[derive(Debug, Clone)]
pub struct QkvIndex<T> {
    /// Positions in the back half of every sample.
    pub q_index: T,
    /// Positions in the front half of every sample.
    pub kv_index: T,
}

/// Split `[0, seq_lens.last())` into `(q_index, kv_index)` on the host.
///
/// `seq_lens` holds the cumulative end offset of each sample (the leading 0
/// is implicit). For a sample spanning `[prev, end)` with
/// `mid = (prev + end) / 2`, `[prev, mid)` goes to kv and `[mid, end)` to q,
/// so an odd-length sample puts its extra token in the query half.
///
/// Ranges are clamped to `[0, seq_lens.last())`. A decreasing offset yields
/// empty ranges rather than an error.
#[must_use]
pub fn split_qkv_indices(seq_lens: &[usize]) -> (Vec<i64>, Vec<i64>) {
    let Some(&total) = seq_lens.last() else {
        return (Vec::new(), Vec::new());
    };

    let mut q_index = Vec::with_capacity(total - total / 2);
    let mut kv_index = Vec::with_capacity(total / 2);
    let mut prev = 0usize;
    for &end in seq_lens {
        let mid = (end + prev) / 2;
        push_range(&mut kv_index, prev, mid, total);
        push_range(&mut q_index, mid, end, total);
        prev = end;
    }
    (q_index, kv_index)
}

#[allow(clippy::cast_possible_wrap)]
fn push_range(out: &mut Vec<i64>, start: usize, end: usize, total: usize) {
    let end = end.min(total);
    if start < end {
        out.extend((start..end).map(|i| i as i64));
    }
}

/// Compute the query/kv split and upload both lists without blocking.
///
/// # Errors
/// Returns an error if the backend fails to allocate or transfer the indices.
pub fn compute_qkv_index<B: TransferOps>(
    device: &B::DeviceHandle,
    seq_lens: &[usize],
) -> Result<QkvIndex<B::Tensor>> {
    let (q, kv) = split_qkv_indices(seq_lens);
    tracing::trace!(
        samples = seq_lens.len(),
        q_len = q.len(),
        kv_len = kv.len(),
        "computed qkv index split"
    );
    let kv_index = B::upload_indices_async(device, &kv)?;
    let q_index = B::upload_indices_async(device, &q)?;
    Ok(QkvIndex { q_index, kv_index })
}
