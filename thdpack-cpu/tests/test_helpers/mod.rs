//! Shared helpers for CPU packing integration tests.
//!
//! Builds padded batches with recognisable token values and runs a closure
//! once per context-parallel rank on its own thread.

#![allow(dead_code)]

use std::thread;

use thdpack::{ParallelConfig, Tensor};
use thdpack_cpu::{CpuComm, CpuTensor};

/// Token value for `(sample, pos)`. Never zero, so packing padding is
/// distinguishable from real tokens.
pub fn token(sample: usize, pos: usize) -> i64 {
    i64::try_from((sample + 1) * 100 + pos).unwrap()
}

/// A `(batch, width)` I64 batch where every position holds [`token`].
pub fn token_batch(batch: usize, width: usize) -> CpuTensor {
    let data: Vec<i64> = (0..batch)
        .flat_map(|b| (0..width).map(move |p| token(b, p)))
        .collect();
    CpuTensor::from_slice(&[batch, width], &data)
}

/// A `(lens.len(), width)` mask whose rows are left-aligned runs of `true`.
pub fn prefix_mask(lens: &[usize], width: usize) -> CpuTensor {
    let data: Vec<bool> = lens
        .iter()
        .flat_map(|&len| (0..width).map(move |p| p < len))
        .collect();
    CpuTensor::from_bool(&[lens.len(), width], &data)
}

/// Rows of a mask as bool vectors.
pub fn mask_rows(mask: &CpuTensor) -> Vec<Vec<bool>> {
    let width = mask.shape()[1];
    mask.to_bool_vec()
        .chunks(width)
        .map(<[bool]>::to_vec)
        .collect()
}

/// The tokens of `batch` selected by `mask`, per sample.
pub fn masked_tokens(batch: &CpuTensor, mask: &CpuTensor) -> Vec<Vec<i64>> {
    let width = mask.shape()[1];
    let ids = batch.to_vec::<i64>();
    mask_rows(mask)
        .iter()
        .enumerate()
        .map(|(b, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, &m)| m)
                .map(|(p, _)| ids[b * width + p])
                .collect()
        })
        .collect()
}

/// `batch` with every unmasked position zeroed.
pub fn zero_unmasked(batch: &CpuTensor, mask: &CpuTensor) -> Vec<i64> {
    batch
        .to_vec::<i64>()
        .into_iter()
        .zip(mask.to_bool_vec())
        .map(|(v, m)| if m { v } else { 0 })
        .collect()
}

/// Run `f` once per context-parallel rank, each on its own thread, and
/// return the results ordered by rank.
pub fn run_cp_group<R, F>(tp_size: usize, cp_size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ParallelConfig, CpuComm) -> R + Sync,
{
    let comms = CpuComm::group(cp_size);
    let f = &f;
    thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| {
                let parallel = ParallelConfig::new(tp_size, cp_size, rank).unwrap();
                s.spawn(move || f(parallel, comm))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}
