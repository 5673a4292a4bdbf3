//! Accelerator-specific packing strategies.
//!
//! The host picks a strategy once at startup from its [`Accelerator`]
//! setting and calls it for every batch. Both strategies build the same
//! ragged buffer and offsets; they differ only in the attention metadata
//! attached to the descriptor.

use crate::backend::PackingOps;
use crate::config::Accelerator;
use crate::packed_seq::PackedSeqParams;
use crate::packing::pack;
use crate::parallel::ParallelState;
use crate::Result;

/// A way of packing batches for one family of attention kernels.
pub trait SeqPackingStrategy<B: PackingOps>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Pack a `(batch, seq, ...)` batch; see
    /// [`preprocess_packed_seqs`](crate::preprocess_packed_seqs).
    ///
    /// # Errors
    /// Returns an error if the batch and mask disagree or a backend op fails.
    fn preprocess(
        &self,
        device: &B::DeviceHandle,
        input_ids: &B::Tensor,
        attention_mask: &B::Tensor,
        pre_process: bool,
        parallel: &dyn ParallelState,
    ) -> Result<(B::Tensor, PackedSeqParams<B::Tensor>)>;
}

/// Offsets only. Context-parallel attention is handled inside the kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThdPacker;

impl<B: PackingOps> SeqPackingStrategy<B> for ThdPacker {
    fn name(&self) -> &'static str {
        "thd"
    }

    fn preprocess(
        &self,
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
            false,
        )
    }
}

/// Offsets plus the query/kv index split over per-rank offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBalancedThdPacker;

impl<B: PackingOps> SeqPackingStrategy<B> for LoadBalancedThdPacker {
    fn name(&self) -> &'static str {
        "thd-load-balanced"
    }

    fn preprocess(
        &self,
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
}

/// Strategy for the given accelerator.
#[must_use]
pub fn packing_strategy<B: PackingOps>(accelerator: Accelerator) -> Box<dyn SeqPackingStrategy<B>> {
    let strategy: Box<dyn SeqPackingStrategy<B>> = match accelerator {
        Accelerator::Gpu => Box::new(ThdPacker),
        Accelerator::Npu => Box::new(LoadBalancedThdPacker),
    };
    tracing::info!(
        ?accelerator,
        strategy = strategy.name(),
        "selected packing strategy"
    );
    strategy
}
