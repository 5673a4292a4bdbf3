//! Backend trait and op trait definitions for hardware-agnostic packing.
//!
//! Packing code is generic over `B: Backend` and uses op traits like
//! `MaskOps`, `CopyOps`, etc. to express the few tensor primitives it
//! needs. Each backend implements these traits with its own tensor type.
//!
//! # Design notes
//!
//! - **Op traits extend `Backend`.** They use `Self::Tensor` from the
//!   supertrait, avoiding repetition.
//! - **Allocation takes a device handle.** Ops that create tensors
//!   (`zeros`, `upload_indices_async`) receive `&Self::DeviceHandle`; ops
//!   that only read or write existing tensors do not.
//! - **Collectives are separate.** `CommOps` is only needed by the
//!   unpacker, so the packer never requires a communicator.

use crate::tensor::Tensor;
use crate::DType;
use crate::Result;

// ---- Core backend trait ----

/// A compute backend (CPU, CUDA, NPU, etc.).
pub trait Backend: 'static {
    /// The tensor type for this backend (e.g., `CpuTensor`).
    type Tensor: Tensor + Clone;

    /// Handle to the device tensors are allocated on.
    type DeviceHandle;

    /// Communicator for the context-parallel group.
    type Comm;
}

// ---- Op traits ----

/// Tensor allocation.
pub trait TensorFactory: Backend {
    /// Allocate a zero-filled tensor.
    fn zeros(device: &Self::DeviceHandle, shape: &[usize], dtype: DType) -> Result<Self::Tensor>;

    /// Create an `I32` tensor from host data.
    fn from_i32_slice(
        device: &Self::DeviceHandle,
        shape: &[usize],
        data: &[i32],
    ) -> Result<Self::Tensor>;

    /// Create an `I64` tensor from host data.
    fn from_i64_slice(
        device: &Self::DeviceHandle,
        shape: &[usize],
        data: &[i64],
    ) -> Result<Self::Tensor>;
}

/// Boolean-mask reductions and compaction.
pub trait MaskOps: Backend {
    /// Count the true entries in each row of a 2-D `Bool` mask.
    fn count_true_rows(mask: &Self::Tensor) -> Result<Vec<usize>>;

    /// Select the positions of `input[row]` where `mask[row]` is true.
    ///
    /// `input` has shape `(batch, seq, ...)` and `mask` has shape
    /// `(batch, seq)`. The result has shape `(n_true, ...)` and keeps
    /// the original order.
    fn masked_select_row(
        input: &Self::Tensor,
        mask: &Self::Tensor,
        row: usize,
    ) -> Result<Self::Tensor>;

    /// Write the rows of `src` into the positions of `dst[row]` where
    /// `mask[row]` is true, in order. Inverse of [`masked_select_row`].
    ///
    /// `src` may hold fewer rows than there are true entries; the
    /// remaining positions are left untouched.
    ///
    /// [`masked_select_row`]: MaskOps::masked_select_row
    fn masked_scatter_row(
        dst: &mut Self::Tensor,
        mask: &Self::Tensor,
        row: usize,
        src: &Self::Tensor,
    ) -> Result<()>;
}

/// Slice assignment along dimension 0.
pub trait CopyOps: Backend {
    /// `dst[dst_start..dst_start + len] = src[src_start..src_start + len]`.
    ///
    /// Both tensors must have the same dtype and the same per-row size.
    fn copy_rows(
        dst: &mut Self::Tensor,
        dst_start: usize,
        src: &Self::Tensor,
        src_start: usize,
        len: usize,
    ) -> Result<()>;
}

/// Host-to-device transfers.
pub trait TransferOps: Backend {
    /// Upload an index list as a 1-D `I64` tensor without blocking.
    ///
    /// The copy is only ordered against later work on the same execution
    /// stream; the caller must not assume it has completed on return.
    fn upload_indices_async(device: &Self::DeviceHandle, data: &[i64]) -> Result<Self::Tensor>;
}

/// Collectives over the context-parallel group.
pub trait CommOps: Backend {
    /// Gather `tensor` from every rank in the group, ordered by rank.
    ///
    /// Every rank must call this with a tensor of the same shape and dtype.
    fn all_gather(comm: &Self::Comm, tensor: &Self::Tensor) -> Result<Vec<Self::Tensor>>;
}

/// Everything the packer needs from a backend.
pub trait PackingOps: TensorFactory + MaskOps + CopyOps + TransferOps {}

impl<B: TensorFactory + MaskOps + CopyOps + TransferOps> PackingOps for B {}
