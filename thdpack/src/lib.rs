//! thdpack: packed-sequence preprocessing for ragged attention kernels
//!
//! This crate provides the backend-agnostic packing logic, the tensor and
//! backend traits it is written against, and the descriptor handed to
//! fused attention. Backend-specific implementations (CPU, etc.) are in
//! separate crates.

#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod backend;
pub mod config;
pub mod dtype;
pub mod error;
pub mod packed_seq;
pub mod packing;
pub mod parallel;
pub mod qkv_index;
pub mod strategy;
pub mod tensor;
pub mod unpacking;

pub use backend::{
    Backend, CommOps, CopyOps, MaskOps, PackingOps, TensorFactory, TransferOps,
};
pub use config::{Accelerator, PackingConfig};
pub use dtype::{DType, TensorDType};
pub use error::{Error, Result};
pub use packed_seq::{CpAttentionIndex, PackedSeqParams, QkvFormat};
pub use packing::preprocess_packed_seqs;
pub use parallel::{
    align_size, load_balanced_chunks, pad_to_align, Chunk, ParallelConfig, ParallelState,
};
pub use qkv_index::{compute_qkv_index, split_qkv_indices, QkvIndex};
pub use strategy::{packing_strategy, LoadBalancedThdPacker, SeqPackingStrategy, ThdPacker};
pub use tensor::{Device, Tensor};
pub use unpacking::postprocess_packed_seqs;
