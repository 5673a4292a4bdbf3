//! CPU backend for thdpack.
//!
//! Provides a pure-CPU implementation of the packing op traits plus an
//! in-process communicator that emulates a context-parallel group with one
//! thread per rank.
//!
//! This backend is intended for testing and for hosts that pack on the CPU
//! before uploading. Every op works on raw element bytes, so any dtype can
//! be packed.

#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod comm;
pub mod ops;
pub mod tensor;

use thdpack::backend::Backend;

pub use comm::CpuComm;
pub use tensor::CpuTensor;

/// Marker type for the CPU backend.
///
/// All op trait impls are on this type. Code parameterised by
/// `B: Backend` can use `CpuBackend` to run on CPU.
pub struct CpuBackend;

impl Backend for CpuBackend {
    type Tensor = CpuTensor;
    type DeviceHandle = ();
    type Comm = CpuComm;
}
