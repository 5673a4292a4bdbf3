//! CPU implementations of all backend op traits.

pub mod copy;
pub mod factory;
pub mod mask;
pub mod transfer;
