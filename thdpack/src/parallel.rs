//! Tensor- and context-parallel state
//!
//! Describes where this process sits in the tensor-parallel and
//! context-parallel groups. The host training runtime owns the real
//! process groups; packing code only queries widths and ranks through
//! [`ParallelState`].

use serde::Deserialize;

use crate::{Error, Result};

/// Rank and world-size queries supplied by the host runtime.
pub trait ParallelState {
    /// Number of ranks in the tensor-parallel group.
    fn tensor_parallel_world_size(&self) -> usize;

    /// Number of ranks in the context-parallel group.
    fn context_parallel_world_size(&self) -> usize;

    /// This process's rank in the context-parallel group (`0..cp_size`).
    fn context_parallel_rank(&self) -> usize;
}

/// Alignment every packed sample length must be a multiple of.
///
/// With context parallelism each sample is cut into `2 * cp_size` chunks,
/// so the alignment doubles; without it only tensor-parallel sequence
/// sharding matters.
#[must_use]
pub fn align_size(tp_size: usize, cp_size: usize) -> usize {
    if cp_size > 1 {
        tp_size * cp_size * 2
    } else {
        tp_size
    }
}

/// Padding that brings `len` up to the next multiple of `align`.
///
/// # Panics
/// Panics if `align` is zero.
#[must_use]
pub fn pad_to_align(len: usize, align: usize) -> usize {
    (align - len % align) % align
}

/// A contiguous run of positions `[start .. start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub len: usize,
}

impl Chunk {
    /// One past the last position.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// The two chunks of a padded sample owned by `cp_rank`.
///
/// The sample is cut into `2 * cp_size` chunks of `padded_len / (2 * cp_size)`
/// positions. Rank `r` owns chunk `r` from the front and chunk `r` from the
/// back, so rank 0 gets the first and last chunks, rank 1 the second and
/// second-last, and so on. Positions are in original-sequence coordinates.
#[must_use]
pub fn load_balanced_chunks(padded_len: usize, cp_size: usize, cp_rank: usize) -> (Chunk, Chunk) {
    let half = padded_len / cp_size / 2;
    let front = Chunk {
        start: half * cp_rank,
        len: half,
    };
    let back = Chunk {
        start: padded_len.saturating_sub(half * (cp_rank + 1)),
        len: half,
    };
    (front, back)
}

/// Static parallel layout, usually loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ParallelConfig {
    /// Tensor-parallel world size
    #[serde(default = "default_world_size")]
    pub tensor_parallel_size: usize,

    /// Context-parallel world size
    #[serde(default = "default_world_size")]
    pub context_parallel_size: usize,

    /// This process's context-parallel rank
    #[serde(default)]
    pub context_parallel_rank: usize,
}

fn default_world_size() -> usize {
    1
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self::single()
    }
}

impl ParallelConfig {
    /// No tensor or context parallelism.
    #[must_use]
    pub fn single() -> Self {
        Self {
            tensor_parallel_size: 1,
            context_parallel_size: 1,
            context_parallel_rank: 0,
        }
    }

    /// Build and validate a layout.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParallelConfig`] if a width is zero or the
    /// rank is out of range.
    pub fn new(tp_size: usize, cp_size: usize, cp_rank: usize) -> Result<Self> {
        let config = Self {
            tensor_parallel_size: tp_size,
            context_parallel_size: cp_size,
            context_parallel_rank: cp_rank,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that widths are positive and the rank fits the group.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParallelConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.tensor_parallel_size == 0 {
            return Err(Error::InvalidParallelConfig(
                "tensor_parallel_size must be > 0".into(),
            ));
        }
        if self.context_parallel_size == 0 {
            return Err(Error::InvalidParallelConfig(
                "context_parallel_size must be > 0".into(),
            ));
        }
        if self.context_parallel_rank >= self.context_parallel_size {
            return Err(Error::InvalidParallelConfig(format!(
                "context_parallel_rank {} out of range for context_parallel_size {}",
                self.context_parallel_rank, self.context_parallel_size
            )));
        }
        Ok(())
    }

    /// The same layout seen from another context-parallel rank.
    #[must_use]
    pub fn with_cp_rank(self, cp_rank: usize) -> Self {
        Self {
            context_parallel_rank: cp_rank,
            ..self
        }
    }

    /// Alignment unit for packed sample lengths.
    #[must_use]
    pub fn align_size(&self) -> usize {
        align_size(self.tensor_parallel_size, self.context_parallel_size)
    }
}

impl ParallelState for ParallelConfig {
    fn tensor_parallel_world_size(&self) -> usize {
        self.tensor_parallel_size
    }

    fn context_parallel_world_size(&self) -> usize {
        self.context_parallel_size
    }

    fn context_parallel_rank(&self) -> usize {
        self.context_parallel_rank
    }
}
