//! Packed-sequence descriptor consumed by ragged attention kernels.

use std::fmt;

use crate::qkv_index::QkvIndex;

/// Memory layout of query/key/value activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QkvFormat {
    /// Ragged: total tokens, heads, head dim. Requires cumulative offsets.
    #[default]
    Thd,
    /// Batch, sequence, heads, head dim.
    Bshd,
    /// Sequence, batch, heads, head dim.
    Sbhd,
}

impl QkvFormat {
    /// Short lowercase tag understood by attention kernels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thd => "thd",
            Self::Bshd => "bshd",
            Self::Sbhd => "sbhd",
        }
    }
}

impl fmt::Display for QkvFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attention metadata for load-balanced context parallelism.
#[derive(Debug, Clone)]
pub struct CpAttentionIndex<T> {
    /// Query positions (`I64`).
    pub q_index: T,
    /// Key/value positions (`I64`).
    pub kv_index: T,
    /// Padded cumulative offsets divided by the context-parallel width (`I32`).
    pub cu_seqlens_padded_div_cp: T,
}

impl<T> CpAttentionIndex<T> {
    pub(crate) fn new(index: QkvIndex<T>, cu_seqlens_padded_div_cp: T) -> Self {
        Self {
            q_index: index.q_index,
            kv_index: index.kv_index,
            cu_seqlens_padded_div_cp,
        }
    }
}

/// Per-batch parameters for packed self-attention.
///
/// Query and key/value share every table because the packed batch attends
/// to itself.
#[derive(Debug, Clone)]
pub struct PackedSeqParams<T> {
    pub qkv_format: QkvFormat,
    /// Cumulative padded offsets for queries (`I32`, length `batch + 1`).
    pub cu_seqlens_q: T,
    /// Cumulative padded offsets for keys/values.
    pub cu_seqlens_kv: T,
    pub max_seqlen_q: usize,
    pub max_seqlen_kv: usize,
    pub cu_seqlens_q_padded: T,
    pub cu_seqlens_kv_padded: T,
    /// Host copy of the padded offsets, so host code can walk samples
    /// without a device read-back.
    pub host_cu_seqlens_padded: Vec<usize>,
    /// Present only for strategies that split attention across
    /// context-parallel ranks by query/kv index.
    pub cp_index: Option<CpAttentionIndex<T>>,
}

impl<T> PackedSeqParams<T> {
    /// Number of samples described.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.host_cu_seqlens_padded.len().saturating_sub(1)
    }

    /// Padded length of sample `i`.
    ///
    /// # Panics
    /// Panics if `i >= batch_size()`.
    #[must_use]
    pub fn padded_len(&self, i: usize) -> usize {
        self.host_cu_seqlens_padded[i + 1] - self.host_cu_seqlens_padded[i]
    }

    /// Sum of all padded lengths, before context-parallel sharding.
    #[must_use]
    pub fn total_padded(&self) -> usize {
        self.host_cu_seqlens_padded.last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_only(cu: Vec<usize>) -> PackedSeqParams<()> {
        PackedSeqParams {
            qkv_format: QkvFormat::Thd,
            cu_seqlens_q: (),
            cu_seqlens_kv: (),
            max_seqlen_q: 0,
            max_seqlen_kv: 0,
            cu_seqlens_q_padded: (),
            cu_seqlens_kv_padded: (),
            host_cu_seqlens_padded: cu,
            cp_index: None,
        }
    }

    #[test]
    fn test_qkv_format_tag() {
        assert_eq!(QkvFormat::default(), QkvFormat::Thd);
        assert_eq!(QkvFormat::Thd.to_string(), "thd");
        assert_eq!(QkvFormat::Sbhd.as_str(), "sbhd");
    }

    #[test]
    fn test_host_accessors() {
        let params = host_only(vec![0, 4, 12, 16]);
        assert_eq!(params.batch_size(), 3);
        assert_eq!(params.padded_len(1), 8);
        assert_eq!(params.total_padded(), 16);
    }

    #[test]
    fn test_empty_batch() {
        let params = host_only(vec![0]);
        assert_eq!(params.batch_size(), 0);
        assert_eq!(params.total_padded(), 0);
    }
}
