//! In-process communicator for the context-parallel group.
//!
//! Each rank lives on its own thread and holds a [`CpuComm`] handle that
//! shares one group. Collectives exchange tensors through a slot
//! per rank, fenced by a barrier on either side, so the handles can be reused
//! for any number of back-to-back collectives.

use std::sync::{Arc, Barrier, Mutex};

use thdpack::backend::CommOps;
use thdpack::{Error, Result};

use crate::tensor::CpuTensor;
use crate::CpuBackend;

struct CpuCommGroup {
    world_size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Option<CpuTensor>>>,
}

/// One rank's handle on an in-process group.
#[derive(Clone)]
pub struct CpuComm {
    rank: usize,
    group: Arc<CpuCommGroup>,
}

impl std::fmt::Debug for CpuComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuComm")
            .field("rank", &self.rank)
            .field("world_size", &self.group.world_size)
            .finish()
    }
}

impl CpuComm {
    /// Create handles for a group of `world_size` ranks, ordered by rank.
    ///
    /// Move each handle onto its own thread; a collective blocks until all
    /// ranks have entered it.
    ///
    /// # Panics
    /// Panics if `world_size` is zero.
    #[must_use]
    pub fn group(world_size: usize) -> Vec<Self> {
        assert!(world_size > 0, "world_size must be at least 1");
        let group = Arc::new(CpuCommGroup {
            world_size,
            barrier: Barrier::new(world_size),
            slots: Mutex::new(vec![None; world_size]),
        });
        (0..world_size)
            .map(|rank| Self {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }

    /// A group of one.
    #[must_use]
    pub fn single() -> Self {
        Self::group(1).remove(0)
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[must_use]
    pub fn world_size(&self) -> usize {
        self.group.world_size
    }
}

impl CommOps for CpuBackend {
    fn all_gather(comm: &CpuComm, tensor: &CpuTensor) -> Result<Vec<CpuTensor>> {
        let group = &comm.group;
        if group.world_size == 1 {
            return Ok(vec![tensor.clone()]);
        }

        // Both barriers are always reached, even on error, so one failing
        // rank never leaves the others blocked.
        let published = group
            .slots
            .lock()
            .map(|mut slots| slots[comm.rank] = Some(tensor.clone()))
            .map_err(|_| Error::Comm("all_gather: slot lock poisoned".into()));
        group.barrier.wait();

        let gathered = published.and_then(|()| {
            let slots = group
                .slots
                .lock()
                .map_err(|_| Error::Comm("all_gather: slot lock poisoned".into()))?;
            slots
                .iter()
                .enumerate()
                .map(|(rank, slot)| {
                    slot.clone().ok_or_else(|| {
                        Error::Comm(format!("all_gather: rank {rank} published nothing"))
                    })
                })
                .collect::<Result<Vec<_>>>()
        });
        group.barrier.wait();

        // Every rank has read by now. Clear our slot so a rank that fails to
        // publish next round is reported instead of replaying this round.
        if let Ok(mut slots) = group.slots.lock() {
            slots[comm.rank] = None;
        }

        tracing::trace!(rank = comm.rank, world_size = group.world_size, "all_gather");
        gathered
    }
}
