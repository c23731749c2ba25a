use vm_memory::{ByteValued, Bytes, GuestAddress, GuestMemoryMmap};

use crate::memory::{Error, Result};

/// Cloneable handle to guest physical memory used for device DMA.
#[derive(Clone)]
pub struct GuestRam {
    memory: GuestMemoryMmap,
}

impl GuestRam {
    pub fn new(memory: GuestMemoryMmap) -> Self {
        GuestRam { memory }
    }

    /// Allocates anonymous guest memory of `size` bytes starting at guest address 0.
    pub fn with_size(size: usize) -> Result<Self> {
        let memory = GuestMemoryMmap::<()>::from_ranges(&[(GuestAddress(0), size)])
            .map_err(Error::CreateFailed)?;
        Ok(GuestRam { memory })
    }

    pub fn memory(&self) -> &GuestMemoryMmap {
        &self.memory
    }

    pub fn read_int<T: ByteValued>(&self, address: u64) -> Result<T> {
        self.memory.read_obj(GuestAddress(address))
            .map_err(|e| Error::Access(address, e))
    }

    pub fn write_int<T: ByteValued>(&self, address: u64, val: T) -> Result<()> {
        self.memory.write_obj(val, GuestAddress(address))
            .map_err(|e| Error::Access(address, e))
    }

    pub fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        self.memory.read_slice(buf, GuestAddress(address))
            .map_err(|e| Error::Access(address, e))
    }

    pub fn write_bytes(&self, address: u64, buf: &[u8]) -> Result<()> {
        self.memory.write_slice(buf, GuestAddress(address))
            .map_err(|e| Error::Access(address, e))
    }
}
