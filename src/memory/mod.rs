mod ram;

pub use self::ram::GuestRam;

use std::result;

use thiserror::Error;
use vm_memory::GuestMemoryError;

#[derive(Debug,Error)]
pub enum Error {
    #[error("failed to create guest memory: {0}")]
    CreateFailed(vm_memory::mmap::Error),
    #[error("guest memory access at 0x{0:x} failed: {1}")]
    Access(u64, GuestMemoryError),
}

pub type Result<T> = result::Result<T, Error>;
