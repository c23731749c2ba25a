use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::result;
use std::sync::{Arc, Mutex};

use thiserror::Error;


#[derive(Debug,Error)]
pub enum Error {
    #[error("new device at 0x{0:x} overlaps with an existing device")]
    Overlap(u64),
    #[error("cannot map a device with zero length at 0x{0:x}")]
    ZeroLength(u64),
}

pub type Result<T> = result::Result<T, Error>;

/// A device which responds to reads and writes at offsets within its own range.
pub trait BusDevice {
    fn read(&mut self, offset: u64, data: &mut [u8]) {
        let (_,_) = (offset, data);

    }
    fn write(&mut self, offset: u64, data: &[u8]) {
        let (_,_) = (offset, data);
    }
}

#[derive(Debug,Copy,Clone)]
struct BusRange(u64, u64);

impl BusRange {
    fn end(&self) -> u64 {
        self.0 + self.1
    }
}

impl Eq for BusRange {}

impl PartialEq for BusRange {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Ord for BusRange {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for BusRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type SharedDevice = Arc<Mutex<dyn BusDevice + Send>>;

/// Routes guest MMIO accesses to the device mapped at the accessed address.
///
/// Ranges may not overlap. An access that hits no device is reported to the
/// caller so it can apply its own policy for unclaimed addresses.
#[derive(Clone,Default)]
pub struct Bus {
    devices: BTreeMap<BusRange, SharedDevice>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus {
            devices: BTreeMap::new(),
        }
    }

    fn first_before(&self, addr: u64) -> Option<(BusRange, &SharedDevice)> {
        self.devices.range(..=BusRange(addr, 0))
            .next_back()
            .map(|(range, dev)| (*range, dev))
    }

    /// Returns the device mapped at `addr` and the offset of `addr` within it.
    pub fn get_device(&self, addr: u64) -> Option<(u64, &SharedDevice)> {
        if let Some((range, dev)) = self.first_before(addr) {
            if addr < range.end() {
                return Some((addr - range.0, dev))
            }
        }
        None
    }

    /// Maps `device` at `base` for `len` bytes.
    pub fn insert(&mut self, device: SharedDevice, base: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Err(Error::ZeroLength(base));
        }

        if self.get_device(base).is_some() {
            return Err(Error::Overlap(base));
        }

        // A device starting inside the new range would be missed by the check above.
        if let Some((BusRange(start, _), _)) = self.first_before(base + len - 1) {
            if start >= base {
                return Err(Error::Overlap(base));
            }
        }

        self.devices.insert(BusRange(base, len), device);
        Ok(())
    }

    /// Unmaps the device starting at `base`, returning it if there was one.
    pub fn remove(&mut self, base: u64) -> Option<SharedDevice> {
        self.devices.remove(&BusRange(base, 0))
    }

    /// Reads data from the device that owns the range containing `addr` and puts it into `data`.
    ///
    /// Returns true on success, otherwise `data` is untouched.
    pub fn read(&self, addr: u64, data: &mut [u8]) -> bool {
        if let Some((offset, dev)) = self.get_device(addr) {
            // OK to unwrap as lock() failing is a serious error condition and should panic.
            dev.lock()
                .expect("Failed to acquire device lock")
                .read(offset, data);
            true
        } else {
            false
        }
    }

    /// Writes `data` to the device that owns the range containing `addr`.
    ///
    /// Returns true on success, otherwise `data` is untouched.
    pub fn write(&self, addr: u64, data: &[u8]) -> bool {
        if let Some((offset, dev)) = self.get_device(addr) {
            // OK to unwrap as lock() failing is a serious error condition and should panic.
            dev.lock()
                .expect("Failed to acquire device lock")
                .write(offset, data);
            true
        } else {
            false
        }
    }
}
