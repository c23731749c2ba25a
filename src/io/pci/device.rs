use std::sync::{Arc, Mutex};
use crate::io::bus::BusDevice;
use crate::io::pci::PciConfiguration;

#[derive(Copy,Clone,Debug,Eq,PartialEq)]
#[repr(u8)]
pub enum PciBar {
    Bar0 = 0,
    Bar1 = 1,
    Bar2 = 2,
    Bar3 = 3,
    Bar4 = 4,
    Bar5 = 5,
}

impl PciBar {
    pub fn idx(&self) -> usize {
        *self as usize
    }
}

#[derive(Copy,Clone,Debug,Eq,PartialEq)]
pub enum PciBarAllocation {
    Mmio(PciBar, usize),
}

pub trait PciDevice: Send {
    fn config(&self) -> &PciConfiguration;
    fn config_mut(&mut self) -> &mut PciConfiguration;

    /// Guest write to configuration space. Devices which react to config
    /// changes override this and call through to the configuration.
    fn config_write(&mut self, offset: u64, data: &[u8]) {
        self.config_mut().write(offset, data)
    }

    fn read_bar(&mut self, bar: PciBar, offset: u64, data: &mut [u8]) {
        let (_,_,_) = (bar, offset, data);
    }

    fn write_bar(&mut self, bar: PciBar, offset: u64, data: &[u8]) {
        let (_,_,_) = (bar,offset, data);
    }

    fn irq(&self) -> Option<u8> { None }

    fn bar_allocations(&self) -> Vec<PciBarAllocation> { vec![] }

    fn configure_bars(&mut self, allocations: Vec<(PciBar, u64)>) { let _ = allocations; }
}

/// Exposes one BAR of a PCI device as a `BusDevice` so it can be mapped on an MMIO bus.
pub struct MmioHandler {
    bar: PciBar,
    device: Arc<Mutex<dyn PciDevice+Send>>
}

impl MmioHandler {
    pub fn new(bar: PciBar, device: Arc<Mutex<dyn PciDevice+Send>>) -> Self {
        MmioHandler {
            bar, device,
        }
    }
}

impl BusDevice for MmioHandler {
    fn read(&mut self, offset: u64, data: &mut [u8]) {
        let mut lock = self.device.lock().expect("Failed to acquire device lock");
        lock.read_bar(self.bar, offset, data)
    }

    fn write(&mut self, offset: u64, data: &[u8]) {
        let mut lock = self.device.lock().expect("Failed to acquire device lock");
        lock.write_bar(self.bar, offset, data)
    }
}
