mod config;
pub mod consts;
mod device;
pub use config::{PciCapability,PciConfiguration};
pub use device::{PciDevice,PciBar,PciBarAllocation,MmioHandler};
