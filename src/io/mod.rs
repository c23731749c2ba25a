pub mod bus;
pub mod busdata;
pub mod pci;
pub use bus::{Bus,BusDevice};
pub use busdata::{ReadableInt,WriteableInt};
