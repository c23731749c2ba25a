#[macro_use]
extern crate log;

pub mod audio;
pub mod devices;
pub mod io;
pub mod memory;
pub mod util;
