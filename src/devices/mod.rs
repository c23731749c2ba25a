pub mod hda;
pub mod irq_event;
