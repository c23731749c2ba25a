//! Intel High Definition Audio controller and codecs.

pub mod codec;
mod codec_bus;
mod config;
mod controller;
mod intel_hda;
pub mod regs;
mod snapshot;
mod stream;

pub use codec::HdaAudioCodec;
pub use codec_bus::{CodecBus, CodecLink, HdaBus, HdaCodecDevice, HDA_MAX_CODECS};
pub use config::{CodecConfig, CodecKind, ConfigError, ControllerModel, HdaConfig};
pub use controller::HdaController;
pub use intel_hda::IntelHda;
pub use snapshot::{HdaControllerState, HdaSnapshot, HdaStreamState, SnapshotError};
pub use stream::{BdlEntry, HdaStream, BDL_FLAG_IOC};

use std::{io, result};

use thiserror::Error;

use crate::audio::BackendError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("codec address {0} is out of range")]
    InvalidCodecAddress(u32),
    #[error("codec address {0} is already in use")]
    CodecAddressInUse(u32),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("error creating irq event: {0}")]
    IrqEvent(io::Error),
    #[error("audio backend: {0}")]
    Backend(BackendError),
    #[error("snapshot: {0}")]
    Snapshot(SnapshotError),
}

pub type Result<T> = result::Result<T, Error>;
