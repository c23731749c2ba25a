#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use hda_emu::audio::{BufferBackend, BufferVoice};
use hda_emu::devices::hda::regs::*;
use hda_emu::devices::hda::{CodecConfig, ControllerModel, HdaAudioCodec, HdaConfig, IntelHda};
use hda_emu::devices::irq_event::InterruptLine;
use hda_emu::io::pci::{PciBar, PciDevice};
use hda_emu::memory::GuestRam;
use hda_emu::util::ManualClock;

pub const RAM_SIZE: usize = 0x20000;
pub const CORB_BASE: u64 = 0x1000;
pub const RIRB_BASE: u64 = 0x2000;
pub const BDL_BASE: u64 = 0x3000;
pub const DMA_POS_BASE: u64 = 0x4000;

#[derive(Default)]
struct IrqState {
    level: bool,
    msi_count: usize,
}

/// Interrupt line that remembers the level and counts MSI messages.
#[derive(Clone, Default)]
pub struct IrqRecorder {
    state: Arc<Mutex<IrqState>>,
}

impl IrqRecorder {
    pub fn level(&self) -> bool {
        self.state.lock().unwrap().level
    }

    pub fn msi_count(&self) -> usize {
        self.state.lock().unwrap().msi_count
    }
}

impl InterruptLine for IrqRecorder {
    fn set_level(&mut self, level: bool) {
        self.state.lock().unwrap().level = level;
    }

    fn msi_notify(&mut self) {
        self.state.lock().unwrap().msi_count += 1;
    }
}

pub struct Harness {
    pub dev: IntelHda,
    pub mem: GuestRam,
    pub clock: ManualClock,
    pub irq: IrqRecorder,
    pub backend: BufferBackend,
}

impl Harness {
    pub fn new(config: &HdaConfig) -> Self {
        Self::with_mem(config, GuestRam::with_size(RAM_SIZE).unwrap())
    }

    /// Device on existing guest memory, codecs attached as `config` lists them.
    pub fn with_mem(config: &HdaConfig, mem: GuestRam) -> Self {
        let clock = ManualClock::new(0);
        let irq = IrqRecorder::default();
        let backend = BufferBackend::new();
        let mut dev = IntelHda::new(10, config, mem.clone(), Arc::new(clock.clone()));
        dev.set_interrupt_line(Box::new(irq.clone()));
        for codec in config.codecs.iter() {
            let device = HdaAudioCodec::new(codec, Box::new(backend.clone()));
            dev.attach_codec(Box::new(device), codec.cad).unwrap();
        }
        Harness { dev, mem, clock, irq, backend }
    }

    /// Default ICH6 controller with one duplex codec.
    pub fn duplex() -> Self {
        Self::new(&HdaConfig::default())
    }

    pub fn read(&mut self, offset: u64, size: usize) -> u32 {
        let mut data = [0u8; 4];
        self.dev.read_bar(PciBar::Bar0, offset, &mut data[..size]);
        u32::from_le_bytes(data)
    }

    pub fn write(&mut self, offset: u64, size: usize, value: u32) {
        let data = value.to_le_bytes();
        self.dev.write_bar(PciBar::Bar0, offset, &data[..size]);
    }

    pub fn read8(&mut self, offset: u64) -> u32 {
        self.read(offset, 1)
    }

    pub fn read16(&mut self, offset: u64) -> u32 {
        self.read(offset, 2)
    }

    pub fn read32(&mut self, offset: u64) -> u32 {
        self.read(offset, 4)
    }

    pub fn write8(&mut self, offset: u64, value: u32) {
        self.write(offset, 1, value)
    }

    pub fn write16(&mut self, offset: u64, value: u32) {
        self.write(offset, 2, value)
    }

    pub fn write32(&mut self, offset: u64, value: u32) {
        self.write(offset, 4, value)
    }

    /// Brings the link out of reset the way a driver does at probe time.
    pub fn link_up(&mut self) {
        self.write32(ICH6_REG_GCTL, GCTL_CRST);
    }

    /// Sets up both rings and starts the CORB engine.
    pub fn start_rings(&mut self, rintcnt: u32) {
        self.write32(ICH6_REG_CORBLBASE, CORB_BASE as u32);
        self.write32(ICH6_REG_RIRBLBASE, RIRB_BASE as u32);
        self.write16(ICH6_REG_RINTCNT, rintcnt);
        self.write8(ICH6_REG_RIRBCTL, RIRBCTL_DMA_EN | RIRBCTL_IRQ_EN);
        self.write8(ICH6_REG_CORBCTL, CORBCTL_RUN);
    }

    pub fn queue_verb(&self, slot: u32, verb: u32) {
        self.mem.write_int(CORB_BASE + 4 * (slot & 0xff) as u64, verb).unwrap();
    }

    /// Response word and extended word of RIRB entry `slot`.
    pub fn rirb_entry(&self, slot: u32) -> (u32, u32) {
        let addr = RIRB_BASE + 8 * (slot & 0xff) as u64;
        (self.mem.read_int::<u32>(addr).unwrap(), self.mem.read_int::<u32>(addr + 4).unwrap())
    }

    /// Runs one verb through the immediate command interface.
    pub fn immediate(&mut self, verb: u32) -> Option<u32> {
        self.write32(ICH6_REG_IC, verb);
        self.write16(ICH6_REG_IRS, IRS_BUSY);
        let ics = self.read16(ICH6_REG_IRS);
        if ics & IRS_VALID == 0 {
            return None;
        }
        let response = self.read32(ICH6_REG_IR);
        self.write16(ICH6_REG_IRS, IRS_VALID);
        Some(response)
    }

    pub fn voice(&self, name: &str) -> BufferVoice {
        self.backend.voice(name).unwrap()
    }

    /// Writes a descriptor list at `BDL_BASE`.
    pub fn write_bdl(&self, entries: &[(u64, u32, u32)]) {
        for (i, &(addr, len, flags)) in entries.iter().enumerate() {
            let e = BDL_BASE + 16 * i as u64;
            self.mem.write_int(e, addr).unwrap();
            self.mem.write_int(e + 8, len).unwrap();
            self.mem.write_int(e + 12, flags).unwrap();
        }
    }

    /// Programs stream `idx` for a buffer described at `BDL_BASE`.
    pub fn setup_stream(&mut self, idx: usize, cbl: u32, lvi: u32, fmt: u32) {
        self.write32(stream_offset(idx, ICH6_REG_SD_BDLPL), BDL_BASE as u32);
        self.write32(stream_offset(idx, ICH6_REG_SD_BDLPU), 0);
        self.write32(stream_offset(idx, ICH6_REG_SD_CBL), cbl);
        self.write16(stream_offset(idx, ICH6_REG_SD_LVI), lvi);
        self.write16(stream_offset(idx, ICH6_REG_SD_FMT), fmt);
    }

    /// Sets the run bit of stream `idx` with stream tag `tag` and the
    /// completion interrupt enabled.
    pub fn run_stream(&mut self, idx: usize, tag: u32) {
        let ctl = (tag << SD_CTL_STREAM_TAG_SHIFT) | SD_CTL_RUN | (1 << 2);
        self.write32(stream_offset(idx, ICH6_REG_SD_CTL), ctl);
    }

    pub fn stop_stream(&mut self, idx: usize, tag: u32) {
        self.write32(stream_offset(idx, ICH6_REG_SD_CTL), tag << SD_CTL_STREAM_TAG_SHIFT);
    }

    pub fn lpib(&mut self, idx: usize) -> u32 {
        self.read32(stream_offset(idx, ICH6_REG_SD_LPIB))
    }

    pub fn advance_and_poll(&mut self, ns: u64) {
        self.clock.advance(ns);
        self.dev.poll();
    }
}

pub fn codec_config(codec: CodecConfig) -> HdaConfig {
    HdaConfig::new(ControllerModel::Ich6).with_codec(codec)
}

/// Builds the CORB word for `verb` with `payload` sent to node `nid` of
/// codec `cad`. Works for both 12 bit and 4 bit verb ids.
pub fn verb(cad: u32, nid: u32, verb: u32, payload: u32) -> u32 {
    (cad << 28) | (nid << 20) | (verb << 8) | payload
}
