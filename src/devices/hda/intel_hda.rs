use std::sync::Arc;

use crate::audio::audio_backend_from_name;
use crate::devices::hda::codec::HdaAudioCodec;
use crate::devices::hda::codec_bus::{CodecBus, CodecLink, HdaCodecDevice};
use crate::devices::hda::config::HdaConfig;
use crate::devices::hda::controller::HdaController;
use crate::devices::hda::regs::{self, *};
use crate::devices::hda::snapshot::{HdaControllerState, HdaSnapshot, SnapshotError};
use crate::devices::hda::{Error, Result};
use crate::devices::irq_event::{InterruptLine, IrqLevelEvent};
use crate::io::busdata::{ReadableInt, WriteableInt};
use crate::io::pci::consts::{PCI_SUBDEVICE_ID_QEMU, PCI_VENDOR_ID_INTEL, PCI_VENDOR_ID_REDHAT_QUMRANET};
use crate::io::pci::{PciBar, PciBarAllocation, PciConfiguration, PciDevice};
use crate::memory::GuestRam;
use crate::util::{Clock, HostClock};

const PCI_CLASS_MULTIMEDIA_HD_AUDIO: u16 = 0x0403;
/// HDCTL, low power clock gating disabled, HD Audio mode selected.
const HDA_PCI_HDCTL: usize = 0x40;

/// Intel HD Audio controller emulation.
/// Provides the PCI interface and the MMIO register file, executes CORB
/// verbs against the attached codecs and services their DMA streams.
pub struct IntelHda {
    config: HdaConfig,
    pci_config: PciConfiguration,
    hda: HdaController,
    codecs: CodecBus,
}

impl IntelHda {
    /// Creates a controller with no codecs attached and all registers at
    /// their power on values.
    pub fn new(irq: u8, config: &HdaConfig, mem: GuestRam, clock: Arc<dyn Clock>) -> Self {
        let mut pci_config = PciConfiguration::new(irq, PCI_VENDOR_ID_INTEL,
                                                   config.model.device_id(),
                                                   PCI_CLASS_MULTIMEDIA_HD_AUDIO);
        pci_config.set_revision(1);
        pci_config.set_subsystem(PCI_VENDOR_ID_REDHAT_QUMRANET, PCI_SUBDEVICE_ID_QEMU);
        pci_config.set_byte(HDA_PCI_HDCTL, 0x01, 0x01);
        if config.msi {
            pci_config.add_msi_capability();
        }

        let mut dev = IntelHda {
            config: config.clone(),
            pci_config,
            hda: HdaController::new(mem, clock),
            codecs: CodecBus::new(),
        };
        dev.reset();
        dev
    }

    /// Creates a controller with the codecs listed in `config`, each
    /// playing through the host backend called `backend_name`, and an
    /// eventfd based interrupt line.
    pub fn try_new(irq: u8, config: &HdaConfig, mem: GuestRam, backend_name: &str) -> Result<Self> {
        let mut dev = Self::new(irq, config, mem, Arc::new(HostClock::new()));
        let mut irq_event = IrqLevelEvent::new().map_err(Error::IrqEvent)?;
        if config.msi {
            irq_event = irq_event.with_msi().map_err(Error::IrqEvent)?;
        }
        dev.set_interrupt_line(Box::new(irq_event));

        for codec in config.codecs.iter() {
            let backend = audio_backend_from_name(backend_name)
                .map_err(Error::Backend)?;
            let device = HdaAudioCodec::new(codec, backend);
            dev.attach_codec(Box::new(device), codec.cad)?;
        }
        Ok(dev)
    }

    pub fn hda_config(&self) -> &HdaConfig {
        &self.config
    }

    pub fn controller(&self) -> &HdaController {
        &self.hda
    }

    pub fn set_interrupt_line(&mut self, irq: Box<dyn InterruptLine>) {
        self.hda.set_interrupt_line(irq);
    }

    /// Attaches a codec to the link and announces it in STATESTS.
    pub fn attach_codec(&mut self, device: Box<dyn HdaCodecDevice>, cad: Option<u32>) -> Result<u32> {
        let cad = self.codecs.attach(device, cad)?;
        self.hda.state_sts |= 1 << cad;
        self.hda.update_irq();
        Ok(cad)
    }

    pub fn codec(&self, cad: u32) -> Option<&dyn HdaCodecDevice> {
        self.codecs.find(cad)
    }

    /// Device reset: registers to reset values, codecs reset and announced.
    pub fn reset(&mut self) {
        debug!("controller reset");
        self.hda.reset_registers();
        self.hda.reset_wall_clk();
        let now = self.hda.now_ns();
        self.codecs.reset(now);
        self.hda.state_sts = self.codecs.presence_mask();
        self.hda.update_irq();
    }

    /// Reads the register at `offset` of the MMIO window.
    pub fn mmio_read(&mut self, offset: u64, data: &mut [u8]) {
        let value = match regs::find(offset) {
            Some(reg) => {
                let rmask = match data.len() {
                    1 => 0xff,
                    2 => 0xffff,
                    _ => 0xffff_ffff,
                };
                let value = self.reg_read(&reg, rmask);
                trace!("read {:>15} [0x{:04x}] = 0x{:x}", reg.name, offset, value);
                value
            }
            None => {
                debug!("read from unmapped register 0x{:04x}", offset);
                0
            }
        };
        match ReadableInt::with_size(data.len(), value) {
            Some(val) => val.read(data),
            None => warn!("read length of {} at 0x{:04x}", data.len(), offset),
        }
    }

    /// Writes the register at `offset` of the MMIO window.
    pub fn mmio_write(&mut self, offset: u64, data: &[u8]) {
        let (value, wmask) = match WriteableInt::from(data) {
            WriteableInt::Byte(v) => (v as u32, 0xff),
            WriteableInt::Word(v) => (v as u32, 0xffff),
            WriteableInt::DWord(v) => (v, 0xffff_ffff),
            _ => {
                warn!("write length of {} at 0x{:04x}", data.len(), offset);
                return;
            }
        };
        match regs::find(offset) {
            Some(reg) => {
                trace!("write {:>15} [0x{:04x}] = 0x{:x}", reg.name, offset, value);
                self.reg_write(&reg, value, wmask);
            }
            None => debug!("write to unmapped register 0x{:04x} = 0x{:x}", offset, value),
        }
    }

    fn reg_read(&mut self, reg: &HdaReg, rmask: u32) -> u32 {
        if let Some(handler) = reg.rhandler {
            handler(self, reg);
        }
        match reg.field {
            Some(field) => (*self.hda.field_mut(field, reg.stream) >> reg.shift) & rmask,
            None => reg.reset & rmask,
        }
    }

    fn reg_write(&mut self, reg: &HdaReg, value: u32, wmask: u32) {
        if reg.is_read_only() {
            debug!("write to read only register {} = 0x{:x}", reg.name, value);
            return;
        }
        let field = match reg.field {
            Some(field) => field,
            None => return,
        };
        let value = value << reg.shift;
        let wmask = wmask << reg.shift;

        let slot = self.hda.field_mut(field, reg.stream);
        let old = *slot;
        let m = reg.wmask & wmask;
        *slot = (*slot & !m) | (value & m);
        *slot &= !(value & reg.wclear & wmask);

        if let Some(handler) = reg.whandler {
            handler(self, reg, old);
        }
    }

    pub(super) fn set_g_ctl(&mut self, _reg: &HdaReg, old: u32) {
        if self.hda.g_ctl & GCTL_CRST == 0 {
            if old & GCTL_CRST != 0 {
                debug!("link reset asserted");
            }
            self.enter_reset();
        } else if old & GCTL_CRST == 0 {
            debug!("link reset released");
            self.hda.reset_wall_clk();
            let now = self.hda.now_ns();
            self.codecs.reset(now);
            self.hda.state_sts |= self.codecs.presence_mask();
            self.hda.update_irq();
        }
    }

    /// Controller held in reset: registers return to reset values and every
    /// running stream is stopped.
    fn enter_reset(&mut self) {
        let now = self.hda.now_ns();
        for idx in 0..HDA_STREAM_COUNT {
            let st = &self.hda.st[idx];
            if st.is_running() {
                let stnr = st.stream_tag();
                self.codecs.notify_stream(stnr, false, idx >= HDA_INPUT_STREAMS, now);
            }
        }
        self.hda.reset_registers();
        self.hda.update_irq();
    }

    pub(super) fn set_state_sts(&mut self, _reg: &HdaReg, _old: u32) {
        self.hda.update_irq();
    }

    pub(super) fn set_int_ctl(&mut self, _reg: &HdaReg, _old: u32) {
        self.hda.update_irq();
    }

    pub(super) fn set_int_sts(&mut self, _reg: &HdaReg, _old: u32) {
        self.hda.update_irq();
    }

    pub(super) fn get_int_sts(&mut self, _reg: &HdaReg) {
        self.hda.update_int_sts();
    }

    pub(super) fn get_wall_clk(&mut self, _reg: &HdaReg) {
        self.hda.update_wall_clk();
    }

    pub(super) fn set_corb_wp(&mut self, _reg: &HdaReg, _old: u32) {
        self.corb_run();
    }

    pub(super) fn set_corb_ctl(&mut self, _reg: &HdaReg, _old: u32) {
        self.corb_run();
    }

    pub(super) fn set_corb_rp(&mut self, _reg: &HdaReg, old: u32) {
        if self.hda.corb_rp & CORBRP_RST != 0 {
            self.hda.corb_rp = CORBRP_RST;
        } else if old & CORBRP_RST != 0 {
            // out of reset, pick up verbs queued meanwhile
            self.corb_run();
        }
    }

    pub(super) fn set_rirb_wp(&mut self, _reg: &HdaReg, _old: u32) {
        if self.hda.rirb_wp & RIRBWP_RST != 0 {
            self.hda.rirb_wp = 0;
        }
    }

    pub(super) fn set_rirb_sts(&mut self, _reg: &HdaReg, old: u32) {
        self.hda.update_irq();
        if old & RIRBSTS_IRQ != 0 && self.hda.rirb_sts & RIRBSTS_IRQ == 0 {
            // guest acked the response interrupt, fetch more verbs
            self.hda.rirb_count = 0;
            self.corb_run();
        }
    }

    pub(super) fn set_ics(&mut self, _reg: &HdaReg, _old: u32) {
        if self.hda.ics & IRS_BUSY != 0 {
            self.corb_run();
        }
    }

    pub(super) fn set_st_ctl(&mut self, reg: &HdaReg, old: u32) {
        let idx = reg.stream;
        let output = idx >= HDA_INPUT_STREAMS;

        if self.hda.st[idx].ctl & SD_CTL_SRST != 0 {
            debug!("stream {}: reset", idx);
            let st = &mut self.hda.st[idx];
            st.ctl = (SD_STS_FIFO_READY << 24) | SD_CTL_SRST;
            st.lpib = 0;
            st.reset_dma();
        }

        let ctl = self.hda.st[idx].ctl;
        if (ctl ^ old) & SD_CTL_RUN != 0 {
            let now = self.hda.now_ns();
            if ctl & SD_CTL_RUN != 0 {
                let stnr = self.hda.st[idx].stream_tag();
                debug!("stream {}: start (tag {})", idx, stnr);
                self.hda.parse_bdl(idx);
                self.codecs.notify_stream(stnr, true, output, now);
            } else {
                // a reset clears the tag, the codecs know the stream by the old one
                let stnr = (old & SD_CTL_STREAM_TAG_MASK) >> SD_CTL_STREAM_TAG_SHIFT;
                debug!("stream {}: stop (tag {})", idx, stnr);
                self.codecs.notify_stream(stnr, false, output, now);
            }
        }

        self.hda.update_irq();
    }

    /// Fetches and executes verbs until the CORB is empty, the RIRB
    /// interrupt threshold is reached, or the engine is stopped. A pending
    /// immediate command takes precedence over the rings.
    fn corb_run(&mut self) {
        if self.hda.ics & IRS_BUSY != 0 {
            let verb = self.hda.icw;
            trace!("icw: verb 0x{:08x}", verb);
            self.send_command(verb);
            return;
        }

        loop {
            if self.hda.corb_ctl & CORBCTL_RUN == 0 {
                trace!("corb: dma not running");
                return;
            }
            if self.hda.corb_rp & CORBRP_RST != 0 {
                trace!("corb: read pointer in reset");
                return;
            }
            if self.hda.corb_empty() {
                trace!("corb: ring empty");
                return;
            }
            if self.hda.rirb_count == self.hda.rirb_cnt {
                trace!("corb: rirb count reached");
                return;
            }

            let rp = (self.hda.corb_rp + 1) & 0xff;
            let verb = self.hda.corb_entry(rp);
            self.hda.corb_rp = rp;
            trace!("corb[{}]: verb 0x{:08x}", rp, verb);
            self.send_command(verb);
        }
    }

    fn send_command(&mut self, verb: u32) {
        let cad = (verb >> 28) & 0x0f;
        if verb & (1 << 27) != 0 {
            // indirect node addressing, not supported
            warn!("verb 0x{:08x} uses indirect node addressing", verb);
            return;
        }
        let nid = (verb >> 20) & 0x7f;
        let data = verb & 0xfffff;

        let IntelHda { ref mut hda, ref mut codecs, .. } = *self;
        match codecs.find_mut(cad) {
            Some(codec) => {
                let mut link = CodecLink::new(hda, cad);
                codec.command(nid, data, &mut link);
            }
            None => debug!("verb 0x{:08x} addressed to missing codec {}", verb, cad),
        }
    }

    /// Runs codec timers and host audio exchange. Called from the device
    /// event loop, at the latest by `next_deadline`.
    pub fn poll(&mut self) {
        let IntelHda { ref mut hda, ref mut codecs, .. } = *self;
        codecs.poll(hda);
    }

    /// Earliest virtual time at which `poll` has timer work.
    pub fn next_deadline(&self) -> Option<u64> {
        self.codecs.next_deadline()
    }

    pub fn save(&self) -> HdaSnapshot {
        let codecs = self.codecs.cads()
            .into_iter()
            .filter_map(|cad| self.codecs.find(cad).map(|c| (cad, c.save_state())))
            .collect();
        HdaSnapshot {
            controller: HdaControllerState::capture(&self.hda),
            codecs,
        }
    }

    /// Loads a snapshot taken with `save` from a device with the same codecs.
    /// Nothing changes unless every part of the snapshot can be loaded.
    pub fn restore(&mut self, snapshot: &HdaSnapshot) -> Result<()> {
        for (cad, data) in snapshot.codecs.iter() {
            match self.codecs.find(*cad) {
                Some(codec) => codec.check_state(data).map_err(Error::Snapshot)?,
                None => return Err(Error::Snapshot(SnapshotError::MissingCodec(*cad))),
            }
        }

        snapshot.controller.apply(&mut self.hda);
        for idx in 0..HDA_STREAM_COUNT {
            if self.hda.st[idx].is_running() {
                self.hda.reload_bdl(idx);
            }
        }

        let now = self.hda.now_ns();
        for (cad, data) in snapshot.codecs.iter() {
            if let Some(codec) = self.codecs.find_mut(*cad) {
                codec.restore_state(data, now).map_err(Error::Snapshot)?;
            }
        }

        self.sync_msi();
        self.hda.update_irq();
        Ok(())
    }

    fn sync_msi(&mut self) {
        let active = self.config.msi && self.pci_config.msi_enabled();
        self.hda.set_msi_active(active);
    }
}

impl PciDevice for IntelHda {
    fn config(&self) -> &PciConfiguration {
        &self.pci_config
    }

    fn config_mut(&mut self) -> &mut PciConfiguration {
        &mut self.pci_config
    }

    fn config_write(&mut self, offset: u64, data: &[u8]) {
        self.pci_config.write(offset, data);
        self.sync_msi();
    }

    fn read_bar(&mut self, bar: PciBar, offset: u64, data: &mut [u8]) {
        match bar {
            PciBar::Bar0 => self.mmio_read(offset, data),
            _ => {},
        }
    }

    fn write_bar(&mut self, bar: PciBar, offset: u64, data: &[u8]) {
        match bar {
            PciBar::Bar0 => self.mmio_write(offset, data),
            _ => {},
        }
    }

    fn irq(&self) -> Option<u8> {
        Some(self.pci_config.irq())
    }

    fn bar_allocations(&self) -> Vec<PciBarAllocation> {
        vec![PciBarAllocation::Mmio(PciBar::Bar0, HDA_MMIO_SIZE)]
    }

    fn configure_bars(&mut self, allocations: Vec<(PciBar, u64)>) {
        for (bar, base) in allocations {
            if bar == PciBar::Bar0 {
                self.pci_config.set_mmio_bar(bar, base, HDA_MMIO_SIZE);
            }
        }
    }
}
