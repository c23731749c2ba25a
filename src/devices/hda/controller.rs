use std::sync::Arc;

use crate::devices::hda::regs::*;
use crate::devices::hda::stream::HdaStream;
use crate::devices::irq_event::InterruptLine;
use crate::memory::GuestRam;
use crate::util::Clock;

/// Register file and DMA engine of the HD Audio controller.
///
/// Holds everything the codecs reach through the link: the command and
/// response rings, the immediate command interface, the stream descriptors
/// and the interrupt output.
pub struct HdaController {
    mem: GuestRam,
    clock: Arc<dyn Clock>,
    irq: Option<Box<dyn InterruptLine>>,
    msi_active: bool,
    irq_level: bool,

    pub g_ctl: u32,
    pub wake_en: u32,
    pub state_sts: u32,
    pub int_ctl: u32,
    pub int_sts: u32,
    pub wall_clk: u32,
    pub wall_base_ns: u64,

    pub corb_lbase: u32,
    pub corb_ubase: u32,
    pub corb_rp: u32,
    pub corb_wp: u32,
    pub corb_ctl: u32,
    pub corb_sts: u32,

    pub rirb_lbase: u32,
    pub rirb_ubase: u32,
    pub rirb_wp: u32,
    pub rirb_cnt: u32,
    pub rirb_ctl: u32,
    pub rirb_sts: u32,
    /// Responses written since the guest last cleared RIRBSTS.IRQ.
    pub rirb_count: u32,

    pub icw: u32,
    pub irr: u32,
    pub ics: u32,

    pub dp_lbase: u32,
    pub dp_ubase: u32,

    pub st: [HdaStream; HDA_STREAM_COUNT],
}

impl HdaController {
    pub fn new(mem: GuestRam, clock: Arc<dyn Clock>) -> Self {
        let mut hda = HdaController {
            mem,
            clock,
            irq: None,
            msi_active: false,
            irq_level: false,
            g_ctl: 0,
            wake_en: 0,
            state_sts: 0,
            int_ctl: 0,
            int_sts: 0,
            wall_clk: 0,
            wall_base_ns: 0,
            corb_lbase: 0,
            corb_ubase: 0,
            corb_rp: 0,
            corb_wp: 0,
            corb_ctl: 0,
            corb_sts: 0,
            rirb_lbase: 0,
            rirb_ubase: 0,
            rirb_wp: 0,
            rirb_cnt: 0,
            rirb_ctl: 0,
            rirb_sts: 0,
            rirb_count: 0,
            icw: 0,
            irr: 0,
            ics: 0,
            dp_lbase: 0,
            dp_ubase: 0,
            st: Default::default(),
        };
        hda.reset_registers();
        hda
    }

    pub fn mem(&self) -> &GuestRam {
        &self.mem
    }

    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn set_interrupt_line(&mut self, irq: Box<dyn InterruptLine>) {
        self.irq = Some(irq);
    }

    pub fn set_msi_active(&mut self, active: bool) {
        if self.msi_active != active {
            debug!("msi {}", if active { "enabled" } else { "disabled" });
            self.msi_active = active;
            self.update_irq();
        }
    }

    pub fn msi_active(&self) -> bool {
        self.msi_active
    }

    /// Last level computed for the interrupt line.
    pub fn irq_level(&self) -> bool {
        self.irq_level
    }

    /// Storage behind a register descriptor.
    pub fn field_mut(&mut self, field: RegField, stream: usize) -> &mut u32 {
        use RegField::*;
        match field {
            GCtl => &mut self.g_ctl,
            WakeEn => &mut self.wake_en,
            StateSts => &mut self.state_sts,
            IntCtl => &mut self.int_ctl,
            IntSts => &mut self.int_sts,
            WallClk => &mut self.wall_clk,
            CorbLbase => &mut self.corb_lbase,
            CorbUbase => &mut self.corb_ubase,
            CorbWp => &mut self.corb_wp,
            CorbRp => &mut self.corb_rp,
            CorbCtl => &mut self.corb_ctl,
            CorbSts => &mut self.corb_sts,
            RirbLbase => &mut self.rirb_lbase,
            RirbUbase => &mut self.rirb_ubase,
            RirbWp => &mut self.rirb_wp,
            RirbCnt => &mut self.rirb_cnt,
            RirbCtl => &mut self.rirb_ctl,
            RirbSts => &mut self.rirb_sts,
            Icw => &mut self.icw,
            Irr => &mut self.irr,
            Ics => &mut self.ics,
            DpLbase => &mut self.dp_lbase,
            DpUbase => &mut self.dp_ubase,
            StCtl => &mut self.st[stream].ctl,
            StLpib => &mut self.st[stream].lpib,
            StCbl => &mut self.st[stream].cbl,
            StLvi => &mut self.st[stream].lvi,
            StFmt => &mut self.st[stream].fmt,
            StBdlpLbase => &mut self.st[stream].bdlp_lbase,
            StBdlpUbase => &mut self.st[stream].bdlp_ubase,
        }
    }

    /// Puts every register back to its reset value and forgets all DMA state.
    pub fn reset_registers(&mut self) {
        for reg in resettable() {
            if let Some(field) = reg.field {
                *self.field_mut(field, reg.stream) = reg.reset;
            }
        }
        for st in self.st.iter_mut() {
            st.reset_dma();
        }
        self.rirb_count = 0;
    }

    pub fn corb_base(&self) -> u64 {
        (self.corb_lbase as u64) | ((self.corb_ubase as u64) << 32)
    }

    pub fn rirb_base(&self) -> u64 {
        (self.rirb_lbase as u64) | ((self.rirb_ubase as u64) << 32)
    }

    /// Guest address of the DMA position buffer, the enable bit masked off.
    pub fn dp_base(&self) -> u64 {
        ((self.dp_lbase & !DPLBASE_ENABLE) as u64) | ((self.dp_ubase as u64) << 32)
    }

    /// Wall clock counts at 24MHz from the last link reset.
    pub fn wall_clk_now(&self) -> u32 {
        let elapsed = self.now_ns().saturating_sub(self.wall_base_ns);
        (elapsed * 24 / 1000) as u32
    }

    pub fn update_wall_clk(&mut self) {
        self.wall_clk = self.wall_clk_now();
    }

    pub fn reset_wall_clk(&mut self) {
        self.wall_base_ns = self.now_ns();
    }

    /// Reads the CORB entry at `rp`. A failed read yields a zero verb.
    pub fn corb_entry(&self, rp: u32) -> u32 {
        let addr = self.corb_base() + 4 * rp as u64;
        match self.mem.read_int::<u32>(addr) {
            Ok(verb) => verb,
            Err(e) => {
                warn!("corb read failed: {}", e);
                0
            }
        }
    }

    /// All CORB entries written by the guest have been fetched.
    pub fn corb_empty(&self) -> bool {
        (self.corb_rp & 0xff) == self.corb_wp
    }

    /// Delivers a codec response through the immediate interface if a verb is
    /// pending there, otherwise appends it to the RIRB.
    pub fn response(&mut self, cad: u32, solicited: bool, response: u32) {
        if self.ics & IRS_BUSY != 0 {
            trace!("codec {}: immediate response 0x{:08x}", cad, response);
            self.irr = response;
            self.ics &= !(IRS_BUSY | IRS_CAD_MASK);
            self.ics |= IRS_VALID | (cad << 4);
            return;
        }

        if self.rirb_ctl & RIRBCTL_DMA_EN == 0 {
            debug!("codec {}: rirb dma disabled, drop response 0x{:08x}", cad, response);
            return;
        }

        let ex = (if solicited { 0 } else { 1 << 4 }) | cad;
        let wp = (self.rirb_wp + 1) & 0xff;
        let addr = self.rirb_base() + 8 * wp as u64;
        let res = self.mem.write_int(addr, response)
            .and_then(|_| self.mem.write_int(addr + 4, ex));
        if let Err(e) = res {
            warn!("codec {}: rirb write failed, drop response 0x{:08x}: {}", cad, response, e);
            return;
        }
        trace!("codec {}: rirb[{}] = 0x{:08x} ex 0x{:x}", cad, wp, response, ex);
        self.rirb_wp = wp;
        self.rirb_count += 1;

        if self.rirb_count == self.rirb_cnt {
            trace!("rirb count reached ({})", self.rirb_count);
            self.rirb_irq();
        } else if self.corb_empty() {
            trace!("corb ring empty ({})", self.rirb_count);
            self.rirb_irq();
        }
    }

    fn rirb_irq(&mut self) {
        if self.rirb_ctl & RIRBCTL_IRQ_EN != 0 {
            self.rirb_sts |= RIRBSTS_IRQ;
            self.update_irq();
        }
    }

    /// Recomputes INTSTS from the pending status bits of all sources.
    pub fn update_int_sts(&mut self) {
        let mut sts = 0;

        if self.rirb_sts & RIRBSTS_IRQ != 0 {
            sts |= INTSTS_CIS;
        }
        if self.rirb_sts & RIRBSTS_OVERRUN != 0 {
            sts |= INTSTS_CIS;
        }
        if self.state_sts & self.wake_en != 0 {
            sts |= INTSTS_CIS;
        }
        for (i, st) in self.st.iter().enumerate() {
            if st.completion_pending() {
                sts |= 1 << i;
            }
        }
        if sts & self.int_ctl != 0 {
            sts |= INTSTS_GIS;
        }
        self.int_sts = sts;
    }

    pub fn update_irq(&mut self) {
        self.update_int_sts();
        let level = self.int_sts & INTSTS_GIS != 0 && self.int_ctl & INTCTL_GIE != 0;
        trace!("irq level {}, msi {}", level, self.msi_active);
        self.irq_level = level;
        if let Some(irq) = self.irq.as_mut() {
            if self.msi_active {
                if level {
                    irq.msi_notify();
                }
            } else {
                irq.set_level(level);
            }
        }
    }

    /// Reads the descriptor list of stream `idx` and rewinds it.
    pub fn parse_bdl(&mut self, idx: usize) {
        self.st[idx].parse_bdl(&self.mem);
    }

    /// Reads the descriptor list of stream `idx` keeping its link position.
    pub fn reload_bdl(&mut self, idx: usize) {
        self.st[idx].reload_bdl(&self.mem);
    }

    /// Index of the running stream carrying `stnr` in the given direction.
    pub fn find_stream(&self, stnr: u32, output: bool) -> Option<usize> {
        let first = if output { HDA_INPUT_STREAMS } else { 0 };
        (first..first + HDA_INPUT_STREAMS)
            .find(|&i| self.st[i].is_running() && self.st[i].stream_tag() == stnr)
    }

    /// Moves `buf` to or from the guest buffer of the stream carrying
    /// `stnr`. Returns false when no stream can accept the transfer.
    pub fn xfer(&mut self, stnr: u32, output: bool, buf: &mut [u8]) -> bool {
        let idx = match self.find_stream(stnr, output) {
            Some(idx) => idx,
            None => {
                trace!("xfer: no running {} stream {}", if output { "output" } else { "input" }, stnr);
                return false;
            }
        };
        if self.st[idx].bdl().is_none() {
            trace!("xfer: stream {} has no buffer list", idx);
            return false;
        }
        if self.st[idx].completion_pending() {
            trace!("xfer: stream {} waiting for completion ack", idx);
            return false;
        }

        let irq = self.st[idx].transfer(&self.mem, output, buf);

        if self.dp_lbase & DPLBASE_ENABLE != 0 {
            let addr = self.dp_base() + 8 * idx as u64;
            if let Err(e) = self.mem.write_int(addr, self.st[idx].lpib) {
                warn!("dma position write failed: {}", e);
            }
        }

        if irq {
            self.st[idx].ctl |= SD_CTL_BCIS;
            self.update_irq();
        }
        true
    }
}
