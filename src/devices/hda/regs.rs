//! Controller register map.
//!
//! Every guest visible register is described by an `HdaReg` entry: its
//! width, reset value, the bits a guest write may change (`wmask`) and the
//! bits a guest write of 1 clears (`wclear`). Entries without backing state
//! are constants which always read back their reset value. Sub-byte views of a
//! wider register (the stream status byte) carry a `shift`.

use crate::devices::hda::intel_hda::IntelHda;

pub const HDA_MMIO_SIZE: usize = 0x4000;

pub const ICH6_REG_GCAP: u64 = 0x00;
pub const ICH6_REG_VMIN: u64 = 0x02;
pub const ICH6_REG_VMAJ: u64 = 0x03;
pub const ICH6_REG_OUTPAY: u64 = 0x04;
pub const ICH6_REG_INPAY: u64 = 0x06;
pub const ICH6_REG_GCTL: u64 = 0x08;
pub const ICH6_REG_WAKEEN: u64 = 0x0c;
pub const ICH6_REG_STATESTS: u64 = 0x0e;
pub const ICH6_REG_INTCTL: u64 = 0x20;
pub const ICH6_REG_INTSTS: u64 = 0x24;
pub const ICH6_REG_WALLCLK: u64 = 0x30;
pub const ICH6_REG_CORBLBASE: u64 = 0x40;
pub const ICH6_REG_CORBUBASE: u64 = 0x44;
pub const ICH6_REG_CORBWP: u64 = 0x48;
pub const ICH6_REG_CORBRP: u64 = 0x4a;
pub const ICH6_REG_CORBCTL: u64 = 0x4c;
pub const ICH6_REG_CORBSTS: u64 = 0x4d;
pub const ICH6_REG_CORBSIZE: u64 = 0x4e;
pub const ICH6_REG_RIRBLBASE: u64 = 0x50;
pub const ICH6_REG_RIRBUBASE: u64 = 0x54;
pub const ICH6_REG_RIRBWP: u64 = 0x58;
pub const ICH6_REG_RINTCNT: u64 = 0x5a;
pub const ICH6_REG_RIRBCTL: u64 = 0x5c;
pub const ICH6_REG_RIRBSTS: u64 = 0x5d;
pub const ICH6_REG_RIRBSIZE: u64 = 0x5e;
pub const ICH6_REG_IC: u64 = 0x60;
pub const ICH6_REG_IR: u64 = 0x64;
pub const ICH6_REG_IRS: u64 = 0x68;
pub const ICH6_REG_DPLBASE: u64 = 0x70;
pub const ICH6_REG_DPUBASE: u64 = 0x74;

/// Alias page mirroring WALLCLK and the stream LPIB registers.
pub const ICH6_REG_ALIAS_BASE: u64 = 0x2000;

pub const HDA_STREAM_BASE: u64 = 0x80;
pub const HDA_STREAM_STRIDE: u64 = 0x20;
pub const HDA_STREAM_COUNT: usize = 8;
/// Streams 0..4 are input (SDI), 4..8 output (SDO).
pub const HDA_INPUT_STREAMS: usize = 4;

pub const ICH6_REG_SD_CTL: u64 = 0x00;
pub const ICH6_REG_SD_STS: u64 = 0x03;
pub const ICH6_REG_SD_LPIB: u64 = 0x04;
pub const ICH6_REG_SD_CBL: u64 = 0x08;
pub const ICH6_REG_SD_LVI: u64 = 0x0c;
pub const ICH6_REG_SD_FIFOS: u64 = 0x10;
pub const ICH6_REG_SD_FMT: u64 = 0x12;
pub const ICH6_REG_SD_BDLPL: u64 = 0x18;
pub const ICH6_REG_SD_BDLPU: u64 = 0x1c;

pub const GCTL_CRST: u32 = 1 << 0;

pub const INTCTL_GIE: u32 = 1 << 31;
pub const INTCTL_CIE: u32 = 1 << 30;
pub const INTSTS_GIS: u32 = 1 << 31;
pub const INTSTS_CIS: u32 = 1 << 30;

pub const CORBRP_RST: u32 = 1 << 15;
pub const CORBCTL_RUN: u32 = 1 << 1;
pub const RIRBWP_RST: u32 = 1 << 15;
pub const RIRBCTL_IRQ_EN: u32 = 1 << 0;
pub const RIRBCTL_DMA_EN: u32 = 1 << 1;
pub const RIRBCTL_OVERRUN_EN: u32 = 1 << 2;
pub const RIRBSTS_IRQ: u32 = 1 << 0;
pub const RIRBSTS_OVERRUN: u32 = 1 << 2;

pub const IRS_BUSY: u32 = 1 << 0;
pub const IRS_VALID: u32 = 1 << 1;
pub const IRS_CAD_MASK: u32 = 0xf0;

pub const DPLBASE_ENABLE: u32 = 1 << 0;

pub const SD_CTL_SRST: u32 = 1 << 0;
pub const SD_CTL_RUN: u32 = 1 << 1;
pub const SD_CTL_STREAM_TAG_SHIFT: u32 = 20;
pub const SD_CTL_STREAM_TAG_MASK: u32 = 0xf << SD_CTL_STREAM_TAG_SHIFT;
/// Status byte bits as seen in the 32-bit CTL register.
pub const SD_CTL_BCIS: u32 = 1 << 26;
pub const SD_STS_FIFO_READY: u32 = 1 << 5;
pub const SD_STS_W1C: u32 = 0x1c;

/// Bytes moved per codec transfer, reported in FIFOS.
pub const HDA_BUFFER_SIZE: u32 = 256;

/// Backing storage selected by a register descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegField {
    GCtl,
    WakeEn,
    StateSts,
    IntCtl,
    IntSts,
    WallClk,
    CorbLbase,
    CorbUbase,
    CorbWp,
    CorbRp,
    CorbCtl,
    CorbSts,
    RirbLbase,
    RirbUbase,
    RirbWp,
    RirbCnt,
    RirbCtl,
    RirbSts,
    Icw,
    Irr,
    Ics,
    DpLbase,
    DpUbase,
    StCtl,
    StLpib,
    StCbl,
    StLvi,
    StFmt,
    StBdlpLbase,
    StBdlpUbase,
}

impl RegField {
    pub fn is_stream(self) -> bool {
        use RegField::*;
        matches!(self, StCtl | StLpib | StCbl | StLvi | StFmt | StBdlpLbase | StBdlpUbase)
    }
}

/// Side effect run after a guest write, receives the value before the write.
pub type WriteHandler = fn(&mut IntelHda, &HdaReg, u32);
/// Refreshes derived state before a guest read.
pub type ReadHandler = fn(&mut IntelHda, &HdaReg);

#[derive(Copy, Clone)]
pub struct HdaReg {
    pub name: &'static str,
    /// Stream index for per-stream registers.
    pub stream: usize,
    pub size: usize,
    pub reset: u32,
    pub wmask: u32,
    pub wclear: u32,
    pub field: Option<RegField>,
    pub shift: u32,
    pub whandler: Option<WriteHandler>,
    pub rhandler: Option<ReadHandler>,
    /// Second address of a register stored elsewhere in the table.
    pub alias: bool,
}

impl HdaReg {
    pub fn is_read_only(&self) -> bool {
        self.wmask == 0 && self.wclear == 0
    }

    pub fn is_constant(&self) -> bool {
        self.field.is_none()
    }
}

const fn reg(name: &'static str, size: usize, field: Option<RegField>) -> HdaReg {
    HdaReg {
        name,
        stream: 0,
        size,
        reset: 0,
        wmask: 0,
        wclear: 0,
        field,
        shift: 0,
        whandler: None,
        rhandler: None,
        alias: false,
    }
}

static GLOBAL_REGS: &[(u64, HdaReg)] = &[
    // 4 input streams, 4 output streams, 64-bit addressing
    (ICH6_REG_GCAP, HdaReg { reset: 0x4401, ..reg("GCAP", 2, None) }),
    (ICH6_REG_VMIN, HdaReg { reset: 0x00, ..reg("VMIN", 1, None) }),
    (ICH6_REG_VMAJ, HdaReg { reset: 0x01, ..reg("VMAJ", 1, None) }),
    (ICH6_REG_OUTPAY, HdaReg { reset: 0x003c, ..reg("OUTPAY", 2, None) }),
    (ICH6_REG_INPAY, HdaReg { reset: 0x001d, ..reg("INPAY", 2, None) }),
    (ICH6_REG_GCTL, HdaReg {
        wmask: 0x0103,
        whandler: Some(IntelHda::set_g_ctl),
        ..reg("GCTL", 4, Some(RegField::GCtl))
    }),
    (ICH6_REG_WAKEEN, HdaReg { wmask: 0x7fff, ..reg("WAKEEN", 2, Some(RegField::WakeEn)) }),
    (ICH6_REG_STATESTS, HdaReg {
        wclear: 0x7fff,
        whandler: Some(IntelHda::set_state_sts),
        ..reg("STATESTS", 2, Some(RegField::StateSts))
    }),
    (ICH6_REG_INTCTL, HdaReg {
        wmask: 0xc000_00ff,
        whandler: Some(IntelHda::set_int_ctl),
        ..reg("INTCTL", 4, Some(RegField::IntCtl))
    }),
    (ICH6_REG_INTSTS, HdaReg {
        wclear: 0xc000_00ff,
        whandler: Some(IntelHda::set_int_sts),
        rhandler: Some(IntelHda::get_int_sts),
        ..reg("INTSTS", 4, Some(RegField::IntSts))
    }),
    (ICH6_REG_WALLCLK, HdaReg {
        rhandler: Some(IntelHda::get_wall_clk),
        ..reg("WALLCLK", 4, Some(RegField::WallClk))
    }),
    (ICH6_REG_ALIAS_BASE + ICH6_REG_WALLCLK, HdaReg {
        rhandler: Some(IntelHda::get_wall_clk),
        alias: true,
        ..reg("WALLCLK(alias)", 4, Some(RegField::WallClk))
    }),
    (ICH6_REG_CORBLBASE, HdaReg { wmask: 0xffff_ff80, ..reg("CORBLBASE", 4, Some(RegField::CorbLbase)) }),
    (ICH6_REG_CORBUBASE, HdaReg { wmask: 0xffff_ffff, ..reg("CORBUBASE", 4, Some(RegField::CorbUbase)) }),
    (ICH6_REG_CORBWP, HdaReg {
        wmask: 0xff,
        whandler: Some(IntelHda::set_corb_wp),
        ..reg("CORBWP", 2, Some(RegField::CorbWp))
    }),
    (ICH6_REG_CORBRP, HdaReg {
        wmask: CORBRP_RST,
        whandler: Some(IntelHda::set_corb_rp),
        ..reg("CORBRP", 2, Some(RegField::CorbRp))
    }),
    (ICH6_REG_CORBCTL, HdaReg {
        wmask: 0x03,
        whandler: Some(IntelHda::set_corb_ctl),
        ..reg("CORBCTL", 1, Some(RegField::CorbCtl))
    }),
    (ICH6_REG_CORBSTS, HdaReg { wclear: 0x01, ..reg("CORBSTS", 1, Some(RegField::CorbSts)) }),
    // 256 entries supported and selected
    (ICH6_REG_CORBSIZE, HdaReg { reset: 0x42, ..reg("CORBSIZE", 1, None) }),
    (ICH6_REG_RIRBLBASE, HdaReg { wmask: 0xffff_ff80, ..reg("RIRBLBASE", 4, Some(RegField::RirbLbase)) }),
    (ICH6_REG_RIRBUBASE, HdaReg { wmask: 0xffff_ffff, ..reg("RIRBUBASE", 4, Some(RegField::RirbUbase)) }),
    (ICH6_REG_RIRBWP, HdaReg {
        wmask: RIRBWP_RST,
        whandler: Some(IntelHda::set_rirb_wp),
        ..reg("RIRBWP", 2, Some(RegField::RirbWp))
    }),
    (ICH6_REG_RINTCNT, HdaReg { wmask: 0xff, ..reg("RINTCNT", 2, Some(RegField::RirbCnt)) }),
    (ICH6_REG_RIRBCTL, HdaReg { wmask: 0x07, ..reg("RIRBCTL", 1, Some(RegField::RirbCtl)) }),
    (ICH6_REG_RIRBSTS, HdaReg {
        wclear: RIRBSTS_IRQ | RIRBSTS_OVERRUN,
        whandler: Some(IntelHda::set_rirb_sts),
        ..reg("RIRBSTS", 1, Some(RegField::RirbSts))
    }),
    (ICH6_REG_RIRBSIZE, HdaReg { reset: 0x42, ..reg("RIRBSIZE", 1, None) }),
    (ICH6_REG_IC, HdaReg { wmask: 0xffff_ffff, ..reg("ICW", 4, Some(RegField::Icw)) }),
    (ICH6_REG_IR, reg("IRR", 4, Some(RegField::Irr))),
    (ICH6_REG_IRS, HdaReg {
        wmask: IRS_BUSY | IRS_VALID,
        wclear: IRS_VALID,
        whandler: Some(IntelHda::set_ics),
        ..reg("ICS", 2, Some(RegField::Ics))
    }),
    (ICH6_REG_DPLBASE, HdaReg { wmask: 0xffff_ff81, ..reg("DPLBASE", 4, Some(RegField::DpLbase)) }),
    (ICH6_REG_DPUBASE, HdaReg { wmask: 0xffff_ffff, ..reg("DPUBASE", 4, Some(RegField::DpUbase)) }),
];

/// Register layout of one stream descriptor block, offsets relative to the block.
static STREAM_REGS: &[(u64, HdaReg)] = &[
    (ICH6_REG_SD_CTL, HdaReg {
        reset: SD_STS_FIFO_READY << 24,
        wmask: 0x00ff_001f,
        wclear: SD_STS_W1C << 24,
        whandler: Some(IntelHda::set_st_ctl),
        ..reg("SD CTL", 4, Some(RegField::StCtl))
    }),
    (ICH6_REG_SD_STS, HdaReg {
        shift: 24,
        wclear: SD_STS_W1C << 24,
        whandler: Some(IntelHda::set_st_ctl),
        ..reg("SD CTL(stat)", 1, Some(RegField::StCtl))
    }),
    (ICH6_REG_SD_LPIB, reg("SD LPIB", 4, Some(RegField::StLpib))),
    (ICH6_REG_SD_CBL, HdaReg { wmask: 0xffff_ffff, ..reg("SD CBL", 4, Some(RegField::StCbl)) }),
    (ICH6_REG_SD_LVI, HdaReg { wmask: 0x00ff, ..reg("SD LVI", 2, Some(RegField::StLvi)) }),
    (ICH6_REG_SD_FIFOS, HdaReg { reset: HDA_BUFFER_SIZE, ..reg("SD FIFOS", 2, None) }),
    (ICH6_REG_SD_FMT, HdaReg { wmask: 0x7f7f, ..reg("SD FMT", 2, Some(RegField::StFmt)) }),
    (ICH6_REG_SD_BDLPL, HdaReg { wmask: 0xffff_ff80, ..reg("SD BDLPL", 4, Some(RegField::StBdlpLbase)) }),
    (ICH6_REG_SD_BDLPU, HdaReg { wmask: 0xffff_ffff, ..reg("SD BDLPU", 4, Some(RegField::StBdlpUbase)) }),
];

fn stream_reg(rel: u64, stream: usize) -> Option<HdaReg> {
    STREAM_REGS.iter()
        .find(|(off, _)| *off == rel)
        .map(|(_, r)| HdaReg { stream, ..*r })
}

/// Resolves the register starting exactly at `offset`.
pub fn find(offset: u64) -> Option<HdaReg> {
    let stream_end = HDA_STREAM_BASE + HDA_STREAM_STRIDE * HDA_STREAM_COUNT as u64;
    let lpib_alias = ICH6_REG_ALIAS_BASE + HDA_STREAM_BASE;

    if offset >= HDA_STREAM_BASE && offset < stream_end {
        let idx = ((offset - HDA_STREAM_BASE) / HDA_STREAM_STRIDE) as usize;
        let rel = (offset - HDA_STREAM_BASE) % HDA_STREAM_STRIDE;
        return stream_reg(rel, idx);
    }

    if offset >= lpib_alias && offset < lpib_alias + HDA_STREAM_STRIDE * HDA_STREAM_COUNT as u64 {
        let idx = ((offset - lpib_alias) / HDA_STREAM_STRIDE) as usize;
        let rel = (offset - lpib_alias) % HDA_STREAM_STRIDE;
        if rel == ICH6_REG_SD_LPIB {
            return stream_reg(rel, idx).map(|r| HdaReg { name: "SD LPIB(alias)", alias: true, ..r });
        }
        return None;
    }

    GLOBAL_REGS.iter()
        .find(|(off, _)| *off == offset)
        .map(|(_, r)| *r)
}

/// Registers with backing storage which take their reset value on controller reset.
pub fn resettable() -> impl Iterator<Item = HdaReg> {
    let globals = GLOBAL_REGS.iter()
        .map(|(_, r)| *r)
        .filter(|r| r.field.is_some() && r.shift == 0 && !r.alias);
    let streams = (0..HDA_STREAM_COUNT).flat_map(|idx| {
        STREAM_REGS.iter()
            .map(move |(_, r)| HdaReg { stream: idx, ..*r })
            .filter(|r| r.field.is_some() && r.shift == 0)
    });
    globals.chain(streams)
}

/// MMIO offset of register `rel` of stream `idx`.
pub fn stream_offset(idx: usize, rel: u64) -> u64 {
    HDA_STREAM_BASE + HDA_STREAM_STRIDE * idx as u64 + rel
}
