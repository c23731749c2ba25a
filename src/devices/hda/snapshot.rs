use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::devices::hda::controller::HdaController;
use crate::devices::hda::regs::HDA_STREAM_COUNT;

const SNAPSHOT_MAGIC: u32 = 0x5344_4148; // "HADS"
const SNAPSHOT_VERSION: u16 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot data truncated: {0}")]
    Truncated(#[from] io::Error),
    #[error("snapshot has a bad magic number")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),
    #[error("snapshot does not match device: {0}")]
    Mismatch(&'static str),
    #[error("snapshot has state for codec {0} which is not attached")]
    MissingCodec(u32),
}

/// Saved registers of one stream descriptor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HdaStreamState {
    pub ctl: u32,
    pub lpib: u32,
    pub cbl: u32,
    pub lvi: u32,
    pub fmt: u32,
    pub bdlp_lbase: u32,
    pub bdlp_ubase: u32,
}

/// Saved controller registers. Parsed descriptor lists are not part of the
/// state, they are read again from guest memory on restore.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HdaControllerState {
    pub g_ctl: u32,
    pub wake_en: u32,
    pub state_sts: u32,
    pub int_ctl: u32,
    pub int_sts: u32,
    pub wall_clk: u32,
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
    pub rirb_count: u32,
    pub icw: u32,
    pub irr: u32,
    pub ics: u32,
    pub dp_lbase: u32,
    pub dp_ubase: u32,
    pub streams: [HdaStreamState; HDA_STREAM_COUNT],
}

impl HdaControllerState {
    pub fn capture(hda: &HdaController) -> Self {
        let mut streams = [HdaStreamState::default(); HDA_STREAM_COUNT];
        for (state, st) in streams.iter_mut().zip(hda.st.iter()) {
            *state = HdaStreamState {
                ctl: st.ctl,
                lpib: st.lpib,
                cbl: st.cbl,
                lvi: st.lvi,
                fmt: st.fmt,
                bdlp_lbase: st.bdlp_lbase,
                bdlp_ubase: st.bdlp_ubase,
            };
        }
        HdaControllerState {
            g_ctl: hda.g_ctl,
            wake_en: hda.wake_en,
            state_sts: hda.state_sts,
            int_ctl: hda.int_ctl,
            int_sts: hda.int_sts,
            wall_clk: hda.wall_clk_now(),
            corb_lbase: hda.corb_lbase,
            corb_ubase: hda.corb_ubase,
            corb_rp: hda.corb_rp,
            corb_wp: hda.corb_wp,
            corb_ctl: hda.corb_ctl,
            corb_sts: hda.corb_sts,
            rirb_lbase: hda.rirb_lbase,
            rirb_ubase: hda.rirb_ubase,
            rirb_wp: hda.rirb_wp,
            rirb_cnt: hda.rirb_cnt,
            rirb_ctl: hda.rirb_ctl,
            rirb_sts: hda.rirb_sts,
            rirb_count: hda.rirb_count,
            icw: hda.icw,
            irr: hda.irr,
            ics: hda.ics,
            dp_lbase: hda.dp_lbase,
            dp_ubase: hda.dp_ubase,
            streams,
        }
    }

    /// Loads the registers into `hda`. The wall clock continues from the saved
    /// value.
    pub fn apply(&self, hda: &mut HdaController) {
        hda.g_ctl = self.g_ctl;
        hda.wake_en = self.wake_en;
        hda.state_sts = self.state_sts;
        hda.int_ctl = self.int_ctl;
        hda.int_sts = self.int_sts;
        hda.wall_clk = self.wall_clk;
        hda.corb_lbase = self.corb_lbase;
        hda.corb_ubase = self.corb_ubase;
        hda.corb_rp = self.corb_rp;
        hda.corb_wp = self.corb_wp;
        hda.corb_ctl = self.corb_ctl;
        hda.corb_sts = self.corb_sts;
        hda.rirb_lbase = self.rirb_lbase;
        hda.rirb_ubase = self.rirb_ubase;
        hda.rirb_wp = self.rirb_wp;
        hda.rirb_cnt = self.rirb_cnt;
        hda.rirb_ctl = self.rirb_ctl;
        hda.rirb_sts = self.rirb_sts;
        hda.rirb_count = self.rirb_count;
        hda.icw = self.icw;
        hda.irr = self.irr;
        hda.ics = self.ics;
        hda.dp_lbase = self.dp_lbase;
        hda.dp_ubase = self.dp_ubase;
        hda.wall_base_ns = hda.now_ns().saturating_sub(self.wall_clk as u64 * 1000 / 24);
        for (st, state) in hda.st.iter_mut().zip(self.streams.iter()) {
            st.reset_dma();
            st.ctl = state.ctl;
            st.lpib = state.lpib;
            st.cbl = state.cbl;
            st.lvi = state.lvi;
            st.fmt = state.fmt;
            st.bdlp_lbase = state.bdlp_lbase;
            st.bdlp_ubase = state.bdlp_ubase;
        }
    }

    fn regs(&self) -> [u32; 24] {
        [
            self.g_ctl, self.wake_en, self.state_sts, self.int_ctl, self.int_sts, self.wall_clk,
            self.corb_lbase, self.corb_ubase, self.corb_rp, self.corb_wp, self.corb_ctl, self.corb_sts,
            self.rirb_lbase, self.rirb_ubase, self.rirb_wp, self.rirb_cnt, self.rirb_ctl, self.rirb_sts,
            self.rirb_count, self.icw, self.irr, self.ics, self.dp_lbase, self.dp_ubase,
        ]
    }

    fn set_regs(&mut self, r: [u32; 24]) {
        self.g_ctl = r[0];
        self.wake_en = r[1];
        self.state_sts = r[2];
        self.int_ctl = r[3];
        self.int_sts = r[4];
        self.wall_clk = r[5];
        self.corb_lbase = r[6];
        self.corb_ubase = r[7];
        self.corb_rp = r[8];
        self.corb_wp = r[9];
        self.corb_ctl = r[10];
        self.corb_sts = r[11];
        self.rirb_lbase = r[12];
        self.rirb_ubase = r[13];
        self.rirb_wp = r[14];
        self.rirb_cnt = r[15];
        self.rirb_ctl = r[16];
        self.rirb_sts = r[17];
        self.rirb_count = r[18];
        self.icw = r[19];
        self.irr = r[20];
        self.ics = r[21];
        self.dp_lbase = r[22];
        self.dp_ubase = r[23];
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for reg in self.regs().iter() {
            w.write_u32::<LittleEndian>(*reg)?;
        }
        for st in self.streams.iter() {
            for val in [st.ctl, st.lpib, st.cbl, st.lvi, st.fmt, st.bdlp_lbase, st.bdlp_ubase].iter() {
                w.write_u32::<LittleEndian>(*val)?;
            }
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut state = HdaControllerState::default();
        let mut regs = [0u32; 24];
        r.read_u32_into::<LittleEndian>(&mut regs)?;
        state.set_regs(regs);
        for st in state.streams.iter_mut() {
            let mut vals = [0u32; 7];
            r.read_u32_into::<LittleEndian>(&mut vals)?;
            *st = HdaStreamState {
                ctl: vals[0],
                lpib: vals[1],
                cbl: vals[2],
                lvi: vals[3],
                fmt: vals[4],
                bdlp_lbase: vals[5],
                bdlp_ubase: vals[6],
            };
        }
        Ok(state)
    }
}

/// Saved state of a controller and the codecs attached to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HdaSnapshot {
    pub controller: HdaControllerState,
    /// Codec address and the opaque state blob of each codec.
    pub codecs: Vec<(u32, Vec<u8>)>,
}

impl HdaSnapshot {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // writes into a Vec cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(SNAPSHOT_MAGIC)?;
        w.write_u16::<LittleEndian>(SNAPSHOT_VERSION)?;
        self.controller.write_to(w)?;
        w.write_u8(self.codecs.len() as u8)?;
        for (cad, data) in self.codecs.iter() {
            w.write_u8(*cad as u8)?;
            w.write_u32::<LittleEndian>(data.len() as u32)?;
            w.write_all(data)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> Result<Self, SnapshotError> {
        let mut rd = Cursor::new(data);
        if rd.read_u32::<LittleEndian>()? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = rd.read_u16::<LittleEndian>()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let controller = HdaControllerState::read_from(&mut rd)?;
        let count = rd.read_u8()?;
        let mut codecs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let cad = rd.read_u8()? as u32;
            let len = rd.read_u32::<LittleEndian>()? as usize;
            let mut blob = vec![0; len.min(data.len())];
            rd.read_exact(&mut blob)?;
            if blob.len() != len {
                return Err(SnapshotError::Truncated(io::ErrorKind::UnexpectedEof.into()));
            }
            codecs.push((cad, blob));
        }
        Ok(HdaSnapshot { controller, codecs })
    }
}
