//! Generic HDA audio codec.
//!
//! Answers the verbs a driver uses to enumerate and configure a simple codec
//! with a DAC, an optional ADC and one pin per converter, and drives a host
//! voice for every converter.

mod consts;
mod desc;
mod format;
mod stream;

pub use self::consts::*;
pub use self::desc::{CodecDesc, DescNode};
pub use self::format::parse_fmt;
pub use self::stream::{HdaAudioStream, B_SIZE, HDA_TIMER_TICK_NS};

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::audio::AudioBackend;
use crate::devices::hda::codec_bus::{HdaBus, HdaCodecDevice};
use crate::devices::hda::config::{CodecConfig, CodecKind};
use crate::devices::hda::snapshot::SnapshotError;

const CODEC_STATE_MAGIC: u32 = 0x4344_4148; // "HADC"
const CODEC_STATE_VERSION: u16 = 1;

/// Stream tags are four bits wide.
const HDA_STREAM_TAGS: usize = 16;

pub struct HdaAudioCodec {
    kind: CodecKind,
    desc: CodecDesc,
    mixer: bool,
    use_timer: bool,
    backend: Box<dyn AudioBackend>,
    streams: Vec<HdaAudioStream>,
    running_compat: [bool; HDA_STREAM_TAGS],
    running_real: [bool; 2 * HDA_STREAM_TAGS],
}

impl HdaAudioCodec {
    pub fn new(config: &CodecConfig, mut backend: Box<dyn AudioBackend>) -> Self {
        let desc = CodecDesc::new(config.kind, config.mixer);
        let mut streams = Vec::new();
        for node in desc.nodes.iter().filter(|n| n.is_converter()) {
            let mut st = HdaAudioStream::new(node.name, node.is_output());
            st.setup(backend.as_mut());
            streams.push(st);
        }
        info!("{}: {} streams, mixer {}, timer {}",
              config.kind, streams.len(), config.mixer, config.use_timer);

        HdaAudioCodec {
            kind: config.kind,
            desc,
            mixer: config.mixer,
            use_timer: config.use_timer,
            backend,
            streams,
            running_compat: [false; HDA_STREAM_TAGS],
            running_real: [false; 2 * HDA_STREAM_TAGS],
        }
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    pub fn desc(&self) -> &CodecDesc {
        &self.desc
    }

    pub fn streams(&self) -> &[HdaAudioStream] {
        &self.streams
    }

    fn stream_for(&mut self, nid: u32) -> Option<&mut HdaAudioStream> {
        let stindex = self.desc.find_node(nid)?.stindex?;
        self.streams.get_mut(stindex)
    }

    fn running_real(&self, output: bool, stnr: u32) -> bool {
        let idx = output as usize * HDA_STREAM_TAGS + stnr as usize;
        self.running_real.get(idx).copied().unwrap_or(false)
    }

    fn fail(&self, nid: u32, verb: u32, payload: u32, bus: &mut dyn HdaBus) {
        debug!("{}: not handled: nid {} verb 0x{:03x} payload 0x{:04x}",
               self.kind, nid, verb, payload);
        bus.response(true, 0);
    }

    fn encode(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(CODEC_STATE_MAGIC)?;
        out.write_u16::<LittleEndian>(CODEC_STATE_VERSION)?;
        out.write_u8(self.streams.len() as u8)?;
        for st in self.streams.iter() {
            out.write_u32::<LittleEndian>(st.stream)?;
            out.write_u32::<LittleEndian>(st.channel)?;
            out.write_u32::<LittleEndian>(st.format)?;
            out.write_u32::<LittleEndian>(st.gain_left)?;
            out.write_u32::<LittleEndian>(st.gain_right)?;
            out.write_u8(st.mute_left as u8)?;
            out.write_u8(st.mute_right as u8)?;
        }
        for running in self.running_real.iter() {
            out.write_u8(*running as u8)?;
        }
        Ok(out)
    }

    /// Parses a state blob without touching the codec.
    fn decode(&self, data: &[u8]) -> Result<CodecState, SnapshotError> {
        let mut rd = Cursor::new(data);
        if rd.read_u32::<LittleEndian>()? != CODEC_STATE_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = rd.read_u16::<LittleEndian>()?;
        if version != CODEC_STATE_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let count = rd.read_u8()? as usize;
        if count != self.streams.len() {
            return Err(SnapshotError::Mismatch("codec stream count"));
        }

        let mut streams = Vec::with_capacity(count);
        for _ in 0..count {
            streams.push(StreamState {
                stream: rd.read_u32::<LittleEndian>()?,
                channel: rd.read_u32::<LittleEndian>()?,
                format: rd.read_u32::<LittleEndian>()?,
                gain_left: rd.read_u32::<LittleEndian>()?,
                gain_right: rd.read_u32::<LittleEndian>()?,
                mute_left: rd.read_u8()? != 0,
                mute_right: rd.read_u8()? != 0,
            });
        }
        let mut running_real = [false; 2 * HDA_STREAM_TAGS];
        for running in running_real.iter_mut() {
            *running = rd.read_u8()? != 0;
        }
        Ok(CodecState { streams, running_real })
    }

    fn apply(&mut self, state: CodecState, now_ns: u64) {
        let (use_timer, mixer) = (self.use_timer, self.mixer);
        for (st, saved) in self.streams.iter_mut().zip(state.streams.iter()) {
            st.set_running(false, use_timer, now_ns);
            st.stream = saved.stream;
            st.channel = saved.channel;
            st.gain_left = saved.gain_left;
            st.gain_right = saved.gain_right;
            st.mute_left = saved.mute_left;
            st.mute_right = saved.mute_right;
            st.set_format(saved.format, self.backend.as_mut(), mixer);
        }
        self.running_real = state.running_real;
        for tag in 0..HDA_STREAM_TAGS {
            self.running_compat[tag] = self.running_real[tag] || self.running_real[HDA_STREAM_TAGS + tag];
        }

        for i in 0..self.streams.len() {
            let (output, stnr) = (self.streams[i].is_output(), self.streams[i].stream);
            let running = self.running_real(output, stnr);
            self.streams[i].set_running(running, use_timer, now_ns);
        }
    }
}

struct StreamState {
    stream: u32,
    channel: u32,
    format: u32,
    gain_left: u32,
    gain_right: u32,
    mute_left: bool,
    mute_right: bool,
}

struct CodecState {
    streams: Vec<StreamState>,
    running_real: [bool; 2 * HDA_STREAM_TAGS],
}

impl HdaCodecDevice for HdaAudioCodec {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn reset(&mut self, now_ns: u64) {
        for st in self.streams.iter_mut() {
            st.set_running(false, self.use_timer, now_ns);
        }
    }

    fn command(&mut self, nid: u32, data: u32, bus: &mut dyn HdaBus) {
        let (verb, payload) = if (data & 0x70000) == 0x70000 {
            // 12/8 id/payload
            ((data >> 8) & 0xfff, data & 0x00ff)
        } else {
            // 4/16 id/payload
            ((data >> 8) & 0xf00, data & 0xffff)
        };

        let node = match self.desc.find_node(nid) {
            Some(node) => node,
            None => return self.fail(nid, verb, payload, bus),
        };
        trace!("{}: nid {} ({}), verb 0x{:x}, payload 0x{:x}",
               self.kind, nid, node.name, verb, payload);

        match verb {
            AC_VERB_PARAMETERS => match node.param(payload) {
                Some(val) => bus.response(true, val),
                None => self.fail(nid, verb, payload, bus),
            },
            AC_VERB_GET_SUBSYSTEM_ID => bus.response(true, self.desc.iid),
            AC_VERB_GET_CONNECT_LIST => {
                let start = payload as usize;
                let response = node.conn.iter()
                    .skip(start)
                    .take(4)
                    .enumerate()
                    .fold(0u32, |acc, (i, &conn)| acc | (conn << (8 * i)));
                bus.response(true, response);
            }
            AC_VERB_GET_CONFIG_DEFAULT => bus.response(true, node.config),
            AC_VERB_GET_PIN_WIDGET_CONTROL => bus.response(true, node.pinctl),
            AC_VERB_SET_PIN_WIDGET_CONTROL => {
                if node.pinctl != payload {
                    debug!("{}: {}: pinctl 0x{:x} -> 0x{:x} ignored",
                           self.kind, node.name, node.pinctl, payload);
                }
                bus.response(true, 0);
            }
            AC_VERB_SET_CHANNEL_STREAMID => {
                let use_timer = self.use_timer;
                let now = bus.now_ns();
                let running_real = self.running_real;
                match self.stream_for(nid) {
                    Some(st) => {
                        st.set_running(false, use_timer, now);
                        st.stream = (payload >> 4) & 0x0f;
                        st.channel = payload & 0x0f;
                        debug!("{}: stream {}, channel {}", st.name(), st.stream, st.channel);
                        let idx = st.is_output() as usize * HDA_STREAM_TAGS + st.stream as usize;
                        st.set_running(running_real[idx], use_timer, now);
                        bus.response(true, 0);
                    }
                    None => self.fail(nid, verb, payload, bus),
                }
            }
            AC_VERB_GET_CONV => match self.stream_for(nid) {
                Some(st) => {
                    let response = (st.stream << 4) | st.channel;
                    bus.response(true, response);
                }
                None => self.fail(nid, verb, payload, bus),
            },
            AC_VERB_SET_STREAM_FORMAT => {
                let mixer = self.mixer;
                let st = match node.stindex {
                    Some(i) => self.streams.get_mut(i),
                    None => None,
                };
                match st {
                    Some(st) => {
                        st.set_format(payload, self.backend.as_mut(), mixer);
                        bus.response(true, 0);
                    }
                    None => self.fail(nid, verb, payload, bus),
                }
            }
            AC_VERB_GET_STREAM_FORMAT => match self.stream_for(nid) {
                Some(st) => {
                    let format = st.format;
                    bus.response(true, format);
                }
                None => self.fail(nid, verb, payload, bus),
            },
            AC_VERB_GET_AMP_GAIN_MUTE => match self.stream_for(nid) {
                Some(st) => {
                    let response = if payload & AC_AMP_GET_LEFT != 0 {
                        st.gain_left | if st.mute_left { AC_AMP_MUTE } else { 0 }
                    } else {
                        st.gain_right | if st.mute_right { AC_AMP_MUTE } else { 0 }
                    };
                    bus.response(true, response);
                }
                None => self.fail(nid, verb, payload, bus),
            },
            AC_VERB_SET_AMP_GAIN_MUTE => {
                let mixer = self.mixer;
                match self.stream_for(nid) {
                    Some(st) => {
                        let gain = payload & AC_AMP_GAIN;
                        let mute = payload & AC_AMP_MUTE != 0;
                        if payload & AC_AMP_SET_LEFT != 0 {
                            st.gain_left = gain;
                            st.mute_left = mute;
                        }
                        if payload & AC_AMP_SET_RIGHT != 0 {
                            st.gain_right = gain;
                            st.mute_right = mute;
                        }
                        st.set_amp(mixer);
                        bus.response(true, 0);
                    }
                    None => self.fail(nid, verb, payload, bus),
                }
            }
            AC_VERB_SET_POWER_STATE
            | AC_VERB_GET_POWER_STATE
            | AC_VERB_GET_SDI_SELECT => bus.response(true, 0),
            _ => self.fail(nid, verb, payload, bus),
        }
    }

    fn stream(&mut self, stnr: u32, running: bool, output: bool, now_ns: u64) {
        let tag = stnr as usize;
        if tag >= HDA_STREAM_TAGS {
            warn!("{}: stream tag {} out of range", self.kind, stnr);
            return;
        }
        self.running_compat[tag] = running;
        self.running_real[output as usize * HDA_STREAM_TAGS + tag] = running;
        let use_timer = self.use_timer;
        for st in self.streams.iter_mut() {
            if st.is_output() == output && st.stream == stnr {
                st.set_running(running, use_timer, now_ns);
            }
        }
    }

    fn poll(&mut self, bus: &mut dyn HdaBus) {
        let use_timer = self.use_timer;
        for st in self.streams.iter_mut() {
            st.poll(use_timer, bus);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.streams.iter()
            .filter_map(|st| st.next_deadline())
            .min()
    }

    fn save_state(&self) -> Vec<u8> {
        // writes into a Vec only fail on allocation failure
        self.encode().unwrap_or_default()
    }

    fn check_state(&self, data: &[u8]) -> Result<(), SnapshotError> {
        self.decode(data).map(|_| ())
    }

    fn restore_state(&mut self, data: &[u8], now_ns: u64) -> Result<(), SnapshotError> {
        let state = self.decode(data)?;
        self.apply(state, now_ns);
        Ok(())
    }
}
