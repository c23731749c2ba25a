use crate::audio::{AudioBackend, AudioSettings, StreamDirection, Voice};
use crate::devices::hda::codec::consts::*;
use crate::devices::hda::codec::format::parse_fmt;
use crate::devices::hda::codec_bus::HdaBus;
use crate::util::{muldiv64, Timer, NANOS_PER_SEC};

/// Size of the intermediate ring between guest DMA and the host voice.
pub const B_SIZE: usize = 8192;
const B_MASK: u64 = B_SIZE as u64 - 1;

/// DMA pacing period in timer mode.
pub const HDA_TIMER_TICK_NS: u64 = 1_000_000;

const COMPAT_BUF_SIZE: usize = 256;

/// One converter widget: the link between a controller DMA stream and a host
/// voice.
///
/// In timer mode a periodic virtual timer moves guest data in and out of the
/// `buf` ring at the nominal rate of the stream format while the host voice
/// drains or fills the other side. The start time of the ring is nudged to
/// keep it about half full. In compat mode data moves in 256 byte chunks
/// whenever the host voice has room.
pub struct HdaAudioStream {
    name: &'static str,
    output: bool,

    pub stream: u32,
    pub channel: u32,
    pub format: u32,
    pub gain_left: u32,
    pub gain_right: u32,
    pub mute_left: bool,
    pub mute_right: bool,

    settings: AudioSettings,
    running: bool,
    voice: Option<Box<dyn Voice>>,

    buf: Vec<u8>,
    rpos: u64,
    wpos: u64,
    buft_start: i64,
    timer: Timer,

    compat_buf: [u8; COMPAT_BUF_SIZE],
    compat_bpos: usize,
}

impl HdaAudioStream {
    pub fn new(name: &'static str, output: bool) -> Self {
        let format = AC_FMT_BITS_16 | 1;
        let gain = if output { QEMU_HDA_AMP_STEPS } else { 0 };
        HdaAudioStream {
            name,
            output,
            stream: 0,
            channel: 0,
            format,
            gain_left: gain,
            gain_right: gain,
            mute_left: false,
            mute_right: false,
            settings: parse_fmt(format, AudioSettings::default()),
            running: false,
            voice: None,
            buf: vec![0; B_SIZE],
            rpos: 0,
            wpos: 0,
            buft_start: 0,
            timer: Timer::new(),
            compat_buf: [0; COMPAT_BUF_SIZE],
            compat_bpos: if output { COMPAT_BUF_SIZE } else { 0 },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn settings(&self) -> AudioSettings {
        self.settings
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timer.deadline()
    }

    /// Bytes currently held in the ring.
    pub fn buffered(&self) -> u64 {
        self.wpos - self.rpos
    }

    /// Applies a new format word and reopens the host voice. The new voice
    /// gets the current gain and mute.
    pub fn set_format(&mut self, format: u32, backend: &mut dyn AudioBackend, mixer: bool) {
        self.format = format;
        self.settings = parse_fmt(format, self.settings);
        self.setup(backend);
        self.set_amp(mixer);
    }

    /// Opens the host voice for the current settings, replacing any open one.
    pub fn setup(&mut self, backend: &mut dyn AudioBackend) {
        debug!("{}: {} {}", self.name, if self.output { "output" } else { "input" }, self.settings);
        let direction = if self.output { StreamDirection::Playback } else { StreamDirection::Capture };
        self.voice = match backend.open_voice(self.name, direction, self.settings) {
            Ok(mut voice) => {
                voice.set_active(self.running);
                Some(voice)
            }
            Err(e) => {
                warn!("{}: failed to open host voice: {}", self.name, e);
                None
            }
        };
    }

    /// Forwards gain and mute to the host voice when the mixer is enabled.
    pub fn set_amp(&mut self, mixer: bool) {
        let muted = self.mute_left && self.mute_right;
        let left = if self.mute_left { 0 } else { self.gain_left };
        let right = if self.mute_right { 0 } else { self.gain_right };
        let left = (left * 255 / QEMU_HDA_AMP_STEPS).min(255) as u8;
        let right = (right * 255 / QEMU_HDA_AMP_STEPS).min(255) as u8;
        debug!("{}: volume {}/{} muted {}", self.name, left, right, muted);
        if !mixer {
            return;
        }
        if let Some(voice) = self.voice.as_mut() {
            voice.set_volume(muted, left, right);
        }
    }

    pub fn set_running(&mut self, running: bool, use_timer: bool, now_ns: u64) {
        if self.running == running {
            return;
        }
        self.running = running;
        debug!("{}: {} (stream {})", self.name, if running { "on" } else { "off" }, self.stream);
        if use_timer {
            if running {
                self.rpos = 0;
                self.wpos = 0;
                self.buft_start = now_ns as i64;
                self.timer.mod_anticipate(now_ns + HDA_TIMER_TICK_NS);
            } else {
                self.timer.del();
            }
        }
        if let Some(voice) = self.voice.as_mut() {
            voice.set_active(running);
        }
    }

    /// Runs the pacing timer if due and services the host voice.
    pub fn poll(&mut self, use_timer: bool, bus: &mut dyn HdaBus) {
        if !self.running {
            return;
        }
        let now = bus.now_ns();
        if use_timer {
            if self.timer.take_expired(now) {
                if self.output {
                    self.output_timer(now, bus);
                } else {
                    self.input_timer(now, bus);
                }
                if self.running {
                    self.timer.mod_anticipate(now + HDA_TIMER_TICK_NS);
                }
            }
            let avail = self.voice.as_mut().map_or(0, |v| v.available());
            if avail > 0 {
                if self.output {
                    self.output_cb(avail, now);
                } else {
                    self.input_cb(avail, now);
                }
            }
        } else {
            let avail = self.voice.as_mut().map_or(0, |v| v.available());
            if avail > 0 {
                if self.output {
                    self.compat_output_cb(avail, bus);
                } else {
                    self.compat_input_cb(avail, bus);
                }
            }
        }
    }

    fn bytes_per_second(&self) -> u64 {
        self.settings.bytes_per_second()
    }

    /// Ring position the guest side should have reached by `now_ns`.
    fn wanted_pos(&self, now_ns: u64) -> u64 {
        let elapsed = (now_ns as i64 - self.buft_start).max(0) as u64;
        muldiv64(elapsed, self.bytes_per_second(), NANOS_PER_SEC) & !3
    }

    fn sync_adjust(&mut self, target_pos: i64) {
        let limit = (B_SIZE / 8) as i64;
        let tick = HDA_TIMER_TICK_NS as i64;
        let corr = if target_pos > limit {
            tick
        } else if target_pos < -(limit * 2) {
            -tick * 4
        } else if target_pos < -limit {
            -tick
        } else {
            0
        };
        if corr != 0 {
            trace!("{}: sync adjust {} by {}ns", self.name, target_pos, corr);
        }
        self.buft_start += corr;
    }

    /// Pulls guest data into the ring up to the position due at `now_ns`.
    fn output_timer(&mut self, now_ns: u64, bus: &mut dyn HdaBus) {
        let wanted_wpos = self.wanted_pos(now_ns);
        if wanted_wpos <= self.wpos {
            return;
        }
        let mut to_transfer = (B_SIZE as u64 - (self.wpos - self.rpos)).min(wanted_wpos - self.wpos);
        while to_transfer > 0 {
            let start = (self.wpos & B_MASK) as usize;
            let chunk = (B_SIZE - start).min(to_transfer as usize);
            if !bus.xfer(self.stream, true, &mut self.buf[start..start + chunk]) {
                break;
            }
            self.wpos += chunk as u64;
            to_transfer -= chunk as u64;
        }
    }

    /// Drains the ring into the host voice.
    fn output_cb(&mut self, avail: usize, now_ns: u64) {
        if self.wpos - self.rpos == B_SIZE as u64 {
            debug!("{}: ring overrun, resync", self.name);
            self.rpos = 0;
            self.wpos = 0;
            self.buft_start = now_ns as i64;
            return;
        }

        let mut to_transfer = (self.wpos - self.rpos).min(avail as u64);
        self.sync_adjust((self.wpos - self.rpos) as i64 - to_transfer as i64 - (B_SIZE / 2) as i64);

        let voice = match self.voice.as_mut() {
            Some(voice) => voice,
            None => return,
        };
        while to_transfer > 0 {
            let start = (self.rpos & B_MASK) as usize;
            let chunk = (B_SIZE - start).min(to_transfer as usize);
            let written = voice.write(&self.buf[start..start + chunk]);
            self.rpos += written as u64;
            to_transfer -= written as u64;
            if written < chunk {
                break;
            }
        }
    }

    /// Pushes captured data from the ring to the guest up to the position due
    /// at `now_ns`.
    fn input_timer(&mut self, now_ns: u64, bus: &mut dyn HdaBus) {
        let wanted_rpos = self.wanted_pos(now_ns);
        if wanted_rpos <= self.rpos {
            return;
        }
        let mut to_transfer = (self.wpos - self.rpos).min(wanted_rpos - self.rpos);
        while to_transfer > 0 {
            let start = (self.rpos & B_MASK) as usize;
            let chunk = (B_SIZE - start).min(to_transfer as usize);
            if !bus.xfer(self.stream, false, &mut self.buf[start..start + chunk]) {
                break;
            }
            self.rpos += chunk as u64;
            to_transfer -= chunk as u64;
        }
    }

    /// Fills the ring from the host voice.
    fn input_cb(&mut self, avail: usize, _now_ns: u64) {
        let mut to_transfer = (B_SIZE as u64 - (self.wpos - self.rpos)).min(avail as u64);
        self.sync_adjust(-((self.wpos - self.rpos) as i64 + to_transfer as i64 - (B_SIZE / 2) as i64));

        let voice = match self.voice.as_mut() {
            Some(voice) => voice,
            None => return,
        };
        while to_transfer > 0 {
            let start = (self.wpos & B_MASK) as usize;
            let chunk = (B_SIZE - start).min(to_transfer as usize);
            let read = voice.read(&mut self.buf[start..start + chunk]);
            self.wpos += read as u64;
            to_transfer -= read as u64;
            if read < chunk {
                break;
            }
        }
    }

    fn compat_output_cb(&mut self, avail: usize, bus: &mut dyn HdaBus) {
        let voice = match self.voice.as_mut() {
            Some(voice) => voice,
            None => return,
        };
        let mut sent = 0;
        while avail - sent >= COMPAT_BUF_SIZE {
            if self.compat_bpos == COMPAT_BUF_SIZE {
                if !bus.xfer(self.stream, true, &mut self.compat_buf) {
                    break;
                }
                self.compat_bpos = 0;
            }
            let written = voice.write(&self.compat_buf[self.compat_bpos..]);
            self.compat_bpos += written;
            sent += written;
            if self.compat_bpos != COMPAT_BUF_SIZE {
                break;
            }
        }
    }

    fn compat_input_cb(&mut self, avail: usize, bus: &mut dyn HdaBus) {
        let voice = match self.voice.as_mut() {
            Some(voice) => voice,
            None => return,
        };
        let mut recv = 0;
        while avail - recv >= COMPAT_BUF_SIZE {
            if self.compat_bpos != COMPAT_BUF_SIZE {
                let read = voice.read(&mut self.compat_buf[self.compat_bpos..]);
                self.compat_bpos += read;
                recv += read;
                if self.compat_bpos != COMPAT_BUF_SIZE {
                    break;
                }
            }
            if !bus.xfer(self.stream, false, &mut self.compat_buf) {
                break;
            }
            self.compat_bpos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferBackend;

    /// Serves a counting byte pattern for output and records captured data.
    struct TestBus {
        now: u64,
        next: u8,
        captured: Vec<u8>,
        accept: bool,
    }

    impl TestBus {
        fn new(now: u64) -> Self {
            TestBus { now, next: 0, captured: Vec::new(), accept: true }
        }
    }

    impl HdaBus for TestBus {
        fn response(&mut self, _solicited: bool, _response: u32) {}

        fn xfer(&mut self, _stnr: u32, output: bool, buf: &mut [u8]) -> bool {
            if !self.accept {
                return false;
            }
            if output {
                for b in buf.iter_mut() {
                    *b = self.next;
                    self.next = self.next.wrapping_add(1);
                }
            } else {
                self.captured.extend_from_slice(buf);
            }
            true
        }

        fn now_ns(&self) -> u64 {
            self.now
        }
    }

    #[test]
    fn running_arms_timer() {
        let mut backend = BufferBackend::new();
        let mut st = HdaAudioStream::new("dac", true);
        st.setup(&mut backend);
        st.set_running(true, true, 5_000);
        assert_eq!(st.next_deadline(), Some(5_000 + HDA_TIMER_TICK_NS));
        assert!(backend.voice("dac").unwrap().is_active());
        st.set_running(false, true, 6_000);
        assert_eq!(st.next_deadline(), None);
        assert!(!backend.voice("dac").unwrap().is_active());
    }

    #[test]
    fn output_timer_moves_nominal_rate() {
        let mut backend = BufferBackend::new();
        let mut st = HdaAudioStream::new("dac", true);
        st.setup(&mut backend);
        st.set_running(true, true, 0);

        // 48kHz stereo 16 bit is 192 bytes per millisecond
        let mut bus = TestBus::new(HDA_TIMER_TICK_NS);
        st.poll(true, &mut bus);
        assert_eq!(st.buffered(), 192);
        assert_eq!(st.next_deadline(), Some(2 * HDA_TIMER_TICK_NS));
    }

    #[test]
    fn output_reaches_host_in_order() {
        let mut backend = BufferBackend::new();
        let mut st = HdaAudioStream::new("dac", true);
        st.setup(&mut backend);
        st.set_running(true, true, 0);
        let voice = backend.voice("dac").unwrap();

        let mut bus = TestBus::new(0);
        for ms in 1..=3 {
            bus.now = ms * HDA_TIMER_TICK_NS;
            st.poll(true, &mut bus);
        }
        assert_eq!(st.buffered(), 576);

        voice.grant(100);
        st.poll(true, &mut bus);
        let played = voice.take_played();
        assert_eq!(played.len(), 100);
        assert!(played.iter().enumerate().all(|(i, &b)| b == i as u8));
        assert_eq!(st.buffered(), 476);
    }

    #[test]
    fn input_timer_delivers_captured_data() {
        let mut backend = BufferBackend::new();
        let mut st = HdaAudioStream::new("adc", false);
        st.setup(&mut backend);
        st.set_running(true, true, 0);
        let voice = backend.voice("adc").unwrap();
        let samples: Vec<u8> = (0..200u8).collect();
        voice.push_capture(&samples);
        voice.grant(200);

        // first tick finds the ring empty, then the host fills it
        let mut bus = TestBus::new(HDA_TIMER_TICK_NS);
        st.poll(true, &mut bus);
        assert!(bus.captured.is_empty());
        assert_eq!(st.buffered(), 200);
        bus.now = 2 * HDA_TIMER_TICK_NS;
        st.poll(true, &mut bus);
        assert_eq!(bus.captured, &samples[..192]);
        assert_eq!(st.buffered(), 8);
    }

    #[test]
    fn sync_adjust_thresholds() {
        let mut st = HdaAudioStream::new("dac", true);
        let limit = (B_SIZE / 8) as i64;
        let tick = HDA_TIMER_TICK_NS as i64;
        st.sync_adjust(limit);
        assert_eq!(st.buft_start, 0);
        st.sync_adjust(limit + 1);
        assert_eq!(st.buft_start, tick);
        st.sync_adjust(-limit - 1);
        assert_eq!(st.buft_start, 0);
        st.sync_adjust(-2 * limit - 1);
        assert_eq!(st.buft_start, -4 * tick);
    }

    #[test]
    fn output_overrun_resyncs() {
        let mut st = HdaAudioStream::new("dac", true);
        st.wpos = B_SIZE as u64;
        st.output_cb(64, 77);
        assert_eq!((st.rpos, st.wpos, st.buft_start), (0, 0, 77));
    }

    #[test]
    fn compat_mode_moves_whole_chunks() {
        let mut backend = BufferBackend::new();
        let mut st = HdaAudioStream::new("dac", true);
        st.setup(&mut backend);
        st.set_running(true, false, 0);
        assert_eq!(st.next_deadline(), None);
        let voice = backend.voice("dac").unwrap();

        let mut bus = TestBus::new(0);
        voice.grant(600);
        st.poll(false, &mut bus);
        assert_eq!(voice.take_played().len(), 512);

        bus.accept = false;
        voice.grant(200);
        st.poll(false, &mut bus);
        assert!(voice.take_played().is_empty());
    }

    #[test]
    fn amp_scaling() {
        let mut backend = BufferBackend::new();
        let mut st = HdaAudioStream::new("dac", true);
        st.setup(&mut backend);
        st.mute_right = true;
        st.set_amp(true);
        assert_eq!(backend.voice("dac").unwrap().volume(), Some((false, 255, 0)));
        st.gain_left = 0x25;
        st.mute_left = true;
        st.set_amp(false);
        assert_eq!(backend.voice("dac").unwrap().volume(), Some((false, 255, 0)));
        st.set_amp(true);
        assert_eq!(backend.voice("dac").unwrap().volume(), Some((true, 0, 0)));
    }
}
