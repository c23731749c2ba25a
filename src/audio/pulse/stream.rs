use std::sync::{Arc, Mutex, MutexGuard};
use pulse::sample::Spec;
use pulse::stream::{FlagSet, PeekResult, SeekMode, State, Stream};
use pulse::volume::{ChannelVolumes, Volume};
use crate::audio::pulse::{PulseError,Result};
use crate::audio::pulse::context::PulseContext;
use crate::audio::pulse::message::PulseMessageChannel;
use crate::audio::{AudioSettings, SampleFormat, StreamDirection, Voice};

/// Byte count most recently reported by the stream write or read callback.
struct Available {
    byte_count: Mutex<usize>,
}

impl Available {
    fn new() -> Self {
        Available {
            byte_count: Mutex::new(0),
        }
    }

    fn byte_count_lock(&self) -> MutexGuard<usize> {
        self.byte_count.lock().unwrap()
    }

    fn update(&self, value: usize) {
        *self.byte_count_lock() = value;
    }

    fn decrement(&self, amount: usize) {
        let mut byte_count = self.byte_count_lock();
        *byte_count = byte_count.saturating_sub(amount);
    }

    fn get(&self) -> usize {
        *self.byte_count_lock()
    }
}

/// Per channel volumes for a stream with `channels` channels. Even channels
/// take the left gain and odd channels the right gain, a mono stream takes the
/// louder of the two.
pub fn channel_volumes(channels: u8, left: u8, right: u8) -> ChannelVolumes {
    let scale = |v: u8| Volume((v as u32 * Volume::NORMAL.0) / 255);
    let mut volumes = ChannelVolumes::default();
    let channels = channels.max(1).min(ChannelVolumes::CHANNELS_MAX);
    volumes.set_len(channels);
    if channels == 1 {
        volumes.get_mut()[0] = scale(left.max(right));
    } else {
        for (i, v) in volumes.get_mut().iter_mut().enumerate() {
            *v = scale(if i % 2 == 0 { left } else { right });
        }
    }
    volumes
}

pub struct PulseStream {
    spec: Spec,
    direction: StreamDirection,
    index: Option<u32>,
    stream: Arc<Mutex<Stream>>,
    avail: Arc<Available>,
    /// Remainder of the last record fragment not yet handed out by `read`.
    pending: Vec<u8>,
    channel: PulseMessageChannel,
}

impl PulseStream {

    fn stream_connected_finish(&mut self, ctx: &PulseContext) {
        self.stream().set_state_callback(None);
        ctx.mainloop_unlock();
    }

    fn wait_stream_connected(&mut self, ctx: &PulseContext) -> Result<()> {
        loop {
            let state = self.stream().get_state();
            if state == State::Ready {
                break;
            } else if !state.is_good() {
                return Err(PulseError::StreamConnectFailed);
            }
            ctx.mainloop_wait();
        }
        Ok(())
    }

    pub fn connect(&mut self, ctx: &PulseContext) -> Result<()> {
        ctx.mainloop_lock();

        self.stream().set_state_callback(Some(Box::new({
            let ml_ref = ctx.mainloop();
            move || unsafe {
                (*ml_ref.as_ptr()).signal(false);
            }
        })));

        let connected = match self.direction {
            StreamDirection::Playback => self.stream().connect_playback(
                None,
                None,
                FlagSet::START_CORKED,
                None,
                None),
            StreamDirection::Capture => self.stream().connect_record(
                None,
                None,
                FlagSet::START_CORKED),
        };
        if let Err(err) = connected {
            self.stream().set_state_callback(None);
            ctx.mainloop_unlock();
            return Err(PulseError::StreamConnect(err))
        }

        let result = self.wait_stream_connected(ctx);
        if result.is_ok() {
            let index = self.stream().get_index();
            self.index = index;
        }
        self.stream_connected_finish(ctx);
        result
    }

    pub fn new(mut stream: Stream, spec: Spec, direction: StreamDirection, channel: PulseMessageChannel) -> Self {
        let avail = Arc::new(Available::new());

        let callback = Box::new({
            let avail = avail.clone();
            move |nbytes| {
                avail.update(nbytes);
            }
        });
        match direction {
            StreamDirection::Playback => stream.set_write_callback(Some(callback)),
            StreamDirection::Capture => stream.set_read_callback(Some(callback)),
        }

        let stream = Arc::new(Mutex::new(stream));
        PulseStream {
            spec,
            direction,
            index: None,
            avail,
            stream,
            pending: Vec::new(),
            channel,
        }
    }

    fn stream(&self) -> MutexGuard<Stream> {
        self.stream.lock().unwrap()
    }

    fn with_mainloop_lock<T, F: FnOnce(&Self) -> Result<T>>(&self, f: F) -> Result<T> {
        self.channel.send_mainloop_lock()?;
        let result = f(self);
        self.channel.send_mainloop_unlock()?;
        result
    }

    fn set_corked(&self, corked: bool) -> Result<()> {
        self.with_mainloop_lock(|ps| {
            let is_corked = ps.stream().is_corked().map_err(PulseError::StreamState)?;
            if is_corked != corked {
                if corked {
                    ps.stream().cork(None);
                } else {
                    ps.stream().uncork(None);
                }
            }
            Ok(())
        })
    }

    fn write_bytes(&self, data: &[u8]) -> Result<()> {
        self.with_mainloop_lock(|ps| {
            ps.stream().write_copy(data, 0, SeekMode::Relative)
                .map_err(PulseError::StreamWrite)
        })?;
        self.avail.decrement(data.len());
        Ok(())
    }

    /// Moves the next record fragment into `pending`. Returns false when the
    /// server has no data ready.
    fn fetch_fragment(&mut self) -> Result<bool> {
        let fragment = self.with_mainloop_lock(|ps| {
            let mut stream = ps.stream();
            let fragment = match stream.peek().map_err(PulseError::StreamRead)? {
                PeekResult::Empty => return Ok(None),
                PeekResult::Hole(len) => vec![0; len],
                PeekResult::Data(data) => data.to_vec(),
            };
            stream.discard().map_err(PulseError::StreamRead)?;
            Ok(Some(fragment))
        })?;
        match fragment {
            Some(fragment) => {
                self.avail.decrement(fragment.len());
                self.pending = fragment;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Voice for PulseStream {
    fn settings(&self) -> AudioSettings {
        let format = match self.spec.format {
            pulse::sample::Format::S32le => SampleFormat::S32LE,
            _ => SampleFormat::S16LE,
        };
        AudioSettings::new(self.spec.rate, self.spec.channels, format)
    }

    fn available(&mut self) -> usize {
        self.pending.len() + self.avail.get()
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.avail.get());
        if len == 0 {
            return 0;
        }
        match self.write_bytes(&data[..len]) {
            Ok(()) => len,
            Err(err) => {
                warn!("PulseAudio: stream write failed: {}", err);
                0
            }
        }
    }

    fn read(&mut self, data: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < data.len() {
            if self.pending.is_empty() {
                match self.fetch_fragment() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => {
                        warn!("PulseAudio: stream read failed: {}", err);
                        break;
                    }
                }
            }
            let n = (data.len() - filled).min(self.pending.len());
            data[filled..filled + n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            filled += n;
        }
        filled
    }

    fn set_active(&mut self, active: bool) {
        if let Err(err) = self.set_corked(!active) {
            warn!("PulseAudio: failed to change stream state: {}", err);
        }
    }

    fn set_volume(&mut self, muted: bool, left: u8, right: u8) {
        let index = match self.index {
            Some(index) => index,
            None => {
                warn!("PulseAudio: stream has no index, volume not applied");
                return;
            }
        };
        let volumes = channel_volumes(self.spec.channels, left, right);
        if let Err(err) = self.channel.send_set_volume(index, self.direction, muted, volumes) {
            warn!("PulseAudio: failed to set stream volume: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_volumes_follow_left_and_right() {
        let volumes = channel_volumes(2, 255, 0);
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes.get()[0], Volume::NORMAL);
        assert_eq!(volumes.get()[1], Volume::MUTED);
    }

    #[test]
    fn mono_takes_louder_channel() {
        let volumes = channel_volumes(1, 51, 102);
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes.get()[0], Volume(102 * Volume::NORMAL.0 / 255));
    }
}
