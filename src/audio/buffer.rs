use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{AudioBackend, AudioSettings, GenericResult, StreamDirection, Voice};

#[derive(Default)]
struct VoiceState {
    name: String,
    direction: Option<StreamDirection>,
    settings: AudioSettings,
    active: bool,
    volume: Option<(bool, u8, u8)>,
    budget: usize,
    played: Vec<u8>,
    capture: VecDeque<u8>,
}

/// Handle to a voice opened by `BufferBackend`. The device side writes and
/// reads through the `Voice` impl, the owner of the backend inspects and
/// feeds the same state through the handle.
#[derive(Clone, Default)]
pub struct BufferVoice {
    state: Arc<Mutex<VoiceState>>,
}

impl BufferVoice {
    fn state(&self) -> MutexGuard<VoiceState> {
        self.state.lock().unwrap()
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    pub fn direction(&self) -> Option<StreamDirection> {
        self.state().direction
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    pub fn volume(&self) -> Option<(bool, u8, u8)> {
        self.state().volume
    }

    /// Allows the device to move `bytes` more bytes through the voice.
    pub fn grant(&self, bytes: usize) {
        self.state().budget += bytes;
    }

    /// Samples written for playback so far.
    pub fn take_played(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().played)
    }

    /// Queues samples to be returned by capture reads.
    pub fn push_capture(&self, data: &[u8]) {
        self.state().capture.extend(data.iter().copied());
    }
}

impl Voice for BufferVoice {
    fn settings(&self) -> AudioSettings {
        self.state().settings
    }

    fn available(&mut self) -> usize {
        let state = self.state();
        if !state.active {
            return 0;
        }
        match state.direction {
            Some(StreamDirection::Capture) => state.budget.min(state.capture.len()),
            _ => state.budget,
        }
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let mut state = self.state();
        let n = data.len().min(state.budget);
        state.played.extend_from_slice(&data[..n]);
        state.budget -= n;
        n
    }

    fn read(&mut self, data: &mut [u8]) -> usize {
        let mut state = self.state();
        let n = data.len().min(state.budget).min(state.capture.len());
        for (dst, src) in data.iter_mut().zip(state.capture.drain(..n)) {
            *dst = src;
        }
        state.budget -= n;
        n
    }

    fn set_active(&mut self, active: bool) {
        self.state().active = active;
    }

    fn set_volume(&mut self, muted: bool, left: u8, right: u8) {
        self.state().volume = Some((muted, left, right));
    }
}

/// Backend keeping audio in memory, used for capturing device output to a
/// buffer and for feeding prepared input.
#[derive(Clone, Default)]
pub struct BufferBackend {
    voices: Arc<Mutex<Vec<BufferVoice>>>,
}

impl BufferBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently opened voice called `name`.
    pub fn voice(&self, name: &str) -> Option<BufferVoice> {
        self.voices.lock().unwrap()
            .iter()
            .rev()
            .find(|v| v.name() == name)
            .cloned()
    }

    pub fn open_count(&self) -> usize {
        self.voices.lock().unwrap().len()
    }
}

impl AudioBackend for BufferBackend {
    fn open_voice(
        &mut self,
        name: &str,
        direction: StreamDirection,
        settings: AudioSettings,
    ) -> GenericResult<Box<dyn Voice>> {
        let voice = BufferVoice::default();
        {
            let mut state = voice.state();
            state.name = name.to_string();
            state.direction = Some(direction);
            state.settings = settings;
        }
        self.voices.lock().unwrap().push(voice.clone());
        Ok(Box::new(voice))
    }
}
