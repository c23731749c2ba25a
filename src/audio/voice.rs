// Copyright 2019 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::time::Instant;

use crate::audio::{AudioSettings, BoxError, StreamDirection};

pub type GenericResult<T> = Result<T, BoxError>;

/// `Voice` is one open playback or capture stream on the host audio system.
///
/// Voices never block. A device asks how many bytes the host can take (or
/// has ready) with [`available`](Voice::available) and then moves at most
/// that many bytes with [`write`](Voice::write) or [`read`](Voice::read).
pub trait Voice: Send {
    /// PCM parameters the voice was opened with.
    fn settings(&self) -> AudioSettings;

    /// Number of bytes that can be written (playback) or read (capture)
    /// without waiting.
    fn available(&mut self) -> usize;

    /// Queues samples for playback, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> usize {
        let _ = data;
        0
    }

    /// Reads captured samples into `data`, returning the number of bytes filled.
    fn read(&mut self, data: &mut [u8]) -> usize {
        let _ = data;
        0
    }

    /// Starts or pauses the voice.
    fn set_active(&mut self, active: bool);

    /// Applies volume, `left` and `right` are in the range 0..=255.
    fn set_volume(&mut self, muted: bool, left: u8, right: u8) {
        let (_, _, _) = (muted, left, right);
    }
}

/// `AudioBackend` opens voices on the host audio system.
pub trait AudioBackend: Send {
    /// Opens a new voice.
    ///
    /// # Arguments
    ///
    /// * `name` - A name for the voice, shown by host mixers.
    /// * `direction` - The direction of the stream, either `Playback` or `Capture`.
    /// * `settings` - Sample rate, channel count and sample format.
    ///
    /// # Errors
    ///
    /// * If the host refuses to create the stream.
    fn open_voice(
        &mut self,
        name: &str,
        direction: StreamDirection,
        settings: AudioSettings,
    ) -> GenericResult<Box<dyn Voice>>;
}

/// Voice that consumes playback data and produces silence at the real time
/// rate implied by its settings.
pub struct NullVoice {
    direction: StreamDirection,
    settings: AudioSettings,
    active_since: Option<Instant>,
    transferred: u64,
}

impl NullVoice {
    pub fn new(direction: StreamDirection, settings: AudioSettings) -> Self {
        NullVoice {
            direction,
            settings,
            active_since: None,
            transferred: 0,
        }
    }

    pub fn direction(&self) -> StreamDirection {
        self.direction
    }
}

impl Voice for NullVoice {
    fn settings(&self) -> AudioSettings {
        self.settings
    }

    fn available(&mut self) -> usize {
        match self.active_since {
            Some(start) => {
                let elapsed = start.elapsed().as_nanos() as u64;
                let due = crate::util::muldiv64(elapsed, self.settings.bytes_per_second(),
                                                crate::util::NANOS_PER_SEC);
                due.saturating_sub(self.transferred) as usize
            }
            None => 0,
        }
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.available());
        self.transferred += n as u64;
        n
    }

    fn read(&mut self, data: &mut [u8]) -> usize {
        let n = data.len().min(self.available());
        data[..n].iter_mut().for_each(|b| *b = 0);
        self.transferred += n as u64;
        n
    }

    fn set_active(&mut self, active: bool) {
        if active && self.active_since.is_none() {
            self.active_since = Some(Instant::now());
            self.transferred = 0;
        } else if !active {
            self.active_since = None;
        }
    }
}

/// Backend which opens a `NullVoice` for every request.
#[derive(Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        NullBackend
    }
}

impl AudioBackend for NullBackend {
    fn open_voice(
        &mut self,
        _name: &str,
        direction: StreamDirection,
        settings: AudioSettings,
    ) -> GenericResult<Box<dyn Voice>> {
        Ok(Box::new(NullVoice::new(direction, settings)))
    }
}
