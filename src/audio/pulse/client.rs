use std::sync::mpsc;
use std::thread;
use pulse::sample::{Format, Spec};
use crate::audio::pulse::context::PulseContext;
use crate::audio::pulse::message::PulseMessageChannel;
use crate::audio::pulse::Result;
use crate::audio::{AudioBackend, AudioSettings, GenericResult, NullVoice, SampleFormat, StreamDirection, Voice};

/// Host audio backend playing and recording through a PulseAudio server.
pub struct PulseClient {
    channel: PulseMessageChannel,
}

impl PulseClient {
    pub fn connect() -> Result<Self> {
        let (tx,rx) = mpsc::channel();

        let _ = thread::spawn(move || {
            let mut ctx = match PulseContext::new() {
                Ok(ctx) => ctx,
                Err(err) => {
                    warn!("PulseAudio Error: {}", err);
                    return;
                }
            };
            if let Err(err) = ctx.connect() {
                warn!("PulseAudio Error: {}", err);
            } else {
                ctx.run(rx);
            }
        });
        Ok(PulseClient {
            channel: PulseMessageChannel::new(tx),
        })
    }

    fn create_spec(settings: &AudioSettings) -> Option<Spec> {
        let format = match settings.format {
            SampleFormat::S16LE => Format::S16le,
            SampleFormat::S32LE => Format::S32le,
            // pulseaudio has no signed 8 bit format
            SampleFormat::S8 => return None,
        };

        Some(Spec {
            format,
            rate: settings.freq,
            channels: settings.nchannels,
        })
    }
}

impl AudioBackend for PulseClient {
    fn open_voice(&mut self,
                  name: &str,
                  direction: StreamDirection,
                  settings: AudioSettings) -> GenericResult<Box<dyn Voice>> {

        let spec = match PulseClient::create_spec(&settings) {
            Some(spec) if spec.is_valid() => spec,
            _ => {
                warn!("PulseAudio: unsupported voice format {}, using a null voice", settings);
                return Ok(Box::new(NullVoice::new(direction, settings)))
            }
        };
        let stream = self.channel.send_new_stream(name, spec, direction)?;
        Ok(Box::new(stream))
    }
}
