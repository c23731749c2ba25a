use crate::audio::{AudioSettings, SampleFormat};
use crate::devices::hda::codec::consts::*;

/// Decodes an HDA stream format word into host voice settings. Fields the
/// host cannot represent keep the value from `current`.
pub fn parse_fmt(format: u32, current: AudioSettings) -> AudioSettings {
    let mut settings = current;
    if format & AC_FMT_TYPE_NON_PCM != 0 {
        return settings;
    }

    let mut freq = if format & AC_FMT_BASE_44K != 0 { 44100 } else { 48000 };
    match (format & AC_FMT_MULT_MASK) >> AC_FMT_MULT_SHIFT {
        1 => freq *= 2,
        2 => freq *= 3,
        3 => freq *= 4,
        _ => {}
    }
    freq /= ((format & AC_FMT_DIV_MASK) >> AC_FMT_DIV_SHIFT) + 1;
    settings.freq = freq;

    match format & AC_FMT_BITS_MASK {
        AC_FMT_BITS_8 => settings.format = SampleFormat::S8,
        AC_FMT_BITS_16 => settings.format = SampleFormat::S16LE,
        AC_FMT_BITS_32 => settings.format = SampleFormat::S32LE,
        _ => {}
    }

    settings.nchannels = ((format & AC_FMT_CHAN_MASK) + 1) as u8;
    settings
}
