use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::devices::hda::codec_bus::HDA_MAX_CODECS;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown controller model '{0}'")]
    UnknownModel(String),
    #[error("unknown codec type '{0}'")]
    UnknownCodec(String),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("invalid value '{1}' for option '{0}'")]
    InvalidValue(String, String),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// PCI personality of the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControllerModel {
    /// ICH6 integrated HD Audio, the classic `intel-hda` device.
    Ich6,
    /// ICH9 integrated HD Audio found on Q35 machines.
    Ich9,
}

impl ControllerModel {
    pub fn device_id(self) -> u16 {
        match self {
            ControllerModel::Ich6 => 0x2668,
            ControllerModel::Ich9 => 0x293e,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControllerModel::Ich6 => "intel-hda",
            ControllerModel::Ich9 => "ich9-intel-hda",
        }
    }
}

impl FromStr for ControllerModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "intel-hda" | "ich6" | "ich6-intel-hda" => Ok(ControllerModel::Ich6),
            "ich9-intel-hda" | "ich9" => Ok(ControllerModel::Ich9),
            _ => Err(ConfigError::UnknownModel(s.to_string())),
        }
    }
}

impl fmt::Display for ControllerModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Node layout of a codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodecKind {
    /// Line out only.
    Output,
    /// Line out and line in.
    Duplex,
    /// Speaker out and microphone in.
    Micro,
}

impl CodecKind {
    pub fn name(self) -> &'static str {
        match self {
            CodecKind::Output => "hda-output",
            CodecKind::Duplex => "hda-duplex",
            CodecKind::Micro => "hda-micro",
        }
    }
}

impl FromStr for CodecKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hda-output" | "output" => Ok(CodecKind::Output),
            "hda-duplex" | "duplex" => Ok(CodecKind::Duplex),
            "hda-micro" | "micro" => Ok(CodecKind::Micro),
            _ => Err(ConfigError::UnknownCodec(s.to_string())),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn parse_bool(key: &str, val: &str) -> Result<bool> {
    match val {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string(), val.to_string())),
    }
}

/// Splits `type,key=val,...` into the type and its options.
fn split_options(s: &str) -> (&str, impl Iterator<Item = (&str, &str)>) {
    let mut parts = s.split(',');
    let head = parts.next().unwrap_or("");
    let opts = parts
        .filter(|p| !p.is_empty())
        .map(|p| match p.find('=') {
            Some(idx) => (&p[..idx], &p[idx + 1..]),
            None => (p, "on"),
        });
    (head, opts)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodecConfig {
    pub kind: CodecKind,
    /// Fixed codec address, assigned automatically when `None`.
    pub cad: Option<u32>,
    /// Expose amplifiers and forward volume changes to the host voice.
    pub mixer: bool,
    /// Pace DMA with a virtual timer instead of host audio callbacks.
    pub use_timer: bool,
}

impl CodecConfig {
    pub fn new(kind: CodecKind) -> Self {
        CodecConfig { kind, cad: None, mixer: true, use_timer: true }
    }

    pub fn with_cad(mut self, cad: u32) -> Self {
        self.cad = Some(cad);
        self
    }

    pub fn with_mixer(mut self, mixer: bool) -> Self {
        self.mixer = mixer;
        self
    }

    pub fn with_timer(mut self, use_timer: bool) -> Self {
        self.use_timer = use_timer;
        self
    }
}

impl FromStr for CodecConfig {
    type Err = ConfigError;

    /// Parses `hda-duplex,cad=1,mixer=off,use-timer=on`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, opts) = split_options(s);
        let mut config = CodecConfig::new(kind.parse()?);
        for (key, val) in opts {
            match key {
                "cad" => {
                    let cad = val.parse::<u32>()
                        .ok()
                        .filter(|&cad| cad < HDA_MAX_CODECS)
                        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), val.to_string()))?;
                    config.cad = Some(cad);
                }
                "mixer" => config.mixer = parse_bool(key, val)?,
                "use-timer" | "use_timer" => config.use_timer = parse_bool(key, val)?,
                _ => return Err(ConfigError::UnknownOption(key.to_string())),
            }
        }
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HdaConfig {
    pub model: ControllerModel,
    /// Offer an MSI capability in config space.
    pub msi: bool,
    pub codecs: Vec<CodecConfig>,
}

impl HdaConfig {
    pub fn new(model: ControllerModel) -> Self {
        HdaConfig { model, msi: false, codecs: Vec::new() }
    }

    pub fn with_msi(mut self, msi: bool) -> Self {
        self.msi = msi;
        self
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codecs.push(codec);
        self
    }
}

impl Default for HdaConfig {
    fn default() -> Self {
        HdaConfig::new(ControllerModel::Ich6)
            .with_codec(CodecConfig::new(CodecKind::Duplex))
    }
}

impl FromStr for HdaConfig {
    type Err = ConfigError;

    /// Parses `ich9-intel-hda,msi=on`. Codecs are added separately.
    fn from_str(s: &str) -> Result<Self> {
        let (model, opts) = split_options(s);
        let mut config = HdaConfig::new(model.parse()?);
        for (key, val) in opts {
            match key {
                "msi" => config.msi = parse_bool(key, val)?,
                _ => return Err(ConfigError::UnknownOption(key.to_string())),
            }
        }
        Ok(config)
    }
}
