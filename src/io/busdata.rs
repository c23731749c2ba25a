use std::convert::TryInto;
use std::fmt::{Debug, Formatter};

/// A value written by the guest, decoded according to the access width.
pub enum WriteableInt {
    Byte(u8),
    Word(u16),
    DWord(u32),
    QWord(u64),
    Data(Vec<u8>),
}

impl WriteableInt {
    /// The access width in bytes.
    pub fn size(&self) -> usize {
        match self {
            WriteableInt::Byte(_) => 1,
            WriteableInt::Word(_) => 2,
            WriteableInt::DWord(_) => 4,
            WriteableInt::QWord(_) => 8,
            WriteableInt::Data(bs) => bs.len(),
        }
    }
}

impl From<&[u8]> for WriteableInt {
    fn from(bytes: &[u8]) -> Self {
        match bytes.len() {
            1 => Self::Byte(bytes[0]),
            2 => Self::Word(u16::from_le_bytes([bytes[0], bytes[1]])),
            4 => Self::DWord(u32::from_le_bytes(bytes.try_into().unwrap_or([0; 4]))),
            8 => Self::QWord(u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8]))),
            _ => Self::Data(bytes.to_vec()),
        }
    }
}

/// A value returned to the guest, encoded for the access width.
pub enum ReadableInt {
    Byte(u8, [u8; 1]),
    Word(u16, [u8; 2]),
    DWord(u32, [u8; 4]),
}

impl ReadableInt {

    pub fn new_byte(n: u8) -> Self {
        Self::Byte(n, [n])
    }
    pub fn new_word(n: u16) -> Self {
        Self::Word(n, n.to_le_bytes())
    }
    pub fn new_dword(n: u32) -> Self {
        Self::DWord(n, n.to_le_bytes())
    }

    /// Truncates `value` to an access of `size` bytes, or `None` for an
    /// unsupported width.
    pub fn with_size(size: usize, value: u32) -> Option<Self> {
        match size {
            1 => Some(Self::new_byte(value as u8)),
            2 => Some(Self::new_word(value as u16)),
            4 => Some(Self::new_dword(value)),
            _ => None,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            ReadableInt::Byte(_, bs) => bs,
            ReadableInt::Word(_, bs) => bs,
            ReadableInt::DWord(_, bs) => bs,
        }
    }

    pub fn read(&self, buffer: &mut [u8]) {
        let bs = self.as_bytes();
        if buffer.len() >= bs.len() {
            buffer[..bs.len()].copy_from_slice(bs);
        }
    }
}

impl From<u8> for ReadableInt {
    fn from(value: u8) -> Self {
        ReadableInt::new_byte(value)
    }
}

impl From<u16> for ReadableInt {
    fn from(value: u16) -> Self {
        ReadableInt::new_word(value)
    }
}
impl From<u32> for ReadableInt {
    fn from(value: u32) -> Self {
        ReadableInt::new_dword(value)
    }
}

impl Debug for ReadableInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadableInt::Byte(n, _) => write!(f, "Byte(0x{:02x})", n),
            ReadableInt::Word(n, _) => write!(f, "Word(0x{:04x})", n),
            ReadableInt::DWord(n, _) => write!(f, "DWord(0x{:08x})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writeable_decodes_little_endian() {
        match WriteableInt::from(&[0x34, 0x12][..]) {
            WriteableInt::Word(v) => assert_eq!(v, 0x1234),
            _ => panic!("expected word"),
        }
        match WriteableInt::from(&[1, 2, 3][..]) {
            WriteableInt::Data(v) => assert_eq!(v.len(), 3),
            _ => panic!("expected data"),
        }
    }

    #[test]
    fn readable_truncates_to_width() {
        let mut buf = [0xffu8; 4];
        ReadableInt::with_size(2, 0xaabb_ccdd).unwrap().read(&mut buf);
        assert_eq!(buf, [0xdd, 0xcc, 0xff, 0xff]);
        assert!(ReadableInt::with_size(3, 0).is_none());
    }
}
