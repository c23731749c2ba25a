use crate::devices::hda::controller::HdaController;
use crate::devices::hda::snapshot::SnapshotError;
use crate::devices::hda::{Error, Result};

/// Highest codec address plus one. Address 15 is reserved for broadcast.
pub const HDA_MAX_CODECS: u32 = 15;

/// The controller side of the link as seen by a codec.
pub trait HdaBus {
    /// Returns a response to the verb being processed (`solicited`) or
    /// raises an unsolicited event.
    fn response(&mut self, solicited: bool, response: u32);

    /// Moves audio data to or from the guest buffer of the DMA stream tagged
    /// `stnr`. Returns false if no running stream can take the transfer.
    fn xfer(&mut self, stnr: u32, output: bool, buf: &mut [u8]) -> bool;

    fn now_ns(&self) -> u64;
}

/// A codec attached to the HD Audio link.
pub trait HdaCodecDevice: Send {
    fn name(&self) -> &str;

    /// Link reset, stops all codec streams.
    fn reset(&mut self, now_ns: u64);

    /// Executes one verb addressed to node `nid`. `data` holds the 20 bit
    /// verb and payload. Every command must produce exactly one solicited
    /// response on `bus`.
    fn command(&mut self, nid: u32, data: u32, bus: &mut dyn HdaBus);

    /// The controller started or stopped the DMA engine for stream `stnr`.
    fn stream(&mut self, stnr: u32, running: bool, output: bool, now_ns: u64);

    /// Runs expired timers and exchanges data with the host audio system.
    fn poll(&mut self, bus: &mut dyn HdaBus) {
        let _ = bus;
    }

    /// Earliest time `poll` has timer work to do.
    fn next_deadline(&self) -> Option<u64> {
        None
    }

    fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Checks that `data` can be loaded with `restore_state`, without
    /// changing the codec.
    fn check_state(&self, data: &[u8]) -> std::result::Result<(), SnapshotError> {
        let _ = data;
        Ok(())
    }

    fn restore_state(&mut self, data: &[u8], now_ns: u64) -> std::result::Result<(), SnapshotError> {
        let (_, _) = (data, now_ns);
        Ok(())
    }
}

struct CodecSlot {
    cad: u32,
    device: Box<dyn HdaCodecDevice>,
}

/// Codecs attached to the link, keyed by codec address.
pub struct CodecBus {
    codecs: Vec<CodecSlot>,
    next_cad: u32,
}

impl CodecBus {
    pub fn new() -> Self {
        CodecBus { codecs: Vec::new(), next_cad: 0 }
    }

    /// Attaches a codec at `cad`, or at the next free address when `None`.
    pub fn attach(&mut self, device: Box<dyn HdaCodecDevice>, cad: Option<u32>) -> Result<u32> {
        let cad = cad.unwrap_or(self.next_cad);
        if cad >= HDA_MAX_CODECS {
            return Err(Error::InvalidCodecAddress(cad));
        }
        if self.find(cad).is_some() {
            return Err(Error::CodecAddressInUse(cad));
        }
        info!("attached codec '{}' at address {}", device.name(), cad);
        self.next_cad = cad + 1;
        self.codecs.push(CodecSlot { cad, device });
        Ok(cad)
    }

    pub fn find(&self, cad: u32) -> Option<&dyn HdaCodecDevice> {
        self.codecs.iter()
            .find(|c| c.cad == cad)
            .map(|c| c.device.as_ref())
    }

    pub fn find_mut(&mut self, cad: u32) -> Option<&mut (dyn HdaCodecDevice + 'static)> {
        self.codecs.iter_mut()
            .find(|c| c.cad == cad)
            .map(|c| c.device.as_mut())
    }

    pub fn cads(&self) -> Vec<u32> {
        self.codecs.iter().map(|c| c.cad).collect()
    }

    /// STATESTS bits announcing every attached codec.
    pub fn presence_mask(&self) -> u32 {
        self.codecs.iter().fold(0, |mask, c| mask | (1 << c.cad))
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub fn reset(&mut self, now_ns: u64) {
        for c in self.codecs.iter_mut() {
            c.device.reset(now_ns);
        }
    }

    /// Tells every codec about a stream run state change.
    pub fn notify_stream(&mut self, stnr: u32, running: bool, output: bool, now_ns: u64) {
        for c in self.codecs.iter_mut() {
            c.device.stream(stnr, running, output, now_ns);
        }
    }

    /// Polls every codec with a link into `hda`.
    pub fn poll(&mut self, hda: &mut HdaController) {
        for c in self.codecs.iter_mut() {
            let mut link = CodecLink::new(hda, c.cad);
            c.device.poll(&mut link);
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.codecs.iter()
            .filter_map(|c| c.device.next_deadline())
            .min()
    }
}

impl Default for CodecBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds a codec address to the controller for the duration of one call
/// into a codec.
pub struct CodecLink<'a> {
    hda: &'a mut HdaController,
    cad: u32,
}

impl<'a> CodecLink<'a> {
    pub fn new(hda: &'a mut HdaController, cad: u32) -> Self {
        CodecLink { hda, cad }
    }
}

impl<'a> HdaBus for CodecLink<'a> {
    fn response(&mut self, solicited: bool, response: u32) {
        self.hda.response(self.cad, solicited, response)
    }

    fn xfer(&mut self, stnr: u32, output: bool, buf: &mut [u8]) -> bool {
        self.hda.xfer(stnr, output, buf)
    }

    fn now_ns(&self) -> u64 {
        self.hda.now_ns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl HdaCodecDevice for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }
        fn reset(&mut self, _now_ns: u64) {}
        fn command(&mut self, _nid: u32, _data: u32, bus: &mut dyn HdaBus) {
            bus.response(true, 0);
        }
        fn stream(&mut self, _stnr: u32, _running: bool, _output: bool, _now_ns: u64) {}
    }

    #[test]
    fn auto_address_follows_last() {
        let mut bus = CodecBus::new();
        assert_eq!(bus.attach(Box::new(Dummy), None).unwrap(), 0);
        assert_eq!(bus.attach(Box::new(Dummy), Some(4)).unwrap(), 4);
        assert_eq!(bus.attach(Box::new(Dummy), None).unwrap(), 5);
        assert_eq!(bus.presence_mask(), 0b11_0001);
        assert_eq!(bus.cads(), vec![0, 4, 5]);
    }

    #[test]
    fn address_limits() {
        let mut bus = CodecBus::new();
        assert!(matches!(bus.attach(Box::new(Dummy), Some(15)), Err(Error::InvalidCodecAddress(15))));
        bus.attach(Box::new(Dummy), Some(2)).unwrap();
        assert!(matches!(bus.attach(Box::new(Dummy), Some(2)), Err(Error::CodecAddressInUse(2))));
        bus.attach(Box::new(Dummy), Some(14)).unwrap();
        assert!(matches!(bus.attach(Box::new(Dummy), None), Err(Error::InvalidCodecAddress(15))));
    }
}
