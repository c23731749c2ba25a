use crate::devices::hda::regs::{SD_CTL_BCIS, SD_CTL_RUN, SD_CTL_STREAM_TAG_MASK, SD_CTL_STREAM_TAG_SHIFT};
use crate::memory::GuestRam;

/// Interrupt on completion flag in a buffer descriptor.
pub const BDL_FLAG_IOC: u32 = 1 << 0;

/// One entry of a buffer descriptor list as laid out in guest memory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BdlEntry {
    pub addr: u64,
    pub len: u32,
    pub flags: u32,
}

impl BdlEntry {
    pub const SIZE: u64 = 16;

    fn load(mem: &GuestRam, addr: u64) -> Self {
        let entry = mem.read_int::<u64>(addr).and_then(|buf| {
            let len = mem.read_int::<u32>(addr + 8)?;
            let flags = mem.read_int::<u32>(addr + 12)?;
            Ok(BdlEntry { addr: buf, len, flags })
        });
        match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("failed to read buffer descriptor: {}", e);
                BdlEntry::default()
            }
        }
    }

    pub fn ioc(&self) -> bool {
        self.flags & BDL_FLAG_IOC != 0
    }
}

/// Register state and DMA cursor of one stream descriptor.
#[derive(Clone, Debug, Default)]
pub struct HdaStream {
    pub ctl: u32,
    pub lpib: u32,
    pub cbl: u32,
    pub lvi: u32,
    pub fmt: u32,
    pub bdlp_lbase: u32,
    pub bdlp_ubase: u32,

    bpl: Option<Vec<BdlEntry>>,
    bsize: u32,
    be: usize,
    bp: u32,
}

impl HdaStream {
    pub fn bdl_base(&self) -> u64 {
        (self.bdlp_lbase as u64) | ((self.bdlp_ubase as u64) << 32)
    }

    pub fn stream_tag(&self) -> u32 {
        (self.ctl & SD_CTL_STREAM_TAG_MASK) >> SD_CTL_STREAM_TAG_SHIFT
    }

    pub fn is_running(&self) -> bool {
        self.ctl & SD_CTL_RUN != 0
    }

    /// Buffer completion status is set and not yet acknowledged.
    pub fn completion_pending(&self) -> bool {
        self.ctl & SD_CTL_BCIS != 0
    }

    pub fn bdl(&self) -> Option<&[BdlEntry]> {
        self.bpl.as_deref()
    }

    /// Index of the current descriptor and the offset into it.
    pub fn cursor(&self) -> (usize, u32) {
        (self.be, self.bp)
    }

    /// Forgets the parsed descriptor list and the DMA cursor.
    pub fn reset_dma(&mut self) {
        self.bpl = None;
        self.bsize = 0;
        self.be = 0;
        self.bp = 0;
    }

    /// Loads LVI + 1 buffer descriptors and rewinds the stream to the start
    /// of the cyclic buffer.
    pub fn parse_bdl(&mut self, mem: &GuestRam) {
        let base = self.bdl_base();
        let count = self.lvi as u64 + 1;
        let entries: Vec<BdlEntry> = (0..count)
            .map(|i| BdlEntry::load(mem, base + i * BdlEntry::SIZE))
            .collect();
        for (i, e) in entries.iter().enumerate() {
            trace!("bdl  entry {}: addr 0x{:x} len {} flags 0x{:x}", i, e.addr, e.len, e.flags);
        }
        self.bpl = Some(entries);
        self.bsize = self.cbl;
        self.lpib = 0;
        self.be = 0;
        self.bp = 0;
    }

    /// Reloads the descriptor list after a restore and positions the cursor
    /// from the saved link position.
    pub fn reload_bdl(&mut self, mem: &GuestRam) {
        let lpib = self.lpib;
        self.parse_bdl(mem);
        self.seek(lpib);
    }

    fn seek(&mut self, lpib: u32) {
        let entries = match self.bpl {
            Some(ref entries) if !entries.is_empty() => entries,
            _ => return,
        };
        let total: u64 = entries.iter().map(|e| e.len as u64).sum();
        if total == 0 {
            return;
        }
        let mut pos = lpib as u64 % total;
        let mut be = 0;
        while pos >= entries[be].len as u64 {
            pos -= entries[be].len as u64;
            be += 1;
        }
        self.lpib = lpib;
        self.be = be;
        self.bp = pos as u32;
    }

    /// Moves bytes between `buf` and guest memory following the descriptor
    /// list. Output streams read guest memory into `buf`, input streams write
    /// `buf` to guest memory. Returns true if a descriptor with IOC set was
    /// completed.
    pub fn transfer(&mut self, mem: &GuestRam, output: bool, buf: &mut [u8]) -> bool {
        let entries = match self.bpl {
            Some(ref entries) => entries,
            None => return false,
        };
        let mut irq = false;
        let mut pos = 0;
        let mut s = entries.len();

        while pos < buf.len() && s > 0 {
            s -= 1;
            let entry = &entries[self.be];
            let left = buf.len() - pos;
            let copy = left
                .min(self.bsize.saturating_sub(self.lpib) as usize)
                .min(entry.len.saturating_sub(self.bp) as usize);
            let addr = entry.addr + self.bp as u64;
            let chunk = &mut buf[pos..pos + copy];

            if output {
                if let Err(e) = mem.read_bytes(addr, chunk) {
                    warn!("stream dma read failed: {}", e);
                    chunk.iter_mut().for_each(|b| *b = 0);
                }
            } else if let Err(e) = mem.write_bytes(addr, chunk) {
                warn!("stream dma write failed: {}", e);
            }

            self.lpib += copy as u32;
            self.bp += copy as u32;
            pos += copy;

            if self.bp >= entry.len {
                if entry.ioc() {
                    irq = true;
                }
                self.bp = 0;
                self.be += 1;
                if self.be == entries.len() {
                    self.be = 0;
                    self.lpib = 0;
                }
            }
        }
        irq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_bdl(mem: &GuestRam, base: u64, entries: &[(u64, u32, u32)]) {
        for (i, &(addr, len, flags)) in entries.iter().enumerate() {
            let e = base + i as u64 * BdlEntry::SIZE;
            mem.write_int(e, addr).unwrap();
            mem.write_int(e + 8, len).unwrap();
            mem.write_int(e + 12, flags).unwrap();
        }
    }

    fn stream(mem: &GuestRam, entries: &[(u64, u32, u32)]) -> HdaStream {
        write_bdl(mem, 0x1000, entries);
        let mut st = HdaStream {
            bdlp_lbase: 0x1000,
            lvi: entries.len() as u32 - 1,
            cbl: entries.iter().map(|e| e.1).sum(),
            ..Default::default()
        };
        st.parse_bdl(mem);
        st
    }

    #[test]
    fn parse_reads_lvi_plus_one() {
        let mem = GuestRam::with_size(0x10000).unwrap();
        let st = stream(&mem, &[(0x2000, 512, 0), (0x3000, 512, BDL_FLAG_IOC)]);
        let bdl = st.bdl().unwrap();
        assert_eq!(bdl.len(), 2);
        assert_eq!(bdl[1], BdlEntry { addr: 0x3000, len: 512, flags: 1 });
        assert_eq!(st.lpib, 0);
        assert_eq!(st.cursor(), (0, 0));
    }

    #[test]
    fn output_transfer_splits_and_wraps() {
        let mem = GuestRam::with_size(0x10000).unwrap();
        mem.write_bytes(0x2000, &[0xaa; 512]).unwrap();
        mem.write_bytes(0x3000, &[0xbb; 512]).unwrap();
        let mut st = stream(&mem, &[(0x2000, 512, 0), (0x3000, 512, BDL_FLAG_IOC)]);

        let mut buf = [0u8; 256];
        assert!(!st.transfer(&mem, true, &mut buf));
        assert!(!st.transfer(&mem, true, &mut buf));
        assert_eq!(st.cursor(), (1, 0));
        assert_eq!(st.lpib, 512);

        let mut buf = [0u8; 512];
        assert!(st.transfer(&mem, true, &mut buf));
        assert!(buf.iter().all(|&b| b == 0xbb));
        assert_eq!(st.lpib, 0);
        assert_eq!(st.cursor(), (0, 0));
    }

    #[test]
    fn transfer_crosses_entries() {
        let mem = GuestRam::with_size(0x10000).unwrap();
        mem.write_bytes(0x2000, &[1; 16]).unwrap();
        mem.write_bytes(0x3000, &[2; 16]).unwrap();
        let mut st = stream(&mem, &[(0x2000, 16, BDL_FLAG_IOC), (0x3000, 16, 0)]);
        let mut buf = [0u8; 24];
        assert!(st.transfer(&mem, true, &mut buf));
        assert_eq!(&buf[..16], &[1; 16]);
        assert_eq!(&buf[16..], &[2; 8]);
        assert_eq!(st.lpib, 24);
        assert_eq!(st.cursor(), (1, 8));
    }

    #[test]
    fn capture_writes_guest_memory() {
        let mem = GuestRam::with_size(0x10000).unwrap();
        let mut st = stream(&mem, &[(0x2000, 8, 0)]);
        let mut buf = [7u8; 4];
        st.transfer(&mem, false, &mut buf);
        let mut out = [0u8; 8];
        mem.read_bytes(0x2000, &mut out).unwrap();
        assert_eq!(out, [7, 7, 7, 7, 0, 0, 0, 0]);
    }

    #[test]
    fn reload_positions_cursor_from_lpib() {
        let mem = GuestRam::with_size(0x10000).unwrap();
        let mut st = stream(&mem, &[(0x2000, 100, 0), (0x3000, 100, 0)]);
        st.lpib = 150;
        st.reload_bdl(&mem);
        assert_eq!(st.lpib, 150);
        assert_eq!(st.cursor(), (1, 50));
    }

    #[test]
    fn transfer_without_bdl_is_noop() {
        let mem = GuestRam::with_size(0x1000).unwrap();
        let mut st = HdaStream::default();
        let mut buf = [0u8; 4];
        assert!(!st.transfer(&mem, true, &mut buf));
        assert_eq!(st.lpib, 0);
    }
}
