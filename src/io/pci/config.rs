use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::io::pci::consts::{PCI_BAR0, PCI_BAR5, PCI_CACHE_LINE_SIZE, PCI_CAP_BASE_OFFSET, PCI_CAP_ID_MSI, PCI_CAPABILITY_LIST, PCI_CLASS_DEVICE, PCI_COMMAND, PCI_COMMAND_INTX_DISABLE, PCI_COMMAND_MASTER, PCI_COMMAND_MEMORY, PCI_CONFIG_SPACE_SIZE, PCI_DEVICE_ID, PCI_INTERRUPT_LINE, PCI_INTERRUPT_PIN, PCI_MSI_FLAGS_64BIT, PCI_MSI_FLAGS_ENABLE, PCI_REVISION_ID, PCI_STATUS, PCI_STATUS_CAP_LIST, PCI_SUBSYSTEM_ID, PCI_SUBSYSTEM_VENDOR_ID, PCI_VENDOR_ID};
use crate::io::pci::device::PciBar;

const MAX_CAPABILITY_COUNT:usize  = 16; // arbitrary

/// Builder for one capability structure appended to the config space chain.
pub struct PciCapability<'a> {
    config: &'a mut PciConfiguration,
    buffer: Vec<u8>,
    write_masks: Vec<u8>,
}

impl <'a> PciCapability<'a> {
    fn new(config: &'a mut PciConfiguration, id: u8) -> Self {
        let buffer = vec![id, 0];
        let write_masks = vec![0, 0];
        PciCapability { config, buffer, write_masks }
    }

    pub fn write_u8(&mut self, val: u8, mask: u8) -> &mut Self {
        self.buffer.push(val);
        self.write_masks.push(mask);
        self
    }

    pub fn write_u16(&mut self, val: u16, mask: u16) -> &mut Self {
        let _ = self.buffer.write_u16::<LittleEndian>(val);
        let _ = self.write_masks.write_u16::<LittleEndian>(mask);
        self
    }

    pub fn write_u32(&mut self, val: u32, mask: u32) -> &mut Self {
        let _ = self.buffer.write_u32::<LittleEndian>(val);
        let _ = self.write_masks.write_u32::<LittleEndian>(mask);
        self
    }

    /// Links the capability into the chain and returns its config space offset.
    pub fn store(&mut self) -> usize {
        let offset = self.config.next_capability_offset;
        self.config.update_capability_chain(self.buffer.len());
        self.config.write_bytes(offset, &self.buffer);
        self.config.write_masks[offset..offset + self.write_masks.len()]
            .copy_from_slice(&self.write_masks);
        offset
    }
}

/// Type 0 configuration space of a single PCI function.
pub struct PciConfiguration {
    irq: u8,
    bytes: [u8; PCI_CONFIG_SPACE_SIZE],
    write_masks: [u8; PCI_CONFIG_SPACE_SIZE],
    next_capability_offset: usize,
    msi_offset: Option<usize>,
}

impl PciConfiguration {
    pub fn new(irq: u8, vendor: u16, device: u16, class_id: u16) -> Self {
        let mut config = PciConfiguration {
            irq,
            bytes: [0; PCI_CONFIG_SPACE_SIZE],
            write_masks: [0; PCI_CONFIG_SPACE_SIZE],
            next_capability_offset: PCI_CAP_BASE_OFFSET,
            msi_offset: None,
        };

        config.write_u16(PCI_VENDOR_ID, vendor);
        config.write_u16(PCI_DEVICE_ID, device);
        config.write_u16(PCI_CLASS_DEVICE, class_id);
        config.bytes[PCI_INTERRUPT_PIN] = 1;
        config.bytes[PCI_INTERRUPT_LINE] = irq;

        let command_mask = PCI_COMMAND_MEMORY | PCI_COMMAND_MASTER | PCI_COMMAND_INTX_DISABLE;
        LittleEndian::write_u16(&mut config.write_masks[PCI_COMMAND..], command_mask);
        config.write_masks[PCI_CACHE_LINE_SIZE] = 0xff;
        config.write_masks[PCI_INTERRUPT_LINE] = 0xff;
        config
    }

    pub fn irq(&self) -> u8 {
        self.irq
    }

    pub fn set_revision(&mut self, revision: u8) {
        self.bytes[PCI_REVISION_ID] = revision;
    }

    pub fn set_subsystem(&mut self, vendor: u16, device: u16) {
        self.write_u16(PCI_SUBSYSTEM_VENDOR_ID, vendor);
        self.write_u16(PCI_SUBSYSTEM_ID, device);
    }

    /// Stores a device specific byte which the guest may modify through `mask`.
    pub fn set_byte(&mut self, offset: usize, value: u8, mask: u8) {
        self.bytes[offset] = value;
        self.write_masks[offset] = mask;
    }

    pub fn byte(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn command(&self) -> u16 {
        LittleEndian::read_u16(&self.bytes[PCI_COMMAND..])
    }

    fn write_u16(&mut self, offset: usize, val: u16) {
        LittleEndian::write_u16(&mut self.bytes[offset..], val);
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        (&mut self.bytes[offset..offset+bytes.len()])
            .copy_from_slice(bytes)
    }

    fn read_bytes(&self, offset: usize, bytes: &mut [u8]) {
        bytes.copy_from_slice(&self.bytes[offset..offset+bytes.len()]);
    }

    fn write_masked(&mut self, offset: usize, data: &[u8]) {
        for (idx, b) in data.iter().enumerate() {
            let mask = self.write_masks[offset + idx];
            let orig = self.bytes[offset + idx];
            self.bytes[offset + idx] = (orig & !mask) | (b & mask);
        }
    }

    fn is_valid_access(offset: u64, size: usize) -> bool {
        fn check_aligned_range(offset: u64, size: usize) -> bool {
            let offset = offset as usize;
            offset + size <= PCI_CONFIG_SPACE_SIZE && offset % size == 0
        }

        match size {
            4 => check_aligned_range(offset, 4),
            2 => check_aligned_range(offset, 2),
            1 => check_aligned_range(offset, 1),
            _ => false,
        }

    }

    fn next_capability(&self, offset: usize) -> Option<usize> {
        fn is_valid_cap_offset(offset: usize) -> bool {
            offset < 254 && offset >= PCI_CAP_BASE_OFFSET
        }

        if is_valid_cap_offset(offset) {
            Some(self.bytes[offset + 1] as usize)
        } else {
            None
        }
    }

    fn update_next_capability_offset(&mut self, caplen: usize) {
        let aligned = (caplen + 3) & !3;
        self.next_capability_offset += aligned;
        assert!(self.next_capability_offset < PCI_CONFIG_SPACE_SIZE);
    }

    fn update_capability_chain(&mut self, caplen: usize)  {

        let next_offset = self.next_capability_offset as u8;
        self.update_next_capability_offset(caplen);

        let mut cap_ptr = self.bytes[PCI_CAPABILITY_LIST] as usize;

        if cap_ptr == 0 {
            self.bytes[PCI_CAPABILITY_LIST] = next_offset;
            self.bytes[PCI_STATUS] |= PCI_STATUS_CAP_LIST as u8;
            return;
        }

        for _ in 0..MAX_CAPABILITY_COUNT {
            match self.next_capability(cap_ptr) {
                Some(0) => {
                    self.bytes[cap_ptr + 1] = next_offset;
                    return;
                }
                Some(next) => cap_ptr = next,
                None => return,
            }
        }
    }

    pub fn new_capability(&mut self, id: u8) -> PciCapability {
        PciCapability::new(self, id)
    }

    /// Adds a single vector 64-bit MSI capability.
    pub fn add_msi_capability(&mut self) {
        let offset = self.new_capability(PCI_CAP_ID_MSI)
            .write_u16(PCI_MSI_FLAGS_64BIT, PCI_MSI_FLAGS_ENABLE)
            .write_u32(0, 0xffff_fffc)
            .write_u32(0, 0xffff_ffff)
            .write_u16(0, 0xffff)
            .store();
        self.msi_offset = Some(offset);
    }

    /// Returns true if the guest has turned on MSI delivery.
    pub fn msi_enabled(&self) -> bool {
        match self.msi_offset {
            Some(offset) => {
                LittleEndian::read_u16(&self.bytes[offset + 2..]) & PCI_MSI_FLAGS_ENABLE != 0
            }
            None => false,
        }
    }

    pub fn set_mmio_bar(&mut self, bar: PciBar, base: u64, size: usize) {
        assert!(size.is_power_of_two() && base % size as u64 == 0, "cannot set_mmio_bar() because mmio range is not naturally aligned");
        let offset = PCI_BAR0 + (bar.idx() * 4);
        assert!(offset <= PCI_BAR5);
        let mask = !((size as u32) - 1);
        LittleEndian::write_u32(&mut self.write_masks[offset..], mask);
        LittleEndian::write_u32(&mut self.bytes[offset..], base as u32);
    }

    pub fn read(&self, offset: u64, data: &mut [u8]) {
        if Self::is_valid_access(offset, data.len()) {
            self.read_bytes(offset as usize, data)
        } else {
            data.fill(0xff)
        }
    }

    pub fn write(&mut self, offset: u64, data: &[u8]) {
        if Self::is_valid_access(offset, data.len()) {
            self.write_masked(offset as usize, data);
        }
    }
}
