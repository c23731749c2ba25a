mod common;

use common::*;
use hda_emu::devices::hda::codec::*;
use hda_emu::devices::hda::regs::*;
use proptest::prelude::*;

/// Verbs with known answers from the default duplex codec.
const VERBS: [(u32, u32, u32); 4] = [
    (0, AC_PAR_VENDOR_ID, QEMU_HDA_ID_DUPLEX),
    (0, AC_PAR_REV_ID, QEMU_HDA_REV_ID),
    (0, AC_PAR_NODE_COUNT, 0x0001_0001),
    (1, AC_PAR_NODE_COUNT, 0x0002_0004),
];

fn param_verb(i: usize) -> u32 {
    let (nid, param, _) = VERBS[i];
    verb(0, nid, AC_VERB_PARAMETERS, param)
}

#[test]
fn corb_processes_new_entries_in_order() {
    let mut h = Harness::duplex();
    h.link_up();
    h.write32(ICH6_REG_INTCTL, INTCTL_GIE | INTCTL_CIE);
    h.start_rings(0xff);

    h.queue_verb(0, param_verb(1));
    h.queue_verb(1, param_verb(0));
    h.queue_verb(2, param_verb(3));
    h.write16(ICH6_REG_CORBWP, 2);

    assert_eq!(h.read16(ICH6_REG_CORBRP), 2);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 2);
    assert_eq!(h.rirb_entry(1), (QEMU_HDA_ID_DUPLEX, 0));
    assert_eq!(h.rirb_entry(2), (0x0002_0004, 0));
    // slot 0 is never fetched from a fresh ring
    assert_eq!(h.rirb_entry(3), (0, 0));

    // ring ran empty, response interrupt raised
    assert_eq!(h.read8(ICH6_REG_RIRBSTS) & RIRBSTS_IRQ, RIRBSTS_IRQ);
    assert_eq!(h.read32(ICH6_REG_INTSTS), INTSTS_GIS | INTSTS_CIS);
    assert!(h.irq.level());

    h.write8(ICH6_REG_RIRBSTS, RIRBSTS_IRQ);
    assert_eq!(h.read8(ICH6_REG_RIRBSTS), 0);
    assert_eq!(h.dev.controller().rirb_count, 0);
    assert!(!h.irq.level());
}

#[test]
fn response_count_pauses_corb() {
    let mut h = Harness::duplex();
    h.link_up();
    h.start_rings(1);

    for slot in 1..=3 {
        h.queue_verb(slot, param_verb(slot as usize));
    }
    h.write16(ICH6_REG_CORBWP, 3);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 1);
    assert_eq!(h.dev.controller().rirb_count, 1);
    assert_eq!(h.read8(ICH6_REG_RIRBSTS), RIRBSTS_IRQ);

    // each acknowledgement lets one more verb through
    h.write8(ICH6_REG_RIRBSTS, RIRBSTS_IRQ);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 2);
    h.write8(ICH6_REG_RIRBSTS, RIRBSTS_IRQ);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 3);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 3);
    assert_eq!(h.rirb_entry(3).0, VERBS[3].2);
}

#[test]
fn stopped_corb_does_not_fetch() {
    let mut h = Harness::duplex();
    h.link_up();
    h.start_rings(0xff);
    h.write8(ICH6_REG_CORBCTL, 0);

    h.queue_verb(1, param_verb(0));
    h.write16(ICH6_REG_CORBWP, 1);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 0);

    h.write8(ICH6_REG_CORBCTL, CORBCTL_RUN);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 1);
    assert_eq!(h.rirb_entry(1).0, QEMU_HDA_ID_DUPLEX);
}

#[test]
fn ring_pointer_resets() {
    let mut h = Harness::duplex();
    h.link_up();
    h.start_rings(0xff);
    h.queue_verb(1, param_verb(0));
    h.queue_verb(2, param_verb(1));
    h.write16(ICH6_REG_CORBWP, 2);
    h.write8(ICH6_REG_RIRBSTS, RIRBSTS_IRQ);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 2);

    // the read pointer stays in reset until the driver clears the bit
    h.write16(ICH6_REG_CORBRP, CORBRP_RST);
    assert_eq!(h.read16(ICH6_REG_CORBRP), CORBRP_RST);
    h.write16(ICH6_REG_CORBWP, 0);
    h.write16(ICH6_REG_CORBRP, 0);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 0);

    h.write16(ICH6_REG_RIRBWP, RIRBWP_RST);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 0);

    h.queue_verb(1, param_verb(3));
    h.write16(ICH6_REG_CORBWP, 1);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 1);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 1);
    assert_eq!(h.rirb_entry(1).0, VERBS[3].2);
}

#[test]
fn leaving_read_pointer_reset_fetches_queued_verbs() {
    let mut h = Harness::duplex();
    h.link_up();
    h.start_rings(0xff);

    h.write16(ICH6_REG_CORBRP, CORBRP_RST);
    h.queue_verb(1, param_verb(0));
    h.write16(ICH6_REG_CORBWP, 1);
    assert_eq!(h.read16(ICH6_REG_CORBRP), CORBRP_RST);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 0);

    h.write16(ICH6_REG_CORBRP, 0);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 1);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 1);
    assert_eq!(h.rirb_entry(1).0, QEMU_HDA_ID_DUPLEX);
}

#[test]
fn failed_rirb_write_drops_response() {
    use hda_emu::devices::hda::HdaController;
    use hda_emu::memory::GuestRam;
    use hda_emu::util::ManualClock;
    use std::sync::Arc;

    let mem = GuestRam::with_size(RAM_SIZE).unwrap();
    let mut hda = HdaController::new(mem, Arc::new(ManualClock::new(0)));
    // ring outside guest memory
    hda.rirb_lbase = 2 * RAM_SIZE as u32;
    hda.rirb_ctl = RIRBCTL_DMA_EN | RIRBCTL_IRQ_EN | RIRBCTL_OVERRUN_EN;
    hda.rirb_cnt = 0xff;
    hda.response(0, true, 0x1234);
    assert_eq!((hda.rirb_wp, hda.rirb_count, hda.rirb_sts), (0, 0, 0));
}

#[test]
fn unsolicited_responses_are_tagged() {
    use hda_emu::devices::hda::HdaController;
    use hda_emu::memory::GuestRam;
    use hda_emu::util::ManualClock;
    use std::sync::Arc;

    let mem = GuestRam::with_size(RAM_SIZE).unwrap();
    let mut hda = HdaController::new(mem.clone(), Arc::new(ManualClock::new(0)));
    hda.rirb_lbase = RIRB_BASE as u32;
    hda.rirb_ctl = RIRBCTL_DMA_EN;
    hda.rirb_cnt = 0xff;
    hda.response(3, false, 0x8000_0000);
    assert_eq!(mem.read_int::<u32>(RIRB_BASE + 12).unwrap(), (1 << 4) | 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn corb_dispatch_is_fifo_and_exact(
        first in proptest::collection::vec(0usize..4, 0..200),
        second in proptest::collection::vec(0usize..4, 1..200),
    ) {
        let mut h = Harness::duplex();
        h.link_up();
        h.start_rings(0xff);

        let mut rp = 0u32;
        let mut rirb_wp = 0u32;
        for batch in [first, second].iter() {
            for (i, &v) in batch.iter().enumerate() {
                h.queue_verb(rp + 1 + i as u32, param_verb(v));
            }
            let wp = (rp + batch.len() as u32) & 0xff;
            h.write16(ICH6_REG_CORBWP, wp);

            prop_assert_eq!(h.read16(ICH6_REG_CORBRP), wp);
            prop_assert_eq!(h.dev.controller().rirb_count, batch.len() as u32);
            for (i, &v) in batch.iter().enumerate() {
                prop_assert_eq!(h.rirb_entry(rirb_wp + 1 + i as u32).0, VERBS[v].2);
            }
            rirb_wp = (rirb_wp + batch.len() as u32) & 0xff;
            prop_assert_eq!(h.read16(ICH6_REG_RIRBWP), rirb_wp);

            h.write8(ICH6_REG_RIRBSTS, RIRBSTS_IRQ);
            prop_assert_eq!(h.dev.controller().rirb_count, 0);
            rp = wp;
        }
    }
}
