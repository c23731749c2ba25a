mod common;

use common::*;
use hda_emu::devices::hda::codec::*;
use hda_emu::devices::hda::regs::*;
use hda_emu::devices::hda::{BdlEntry, CodecConfig, CodecKind, BDL_FLAG_IOC};

const OUT: usize = 4;
const IN: usize = 0;
const TICK: u64 = HDA_TIMER_TICK_NS;
/// Completion status bit in the stream status byte.
const STS_BCIS: u32 = SD_CTL_BCIS >> 24;

fn output_setup(h: &mut Harness) {
    h.link_up();
    h.write32(ICH6_REG_INTCTL, INTCTL_GIE | (1 << OUT));
    assert_eq!(h.immediate(verb(0, 2, AC_VERB_SET_CHANNEL_STREAMID, 0x10)), Some(0));
    assert_eq!(h.immediate(verb(0, 2, AC_VERB_SET_STREAM_FORMAT, 0x11)), Some(0));

    h.mem.write_bytes(0x8000, &[0xaa; 256]).unwrap();
    h.mem.write_bytes(0x9000, &[0x55; 256]).unwrap();
    h.write_bdl(&[(0x8000, 256, BDL_FLAG_IOC), (0x9000, 256, 0)]);
    h.setup_stream(OUT, 512, 1, 0x11);
}

fn status(h: &mut Harness, idx: usize) -> u32 {
    h.read8(stream_offset(idx, ICH6_REG_SD_STS))
}

#[test]
fn stream_start_parses_descriptors() {
    let mut h = Harness::duplex();
    output_setup(&mut h);
    h.run_stream(OUT, 1);

    let st = &h.dev.controller().st[OUT];
    assert_eq!(st.bdl(), Some(&[
        BdlEntry { addr: 0x8000, len: 256, flags: BDL_FLAG_IOC },
        BdlEntry { addr: 0x9000, len: 256, flags: 0 },
    ][..]));
    assert_eq!(st.cursor(), (0, 0));
    assert_eq!(h.lpib(OUT), 0);
    assert!(h.voice("dac").is_active());
}

#[test]
fn completion_stalls_stream_until_acked() {
    let config = codec_config(CodecConfig::new(CodecKind::Duplex).with_timer(false));
    let mut h = Harness::new(&config);
    output_setup(&mut h);
    h.write32(ICH6_REG_DPLBASE, DMA_POS_BASE as u32 | DPLBASE_ENABLE);
    h.run_stream(OUT, 1);

    let voice = h.voice("dac");
    voice.grant(512);
    h.dev.poll();
    assert_eq!(voice.take_played(), vec![0xaa; 256]);
    assert_eq!(h.lpib(OUT), 256);
    assert_eq!(h.mem.read_int::<u32>(DMA_POS_BASE + 8 * OUT as u64).unwrap(), 256);
    assert_eq!(status(&mut h, OUT), SD_STS_FIFO_READY | STS_BCIS);
    assert_eq!(h.read32(ICH6_REG_INTSTS), INTSTS_GIS | (1 << OUT));
    assert!(h.irq.level());

    // nothing moves while completion is pending
    h.dev.poll();
    assert!(voice.take_played().is_empty());
    assert_eq!(h.lpib(OUT), 256);

    h.write8(stream_offset(OUT, ICH6_REG_SD_STS), STS_BCIS);
    assert_eq!(status(&mut h, OUT), SD_STS_FIFO_READY);
    assert!(!h.irq.level());

    h.dev.poll();
    assert_eq!(voice.take_played(), vec![0x55; 256]);
    // end of the last descriptor wraps the link position
    assert_eq!(h.lpib(OUT), 0);
    assert_eq!(h.mem.read_int::<u32>(DMA_POS_BASE + 8 * OUT as u64).unwrap(), 0);
    assert!(!h.irq.level());
}

#[test]
fn timer_paces_output_dma() {
    let mut h = Harness::duplex();
    output_setup(&mut h);
    h.run_stream(OUT, 1);
    assert_eq!(h.dev.next_deadline(), Some(TICK));

    // 48kHz 16 bit stereo moves 192 bytes per millisecond
    h.advance_and_poll(TICK);
    assert_eq!(h.lpib(OUT), 192);
    assert_eq!(h.read32(ICH6_REG_ALIAS_BASE + stream_offset(OUT, ICH6_REG_SD_LPIB)), 192);
    assert_eq!(h.dev.next_deadline(), Some(2 * TICK));
    assert!(!h.irq.level());

    h.advance_and_poll(TICK);
    assert_eq!(h.lpib(OUT), 384);
    assert_eq!(status(&mut h, OUT) & STS_BCIS, STS_BCIS);
    assert!(h.irq.level());

    h.advance_and_poll(TICK);
    assert_eq!(h.lpib(OUT), 384);

    h.stop_stream(OUT, 1);
    assert!(!h.voice("dac").is_active());
    assert_eq!(h.dev.next_deadline(), None);
}

#[test]
fn timer_output_reaches_host_voice() {
    let mut h = Harness::duplex();
    output_setup(&mut h);
    h.run_stream(OUT, 1);

    let voice = h.voice("dac");
    voice.grant(4096);
    h.advance_and_poll(TICK);
    assert_eq!(voice.take_played(), vec![0xaa; 192]);
}

#[test]
fn capture_writes_guest_buffer() {
    let config = codec_config(CodecConfig::new(CodecKind::Micro).with_timer(false));
    let mut h = Harness::new(&config);
    h.link_up();
    h.immediate(verb(0, 4, AC_VERB_SET_CHANNEL_STREAMID, 0x20));

    h.write_bdl(&[(0xa000, 256, BDL_FLAG_IOC)]);
    h.setup_stream(IN, 256, 0, 0x11);

    let voice = h.voice("adc");
    voice.push_capture(&[7; 256]);
    voice.grant(256);
    h.run_stream(IN, 2);
    h.dev.poll();

    let mut data = [0u8; 256];
    h.mem.read_bytes(0xa000, &mut data).unwrap();
    assert!(data.iter().all(|&b| b == 7));
    assert_eq!(h.lpib(IN), 0);
    assert_eq!(status(&mut h, IN) & STS_BCIS, STS_BCIS);
}

#[test]
fn stream_tag_mismatch_moves_nothing() {
    let config = codec_config(CodecConfig::new(CodecKind::Duplex).with_timer(false));
    let mut h = Harness::new(&config);
    output_setup(&mut h);
    // the converter listens on tag 1, the controller runs tag 3
    h.run_stream(OUT, 3);

    let voice = h.voice("dac");
    assert!(!voice.is_active());
    voice.grant(512);
    h.dev.poll();
    assert_eq!(h.lpib(OUT), 0);
}

#[test]
fn stream_reset() {
    let mut h = Harness::duplex();
    output_setup(&mut h);
    h.run_stream(OUT, 1);
    h.advance_and_poll(TICK);
    assert_eq!(h.lpib(OUT), 192);

    h.write32(stream_offset(OUT, ICH6_REG_SD_CTL), SD_CTL_SRST);
    assert_eq!(h.read32(stream_offset(OUT, ICH6_REG_SD_CTL)), (SD_STS_FIFO_READY << 24) | SD_CTL_SRST);
    assert_eq!(h.lpib(OUT), 0);
    assert!(h.dev.controller().st[OUT].bdl().is_none());
    assert!(!h.voice("dac").is_active());

    h.write32(stream_offset(OUT, ICH6_REG_SD_CTL), 0);
    assert_eq!(h.read32(stream_offset(OUT, ICH6_REG_SD_CTL)), SD_STS_FIFO_READY << 24);
}

#[test]
fn format_change_reopens_voice() {
    let mut h = Harness::duplex();
    h.link_up();
    let opened = h.backend.open_count();
    // 44.1kHz 16 bit mono
    h.immediate(verb(0, 2, AC_VERB_SET_STREAM_FORMAT, 0x4010));
    assert_eq!(h.backend.open_count(), opened + 1);
    assert_eq!(h.immediate(verb(0, 2, AC_VERB_GET_STREAM_FORMAT, 0)), Some(0x4010));
}
