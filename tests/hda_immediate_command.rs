mod common;

use common::*;
use hda_emu::devices::hda::codec::*;
use hda_emu::devices::hda::regs::*;
use hda_emu::devices::hda::{CodecConfig, CodecKind};

#[test]
fn immediate_command_returns_vendor_id() {
    let mut h = Harness::duplex();
    h.link_up();

    h.write32(ICH6_REG_IC, verb(0, 0, AC_VERB_PARAMETERS, AC_PAR_VENDOR_ID));
    h.write16(ICH6_REG_IRS, IRS_BUSY);

    assert_eq!(h.read16(ICH6_REG_IRS), IRS_VALID);
    assert_eq!(h.read32(ICH6_REG_IR), QEMU_HDA_ID_DUPLEX);
    assert_eq!(h.read16(ICH6_REG_CORBRP), 0);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 0);

    // valid is write one to clear
    h.write16(ICH6_REG_IRS, IRS_VALID);
    assert_eq!(h.read16(ICH6_REG_IRS), 0);
}

#[test]
fn immediate_status_carries_codec_address() {
    let mut h = Harness::new(&codec_config(CodecConfig::new(CodecKind::Micro).with_cad(2)));
    h.link_up();

    h.write32(ICH6_REG_IC, verb(2, 0, AC_VERB_GET_SUBSYSTEM_ID, 0));
    h.write16(ICH6_REG_IRS, IRS_BUSY);
    assert_eq!(h.read16(ICH6_REG_IRS), IRS_VALID | (2 << 4));
    assert_eq!(h.read32(ICH6_REG_IR), QEMU_HDA_ID_MICRO);
}

#[test]
fn missing_codec_leaves_command_busy() {
    let mut h = Harness::duplex();
    h.link_up();
    h.write32(ICH6_REG_IR, 0x1234);

    h.write32(ICH6_REG_IC, verb(3, 0, AC_VERB_PARAMETERS, AC_PAR_VENDOR_ID));
    h.write16(ICH6_REG_IRS, IRS_BUSY);
    assert_eq!(h.read16(ICH6_REG_IRS), IRS_BUSY);
    assert_eq!(h.read32(ICH6_REG_IR), 0);
}

#[test]
fn immediate_command_bypasses_rings() {
    let mut h = Harness::duplex();
    h.link_up();
    h.start_rings(0xff);
    h.queue_verb(1, verb(0, 0, AC_VERB_PARAMETERS, AC_PAR_REV_ID));

    assert_eq!(h.immediate(verb(0, 1, AC_VERB_PARAMETERS, AC_PAR_NODE_COUNT)), Some(0x0002_0004));
    assert_eq!(h.read16(ICH6_REG_CORBRP), 0);
    assert_eq!(h.read16(ICH6_REG_RIRBWP), 0);
}

#[test]
fn indirect_node_addressing_is_ignored() {
    let mut h = Harness::duplex();
    h.link_up();
    let indirect = verb(0, 0, AC_VERB_PARAMETERS, AC_PAR_VENDOR_ID) | (1 << 27);
    assert_eq!(h.immediate(indirect), None);
}

#[test]
fn enumerate_micro_codec() {
    let mut h = Harness::new(&codec_config(CodecConfig::new(CodecKind::Micro)));
    h.link_up();

    assert_eq!(h.immediate(verb(0, 0, AC_VERB_PARAMETERS, AC_PAR_REV_ID)), Some(QEMU_HDA_REV_ID));
    assert_eq!(h.immediate(verb(0, 1, AC_VERB_PARAMETERS, AC_PAR_FUNCTION_TYPE)),
               Some(AC_GRP_AUDIO_FUNCTION));

    let out = h.immediate(verb(0, 3, AC_VERB_GET_CONFIG_DEFAULT, 0)).unwrap();
    assert_eq!((out >> AC_DEFCFG_DEVICE_SHIFT) & 0xf, AC_JACK_SPEAKER);
    let mic = h.immediate(verb(0, 5, AC_VERB_GET_CONFIG_DEFAULT, 0)).unwrap();
    assert_eq!((mic >> AC_DEFCFG_DEVICE_SHIFT) & 0xf, AC_JACK_MIC_IN);

    // adc takes its input from the mic pin
    assert_eq!(h.immediate(verb(0, 4, AC_VERB_GET_CONNECT_LIST, 0)), Some(5));
}

#[test]
fn unknown_node_still_answers() {
    let mut h = Harness::new(&codec_config(CodecConfig::new(CodecKind::Output)));
    h.link_up();
    // the output codec has no adc
    assert_eq!(h.immediate(verb(0, 4, AC_VERB_PARAMETERS, AC_PAR_AUDIO_WIDGET_CAP)), Some(0));
    assert_eq!(h.immediate(verb(0, 2, 0x7ff, 0)), Some(0));
}

#[test]
fn amplifier_reaches_host_voice() {
    let mut h = Harness::duplex();
    h.link_up();

    let payload = (1 << 15) | AC_AMP_SET_LEFT | AC_AMP_SET_RIGHT | 0x20;
    assert_eq!(h.immediate(verb(0, 2, AC_VERB_SET_AMP_GAIN_MUTE, payload)), Some(0));
    assert_eq!(h.voice("dac").volume(), Some((false, 110, 110)));

    let left = h.immediate(verb(0, 2, AC_VERB_GET_AMP_GAIN_MUTE, AC_AMP_GET_LEFT)).unwrap();
    assert_eq!(left, 0x20);

    let mute = (1 << 15) | AC_AMP_SET_LEFT | AC_AMP_SET_RIGHT | AC_AMP_MUTE;
    h.immediate(verb(0, 2, AC_VERB_SET_AMP_GAIN_MUTE, mute));
    assert_eq!(h.voice("dac").volume(), Some((true, 0, 0)));
}

#[test]
fn format_change_keeps_volume() {
    let mut h = Harness::duplex();
    h.link_up();

    let mute = (1 << 15) | AC_AMP_SET_LEFT | AC_AMP_SET_RIGHT | AC_AMP_MUTE;
    h.immediate(verb(0, 2, AC_VERB_SET_AMP_GAIN_MUTE, mute));
    let opened = h.backend.open_count();
    assert_eq!(h.immediate(verb(0, 2, AC_VERB_SET_STREAM_FORMAT, 0x4010)), Some(0));

    // a fresh host voice, still muted
    assert_eq!(h.backend.open_count(), opened + 1);
    assert_eq!(h.voice("dac").volume(), Some((true, 0, 0)));
    let left = h.immediate(verb(0, 2, AC_VERB_GET_AMP_GAIN_MUTE, AC_AMP_GET_LEFT)).unwrap();
    assert_eq!(left, AC_AMP_MUTE);
}

#[test]
fn mixer_off_keeps_host_volume() {
    let mut h = Harness::new(&codec_config(CodecConfig::new(CodecKind::Duplex).with_mixer(false)));
    h.link_up();

    assert_eq!(h.immediate(verb(0, 2, AC_VERB_PARAMETERS, AC_PAR_AMP_OUT_CAP)), Some(QEMU_HDA_AMP_NONE));
    let payload = (1 << 15) | AC_AMP_SET_LEFT | AC_AMP_SET_RIGHT | 0x10;
    h.immediate(verb(0, 2, AC_VERB_SET_AMP_GAIN_MUTE, payload));
    assert_eq!(h.voice("dac").volume(), None);
}
