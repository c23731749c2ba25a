// Verbs
pub const AC_VERB_GET_STREAM_FORMAT: u32 = 0x0a00;
pub const AC_VERB_GET_AMP_GAIN_MUTE: u32 = 0x0b00;
pub const AC_VERB_GET_CONNECT_LIST: u32 = 0x0f02;
pub const AC_VERB_GET_CONV: u32 = 0x0f06;
pub const AC_VERB_GET_PIN_WIDGET_CONTROL: u32 = 0x0f07;
pub const AC_VERB_GET_CONFIG_DEFAULT: u32 = 0x0f1c;
pub const AC_VERB_GET_SUBSYSTEM_ID: u32 = 0x0f20;
pub const AC_VERB_PARAMETERS: u32 = 0x0f00;
pub const AC_VERB_GET_POWER_STATE: u32 = 0x0f05;
pub const AC_VERB_GET_SDI_SELECT: u32 = 0x0f04;

pub const AC_VERB_SET_STREAM_FORMAT: u32 = 0x200;
pub const AC_VERB_SET_AMP_GAIN_MUTE: u32 = 0x300;
pub const AC_VERB_SET_POWER_STATE: u32 = 0x705;
pub const AC_VERB_SET_CHANNEL_STREAMID: u32 = 0x706;
pub const AC_VERB_SET_PIN_WIDGET_CONTROL: u32 = 0x707;

// Parameter ids
pub const AC_PAR_VENDOR_ID: u32 = 0x00;
pub const AC_PAR_SUBSYSTEM_ID: u32 = 0x01;
pub const AC_PAR_REV_ID: u32 = 0x02;
pub const AC_PAR_NODE_COUNT: u32 = 0x04;
pub const AC_PAR_FUNCTION_TYPE: u32 = 0x05;
pub const AC_PAR_AUDIO_FG_CAP: u32 = 0x08;
pub const AC_PAR_AUDIO_WIDGET_CAP: u32 = 0x09;
pub const AC_PAR_PCM: u32 = 0x0a;
pub const AC_PAR_STREAM: u32 = 0x0b;
pub const AC_PAR_PIN_CAP: u32 = 0x0c;
pub const AC_PAR_AMP_IN_CAP: u32 = 0x0d;
pub const AC_PAR_CONNLIST_LEN: u32 = 0x0e;
pub const AC_PAR_POWER_STATE: u32 = 0x0f;
pub const AC_PAR_GPIO_CAP: u32 = 0x11;
pub const AC_PAR_AMP_OUT_CAP: u32 = 0x12;

pub const AC_GRP_AUDIO_FUNCTION: u32 = 0x01;

// Widget capabilities
pub const AC_WCAP_STEREO: u32 = 1 << 0;
pub const AC_WCAP_IN_AMP: u32 = 1 << 1;
pub const AC_WCAP_OUT_AMP: u32 = 1 << 2;
pub const AC_WCAP_AMP_OVRD: u32 = 1 << 3;
pub const AC_WCAP_FORMAT_OVRD: u32 = 1 << 4;
pub const AC_WCAP_CONN_LIST: u32 = 1 << 8;
pub const AC_WCAP_TYPE_SHIFT: u32 = 20;

pub const AC_WID_AUD_OUT: u32 = 0x0;
pub const AC_WID_AUD_IN: u32 = 0x1;
pub const AC_WID_PIN: u32 = 0x4;

pub const AC_SUPFMT_PCM: u32 = 1 << 0;

pub const AC_PINCAP_OUT: u32 = 1 << 4;
pub const AC_PINCAP_IN: u32 = 1 << 5;

pub const AC_PINCTL_OUT_EN: u32 = 1 << 6;
pub const AC_PINCTL_IN_EN: u32 = 1 << 5;

// Amplifier capabilities and the gain/mute verb payload
pub const AC_AMPCAP_OFFSET_SHIFT: u32 = 0;
pub const AC_AMPCAP_NUM_STEPS_SHIFT: u32 = 8;
pub const AC_AMPCAP_STEP_SIZE_SHIFT: u32 = 16;
pub const AC_AMPCAP_MUTE: u32 = 1 << 31;

pub const AC_AMP_GET_LEFT: u32 = 1 << 13;
pub const AC_AMP_SET_LEFT: u32 = 1 << 13;
pub const AC_AMP_SET_RIGHT: u32 = 1 << 12;
pub const AC_AMP_GAIN: u32 = 0x7f;
pub const AC_AMP_MUTE: u32 = 0x80;

// Pin configuration default
pub const AC_DEFCFG_PORT_CONN_SHIFT: u32 = 30;
pub const AC_DEFCFG_DEVICE_SHIFT: u32 = 20;
pub const AC_DEFCFG_CONN_TYPE_SHIFT: u32 = 16;
pub const AC_DEFCFG_COLOR_SHIFT: u32 = 12;

pub const AC_JACK_PORT_COMPLEX: u32 = 0x0;
pub const AC_JACK_LINE_OUT: u32 = 0x0;
pub const AC_JACK_SPEAKER: u32 = 0x1;
pub const AC_JACK_LINE_IN: u32 = 0x8;
pub const AC_JACK_MIC_IN: u32 = 0xa;
pub const AC_JACK_CONN_UNKNOWN: u32 = 0x0;
pub const AC_JACK_COLOR_RED: u32 = 0x5;
pub const AC_JACK_COLOR_GREEN: u32 = 0x4;

// Stream format word
pub const AC_FMT_TYPE_NON_PCM: u32 = 1 << 15;
pub const AC_FMT_BASE_44K: u32 = 1 << 14;
pub const AC_FMT_MULT_SHIFT: u32 = 11;
pub const AC_FMT_MULT_MASK: u32 = 7 << AC_FMT_MULT_SHIFT;
pub const AC_FMT_DIV_SHIFT: u32 = 8;
pub const AC_FMT_DIV_MASK: u32 = 7 << AC_FMT_DIV_SHIFT;
pub const AC_FMT_BITS_SHIFT: u32 = 4;
pub const AC_FMT_BITS_MASK: u32 = 7 << AC_FMT_BITS_SHIFT;
pub const AC_FMT_BITS_8: u32 = 0 << AC_FMT_BITS_SHIFT;
pub const AC_FMT_BITS_16: u32 = 1 << AC_FMT_BITS_SHIFT;
pub const AC_FMT_BITS_32: u32 = 4 << AC_FMT_BITS_SHIFT;
pub const AC_FMT_CHAN_MASK: u32 = 0x0f;

// Codec identity
pub const QEMU_HDA_ID_VENDOR: u32 = 0x1af4;
pub const QEMU_HDA_ID_OUTPUT: u32 = (QEMU_HDA_ID_VENDOR << 16) | 0x12;
pub const QEMU_HDA_ID_DUPLEX: u32 = (QEMU_HDA_ID_VENDOR << 16) | 0x22;
pub const QEMU_HDA_ID_MICRO: u32 = (QEMU_HDA_ID_VENDOR << 16) | 0x32;
pub const QEMU_HDA_REV_ID: u32 = 0x0010_0101;

/// 16, 20, 24 and 32 bit samples at 32kHz to 96kHz.
pub const QEMU_HDA_PCM_FORMATS: u32 = (1 << 17) | 0x1fc;
pub const QEMU_HDA_AMP_NONE: u32 = 0;
pub const QEMU_HDA_AMP_STEPS: u32 = 0x4a;
pub const QEMU_HDA_AMP_CAPS: u32 = AC_AMPCAP_MUTE
    | (QEMU_HDA_AMP_STEPS << AC_AMPCAP_OFFSET_SHIFT)
    | (QEMU_HDA_AMP_STEPS << AC_AMPCAP_NUM_STEPS_SHIFT)
    | (3 << AC_AMPCAP_STEP_SIZE_SHIFT);
