use crate::devices::hda::codec::consts::*;
use crate::devices::hda::config::CodecKind;

/// A widget or group node of a codec and the parameters it answers.
#[derive(Clone, Debug)]
pub struct DescNode {
    pub nid: u32,
    pub name: &'static str,
    params: Vec<(u32, u32)>,
    pub config: u32,
    pub pinctl: u32,
    pub conn: &'static [u32],
    /// Slot of the audio stream driven by a converter widget.
    pub stindex: Option<usize>,
}

impl DescNode {
    fn new(nid: u32, name: &'static str, params: Vec<(u32, u32)>) -> Self {
        DescNode { nid, name, params, config: 0, pinctl: 0, conn: &[], stindex: None }
    }

    fn with_pin(mut self, config: u32, pinctl: u32) -> Self {
        self.config = config;
        self.pinctl = pinctl;
        self
    }

    fn with_conn(mut self, conn: &'static [u32]) -> Self {
        self.conn = conn;
        self
    }

    fn with_stream(mut self, stindex: usize) -> Self {
        self.stindex = Some(stindex);
        self
    }

    pub fn param(&self, id: u32) -> Option<u32> {
        self.params.iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, val)| *val)
    }

    pub fn widget_type(&self) -> Option<u32> {
        self.param(AC_PAR_AUDIO_WIDGET_CAP)
            .map(|caps| caps >> AC_WCAP_TYPE_SHIFT)
    }

    /// Converter node, either a DAC (output) or an ADC (input).
    pub fn is_converter(&self) -> bool {
        match self.widget_type() {
            Some(AC_WID_AUD_OUT) | Some(AC_WID_AUD_IN) => true,
            _ => false,
        }
    }

    pub fn is_output(&self) -> bool {
        self.widget_type() == Some(AC_WID_AUD_OUT)
    }
}

/// Node tree of one codec model.
#[derive(Clone, Debug)]
pub struct CodecDesc {
    pub iid: u32,
    pub nodes: Vec<DescNode>,
}

const fn pin_config(device: u32, color: u32, assoc: u32) -> u32 {
    (AC_JACK_PORT_COMPLEX << AC_DEFCFG_PORT_CONN_SHIFT)
        | (device << AC_DEFCFG_DEVICE_SHIFT)
        | (AC_JACK_CONN_UNKNOWN << AC_DEFCFG_CONN_TYPE_SHIFT)
        | (color << AC_DEFCFG_COLOR_SHIFT)
        | assoc
}

impl CodecDesc {
    pub fn new(kind: CodecKind, mixer: bool) -> Self {
        let amp_caps = if mixer { QEMU_HDA_AMP_CAPS } else { QEMU_HDA_AMP_NONE };
        let iid = match kind {
            CodecKind::Output => QEMU_HDA_ID_OUTPUT,
            CodecKind::Duplex => QEMU_HDA_ID_DUPLEX,
            CodecKind::Micro => QEMU_HDA_ID_MICRO,
        };
        let has_input = kind != CodecKind::Output;

        let mut nodes = vec![
            DescNode::new(0, "root", vec![
                (AC_PAR_VENDOR_ID, iid),
                (AC_PAR_SUBSYSTEM_ID, iid),
                (AC_PAR_REV_ID, QEMU_HDA_REV_ID),
                (AC_PAR_NODE_COUNT, 0x0001_0001),
            ]),
            DescNode::new(1, "func", vec![
                (AC_PAR_SUBSYSTEM_ID, iid),
                (AC_PAR_NODE_COUNT, if has_input { 0x0002_0004 } else { 0x0002_0002 }),
                (AC_PAR_FUNCTION_TYPE, AC_GRP_AUDIO_FUNCTION),
                (AC_PAR_AUDIO_FG_CAP, 0x0000_0808),
                (AC_PAR_PCM, QEMU_HDA_PCM_FORMATS),
                (AC_PAR_STREAM, AC_SUPFMT_PCM),
                (AC_PAR_AMP_IN_CAP, QEMU_HDA_AMP_NONE),
                (AC_PAR_AMP_OUT_CAP, QEMU_HDA_AMP_NONE),
                (AC_PAR_GPIO_CAP, 0),
                (AC_PAR_POWER_STATE, 0),
            ]),
            DescNode::new(2, "dac", vec![
                (AC_PAR_AUDIO_WIDGET_CAP, (AC_WID_AUD_OUT << AC_WCAP_TYPE_SHIFT)
                    | AC_WCAP_FORMAT_OVRD
                    | AC_WCAP_AMP_OVRD
                    | AC_WCAP_OUT_AMP
                    | AC_WCAP_STEREO),
                (AC_PAR_PCM, QEMU_HDA_PCM_FORMATS),
                (AC_PAR_STREAM, AC_SUPFMT_PCM),
                (AC_PAR_AMP_IN_CAP, QEMU_HDA_AMP_NONE),
                (AC_PAR_AMP_OUT_CAP, amp_caps),
            ]).with_stream(0),
        ];

        let out_config = match kind {
            CodecKind::Micro => pin_config(AC_JACK_SPEAKER, AC_JACK_COLOR_GREEN, 0x10),
            _ => pin_config(AC_JACK_LINE_OUT, AC_JACK_COLOR_GREEN, 0x10),
        };
        nodes.push(DescNode::new(3, "out", vec![
            (AC_PAR_AUDIO_WIDGET_CAP, (AC_WID_PIN << AC_WCAP_TYPE_SHIFT)
                | AC_WCAP_CONN_LIST
                | AC_WCAP_STEREO),
            (AC_PAR_PIN_CAP, AC_PINCAP_OUT),
            (AC_PAR_CONNLIST_LEN, 1),
            (AC_PAR_AMP_IN_CAP, QEMU_HDA_AMP_NONE),
            (AC_PAR_AMP_OUT_CAP, QEMU_HDA_AMP_NONE),
        ]).with_pin(out_config, AC_PINCTL_OUT_EN).with_conn(&[2]));

        if has_input {
            nodes.push(DescNode::new(4, "adc", vec![
                (AC_PAR_AUDIO_WIDGET_CAP, (AC_WID_AUD_IN << AC_WCAP_TYPE_SHIFT)
                    | AC_WCAP_CONN_LIST
                    | AC_WCAP_FORMAT_OVRD
                    | AC_WCAP_AMP_OVRD
                    | AC_WCAP_IN_AMP
                    | AC_WCAP_STEREO),
                (AC_PAR_CONNLIST_LEN, 1),
                (AC_PAR_PCM, QEMU_HDA_PCM_FORMATS),
                (AC_PAR_STREAM, AC_SUPFMT_PCM),
                (AC_PAR_AMP_IN_CAP, amp_caps),
                (AC_PAR_AMP_OUT_CAP, QEMU_HDA_AMP_NONE),
            ]).with_stream(1).with_conn(&[5]));

            let in_config = match kind {
                CodecKind::Micro => pin_config(AC_JACK_MIC_IN, AC_JACK_COLOR_RED, 0x20),
                _ => pin_config(AC_JACK_LINE_IN, AC_JACK_COLOR_RED, 0x20),
            };
            nodes.push(DescNode::new(5, "in", vec![
                (AC_PAR_AUDIO_WIDGET_CAP, (AC_WID_PIN << AC_WCAP_TYPE_SHIFT) | AC_WCAP_STEREO),
                (AC_PAR_PIN_CAP, AC_PINCAP_IN),
                (AC_PAR_AMP_IN_CAP, QEMU_HDA_AMP_NONE),
                (AC_PAR_AMP_OUT_CAP, QEMU_HDA_AMP_NONE),
            ]).with_pin(in_config, AC_PINCTL_IN_EN));
        }

        CodecDesc { iid, nodes }
    }

    pub fn find_node(&self, nid: u32) -> Option<&DescNode> {
        self.nodes.iter().find(|n| n.nid == nid)
    }
}
