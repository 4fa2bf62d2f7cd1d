//! Maestro binary command codec.
//!
//! Every command starts with the same header: the addressed form
//! `[0xAA, device, opcode & 0x7F]`, or just `[opcode]` when the device byte has
//! bit 7 set (compact form). Arguments follow with bit 7 clear; 14-bit values
//! are sent as a low 7-bit group followed by a high 7-bit group.
//!
//! The codec never performs I/O and never rejects a value: out-of-range
//! arguments are truncated to what the wire format can carry.

/// Start byte of the addressed (Pololu) protocol.
pub const ADDRESSED_START: u8 = 0xAA;
/// Start byte of the Mini-SSC protocol.
pub const MINI_SSC_START: u8 = 0xFF;
/// Largest value a Mini-SSC frame can carry (0xFF is the sync byte).
pub const MINI_SSC_MAX: u8 = 254;

pub const SEVEN_BIT_MASK: u8 = 0x7F;
/// Most values one set-multiple-targets frame can carry; the count is one 7-bit byte.
pub const MAX_VARIABLE_VALUES: usize = 0x7F;
pub const FOURTEEN_BIT_MASK: u16 = 0x3FFF;

pub const OP_SET_TARGET: u8 = 0x84;
pub const OP_SET_MULTIPLE_TARGETS: u8 = 0x9F;
pub const OP_SET_SPEED: u8 = 0x87;
pub const OP_SET_ACCELERATION: u8 = 0x89;
pub const OP_SET_PWM: u8 = 0x8A;
pub const OP_GO_HOME: u8 = 0xA2;
pub const OP_GET_POSITION: u8 = 0x90;
pub const OP_GET_MOVING_STATE: u8 = 0x93;
pub const OP_GET_ERRORS: u8 = 0xA1;

/// Device number byte placed after the start byte.
///
/// Bit 7 set selects the compact protocol, where the frame carries only the
/// opcode and every controller on the line listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Compact protocol, no device byte on the wire.
    pub const COMPACT: DeviceAddress = DeviceAddress(0x80);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u8 {
        self.0
    }

    pub fn is_compact(&self) -> bool {
        self.0 & 0x80 != 0
    }
}

impl Default for DeviceAddress {
    fn default() -> Self {
        Self(12)
    }
}

/// Frame header shared by every Maestro command.
pub fn encode_header(opcode: u8, device: DeviceAddress) -> Vec<u8> {
    if device.is_compact() {
        vec![opcode]
    } else {
        vec![
            ADDRESSED_START,
            device.raw() & SEVEN_BIT_MASK,
            opcode & SEVEN_BIT_MASK,
        ]
    }
}

/// Split a value into its (low, high) 7-bit groups, truncating to 14 bits.
pub fn split_14bit(value: u16) -> (u8, u8) {
    let value = value & FOURTEEN_BIT_MASK;
    (
        (value as u8) & SEVEN_BIT_MASK,
        ((value >> 7) as u8) & SEVEN_BIT_MASK,
    )
}

fn push_14bit(frame: &mut Vec<u8>, value: u16) {
    let (low, high) = split_14bit(value);
    frame.push(low);
    frame.push(high);
}

pub fn encode_no_arg(opcode: u8, device: DeviceAddress) -> Vec<u8> {
    encode_header(opcode, device)
}

pub fn encode_byte_arg(opcode: u8, device: DeviceAddress, arg: u8) -> Vec<u8> {
    let mut frame = encode_header(opcode, device);
    frame.push(arg & SEVEN_BIT_MASK);
    frame
}

pub fn encode_byte_and_14bit_arg(opcode: u8, device: DeviceAddress, arg: u8, value: u16) -> Vec<u8> {
    let mut frame = encode_byte_arg(opcode, device, arg);
    push_14bit(&mut frame, value);
    frame
}

pub fn encode_two_14bit_args(opcode: u8, device: DeviceAddress, first: u16, second: u16) -> Vec<u8> {
    let mut frame = encode_header(opcode, device);
    push_14bit(&mut frame, first);
    push_14bit(&mut frame, second);
    frame
}

/// Header, count byte, first index byte, then one 14-bit pair per value.
///
/// Values past [`MAX_VARIABLE_VALUES`] are dropped so the count byte always
/// matches the pairs that follow it.
pub fn encode_variable_14bit_args(
    opcode: u8,
    device: DeviceAddress,
    first_index: u8,
    values: &[u16],
) -> Vec<u8> {
    let values = &values[..values.len().min(MAX_VARIABLE_VALUES)];
    let mut frame = encode_header(opcode, device);
    frame.reserve(2 + values.len() * 2);
    frame.push((values.len() as u8) & SEVEN_BIT_MASK);
    frame.push(first_index & SEVEN_BIT_MASK);
    for &value in values {
        push_14bit(&mut frame, value);
    }
    frame
}

/// Mini-SSC frame `[0xFF, channel, value]`, independent of the header rule.
pub fn encode_minissc(channel: u8, value: u8) -> Vec<u8> {
    vec![MINI_SSC_START, channel, value.min(MINI_SSC_MAX)]
}

/// Inverse of [`split_14bit`].
pub fn join_14bit(low: u8, high: u8) -> u16 {
    (u16::from(low & SEVEN_BIT_MASK) | (u16::from(high & SEVEN_BIT_MASK) << 7)) & FOURTEEN_BIT_MASK
}

/// Two response bytes, low byte first.
///
/// Responses carry full 8-bit bytes, unlike the 7-bit groups of command
/// arguments.
pub fn decode_14bit(low: u8, high: u8) -> u16 {
    u16::from(low) | (u16::from(high) << 8)
}

pub fn decode_byte(byte: u8) -> u8 {
    byte
}

/// Number of response bytes a command makes the controller send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    None,
    Byte,
    Word,
}

impl Response {
    pub fn len(&self) -> usize {
        match self {
            Response::None => 0,
            Response::Byte => 1,
            Response::Word => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Response::None)
    }
}

/// A single controller command with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetTarget { channel: u8, target: u16 },
    SetMultipleTargets { first_channel: u8, targets: Vec<u16> },
    SetSpeed { channel: u8, speed: u16 },
    SetAcceleration { channel: u8, acceleration: u16 },
    SetPwm { on_time: u16, period: u16 },
    GoHome,
    GetPosition { channel: u8 },
    GetMovingState,
    GetErrors,
    MiniSsc { channel: u8, value: u8 },
}

impl Command {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetTarget { .. } => "set_target",
            Command::SetMultipleTargets { .. } => "set_multiple_targets",
            Command::SetSpeed { .. } => "set_speed",
            Command::SetAcceleration { .. } => "set_acceleration",
            Command::SetPwm { .. } => "set_pwm",
            Command::GoHome => "go_home",
            Command::GetPosition { .. } => "get_position",
            Command::GetMovingState => "get_moving_state",
            Command::GetErrors => "get_errors",
            Command::MiniSsc { .. } => "set_target_minissc",
        }
    }

    pub fn response(&self) -> Response {
        match self {
            Command::GetPosition { .. } | Command::GetErrors => Response::Word,
            Command::GetMovingState => Response::Byte,
            _ => Response::None,
        }
    }

    pub fn encode(&self, device: DeviceAddress) -> Vec<u8> {
        match self {
            Command::SetTarget { channel, target } => {
                encode_byte_and_14bit_arg(OP_SET_TARGET, device, *channel, *target)
            }
            Command::SetMultipleTargets { first_channel, targets } => {
                encode_variable_14bit_args(OP_SET_MULTIPLE_TARGETS, device, *first_channel, targets)
            }
            Command::SetSpeed { channel, speed } => {
                encode_byte_and_14bit_arg(OP_SET_SPEED, device, *channel, *speed)
            }
            Command::SetAcceleration { channel, acceleration } => {
                encode_byte_and_14bit_arg(OP_SET_ACCELERATION, device, *channel, *acceleration)
            }
            Command::SetPwm { on_time, period } => {
                encode_two_14bit_args(OP_SET_PWM, device, *on_time, *period)
            }
            Command::GoHome => encode_no_arg(OP_GO_HOME, device),
            Command::GetPosition { channel } => encode_byte_arg(OP_GET_POSITION, device, *channel),
            Command::GetMovingState => encode_no_arg(OP_GET_MOVING_STATE, device),
            Command::GetErrors => encode_no_arg(OP_GET_ERRORS, device),
            Command::MiniSsc { channel, value } => encode_minissc(*channel, *value),
        }
    }
}
