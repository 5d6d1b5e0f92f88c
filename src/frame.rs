use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    /// Connection close, the terminate frame.
    Close,
    Ping,
    Pong,
    /// Codes 0x3-0x7 and 0xB-0xF, reserved by RFC6455 for future use.
    Reserved(u8),
}

impl OpCode {
    pub fn from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continue),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            0x3..=0x7 | 0xB..=0xF => Ok(OpCode::Reserved(byte)),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(byte) => *byte,
        }
    }

    pub fn is_control(&self) -> bool {
        match self {
            OpCode::Close | OpCode::Ping | OpCode::Pong => true,
            // reserved control frames live in the upper half of the range
            OpCode::Reserved(byte) => *byte >= 0xB,
            _ => false,
        }
    }

    // Text and Binary frames carry application payload, everything else is protocol plumbing
    pub fn is_content(&self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub final_fragment: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(final_fragment: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            final_fragment,
            opcode,
            payload,
        }
    }
}
