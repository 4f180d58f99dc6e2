//! Device-control protocol: request envelopes and reply decoding.
//!
//! Requests are JSON text frames of the form
//! `{"Opcode": "...", "Space": "SNES", "Operands": [...]}`. Replies to
//! `DeviceList` are JSON text frames (`{"Results": [...]}`); replies to
//! `GetAddress` are raw binary frames. `Name` and `Attach` produce no reply.
//!
//! Replies carry no request identifier. A client issuing several reads must
//! rely on the server answering them in the order they were sent.

use serde::{Deserialize, Serialize};

/// Length operand of every read request: one byte.
pub const READ_LENGTH: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    DeviceList,
    Attach,
    Name,
    GetAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Space {
    #[default]
    #[serde(rename = "SNES")]
    Snes,
}

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    pub opcode: Opcode,
    pub space: Space,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<String>,
}

impl Request {
    /// Enumerate attachable devices.
    pub fn device_list() -> Self {
        Self {
            opcode: Opcode::DeviceList,
            space: Space::Snes,
            operands: Vec::new(),
        }
    }

    /// Bind the connection to `device`.
    pub fn attach(device: impl Into<String>) -> Self {
        Self {
            opcode: Opcode::Attach,
            space: Space::Snes,
            operands: vec![device.into()],
        }
    }

    /// Announce the client name. The server does not reply.
    pub fn name(app_name: impl Into<String>) -> Self {
        Self {
            opcode: Opcode::Name,
            space: Space::Snes,
            operands: vec![app_name.into()],
        }
    }

    /// Read one byte at `address`.
    pub fn get_address(address: u32) -> Self {
        Self {
            opcode: Opcode::GetAddress,
            space: Space::Snes,
            operands: vec![format_address(address), READ_LENGTH.to_string()],
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Address operand: uppercase hex, no `0x` prefix, no padding.
pub fn format_address(address: u32) -> String {
    format!("{address:X}")
}

/// Text reply envelope (`{"Results": [...]}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultsReply {
    pub results: Vec<String>,
}

/// Parse a `DeviceList` reply into device identifiers, in server order.
pub fn parse_device_list(text: &str) -> Result<Vec<String>, ProtocolError> {
    let reply: ResultsReply = serde_json::from_str(text)?;
    Ok(reply.results)
}

/// Decode a `GetAddress` reply: the first byte is the value, the rest is ignored.
pub fn decode_read(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
