//! Device discovery: turning a `DeviceList` reply into the next handshake step.

use at_protocol::{parse_device_list, ProtocolError};

/// What to do after a `DeviceList` reply.
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// Attach to `device`, the first listed entry.
    Attach { device: String, listed: usize },
    /// The server listed nothing.
    NoDevice,
    /// The reply could not be parsed; wait for the handshake watchdog.
    Malformed(ProtocolError),
}

pub fn on_device_list(text: &str) -> HandshakeOutcome {
    match parse_device_list(text) {
        Ok(devices) => {
            let listed = devices.len();
            match devices.into_iter().next() {
                Some(device) => HandshakeOutcome::Attach { device, listed },
                None => HandshakeOutcome::NoDevice,
            }
        }
        Err(e) => HandshakeOutcome::Malformed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_device_wins() {
        match on_device_list(r#"{"Results":["SD2SNES COM3","RetroArch localhost"]}"#) {
            HandshakeOutcome::Attach { device, listed } => {
                assert_eq!(device, "SD2SNES COM3");
                assert_eq!(listed, 2);
            }
            other => panic!("expected attach, got {other:?}"),
        }
    }

    #[test]
    fn empty_list_is_no_device() {
        assert!(matches!(
            on_device_list(r#"{"Results":[]}"#),
            HandshakeOutcome::NoDevice
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            on_device_list("{\"Results\": 12}"),
            HandshakeOutcome::Malformed(_)
        ));
    }
}
