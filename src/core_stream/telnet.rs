//! Inline interpreter for the telnet control bytes FTP clients may embed in
//! the command stream, usually around ABOR. Only two effects are ever visible
//! outside this module: "discard pending output" and "restart the current
//! line read"; everything else is answered or swallowed here.

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const AYT: u8 = 246;
pub const AO: u8 = 245;
pub const IP: u8 = 244;
pub const SYNCH: u8 = 242;
pub const NOP: u8 = 241;

const AYT_REPLY: &[u8] = b"\n[Yes]\n";

#[derive(Debug, PartialEq)]
pub enum TelnetAction {
    /// Byte consumed, feed the next one.
    Continue,
    /// Plain data byte (or an escaped literal 255).
    Emit(u8),
    /// Abort-output: drop whatever is buffered for the peer.
    Purge,
    /// Bytes to send back to the peer.
    Reply { bytes: Vec<u8>, flush: bool },
    /// Synchronize mark: restart the line read, dropping partial input.
    Restart,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Data,
    Command,
    /// Awaiting the option byte of a WILL/WONT/DO/DONT negotiation.
    Option(u8),
}

/// Byte-at-a-time decoder; owns no I/O.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: State,
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, byte: u8) -> TelnetAction {
        match self.state {
            State::Data => {
                if byte == IAC {
                    self.state = State::Command;
                    TelnetAction::Continue
                } else {
                    TelnetAction::Emit(byte)
                }
            }
            State::Command => {
                self.state = State::Data;
                match byte {
                    IAC => TelnetAction::Emit(IAC),
                    AO => TelnetAction::Purge,
                    AYT => TelnetAction::Reply {
                        bytes: AYT_REPLY.to_vec(),
                        flush: true,
                    },
                    IP | NOP => TelnetAction::Continue,
                    SYNCH => TelnetAction::Restart,
                    WILL | WONT | DO | DONT => {
                        self.state = State::Option(byte);
                        TelnetAction::Continue
                    }
                    _ => TelnetAction::Continue,
                }
            }
            State::Option(cmd) => {
                self.state = State::Data;
                // Decline every capability the peer offers or requests.
                let refusal = if cmd == WILL || cmd == WONT { DONT } else { WONT };
                TelnetAction::Reply {
                    bytes: vec![IAC, refusal, byte],
                    flush: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bytes_pass_through() {
        let mut dec = TelnetDecoder::new();
        assert_eq!(dec.feed(b'A'), TelnetAction::Emit(b'A'));
        assert_eq!(dec.feed(b'\r'), TelnetAction::Emit(b'\r'));
    }

    #[test]
    fn escaped_iac_is_literal() {
        let mut dec = TelnetDecoder::new();
        assert_eq!(dec.feed(IAC), TelnetAction::Continue);
        assert_eq!(dec.feed(IAC), TelnetAction::Emit(IAC));
    }

    #[test]
    fn abort_output_purges() {
        let mut dec = TelnetDecoder::new();
        dec.feed(IAC);
        assert_eq!(dec.feed(AO), TelnetAction::Purge);
    }

    #[test]
    fn synch_restarts_line() {
        let mut dec = TelnetDecoder::new();
        dec.feed(IAC);
        assert_eq!(dec.feed(SYNCH), TelnetAction::Restart);
        // Decoder is back in data state afterwards.
        assert_eq!(dec.feed(b'x'), TelnetAction::Emit(b'x'));
    }

    #[test]
    fn negotiation_is_always_declined() {
        let mut dec = TelnetDecoder::new();
        dec.feed(IAC);
        assert_eq!(dec.feed(WILL), TelnetAction::Continue);
        assert_eq!(
            dec.feed(42),
            TelnetAction::Reply {
                bytes: vec![IAC, DONT, 42],
                flush: false
            }
        );

        dec.feed(IAC);
        assert_eq!(dec.feed(DO), TelnetAction::Continue);
        assert_eq!(
            dec.feed(7),
            TelnetAction::Reply {
                bytes: vec![IAC, WONT, 7],
                flush: false
            }
        );
    }

    #[test]
    fn are_you_there_replies_and_flushes() {
        let mut dec = TelnetDecoder::new();
        dec.feed(IAC);
        match dec.feed(AYT) {
            TelnetAction::Reply { bytes, flush } => {
                assert_eq!(bytes, AYT_REPLY);
                assert!(flush);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }
}
