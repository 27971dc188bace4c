//! Wire messages exchanged after the handshake.
//!
//! Both directions carry protobuf bodies inside length-prefixed frames
//! (see [`crate::core::frame`]). The field tags are part of the protocol and
//! must never be renumbered.

use std::convert::TryFrom;
use std::fmt;

/// Protocol version implemented by this crate, sent as `HQ 0001\n`.
pub const PROTOCOL_VERSION: u16 = 1;

/// Client-to-server message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub command: String,
    #[prost(string, repeated, tag = "2")]
    pub args: Vec<String>,
}

impl Request {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

/// Server-to-client message. `args[0]`, when present, carries the payload
/// (e.g. a DUMP document).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    #[prost(uint32, tag = "1")]
    pub status: u32,
    #[prost(string, repeated, tag = "2")]
    pub args: Vec<String>,
}

impl Response {
    pub fn new(status: Status, args: Vec<String>) -> Self {
        Self {
            status: status.code(),
            args,
        }
    }

    /// A response carrying only a status code.
    pub fn status(status: Status) -> Self {
        Self::new(status, Vec::new())
    }

    /// Decodes the raw status code, `None` for codes this crate doesn't know.
    pub fn status_kind(&self) -> Option<Status> {
        Status::try_from(self.status).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Status codes carried in [`Response::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    Ok = 200,
    Created = 201,
    BadSyntax = 400,
    UnknownCommand = 405,
    BadArgs = 406,
    UnsupportedVersion = 451,
    InternalError = 500,
}

impl Status {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::BadSyntax => "Bad Syntax",
            Status::UnknownCommand => "Unknown Command",
            Status::BadArgs => "Bad Args",
            Status::UnsupportedVersion => "Unsupported Version",
            Status::InternalError => "Internal Error",
        }
    }
}

impl From<Status> for u32 {
    fn from(s: Status) -> Self {
        s.code()
    }
}

impl TryFrom<u32> for Status {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            200 => Ok(Status::Ok),
            201 => Ok(Status::Created),
            400 => Ok(Status::BadSyntax),
            405 => Ok(Status::UnknownCommand),
            406 => Ok(Status::BadArgs),
            451 => Ok(Status::UnsupportedVersion),
            500 => Ok(Status::InternalError),
            other => Err(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn request_roundtrip_preserves_command_and_args() {
        let req = Request::new("XMAKE", vec!["orders".to_string(), "".to_string()]);
        let bytes = req.encode_to_vec();
        let decoded = Request::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn response_roundtrip_with_payload() {
        let resp = Response::new(Status::Ok, vec![r#"{"exchanges":[],"queues":[]}"#.into()]);
        let decoded = Response::decode(resp.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(decoded.status_kind(), Some(Status::Ok));
    }

    #[test]
    fn status_only_response_has_no_args() {
        let resp = Response::status(Status::UnknownCommand);
        assert_eq!(resp.status, 405);
        assert!(resp.args.is_empty());
        assert!(!resp.is_success());
    }

    #[test]
    fn unknown_status_code_is_rejected() {
        assert_eq!(Status::try_from(450), Err(450));
        assert_eq!(Status::try_from(201), Ok(Status::Created));
    }
}
