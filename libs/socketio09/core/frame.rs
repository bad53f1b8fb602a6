//! socket.io 0.9 frame codec
//!
//! Pure conversions between wire text and [`Frame`] values. Nothing here
//! logs or touches connection state; callers decide what a decode error
//! means for their connection.
//!
//! # Wire format
//!
//! ```text
//! <kind>:<ackId?>[+]:<endpoint>:<data>
//!
//! 0::                                   disconnect
//! 1::                                   connect
//! 2::                                   heartbeat
//! 5:::{"name":"chat","args":[...]}      event
//! 5:7+::{"name":"chat","args":[...]}    event expecting ack 7
//! 6:::7+[...]                           ack 7 with reply arguments
//! 8::                                   noop
//! ```

use crate::error::{Result, SocketIoError};
use serde::{Deserialize, Serialize};

/// Per-connection acknowledgment identifier
pub type AckId = u64;

/// Shortest valid frame (`1::`)
pub const MIN_FRAME_LEN: usize = 3;

/// Wire text of an outbound heartbeat
pub const HEARTBEAT_TEXT: &str = "2::";

/// Wire text used as the writer's shutdown sentinel
pub const DISCONNECT_TEXT: &str = "0::";

/// Argument list of a frame that carries no arguments
pub const EMPTY_ARGS: &str = "[]";

/// Frame types understood by this client
///
/// Codes 3 (message), 4 (json message) and 7 (error) are defined by the
/// protocol but never exchanged by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Disconnect,
    Connect,
    Heartbeat,
    Event,
    Ack,
    Noop,
}

impl FrameKind {
    /// Single-character wire code
    pub const fn code(self) -> char {
        match self {
            FrameKind::Disconnect => '0',
            FrameKind::Connect => '1',
            FrameKind::Heartbeat => '2',
            FrameKind::Event => '5',
            FrameKind::Ack => '6',
            FrameKind::Noop => '8',
        }
    }

    /// Look up a kind by its wire code
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(FrameKind::Disconnect),
            '1' => Some(FrameKind::Connect),
            '2' => Some(FrameKind::Heartbeat),
            '5' => Some(FrameKind::Event),
            '6' => Some(FrameKind::Ack),
            '8' => Some(FrameKind::Noop),
            _ => None,
        }
    }
}

/// One protocol message, inbound or outbound
///
/// For [`FrameKind::Event`] the payload is the complete JSON argument list
/// (`[...]`). For [`FrameKind::Ack`] it is the raw reply text that followed
/// the `+`, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    ack_id: Option<AckId>,
    event_name: Option<String>,
    payload: Option<String>,
}

impl Frame {
    /// Frame with no fields beyond its kind
    pub fn control(kind: FrameKind) -> Self {
        Self {
            kind,
            ack_id: None,
            event_name: None,
            payload: None,
        }
    }

    pub fn heartbeat() -> Self {
        Self::control(FrameKind::Heartbeat)
    }

    /// Event frame carrying an already-serialized argument list
    pub fn event(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Event,
            ack_id: None,
            event_name: Some(name.into()),
            payload: Some(args.into()),
        }
    }

    /// Ack frame carrying a raw reply
    pub fn ack(id: AckId, payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Ack,
            ack_id: Some(id),
            event_name: None,
            payload: Some(payload.into()),
        }
    }

    /// Request an acknowledgment for this event
    pub fn with_ack(mut self, id: AckId) -> Self {
        self.ack_id = Some(id);
        self
    }

    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    #[inline]
    pub fn ack_id(&self) -> Option<AckId> {
        self.ack_id
    }

    #[inline]
    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    #[inline]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Consume the frame, returning its payload
    pub fn into_payload(self) -> Option<String> {
        self.payload
    }
}

#[derive(Deserialize)]
struct EventEnvelope {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Serialize a single emit argument into a one-element argument list
///
/// A value that serializes to JSON `null` (for example `()`) yields the
/// empty list.
pub fn encode_args<T: Serialize + ?Sized>(args: &T) -> Result<String> {
    let value =
        serde_json::to_value(args).map_err(|e| SocketIoError::Serialize(e.to_string()))?;
    if value.is_null() {
        return Ok(EMPTY_ARGS.to_string());
    }
    let json =
        serde_json::to_string(&value).map_err(|e| SocketIoError::Serialize(e.to_string()))?;
    Ok(format!("[{}]", json))
}

/// Encode an outbound frame to wire text
///
/// Only heartbeats and events are ever sent by the client; any other kind is
/// rejected with [`SocketIoError::UnexpectedOutboundType`].
pub fn encode(frame: &Frame) -> Result<String> {
    match frame.kind {
        FrameKind::Heartbeat => Ok(HEARTBEAT_TEXT.to_string()),
        FrameKind::Event => {
            let name = serde_json::to_string(frame.event_name().unwrap_or_default())
                .map_err(|e| SocketIoError::Serialize(e.to_string()))?;
            let args = frame.payload().unwrap_or(EMPTY_ARGS);
            let header = match frame.ack_id {
                Some(id) => format!("5:{}+::", id),
                None => "5:::".to_string(),
            };
            Ok(format!(r#"{}{{"name":{},"args":{}}}"#, header, name, args))
        }
        other => Err(SocketIoError::UnexpectedOutboundType(other)),
    }
}

/// Decode inbound wire text into a frame
pub fn decode(text: &str) -> Result<Frame> {
    if text.chars().take(MIN_FRAME_LEN).count() < MIN_FRAME_LEN {
        return Err(SocketIoError::MalformedFrame(format!(
            "frame too short: {:?}",
            text
        )));
    }

    let code = text.chars().next().unwrap_or_default();
    let kind = FrameKind::from_code(code)
        .ok_or_else(|| SocketIoError::UnexpectedInboundType(code.to_string()))?;

    match kind {
        FrameKind::Disconnect | FrameKind::Connect | FrameKind::Heartbeat | FrameKind::Noop => {
            Ok(Frame::control(kind))
        }
        FrameKind::Event => decode_event(text),
        FrameKind::Ack => decode_ack(text),
    }
}

/// Split `kind:id:endpoint:data`, returning `(id, data)`
fn split_header(text: &str) -> Result<(&str, &str)> {
    let mut parts = text.splitn(4, ':');
    let _kind = parts.next();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(_endpoint), Some(data)) => Ok((id, data)),
        _ => Err(SocketIoError::MalformedFrame(format!(
            "missing frame header fields: {:?}",
            text
        ))),
    }
}

fn parse_ack_id(raw: &str, text: &str) -> Result<AckId> {
    raw.parse::<AckId>().map_err(|_| {
        SocketIoError::MalformedFrame(format!("invalid ack id {:?} in {:?}", raw, text))
    })
}

fn decode_event(text: &str) -> Result<Frame> {
    let (id, data) = split_header(text)?;

    let ack_id = match id.trim_end_matches('+') {
        "" => None,
        raw => Some(parse_ack_id(raw, text)?),
    };

    let envelope: EventEnvelope = serde_json::from_str(data)
        .map_err(|e| SocketIoError::MalformedFrame(format!("event body: {}", e)))?;

    let args = if envelope.args.is_null() {
        EMPTY_ARGS.to_string()
    } else {
        serde_json::to_string(&envelope.args)
            .map_err(|e| SocketIoError::MalformedFrame(format!("event args: {}", e)))?
    };

    let mut frame = Frame::event(envelope.name, args);
    frame.ack_id = ack_id;
    Ok(frame)
}

fn decode_ack(text: &str) -> Result<Frame> {
    let (_, data) = split_header(text)?;

    let plus = data.find('+').ok_or_else(|| {
        SocketIoError::MalformedFrame(format!("ack without '+' separator: {:?}", text))
    })?;

    let id = parse_ack_id(&data[..plus], text)?;
    Ok(Frame::ack(id, &data[plus + 1..]))
}
