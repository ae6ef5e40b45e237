//! Engine.IO v4 and Socket.IO v5 text packet codec.
//!
//! Each WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by its data. Engine `MESSAGE` packets (`4`) wrap one Socket.IO
//! packet with this layout:
//!
//! ```text
//! <type>[<namespace>,][<ack id>][<json>]
//!   2    /private_chat, 12       ["message_sent",{"to":"..."}]
//! ```
//!
//! The namespace is omitted for `/`. Binary packets (`5`, `6`) need
//! attachment frames and are rejected; this client never sends binary
//! payloads and the relay only uses them for file downloads.
//!
//! Decoding never panics: every malformed input maps to a
//! [`ProtocolError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::{ProtocolError, Result},
    events::{ClientEvent, RelayEvent},
};

/// Handshake carried by the Engine.IO `OPEN` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine session id
    pub sid: String,
    /// Transports the server offers to upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval in milliseconds
    pub ping_interval: u64,
    /// Time the server waits for a pong, in milliseconds
    pub ping_timeout: u64,
    /// Largest accepted packet in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// `0`: session handshake from the server
    Open(OpenHandshake),
    /// `1`: close the engine session
    Close,
    /// `2`: heartbeat request, optional payload
    Ping(String),
    /// `3`: heartbeat reply echoing the ping data
    Pong(String),
    /// `4`: Socket.IO payload
    Message(String),
    /// `5`: transport upgrade
    Upgrade,
    /// `6`: no-op
    Noop,
}

impl EnginePacket {
    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(match self {
            Self::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        })
    }

    /// Decode a text frame.
    pub fn decode(frame: &str) -> Result<Self> {
        let (kind, rest) = split_type(frame)?;
        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(rest.to_string())),
            '3' => Ok(Self::Pong(rest.to_string())),
            '4' => Ok(Self::Message(rest.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            'b' => Err(ProtocolError::UnsupportedBinary),
            other => Err(ProtocolError::UnknownEnginePacket(other)),
        }
    }
}

/// Socket.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketPacket {
    /// `0`: namespace connect (client auth) or connect ack (server sid)
    Connect {
        /// Target namespace
        namespace: String,
        /// Auth payload from the client, `{sid}` from the server
        data: Option<Value>,
    },

    /// `1`: namespace disconnect
    Disconnect {
        /// Target namespace
        namespace: String,
    },

    /// `2`: named event
    Event {
        /// Target namespace
        namespace: String,
        /// Acknowledgement id requested by the sender
        ack_id: Option<u64>,
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },

    /// `3`: acknowledgement
    Ack {
        /// Target namespace
        namespace: String,
        /// Id of the acknowledged event
        ack_id: u64,
        /// Acknowledgement arguments
        args: Vec<Value>,
    },

    /// `4`: namespace connection refused
    ConnectError {
        /// Target namespace
        namespace: String,
        /// Server-provided reason
        message: String,
    },
}

impl SocketPacket {
    /// Event packet for a client event.
    pub fn from_client_event(namespace: &str, event: &ClientEvent) -> Self {
        Self::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            name: event.name().to_string(),
            args: vec![event.to_args()],
        }
    }

    /// Event packet for a relay event.
    pub fn from_relay_event(namespace: &str, event: &RelayEvent) -> Result<Self> {
        Ok(Self::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            name: event.name().to_string(),
            args: event.to_args()?.into_iter().collect(),
        })
    }

    /// Relay event carried by this packet, if it is an event addressed to
    /// `namespace`. Payloads that do not decode yield
    /// [`RelayEvent::Malformed`].
    pub fn into_relay_event(self, namespace: &str) -> Option<RelayEvent> {
        match self {
            Self::Event { namespace: ns, name, args, .. } if ns == namespace => {
                Some(RelayEvent::decode_lossy(&name, args.into_iter().next()))
            },
            _ => None,
        }
    }

    /// Namespace the packet targets.
    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Encode as the data of an Engine.IO `MESSAGE` packet.
    pub fn encode(&self) -> Result<String> {
        let (kind, ack_id, body) = match self {
            Self::Connect { data, .. } => ('0', None, data.as_ref().map(serde_json::to_string).transpose()?),
            Self::Disconnect { .. } => ('1', None, None),
            Self::Event { ack_id, name, args, .. } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', *ack_id, Some(serde_json::to_string(&items)?))
            },
            Self::Ack { ack_id, args, .. } => ('3', Some(*ack_id), Some(serde_json::to_string(args)?)),
            Self::ConnectError { message, .. } => {
                ('4', None, Some(serde_json::to_string(&serde_json::json!({ "message": message }))?))
            },
        };

        let mut out = String::new();
        out.push(kind);
        let namespace = self.namespace();
        if namespace != "/" {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(body) = body {
            out.push_str(&body);
        }
        Ok(out)
    }

    /// Decode the data of an Engine.IO `MESSAGE` packet.
    pub fn decode(data: &str) -> Result<Self> {
        let (kind, rest) = split_type(data)?;
        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::UnsupportedBinary);
        }
        if !matches!(kind, '0'..='4') {
            return Err(ProtocolError::UnknownSocketPacket(kind));
        }

        let (namespace, rest) = split_namespace(rest);
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (ack_digits, body) = rest.split_at(digits);
        let ack_id = if ack_digits.is_empty() {
            None
        } else {
            Some(
                ack_digits
                    .parse::<u64>()
                    .map_err(|_| ProtocolError::Malformed(format!("ack id out of range: {ack_digits}")))?,
            )
        };
        let body: Option<Value> = if body.is_empty() { None } else { Some(serde_json::from_str(body)?) };

        match kind {
            '0' => Ok(Self::Connect { namespace, data: body }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = body else {
                    return Err(ProtocolError::Malformed("event body must be an array".into()));
                };
                if items.is_empty() {
                    return Err(ProtocolError::Malformed("event without a name".into()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(ProtocolError::Malformed("event name must be a string".into()));
                };
                Ok(Self::Event { namespace, ack_id, name, args: items })
            },
            '3' => {
                let id = ack_id.ok_or_else(|| ProtocolError::Malformed("ack without id".into()))?;
                let args = match body {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(_) => return Err(ProtocolError::Malformed("ack body must be an array".into())),
                };
                Ok(Self::Ack { namespace, ack_id: id, args })
            },
            _ => {
                let message = match body {
                    Some(Value::Object(map)) => {
                        map.get("message").and_then(Value::as_str).unwrap_or("connection refused").to_string()
                    },
                    Some(Value::String(text)) => text,
                    _ => "connection refused".to_string(),
                };
                Ok(Self::ConnectError { namespace, message })
            },
        }
    }
}

fn split_type(frame: &str) -> Result<(char, &str)> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(ProtocolError::EmptyPacket)?;
    Ok((kind, chars.as_str()))
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return ("/".to_string(), rest);
    }
    match rest.split_once(',') {
        Some((namespace, tail)) => (namespace.to_string(), tail),
        None => (rest.to_string(), ""),
    }
}
