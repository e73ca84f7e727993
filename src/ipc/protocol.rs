//! Wire protocol types for the page/host bridge
//!
//! Every envelope is a single JSON document carried as one channel message.
//!
//! ```text
//! page -> host
//!   request:         {"window":   {"id": 3, "body": {"read": "/etc/hosts"}}}
//!   external reply:  {"external": {"id": 5, "body": {"ok": ...} | {"err": "..."}}}
//!
//! host -> page
//!   response:        {"id": 3, "body": {"ok": ...} | {"err": "..."}}
//!   stream line:     {"id": 7, "line": "..."}
//!   stream end:      {"id": 7, "end": {}} | {"id": 7, "end": {"err": "..."}}
//!   external call:   {"external_id": 5, "body": ...}
//! ```
//!
//! Request and stream ids share a numeric range, so inbound envelopes are
//! classified by which keys they carry, never by the value of `id`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

macro_rules! wire_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

wire_id!(
    /// Correlates a page request with its single response
    RequestId
);
wire_id!(
    /// Correlates a streaming command with the lines the host emits for it
    StreamId
);
wire_id!(
    /// Identifies a host-initiated call awaiting exactly one reply
    ExternalCallId
);

/// Outcome carried by responses and external replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok(Value),
    Err(String),
}

impl Outcome {
    pub fn into_result(self) -> Result<Value> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(message) => Err(Error::Host(message)),
        }
    }
}

impl From<std::result::Result<Value, String>> for Outcome {
    fn from(result: std::result::Result<Value, String>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(message) => Outcome::Err(message),
        }
    }
}

/// Envelopes the page sends to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outbound {
    Window { id: RequestId, body: Value },
    External { id: ExternalCallId, body: Outcome },
}

impl Outbound {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }
}

/// How a stream finished, as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamEnd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// Envelopes the host sends to the page, after shape classification
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response { id: RequestId, body: Outcome },
    StreamLine { id: StreamId, line: String },
    StreamEnd { id: StreamId, end: StreamEnd },
    ExternalCall { id: ExternalCallId, body: Value },
}

enum Shape {
    Response,
    Line,
    End,
    External,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponseShape {
    id: RequestId,
    body: Outcome,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LineShape {
    id: StreamId,
    line: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EndShape {
    id: StreamId,
    end: StreamEnd,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalShape {
    external_id: ExternalCallId,
    #[serde(default)]
    body: Value,
}

impl Inbound {
    /// Decode and classify a raw message from the host
    pub fn decode(raw: &str, max_len: usize) -> Result<Self> {
        if raw.len() > max_len {
            return Err(Error::MessageTooLarge {
                len: raw.len(),
                max: max_len,
            });
        }

        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(map) = value else {
            return Err(Error::Protocol("envelope is not a JSON object".to_string()));
        };

        let shape = if map.contains_key("external_id") {
            Shape::External
        } else if map.contains_key("req") {
            return Err(Error::Protocol(
                "legacy flat envelope ({req, body}) is not supported".to_string(),
            ));
        } else if !map.contains_key("id") {
            return Err(Error::Protocol(format!(
                "envelope has no correlation id (keys: {})",
                keys(&map)
            )));
        } else if map.contains_key("line") {
            Shape::Line
        } else if map.contains_key("end") {
            Shape::End
        } else if map.contains_key("body") {
            Shape::Response
        } else {
            return Err(Error::Protocol(format!(
                "unrecognized envelope shape (keys: {})",
                keys(&map)
            )));
        };

        let envelope = Value::Object(map);
        let inbound = match shape {
            Shape::Response => {
                let s: ResponseShape = serde_json::from_value(envelope)?;
                Inbound::Response { id: s.id, body: s.body }
            }
            Shape::Line => {
                let s: LineShape = serde_json::from_value(envelope)?;
                Inbound::StreamLine { id: s.id, line: s.line }
            }
            Shape::End => {
                let s: EndShape = serde_json::from_value(envelope)?;
                Inbound::StreamEnd { id: s.id, end: s.end }
            }
            Shape::External => {
                let s: ExternalShape = serde_json::from_value(envelope)?;
                Inbound::ExternalCall {
                    id: s.external_id,
                    body: s.body,
                }
            }
        };
        Ok(inbound)
    }

    /// Encode in the host's direction; used by host stand-ins and tests
    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            Inbound::Response { id, body } => serde_json::json!({ "id": id, "body": body }),
            Inbound::StreamLine { id, line } => serde_json::json!({ "id": id, "line": line }),
            Inbound::StreamEnd { id, end } => serde_json::json!({ "id": id, "end": end }),
            Inbound::ExternalCall { id, body } => {
                serde_json::json!({ "external_id": id, "body": body })
            }
        };
        serde_json::to_string(&value).map_err(Error::from)
    }
}

fn keys(map: &Map<String, Value>) -> String {
    map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}
