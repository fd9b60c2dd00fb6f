//! JSON envelope shared by every request and message.
//!
//! The engine speaks flat JSON objects. Three reserved keys carry the
//! envelope: `@type` names the object, `@extra` carries the correlation tag
//! of the request a reply answers, and `@client_id` selects the client
//! instance inside the engine. Everything else is the payload.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::methods::Method;

const TYPE_KEY: &str = "@type";
const EXTRA_KEY: &str = "@extra";
const CLIENT_ID_KEY: &str = "@client_id";

// ── ClientId ─────────────────────────────────────────────────────────

/// Opaque identity the engine uses to demultiplex client instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(i32);

impl ClientId {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Request ──────────────────────────────────────────────────────────

/// An outbound request: object name, payload fields, and correlation tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: String,
    extra: String,
    fields: Map<String, Value>,
}

impl Request {
    /// A request with no payload fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            extra: String::new(),
            fields: Map::new(),
        }
    }

    /// Build a request from any payload that serializes to a JSON object.
    ///
    /// Reserved `@`-keys in the payload are discarded; the envelope owns them.
    pub fn from_payload<P: Serialize>(kind: impl Into<String>, payload: &P) -> Result<Self, Error> {
        let kind = kind.into();
        let value = serde_json::to_value(payload).map_err(|e| Error::Encode {
            kind: kind.clone(),
            message: e.to_string(),
        })?;

        let mut fields = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::Encode {
                    kind,
                    message: format!("payload must be a JSON object, got {other}"),
                });
            }
        };
        fields.retain(|key, _| !key.starts_with('@'));

        Ok(Self {
            kind,
            extra: String::new(),
            fields,
        })
    }

    /// Build a request from a typed [`Method`].
    pub fn from_method<M: Method>(method: &M) -> Result<Self, Error> {
        Self::from_payload(M::TYPE, method)
    }

    /// Parse a raw JSON object (as typed by an operator) into a request.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })?;
        let kind = value
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Deserialization {
                message: format!("missing `{TYPE_KEY}` field"),
                body: text.to_owned(),
            })?
            .to_owned();
        Self::from_payload(kind, &value)
    }

    /// Attach the correlation tag.
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    pub fn set_extra(&mut self, extra: impl Into<String>) {
        self.extra = extra.into();
    }

    /// Add or replace a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn extra(&self) -> &str {
        &self.extra
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The full JSON object as submitted to the engine for `client_id`.
    pub fn to_value(&self, client_id: ClientId) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 3);
        object.insert(TYPE_KEY.into(), Value::String(self.kind.clone()));
        if !self.extra.is_empty() {
            object.insert(EXTRA_KEY.into(), Value::String(self.extra.clone()));
        }
        object.insert(CLIENT_ID_KEY.into(), Value::from(client_id.get()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self, client_id: ClientId) -> String {
        self.to_value(client_id).to_string()
    }
}

// ── Message ──────────────────────────────────────────────────────────

/// An inbound object from the engine: a reply (tagged) or an update (untagged).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    client_id: Option<ClientId>,
    extra: Option<String>,
    payload: Value,
}

impl Message {
    pub fn new(client_id: Option<ClientId>, extra: Option<String>, payload: Value) -> Self {
        Self {
            client_id,
            extra: extra.filter(|tag| !tag.is_empty()),
            payload,
        }
    }

    /// Parse one JSON object received from the engine.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })?;
        Self::from_value(value).map_err(|e| match e {
            Error::Deserialization { message, .. } => Error::Deserialization {
                message,
                body: text.to_owned(),
            },
            other => other,
        })
    }

    /// Split the envelope keys off a decoded JSON object.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let Value::Object(mut object) = value else {
            return Err(Error::Deserialization {
                message: "message must be a JSON object".into(),
                body: value.to_string(),
            });
        };

        let client_id = object
            .remove(CLIENT_ID_KEY)
            .and_then(|v| v.as_i64())
            .and_then(|raw| i32::try_from(raw).ok())
            .map(ClientId::new);

        let extra = match object.remove(EXTRA_KEY) {
            Some(Value::String(tag)) => Some(tag),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Ok(Self::new(client_id, extra, Value::Object(object)))
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    /// Correlation tag, if this message answers a request.
    pub fn tag(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    /// The `@type` of the payload.
    pub fn kind(&self) -> Option<&str> {
        self.payload.get(TYPE_KEY).and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.kind() == Some("error")
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decode the payload into a typed object.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        T::deserialize(&self.payload).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: self.payload.to_string(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
