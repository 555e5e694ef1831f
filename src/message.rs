use std::fmt;
use std::time::SystemTime;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Store-assigned identifier of an outbox message.
///
/// Ids grow monotonically with insertion order; the dispatcher claims and
/// publishes messages in ascending id order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        MessageId(id)
    }
}

/// A message as handed to the store, before it has an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl NewMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        NewMessage {
            subject: subject.into(),
            payload: payload.into(),
        }
    }

    /// Create a message with a bitcode (binary) encoded payload.
    pub fn encode<T: Serialize>(
        subject: impl Into<String>,
        payload: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(payload)?;
        Ok(Self::new(subject, bytes))
    }

    /// Create a message with a JSON encoded payload.
    pub fn json<T: Serialize>(
        subject: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self::new(subject, bytes))
    }
}

/// A persisted outbox message.
///
/// `sent_at == None` means the message is still pending delivery. Once set,
/// `sent_at` is never cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub subject: String,
    #[serde(with = "payload_serde")]
    pub payload: Vec<u8>,
    pub created_at: SystemTime,
    pub sent_at: Option<SystemTime>,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.sent_at.is_none()
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode a payload written with [`NewMessage::encode`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }

    /// Decode a payload written with [`NewMessage::json`].
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
