//! Wire shapes: the JSON bodies exchanged between client and server.
//!
//! Field names are the wire contract. Byte fields travel as standard
//! base64 strings; decoders reject malformed encodings.

use serde::{Deserialize, Serialize};

/// Serde adapter for byte fields encoded as standard base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// The outer transport envelope: a nonce label and a sealed payload.
///
/// `id` is the Base58 encoding of the nonce used to seal `contents`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Base58-encoded nonce.
    pub id: String,
    /// PK-box ciphertext.
    #[serde(with = "base64_bytes")]
    pub contents: Vec<u8>,
}

/// A message submitted for delivery, addressed to a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Base58-encoded nonce that sealed `contents` to the recipient.
    pub id: String,
    /// End-to-end ciphertext; opaque to the server.
    #[serde(with = "base64_bytes")]
    pub contents: Vec<u8>,
    /// Base58-encoded recipient public key. Omitted on the wire when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipient: String,
}

/// A drained inbox message, carrying its original sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopMessage {
    /// Base58-encoded nonce that sealed `contents`.
    pub id: String,
    /// End-to-end ciphertext.
    #[serde(with = "base64_bytes")]
    pub contents: Vec<u8>,
    /// Base58-encoded sender public key. Omitted on the wire when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,
}

/// Acknowledgement for one unique message id in a push batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    /// The message id being acknowledged.
    pub id: String,
    /// Whether the message was stored.
    pub ok: bool,
}

/// Response to an unauthenticated public-key fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// Base58-encoded server public key.
    #[serde(rename = "public-key")]
    pub public_key: String,
}

/// A wire-level error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// HTTP-style error code. Omitted on the wire when zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,
    /// Human-readable detail. Omitted on the wire when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Always `false` in an error response.
    pub ok: bool,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl WireError {
    /// Create an error response with a code and no message.
    pub fn from_code(code: u16) -> Self {
        Self {
            code,
            message: String::new(),
            ok: false,
        }
    }

    /// Create an error response with a code and a message.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ok: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_shape() {
        let msg = Message {
            id: "9Ajh".into(),
            contents: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"id":"9Ajh","contents":"AQID"}"#);

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_contents_rejects_bad_base64() {
        let result = serde_json::from_str::<Message>(r#"{"id":"x","contents":"!!not-base64!!"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_push_message_omits_empty_recipient() {
        let msg = PushMessage {
            id: "n1".into(),
            contents: vec![0xff],
            recipient: String::new(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("recipient"));

        // And a missing recipient parses back as empty
        let parsed: PushMessage = serde_json::from_str(&json).unwrap();
        assert!(parsed.recipient.is_empty());
    }

    #[test]
    fn test_pop_message_carries_sender() {
        let msg = PopMessage {
            id: "n1".into(),
            contents: vec![0xaa, 0xbb],
            sender: "4fE2".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""sender":"4fE2""#));
    }

    #[test]
    fn test_public_key_response_field_name() {
        let resp = PublicKeyResponse {
            public_key: "Gq4f".into(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"public-key":"Gq4f"}"#);
    }

    #[test]
    fn test_wire_error_shape() {
        let err = WireError::from_code(400);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"code":400,"ok":false}"#);

        let err = WireError::new(500, "storage failure");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""message":"storage failure""#));
        assert!(json.contains(r#""ok":false"#));
    }

    #[test]
    fn test_push_receipt_roundtrip() {
        let receipt = PushReceipt {
            id: "abc".into(),
            ok: true,
        };
        let json = serde_json::to_string(&receipt).unwrap();
        assert_eq!(json, r#"{"id":"abc","ok":true}"#);
        let parsed: PushReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, receipt);
    }
}
