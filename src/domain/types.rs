//! Core type definitions shared across the portal

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Name of the verifier used when a submission names none.
pub const DEFAULT_VERIFIER: &str = "verifier.ton.org";

/// Registry key of a verifier (lowercase hex SHA-256 of its name)
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifierId(pub String);

impl VerifierId {
    /// Derive the registry id from a verifier name.
    pub fn from_name(name: &str) -> Self {
        Self(hex::encode(Sha256::digest(name.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VerifierId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Known facts about the contract being verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractContext {
    /// User-facing contract address
    pub address: String,
    /// Base64 hash of the code cell to compile against (library hash for
    /// library contracts). `None` until the chain read completes.
    pub code_hash: Option<String>,
}

impl ContractContext {
    pub fn new(address: impl Into<String>, code_hash: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            code_hash: Some(code_hash.into()),
        }
    }
}

/// Serde module for raw byte payloads exchanged with verifier backends.
///
/// Encodes as the Node buffer JSON shape `{"type":"Buffer","data":[..]}`.
/// Decoding accepts that shape, a base64 string, or a plain byte array.
pub mod buffer_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct BufferOut<'a> {
        #[serde(rename = "type")]
        kind: &'static str,
        data: &'a [u8],
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BufferIn {
        Node {
            #[serde(rename = "type")]
            _kind: String,
            data: Vec<u8>,
        },
        Base64(String),
        Raw(Vec<u8>),
    }

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BufferOut {
            kind: "Buffer",
            data: bytes,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match BufferIn::deserialize(deserializer)? {
            BufferIn::Node { data, .. } | BufferIn::Raw(data) => Ok(data),
            BufferIn::Base64(s) => base64::engine::general_purpose::STANDARD
                .decode(s.trim())
                .map_err(serde::de::Error::custom),
        }
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match bytes {
                Some(b) => super::serialize(b, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<BufferIn>::deserialize(deserializer)?
                .map(|inner| match inner {
                    BufferIn::Node { data, .. } | BufferIn::Raw(data) => Ok(data),
                    BufferIn::Base64(s) => base64::engine::general_purpose::STANDARD
                        .decode(s.trim())
                        .map_err(serde::de::Error::custom),
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "buffer_bytes")]
        cell: Vec<u8>,
        #[serde(default, with = "buffer_bytes::option")]
        maybe: Option<Vec<u8>>,
    }

    #[test]
    fn test_verifier_id_is_sha256_hex() {
        let id = VerifierId::from_name("verifier.ton.org");
        assert_eq!(id.as_str().len(), 64);
        assert_eq!(id, VerifierId::from_name("verifier.ton.org"));
        assert_ne!(id, VerifierId::from_name("orbs.com"));
    }

    #[test]
    fn test_buffer_bytes_encodes_node_shape() {
        let w = Wrapper {
            cell: vec![1, 2, 3],
            maybe: None,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["cell"]["type"], "Buffer");
        assert_eq!(json["cell"]["data"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_buffer_bytes_accepts_all_shapes() {
        let node: Wrapper =
            serde_json::from_str(r#"{"cell":{"type":"Buffer","data":[9,8]}}"#).unwrap();
        assert_eq!(node.cell, vec![9, 8]);
        assert_eq!(node.maybe, None);

        let b64: Wrapper = serde_json::from_str(r#"{"cell":"CQg=","maybe":[7]}"#).unwrap();
        assert_eq!(b64.cell, vec![9, 8]);
        assert_eq!(b64.maybe, Some(vec![7]));
    }
}
