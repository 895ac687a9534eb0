use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier shape on the wire. Servers hand out either integers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// Equality and hashing look only at the textual form; whether the
        /// server sent a number or a string is remembered so the id goes back
        /// out the way it came in.
        #[derive(Debug, Clone)]
        pub struct $name {
            raw: String,
            numeric: bool,
        }

        impl $name {
            /// Build an id from user input. All-digit input is treated as a
            /// numeric id.
            pub fn parse(raw: &str) -> Self {
                let raw = raw.trim();
                $name {
                    raw: raw.to_string(),
                    numeric: !raw.is_empty() && raw.parse::<i64>().is_ok(),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.raw
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.raw == other.raw
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.raw.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                $name::parse(raw)
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                $name {
                    raw: n.to_string(),
                    numeric: true,
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.raw.parse::<i64>() {
                    Ok(n) if self.numeric => serializer.serialize_i64(n),
                    _ => serializer.serialize_str(&self.raw),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match RawId::deserialize(deserializer)? {
                    RawId::Number(n) => $name::from(n),
                    RawId::Text(raw) => $name { raw, numeric: false },
                })
            }
        }
    };
}

opaque_id!(
    /// Server-assigned project identifier.
    ProjectId
);
opaque_id!(
    /// Server-assigned task identifier.
    TaskId
);
opaque_id!(
    /// Server-assigned card identifier.
    CardId
);
opaque_id!(
    /// Server-assigned user identifier.
    UserId
);
opaque_id!(
    /// Server-assigned comment identifier.
    CommentId
);
