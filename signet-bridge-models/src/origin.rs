use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Raised when a configured URL does not carry a usable web origin.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid origin '{raw}': {reason}")]
pub struct InvalidOrigin {
    pub raw: String,
    pub reason: String,
}

/// Exact-match web origin (`scheme://host[:port]`, default ports elided).
///
/// Origin equality is the sole authentication mechanism on the bridge: an
/// inbound message is dispatched only if its sender origin compares equal to
/// the origin the channel was bound with, and an outbound post names the
/// expected peer origin as its delivery restriction (never a wildcard).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    /// Derive the origin of an absolute URL, discarding path/query/fragment.
    pub fn parse(raw: &str) -> Result<Self, InvalidOrigin> {
        let url = Url::parse(raw).map_err(|e| InvalidOrigin {
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(InvalidOrigin {
                raw: raw.to_string(),
                reason: "URL has an opaque origin".to_string(),
            });
        }
        Ok(Self(origin.ascii_serialization()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Origin {
    type Err = InvalidOrigin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Origin::parse(&raw).map_err(de::Error::custom)
    }
}
