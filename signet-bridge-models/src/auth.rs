use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Login status reported by the auth collaborator.
///
/// Both role drivers stay idle until `LoggedIn` is observed; every other
/// status gates the protocol from starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// Auth collaborator is still determining the session.
    #[default]
    Initializing,
    /// A user session is active; the protocol may start.
    LoggedIn,
    /// No user session; the protocol must not start.
    LoggedOut,
    /// A login attempt is in progress.
    InProgress,
}

impl AuthStatus {
    /// Return the stable string representation (kebab-case).
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Initializing => "initializing",
            AuthStatus::LoggedIn => "logged-in",
            AuthStatus::LoggedOut => "logged-out",
            AuthStatus::InProgress => "in-progress",
        }
    }
}

impl Display for AuthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AuthStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuthStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "initializing" => Ok(AuthStatus::Initializing),
            "logged-in" => Ok(AuthStatus::LoggedIn),
            "logged-out" => Ok(AuthStatus::LoggedOut),
            "in-progress" => Ok(AuthStatus::InProgress),
            other => Err(de::Error::custom(format!("unknown auth status '{other}'"))),
        }
    }
}
