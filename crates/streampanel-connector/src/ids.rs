//! ID types
//!
//! Newtype wrappers for type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::Utc;

macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap an existing numeric identifier.
            #[must_use]
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner numeric value.
            #[must_use]
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id! {
    /// Unique identifier for a subscription user record.
    UserId
}

numeric_id! {
    /// Unique identifier for a Plex media server.
    ServerId
}

numeric_id! {
    /// Unique identifier for a Plex or IPTV package.
    PackageId
}

numeric_id! {
    /// Unique identifier for an IPTV panel.
    PanelId
}

/// Unique identifier for a provisioning job.
///
/// Generated at job creation from the current millisecond timestamp and the
/// owning user id. Opaque to callers; no global counter is needed because a
/// user never has two jobs created within the same millisecond (and the
/// registry regenerates on the rare collision).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a new job id for the given user at the current time.
    #[must_use]
    pub fn generate(user_id: UserId) -> Self {
        Self::from_parts(Utc::now().timestamp_millis(), user_id)
    }

    /// Build a job id from an explicit timestamp and user id.
    #[must_use]
    pub fn from_parts(timestamp_millis: i64, user_id: UserId) -> Self {
        Self(format!("job_{timestamp_millis}_{user_id}"))
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
