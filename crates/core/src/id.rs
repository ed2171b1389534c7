// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declares a newtype wrapping a `String` identifier with the usual
/// `Display`/`FromStr`/serde plumbing. Mirrors the identifiers used
/// throughout this workspace: opaque, cheaply cloned, never parsed for
/// structure beyond "non-empty".
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(VolumeId);
define_id!(AttachmentArn);
define_id!(ClusterArn);
define_id!(ContainerInstanceArn);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = VolumeId::new("vol-0123456789abcdef0");
        let parsed: VolumeId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.to_string(), "vol-0123456789abcdef0");
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = VolumeId::new("vol-abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"vol-abc\"");
    }
}
