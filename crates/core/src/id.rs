// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for workspaces, sessions, and worktrees.
//!
//! Workspace and session ids are a single-letter prefix plus 24 lowercase
//! hex characters (`w[0-9a-f]{24}`, `s[0-9a-f]{24}`). Worktree ids are
//! either the literal `main` or 16 lowercase hex characters — see
//! [`WorktreeId`].

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

const HEX_ALPHABET: [char; 16] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f'];

fn random_hex(len: usize) -> String {
    nanoid::nanoid!(len, &HEX_ALPHABET)
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

macro_rules! prefixed_id {
    ($name:ident, $prefix:expr, $len:expr) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(SmolStr);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(SmolStr::new(format!("{}{}", $prefix, random_hex($len))))
            }

            /// Validate and wrap an existing id string.
            pub fn parse(s: impl AsRef<str>) -> Result<Self, InvalidId> {
                let s = s.as_ref();
                let body = s
                    .strip_prefix($prefix)
                    .ok_or_else(|| InvalidId(s.to_string()))?;
                if body.len() == $len && is_lower_hex(body) {
                    Ok(Self(SmolStr::new(s)))
                } else {
                    Err(InvalidId(s.to_string()))
                }
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

prefixed_id!(WorkspaceId, "w", 24);
prefixed_id!(SessionId, "s", 24);

/// A worktree id: either the literal `main`, or 16 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorktreeId(SmolStr);

impl WorktreeId {
    pub const MAIN: &'static str = "main";

    pub fn main() -> Self {
        Self(SmolStr::new(Self::MAIN))
    }

    pub fn generate() -> Self {
        Self(SmolStr::new(random_hex(16)))
    }

    pub fn parse(s: impl AsRef<str>) -> Result<Self, InvalidId> {
        let s = s.as_ref();
        if s == Self::MAIN || (s.len() == 16 && is_lower_hex(s)) {
            Ok(Self(SmolStr::new(s)))
        } else {
            Err(InvalidId(s.to_string()))
        }
    }

    pub fn is_main(&self) -> bool {
        self.0.as_str() == Self::MAIN
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Resolve the `null|"main"` convention used by `appendMessage` (spec §4.7)
    /// into a concrete worktree id.
    pub fn resolve(worktree_id: Option<&str>) -> Result<Self, InvalidId> {
        match worktree_id {
            None => Ok(Self::main()),
            Some(id) => Self::parse(id),
        }
    }
}

impl fmt::Display for WorktreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl fmt::Debug for WorktreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorktreeId({:?})", self.0.as_str())
    }
}

impl std::str::FromStr for WorktreeId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid id: {0:?}")]
pub struct InvalidId(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_id_round_trips() {
        let id = WorkspaceId::generate();
        assert!(id.as_str().starts_with('w'));
        assert_eq!(id.as_str().len(), 25);
        let parsed = WorkspaceId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn workspace_id_rejects_wrong_prefix() {
        assert!(WorkspaceId::parse("s000000000000000000000000").is_err());
    }

    #[test]
    fn session_id_rejects_uppercase_hex() {
        assert!(SessionId::parse(format!("s{}", "A".repeat(24))).is_err());
    }

    #[test]
    fn worktree_id_accepts_main_or_16_hex() {
        assert!(WorktreeId::parse("main").unwrap().is_main());
        assert!(WorktreeId::parse("0123456789abcdef").is_ok());
        assert!(WorktreeId::parse("0123456789abcde").is_err());
    }

    #[test]
    fn worktree_id_resolve_null_is_main() {
        assert_eq!(WorktreeId::resolve(None).unwrap(), WorktreeId::main());
        assert_eq!(WorktreeId::resolve(Some("main")).unwrap(), WorktreeId::main());
    }
}
