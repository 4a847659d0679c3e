//! Repository and metadata-role identifiers
//!
//! Two independently signed repositories (director, config) each carry the
//! four chained metadata roles (root, timestamp, snapshot, targets).

use std::fmt;
use std::str::FromStr;

/// Which of the two signed metadata repositories a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Repository {
    /// Assigns which configurations apply to this host.
    Director,
    /// Source of truth for configuration content integrity.
    Config,
}

impl Repository {
    pub const fn variants() -> &'static [Repository] {
        &[Self::Director, Self::Config]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level metadata roles, verified in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Root,
    Timestamp,
    Snapshot,
    Targets,
}

/// Error parsing a role from string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseRoleError;

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metadata role")
    }
}

impl std::error::Error for ParseRoleError {}

impl Role {
    pub const fn variants() -> &'static [Role] {
        &[Self::Root, Self::Timestamp, Self::Snapshot, Self::Targets]
    }

    /// Role name as it appears in `_type` and in root role tables.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Timestamp => "timestamp",
            Self::Snapshot => "snapshot",
            Self::Targets => "targets",
        }
    }

    /// Name of the current document for this role, e.g. `timestamp.json`.
    pub const fn meta_name(&self) -> &'static str {
        match self {
            Self::Root => "root.json",
            Self::Timestamp => "timestamp.json",
            Self::Snapshot => "snapshot.json",
            Self::Targets => "targets.json",
        }
    }
}

/// Name under which a historical root document is kept, e.g. `3.root.json`.
pub fn versioned_root_name(version: u64) -> String {
    format!("{}.root.json", version)
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Self::Root),
            "timestamp" => Ok(Self::Timestamp),
            "snapshot" => Ok(Self::Snapshot),
            "targets" => Ok(Self::Targets),
            _ => Err(ParseRoleError),
        }
    }
}
