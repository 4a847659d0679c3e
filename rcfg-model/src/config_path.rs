//! Structured ownership metadata encoded in target paths.
//!
//! - `datadog/<org_id>/<product>/<config_id>/<name>`: customer configuration
//!   owned by an organization.
//! - `employee/<product>/<config_id>/<name>`: internally-originated
//!   configuration, exempt from organization ownership checks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static DATADOG_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^datadog/(\d+)/([^/]+)/([^/]+)/([^/]+)$").expect("valid regex"));
static EMPLOYEE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^employee/([^/]+)/([^/]+)/([^/]+)$").expect("valid regex"));

/// Who authored a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Customer configuration, tied to an organization ID.
    Datadog,
    /// Internally-originated configuration.
    Employee,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datadog => f.write_str("datadog"),
            Self::Employee => f.write_str("employee"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    pub source: Source,
    /// Owning organization; `None` for employee paths.
    pub org_id: Option<u64>,
    pub product: String,
    pub config_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigPathError {
    #[error("config file path '{0}' has wrong format")]
    Format(String),

    #[error("could not parse orgID '{org_id}' in config file path '{path}'")]
    OrgId { path: String, org_id: String },
}

impl ConfigPath {
    pub fn parse(path: &str) -> Result<Self, ConfigPathError> {
        if let Some(caps) = DATADOG_PATH.captures(path) {
            let org_id = caps[1].parse::<u64>().map_err(|_| ConfigPathError::OrgId {
                path: path.to_string(),
                org_id: caps[1].to_string(),
            })?;
            return Ok(Self {
                source: Source::Datadog,
                org_id: Some(org_id),
                product: caps[2].to_string(),
                config_id: caps[3].to_string(),
                name: caps[4].to_string(),
            });
        }
        if let Some(caps) = EMPLOYEE_PATH.captures(path) {
            return Ok(Self {
                source: Source::Employee,
                org_id: None,
                product: caps[1].to_string(),
                config_id: caps[2].to_string(),
                name: caps[3].to_string(),
            });
        }
        Err(ConfigPathError::Format(path.to_string()))
    }

    /// Internally-originated paths skip the organization ownership check.
    pub fn is_exempt_from_org_check(&self) -> bool {
        self.source == Source::Employee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datadog_path() {
        let p = ConfigPath::parse("datadog/2/APM_SAMPLING/abc-123/config").unwrap();
        assert_eq!(p.source, Source::Datadog);
        assert_eq!(p.org_id, Some(2));
        assert_eq!(p.product, "APM_SAMPLING");
        assert_eq!(p.config_id, "abc-123");
        assert_eq!(p.name, "config");
        assert!(!p.is_exempt_from_org_check());
    }

    #[test]
    fn test_parse_employee_path() {
        let p = ConfigPath::parse("employee/ASM_DD/rules/rules.json").unwrap();
        assert_eq!(p.source, Source::Employee);
        assert_eq!(p.org_id, None);
        assert!(p.is_exempt_from_org_check());
    }

    #[test]
    fn test_reject_malformed_paths() {
        assert!(matches!(ConfigPath::parse("cfg/feature-a"), Err(ConfigPathError::Format(_))));
        assert!(ConfigPath::parse("datadog/x/P/id/name").is_err());
        assert!(ConfigPath::parse("datadog/2/P/id").is_err());
        assert!(matches!(
            ConfigPath::parse("datadog/99999999999999999999999/P/id/name"),
            Err(ConfigPathError::OrgId { .. })
        ));
    }
}
