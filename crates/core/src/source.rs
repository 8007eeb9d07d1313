use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a property value came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceLabel {
    /// Process-level properties
    Sys,
    /// Operating system environment variables
    Env,
    /// Override files and programmatic override properties
    Override,
    /// A file location such as `classpath:application.properties`
    Location(String),
    /// Label supplied by a custom lookup listener
    Custom(String),
    /// Initial properties, the last-resort fallback
    Initial,
}

/// Coarse classification of a label, used by the precedence table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Sys,
    Env,
    Override,
    Location,
    Custom,
    Initial,
}

const CUSTOM_PREFIX: &str = "custom:";

/// Precedence from highest to lowest
pub const DEFAULT_PRECEDENCE: &[SourceKind] = &[
    SourceKind::Sys,
    SourceKind::Env,
    SourceKind::Override,
    SourceKind::Location,
    SourceKind::Custom,
    SourceKind::Initial,
];

impl SourceLabel {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Sys => SourceKind::Sys,
            Self::Env => SourceKind::Env,
            Self::Override => SourceKind::Override,
            Self::Location(_) => SourceKind::Location,
            Self::Custom(_) => SourceKind::Custom,
            Self::Initial => SourceKind::Initial,
        }
    }

    /// Position in `precedence`; smaller wins. Kinds missing from the table rank last.
    pub fn rank(&self, precedence: &[SourceKind]) -> usize {
        let kind = self.kind();
        precedence
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(precedence.len())
    }

    /// Parse the textual form produced by `Display`
    pub fn parse(label: &str) -> Self {
        match label {
            "SYS" => Self::Sys,
            "ENV" => Self::Env,
            "override" => Self::Override,
            "initial" => Self::Initial,
            other => match other.strip_prefix(CUSTOM_PREFIX) {
                Some(custom) => Self::Custom(custom.to_string()),
                None => Self::Location(other.to_string()),
            },
        }
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sys => write!(f, "SYS"),
            Self::Env => write!(f, "ENV"),
            Self::Override => write!(f, "override"),
            Self::Initial => write!(f, "initial"),
            Self::Location(location) => write!(f, "{location}"),
            Self::Custom(label) => write!(f, "{CUSTOM_PREFIX}{label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_precedence_order() {
        let sys = SourceLabel::Sys.rank(DEFAULT_PRECEDENCE);
        let env = SourceLabel::Env.rank(DEFAULT_PRECEDENCE);
        let over = SourceLabel::Override.rank(DEFAULT_PRECEDENCE);
        let file = SourceLabel::Location("application.properties".into()).rank(DEFAULT_PRECEDENCE);
        let initial = SourceLabel::Initial.rank(DEFAULT_PRECEDENCE);
        assert!(sys < env && env < over && over < file && file < initial);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(SourceLabel::Sys.to_string(), "SYS");
        assert_eq!(SourceLabel::Env.to_string(), "ENV");
        assert_eq!(SourceLabel::parse("override"), SourceLabel::Override);
        assert_eq!(
            SourceLabel::parse("file:/etc/app.properties"),
            SourceLabel::Location("file:/etc/app.properties".into())
        );

        let vault = SourceLabel::Custom("vault-lookup".into());
        assert_eq!(vault.to_string(), "custom:vault-lookup");
        assert_eq!(SourceLabel::parse(&vault.to_string()), vault);
    }

    #[test]
    fn test_custom_precedence_table() {
        let env_first = [SourceKind::Env, SourceKind::Sys];
        assert!(SourceLabel::Env.rank(&env_first) < SourceLabel::Sys.rank(&env_first));
        assert_eq!(SourceLabel::Initial.rank(&env_first), 2);
    }
}
