//! Agent identities and the names derived from them.
//!
//! An agent identity is `agent-` followed by exactly eight lowercase hex
//! characters, e.g. `agent-1a2b3c4d`. Identities come from the random bits of
//! a UUID v4, so two agents never pick the same one in practice; there is no
//! registry and no uniqueness check.
//!
//! Everything else about an agent is derived from its identity:
//! - worktree directory: `<repo-root>/.work/<id>` (see [`crate::worktree`])
//! - branch: `feat/<id>`

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Prefix shared by every agent identity.
pub const AGENT_PREFIX: &str = "agent-";

/// Prefix of every agent branch.
pub const BRANCH_PREFIX: &str = "feat/";

const HEX_LEN: usize = 8;

/// Unique identifier of one agent and its worktree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(String);

impl AgentId {
    /// Generate a fresh identity from a random UUID.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{AGENT_PREFIX}{}", &hex[..HEX_LEN]))
    }

    /// Parse an identity, returning `None` for anything not shaped like
    /// `agent-xxxxxxxx`.
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.strip_prefix(AGENT_PREFIX)?;
        let valid = hex.len() == HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The branch this agent works on: `feat/<id>`.
    pub fn branch_name(&self) -> String {
        format!("{BRANCH_PREFIX}{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a valid agent identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid agent ID '{0}' (expected agent-<8 lowercase hex chars>, e.g. agent-1a2b3c4d)")]
pub struct InvalidAgentId(pub String);

impl FromStr for AgentId {
    type Err = InvalidAgentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidAgentId(s.to_string()))
    }
}

impl Serialize for AgentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_format() {
        let id = AgentId::generate();
        let hex = id.as_str().strip_prefix("agent-").unwrap();
        assert_eq!(hex.len(), 8);
        assert!(
            hex.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_generate_is_unique() {
        let ids: HashSet<AgentId> = (0..1000).map(|_| AgentId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_generated_ids_parse() {
        let id = AgentId::generate();
        assert_eq!(AgentId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "agent-",
            "agent-1a2b3c4",
            "agent-1a2b3c4d5",
            "agent-1A2B3C4D",
            "agent-1a2b3c4g",
            "agent_1a2b3c4d",
            "feat/agent-1a2b3c4d",
            "../agent-1a2b3c4d",
        ] {
            assert!(AgentId::parse(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_branch_name() {
        let id: AgentId = "agent-1a2b3c4d".parse().unwrap();
        assert_eq!(id.branch_name(), "feat/agent-1a2b3c4d");
        assert_eq!(id.to_string(), "agent-1a2b3c4d");
    }

    #[test]
    fn test_from_str_error_message() {
        let err = "bogus".parse::<AgentId>().unwrap_err();
        assert_eq!(err, InvalidAgentId("bogus".to_string()));
        assert!(err.to_string().contains("agent-1a2b3c4d"));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut ids = vec![
            AgentId::parse("agent-ffffffff").unwrap(),
            AgentId::parse("agent-00000000").unwrap(),
            AgentId::parse("agent-7a000000").unwrap(),
        ];
        ids.sort();
        let names: Vec<_> = ids.iter().map(AgentId::as_str).collect();
        assert_eq!(
            names,
            ["agent-00000000", "agent-7a000000", "agent-ffffffff"]
        );
    }
}
