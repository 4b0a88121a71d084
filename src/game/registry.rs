//! Team roster: token to team id resolution

use std::collections::HashMap;

use serde::{de, Deserialize, Deserializer, Serialize};

use super::TeamId;

/// Opaque per-team credential.
///
/// Accepted on the wire as either a JSON string or a JSON integer. A number
/// with no fractional part (`145.0`) counts as that integer.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TeamToken(String);

impl TeamToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl std::fmt::Debug for TeamToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TeamToken(..)")
    }
}

impl From<&str> for TeamToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TeamToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for TeamToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawToken {
            Int(i64),
            UInt(u64),
            Float(f64),
            Text(String),
        }

        Ok(match RawToken::deserialize(deserializer)? {
            RawToken::Int(n) => TeamToken::new(n.to_string()),
            RawToken::UInt(n) => TeamToken::new(n.to_string()),
            RawToken::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                TeamToken::new(format!("{:.0}", f))
            }
            RawToken::Float(f) => {
                return Err(de::Error::custom(format!("team token {} is not an integer", f)))
            }
            RawToken::Text(s) => TeamToken::new(s),
        })
    }
}

/// Token rejected by the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing team token")]
    MissingToken,

    #[error("Invalid team token")]
    InvalidToken,
}

/// Roster could not be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Team roster is empty")]
    EmptyRoster,

    #[error("Duplicate token for team {0}")]
    DuplicateToken(usize),

    #[error("Empty token for team {0}")]
    BlankToken(usize),
}

/// Immutable mapping from tokens to dense team ids
#[derive(Debug)]
pub struct TeamRegistry {
    teams: HashMap<TeamToken, TeamId>,
}

impl TeamRegistry {
    /// Build the registry; team ids follow roster order.
    pub fn new<I, T>(tokens: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = T>,
        T: Into<TeamToken>,
    {
        let mut teams = HashMap::new();

        for (index, token) in tokens.into_iter().enumerate() {
            let token = token.into();
            if token.as_str().is_empty() {
                return Err(RegistryError::BlankToken(index));
            }
            if teams.insert(token, TeamId(index)).is_some() {
                return Err(RegistryError::DuplicateToken(index));
            }
        }

        if teams.is_empty() {
            return Err(RegistryError::EmptyRoster);
        }

        Ok(Self { teams })
    }

    /// Resolve a token to its team
    pub fn resolve(&self, token: &TeamToken) -> Result<TeamId, AuthError> {
        self.teams.get(token).copied().ok_or(AuthError::InvalidToken)
    }

    /// Number of registered teams
    pub fn len(&self) -> usize {
        self.teams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> TeamRegistry {
        TeamRegistry::new(["145", "281", "392"]).unwrap()
    }

    #[test]
    fn test_resolve_follows_roster_order() {
        let registry = roster();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.resolve(&TeamToken::from("145")), Ok(TeamId(0)));
        assert_eq!(registry.resolve(&TeamToken::from("392")), Ok(TeamId(2)));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let registry = roster();
        assert_eq!(
            registry.resolve(&TeamToken::from("999")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_construction_errors() {
        let empty: [&str; 0] = [];
        assert_eq!(TeamRegistry::new(empty).unwrap_err(), RegistryError::EmptyRoster);
        assert_eq!(
            TeamRegistry::new(["1", "2", "1"]).unwrap_err(),
            RegistryError::DuplicateToken(2)
        );
        assert_eq!(
            TeamRegistry::new(["1", " "]).unwrap_err(),
            RegistryError::BlankToken(1)
        );
    }

    #[test]
    fn test_token_deserializes_from_number_or_string() {
        let a: TeamToken = serde_json::from_str("145").unwrap();
        let b: TeamToken = serde_json::from_str("\"145\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(roster().resolve(&a), Ok(TeamId(0)));
    }

    #[test]
    fn test_token_accepts_integral_float_and_large_integer() {
        let a: TeamToken = serde_json::from_str("145.0").unwrap();
        assert_eq!(a, TeamToken::from("145"));
        assert_eq!(roster().resolve(&a), Ok(TeamId(0)));

        let big: TeamToken = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(big.as_str(), "18446744073709551615");

        assert!(serde_json::from_str::<TeamToken>("145.5").is_err());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = TeamToken::from("secret");
        assert!(!format!("{:?}", token).contains("secret"));
    }
}
