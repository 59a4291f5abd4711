//! Role assignment: partitioning the actor pool into founders, advisors, and
//! investors.
//!
//! Roles may overlap; each list is ordered and non-empty. Unknown names in
//! role configuration are hard configuration errors, caught before any stage
//! runs. Without configuration, every actor occupies every role (the original
//! incubator behaviour).

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::actor::ActorRef;
use crate::error::{EngineError, EngineResult};

/// Optional role configuration, usually loaded from a TOML file:
///
/// ```toml
/// founders = ["openai", "anthropic"]
/// advisors = ["deepseek", "gemini", "anthropic"]
/// investors = ["openai", "deepseek"]
/// ```
///
/// A list that is absent defaults to "every actor"; a list that is present
/// but empty is a configuration error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolesConfig {
    pub founders: Option<Vec<String>>,
    pub advisors: Option<Vec<String>>,
    pub investors: Option<Vec<String>>,
}

impl RolesConfig {
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        toml::from_str(raw).map_err(|e| EngineError::Config(format!("roles config: {e}")))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// The resolved per-role actor lists for a run.
#[derive(Clone)]
pub struct RoleAssignment {
    pub founders: Vec<ActorRef>,
    pub advisors: Vec<ActorRef>,
    pub investors: Vec<ActorRef>,
}

impl std::fmt::Debug for RoleAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |actors: &[ActorRef]| actors.iter().map(|a| a.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("RoleAssignment")
            .field("founders", &names(&self.founders))
            .field("advisors", &names(&self.advisors))
            .field("investors", &names(&self.investors))
            .finish()
    }
}

impl RoleAssignment {
    /// Resolve role configuration against the actor pool. Fails fast on
    /// duplicate actor names, unknown names, or empty role lists.
    pub fn resolve(actors: &[ActorRef], config: Option<&RolesConfig>) -> EngineResult<Self> {
        if actors.is_empty() {
            return Err(EngineError::Config("no actors supplied".into()));
        }
        let mut seen = HashSet::new();
        for actor in actors {
            if !seen.insert(actor.name().to_string()) {
                return Err(EngineError::Config(format!(
                    "duplicate actor name '{}'",
                    actor.name()
                )));
            }
        }

        let default = RolesConfig::default();
        let config = config.unwrap_or(&default);
        Ok(Self {
            founders: resolve_list(actors, config.founders.as_deref(), "founders")?,
            advisors: resolve_list(actors, config.advisors.as_deref(), "advisors")?,
            investors: resolve_list(actors, config.investors.as_deref(), "investors")?,
        })
    }

    /// Advisors for one founder's plan: all role-assigned advisors except the
    /// founder itself.
    pub fn advisors_for(&self, founder: &str) -> Vec<ActorRef> {
        self.advisors
            .iter()
            .filter(|a| a.name() != founder)
            .cloned()
            .collect()
    }

    /// Investors evaluating one founder's pitch, excluding the founder.
    pub fn investors_for(&self, founder: &str) -> Vec<ActorRef> {
        self.investors
            .iter()
            .filter(|a| a.name() != founder)
            .cloned()
            .collect()
    }

    pub fn founder(&self, name: &str) -> Option<&ActorRef> {
        self.founders.iter().find(|a| a.name() == name)
    }
}

fn resolve_list(
    actors: &[ActorRef],
    names: Option<&[String]>,
    role: &str,
) -> EngineResult<Vec<ActorRef>> {
    let Some(names) = names else {
        return Ok(actors.to_vec());
    };
    if names.is_empty() {
        return Err(EngineError::Config(format!("role list '{role}' is empty")));
    }
    names
        .iter()
        .map(|name| {
            actors
                .iter()
                .find(|a| a.name() == name)
                .cloned()
                .ok_or_else(|| {
                    EngineError::Config(format!("unknown actor '{name}' in role list '{role}'"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::actor::MockActor;

    fn pool(names: &[&str]) -> Vec<ActorRef> {
        names
            .iter()
            .map(|n| Arc::new(MockActor::new(*n)) as ActorRef)
            .collect()
    }

    #[test]
    fn test_default_every_actor_every_role() {
        let actors = pool(&["a", "b", "c"]);
        let roles = RoleAssignment::resolve(&actors, None).unwrap();
        assert_eq!(roles.founders.len(), 3);
        assert_eq!(roles.advisors.len(), 3);
        assert_eq!(roles.investors.len(), 3);
    }

    #[test]
    fn test_unknown_name_is_config_error() {
        let actors = pool(&["a", "b"]);
        let config = RolesConfig {
            founders: Some(vec!["a".into(), "nobody".into()]),
            ..RolesConfig::default()
        };
        let err = RoleAssignment::resolve(&actors, Some(&config)).unwrap_err();
        assert!(err.to_string().contains("nobody"));
    }

    #[test]
    fn test_empty_list_is_config_error() {
        let actors = pool(&["a", "b"]);
        let config = RolesConfig {
            investors: Some(Vec::new()),
            ..RolesConfig::default()
        };
        let err = RoleAssignment::resolve(&actors, Some(&config)).unwrap_err();
        assert!(err.to_string().contains("investors"));
    }

    #[test]
    fn test_duplicate_actor_names_rejected() {
        let actors = pool(&["a", "a"]);
        assert!(RoleAssignment::resolve(&actors, None).is_err());
    }

    #[test]
    fn test_overlapping_roles_allowed() {
        let actors = pool(&["a", "b", "c"]);
        let config = RolesConfig {
            founders: Some(vec!["a".into()]),
            advisors: Some(vec!["a".into(), "b".into()]),
            investors: Some(vec!["b".into(), "c".into()]),
        };
        let roles = RoleAssignment::resolve(&actors, Some(&config)).unwrap();
        assert_eq!(roles.founders.len(), 1);
        // Self-exclusion: founder "a" is not among its own advisors.
        let advisors: Vec<_> = roles
            .advisors_for("a")
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(advisors, vec!["b"]);
    }

    #[test]
    fn test_roles_config_from_toml() {
        let config = RolesConfig::from_toml_str(
            r#"
            founders = ["a"]
            advisors = ["a", "b"]
            "#,
        )
        .unwrap();
        assert_eq!(config.founders.as_deref(), Some(&["a".to_string()][..]));
        assert!(config.investors.is_none());
    }
}
