//! Log behaviour policy.
//!
//! A [`BehaviourTable`] decides, per (action, actor kind), what a logged
//! object carries: a full snapshot, a delta, both, or only its identity.
//! [`LoggingOptions`] bundles the table with the paths ignored when deciding
//! whether an update changed anything, and the object type prefix.

#![allow(clippy::result_large_err)]

use crate::attributes::get_spath;
use crate::errors::{EventLogError, Result};
use crate::event::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Paths ignored by default when checking an update for changes
pub const DEFAULT_SKIP: &[&str] = &["updated_at", "updatedAt"];

/// Actor fields that mark a user actor and are never logged
const ACTOR_PROVIDER_DATA: &str = "providerData";
const ACTOR_API_KEY: &str = "apikey";

/// What a logged object carries besides its identity paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Behaviour {
    Snapshot,
    Delta,
    SnapshotAndDelta,
    Id,
}

impl Behaviour {
    pub const ALL: [Behaviour; 4] = [
        Behaviour::Snapshot,
        Behaviour::Delta,
        Behaviour::SnapshotAndDelta,
        Behaviour::Id,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Behaviour::Snapshot => "snapshot",
            Behaviour::Delta => "delta",
            Behaviour::SnapshotAndDelta => "snapshotAndDelta",
            Behaviour::Id => "id",
        }
    }
}

impl fmt::Display for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Behaviour {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Behaviour::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| format!("unknown log behaviour '{}'", s))
    }
}

/// Who performed an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    User,
    System,
}

impl ActorKind {
    pub const ALL: [ActorKind; 2] = [ActorKind::User, ActorKind::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::System => "system",
        }
    }
}

/// Classify an actor and strip its credentials.
///
/// An actor carrying non-empty `providerData` is a user; `providerData` and
/// `apikey` are removed before it is logged. Anything else, including no
/// actor at all, is the system.
pub fn sanitize_actor(actor: Option<Value>) -> (Option<Value>, ActorKind) {
    let Some(mut actor) = actor else {
        return (None, ActorKind::System);
    };
    let is_user = actor
        .get(ACTOR_PROVIDER_DATA)
        .is_some_and(is_truthy);
    if is_user {
        if let Some(map) = actor.as_object_mut() {
            map.remove(ACTOR_PROVIDER_DATA);
            map.remove(ACTOR_API_KEY);
        }
        return (Some(actor), ActorKind::User);
    }
    (Some(actor), ActorKind::System)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// How unknown behaviour names are handled when declaring a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Fall back to the default behaviour and log an error
    #[default]
    Lenient,
    /// Reject the declaration with a configuration error
    Strict,
}

/// Behaviour per (action, actor kind)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviourTable {
    entries: BTreeMap<(Action, ActorKind), Behaviour>,
}

impl Default for BehaviourTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        for action in Action::ALL {
            for actor in ActorKind::ALL {
                entries.insert((action, actor), Self::default_for(action));
            }
        }
        Self { entries }
    }
}

impl BehaviourTable {
    /// Default behaviour for an action, independent of the actor
    pub fn default_for(action: Action) -> Behaviour {
        match action {
            Action::Created | Action::Deleted => Behaviour::Snapshot,
            Action::Updated => Behaviour::Delta,
            Action::Fetched => Behaviour::Id,
        }
    }

    /// Behaviour configured for `action` performed by `actor`
    pub fn get(&self, action: Action, actor: ActorKind) -> Behaviour {
        self.entries
            .get(&(action, actor))
            .copied()
            .unwrap_or_else(|| Self::default_for(action))
    }

    /// Set a behaviour
    pub fn set(&mut self, action: Action, actor: ActorKind, behaviour: Behaviour) {
        self.entries.insert((action, actor), behaviour);
    }

    /// Builder form of [`BehaviourTable::set`]
    pub fn with(mut self, action: Action, actor: ActorKind, behaviour: Behaviour) -> Self {
        self.set(action, actor, behaviour);
        self
    }

    /// Declare a behaviour by name.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if `name` is unknown and `strictness` is
    ///   `Strict`; in lenient mode the default is used instead
    pub fn declare(
        &mut self,
        action: Action,
        actor: ActorKind,
        name: &str,
        strictness: Strictness,
    ) -> Result<Behaviour> {
        let behaviour = match name.parse::<Behaviour>() {
            Ok(behaviour) => behaviour,
            Err(reason) => match strictness {
                Strictness::Strict => {
                    return Err(EventLogError::InvalidConfiguration { reason });
                }
                Strictness::Lenient => {
                    let fallback = Self::default_for(action);
                    tracing::error!(
                        component = module_path!(),
                        action = action.as_str(),
                        actor = actor.as_str(),
                        declared = name,
                        fallback = fallback.as_str(),
                        "Unknown log behaviour, using the default instead"
                    );
                    fallback
                }
            },
        };
        self.set(action, actor, behaviour);
        Ok(behaviour)
    }
}

/// Logging options applied by the payload composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    pub table: BehaviourTable,
    pub skip: Vec<String>,
    pub object_type_prefix: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            table: BehaviourTable::default(),
            skip: DEFAULT_SKIP.iter().map(|s| s.to_string()).collect(),
            object_type_prefix: String::new(),
        }
    }
}

impl LoggingOptions {
    /// Parse options of the shape
    /// `{"if": {"<action>": {"by": {"<actor>": "<behaviour>"}}}, "skip": [...], "objectTypePrefix": "..."}`.
    ///
    /// Missing entries keep their defaults; so does an empty `skip` or prefix.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if a field has the wrong type, or a behaviour
    ///   name is unknown under `Strictness::Strict`
    pub fn from_json(value: &Value, strictness: Strictness) -> Result<Self> {
        let mut options = Self::default();

        for action in Action::ALL {
            for actor in ActorKind::ALL {
                let spath = format!("if.{}.by.{}", action.as_str(), actor.as_str());
                match get_spath(value, &spath) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(name)) if name.is_empty() => {}
                    Some(Value::String(name)) => {
                        options.table.declare(action, actor, &name, strictness)?;
                    }
                    Some(other) => {
                        options.table.declare(action, actor, &other.to_string(), strictness)?;
                    }
                }
            }
        }

        match value.get("skip") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) if !items.is_empty() => {
                options.skip = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            EventLogError::InvalidConfiguration {
                                reason: "skip entries must be strings".to_string(),
                            }
                        })
                    })
                    .collect::<Result<_>>()?;
            }
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(EventLogError::InvalidConfiguration {
                    reason: "skip must be an array of strings".to_string(),
                })
            }
        }

        match value.get("objectTypePrefix") {
            None | Some(Value::Null) => {}
            Some(Value::String(prefix)) => options.object_type_prefix = prefix.clone(),
            Some(_) => {
                return Err(EventLogError::InvalidConfiguration {
                    reason: "objectTypePrefix must be a string".to_string(),
                })
            }
        }

        Ok(options)
    }
}
