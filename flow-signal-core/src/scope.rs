//! Signal scope resolution
//!
//! Turns a declared scope into the dedup key firings are recorded under.
//! Firing uses the typed definition; subscription checks use the parsed
//! configuration. Both go through [`normalize`] so they land on the same key.

use serde::Serialize;
use std::fmt;

use crate::types::*;

/// Dedup domain of a signal firing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum ScopeKey {
    Global,
    ProcessInstance(String),
}

impl ScopeKey {
    pub fn as_str(&self) -> &str {
        match self {
            ScopeKey::Global => SCOPE_GLOBAL,
            ScopeKey::ProcessInstance(id) => id,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ScopeKey> for String {
    fn from(key: ScopeKey) -> Self {
        key.as_str().to_string()
    }
}

/// `ProcessInstance` maps to the execution's instance id; anything else,
/// including no scope at all, is global. An execution with an empty instance
/// id cannot form an instance key and falls back to global.
pub fn normalize(execution: &dyn ActivityExecution, scope: Option<SignalScope>) -> ScopeKey {
    match scope {
        Some(SignalScope::ProcessInstance) => {
            let id = execution.process_instance_id();
            if id.is_empty() {
                tracing::warn!(
                    activity = execution.activity_id(),
                    "instance-scoped signal on an execution without a process instance id, using global scope"
                );
                return ScopeKey::Global;
            }
            ScopeKey::ProcessInstance(id.to_string())
        }
        Some(SignalScope::Global) | None => ScopeKey::Global,
    }
}

pub fn resolve_from_definition(
    execution: &dyn ActivityExecution,
    definition: &SignalDefinition,
) -> ScopeKey {
    normalize(execution, Some(definition.scope))
}

/// Unreadable or unknown scope configuration resolves to global.
pub fn resolve_from_subscription(
    execution: &dyn ActivityExecution,
    subscription: &EventSubscription,
) -> ScopeKey {
    normalize(execution, subscription.configured_scope().declared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryExecution;

    #[test]
    fn test_definition_scopes() {
        let execution = MemoryExecution::new("PI-100", "throw1");
        assert_eq!(
            resolve_from_definition(&execution, &SignalDefinition::process_instance("sig1")),
            ScopeKey::ProcessInstance("PI-100".to_string())
        );
        assert_eq!(
            resolve_from_definition(&execution, &SignalDefinition::global("sig1")),
            ScopeKey::Global
        );
    }

    #[test]
    fn test_definition_and_subscription_agree() {
        let execution = MemoryExecution::new("PI-100", "catch1");
        let from_definition =
            resolve_from_definition(&execution, &SignalDefinition::process_instance("sig1"));
        let subscription =
            EventSubscription::signal("sig1").with_configuration(r#"{"scope": "processInstance"}"#);
        let from_subscription = resolve_from_subscription(&execution, &subscription);

        assert_eq!(from_definition, from_subscription);
        assert_eq!(from_subscription.as_str(), "PI-100");
    }

    #[test]
    fn test_subscription_fallbacks_are_global() {
        let execution = MemoryExecution::new("PI-100", "catch1");
        let cases = [
            EventSubscription::signal("sig1"),
            EventSubscription::signal("sig1").with_configuration("{}"),
            EventSubscription::signal("sig1").with_configuration(r#"{"scope": ["processInstance"]}"#),
            EventSubscription::signal("sig1").with_configuration(r#""scope" = processInstance"#),
            EventSubscription::signal("sig1").with_configuration(r#"{"scope":"PROCESSINSTANCE"}"#),
        ];
        for subscription in &cases {
            assert_eq!(
                resolve_from_subscription(&execution, subscription),
                ScopeKey::Global,
                "{:?}",
                subscription.configuration
            );
        }
    }

    #[test]
    fn test_empty_instance_id_falls_back_to_global() {
        let execution = MemoryExecution::new("", "throw1");
        let key = resolve_from_definition(&execution, &SignalDefinition::process_instance("sig1"));
        assert_eq!(key, ScopeKey::Global);
        assert!(!key.as_str().is_empty());
    }

    #[test]
    fn test_global_marker() {
        assert_eq!(ScopeKey::Global.to_string(), SCOPE_GLOBAL);
        assert_eq!(
            serde_json::to_string(&ScopeKey::ProcessInstance("PI-7".into())).unwrap(),
            r#""PI-7""#
        );
    }
}
