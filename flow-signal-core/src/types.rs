use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

// ─── Scope markers ────────────────────────────────────────────

/// Wire name of the global signal scope. Also the dedup key for global firings.
pub const SCOPE_GLOBAL: &str = "global";

/// Wire name of the process-instance signal scope.
pub const SCOPE_PROCESS_INSTANCE: &str = "processInstance";

/// Tolerant reader for a `"scope": "<value>"` pair embedded anywhere in a blob.
static SCOPE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""scope"\s*:\s*"([^"]+)""#).unwrap());

/// Declared reach of a signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalScope {
    #[default]
    Global,
    ProcessInstance,
}

impl SignalScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalScope::Global => SCOPE_GLOBAL,
            SignalScope::ProcessInstance => SCOPE_PROCESS_INSTANCE,
        }
    }

    /// Exact, case-sensitive match on the wire names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            SCOPE_GLOBAL => Some(SignalScope::Global),
            SCOPE_PROCESS_INSTANCE => Some(SignalScope::ProcessInstance),
            _ => None,
        }
    }
}

impl fmt::Display for SignalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Signal definition ────────────────────────────────────────

/// A signal declared in a process definition. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDefinition {
    pub name: String,
    #[serde(default)]
    pub scope: SignalScope,
}

impl SignalDefinition {
    pub fn new(name: impl Into<String>, scope: SignalScope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, SignalScope::Global)
    }

    pub fn process_instance(name: impl Into<String>) -> Self {
        Self::new(name, SignalScope::ProcessInstance)
    }
}

// ─── Event subscriptions ──────────────────────────────────────

/// Event-type tag of a subscription. Only `Signal` takes part in dedup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Signal,
    Message,
    Compensate,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Signal => "signal",
            EventType::Message => "message",
            EventType::Compensate => "compensate",
            EventType::Other(tag) => tag,
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, EventType::Signal)
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "signal" => EventType::Signal,
            "message" => EventType::Message,
            "compensate" => EventType::Compensate,
            _ => EventType::Other(tag),
        }
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        EventType::from(tag.to_string())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

/// What a subscription's configuration says about scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfiguredScope {
    /// No scope field present.
    Absent,
    Declared(SignalScope),
    /// A scope string that names neither known scope.
    Unrecognized(String),
    /// The blob mentions a scope but it could not be read as a string value.
    Malformed,
}

impl ConfiguredScope {
    pub fn declared(&self) -> Option<SignalScope> {
        match self {
            ConfiguredScope::Declared(scope) => Some(*scope),
            _ => None,
        }
    }

    fn classify(value: &str) -> Self {
        SignalScope::parse(value)
            .map(ConfiguredScope::Declared)
            .unwrap_or_else(|| ConfiguredScope::Unrecognized(value.to_string()))
    }
}

/// Persisted subscription configuration, parsed once on construction.
///
/// The raw blob is kept verbatim so the subscription serializes back to the
/// exact string it was loaded from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SubscriptionConfiguration {
    raw: String,
    scope: ConfiguredScope,
}

impl SubscriptionConfiguration {
    /// Parse a configuration blob.
    ///
    /// The first `"scope": "<value>"` anywhere in the text wins, wherever it
    /// is nested. Only when there is no such match is the blob read as JSON,
    /// to tell a missing scope from one that is present but not a string.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let scope = match SCOPE_FIELD_RE.captures(&raw) {
            Some(caps) => ConfiguredScope::classify(&caps[1]),
            None => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) if has_scope_value(&value) => ConfiguredScope::Malformed,
                // Scalars (an activity id, a number) carry no scope.
                Ok(_) => ConfiguredScope::Absent,
                Err(_) if raw.contains("\"scope\"") => ConfiguredScope::Malformed,
                Err(_) => ConfiguredScope::Absent,
            },
        };

        match &scope {
            ConfiguredScope::Malformed => {
                tracing::warn!(configuration = %raw, "unreadable scope in subscription configuration, treating as global");
            }
            ConfiguredScope::Unrecognized(value) => {
                tracing::warn!(configuration = %raw, scope = %value, "unknown signal scope in subscription configuration, treating as global");
            }
            _ => {}
        }

        Self { raw, scope }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scope(&self) -> &ConfiguredScope {
        &self.scope
    }
}

/// Whether any object in `value` has a non-null `scope` member.
fn has_scope_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => map.iter().any(|(key, v)| {
            (key == "scope" && !v.is_null()) || has_scope_value(v)
        }),
        serde_json::Value::Array(items) => items.iter().any(has_scope_value),
        _ => false,
    }
}

impl From<String> for SubscriptionConfiguration {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

impl From<SubscriptionConfiguration> for String {
    fn from(config: SubscriptionConfiguration) -> Self {
        config.raw
    }
}

/// A registration of interest in an event, as loaded from persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub id: Uuid,
    pub event_type: EventType,
    pub event_name: String,
    /// Owning instance, if the subscription is instance-bound.
    #[serde(default)]
    pub process_instance_id: Option<String>,
    /// Activity that created the subscription.
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub configuration: Option<SubscriptionConfiguration>,
}

impl EventSubscription {
    pub fn new(event_type: impl Into<EventType>, event_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            event_name: event_name.into(),
            process_instance_id: None,
            activity_id: None,
            configuration: None,
        }
    }

    pub fn signal(event_name: impl Into<String>) -> Self {
        Self::new(EventType::Signal, event_name)
    }

    pub fn with_configuration(mut self, raw: impl Into<String>) -> Self {
        self.configuration = Some(SubscriptionConfiguration::parse(raw));
        self
    }

    pub fn with_process_instance(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }

    pub fn with_activity(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// Scope as read from the configuration; `Absent` when there is none.
    pub fn configured_scope(&self) -> &ConfiguredScope {
        self.configuration
            .as_ref()
            .map(SubscriptionConfiguration::scope)
            .unwrap_or(&ConfiguredScope::Absent)
    }
}

// ─── Graph + execution ────────────────────────────────────────

/// An outgoing sequence flow with an optional guard expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceFlow {
    pub id: String,
    pub target_ref: String,
    /// `None` = unconditional.
    #[serde(default)]
    pub condition: Option<String>,
}

impl SequenceFlow {
    pub fn new(id: impl Into<String>, target_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target_ref: target_ref.into(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// One live token of process execution, owned by the engine.
pub trait ActivityExecution {
    fn process_instance_id(&self) -> &str;

    /// Activity the token currently sits on.
    fn activity_id(&self) -> &str;

    fn outgoing(&self) -> &[SequenceFlow];

    /// Advance along the given flows. An empty slice advances along none.
    fn take(&mut self, flows: &[SequenceFlow]) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_scope_wire_names() {
        assert_eq!(
            serde_json::to_string(&SignalScope::ProcessInstance).unwrap(),
            r#""processInstance""#
        );
        assert_eq!(SignalScope::parse("global"), Some(SignalScope::Global));
        assert_eq!(SignalScope::parse("ProcessInstance"), None);
    }

    #[test]
    fn test_configuration_json_scope() {
        let config = SubscriptionConfiguration::parse(r#"{"scope":"processInstance"}"#);
        assert_eq!(
            config.scope(),
            &ConfiguredScope::Declared(SignalScope::ProcessInstance)
        );
        assert_eq!(config.raw(), r#"{"scope":"processInstance"}"#);
    }

    #[test]
    fn test_configuration_loose_text_scope() {
        // Not valid JSON (trailing comma, unquoted neighbour) but still readable.
        let config =
            SubscriptionConfiguration::parse(r#"{ "scope" : "processInstance", other: 1, }"#);
        assert_eq!(
            config.scope(),
            &ConfiguredScope::Declared(SignalScope::ProcessInstance)
        );
    }

    #[test]
    fn test_configuration_absent_vs_malformed() {
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"other":"x"}"#).scope(),
            &ConfiguredScope::Absent
        );
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"scope": null}"#).scope(),
            &ConfiguredScope::Absent
        );
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"name":"scope"}"#).scope(),
            &ConfiguredScope::Absent
        );
        assert_eq!(
            SubscriptionConfiguration::parse("boundaryEvent1").scope(),
            &ConfiguredScope::Absent
        );
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"scope": 42}"#).scope(),
            &ConfiguredScope::Malformed
        );
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"outer": {"scope": ["processInstance"]}}"#).scope(),
            &ConfiguredScope::Malformed
        );
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"scope": processInstance"#).scope(),
            &ConfiguredScope::Malformed
        );
        assert_eq!(
            SubscriptionConfiguration::parse(r#"{"scope":"tenant"}"#).scope(),
            &ConfiguredScope::Unrecognized("tenant".to_string())
        );
    }

    #[test]
    fn test_configuration_embedded_scope() {
        let instance = ConfiguredScope::Declared(SignalScope::ProcessInstance);
        let blobs = [
            r#"{"signal":{"scope":"processInstance"}}"#,
            r#"[{"scope":"processInstance"}]"#,
            r#"{"ref":"sig-7","scope":"processInstance","priority":2}"#,
            r#"legacy; "scope": "processInstance"; v2"#,
        ];
        for blob in blobs {
            assert_eq!(SubscriptionConfiguration::parse(blob).scope(), &instance, "{blob}");
        }
    }

    #[test]
    fn test_configuration_first_scope_wins() {
        let config =
            SubscriptionConfiguration::parse(r#"{"scope":"processInstance","scope":"global"}"#);
        assert_eq!(
            config.scope(),
            &ConfiguredScope::Declared(SignalScope::ProcessInstance)
        );
    }

    #[test]
    fn test_subscription_serializes_raw_configuration() {
        let sub = EventSubscription::signal("sig1").with_configuration(r#"{"scope":"global"}"#);
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["event_type"], "signal");
        assert_eq!(json["configuration"], r#"{"scope":"global"}"#);

        let back: EventSubscription = serde_json::from_value(json).unwrap();
        assert_eq!(
            back.configured_scope(),
            &ConfiguredScope::Declared(SignalScope::Global)
        );
    }

    #[test]
    fn test_event_type_tags() {
        assert!(EventType::from("signal").is_signal());
        assert_eq!(EventType::from("message"), EventType::Message);
        assert_eq!(
            EventType::from("conditional"),
            EventType::Other("conditional".to_string())
        );
    }
}
