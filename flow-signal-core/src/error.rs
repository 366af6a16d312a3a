use uuid::Uuid;

/// Errors surfaced to the engine by flow node behaviors.
#[derive(Debug, thiserror::Error)]
pub enum BehaviorError {
    #[error("activity '{activity_id}' doesn't accept signals (received '{signal_name}')")]
    UnsupportedCapability {
        activity_id: String,
        signal_name: String,
    },

    #[error("activity '{activity_id}' waits for signal '{expected}', got '{received}'")]
    UnexpectedSignal {
        activity_id: String,
        expected: String,
        received: String,
    },

    #[error("condition on sequence flow '{flow_id}' could not be evaluated: {source}")]
    Condition {
        flow_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to leave activity '{activity_id}': {source}")]
    Traversal {
        activity_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("subscription lookup for signal '{signal_name}' failed: {source}")]
    SubscriptionLookup {
        signal_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to deliver signal '{event_name}' to subscription {subscription_id}: {source}")]
    Delivery {
        event_name: String,
        subscription_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error("subscription {subscription_id} for signal '{event_name}' has an invalid scope configuration: {detail}")]
    InvalidScopeConfiguration {
        event_name: String,
        subscription_id: Uuid,
        detail: String,
    },
}

/// Errors loading [`crate::config::SignalSettings`].
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid settings YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
