//! Fired-signal registry
//!
//! Records, per unit of work, which signal names have fired under which scope
//! key. Subscriptions that race on the same signal consult it so a firing is
//! acted on once per unit of work.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::scope::{self, ScopeKey};
use crate::types::*;
use crate::unit_of_work::UnitOfWork;

/// Attribute slot the registry occupies in the unit of work.
pub const FIRED_SIGNAL_EVENTS: &str = "firedSignalEvents";

/// Signal names fired in one unit of work, grouped by scope key.
///
/// Names are appended without a membership check, so repeated firings show up
/// as repeated entries. Only containment is ever queried.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FiredSignalRegistry {
    fired: BTreeMap<ScopeKey, Vec<String>>,
}

impl FiredSignalRegistry {
    pub fn record(&mut self, scope_key: ScopeKey, signal_name: impl Into<String>) {
        self.fired
            .entry(scope_key)
            .or_default()
            .push(signal_name.into());
    }

    pub fn contains(&self, scope_key: &ScopeKey, signal_name: &str) -> bool {
        self.fired
            .get(scope_key)
            .is_some_and(|names| names.iter().any(|n| n == signal_name))
    }

    /// Names fired under `scope_key`, in firing order.
    pub fn fired(&self, scope_key: &ScopeKey) -> &[String] {
        self.fired.get(scope_key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Record that `signal_name` fired under `scope_key` in this unit of work.
pub fn register_fired(uow: &mut UnitOfWork, scope_key: &ScopeKey, signal_name: &str) {
    let mut registry = uow
        .take_attribute::<FiredSignalRegistry>(FIRED_SIGNAL_EVENTS)
        .unwrap_or_default();
    registry.record(scope_key.clone(), signal_name);
    uow.set_attribute(FIRED_SIGNAL_EVENTS, registry);

    tracing::debug!(
        unit_of_work = %uow.id(),
        scope = %scope_key,
        signal = signal_name,
        "signal registered as fired"
    );
}

/// Resolve the scope key from the definition, then [`register_fired`].
pub fn register_fired_signal(
    uow: &mut UnitOfWork,
    execution: &dyn ActivityExecution,
    definition: &SignalDefinition,
) -> ScopeKey {
    let scope_key = scope::resolve_from_definition(execution, definition);
    register_fired(uow, &scope_key, &definition.name);
    scope_key
}

/// Whether the subscription's signal already fired, under the subscription's
/// resolved scope, earlier in this unit of work. Always `false` for
/// non-signal subscriptions.
pub fn already_fired(
    uow: &UnitOfWork,
    execution: &dyn ActivityExecution,
    subscription: &EventSubscription,
) -> bool {
    if !subscription.event_type.is_signal() {
        return false;
    }

    let scope_key = scope::resolve_from_subscription(execution, subscription);
    let Some(registry) = uow.attribute::<FiredSignalRegistry>(FIRED_SIGNAL_EVENTS) else {
        return false;
    };

    let hit = registry.contains(&scope_key, &subscription.event_name);
    if hit {
        tracing::debug!(
            unit_of_work = %uow.id(),
            scope = %scope_key,
            signal = %subscription.event_name,
            subscription = %subscription.id,
            "signal already fired in this unit of work"
        );
    }
    hit
}

/// Read-only view of the registry, if anything fired yet.
pub fn fired_signals(uow: &UnitOfWork) -> Option<&FiredSignalRegistry> {
    uow.attribute::<FiredSignalRegistry>(FIRED_SIGNAL_EVENTS)
}
