//! Concrete flow node behaviors
//!
//! `PassThroughBehavior` covers tasks and gateways with nothing beyond the
//! default leave. The signal variants show how the fired-signal registry is
//! meant to be used: the throw side records each firing, and both sides skip
//! subscriptions whose signal already fired in the current unit of work.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::behavior::{FlowNodeBehavior, OutgoingBehavior};
use crate::config::SignalSettings;
use crate::error::BehaviorError;
use crate::registry;
use crate::scope::{self, ScopeKey};
use crate::types::*;
use crate::unit_of_work::UnitOfWork;

/// Looks up live signal subscriptions. Backed by the engine's persistence.
pub trait SubscriptionSource: Send + Sync {
    /// Signal subscriptions for `signal_name` reachable under `scope_key`:
    /// all of them for the global key, the instance's own for an instance key.
    fn signal_subscriptions(
        &self,
        signal_name: &str,
        scope_key: &ScopeKey,
    ) -> anyhow::Result<Vec<EventSubscription>>;
}

/// Hands a signal to the activity behind a subscription.
pub trait SignalDelivery: Send + Sync {
    fn deliver(&self, subscription: &EventSubscription, data: Option<&Json>)
        -> anyhow::Result<()>;
}

/// Under strict settings, reject signal subscriptions whose scope could not
/// be read cleanly.
fn check_scope_configuration(
    settings: &SignalSettings,
    subscription: &EventSubscription,
) -> Result<(), BehaviorError> {
    if !settings.strict_scope_configuration || !subscription.event_type.is_signal() {
        return Ok(());
    }
    let detail = match subscription.configured_scope() {
        ConfiguredScope::Malformed => "scope value is not a readable string".to_string(),
        ConfiguredScope::Unrecognized(value) => format!("unknown scope '{value}'"),
        ConfiguredScope::Absent | ConfiguredScope::Declared(_) => return Ok(()),
    };
    Err(BehaviorError::InvalidScopeConfiguration {
        event_name: subscription.event_name.clone(),
        subscription_id: subscription.id,
        detail,
    })
}

// ─── Pass-through ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PassThroughBehavior {
    outgoing: OutgoingBehavior,
}

impl PassThroughBehavior {
    pub fn new(outgoing: OutgoingBehavior) -> Self {
        Self { outgoing }
    }
}

impl FlowNodeBehavior for PassThroughBehavior {
    fn outgoing_behavior(&self) -> &OutgoingBehavior {
        &self.outgoing
    }
}

// ─── Signal catch ─────────────────────────────────────────────

/// Intermediate or boundary catch event waiting for a signal.
#[derive(Debug, Clone)]
pub struct SignalCatchBehavior {
    signal: SignalDefinition,
    outgoing: OutgoingBehavior,
    settings: SignalSettings,
}

impl SignalCatchBehavior {
    pub fn new(signal: SignalDefinition, outgoing: OutgoingBehavior, settings: SignalSettings) -> Self {
        Self {
            signal,
            outgoing,
            settings,
        }
    }

    pub fn signal_definition(&self) -> &SignalDefinition {
        &self.signal
    }

    /// Whether this catch should react to `subscription` now, i.e. its signal
    /// has not already been handled in this unit of work.
    pub fn should_trigger(
        &self,
        uow: &UnitOfWork,
        execution: &dyn ActivityExecution,
        subscription: &EventSubscription,
    ) -> Result<bool, BehaviorError> {
        check_scope_configuration(&self.settings, subscription)?;
        if !self.settings.deduplicate {
            return Ok(true);
        }
        Ok(!registry::already_fired(uow, execution, subscription))
    }
}

impl FlowNodeBehavior for SignalCatchBehavior {
    fn outgoing_behavior(&self) -> &OutgoingBehavior {
        &self.outgoing
    }

    /// Parks; the engine resumes the token through `signal`.
    fn execute(
        &self,
        _uow: &mut UnitOfWork,
        execution: &mut dyn ActivityExecution,
    ) -> Result<(), BehaviorError> {
        tracing::debug!(
            activity = execution.activity_id(),
            process_instance = execution.process_instance_id(),
            signal = %self.signal.name,
            "waiting for signal"
        );
        Ok(())
    }

    fn signal(
        &self,
        _uow: &mut UnitOfWork,
        execution: &mut dyn ActivityExecution,
        signal_name: &str,
        _signal_data: Option<&Json>,
    ) -> Result<(), BehaviorError> {
        if signal_name != self.signal.name {
            return Err(BehaviorError::UnexpectedSignal {
                activity_id: execution.activity_id().to_string(),
                expected: self.signal.name.clone(),
                received: signal_name.to_string(),
            });
        }
        tracing::debug!(
            activity = execution.activity_id(),
            signal = signal_name,
            "signal caught"
        );
        self.leave(execution).map(|_| ())
    }
}

// ─── Signal throw ─────────────────────────────────────────────

/// Counts from one throw, mostly for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrowSummary {
    pub delivered: usize,
    pub skipped: usize,
}

/// Intermediate throw event broadcasting a signal to its subscribers.
pub struct SignalThrowBehavior {
    signal: SignalDefinition,
    payload: Option<Json>,
    outgoing: OutgoingBehavior,
    subscriptions: Arc<dyn SubscriptionSource>,
    delivery: Arc<dyn SignalDelivery>,
    settings: SignalSettings,
}

impl SignalThrowBehavior {
    pub fn new(
        signal: SignalDefinition,
        outgoing: OutgoingBehavior,
        subscriptions: Arc<dyn SubscriptionSource>,
        delivery: Arc<dyn SignalDelivery>,
        settings: SignalSettings,
    ) -> Self {
        Self {
            signal,
            payload: None,
            outgoing,
            subscriptions,
            delivery,
            settings,
        }
    }

    pub fn with_payload(mut self, payload: Json) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Deliver to every candidate subscription not already satisfied in this
    /// unit of work, then record the firing. Does not leave the activity.
    pub fn throw_signal(
        &self,
        uow: &mut UnitOfWork,
        execution: &dyn ActivityExecution,
    ) -> Result<ThrowSummary, BehaviorError> {
        let scope_key = scope::resolve_from_definition(execution, &self.signal);
        let candidates = self
            .subscriptions
            .signal_subscriptions(&self.signal.name, &scope_key)
            .map_err(|source| BehaviorError::SubscriptionLookup {
                signal_name: self.signal.name.clone(),
                source,
            })?;

        let mut summary = ThrowSummary::default();
        for subscription in &candidates {
            check_scope_configuration(&self.settings, subscription)?;
            if self.settings.deduplicate && registry::already_fired(uow, execution, subscription) {
                summary.skipped += 1;
                continue;
            }
            self.delivery
                .deliver(subscription, self.payload.as_ref())
                .map_err(|source| BehaviorError::Delivery {
                    event_name: subscription.event_name.clone(),
                    subscription_id: subscription.id,
                    source,
                })?;
            summary.delivered += 1;
        }

        registry::register_fired(uow, &scope_key, &self.signal.name);

        tracing::debug!(
            unit_of_work = %uow.id(),
            signal = %self.signal.name,
            scope = %scope_key,
            delivered = summary.delivered,
            skipped = summary.skipped,
            "signal thrown"
        );
        Ok(summary)
    }
}

impl FlowNodeBehavior for SignalThrowBehavior {
    fn outgoing_behavior(&self) -> &OutgoingBehavior {
        &self.outgoing
    }

    fn execute(
        &self,
        uow: &mut UnitOfWork,
        execution: &mut dyn ActivityExecution,
    ) -> Result<(), BehaviorError> {
        self.throw_signal(uow, &*execution)?;
        self.leave(execution).map(|_| ())
    }
}

impl std::fmt::Debug for SignalThrowBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalThrowBehavior")
            .field("signal", &self.signal)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
