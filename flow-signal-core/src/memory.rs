//! In-memory collaborators
//!
//! Plain implementations of the engine-side traits, for embedding in tests
//! and for hosts that keep everything in process.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::behavior::ConditionEvaluator;
use crate::nodes::{SignalDelivery, SubscriptionSource};
use crate::scope::ScopeKey;
use crate::types::*;

// ─── Execution ────────────────────────────────────────────────

/// Execution token that records the flows it was sent along.
#[derive(Debug, Clone)]
pub struct MemoryExecution {
    process_instance_id: String,
    activity_id: String,
    outgoing: Vec<SequenceFlow>,
    taken: Vec<SequenceFlow>,
    take_calls: usize,
}

impl MemoryExecution {
    pub fn new(process_instance_id: impl Into<String>, activity_id: impl Into<String>) -> Self {
        Self {
            process_instance_id: process_instance_id.into(),
            activity_id: activity_id.into(),
            outgoing: Vec::new(),
            taken: Vec::new(),
            take_calls: 0,
        }
    }

    pub fn with_outgoing(mut self, outgoing: Vec<SequenceFlow>) -> Self {
        self.outgoing = outgoing;
        self
    }

    pub fn taken_ids(&self) -> Vec<&str> {
        self.taken.iter().map(|f| f.id.as_str()).collect()
    }

    /// How many times the token was advanced, including empty advances.
    pub fn take_calls(&self) -> usize {
        self.take_calls
    }
}

impl ActivityExecution for MemoryExecution {
    fn process_instance_id(&self) -> &str {
        &self.process_instance_id
    }

    fn activity_id(&self) -> &str {
        &self.activity_id
    }

    fn outgoing(&self) -> &[SequenceFlow] {
        &self.outgoing
    }

    fn take(&mut self, flows: &[SequenceFlow]) -> Result<()> {
        self.take_calls += 1;
        self.taken.extend_from_slice(flows);
        Ok(())
    }
}

// ─── Conditions ───────────────────────────────────────────────

/// Guard results fixed up front, keyed by expression text.
#[derive(Debug, Clone, Default)]
pub struct StaticConditions {
    results: HashMap<String, bool>,
}

impl StaticConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, expression: impl Into<String>, result: bool) -> Self {
        self.results.insert(expression.into(), result);
        self
    }
}

impl ConditionEvaluator for StaticConditions {
    fn evaluate(&self, flow: &SequenceFlow, _execution: &dyn ActivityExecution) -> Result<bool> {
        let Some(expression) = flow.condition.as_deref() else {
            return Ok(true);
        };
        self.results
            .get(expression)
            .copied()
            .ok_or_else(|| anyhow!("unknown condition expression '{expression}'"))
    }
}

// ─── Subscriptions ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySubscriptions {
    subscriptions: Mutex<Vec<EventSubscription>>,
}

impl MemorySubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: EventSubscription) {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscription);
    }
}

impl SubscriptionSource for MemorySubscriptions {
    fn signal_subscriptions(
        &self,
        signal_name: &str,
        scope_key: &ScopeKey,
    ) -> Result<Vec<EventSubscription>> {
        let subs = self
            .subscriptions
            .lock()
            .map_err(|_| anyhow!("subscription store lock poisoned"))?;
        Ok(subs
            .iter()
            .filter(|s| s.event_type.is_signal() && s.event_name == signal_name)
            .filter(|s| match scope_key {
                ScopeKey::Global => true,
                ScopeKey::ProcessInstance(id) => s.process_instance_id.as_deref() == Some(id.as_str()),
            })
            .cloned()
            .collect())
    }
}

// ─── Delivery ─────────────────────────────────────────────────

/// Records every delivery; optionally fails them all.
#[derive(Debug, Default)]
pub struct RecordingDelivery {
    delivered: Mutex<Vec<(Uuid, Option<Json>)>>,
    fail: bool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Subscription ids delivered to, in order.
    pub fn delivered(&self) -> Vec<Uuid> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn payloads(&self) -> Vec<Option<Json>> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, data)| data.clone())
            .collect()
    }
}

impl SignalDelivery for RecordingDelivery {
    fn deliver(&self, subscription: &EventSubscription, data: Option<&Json>) -> Result<()> {
        if self.fail {
            return Err(anyhow!(
                "delivery to subscription {} refused",
                subscription.id
            ));
        }
        self.delivered
            .lock()
            .map_err(|_| anyhow!("delivery log lock poisoned"))?
            .push((subscription.id, data.cloned()));
        Ok(())
    }
}
