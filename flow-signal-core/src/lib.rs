//! Signal dispatch core for BPMN flow nodes
//!
//! Provides the flow node behavior contract and the bookkeeping that keeps a
//! signal from being acted on twice within one unit of work:
//! - `FlowNodeBehavior` - default leave semantics, signal capability
//! - `scope` - maps a signal's declared scope to its dedup key
//! - `registry` - per-unit-of-work record of fired signals
//! - `UnitOfWork` - transient attribute store the registry lives in
//!
//! Persistence, graph loading and the condition language stay with the engine;
//! they are reached through the traits in `types`, `behavior` and `nodes`.

pub mod behavior;
pub mod config;
pub mod error;
pub mod memory;
pub mod nodes;
pub mod registry;
pub mod scope;
pub mod types;
pub mod unit_of_work;

pub use behavior::{ConditionEvaluator, FlowNodeBehavior, LeaveOutcome, OutgoingBehavior};
pub use config::SignalSettings;
pub use error::{BehaviorError, SettingsError};
pub use nodes::{
    PassThroughBehavior, SignalCatchBehavior, SignalDelivery, SignalThrowBehavior,
    SubscriptionSource, ThrowSummary,
};
pub use registry::{already_fired, register_fired, register_fired_signal, FiredSignalRegistry};
pub use scope::{resolve_from_definition, resolve_from_subscription, ScopeKey};
pub use types::{
    ActivityExecution, ConfiguredScope, EventSubscription, EventType, SequenceFlow,
    SignalDefinition, SignalScope, SubscriptionConfiguration,
};
pub use unit_of_work::UnitOfWork;
