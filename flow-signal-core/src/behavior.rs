//! Flow node behavior contract
//!
//! Every connectable element (task, gateway, event) implements
//! [`FlowNodeBehavior`]. The default `execute` just leaves the node along the
//! outgoing flows whose guards hold; `signal` is rejected unless a variant
//! overrides it.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::BehaviorError;
use crate::types::*;
use crate::unit_of_work::UnitOfWork;

/// Evaluates sequence-flow guard expressions. The expression language is the
/// engine's concern.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, flow: &SequenceFlow, execution: &dyn ActivityExecution)
        -> anyhow::Result<bool>;
}

/// Flows taken when leaving an activity, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub taken: Vec<String>,
}

impl LeaveOutcome {
    pub fn is_dead_end(&self) -> bool {
        self.taken.is_empty()
    }
}

/// Standard outgoing traversal shared by all flow nodes.
#[derive(Clone)]
pub struct OutgoingBehavior {
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl OutgoingBehavior {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Take every flow whose guard evaluates true. Unguarded flows always
    /// qualify. If none qualify the execution advances along none.
    pub fn perform_default_outgoing(
        &self,
        execution: &mut dyn ActivityExecution,
    ) -> Result<LeaveOutcome, BehaviorError> {
        let mut selected = Vec::new();
        for flow in execution.outgoing() {
            let passes = match &flow.condition {
                None => true,
                Some(_) => self
                    .evaluator
                    .evaluate(flow, &*execution)
                    .map_err(|source| BehaviorError::Condition {
                        flow_id: flow.id.clone(),
                        source,
                    })?,
            };
            if passes {
                selected.push(flow.clone());
            }
        }

        advance(execution, selected, "default")
    }

    /// Take every outgoing flow, guards ignored.
    pub fn perform_unconditional_outgoing(
        &self,
        execution: &mut dyn ActivityExecution,
    ) -> Result<LeaveOutcome, BehaviorError> {
        let all = execution.outgoing().to_vec();
        advance(execution, all, "unconditional")
    }
}

impl std::fmt::Debug for OutgoingBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingBehavior").finish_non_exhaustive()
    }
}

fn advance(
    execution: &mut dyn ActivityExecution,
    flows: Vec<SequenceFlow>,
    mode: &'static str,
) -> Result<LeaveOutcome, BehaviorError> {
    execution
        .take(&flows)
        .map_err(|source| BehaviorError::Traversal {
            activity_id: execution.activity_id().to_string(),
            source,
        })?;

    let outcome = LeaveOutcome {
        taken: flows.into_iter().map(|f| f.id).collect(),
    };
    tracing::debug!(
        activity = execution.activity_id(),
        process_instance = execution.process_instance_id(),
        mode,
        taken = ?outcome.taken,
        "left activity"
    );
    Ok(outcome)
}

/// Contract shared by all connectable process elements.
pub trait FlowNodeBehavior {
    fn outgoing_behavior(&self) -> &OutgoingBehavior;

    /// Default: leave immediately.
    fn execute(
        &self,
        _uow: &mut UnitOfWork,
        execution: &mut dyn ActivityExecution,
    ) -> Result<(), BehaviorError> {
        self.leave(execution).map(|_| ())
    }

    /// Leave along the flows whose guards evaluate true.
    fn leave(&self, execution: &mut dyn ActivityExecution) -> Result<LeaveOutcome, BehaviorError> {
        self.outgoing_behavior().perform_default_outgoing(execution)
    }

    /// Leave along every outgoing flow.
    fn leave_ignore_conditions(
        &self,
        execution: &mut dyn ActivityExecution,
    ) -> Result<LeaveOutcome, BehaviorError> {
        self.outgoing_behavior()
            .perform_unconditional_outgoing(execution)
    }

    /// Variants that accept signals override this.
    fn signal(
        &self,
        _uow: &mut UnitOfWork,
        execution: &mut dyn ActivityExecution,
        signal_name: &str,
        _signal_data: Option<&Json>,
    ) -> Result<(), BehaviorError> {
        Err(BehaviorError::UnsupportedCapability {
            activity_id: execution.activity_id().to_string(),
            signal_name: signal_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryExecution, StaticConditions};

    struct PlainTask {
        outgoing: OutgoingBehavior,
    }

    impl FlowNodeBehavior for PlainTask {
        fn outgoing_behavior(&self) -> &OutgoingBehavior {
            &self.outgoing
        }
    }

    fn three_way_execution() -> MemoryExecution {
        MemoryExecution::new("PI-1", "task1").with_outgoing(vec![
            SequenceFlow::new("f1", "a").with_condition("${approved}"),
            SequenceFlow::new("f2", "b").with_condition("${rejected}"),
            SequenceFlow::new("f3", "c"),
        ])
    }

    fn task() -> PlainTask {
        let conditions = StaticConditions::new()
            .with("${approved}", true)
            .with("${rejected}", false);
        PlainTask {
            outgoing: OutgoingBehavior::new(Arc::new(conditions)),
        }
    }

    #[test]
    fn test_execute_leaves_by_conditions() {
        let mut uow = UnitOfWork::new();
        let mut execution = three_way_execution();
        task().execute(&mut uow, &mut execution).unwrap();
        assert_eq!(execution.taken_ids(), ["f1", "f3"]);
    }

    #[test]
    fn test_leave_ignore_conditions_takes_all() {
        let mut execution = three_way_execution();
        let outcome = task().leave_ignore_conditions(&mut execution).unwrap();
        assert_eq!(outcome.taken, ["f1", "f2", "f3"]);
        assert_eq!(execution.taken_ids(), ["f1", "f2", "f3"]);
    }

    #[test]
    fn test_no_qualifying_flow_takes_none() {
        let mut execution = MemoryExecution::new("PI-1", "task1").with_outgoing(vec![
            SequenceFlow::new("f1", "a").with_condition("${rejected}"),
        ]);
        let outcome = task().leave(&mut execution).unwrap();
        assert!(outcome.is_dead_end());
        assert_eq!(execution.take_calls(), 1);
        assert!(execution.taken_ids().is_empty());
    }

    #[test]
    fn test_condition_error_propagates() {
        let mut execution = MemoryExecution::new("PI-1", "task1").with_outgoing(vec![
            SequenceFlow::new("f9", "a").with_condition("${unknown}"),
        ]);
        let err = task().leave(&mut execution).unwrap_err();
        assert!(matches!(err, BehaviorError::Condition { ref flow_id, .. } if flow_id == "f9"));
        assert_eq!(execution.take_calls(), 0);
    }

    #[test]
    fn test_signal_unsupported_by_default() {
        let mut uow = UnitOfWork::new();
        let mut execution = three_way_execution();
        let err = task()
            .signal(&mut uow, &mut execution, "sig1", None)
            .unwrap_err();
        assert!(matches!(
            err,
            BehaviorError::UnsupportedCapability { ref activity_id, .. } if activity_id == "task1"
        ));
        assert!(execution.taken_ids().is_empty());
    }
}
