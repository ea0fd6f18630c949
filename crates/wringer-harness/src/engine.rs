//! The trace execution engine.
//!
//! The engine walks a trace's actions strictly in order against one
//! context and one layer stack, recording each action's outcome into the
//! action itself. Severity follows the connection contract: a transport
//! error aborts the remainder of the trace, while parse, transform, and
//! expectation mismatches only mark the current action as deviated and
//! execution continues — the engine exists to characterize *how* a peer
//! deviates, not to stop at the first surprise. Every run ends in a
//! definite terminal status.

use serde::{Deserialize, Serialize};
use wringer_core::{Context, LayerStack, Processed, ProcessingHint};

use crate::action::{
    Action, ActionStatus, ReceiveAction, ReceiveOutcome, ReceiveUntilAction, SendAction,
    SendOutcome,
};
use crate::expect::{self, ContainerKind};
use crate::trace::Trace;

/// Lifecycle of one trace execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceStatus {
    /// Not yet started
    NotStarted,
    /// Currently executing
    Running,
    /// Every action executed and matched the plan
    CompletedAsPlanned,
    /// Every action executed, at least one deviated
    CompletedWithDeviation,
    /// A fatal transport error ended execution early
    Aborted,
}

/// Result of one trace execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Terminal status
    pub status: TraceStatus,
    /// Per-action summary, parallel to the trace's action list
    pub actions: Vec<ActionStatus>,
}

/// Walks traces against a context and layer stack.
#[derive(Debug)]
pub struct TraceExecutor {
    status: TraceStatus,
}

impl Default for TraceExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceExecutor {
    /// A fresh executor.
    #[must_use]
    pub fn new() -> Self {
        Self { status: TraceStatus::NotStarted }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TraceStatus {
        self.status
    }

    /// Execute `trace` to completion, recording outcomes into its actions.
    pub fn execute(
        &mut self,
        trace: &mut Trace,
        ctx: &mut Context,
        stack: &mut LayerStack,
    ) -> TraceReport {
        self.status = TraceStatus::Running;
        let mut statuses = Vec::with_capacity(trace.actions.len());
        let mut aborted = false;

        for action in &mut trace.actions {
            if aborted {
                statuses.push(ActionStatus::Skipped);
                continue;
            }

            let status = match action {
                Action::Send(send) => Self::run_send(send, ctx, stack),
                Action::Receive(receive) => Self::run_receive(receive, ctx, stack),
                Action::ReceiveUntil(until) => Self::run_receive_until(until, ctx, stack),
                Action::ActivateCipher(activate) => {
                    ctx.set_pending_suite(activate.suite.to_suite());
                    match ctx.activate_cipher(activate.direction.to_direction()) {
                        Ok(()) => {
                            activate.result = Some(Ok(()));
                            ActionStatus::AsPlanned
                        },
                        Err(e) => {
                            activate.result = Some(Err(e.to_string()));
                            ActionStatus::Deviated(e.to_string())
                        },
                    }
                },
                Action::Wait(wait) => {
                    std::thread::sleep(wait.duration);
                    wait.result = Some(true);
                    ActionStatus::AsPlanned
                },
            };

            if matches!(status, ActionStatus::Aborted(_)) {
                aborted = true;
            }
            statuses.push(status);
        }

        self.status = if aborted {
            TraceStatus::Aborted
        } else if statuses.iter().all(|s| matches!(s, ActionStatus::AsPlanned)) {
            TraceStatus::CompletedAsPlanned
        } else {
            TraceStatus::CompletedWithDeviation
        };

        TraceReport { status: self.status, actions: statuses }
    }

    fn run_send(send: &mut SendAction, ctx: &mut Context, stack: &mut LayerStack) -> ActionStatus {
        let mut outcome = SendOutcome::default();

        for unit in send.units.clone() {
            let hint = unit.is_raw().then_some(ProcessingHint::Drain);
            match stack.send(ctx, unit.into_container(), hint.as_ref()) {
                Ok(Processed::Ok(wire)) => outcome.wire.push(wire),
                Ok(Processed::Deviation(deviation)) => {
                    tracing::debug!(%deviation, "send deviated");
                    outcome.deviations.push(deviation);
                },
                Err(e) => {
                    send.result = Some(outcome);
                    return ActionStatus::Aborted(e);
                },
            }
        }

        let status = if outcome.deviations.is_empty() {
            ActionStatus::AsPlanned
        } else {
            ActionStatus::Deviated(format!("{} unit(s) deviated", outcome.deviations.len()))
        };
        send.result = Some(outcome);
        status
    }

    /// Derive the hint for the next receive from the first unconsumed
    /// expectation entry.
    fn hint_for(next: Option<ContainerKind>) -> Option<ProcessingHint> {
        match next {
            Some(ContainerKind::Handshake(kind)) => Some(ProcessingHint::ExpectHandshake(kind)),
            Some(ContainerKind::Content(content_type)) => {
                Some(ProcessingHint::ExpectContent(content_type))
            },
            Some(ContainerKind::Raw) => Some(ProcessingHint::Drain),
            Some(ContainerKind::Legacy) | None => None,
        }
    }

    fn run_receive(
        receive: &mut ReceiveAction,
        ctx: &mut Context,
        stack: &mut LayerStack,
    ) -> ActionStatus {
        let mut outcome = ReceiveOutcome::default();
        let mut kinds: Vec<ContainerKind> = Vec::new();

        loop {
            if expect::failed_early(&receive.expected, &kinds) {
                tracing::debug!(?kinds, "receive cannot match any completion, stopping early");
                break;
            }
            if !expect::remaining_possible(&receive.expected, &kinds) {
                break;
            }

            let hint = Self::hint_for(expect::next_expected(&receive.expected, &kinds));
            match stack.receive(ctx, hint.as_ref()) {
                Ok(Processed::Ok(container)) => {
                    kinds.push(ContainerKind::of(&container));
                    outcome.observed.push(container);
                },
                Ok(Processed::Deviation(deviation)) => {
                    tracing::debug!(%deviation, "receive deviated");
                    outcome.deviations.push(deviation);
                    break;
                },
                Err(e) => {
                    outcome.as_planned = false;
                    receive.result = Some(outcome);
                    return ActionStatus::Aborted(e);
                },
            }
        }

        outcome.as_planned = outcome.deviations.is_empty()
            && expect::executed_as_planned(&receive.expected, &kinds);
        let status = if outcome.as_planned {
            ActionStatus::AsPlanned
        } else {
            ActionStatus::Deviated(format!(
                "observed {:?} against {} expected entries",
                kinds,
                receive.expected.len()
            ))
        };
        receive.result = Some(outcome);
        status
    }

    fn run_receive_until(
        until: &mut ReceiveUntilAction,
        ctx: &mut Context,
        stack: &mut LayerStack,
    ) -> ActionStatus {
        let mut outcome = ReceiveOutcome::default();
        let mut found = false;

        for _ in 0..until.max_attempts {
            let hint = Self::hint_for(Some(until.target));
            match stack.receive(ctx, hint.as_ref()) {
                Ok(Processed::Ok(container)) => {
                    let kind = ContainerKind::of(&container);
                    outcome.observed.push(container);
                    if kind == until.target {
                        found = true;
                        break;
                    }
                },
                Ok(Processed::Deviation(deviation)) => {
                    tracing::debug!(%deviation, "receive-until deviated, continuing");
                    outcome.deviations.push(deviation);
                },
                Err(e) => {
                    outcome.as_planned = false;
                    until.result = Some(outcome);
                    return ActionStatus::Aborted(e);
                },
            }
        }

        outcome.as_planned = found;
        let status = if found {
            ActionStatus::AsPlanned
        } else {
            ActionStatus::Deviated(format!(
                "target {:?} not seen within {} attempts",
                until.target, until.max_attempts
            ))
        };
        until.result = Some(outcome);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_starts_idle() {
        let executor = TraceExecutor::new();
        assert_eq!(executor.status(), TraceStatus::NotStarted);
    }
}
