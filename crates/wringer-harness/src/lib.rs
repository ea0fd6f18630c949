//! Declarative trace execution for the Wringer protocol family.
//!
//! A [`Trace`] is an ordered list of [`Action`]s — send these units,
//! receive against this expectation, switch cipher state, wait — and the
//! [`TraceExecutor`] walks it against one connection's context and layer
//! stack. Outcomes are recorded into the actions themselves, so an
//! executed trace is a complete, serializable audit log of the exchange,
//! replayable from its CBOR envelope.
//!
//! Execution always terminates in a definite status: as planned, with
//! deviations characterized per action, or aborted by a transport
//! failure. Independent traces run in parallel via [`run_parallel`], one
//! worker and one connection each.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod engine;
pub mod expect;
pub mod runner;
pub mod trace;

pub use action::{
    ActivateCipherAction, ActivateDirection, Action, ActionStatus, ReceiveAction, ReceiveOutcome,
    ReceiveUntilAction, SendAction, SendOutcome, SendUnit, SuiteSpec, WaitAction,
};
pub use engine::{TraceExecutor, TraceReport, TraceStatus};
pub use expect::{
    ContainerKind, ExpectedEntry, can_extend, executed_as_planned, failed_early, next_expected,
    remaining_possible,
};
pub use runner::{JobResult, TraceJob, run_parallel};
pub use trace::{TRACE_FORMAT_VERSION, Trace, TraceCodecError, TraceFile};
