//! Typed, composable reducer/effect runtime for UI-bound components.
//!
//! A component declares one [`Reduce`]: a tree of pure state transitions and
//! a tree of side effects, assembled through nested builder scopes. A
//! [`StateContainer`] owns the current state, serializes dispatched actions,
//! commits each transition with an optimistic compare-and-swap retry, and
//! launches the effect tree afterwards.
//!
//! # Architecture
//!
//! ```text
//! dispatch(action) ──→ serializer ──→ transition tree ──→ CAS commit
//!        ▲                                                    │
//!        │                                                    ▼
//!        └────────── dispatch from effects ◀────────── effect tree
//! ```
//!
//! - **Transitions** are pure: `(action, state) -> state`, evaluated with
//!   first-change-wins short-circuit inside composites.
//! - **Effects** fan out: every sibling runs, synchronous leaves inline and
//!   suspending leaves as independent tasks, and one failing leaf never
//!   suppresses the others.
//! - **Failures** inside leaves are routed to the `catch` handler chain and
//!   never crash the caller.

pub mod config;
pub mod container;
pub mod effect;
pub mod handler;
pub mod pool;
pub mod reduce;
pub mod source;
pub mod transition;

pub use config::{clear_defaults, install_defaults, ExecutionContext, StatekitConfig};
pub use container::{
    ContainerBuilder, DispatchError, DispatchHandle, StateContainer, StateSubscription,
};
pub use handler::{EffectFailure, FailureOrigin, HandlerChain};
pub use reduce::{reduce, EffectBuilder, Reduce, ReduceBuilder, ScopeId, TransitionBuilder};
pub use source::{Action, Dispatch, EffectSource, State, UpdateSource};
