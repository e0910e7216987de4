//! The pluggable, user-supplied business logic the reduce-side engine
//! invokes (spec.md 1: "User-defined business logic for activation and
//! update ... treated as pluggable callbacks"). Everything else in this
//! crate is generic over a single `UserLogic` implementation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;

/// One job's `combine`/`update`/priority-ordering logic, plus the unit
/// elements `iState` and `cState` reset to (spec.md 3 data model).
///
/// Implementors are responsible for `combine` being commutative and
/// associative if they want a convergence guarantee; spec.md 4.3 notes
/// the framework still processes deltas without that property, it just
/// offers no guarantee.
pub trait UserLogic: Send + Sync + 'static {
    /// Key type. `Ord` backs the selector's ascending tie-break
    /// (spec.md 3 invariant 3). `Serialize`/`DeserializeOwned` let the
    /// snapshot writer spill keys to the blob store without this crate
    /// knowing anything about the user's key shape.
    type Key: Eq + Hash + Ord + Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// Incremental, priority-bearing per-key state. `Serialize`/
    /// `DeserializeOwned` let it cross the wire as a `KV`/`PKVBUF`
    /// payload without this crate or `priter-transport` knowing its
    /// shape (spec.md 1: "Serialization of user record types ...
    /// treated as an opaque, self-delimiting codec").
    type IState: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// Cumulative, converging per-key state.
    type CState: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// Immutable per-key context (e.g. an adjacency list).
    type Static: Clone + Send + Sync + 'static;

    /// `iState`'s unit element: what a key's `iState` resets to right
    /// after activation (spec.md 3 invariant 2).
    fn i_unit(&self) -> Self::IState;

    /// `cState`'s unit element: the value a freshly-observed key starts
    /// at (spec.md 4.3: "Creates the entry with ... cState == ε").
    fn c_unit(&self) -> Self::CState;

    /// Folds an incoming delta into the current `iState`.
    fn combine(&self, current: &Self::IState, delta: &Self::IState) -> Self::IState;

    /// The scalar the selector orders candidates by, descending
    /// (spec.md 3 invariant 3: "ordered by iState descending").
    fn priority(&self, i_state: &Self::IState) -> f64;

    /// Runs the user's per-key update once a key has been selected for
    /// activation, producing the new `cState` and the delta to emit
    /// downstream (spec.md 4.3: "`update` also returns a delta that is
    /// immediately emitted").
    fn update(
        &self,
        key: &Self::Key,
        i_state: &Self::IState,
        c_state: &Self::CState,
    ) -> (Self::CState, Self::IState);

    /// Absolute difference between two `cState` samples, used by
    /// `checkDone`'s convergence test (spec.md 4.3, 8).
    fn c_state_diff(&self, a: &Self::CState, b: &Self::CState) -> f64;

    /// Orders two `cState` values for the snapshot's top-K ranking.
    fn c_state_cmp(&self, a: &Self::CState, b: &Self::CState) -> std::cmp::Ordering;
}
