use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;

/// The pluggable map-side business logic spec.md 1 places out of scope:
/// how a static partition line parses into `(key, staticData)`, and what
/// `activate(k, v, emit)` does with an incoming `(key, iState)` pair.
pub trait ActivationLogic: Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    type IState: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    type Delta: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    type Static: Clone + Send + Sync + 'static;

    /// Parses one `<inDir>/subgraph/part<partId>` line ("<key>\t<outlinks…>",
    /// spec.md 6) into a `(key, staticData)` pair. Returns `None` for blank
    /// or comment lines the loader should skip.
    fn parse_static(&self, line: &str) -> Option<(Self::Key, Self::Static)>;

    /// The delta emitted for a key with no entry in the loaded subgraph
    /// (spec.md 4.4 "Failure semantics": "still emitted as a zero-delta
    /// fan-out to every partition ... a deliberate policy, not an
    /// error"). Typically the same unit element `combine` is a no-op
    /// against on the reduce side.
    fn zero_delta(&self) -> Self::Delta;

    /// `activate(k, v, emit)` (spec.md 4.4). `static_data` is `None` when
    /// the key has no entry in the loaded subgraph (spec.md 4.4 "Failure
    /// semantics"); the caller still drives the zero-delta fan-out policy,
    /// this callback is not invoked for that case.
    fn activate(
        &self,
        key: &Self::Key,
        value: &Self::IState,
        static_data: &Self::Static,
        emit: &mut dyn FnMut(Self::Key, Self::Delta),
    );
}
