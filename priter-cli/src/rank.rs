//! A concrete priority-ranking job (spec.md 8 end-to-end scenario 1:
//! "Three-key rank convergence") wiring `priter_reduce::UserLogic` and
//! `priter_map::ActivationLogic` to the same damped-rank update rule, so
//! `priter-cli`'s two task binaries have a runnable job to drive rather
//! than shipping with no default business logic at all (spec.md 1
//! treats the update/activation rule itself as pluggable, but *some*
//! concrete instance is needed for the CLI to be runnable end to end).

use priter_map::ActivationLogic;
use priter_reduce::UserLogic;
use std::cmp::Ordering;

/// The reduce-side half: per-key cumulative rank `cState`, pending rank
/// mass `iState`, no reduce-side static data (the adjacency list lives
/// only on the map side, where `activate` needs it to fan mass out to
/// neighbors).
#[derive(Debug, Clone, Copy)]
pub struct RankReduceLogic {
    /// The fraction of pending mass folded into `cState` per activation
    /// (spec.md 8 scenario 1: "damping=0.8").
    pub damping: f64,
    /// The baseline every key's `cState` starts at (spec.md 8 scenario
    /// 1: "retain=0.2").
    pub retain: f64,
}

impl Default for RankReduceLogic {
    fn default() -> Self {
        Self {
            damping: 0.8,
            retain: 0.2,
        }
    }
}

impl UserLogic for RankReduceLogic {
    type Key = u64;
    type IState = f64;
    type CState = f64;
    type Static = ();

    fn i_unit(&self) -> f64 {
        0.0
    }

    fn c_unit(&self) -> f64 {
        self.retain
    }

    fn combine(&self, current: &f64, delta: &f64) -> f64 {
        current + delta
    }

    fn priority(&self, i_state: &f64) -> f64 {
        *i_state
    }

    fn update(&self, _key: &u64, i_state: &f64, c_state: &f64) -> (f64, f64) {
        let increment = self.damping * i_state;
        (c_state + increment, increment)
    }

    fn c_state_diff(&self, a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    fn c_state_cmp(&self, a: &f64, b: &f64) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    }
}

/// The map-side half: the loaded static partition is each key's
/// out-neighbor list (spec.md 6: `<inDir>/subgraph/part<partId>`,
/// "<key>\t<outlinks…>"); `activate` splits the incoming pending mass
/// evenly across out-neighbors, matching a standard damped-rank
/// propagation step.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankMapLogic;

impl ActivationLogic for RankMapLogic {
    type Key = u64;
    type IState = f64;
    type Delta = f64;
    type Static = Vec<u64>;

    fn parse_static(&self, line: &str) -> Option<(u64, Vec<u64>)> {
        let mut fields = line.split('\t');
        let key: u64 = fields.next()?.trim().parse().ok()?;
        let outlinks: Vec<u64> = fields.filter_map(|f| f.trim().parse().ok()).collect();
        Some((key, outlinks))
    }

    fn activate(&self, _key: &u64, value: &f64, static_data: &Vec<u64>, emit: &mut dyn FnMut(u64, f64)) {
        if static_data.is_empty() {
            return;
        }
        let share = value / static_data.len() as f64;
        for &outlink in static_data {
            emit(outlink, share);
        }
    }

    fn zero_delta(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_logic_splits_mass_evenly_across_outlinks() {
        let logic = RankMapLogic;
        let mut emitted = Vec::new();
        logic.activate(&1, &1.0, &vec![2, 3], &mut |k, v| emitted.push((k, v)));
        assert_eq!(emitted, vec![(2, 0.5), (3, 0.5)]);
    }

    #[test]
    fn map_logic_parses_tab_separated_outlinks() {
        let logic = RankMapLogic;
        assert_eq!(logic.parse_static("1\t2\t3"), Some((1, vec![2, 3])));
        assert_eq!(logic.parse_static("4"), Some((4, vec![])));
    }

    #[test]
    fn reduce_logic_update_folds_damped_share_into_c_state() {
        let logic = RankReduceLogic::default();
        let (c_state, delta) = logic.update(&1, &1.0, &logic.c_unit());
        assert_eq!(delta, 0.8);
        assert_eq!(c_state, 0.2 + 0.8);
    }
}
