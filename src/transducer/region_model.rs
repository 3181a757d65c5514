//! The EDIT/NOEDIT region chain.

use crate::transducer::operation::RegionState;

/// A 2-state Markov chain over [`RegionState`] governing run lengths of
/// edited versus copied spans.
///
/// Before choosing an edit operation the model first decides whether the
/// next action belongs to an edit region or a copy region, conditioned only
/// on which kind the previous action belonged to. The two self-transition
/// probabilities act like exponential models of region length: every edit
/// region pays a cost to enter and to leave, plus a smaller per-character
/// cost to stay.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RegionModel {
    /// `prob[new][old]` = p(new state | old state).
    prob: [[f64; 2]; 2],
    /// Expected-count accumulator, same layout, cleared at reestimation.
    counts: [[f64; 2]; 2],
}

impl RegionModel {
    /// Untrained initial parameters: stay in the current region with
    /// probability 0.9.
    pub fn new() -> Self {
        RegionModel {
            prob: [[0.9, 0.1], [0.1, 0.9]],
            counts: [[0.0; 2]; 2],
        }
    }

    /// p(`new` | `old`).
    #[inline]
    pub fn transition_prob(&self, new: RegionState, old: RegionState) -> f64 {
        self.prob[new.index()][old.index()]
    }

    /// Add `weight` expected observations of the `old -> new` transition,
    /// for the next [`reestimate`](RegionModel::reestimate).
    #[inline]
    pub fn accumulate(&mut self, new: RegionState, old: RegionState, weight: f64) {
        self.counts[new.index()][old.index()] += weight;
    }

    /// Update probabilities from accumulated counts and clear the counts.
    ///
    /// Each previous probability value is blended in as a pseudo-count of 1,
    /// so a state with no observations keeps its old distribution instead of
    /// dividing by zero.
    pub fn reestimate(&mut self) {
        for old in 0..2 {
            let mut denom = 0.0;
            for new in 0..2 {
                denom += self.counts[new][old];
            }
            for new in 0..2 {
                self.prob[new][old] = (self.counts[new][old] + self.prob[new][old]) / (denom + 1.0);
                self.counts[new][old] = 0.0;
            }
        }
    }

    /// Pin the chain to spend almost all its time in the edit region, for
    /// the untrained baseline parameterization.
    pub(crate) fn pin_to_edit(&mut self) {
        self.prob[0][0] = 0.00001;
        self.prob[0][1] = 0.00001;
        self.prob[1][0] = 0.99999;
        self.prob[1][1] = 0.99999;
    }
}

impl Default for RegionModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn initial_transitions_favor_staying() {
        let m = RegionModel::new();
        assert!((m.transition_prob(RegionState::NoEdit, RegionState::NoEdit) - 0.9).abs() < TOL);
        assert!((m.transition_prob(RegionState::Edit, RegionState::Edit) - 0.9).abs() < TOL);
        assert!((m.transition_prob(RegionState::Edit, RegionState::NoEdit) - 0.1).abs() < TOL);
        assert!((m.transition_prob(RegionState::NoEdit, RegionState::Edit) - 0.1).abs() < TOL);
    }

    #[test]
    fn reestimate_normalizes_per_old_state() {
        let mut m = RegionModel::new();
        m.accumulate(RegionState::NoEdit, RegionState::NoEdit, 8.0);
        m.accumulate(RegionState::Edit, RegionState::NoEdit, 2.0);
        m.reestimate();

        let stay = m.transition_prob(RegionState::NoEdit, RegionState::NoEdit);
        let leave = m.transition_prob(RegionState::Edit, RegionState::NoEdit);
        assert!((stay + leave - 1.0).abs() < TOL);
        assert!((stay - (8.0 + 0.9) / 11.0).abs() < TOL);
    }

    #[test]
    fn unobserved_state_keeps_old_distribution() {
        let mut m = RegionModel::new();
        m.accumulate(RegionState::NoEdit, RegionState::NoEdit, 5.0);
        m.reestimate();

        // No counts conditioned on Edit: its row is unchanged.
        assert!((m.transition_prob(RegionState::Edit, RegionState::Edit) - 0.9).abs() < TOL);
        assert!((m.transition_prob(RegionState::NoEdit, RegionState::Edit) - 0.1).abs() < TOL);
    }

    #[test]
    fn counts_are_cleared_after_reestimation() {
        let mut m = RegionModel::new();
        m.accumulate(RegionState::Edit, RegionState::Edit, 3.0);
        m.reestimate();
        let after_first = m.transition_prob(RegionState::Edit, RegionState::Edit);
        m.reestimate();
        // Second reestimate sees no counts; the blend keeps the value fixed.
        let after_second = m.transition_prob(RegionState::Edit, RegionState::Edit);
        assert!((after_first - after_second).abs() < TOL);
    }
}
