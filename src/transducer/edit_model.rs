//! The backoff-smoothed edit-operation model.

use crate::transducer::operation::EditOp;

/// Default strength of backoff smoothing.
const DEFAULT_LAMBDA: f64 = 3.0;

/// Untrained backoff distribution over {SUBSTITUTE, INSERT, COPY, DELETE},
/// in table-index order. Nonzero everywhere so the first forward pass has
/// something to work with.
const INITIAL_OP_BACKOFF: [f64; 4] = [0.1, 0.1, 0.6, 0.2];

/// Model of p(op | input char) · p(output char if any | op, input char),
/// with backoff smoothing in both factors.
///
/// Input codes run over the alphabet plus the two end sentinels
/// (`in_size` = EOS, `in_size + 1` = EOS'); output codes likewise. Each
/// conditional table is blended with a more general parent (a global
/// operation distribution, and a global output-character distribution
/// pooling INSERT and SUBSTITUTE) at fixed strength λ, so unseen events
/// keep nonzero probability.
///
/// Every probability table has a mirror count accumulator; counts are added
/// during the backward sweep of training and consumed by
/// [`reestimate`](OperationModel::reestimate).
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OperationModel {
    in_size: usize,
    out_size: usize,
    lambda: f64,

    /// `p_op[op][chx]` = p(op | chx), rows in [`EditOp`] index order.
    pub(crate) p_op: [Vec<f64>; 4],
    /// `p_op_backoff[op]` = p(op).
    p_op_backoff: [f64; 4],
    /// `p_char_ins[chy]` = p(chy | INSERT).
    pub(crate) p_char_ins: Vec<f64>,
    /// `p_char_sub[chy][chx]` = p(chy | SUBSTITUTE, chx).
    pub(crate) p_char_sub: Vec<Vec<f64>>,
    /// `p_char_sub_backoff[chy]` = p(chy | SUBSTITUTE).
    p_char_sub_backoff: Vec<f64>,
    /// `p_char_backoff[chy]` = p(chy | INSERT or SUBSTITUTE).
    p_char_backoff: Vec<f64>,

    c_op: [Vec<f64>; 4],
    c_op_denom: Vec<f64>,
    c_op_backoff: [f64; 4],
    c_op_backoff_denom: f64,
    c_char_ins: Vec<f64>,
    c_char_ins_denom: f64,
    c_char_sub: Vec<Vec<f64>>,
    c_char_sub_denom: Vec<f64>,
    c_char_sub_backoff: Vec<f64>,
    c_char_sub_backoff_denom: f64,
    c_char_backoff: Vec<f64>,
    c_char_backoff_denom: f64,
}

impl OperationModel {
    /// Build an untrained model for the given alphabet sizes (without
    /// sentinels). The initial probabilities are fully backed off.
    pub fn new(in_size: usize, out_size: usize) -> Self {
        let in_codes = in_size + 2;
        let out_codes = out_size + 2;
        let mut model = OperationModel {
            in_size,
            out_size,
            lambda: DEFAULT_LAMBDA,
            p_op: std::array::from_fn(|_| vec![0.0; in_codes]),
            p_op_backoff: INITIAL_OP_BACKOFF,
            p_char_ins: vec![0.0; out_codes],
            p_char_sub: vec![vec![0.0; in_codes]; out_codes],
            p_char_sub_backoff: vec![0.0; out_codes],
            p_char_backoff: vec![0.0; out_codes],
            c_op: std::array::from_fn(|_| vec![0.0; in_codes]),
            c_op_denom: vec![0.0; in_codes],
            c_op_backoff: [0.0; 4],
            c_op_backoff_denom: 0.0,
            c_char_ins: vec![0.0; out_codes],
            c_char_ins_denom: 0.0,
            c_char_sub: vec![vec![0.0; in_codes]; out_codes],
            c_char_sub_denom: vec![0.0; in_codes],
            c_char_sub_backoff: vec![0.0; out_codes],
            c_char_sub_backoff_denom: 0.0,
            c_char_backoff: vec![0.0; out_codes],
            c_char_backoff_denom: 0.0,
        };
        // With zero counts this leaves every estimate at its backoff value.
        model.reestimate();
        model
    }

    /// Number of input codes, including both sentinels.
    pub fn num_input_codes(&self) -> usize {
        self.in_size + 2
    }

    /// Number of output codes, including both sentinels.
    pub fn num_output_codes(&self) -> usize {
        self.out_size + 2
    }

    /// p(`output`, `op` | `input`).
    ///
    /// `output` participates only for INSERT and SUBSTITUTE; for COPY and
    /// DELETE the operation probability alone is returned.
    #[inline]
    pub fn prob(&self, output: usize, op: EditOp, input: usize) -> f64 {
        let p = self.p_op[op.index()][input];
        match op {
            EditOp::Insert => p * self.p_char_ins[output],
            EditOp::Substitute => p * self.p_char_sub[output][input],
            EditOp::Copy | EditOp::Delete => p,
        }
    }

    /// Add `weight` expected observations of an edit, for the next
    /// [`reestimate`](OperationModel::reestimate).
    #[inline]
    pub fn accumulate(&mut self, output: usize, op: EditOp, input: usize, weight: f64) {
        self.c_op[op.index()][input] += weight;
        match op {
            EditOp::Insert => self.c_char_ins[output] += weight,
            EditOp::Substitute => self.c_char_sub[output][input] += weight,
            EditOp::Copy | EditOp::Delete => {}
        }
    }

    /// Update all probability tables from accumulated counts, then clear the
    /// counts.
    ///
    /// Counts are first marginalized into the backoff parents; each estimate
    /// is then (count + λ·parent) / (denominator + λ), computed most-general
    /// first. At the sentinel input codes there is no choice of operation
    /// (only INSERT can happen past the end of the input), so their
    /// probability rows are forced rather than estimated, and the sentinel
    /// output codes are forbidden as INSERT/SUBSTITUTE targets.
    pub fn reestimate(&mut self) {
        // Fill in the marginalized count tables. Sentinel input codes are
        // left out: the forced INSERT there must not tilt the backoff
        // distribution toward INSERT.
        for op in 0..4 {
            for chx in 0..self.in_size {
                self.c_op_denom[chx] += self.c_op[op][chx];
                self.c_op_backoff[op] += self.c_op[op][chx];
            }
            self.c_op_backoff_denom += self.c_op_backoff[op];
        }
        for chy in 0..self.out_size + 2 {
            self.c_char_ins_denom += self.c_char_ins[chy];
            for chx in 0..self.in_size + 2 {
                self.c_char_sub_denom[chx] += self.c_char_sub[chy][chx];
                self.c_char_sub_backoff[chy] += self.c_char_sub[chy][chx];
            }
            self.c_char_sub_backoff_denom += self.c_char_sub_backoff[chy];
            self.c_char_backoff[chy] += self.c_char_ins[chy];
            self.c_char_backoff[chy] += self.c_char_sub_backoff[chy];
            self.c_char_backoff_denom += self.c_char_backoff[chy];
        }

        // Probability estimates, most backed-off first. The backoff row
        // blends in its previous value as a pseudo-count of 1 so an
        // untrained reestimation keeps the prior distribution.
        for op in 0..4 {
            self.p_op_backoff[op] =
                (self.c_op_backoff[op] + self.p_op_backoff[op]) / (self.c_op_backoff_denom + 1.0);
            for chx in 0..self.in_size {
                self.p_op[op][chx] = (self.c_op[op][chx] + self.lambda * self.p_op_backoff[op])
                    / (self.c_op_denom[chx] + self.lambda);
            }
            for chx in self.in_size..self.in_size + 2 {
                self.p_op[op][chx] = if op == EditOp::Insert.index() { 1.0 } else { 0.0 };
            }
        }

        let out = self.out_size as f64;
        for chy in 0..self.out_size {
            // Backs off to all non-sentinel output characters being equally
            // likely.
            self.p_char_backoff[chy] = (self.c_char_backoff[chy] + self.lambda / out)
                / (self.c_char_backoff_denom + self.lambda);
            self.p_char_ins[chy] = (self.c_char_ins[chy]
                + self.lambda * self.p_char_backoff[chy])
                / (self.c_char_ins_denom + self.lambda);
            self.p_char_sub_backoff[chy] = (self.c_char_sub_backoff[chy]
                + self.lambda * self.p_char_backoff[chy])
                / (self.c_char_sub_backoff_denom + self.lambda);
            for chx in 0..self.in_size + 2 {
                self.p_char_sub[chy][chx] = (self.c_char_sub[chy][chx]
                    + self.lambda * self.p_char_sub_backoff[chy])
                    / (self.c_char_sub_denom[chx] + self.lambda);
            }
        }
        for chy in self.out_size..self.out_size + 2 {
            for chx in 0..self.in_size + 2 {
                self.p_char_sub[chy][chx] = 0.0;
            }
        }

        #[cfg(debug_assertions)]
        for chx in 0..self.in_size + 2 {
            let mass = self.operation_mass(chx);
            debug_assert!(
                (mass - 1.0).abs() < 1e-8,
                "probabilities for input code {} sum to {} rather than 1",
                chx,
                mass
            );
        }

        self.reset_counts();
    }

    /// Total probability mass of the four operations at `input`:
    /// p(DELETE) + p(COPY) + Σ p(chy, INSERT) + Σ p(chy, SUBSTITUTE).
    ///
    /// Equals 1 (within numerical tolerance) for every input code of a
    /// well-formed model.
    pub fn operation_mass(&self, input: usize) -> f64 {
        let mut mass = self.prob(0, EditOp::Delete, input) + self.prob(0, EditOp::Copy, input);
        for chy in 0..self.out_size + 2 {
            mass += self.prob(chy, EditOp::Insert, input);
            mass += self.prob(chy, EditOp::Substitute, input);
        }
        mass
    }

    /// Override the backoff smoothing strength.
    pub(crate) fn set_smoothing(&mut self, lambda: f64) {
        self.lambda = lambda;
    }

    fn reset_counts(&mut self) {
        for op in 0..4 {
            self.c_op[op].iter_mut().for_each(|c| *c = 0.0);
            self.c_op_backoff[op] = 0.0;
        }
        self.c_op_denom.iter_mut().for_each(|c| *c = 0.0);
        self.c_op_backoff_denom = 0.0;
        self.c_char_ins.iter_mut().for_each(|c| *c = 0.0);
        self.c_char_ins_denom = 0.0;
        for row in &mut self.c_char_sub {
            row.iter_mut().for_each(|c| *c = 0.0);
        }
        self.c_char_sub_denom.iter_mut().for_each(|c| *c = 0.0);
        self.c_char_sub_backoff.iter_mut().for_each(|c| *c = 0.0);
        self.c_char_sub_backoff_denom = 0.0;
        self.c_char_backoff.iter_mut().for_each(|c| *c = 0.0);
        self.c_char_backoff_denom = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-8;

    #[test]
    fn untrained_model_is_fully_backed_off() {
        let m = OperationModel::new(5, 5);
        for chx in 0..5 {
            assert!((m.prob(0, EditOp::Copy, chx) - 0.6).abs() < TOL);
            assert!((m.prob(0, EditOp::Delete, chx) - 0.2).abs() < TOL);
        }
        // Output characters are uniform under the backoff.
        for chy in 0..5 {
            assert!((m.p_char_ins[chy] - 0.2).abs() < TOL);
        }
    }

    #[test]
    fn operation_mass_is_one_everywhere() {
        let m = OperationModel::new(7, 7);
        for chx in 0..m.num_input_codes() {
            assert!(
                (m.operation_mass(chx) - 1.0).abs() < TOL,
                "mass at {} was {}",
                chx,
                m.operation_mass(chx)
            );
        }
    }

    #[test]
    fn sentinel_inputs_are_forced_to_insert() {
        let m = OperationModel::new(4, 4);
        for chx in [4, 5] {
            assert!((m.p_op[EditOp::Insert.index()][chx] - 1.0).abs() < TOL);
            assert_eq!(m.prob(0, EditOp::Copy, chx), 0.0);
            assert_eq!(m.prob(0, EditOp::Delete, chx), 0.0);
            assert_eq!(m.prob(0, EditOp::Substitute, chx), 0.0);
        }
    }

    #[test]
    fn sentinel_outputs_are_forbidden() {
        let m = OperationModel::new(4, 4);
        for chy in [4, 5] {
            for chx in 0..m.num_input_codes() {
                assert_eq!(m.prob(chy, EditOp::Insert, chx), 0.0);
                assert_eq!(m.prob(chy, EditOp::Substitute, chx), 0.0);
            }
        }
    }

    #[test]
    fn counts_move_estimates_toward_observations() {
        let mut m = OperationModel::new(3, 3);
        let before = m.prob(0, EditOp::Copy, 0);
        m.accumulate(0, EditOp::Copy, 0, 10.0);
        m.reestimate();
        let after = m.prob(0, EditOp::Copy, 0);
        assert!(after > before, "{} should exceed {}", after, before);
        // Mass still normalized after training.
        for chx in 0..m.num_input_codes() {
            assert!((m.operation_mass(chx) - 1.0).abs() < TOL);
        }
    }

    #[test]
    fn reestimate_consumes_counts() {
        let mut m = OperationModel::new(3, 3);
        m.accumulate(1, EditOp::Substitute, 2, 4.0);
        m.reestimate();
        let after_first = m.prob(1, EditOp::Substitute, 2);
        m.reestimate();
        let after_second = m.prob(1, EditOp::Substitute, 2);
        // Backoff decay only; the raw counts must not be applied twice.
        assert!(after_second <= after_first + TOL);
    }
}
