//! The conditional string-edit transducer and its EM training engine.
//!
//! [`BackoffEditModel`] models p(output string | input string) as a sum over
//! all edit-operation alignments of the pair. Generation interleaves EDIT
//! regions (free choice of COPY/SUBSTITUTE/INSERT/DELETE per character, with
//! backoff-smoothed probabilities) with NOEDIT regions (mandatory copying);
//! a 2-state chain governs the region run lengths. Training runs exact
//! forward-backward over a 4 × (|x|+2) × (|y|+2) lattice and reestimates
//! both sub-models from expected counts.
//!
//! Probabilities are not kept in log space, so the model is appropriate for
//! short strings such as names.
//!
//! The model uses one character of lookahead to choose the next edit
//! operation. The EDIT/NOEDIT region choice itself has no lookahead to the
//! upcoming end-of-string sentinel, which biases insertion probability near
//! string boundaries; that behavior is part of the model definition here and
//! is intentionally left as is.

mod char_pair;
mod edit_model;
mod lattice;
mod operation;
mod region_model;

pub use edit_model::OperationModel;
pub use operation::{EditOp, RegionState};
pub use region_model::RegionModel;

use tracing::{info, warn};

use crate::aligned::AlignedString;
use crate::alphabet::CharacterAlphabet;
use crate::error::{ModelError, Result};
use crate::transducer::char_pair::CharPair;
use crate::transducer::lattice::{Label, Lattice};

/// Fewest EM iterations [`StringEditModel::train`] will run before
/// consulting the convergence test.
pub const MIN_EM_ITER: usize = 25;
/// Hard cap on EM iterations.
pub const MAX_EM_ITER: usize = 50;
/// Relative log-likelihood improvement below which training has converged.
const CONVERGENCE_THRESHOLD: f64 = 1e-4;
/// Tolerance for the forward/backward partition agreement check.
const AGREEMENT_TOL: f64 = 1e-8;

/// One weighted training example: an optional input string, an output
/// string, and a weight.
///
/// An absent input is not the same as an empty one: it is scored against the
/// EOS' sentinel, so the model can learn that insertions conditioned on
/// nothing behave differently from insertions past the end of a real string.
#[derive(Debug, Clone)]
pub struct TrainingPair {
    /// Input (canonical) string, or `None` for the input-less case.
    pub input: Option<AlignedString>,
    /// Output (surface) string.
    pub output: AlignedString,
    /// Multiplicity of this example in the corpus.
    pub weight: f64,
}

impl TrainingPair {
    /// A pair with weight 1.
    pub fn new(input: Option<AlignedString>, output: AlignedString) -> Self {
        TrainingPair {
            input,
            output,
            weight: 1.0,
        }
    }

    /// Set the pair's weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// The contract of a trainable string-edit model.
///
/// Scoring functions are side-effect free; `em_step` and the `train` loops
/// mutate parameters in place.
pub trait StringEditModel {
    /// log p(`output` | `input`), marginalized over all alignments.
    ///
    /// Returns `-inf` when the model structurally cannot produce the pair.
    fn logp(&self, input: Option<&AlignedString>, output: &AlignedString) -> f64;

    /// [`logp`](StringEditModel::logp) for every pair in a batch.
    fn logp_batch(&self, pairs: &[TrainingPair]) -> Vec<f64> {
        pairs
            .iter()
            .map(|p| self.logp(p.input.as_ref(), &p.output))
            .collect()
    }

    /// Weighted corpus log-likelihood under the current parameters.
    ///
    /// Pairs the model cannot explain are excluded (with a warning) rather
    /// than dragging the total to `-inf`.
    fn calc_log_likelihood(&self, corpus: &[TrainingPair]) -> f64;

    /// Run one EM step on a weighted corpus, updating parameters in place.
    ///
    /// Returns the corpus log-likelihood under the parameters *before* the
    /// update. Because of smoothing the log-likelihood is not strictly
    /// guaranteed to improve every step.
    fn em_step(&mut self, corpus: &[TrainingPair]) -> f64;

    /// Run EM to convergence: at least [`MIN_EM_ITER`] iterations, stopping
    /// early once the relative log-likelihood improvement falls below a
    /// fixed threshold, and always stopping at [`MAX_EM_ITER`].
    fn train(&mut self, corpus: &[TrainingPair]);

    /// Run EM, stopping as soon as held-out log-likelihood stops improving
    /// (or at [`MAX_EM_ITER`]).
    fn train_with_dev(&mut self, corpus: &[TrainingPair], dev: &[TrainingPair]);

    /// Generate an output string for `input`.
    ///
    /// Declared by the contract; not implemented by any model in this crate.
    fn sample(&self, input: Option<&AlignedString>) -> Result<AlignedString>;
}

/// The backoff-smoothed conditional edit model.
///
/// Construct one per (frozen) alphabet; the probability tables are sized
/// from the alphabet at construction, so strings whose glyph codes exceed
/// that size must not be scored against it.
///
/// # Example
///
/// ```
/// use stochastic_edit::alphabet::CharacterAlphabet;
/// use stochastic_edit::aligned::AlignedString;
/// use stochastic_edit::transducer::{BackoffEditModel, StringEditModel, TrainingPair};
///
/// let mut alphabet = CharacterAlphabet::new();
/// let x = AlignedString::new("jon", &mut alphabet).unwrap();
/// let y = AlignedString::new("john", &mut alphabet).unwrap();
/// alphabet.freeze();
///
/// let mut model = BackoffEditModel::for_alphabet(&alphabet);
/// let corpus = vec![TrainingPair::new(Some(x.clone()), y.clone())];
/// let ll = model.em_step(&corpus);
/// assert!(ll.is_finite() && ll < 0.0);
/// assert!(model.logp(Some(&x), &y).is_finite());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BackoffEditModel {
    in_size: usize,
    out_size: usize,
    regions: RegionModel,
    ops: OperationModel,
}

impl BackoffEditModel {
    /// Untrained model for input/output alphabets of the given sizes
    /// (excluding sentinels).
    pub fn new(in_size: usize, out_size: usize) -> Self {
        BackoffEditModel {
            in_size,
            out_size,
            regions: RegionModel::new(),
            ops: OperationModel::new(in_size, out_size),
        }
    }

    /// Untrained model sized for `alphabet`, which conventionally is frozen
    /// before training begins.
    pub fn for_alphabet(alphabet: &CharacterAlphabet) -> Self {
        Self::new(alphabet.len(), alphabet.len())
    }

    /// The untrained baseline parameterization: the region chain is pinned
    /// to the edit region and smoothing is made overwhelming, so scores
    /// reduce to a plain stochastic edit distance.
    pub fn baseline(in_size: usize, out_size: usize) -> Self {
        let mut model = Self::new(in_size, out_size);
        model.regions.pin_to_edit();
        model.ops.set_smoothing(1e10);
        model
    }

    /// Input alphabet size, excluding sentinels.
    pub fn input_size(&self) -> usize {
        self.in_size
    }

    /// Output alphabet size, excluding sentinels.
    pub fn output_size(&self) -> usize {
        self.out_size
    }

    /// The region chain.
    pub fn regions(&self) -> &RegionModel {
        &self.regions
    }

    /// The edit-operation model.
    pub fn operations(&self) -> &OperationModel {
        &self.ops
    }

    /// Fill the forward table: `alpha[label][i][j]` is the total probability
    /// of all paths that reach `label` having consumed `i` input and `j`
    /// output characters.
    fn forward_pass(&self, x: Option<&AlignedString>, y: &AlignedString) -> Lattice {
        let xlen = x.map_or(0, AlignedString::len);
        let ylen = y.len();
        let mut alpha = Lattice::new(xlen, ylen);

        alpha.set(Label::NoEdit, 0, 0, 1.0);
        for i in 0..=xlen {
            for j in 0..=ylen {
                let cp = CharPair::resolve(x, y, i, j, self.in_size, self.out_size);

                let settled_noedit = alpha.get(Label::NoEdit, i, j);
                let settled_edit = alpha.get(Label::Edit, i, j);
                let pre_noedit = settled_noedit
                    * self.regions.transition_prob(RegionState::NoEdit, RegionState::NoEdit)
                    + settled_edit
                        * self.regions.transition_prob(RegionState::NoEdit, RegionState::Edit);
                let pre_edit = settled_noedit
                    * self.regions.transition_prob(RegionState::Edit, RegionState::NoEdit)
                    + settled_edit
                        * self.regions.transition_prob(RegionState::Edit, RegionState::Edit);
                alpha.add(Label::PreNoEdit, i, j, pre_noedit);
                alpha.add(Label::PreEdit, i, j, pre_edit);

                if cp.equal {
                    // Mandatory copy out of the no-edit decision state.
                    alpha.add(Label::NoEdit, i + 1, j + 1, pre_noedit);
                    alpha.add(
                        Label::Edit,
                        i + 1,
                        j + 1,
                        pre_edit * self.ops.prob(cp.y, EditOp::Copy, cp.x),
                    );
                }
                alpha.add(
                    Label::Edit,
                    i + 1,
                    j + 1,
                    pre_edit * self.ops.prob(cp.y, EditOp::Substitute, cp.x),
                );
                alpha.add(
                    Label::Edit,
                    i,
                    j + 1,
                    pre_edit * self.ops.prob(cp.y, EditOp::Insert, cp.x),
                );
                alpha.add(
                    Label::Edit,
                    i + 1,
                    j,
                    pre_edit * self.ops.prob(cp.y, EditOp::Delete, cp.x),
                );
            }
        }
        alpha
    }

    /// The backward pass for one pair, accumulating expected counts into
    /// both sub-models as it sweeps. `scale` is `weight / Z`.
    ///
    /// Mechanically the mirror image of [`forward_pass`]; returns the
    /// backward partition function `beta[NOEDIT][0][0]`.
    ///
    /// [`forward_pass`]: BackoffEditModel::forward_pass
    fn backward_accumulate(
        &mut self,
        x: Option<&AlignedString>,
        y: &AlignedString,
        alpha: &Lattice,
        scale: f64,
    ) -> f64 {
        let xlen = x.map_or(0, AlignedString::len);
        let ylen = y.len();
        let mut beta = Lattice::new(xlen, ylen);

        beta.set(Label::NoEdit, xlen + 1, ylen + 1, 1.0);
        for i in (0..=xlen).rev() {
            for j in (0..=ylen).rev() {
                let cp = CharPair::resolve(x, y, i, j, self.in_size, self.out_size);

                if cp.equal {
                    beta.add(Label::PreNoEdit, i, j, beta.get(Label::NoEdit, i + 1, j + 1));
                    let p_copy = self.ops.prob(cp.y, EditOp::Copy, cp.x);
                    let down = beta.get(Label::Edit, i + 1, j + 1);
                    beta.add(Label::PreEdit, i, j, p_copy * down);
                    self.ops.accumulate(
                        cp.y,
                        EditOp::Copy,
                        cp.x,
                        alpha.get(Label::PreEdit, i, j) * p_copy * down * scale,
                    );
                }
                let p_sub = self.ops.prob(cp.y, EditOp::Substitute, cp.x);
                let p_ins = self.ops.prob(cp.y, EditOp::Insert, cp.x);
                let p_del = self.ops.prob(cp.y, EditOp::Delete, cp.x);
                let down_sub = beta.get(Label::Edit, i + 1, j + 1);
                let down_ins = beta.get(Label::Edit, i, j + 1);
                let down_del = beta.get(Label::Edit, i + 1, j);
                beta.add(Label::PreEdit, i, j, p_sub * down_sub);
                beta.add(Label::PreEdit, i, j, p_ins * down_ins);
                beta.add(Label::PreEdit, i, j, p_del * down_del);
                let up = alpha.get(Label::PreEdit, i, j);
                self.ops
                    .accumulate(cp.y, EditOp::Substitute, cp.x, up * p_sub * down_sub * scale);
                self.ops
                    .accumulate(cp.y, EditOp::Insert, cp.x, up * p_ins * down_ins * scale);
                self.ops
                    .accumulate(cp.y, EditOp::Delete, cp.x, up * p_del * down_del * scale);

                let pre_noedit = beta.get(Label::PreNoEdit, i, j);
                let pre_edit = beta.get(Label::PreEdit, i, j);
                for old in RegionState::ALL {
                    let settled = match old {
                        RegionState::NoEdit => Label::NoEdit,
                        RegionState::Edit => Label::Edit,
                    };
                    let to_noedit = self.regions.transition_prob(RegionState::NoEdit, old);
                    let to_edit = self.regions.transition_prob(RegionState::Edit, old);
                    beta.add(settled, i, j, to_noedit * pre_noedit + to_edit * pre_edit);
                    let up = alpha.get(settled, i, j);
                    self.regions
                        .accumulate(RegionState::NoEdit, old, up * to_noedit * pre_noedit * scale);
                    self.regions
                        .accumulate(RegionState::Edit, old, up * to_edit * pre_edit * scale);
                }
            }
        }
        beta.get(Label::NoEdit, 0, 0)
    }
}

impl StringEditModel for BackoffEditModel {
    fn logp(&self, input: Option<&AlignedString>, output: &AlignedString) -> f64 {
        let xlen = input.map_or(0, AlignedString::len);
        let ylen = output.len();
        let alpha = self.forward_pass(input, output);
        alpha.get(Label::NoEdit, xlen + 1, ylen + 1).ln()
    }

    fn calc_log_likelihood(&self, corpus: &[TrainingPair]) -> f64 {
        let mut total = 0.0;
        for (k, pair) in corpus.iter().enumerate() {
            let lp = self.logp(pair.input.as_ref(), &pair.output);
            if lp.is_finite() {
                total += pair.weight * lp;
            } else {
                warn!(
                    pair = k,
                    output = pair.output.as_str(),
                    "pair has zero probability; excluded from log-likelihood"
                );
            }
        }
        total
    }

    fn em_step(&mut self, corpus: &[TrainingPair]) -> f64 {
        let mut corpus_ll = 0.0;
        let mut skipped = 0usize;

        for (k, pair) in corpus.iter().enumerate() {
            let x = pair.input.as_ref();
            let y = &pair.output;
            let xlen = x.map_or(0, AlignedString::len);
            let ylen = y.len();

            let alpha = self.forward_pass(x, y);
            let z = alpha.get(Label::NoEdit, xlen + 1, ylen + 1);
            if z == 0.0 {
                // The model cannot explain this pair; it contributes
                // neither counts nor log-likelihood.
                warn!(
                    pair = k,
                    output = y.as_str(),
                    "forward probability is 0; skipping pair"
                );
                skipped += 1;
                continue;
            }
            corpus_ll += pair.weight * z.ln();

            let scale = pair.weight / z;
            let z_reverse = self.backward_accumulate(x, y, &alpha, scale);
            debug_assert!(
                (z - z_reverse).abs() < AGREEMENT_TOL,
                "forward probability != backward probability ({} != {})",
                z,
                z_reverse
            );
        }

        if skipped > 0 {
            warn!(skipped, total = corpus.len(), "pairs skipped this EM step");
        }
        self.regions.reestimate();
        self.ops.reestimate();
        corpus_ll
    }

    fn train(&mut self, corpus: &[TrainingPair]) {
        let mut prev = f64::NEG_INFINITY;
        for iter in 0..MAX_EM_ITER {
            let ll = self.em_step(corpus);
            info!(iter, log_likelihood = ll, "EM iteration");
            if iter + 1 >= MIN_EM_ITER && converged(prev, ll) {
                break;
            }
            prev = ll;
        }
    }

    fn train_with_dev(&mut self, corpus: &[TrainingPair], dev: &[TrainingPair]) {
        let mut prev_dev = f64::NEG_INFINITY;
        for iter in 0..MAX_EM_ITER {
            let ll = self.em_step(corpus);
            let dev_ll = self.calc_log_likelihood(dev);
            info!(
                iter,
                log_likelihood = ll,
                dev_log_likelihood = dev_ll,
                "EM iteration"
            );
            if dev_ll <= prev_dev {
                break;
            }
            prev_dev = dev_ll;
        }
    }

    fn sample(&self, _input: Option<&AlignedString>) -> Result<AlignedString> {
        Err(ModelError::Unsupported("sample"))
    }
}

/// Relative-improvement convergence test on successive log-likelihoods.
fn converged(prev: f64, current: f64) -> bool {
    if prev == 0.0 {
        return true;
    }
    prev.is_finite() && 1.0 - current / prev < CONVERGENCE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(
        x: Option<&str>,
        y: &str,
        alphabet: &mut CharacterAlphabet,
    ) -> TrainingPair {
        let input = x.map(|s| AlignedString::new(s, alphabet).unwrap());
        let output = AlignedString::new(y, alphabet).unwrap();
        TrainingPair::new(input, output)
    }

    #[test]
    fn forward_backward_agreement_holds_across_iterations() {
        // The debug assertion inside em_step checks |Z_fwd - Z_bwd| < 1e-8
        // for every pair; exercise it over several shapes and iterations.
        let mut alphabet = CharacterAlphabet::new();
        let corpus = vec![
            pair(Some("smith"), "smyth", &mut alphabet),
            pair(Some("jon"), "john", &mut alphabet),
            pair(Some("ann"), "an", &mut alphabet),
            pair(None, "lee", &mut alphabet),
            pair(Some(""), "x", &mut alphabet),
        ];
        let mut model = BackoffEditModel::new(alphabet.len(), alphabet.len());
        for _ in 0..5 {
            model.em_step(&corpus);
        }
    }

    #[test]
    fn em_step_returns_pre_update_likelihood() {
        let mut alphabet = CharacterAlphabet::new();
        let corpus = vec![pair(Some("ab"), "ab", &mut alphabet)];
        let mut model = BackoffEditModel::new(alphabet.len(), alphabet.len());

        let before = model.calc_log_likelihood(&corpus);
        let reported = model.em_step(&corpus);
        assert!((before - reported).abs() < 1e-12);
    }

    #[test]
    fn weights_scale_the_reported_likelihood() {
        let mut alphabet = CharacterAlphabet::new();
        let p1 = pair(Some("ab"), "ba", &mut alphabet);
        let p2 = p1.clone().with_weight(3.0);

        let mut m1 = BackoffEditModel::new(alphabet.len(), alphabet.len());
        let mut m2 = m1.clone();
        let ll1 = m1.em_step(&[p1]);
        let ll2 = m2.em_step(&[p2]);
        assert!((3.0 * ll1 - ll2).abs() < 1e-9);
    }

    #[test]
    fn zero_probability_pair_is_skipped_without_contaminating_counts() {
        let mut alphabet = CharacterAlphabet::new();
        let bad = pair(Some("a"), "b", &mut alphabet);
        let good = pair(Some("a"), "a", &mut alphabet);
        let n = alphabet.len();
        let b = alphabet.get('b').unwrap() as usize;

        // Make 'b' unproducible: no insertion of it and no substitution to
        // it, from any conditioning character.
        let cripple = |model: &mut BackoffEditModel| {
            model.ops.p_char_ins[b] = 0.0;
            for chx in 0..n + 2 {
                model.ops.p_char_sub[b][chx] = 0.0;
            }
        };

        let mut model = BackoffEditModel::new(n, n);
        cripple(&mut model);
        assert_eq!(model.logp(bad.input.as_ref(), &bad.output), f64::NEG_INFINITY);

        // Alone, the dead pair contributes nothing.
        let ll = model.em_step(std::slice::from_ref(&bad));
        assert_eq!(ll, 0.0);
        // Unobserved region transitions keep their prior values: had the
        // pair been counted, they would have moved.
        let p_stay = model
            .regions()
            .transition_prob(RegionState::NoEdit, RegionState::NoEdit);
        assert!((p_stay - 0.9).abs() < 1e-12);

        // Mixed with a live pair, the result matches training on the live
        // pair only.
        let mut with_bad = BackoffEditModel::new(n, n);
        cripple(&mut with_bad);
        let mut without_bad = with_bad.clone();
        let ll_mixed = with_bad.em_step(&[bad.clone(), good.clone()]);
        let ll_clean = without_bad.em_step(std::slice::from_ref(&good));
        assert!((ll_mixed - ll_clean).abs() < 1e-12);
        assert!(
            (with_bad.logp(good.input.as_ref(), &good.output)
                - without_bad.logp(good.input.as_ref(), &good.output))
            .abs()
                < 1e-12
        );
    }

    #[test]
    fn sample_is_unsupported() {
        let mut alphabet = CharacterAlphabet::new();
        let s = AlignedString::new("a", &mut alphabet).unwrap();
        let model = BackoffEditModel::new(alphabet.len(), alphabet.len());
        match model.sample(Some(&s)) {
            Err(ModelError::Unsupported(_)) => {}
            other => panic!("expected Unsupported, got {:?}", other),
        }
    }

    #[test]
    fn baseline_lives_in_the_edit_region() {
        let model = BackoffEditModel::baseline(3, 3);
        let leave = model
            .regions()
            .transition_prob(RegionState::NoEdit, RegionState::Edit);
        assert!(leave < 1e-4);
    }

    #[test]
    fn empty_pair_scores_one_noedit_transition() {
        let mut alphabet = CharacterAlphabet::new();
        alphabet.index_of('a').unwrap();
        let empty_in = AlignedString::new("", &mut alphabet).unwrap();
        let empty_out = AlignedString::new("", &mut alphabet).unwrap();
        let model = BackoffEditModel::new(alphabet.len(), alphabet.len());
        // The only path is the mandatory no-edit consuming the EOS pair.
        let lp = model.logp(Some(&empty_in), &empty_out);
        assert!((lp - 0.9f64.ln()).abs() < 1e-12);
    }
}
