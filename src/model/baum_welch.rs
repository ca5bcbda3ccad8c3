//! Baum-Welch re-estimation.
//!
//! Notation:
//! - gamma[[t, s]]: probability of being in `s` at `t` given the sequence
//! - xi[[t, i, j]]: probability of being in `i` at `t` and in `j` at `t + 1`
//!
//! Sequences update `A`, `B` and `pi` one after another, in place, so the
//! order of the training sequences shapes the trajectory within an iteration.
//!
//! Only `pi[order - 1]` is re-estimated. The earlier start distributions of a
//! model with order greater than one keep the values they were built with.

use ndarray::{s, Array1};
use tracing::{debug, info, warn};

use super::Hmm;
use crate::config::{validate_smoothing, LearnOptions};
use crate::error::HmmResult;
use crate::states::Symbol;
use crate::utils::{zeros_2d, zeros_3d};

impl<O: Symbol, S: Symbol> Hmm<O, S> {

    /// Learning problem: re-estimate `(A, B, pi)` until the mean log-likelihood
    /// of `sequences` stops moving by more than `options.delta`.
    ///
    /// Returns the number of iterations performed, 0 for an empty corpus.
    pub fn learn(&mut self, sequences: &[Vec<O>], options: &LearnOptions) -> HmmResult<usize> {
        validate_smoothing(options.k_smoothing)?;
        if sequences.is_empty() {
            return Ok(0);
        }
        let encoded = sequences
            .iter()
            .map(|sequence| self.encode(sequence))
            .collect::<HmmResult<Vec<Vec<usize>>>>()?;

        let mut prior_score = self.mean_log_likelihood(&encoded);
        let mut iterations = 0;
        loop {
            for obs in &encoded {
                self.train(obs, options.k_smoothing);
            }
            iterations += 1;

            let new_score = self.mean_log_likelihood(&encoded);
            debug!(iteration = iterations, score = new_score, "baum-welch iteration");
            if !new_score.is_finite() {
                warn!("mean log-likelihood is {} after {} iterations", new_score, iterations);
            }

            let change = (prior_score - new_score).abs();
            // NaN when both scores are -inf, nothing left to improve
            if change.is_nan() || change < options.delta {
                info!("Converged after {} iterations", iterations);
                break;
            }
            if let Some(max_iterations) = options.max_iterations {
                if iterations >= max_iterations {
                    info!("Stopped after {} iterations without converging", iterations);
                    break;
                }
            }
            prior_score = new_score;
        }
        Ok(iterations)
    }

    fn mean_log_likelihood(&self, encoded: &[Vec<usize>]) -> f64 {
        let total: f64 = encoded.iter().map(|obs| self.likelihood(obs).ln()).sum();
        total / encoded.len() as f64
    }

    /// One expectation-maximization update from a single sequence.
    fn train(&mut self, obs: &[usize], k_smoothing: f64) {
        let len = obs.len();
        if len == 0 {
            return;
        }
        let nstates = self.nstates();
        let nobs = self.params.all_obs.len();

        let alphas = self.forward(obs);
        let betas = self.backward(obs);

        let mut gammas = zeros_2d(len, nstates);
        for t in 0..len {
            let r = &alphas.row(t) * &betas.row(t);
            let s = r.sum();
            if s != 0.0 {
                gammas.row_mut(t).assign(&(&r / s));
            }
        }

        let mut xis = zeros_3d(len - 1, nstates, nstates);
        for t in 0..len - 1 {
            let weighted = &betas.row(t + 1) * &self.emissions(obs[t + 1]);
            let mut denominator = 0.0;
            for state_from in 0..nstates {
                for state_to in 0..nstates {
                    let p = alphas[[t, state_from]] * self.params.a[[state_from, state_to]] * weighted[state_to];
                    xis[[t, state_from, state_to]] = p;
                    denominator += p;
                }
            }
            // degenerate step, contributes nothing
            if denominator == 0.0 {
                continue;
            }
            xis.slice_mut(s![t, .., ..]).mapv_inplace(|x| x / denominator);
        }

        let k = k_smoothing;
        let n = nstates as f64;
        let last = self.order - 1;
        for state in 0..nstates {
            if let Some(i) = self.start_index[last][state] {
                self.params.pi[last].probs[i] = (gammas[[0, state]] + k) / (1.0 + n * k);
            }

            let mut gamma_sum = gammas.slice(s![..len - 1, state]).sum();
            if gamma_sum == 0.0 {
                self.params.a.row_mut(state).fill(0.0);
            } else {
                for state_to in 0..nstates {
                    let xi_sum = xis.slice(s![.., state, state_to]).sum();
                    self.params.a[[state, state_to]] = (xi_sum + k) / (gamma_sum + n * k);
                }
            }

            // composite states sharing a single state overwrite the same B row
            gamma_sum += gammas[[len - 1, state]];
            let single = self.emitter[state];
            if gamma_sum == 0.0 {
                self.params.b.row_mut(single).fill(0.0);
            } else {
                let mut mass = Array1::<f64>::zeros(nobs);
                for t in 0..len {
                    mass[obs[t]] += gammas[[t, state]];
                }
                let denominator = gamma_sum + len as f64 * k;
                for o in 0..nobs {
                    self.params.b[[single, o]] = (mass[o] + k) / denominator;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LearnOptions;
    use crate::model::tests::{fever_model, second_order_model};
    use crate::model::Hmm;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn corpus() -> Vec<Vec<&'static str>> {
        vec![
            vec!["normal", "cold", "dizzy", "normal", "normal"],
            vec!["normal", "cold", "normal", "dizzy", "normal"],
            vec!["dizzy", "dizzy", "dizzy", "cold", "normal"],
            vec!["dizzy", "dizzy", "normal", "normal", "normal"],
            vec!["cold", "cold", "dizzy", "normal", "normal"],
            vec!["normal", "dizzy", "dizzy", "normal", "cold"],
        ]
    }

    #[test]
    fn test_learn_empty_corpus() {
        let mut hmm = fever_model();
        let before = hmm.parameters().clone();
        assert_eq!(hmm.learn(&[], &LearnOptions::default()).unwrap(), 0);
        assert_eq!(hmm.parameters(), &before);
    }

    #[test]
    fn test_learn_converges() {
        let mut hmm = fever_model();
        let options = LearnOptions::default().with_smoothing(0.005);
        let iterations = hmm.learn(&corpus(), &options).unwrap();
        assert!(iterations > 0);

        let sequence = ["normal", "cold", "dizzy", "dizzy", "cold", "normal"];
        let p = hmm.evaluate(&sequence).unwrap();
        assert!(p > 0.0 && p < 1.0);
        assert_eq!(hmm.decode(&sequence).unwrap().len(), sequence.len());

        // first order: every re-estimated transition row still sums to one
        for row in hmm.parameters().a.rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_learn_respects_iteration_cap() {
        let mut hmm = fever_model();
        let options = LearnOptions::default().with_delta(0.0).with_smoothing(0.005).with_max_iterations(3);
        assert_eq!(hmm.learn(&corpus(), &options).unwrap(), 3);
    }

    #[test]
    fn test_unsmoothed_learning_collapses_and_stops() {
        // one sequence never shows every symbol, so without smoothing the
        // next sequence gets probability 0 and the score stays at -inf
        let mut hmm = fever_model();
        let iterations = hmm.learn(&corpus(), &LearnOptions::default()).unwrap();
        assert_eq!(iterations, 2);
        assert_eq!(hmm.evaluate(&["normal"]).unwrap(), 0.0);
    }

    #[test]
    fn test_learn_keeps_early_start_distributions() {
        let mut hmm = second_order_model();
        let before = hmm.parameters().pi[0].clone();
        let iterations = hmm.learn(&corpus(), &LearnOptions::default().with_smoothing(0.01)).unwrap();
        assert!(iterations > 0);
        assert_eq!(hmm.parameters().pi[0], before);
        assert_relative_eq!(hmm.parameters().pi[1].sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_update_by_hand() {
        let mut hmm = fever_model();
        let obs = [0, 1, 2, 2];
        let k = 0.1;

        let alphas = hmm.forward(&obs);
        let betas = hmm.backward(&obs);
        let likelihood = alphas.row(3).sum();
        let gamma0 = alphas[[0, 0]] * betas[[0, 0]] / likelihood;

        hmm.train(&obs, k);
        let params = hmm.parameters();

        // (gamma + k) / (1 + n * k)
        assert_relative_eq!(params.pi[0].probs[0], (gamma0 + k) / 1.2, max_relative = 1e-12);
        assert_relative_eq!(params.pi[0].probs[0], 0.8117576011658781, max_relative = 1e-12);
        assert_relative_eq!(params.pi[0].sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(params.a[[0, 1]], 0.5495305865779613, max_relative = 1e-12);
        assert_relative_eq!(params.a.row(0).sum(), 1.0, epsilon = 1e-12);
        // B is smoothed over the sequence length, not the vocabulary size
        assert_relative_eq!(params.b[[0, 0]], 0.45312008112573093, max_relative = 1e-12);
        assert_relative_eq!(params.b.row(0).sum(), 0.9534836425230325, max_relative = 1e-12);
    }

    #[test]
    fn test_unreachable_state_gets_zero_rows() {
        let mut hmm = Hmm::from_parameters(
            array![[0.5, 0.5, 0.0], [0.5, 0.5, 0.0], [0.3, 0.3, 0.4]],
            array![[0.9, 0.1], [0.2, 0.8], [0.5, 0.5]],
            vec![vec![(vec!['a'], 0.5), (vec!['b'], 0.5), (vec!['c'], 0.0)]],
            vec!['x', 'y'],
            vec![vec!['a'], vec!['b'], vec!['c']],
            vec!['a', 'b', 'c'],
        )
        .unwrap();
        hmm.train(&[0, 1, 0], 0.0);
        let params = hmm.parameters();

        assert_eq!(params.a.row(2).sum(), 0.0);
        assert_eq!(params.b.row(2).sum(), 0.0);
        assert_eq!(params.pi[0].probs[2], 0.0);
        assert_relative_eq!(params.a[[0, 1]], 0.8043478260869565, max_relative = 1e-12);
        assert_relative_eq!(params.b[[1, 1]], 0.7096774193548387, max_relative = 1e-12);
        assert_relative_eq!(params.pi[0].probs[0], 0.8181818181818181, max_relative = 1e-12);
    }

    #[test]
    fn test_impossible_sequence_skips_every_step() {
        // nothing emits 'y'
        let mut hmm = Hmm::from_parameters(
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[1.0, 0.0], [1.0, 0.0]],
            vec![vec![(vec!['a'], 0.5), (vec!['b'], 0.5)]],
            vec!['x', 'y'],
            vec![vec!['a'], vec!['b']],
            vec!['a', 'b'],
        )
        .unwrap();
        hmm.train(&[0, 1], 0.1);
        let params = hmm.parameters();

        assert!(params.a.iter().chain(params.b.iter()).all(|&p| p == 0.0));
        // only the smoothing is left in pi
        assert_relative_eq!(params.pi[0].probs[0], 0.1 / 1.2, max_relative = 1e-12);
        assert_relative_eq!(params.pi[0].probs[1], 0.1 / 1.2, max_relative = 1e-12);
    }

    #[test]
    fn test_learn_rejects_negative_smoothing() {
        let mut hmm = fever_model();
        let options = LearnOptions::default().with_smoothing(-1.0);
        assert!(hmm.learn(&corpus(), &options).is_err());
    }
}
