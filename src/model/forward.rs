use ndarray::Array2;

use super::Hmm;
use crate::states::Symbol;
use crate::utils::zeros_2d;

impl<O: Symbol, S: Symbol> Hmm<O, S> {

    /// Forward probabilities, one row per time step and one column per composite state.
    pub(super) fn forward(&self, obs: &[usize]) -> Array2<f64> {
        let nstates = self.nstates();
        let mut alphas = zeros_2d(obs.len(), nstates);
        if obs.is_empty() {
            return alphas;
        }

        for state in 0..nstates {
            alphas[[0, state]] = self.start_prob(0, state) * self.emission(state, obs[0]);
        }

        for t in 1..obs.len() {
            if t < self.order {
                // the start distribution does not depend on the source state
                let mass = alphas.row(t - 1).sum();
                for state in 0..nstates {
                    alphas[[t, state]] = mass * self.start_prob(t, state) * self.emission(state, obs[t]);
                }
            } else {
                let bmul = self.emissions(obs[t]);
                let new_values = alphas.row(t - 1).dot(&self.params.a) * &bmul;
                alphas.row_mut(t).assign(&new_values);
            }
        }
        alphas
    }

    /// Backward probabilities, laid out like [`Hmm::forward`].
    pub(super) fn backward(&self, obs: &[usize]) -> Array2<f64> {
        let nstates = self.nstates();
        let mut betas = zeros_2d(obs.len(), nstates);
        if obs.is_empty() {
            return betas;
        }

        betas.row_mut(obs.len() - 1).fill(1.0);
        for t in (0..obs.len() - 1).rev() {
            let bmul = self.emissions(obs[t + 1]);
            let weighted = &betas.row(t + 1) * &bmul;
            if t + 1 < self.order {
                let mut mass = 0.0;
                for state_to in 0..nstates {
                    mass += weighted[state_to] * self.start_prob(t + 1, state_to);
                }
                betas.row_mut(t).fill(mass);
            } else {
                let new_values = self.params.a.dot(&weighted);
                betas.row_mut(t).assign(&new_values);
            }
        }
        betas
    }
}

#[cfg(test)]
mod tests {
    use crate::model::tests::{fever_model, second_order_model};
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_by_hand() {
        let hmm = fever_model();
        let alphas = hmm.forward(&[0, 1]);
        assert_relative_eq!(alphas[[0, 0]], 0.3, max_relative = 1e-12);
        assert_relative_eq!(alphas[[0, 1]], 0.04, max_relative = 1e-12);
        assert_relative_eq!(alphas[[1, 0]], 0.0904, max_relative = 1e-12);
        assert_relative_eq!(alphas[[1, 1]], 0.0342, max_relative = 1e-12);
        assert_relative_eq!(hmm.evaluate(&["normal", "cold"]).unwrap(), 0.1246, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_sequence() {
        let hmm = fever_model();
        assert_eq!(hmm.forward(&[]).nrows(), 0);
        assert_eq!(hmm.backward(&[]).nrows(), 0);
        assert_eq!(hmm.evaluate(&[]).unwrap(), 0.0);
    }

    #[test]
    fn test_alpha_beta_agree_at_every_step() {
        let obs = [0, 1, 2, 2, 1, 0];
        for hmm in &[fever_model(), second_order_model()] {
            let alphas = hmm.forward(&obs);
            let betas = hmm.backward(&obs);
            let likelihood = alphas.row(obs.len() - 1).sum();
            assert!(likelihood > 0.0 && likelihood < 1.0);
            for t in 0..obs.len() {
                let total = (&alphas.row(t) * &betas.row(t)).sum();
                assert_relative_eq!(total, likelihood, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn test_second_order_start() {
        let hmm = second_order_model();
        // t = 0: pi[0] of the newest single state, split between the two pairs ending in it
        let alphas = hmm.forward(&[1, 0]);
        let healthy = 0.2863247863247863 * 0.8560228082679971;
        let fever = 0.7136752136752137 * 0.07170888333927934;
        assert_relative_eq!(alphas[[0, 0]], healthy / 2.0, max_relative = 1e-12);
        assert_relative_eq!(alphas[[0, 2]], healthy / 2.0, max_relative = 1e-12);
        assert_relative_eq!(alphas.row(0).sum(), healthy + fever, max_relative = 1e-12);
        // t = 1: pi[1] of the whole pair
        assert_relative_eq!(
            alphas[[1, 3]],
            (healthy + fever) * 0.5696022727272727 * 0.5711737424188371,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_likelihoods_of_all_sequences_sum_to_one() {
        for hmm in &[fever_model(), second_order_model()] {
            let mut total = 0.0;
            for a in 0..3 {
                for b in 0..3 {
                    for c in 0..3 {
                        total += hmm.likelihood(&[a, b, c]);
                    }
                }
            }
            assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        }
    }
}
