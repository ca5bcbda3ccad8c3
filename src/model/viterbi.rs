use ndarray_stats::QuantileExt;

use super::Hmm;
use crate::states::Symbol;
use crate::utils::{pointers_2d, zeros_2d};

impl<O: Symbol, S: Symbol> Hmm<O, S> {

    /// Most likely composite-state path for a non-empty encoded sequence.
    ///
    /// `delta[[t, s]]` holds the best path probability ending in `s` at `t` and
    /// `psi[[t, s]]` the `(state, time)` it came from. Ties keep the lowest
    /// state index.
    pub(super) fn viterbi(&self, obs: &[usize]) -> Vec<usize> {
        let nstates = self.nstates();
        let len = obs.len();
        if nstates == 0 {
            return Vec::new();
        }
        let mut delta = zeros_2d(len, nstates);
        let mut psi = pointers_2d(len, nstates);

        for state in 0..nstates {
            delta[[0, state]] = self.start_prob(0, state) * self.emission(state, obs[0]);
        }

        for t in 1..len {
            for state_to in 0..nstates {
                let emit_prob = self.emission(state_to, obs[t]);
                // nothing to maximize, this state cannot have produced obs[t]
                if emit_prob == 0.0 {
                    continue;
                }
                let transitions = self.transitions_to(state_to, t);
                let probs = &delta.row(t - 1) * &transitions * emit_prob;
                let state_from = probs.argmax().unwrap_or(0);
                if probs[state_from] > 0.0 {
                    delta[[t, state_to]] = probs[state_from];
                    psi[[t, state_to]] = (state_from, t - 1);
                }
            }
        }

        let end_state = delta.row(len - 1).argmax().unwrap_or(0);

        let mut predicted = Vec::with_capacity(len);
        let (mut state, mut time) = (end_state, len - 1);
        for _ in 0..len {
            predicted.push(state);
            let (state_from, time_from) = psi[[time, state]];
            state = state_from;
            time = time_from;
        }
        predicted.reverse();
        predicted
    }
}
