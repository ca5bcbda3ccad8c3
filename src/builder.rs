//! Parameter estimation from a training corpus.
//!
//! The builder collects aligned (observation sequence, state sequence) pairs,
//! then [`HmmBuilder::build`] counts transitions, emissions and sequence starts
//! and turns them into add-k smoothed probabilities. With no labeled data,
//! [`HmmBuilder::build_unsupervised`] gives a uniform or random starting point
//! for [`Hmm::learn`].

use ndarray::{Array1, Array2};
use rand::prelude::*;
use tracing::debug;

use super::config::{BuildOptions, Distribution};
use super::error::{HmmError, HmmResult};
use super::model::{Hmm, Parameters, StartDistribution};
use super::states::{encode_ngrams, observed_ngrams, synthesize, CompositeState, Symbol, Vocabulary};
use super::utils::{normalize_row, smooth_row, zeros_2d};

pub struct HmmBuilder<O, S> {
    obs_sequences: Vec<Vec<O>>,
    state_sequences: Vec<Vec<S>>,
    single_states: Option<Vec<S>>,
    all_obs: Option<Vec<O>>,
}

impl<O: Symbol, S: Symbol> Default for HmmBuilder<O, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Symbol, S: Symbol> HmmBuilder<O, S> {

    pub fn new() -> Self {
        Self {
            obs_sequences: Vec::new(),
            state_sequences: Vec::new(),
            single_states: None,
            all_obs: None,
        }
    }

    pub fn add_training_example(&mut self, observations: Vec<O>, states: Vec<S>) {
        self.obs_sequences.push(observations);
        self.state_sequences.push(states);
    }

    pub fn add_batch_training_examples(&mut self, observations: Vec<Vec<O>>, states: Vec<Vec<S>>) {
        self.obs_sequences.extend(observations);
        self.state_sequences.extend(states);
    }

    /// Fixes the single-state vocabulary. Building then always synthesizes
    /// the composite states.
    pub fn set_single_states(&mut self, single_states: Vec<S>) {
        self.single_states = Some(single_states);
    }

    pub fn set_all_obs(&mut self, all_obs: Vec<O>) {
        self.all_obs = Some(all_obs);
    }

    /// Drops every training example and both vocabularies.
    pub fn clear_all_sets(&mut self) {
        self.obs_sequences.clear();
        self.state_sequences.clear();
        self.single_states = None;
        self.all_obs = None;
    }

    /// Estimates `(A, B, pi)` from the training examples.
    pub fn build(&self, options: &BuildOptions) -> HmmResult<Hmm<O, S>> {
        options.validate()?;
        if self.obs_sequences.len() != self.state_sequences.len() {
            return Err(HmmError::MismatchedLengths {
                index: self.obs_sequences.len().min(self.state_sequences.len()),
                observations: self.obs_sequences.len(),
                states: self.state_sequences.len(),
            });
        }
        for (index, (o, s)) in self.obs_sequences.iter().zip(&self.state_sequences).enumerate() {
            if o.len() != s.len() {
                return Err(HmmError::MismatchedLengths { index, observations: o.len(), states: s.len() });
            }
        }

        let all_obs = self.obs_vocabulary();
        let (single_states, synthesize_states) = match &self.single_states {
            Some(states) => (states.iter().cloned().collect(), true),
            None => (self.state_vocabulary(), options.synthesize_states),
        };

        let obs_idx = encode_all(&self.obs_sequences, &all_obs, HmmError::UnknownObservation)?;
        let state_idx = encode_all(&self.state_sequences, &single_states, HmmError::UnknownState)?;

        let order = options.highest_order;
        let k = options.k_smoothing;
        let nsingle = single_states.len();
        let state_space = |m: usize| -> HmmResult<Vocabulary<CompositeState>> {
            if synthesize_states {
                synthesize(nsingle, m)
            } else {
                Ok(observed_ngrams(&state_idx, m))
            }
        };

        let all_states = state_space(order)?;
        let pi = (1..=order)
            .map(|m| -> HmmResult<StartDistribution> { Ok(start_probs(&state_idx, state_space(m)?, m, k)) })
            .collect::<HmmResult<Vec<StartDistribution>>>()?;
        let a = transition_probs(&state_idx, &all_states, order, k);
        let b = emission_probs(&obs_idx, &state_idx, nsingle, all_obs.len(), k);

        debug!(
            order,
            observations = all_obs.len(),
            single_states = nsingle,
            states = all_states.len(),
            "built model from {} training sequences",
            state_idx.len()
        );

        Hmm::new(Parameters { a, b, pi, all_obs, all_states, single_states })
    }

    /// A model with no counting behind it, meant as the starting point of
    /// unsupervised learning. Composite states are always synthesized.
    pub fn build_unsupervised(&self, options: &BuildOptions) -> HmmResult<Hmm<O, S>> {
        self.build_unsupervised_with_rng(options, &mut thread_rng())
    }

    pub fn build_unsupervised_with_rng<R: Rng>(&self, options: &BuildOptions, rng: &mut R) -> HmmResult<Hmm<O, S>> {
        options.validate()?;
        let single_states: Vocabulary<S> = match &self.single_states {
            Some(states) => states.iter().cloned().collect(),
            None => self.state_vocabulary(),
        };
        let all_obs = self.obs_vocabulary();

        let order = options.highest_order;
        let nsingle = single_states.len();
        let all_states = synthesize(nsingle, order)?;
        let nstates = all_states.len();

        let a = init_matrix(nstates, nstates, options.distribution, rng);
        let b = init_matrix(nsingle, all_obs.len(), options.distribution, rng);
        let pi = (1..=order)
            .map(|m| -> HmmResult<StartDistribution> {
                let states = synthesize(nsingle, m)?;
                let probs = init_matrix(1, states.len(), options.distribution, rng).row(0).to_owned();
                Ok(StartDistribution { states, probs })
            })
            .collect::<HmmResult<Vec<StartDistribution>>>()?;

        debug!(order, distribution = %options.distribution, states = nstates, "built unsupervised model");

        Hmm::new(Parameters { a, b, pi, all_obs, all_states, single_states })
    }

    fn obs_vocabulary(&self) -> Vocabulary<O> {
        match &self.all_obs {
            Some(obs) => obs.iter().cloned().collect(),
            None => self.obs_sequences.iter().flatten().cloned().collect(),
        }
    }

    fn state_vocabulary(&self) -> Vocabulary<S> {
        self.state_sequences.iter().flatten().cloned().collect()
    }
}

fn encode_all<T: Symbol>(
    sequences: &[Vec<T>],
    vocabulary: &Vocabulary<T>,
    unknown: fn(String) -> HmmError,
) -> HmmResult<Vec<Vec<usize>>> {
    sequences
        .iter()
        .map(|sequence| {
            sequence
                .iter()
                .map(|item| vocabulary.index_of(item).ok_or_else(|| unknown(format!("{:?}", item))))
                .collect()
        })
        .collect()
}

/// Counts how often each order-`m` prefix starts a sequence; sequences
/// shorter than `m` are left out of both the counts and the total.
fn start_probs(state_sequences: &[Vec<usize>], states: Vocabulary<CompositeState>, m: usize, k_smoothing: f64) -> StartDistribution {
    let mut probs = Array1::zeros(states.len());
    let mut counted = 0.0;
    for sequence in state_sequences {
        if sequence.len() < m {
            continue;
        }
        if let Some(i) = states.index_of(&CompositeState::new(sequence[..m].to_vec())) {
            probs[i] += 1.0;
            counted += 1.0;
        }
    }
    smooth_row(probs.view_mut(), counted, k_smoothing);
    StartDistribution { states, probs }
}

fn transition_probs(
    state_sequences: &[Vec<usize>],
    all_states: &Vocabulary<CompositeState>,
    order: usize,
    k_smoothing: f64,
) -> Array2<f64> {
    let nstates = all_states.len();
    let mut trans_probs = zeros_2d(nstates, nstates);
    let mut seen_states = Array1::<f64>::zeros(nstates);

    for sequence in state_sequences {
        // every window is in the state space, it was built from these sequences
        let windows: Vec<usize> = encode_ngrams(sequence, order)
            .iter()
            .filter_map(|state| all_states.index_of(state))
            .collect();
        for pair in windows.windows(2) {
            trans_probs[[pair[0], pair[1]]] += 1.0;
            seen_states[pair[0]] += 1.0;
        }
    }

    for state in 0..nstates {
        smooth_row(trans_probs.row_mut(state), seen_states[state], k_smoothing);
    }
    trans_probs
}

fn emission_probs(
    obs_sequences: &[Vec<usize>],
    state_sequences: &[Vec<usize>],
    nsingle: usize,
    nobs: usize,
    k_smoothing: f64,
) -> Array2<f64> {
    let mut emission_probs = zeros_2d(nsingle, nobs);
    let mut seen_states = Array1::<f64>::zeros(nsingle);

    for (obs, states) in obs_sequences.iter().zip(state_sequences) {
        for (&o, &s) in obs.iter().zip(states) {
            emission_probs[[s, o]] += 1.0;
            seen_states[s] += 1.0;
        }
    }

    for state in 0..nsingle {
        smooth_row(emission_probs.row_mut(state), seen_states[state], k_smoothing);
    }
    emission_probs
}

fn init_matrix<R: Rng>(rows: usize, columns: usize, distribution: Distribution, rng: &mut R) -> Array2<f64> {
    match distribution {
        Distribution::Uniform => Array2::from_elem((rows, columns), 1.0 / columns as f64),
        Distribution::Random => {
            // 1 - [0, 1) keeps every weight strictly positive
            let mut m = Array2::from_shape_fn((rows, columns), |_| 1.0 - rng.gen::<f64>());
            for row in 0..rows {
                normalize_row(m.row_mut(row));
            }
            m
        }
    }
}
