//! Higher-order discrete Hidden Markov Model.
//!
//! Notation:
//! - `A`: transition probabilities between composite states
//! - `B`: emission probabilities, indexed by single state then observation
//! - `pi`: one start distribution per early time step; `pi[t]` is over the
//!   composite states of order `t + 1`
//!
//! While fewer than `order` steps have been seen there is no full history to
//! transition from, so `pi[t]` replaces `A` for the step into time `t`. The
//! probability of a start history is shared evenly between the composite
//! states ending with it, so the start steps never count a history twice.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use std::fmt;

use super::error::{HmmError, HmmResult};
use super::states::{CompositeState, Symbol, Vocabulary};

mod baum_welch;
mod forward;
mod viterbi;

/// Start distribution for one early time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDistribution {
    pub states: Vocabulary<CompositeState>,
    pub probs: Array1<f64>,
}

impl StartDistribution {

    /// Probability of `state`, zero when it is not part of this distribution.
    pub fn prob(&self, state: &CompositeState) -> f64 {
        match self.states.index_of(state) {
            Some(i) => self.probs[i],
            None => 0.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.probs.sum()
    }
}

/// Every model parameter, keyed the way collaborators persist them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "O: Serialize, S: Serialize",
    deserialize = "O: Symbol + Deserialize<'de>, S: Symbol + Deserialize<'de>"
))]
pub struct Parameters<O, S> {
    #[serde(rename = "A")]
    pub a: Array2<f64>,
    #[serde(rename = "B")]
    pub b: Array2<f64>,
    pub pi: Vec<StartDistribution>,
    pub all_obs: Vocabulary<O>,
    pub all_states: Vocabulary<CompositeState>,
    pub single_states: Vocabulary<S>,
}

/// A model able to evaluate, decode and learn.
///
/// The model owns its parameters; only [`Hmm::learn`] changes them.
#[derive(Debug, Clone)]
pub struct Hmm<O, S> {
    params: Parameters<O, S>,
    order: usize,
    // composite state -> single state it emits from
    emitter: Vec<usize>,
    // [t][composite state] -> position of its order t+1 suffix in pi[t]
    start_index: Vec<Vec<Option<usize>>>,
    // [t][position in pi[t]] -> number of composite states ending with that history
    start_share: Vec<Vec<usize>>,
}

impl<O: Symbol, S: Symbol> Hmm<O, S> {

    /// Wraps `params` after checking that all shapes agree.
    ///
    /// The order is `params.pi.len()`.
    pub fn new(params: Parameters<O, S>) -> HmmResult<Self> {
        let order = params.pi.len();
        if order < 1 {
            return Err(HmmError::InvalidOrder(order));
        }
        let nstates = params.all_states.len();
        let nsingle = params.single_states.len();
        let nobs = params.all_obs.len();

        if params.a.dim() != (nstates, nstates) {
            return Err(HmmError::InvalidParameters(format!(
                "A is {:?}, expected ({}, {})", params.a.dim(), nstates, nstates
            )));
        }
        if params.b.dim() != (nsingle, nobs) {
            return Err(HmmError::InvalidParameters(format!(
                "B is {:?}, expected ({}, {})", params.b.dim(), nsingle, nobs
            )));
        }
        for state in params.all_states.iter() {
            check_state(state, order, nsingle)?;
        }
        for (t, start) in params.pi.iter().enumerate() {
            if start.probs.len() != start.states.len() {
                return Err(HmmError::InvalidParameters(format!(
                    "pi[{}] has {} probabilities for {} states", t, start.probs.len(), start.states.len()
                )));
            }
            for state in start.states.iter() {
                check_state(state, t + 1, nsingle)?;
            }
        }

        let emitter = params.all_states.iter().map(|s| s.single()).collect();
        let start_index: Vec<Vec<Option<usize>>> = (0..order)
            .map(|t| {
                params
                    .all_states
                    .iter()
                    .map(|s| s.decompose(t + 1).ok().and_then(|suffix| params.pi[t].states.index_of(&suffix)))
                    .collect()
            })
            .collect();
        let start_share = start_index
            .iter()
            .zip(&params.pi)
            .map(|(positions, start)| {
                let mut share = vec![0; start.states.len()];
                for &i in positions.iter().flatten() {
                    share[i] += 1;
                }
                share
            })
            .collect();

        Ok(Self { params, order, emitter, start_index, start_share })
    }

    /// Builds a model from symbol-level parameters.
    ///
    /// `all_states` lists every composite state as its single states, oldest
    /// first; `pi[t]` pairs composite states of order `t + 1` with their
    /// probability. The order is the length of the composite states.
    pub fn from_parameters(
        a: Array2<f64>,
        b: Array2<f64>,
        pi: Vec<Vec<(Vec<S>, f64)>>,
        all_obs: Vec<O>,
        all_states: Vec<Vec<S>>,
        single_states: Vec<S>,
    ) -> HmmResult<Self> {
        let single_states: Vocabulary<S> = single_states.into_iter().collect();
        let all_obs: Vocabulary<O> = all_obs.into_iter().collect();
        let to_composite = |symbols: &[S]| -> HmmResult<CompositeState> {
            if symbols.is_empty() {
                return Err(HmmError::InvalidParameters("empty composite state".to_owned()));
            }
            let history = symbols
                .iter()
                .map(|s| single_states.index_of(s).ok_or_else(|| HmmError::UnknownState(format!("{:?}", s))))
                .collect::<HmmResult<Vec<usize>>>()?;
            Ok(CompositeState::new(history))
        };

        let all_states = all_states
            .iter()
            .map(|symbols| to_composite(symbols.as_slice()))
            .collect::<HmmResult<Vocabulary<CompositeState>>>()?;

        let mut starts = Vec::with_capacity(pi.len());
        for entries in pi {
            let mut states = Vocabulary::new();
            let mut probs = Vec::with_capacity(entries.len());
            for (symbols, p) in entries {
                states.insert(to_composite(symbols.as_slice())?);
                probs.push(p);
            }
            if probs.len() != states.len() {
                return Err(HmmError::InvalidParameters("duplicate state in a start distribution".to_owned()));
            }
            starts.push(StartDistribution { states, probs: Array1::from_vec(probs) });
        }

        Hmm::new(Parameters { a, b, pi: starts, all_obs, all_states, single_states })
    }

    pub fn parameters(&self) -> &Parameters<O, S> {
        &self.params
    }

    pub fn into_parameters(self) -> Parameters<O, S> {
        self.params
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn nstates(&self) -> usize {
        self.params.all_states.len()
    }

    /// The single states making up `state`, oldest first.
    pub fn composite_symbols(&self, state: &CompositeState) -> Vec<&S> {
        state.history().iter().map(|&i| &self.params.single_states[i]).collect()
    }

    /// Evaluation problem: `P(sequence | model)` with the forward algorithm.
    ///
    /// An empty sequence has probability 0.
    pub fn evaluate(&self, sequence: &[O]) -> HmmResult<f64> {
        let obs = self.encode(sequence)?;
        Ok(self.likelihood(&obs))
    }

    /// Decoding problem: the most likely single-state path with the Viterbi algorithm.
    ///
    /// The path has the length of `sequence`. When every path has probability
    /// 0 the result is still well formed but carries no meaning. A model
    /// without states cannot label anything and rejects a non-empty sequence.
    pub fn decode(&self, sequence: &[O]) -> HmmResult<Vec<S>> {
        let obs = self.encode(sequence)?;
        if obs.is_empty() {
            return Ok(Vec::new());
        }
        if self.nstates() == 0 {
            return Err(HmmError::InvalidParameters("model has no hidden states to decode with".to_owned()));
        }
        let path = self.viterbi(&obs);
        Ok(path
            .into_iter()
            .map(|s| self.params.single_states[self.emitter[s]].clone())
            .collect())
    }

    pub(crate) fn encode(&self, sequence: &[O]) -> HmmResult<Vec<usize>> {
        sequence
            .iter()
            .map(|o| {
                self.params
                    .all_obs
                    .index_of(o)
                    .ok_or_else(|| HmmError::UnknownObservation(format!("{:?}", o)))
            })
            .collect()
    }

    pub(crate) fn likelihood(&self, obs: &[usize]) -> f64 {
        if obs.is_empty() {
            return 0.0;
        }
        let alpha = self.forward(obs);
        alpha.row(obs.len() - 1).sum()
    }

    fn emission(&self, state: usize, obs: usize) -> f64 {
        self.params.b[[self.emitter[state], obs]]
    }

    /// Emission probability of `obs` for every composite state.
    fn emissions(&self, obs: usize) -> Array1<f64> {
        Array1::from_shape_fn(self.nstates(), |s| self.emission(s, obs))
    }

    /// Share of `pi[t]` held by `state`: the probability of its order `t + 1`
    /// suffix divided among every composite state with that suffix.
    fn start_prob(&self, t: usize, state: usize) -> f64 {
        match self.start_index[t][state] {
            Some(i) => self.params.pi[t].probs[i] / self.start_share[t][i] as f64,
            None => 0.0,
        }
    }

    /// Probability of moving into `state_to` at time `t` (`t >= 1`).
    fn transition(&self, state_from: usize, state_to: usize, t: usize) -> f64 {
        if t < self.order {
            self.start_prob(t, state_to)
        } else {
            self.params.a[[state_from, state_to]]
        }
    }

    /// Column of [`Hmm::transition`] over every source state.
    fn transitions_to(&self, state_to: usize, t: usize) -> Array1<f64> {
        Array1::from_shape_fn(self.nstates(), |state_from| self.transition(state_from, state_to, t))
    }
}

fn check_state(state: &CompositeState, order: usize, nsingle: usize) -> HmmResult<()> {
    if state.order() != order {
        return Err(HmmError::InvalidParameters(format!(
            "state {:?} has order {}, expected {}", state.history(), state.order(), order
        )));
    }
    if state.history().iter().any(|&s| s >= nsingle) {
        return Err(HmmError::InvalidParameters(format!(
            "state {:?} refers to an unknown single state", state.history()
        )));
    }
    Ok(())
}

impl<O: Symbol, S: Symbol> fmt::Display for Hmm<O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Starting probabilities (pi):")?;
        for start in &self.params.pi {
            let entries: Vec<String> = start
                .states
                .iter()
                .zip(start.probs.iter())
                .map(|(s, p)| format!("{:?}: {}", self.composite_symbols(s), p))
                .collect();
            writeln!(f, "{{{}}}", entries.join(", "))?;
        }
        writeln!(f, "Transition probabilities (A):")?;
        for row in self.params.a.rows() {
            writeln!(f, "{}", row)?;
        }
        writeln!(f, "Emission probabilities (B):")?;
        for row in self.params.b.rows() {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}
