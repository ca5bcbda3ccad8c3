//! Higher-order discrete Hidden Markov Models.
//!
//! A model of order `n` conditions each hidden state on the `n` previous ones.
//! Histories are folded into composite states so the usual first-order
//! machinery (forward, Viterbi, Baum-Welch) applies unchanged, while
//! emissions still depend only on the newest single state.
//!
//! ```no_run
//! use higher_order_hmm::{BuildOptions, HmmBuilder};
//!
//! let mut builder = HmmBuilder::new();
//! builder.add_training_example(vec!["normal", "cold", "dizzy"], vec!["healthy", "healthy", "fever"]);
//! let hmm = builder.build(&BuildOptions::default().with_order(2).with_smoothing(0.01)).unwrap();
//! let path = hmm.decode(&["normal", "dizzy"]).unwrap();
//! ```

mod builder;
mod config;
mod error;
mod model;
mod states;
mod utils;

pub use builder::HmmBuilder;
pub use config::{BuildOptions, Distribution, LearnOptions};
pub use error::{HmmError, HmmResult};
pub use model::{Hmm, Parameters, StartDistribution};
pub use states::{composite_index, encode_ngrams, observed_ngrams, synthesize, CompositeState, Symbol, Vocabulary};
