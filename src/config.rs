use serde::{Deserialize, Serialize};

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use super::error::{HmmError, HmmResult};

/// How the unsupervised builder fills the transition and emission rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Uniform,
    Random,
}

impl FromStr for Distribution {
    type Err = HmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Distribution::Uniform),
            "random" => Ok(Distribution::Random),
            _ => Err(HmmError::UnknownDistribution(s.to_owned())),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Uniform => write!(f, "uniform"),
            Distribution::Random => write!(f, "random"),
        }
    }
}

/// Options recognized by [`HmmBuilder`](crate::HmmBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// History window of hidden states, at least 1.
    pub highest_order: usize,
    /// Add-k pseudo-count applied before every normalization.
    pub k_smoothing: f64,
    /// Use the full cross product of single states instead of the observed n-grams.
    pub synthesize_states: bool,
    /// Only read by the unsupervised builder.
    pub distribution: Distribution,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            highest_order: 1,
            k_smoothing: 0.0,
            synthesize_states: false,
            distribution: Distribution::Random,
        }
    }
}

impl BuildOptions {

    pub fn with_order(mut self, highest_order: usize) -> Self {
        self.highest_order = highest_order;
        self
    }

    pub fn with_smoothing(mut self, k_smoothing: f64) -> Self {
        self.k_smoothing = k_smoothing;
        self
    }

    pub fn with_synthesized_states(mut self, synthesize_states: bool) -> Self {
        self.synthesize_states = synthesize_states;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn validate(&self) -> HmmResult<()> {
        if self.highest_order < 1 {
            return Err(HmmError::InvalidOrder(self.highest_order));
        }
        validate_smoothing(self.k_smoothing)
    }

    /// Reads options from a file of `key=value` lines.
    ///
    /// Blank lines and lines starting with `#` are ignored. Keys that are not
    /// present keep their default value.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> HmmResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut instance = BuildOptions::default();
        for line in reader.lines() {
            instance.apply_line(&line?)?;
        }
        instance.validate()?;
        Ok(instance)
    }

    pub fn from_config_str(text: &str) -> HmmResult<Self> {
        let mut instance = BuildOptions::default();
        for line in text.lines() {
            instance.apply_line(line)?;
        }
        instance.validate()?;
        Ok(instance)
    }

    fn apply_line(&mut self, line: &str) -> HmmResult<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let splits: Vec<&str> = line.split('=').collect();
        if splits.len() != 2 {
            return Err(HmmError::Config(format!("wrong line in config file: {:?}", line)));
        }
        let option = splits[0].trim();
        let value = splits[1].trim();
        match option {
            "highest_order" => self.highest_order = parse_value(option, value)?,
            "k_smoothing" => self.k_smoothing = parse_value(option, value)?,
            "synthesize_states" => self.synthesize_states = parse_value(option, value)?,
            "distribution" => self.distribution = value.parse()?,
            _ => return Err(HmmError::Config(format!("unknown option in config file: {:?}", option))),
        };
        Ok(())
    }
}

fn parse_value<T: FromStr>(option: &str, value: &str) -> HmmResult<T> {
    value
        .parse::<T>()
        .map_err(|_| HmmError::Config(format!("can not parse {:?} for option {}", value, option)))
}

pub(crate) fn validate_smoothing(k_smoothing: f64) -> HmmResult<()> {
    if !k_smoothing.is_finite() || k_smoothing < 0.0 {
        return Err(HmmError::InvalidSmoothing(k_smoothing));
    }
    Ok(())
}

/// Convergence settings for Baum-Welch learning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnOptions {
    /// Stop once the mean log-likelihood moves by less than this amount.
    pub delta: f64,
    pub k_smoothing: f64,
    /// `None` iterates until convergence.
    pub max_iterations: Option<usize>,
}

impl Default for LearnOptions {
    fn default() -> Self {
        Self {
            delta: 1e-4,
            k_smoothing: 0.0,
            max_iterations: None,
        }
    }
}

impl LearnOptions {

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_smoothing(mut self, k_smoothing: f64) -> Self {
        self.k_smoothing = k_smoothing;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}
