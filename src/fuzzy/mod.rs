//! # Fuzzy Inference Module
//!
//! Mamdani-style fuzzy inference used to map an equalized intensity and its
//! contrast-control signal to an enhanced intensity.
//!
//! - `membership`: triangular membership functions and linguistic variables
//! - `rules`: the matched-label rule base
//! - `defuzz`: defuzzification methods
//! - `engine`: the frozen, shareable inference engine

pub mod defuzz;
pub mod engine;
pub mod membership;
pub mod rules;

pub use defuzz::{defuzzify, DefuzzMethod};
pub use engine::{FuzzyEngine, FuzzyEngineBuilder, Inference};
pub use membership::{
    FuzzySet, LinguisticVariable, Memberships, SetLabel, TriangularMf, UNIVERSE_LEN, UNIVERSE_MAX,
};
pub use rules::{FuzzyRule, RuleBase};
