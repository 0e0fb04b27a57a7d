//! # Fuzzy Contrast Enhancement Engine
//!
//! A frozen Mamdani inference system: fuzzification of the two antecedents,
//! min-based rule firing, max-based aggregation of clipped consequents and
//! defuzzification over the 0..=255 output universe.
//!
//! The engine is built once and shared read-only by every pixel evaluation
//! (and every image of a batch). Evaluation keeps all of its working state on
//! the stack, so the engine is `Send + Sync` without any locking.

use serde::Serialize;

use super::defuzz::{defuzzify, DefuzzMethod};
use super::membership::{LinguisticVariable, Memberships, SetLabel, UNIVERSE_LEN};
use super::rules::RuleBase;

/// Outcome of one inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Inference {
    /// Crisp value produced by defuzzification.
    Crisp(f64),
    /// The aggregated output set was empty; the engine's fallback value.
    Fallback(f64),
}

impl Inference {
    /// The crisp output regardless of how it was obtained.
    pub fn value(&self) -> f64 {
        match self {
            Inference::Crisp(v) | Inference::Fallback(v) => *v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Inference::Fallback(_))
    }
}

/// Builder for [`FuzzyEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyEngineBuilder {
    method: DefuzzMethod,
    fallback: f64,
}

impl Default for FuzzyEngineBuilder {
    fn default() -> Self {
        Self {
            method: DefuzzMethod::Centroid,
            fallback: FuzzyEngine::DEFAULT_FALLBACK,
        }
    }
}

impl FuzzyEngineBuilder {
    pub fn defuzz_method(mut self, method: DefuzzMethod) -> Self {
        self.method = method;
        self
    }

    /// Value returned when no rule fires.
    pub fn fallback_value(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    /// Builds the variables, compiles the rule base and samples the
    /// consequent curves.
    pub fn build(self) -> FuzzyEngine {
        let input = LinguisticVariable::standard("input_image");
        let contrast = LinguisticVariable::standard("contrast_control");
        let output = LinguisticVariable::standard("output_image");

        let consequent_curves = SetLabel::ALL.map(|label| output.sample(label));
        let universe = std::array::from_fn(|i| i as f64);

        tracing::debug!(
            method = %self.method,
            fallback = self.fallback,
            "Fuzzy contrast enhancement engine built"
        );

        FuzzyEngine {
            input,
            contrast,
            output,
            rules: RuleBase::matched(),
            universe,
            consequent_curves,
            method: self.method,
            fallback: self.fallback,
        }
    }
}

/// Immutable, shareable fuzzy inference system.
#[derive(Debug, Clone)]
pub struct FuzzyEngine {
    input: LinguisticVariable,
    contrast: LinguisticVariable,
    output: LinguisticVariable,
    rules: RuleBase,
    universe: [f64; UNIVERSE_LEN],
    consequent_curves: [[f64; UNIVERSE_LEN]; 3],
    method: DefuzzMethod,
    fallback: f64,
}

impl Default for FuzzyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyEngine {
    /// Fallback output when the aggregated output set is empty.
    pub const DEFAULT_FALLBACK: f64 = 0.0;

    /// Engine with centroid defuzzification and a fallback of 0.
    pub fn new() -> Self {
        FuzzyEngineBuilder::default().build()
    }

    pub fn builder() -> FuzzyEngineBuilder {
        FuzzyEngineBuilder::default()
    }

    /// Runs one inference for an equalized `intensity` and its un-clamped
    /// `contrast_control` value.
    ///
    /// # Examples
    ///
    /// ```
    /// use fuzzy_clahe::fuzzy::FuzzyEngine;
    ///
    /// let engine = FuzzyEngine::new();
    /// let out = engine.evaluate(200.0, 200.0 * 100.0 / 255.0);
    /// assert!(!out.is_fallback());
    /// assert!((0.0..=255.0).contains(&out.value()));
    ///
    /// // No antecedent set covers a negative contrast value.
    /// assert!(engine.evaluate(200.0, -10.0).is_fallback());
    /// ```
    pub fn evaluate(&self, intensity: f64, contrast_control: f64) -> Inference {
        let input = self.input.fuzzify(intensity);
        let contrast = self.contrast.fuzzify(contrast_control);
        let strengths = self.rules.fire(&input, &contrast);

        if strengths.is_empty() {
            return Inference::Fallback(self.fallback);
        }

        let aggregated = self.aggregate(&strengths);
        match defuzzify(self.method, &self.universe, &aggregated) {
            Some(value) => Inference::Crisp(value),
            None => Inference::Fallback(self.fallback),
        }
    }

    /// Crisp shorthand for [`FuzzyEngine::evaluate`].
    pub fn compute(&self, intensity: f64, contrast_control: f64) -> f64 {
        self.evaluate(intensity, contrast_control).value()
    }

    /// Clips each consequent curve at its rule strength and takes the
    /// pointwise maximum.
    pub fn aggregate(&self, strengths: &Memberships) -> [f64; UNIVERSE_LEN] {
        let mut aggregated = [0.0_f64; UNIVERSE_LEN];
        for (label, strength) in strengths.iter() {
            if strength <= 0.0 {
                continue;
            }
            let curve = &self.consequent_curves[label.index()];
            for (slot, degree) in aggregated.iter_mut().zip(curve) {
                *slot = slot.max(strength.min(*degree));
            }
        }
        aggregated
    }

    /// Rule strengths per consequent label for one input pair.
    pub fn rule_strengths(&self, intensity: f64, contrast_control: f64) -> Memberships {
        self.rules.fire(
            &self.input.fuzzify(intensity),
            &self.contrast.fuzzify(contrast_control),
        )
    }

    pub fn input_variable(&self) -> &LinguisticVariable {
        &self.input
    }

    pub fn contrast_variable(&self) -> &LinguisticVariable {
        &self.contrast
    }

    pub fn output_variable(&self) -> &LinguisticVariable {
        &self.output
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn defuzz_method(&self) -> DefuzzMethod {
        self.method
    }

    pub fn fallback_value(&self) -> f64 {
        self.fallback
    }
}
