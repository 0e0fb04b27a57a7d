//! Mamdani rule base over the `input_image` and `contrast_control` antecedents.

use serde::Serialize;
use std::fmt;

use super::membership::{Memberships, SetLabel};

/// `(input_image is input) AND (contrast_control is contrast) => (output_image is consequent)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FuzzyRule {
    pub input: SetLabel,
    pub contrast: SetLabel,
    pub consequent: SetLabel,
}

impl FuzzyRule {
    pub const fn new(input: SetLabel, contrast: SetLabel, consequent: SetLabel) -> Self {
        Self {
            input,
            contrast,
            consequent,
        }
    }

    /// Firing strength: fuzzy AND (minimum) of the two antecedent degrees.
    pub fn firing_strength(&self, input: &Memberships, contrast: &Memberships) -> f64 {
        input.get(self.input).min(contrast.get(self.contrast))
    }
}

impl fmt::Display for FuzzyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IF input_image is {} AND contrast_control is {} THEN output_image is {}",
            self.input, self.contrast, self.consequent
        )
    }
}

/// The compiled rule set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleBase {
    rules: Vec<FuzzyRule>,
}

impl RuleBase {
    /// The three matched-label rules (low/low → low, medium/medium → medium,
    /// high/high → high). Mismatched antecedent pairs have no rule.
    pub fn matched() -> Self {
        Self {
            rules: SetLabel::ALL
                .iter()
                .map(|label| FuzzyRule::new(*label, *label, *label))
                .collect(),
        }
    }

    pub fn rules(&self) -> &[FuzzyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates every rule and folds the strengths onto their consequent
    /// labels with fuzzy OR (maximum).
    pub fn fire(&self, input: &Memberships, contrast: &Memberships) -> Memberships {
        let mut strengths = Memberships::default();
        for rule in &self.rules {
            strengths.raise(rule.consequent, rule.firing_strength(input, contrast));
        }
        strengths
    }
}
