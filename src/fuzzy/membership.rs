//! # Membership Functions and Linguistic Variables
//!
//! Triangular membership functions and the `low` / `medium` / `high`
//! partition shared by every linguistic variable of the enhancement system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of discrete samples in the intensity universe (0..=255).
pub const UNIVERSE_LEN: usize = 256;

/// Largest crisp value of the intensity universe.
pub const UNIVERSE_MAX: f64 = 255.0;

/// Breakpoints of the `low` set.
pub const LOW_BREAKPOINTS: [f64; 3] = [0.0, 0.0, 127.0];

/// Breakpoints of the `medium` set.
pub const MEDIUM_BREAKPOINTS: [f64; 3] = [0.0, 255.0, 255.0];

/// Breakpoints of the `high` set.
pub const HIGH_BREAKPOINTS: [f64; 3] = [127.0, 255.0, 255.0];

/// A triangular membership function with feet at `a` and `c` and peak at `b`.
///
/// Degenerate shoulders (`a == b` or `b == c`) are allowed and produce the
/// half-triangles used by the `low` and `high` sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangularMf {
    a: f64,
    b: f64,
    c: f64,
}

impl TriangularMf {
    /// Creates a triangular function from its three breakpoints.
    ///
    /// Breakpoints must satisfy `a <= b <= c`.
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Creates a triangular function from a `[a, b, c]` array.
    pub const fn from_breakpoints(points: [f64; 3]) -> Self {
        Self::new(points[0], points[1], points[2])
    }

    /// Returns the `[a, b, c]` breakpoints.
    pub fn breakpoints(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Membership degree of `x`, in [0, 1].
    ///
    /// The peak evaluates to exactly 1.0; values at or beyond the feet, values
    /// outside the universe and NaN evaluate to 0.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use fuzzy_clahe::fuzzy::TriangularMf;
    ///
    /// let low = TriangularMf::new(0.0, 0.0, 127.0);
    /// assert_eq!(low.evaluate(0.0), 1.0);
    /// assert_eq!(low.evaluate(127.0), 0.0);
    /// assert_eq!(low.evaluate(-4.0), 0.0);
    /// ```
    pub fn evaluate(&self, x: f64) -> f64 {
        if x == self.b {
            1.0
        } else if self.a < x && x < self.b {
            (x - self.a) / (self.b - self.a)
        } else if self.b < x && x < self.c {
            (self.c - x) / (self.c - self.b)
        } else {
            0.0
        }
    }
}

/// Names of the three fuzzy sets of every linguistic variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetLabel {
    Low,
    Medium,
    High,
}

impl SetLabel {
    /// All labels in universe order.
    pub const ALL: [SetLabel; 3] = [SetLabel::Low, SetLabel::Medium, SetLabel::High];

    /// Position of the label inside per-set arrays.
    pub const fn index(self) -> usize {
        match self {
            SetLabel::Low => 0,
            SetLabel::Medium => 1,
            SetLabel::High => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SetLabel::Low => "low",
            SetLabel::Medium => "medium",
            SetLabel::High => "high",
        }
    }
}

impl fmt::Display for SetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Membership degrees of one crisp value in each of the three sets.
///
/// Also used for per-consequent rule strengths, which live on the same
/// three labels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Memberships {
    degrees: [f64; 3],
}

impl Memberships {
    pub const fn new(low: f64, medium: f64, high: f64) -> Self {
        Self {
            degrees: [low, medium, high],
        }
    }

    pub fn get(&self, label: SetLabel) -> f64 {
        self.degrees[label.index()]
    }

    pub(crate) fn raise(&mut self, label: SetLabel, degree: f64) {
        let slot = &mut self.degrees[label.index()];
        *slot = slot.max(degree);
    }

    /// True when no set has a positive degree.
    pub fn is_empty(&self) -> bool {
        self.degrees.iter().all(|d| *d <= 0.0)
    }

    /// Iterates `(label, degree)` pairs in universe order.
    pub fn iter(&self) -> impl Iterator<Item = (SetLabel, f64)> + '_ {
        SetLabel::ALL.iter().map(move |label| (*label, self.get(*label)))
    }
}

/// A named fuzzy set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FuzzySet {
    pub label: SetLabel,
    pub mf: TriangularMf,
}

/// A named scalar domain over the 0..=255 universe partitioned into
/// `low`, `medium` and `high`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinguisticVariable {
    name: String,
    sets: [FuzzySet; 3],
}

impl LinguisticVariable {
    /// Builds a variable with the fixed `low [0,0,127]`, `medium [0,255,255]`
    /// and `high [127,255,255]` partition.
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: [
                FuzzySet {
                    label: SetLabel::Low,
                    mf: TriangularMf::from_breakpoints(LOW_BREAKPOINTS),
                },
                FuzzySet {
                    label: SetLabel::Medium,
                    mf: TriangularMf::from_breakpoints(MEDIUM_BREAKPOINTS),
                },
                FuzzySet {
                    label: SetLabel::High,
                    mf: TriangularMf::from_breakpoints(HIGH_BREAKPOINTS),
                },
            ],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sets(&self) -> &[FuzzySet; 3] {
        &self.sets
    }

    pub fn set(&self, label: SetLabel) -> &FuzzySet {
        &self.sets[label.index()]
    }

    /// Membership degree of `x` in the set named `label`.
    pub fn membership(&self, label: SetLabel, x: f64) -> f64 {
        self.set(label).mf.evaluate(x)
    }

    /// Fuzzification: degrees of `x` in all three sets.
    pub fn fuzzify(&self, x: f64) -> Memberships {
        Memberships::new(
            self.membership(SetLabel::Low, x),
            self.membership(SetLabel::Medium, x),
            self.membership(SetLabel::High, x),
        )
    }

    /// Samples the membership curve of `label` at every integer of the universe.
    pub fn sample(&self, label: SetLabel) -> [f64; UNIVERSE_LEN] {
        let mf = self.set(label).mf;
        let mut curve = [0.0; UNIVERSE_LEN];
        for (i, slot) in curve.iter_mut().enumerate() {
            *slot = mf.evaluate(i as f64);
        }
        curve
    }
}
