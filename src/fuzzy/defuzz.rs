//! Defuzzification of an aggregated output set sampled over the universe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy used to reduce the aggregated output membership to a crisp value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefuzzMethod {
    /// Center of gravity of the piecewise-linear membership curve.
    #[default]
    Centroid,
    /// Point splitting the area under the curve in two equal halves.
    Bisector,
    /// Mean of the universe points reaching the maximum degree.
    MeanOfMaximum,
    /// Smallest universe point reaching the maximum degree.
    SmallestOfMaximum,
    /// Largest universe point reaching the maximum degree.
    LargestOfMaximum,
}

impl DefuzzMethod {
    pub const fn name(self) -> &'static str {
        match self {
            DefuzzMethod::Centroid => "centroid",
            DefuzzMethod::Bisector => "bisector",
            DefuzzMethod::MeanOfMaximum => "mom",
            DefuzzMethod::SmallestOfMaximum => "som",
            DefuzzMethod::LargestOfMaximum => "lom",
        }
    }
}

impl fmt::Display for DefuzzMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DefuzzMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "centroid" => Ok(DefuzzMethod::Centroid),
            "bisector" => Ok(DefuzzMethod::Bisector),
            "mom" | "mean_of_maximum" => Ok(DefuzzMethod::MeanOfMaximum),
            "som" | "smallest_of_maximum" => Ok(DefuzzMethod::SmallestOfMaximum),
            "lom" | "largest_of_maximum" => Ok(DefuzzMethod::LargestOfMaximum),
            other => Err(format!(
                "Unknown defuzzification method: {}. Expected one of centroid, bisector, mom, som, lom",
                other
            )),
        }
    }
}

/// Reduces `mf` (sampled at the points of `universe`) to a crisp value.
///
/// Returns `None` when the membership is zero everywhere, where every method
/// is undefined.
pub fn defuzzify(method: DefuzzMethod, universe: &[f64], mf: &[f64]) -> Option<f64> {
    debug_assert_eq!(universe.len(), mf.len());
    match method {
        DefuzzMethod::Centroid => centroid(universe, mf),
        DefuzzMethod::Bisector => bisector(universe, mf),
        DefuzzMethod::MeanOfMaximum => maxima(universe, mf).map(|(sum, count, _, _)| sum / count as f64),
        DefuzzMethod::SmallestOfMaximum => maxima(universe, mf).map(|(_, _, first, _)| first),
        DefuzzMethod::LargestOfMaximum => maxima(universe, mf).map(|(_, _, _, last)| last),
    }
}

/// Area and first moment of one linear segment of the curve.
fn segment(x1: f64, x2: f64, y1: f64, y2: f64) -> (f64, f64) {
    let width = x2 - x1;
    if width == 0.0 || (y1 == 0.0 && y2 == 0.0) {
        return (0.0, 0.0);
    }
    let (moment_x, area) = if y1 == y2 {
        (0.5 * (x1 + x2), width * y1)
    } else if y1 == 0.0 {
        (2.0 / 3.0 * width + x1, 0.5 * width * y2)
    } else if y2 == 0.0 {
        (1.0 / 3.0 * width + x1, 0.5 * width * y1)
    } else {
        (
            (2.0 / 3.0 * width * (y2 + 0.5 * y1)) / (y1 + y2) + x1,
            0.5 * width * (y1 + y2),
        )
    };
    (area, moment_x * area)
}

fn centroid(universe: &[f64], mf: &[f64]) -> Option<f64> {
    let mut area = 0.0;
    let mut moment = 0.0;
    for i in 1..universe.len() {
        let (a, m) = segment(universe[i - 1], universe[i], mf[i - 1], mf[i]);
        area += a;
        moment += m;
    }

    // A lone non-zero sample in a one-point universe has no area.
    if area <= 0.0 {
        return single_point(universe, mf);
    }
    Some(moment / area)
}

fn bisector(universe: &[f64], mf: &[f64]) -> Option<f64> {
    let areas: Vec<f64> = (1..universe.len())
        .map(|i| segment(universe[i - 1], universe[i], mf[i - 1], mf[i]).0)
        .collect();
    let total: f64 = areas.iter().sum();
    if total <= 0.0 {
        return single_point(universe, mf);
    }

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (i, area) in areas.iter().enumerate() {
        if *area > 0.0 && cumulative + area >= half {
            let fraction = (half - cumulative) / area;
            return Some(universe[i] + fraction * (universe[i + 1] - universe[i]));
        }
        cumulative += area;
    }
    universe.last().copied()
}

/// `(sum, count, first, last)` of the universe points at the maximum degree.
fn maxima(universe: &[f64], mf: &[f64]) -> Option<(f64, usize, f64, f64)> {
    let peak = mf.iter().copied().fold(0.0_f64, f64::max);
    if peak <= 0.0 {
        return None;
    }

    let mut sum = 0.0;
    let mut count = 0;
    let mut first = None;
    let mut last = 0.0;
    for (x, y) in universe.iter().zip(mf) {
        if (peak - y).abs() <= f64::EPSILON * peak {
            sum += x;
            count += 1;
            first.get_or_insert(*x);
            last = *x;
        }
    }
    first.map(|first| (sum, count, first, last))
}

fn single_point(universe: &[f64], mf: &[f64]) -> Option<f64> {
    universe
        .iter()
        .zip(mf)
        .find(|(_, y)| **y > 0.0)
        .map(|(x, _)| *x)
}
