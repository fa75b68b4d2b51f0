//! Statistics over pairs of numeric target columns: correlation and simple linear regression.
//!
//! Both are computed from running sums, so the complement of a subgroup is obtained by
//! subtracting its sums from the population's rather than by another pass over the data.

use crate::quality::Measure;
use crate::table::Column;
use fixedbitset::FixedBitSet;
use std::ops::Sub;

/// Running sums of two paired variables.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BivariateSums {
    /// Number of pairs.
    pub n: f64,
    /// Sum of x.
    pub x: f64,
    /// Sum of y.
    pub y: f64,
    /// Sum of x squared.
    pub xx: f64,
    /// Sum of y squared.
    pub yy: f64,
    /// Sum of x times y.
    pub xy: f64,
}

impl BivariateSums {
    /// Adds one pair.
    pub fn add(&mut self, x: f64, y: f64) {
        self.n += 1.0;
        self.x += x;
        self.y += y;
        self.xx += x * x;
        self.yy += y * y;
        self.xy += x * y;
    }

    /// Sums over the rows in `members`. Non-numeric columns contribute nothing.
    pub fn over(x: &Column, y: &Column, members: &FixedBitSet) -> Self {
        let mut sums = BivariateSums::default();
        for row in members.ones() {
            if let (Some(a), Some(b)) = (x.numeric_value(row), y.numeric_value(row)) {
                sums.add(f64::from(a), f64::from(b));
            }
        }
        sums
    }

    fn sxx(&self) -> f64 {
        self.n * self.xx - self.x * self.x
    }

    fn syy(&self) -> f64 {
        self.n * self.yy - self.y * self.y
    }

    fn sxy(&self) -> f64 {
        self.n * self.xy - self.x * self.y
    }

    /// Pearson correlation, or `None` with fewer than two pairs or a constant variable.
    pub fn correlation(&self) -> Option<f64> {
        let denominator = (self.sxx() * self.syy()).sqrt();
        if self.n < 2.0 || !(denominator > 0.0) {
            None
        } else {
            Some(self.sxy() / denominator)
        }
    }

    /// Least-squares slope of y on x, or `None` when x does not vary.
    pub fn slope(&self) -> Option<f64> {
        let sxx = self.sxx();
        if self.n < 2.0 || !(sxx > 0.0) {
            None
        } else {
            Some(self.sxy() / sxx)
        }
    }

    /// Least-squares intercept, if the slope exists.
    pub fn intercept(&self) -> Option<f64> {
        self.slope().map(|b| (self.y - b * self.x) / self.n)
    }
}

impl Sub for BivariateSums {
    type Output = BivariateSums;

    fn sub(self, rhs: Self) -> Self {
        BivariateSums {
            n: self.n - rhs.n,
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            xx: self.xx - rhs.xx,
            yy: self.yy - rhs.yy,
            xy: self.xy - rhs.xy,
        }
    }
}

/// A score and the two statistics reported with it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BivariateScore {
    /// The measure's value.
    pub quality: f64,
    /// Correlation or slope in the subgroup.
    pub secondary: f64,
    /// Distance to the complement, or the intercept.
    pub tertiary: f64,
}

/// Correlation-based measures against the population's sums.
#[derive(Clone, Debug)]
pub struct CorrelationMeasure {
    measure: Measure,
    base: BivariateSums,
}

impl CorrelationMeasure {
    /// Binds `measure` to the population sums.
    pub fn new(measure: Measure, base: BivariateSums) -> Self {
        CorrelationMeasure { measure, base }
    }

    /// Scores a subgroup, or returns `None` if its correlation is undefined.
    pub fn evaluate(&self, subgroup: &BivariateSums) -> Option<BivariateScore> {
        let r = subgroup.correlation()?;
        let distance = (self.base - *subgroup)
            .correlation()
            .map(|complement| (r - complement).abs());
        let quality = match self.measure {
            Measure::CorrelationR => r,
            Measure::CorrelationRNegative => -r,
            Measure::CorrelationRSquared => r * r,
            Measure::CorrelationRSquaredNegative => -(r * r),
            Measure::CorrelationDistance => distance?,
            _ => return None,
        };
        Some(BivariateScore {
            quality,
            secondary: r,
            tertiary: distance.unwrap_or(f64::NAN),
        })
    }
}

/// Slope difference between a subgroup's regression line and its complement's.
#[derive(Clone, Debug)]
pub struct RegressionMeasure {
    base: BivariateSums,
}

impl RegressionMeasure {
    /// Binds the measure to the population sums.
    pub fn new(base: BivariateSums) -> Self {
        RegressionMeasure { base }
    }

    /// Scores a subgroup, or returns `None` if either regression is rank deficient.
    pub fn evaluate(&self, subgroup: &BivariateSums) -> Option<BivariateScore> {
        let slope = subgroup.slope()?;
        let intercept = subgroup.intercept()?;
        let complement = (self.base - *subgroup).slope()?;
        Some(BivariateScore {
            quality: (slope - complement).abs(),
            secondary: slope,
            tertiary: intercept,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sums(pairs: &[(f64, f64)]) -> BivariateSums {
        let mut s = BivariateSums::default();
        for &(x, y) in pairs {
            s.add(x, y);
        }
        s
    }

    #[test]
    fn line_fit() {
        let s = sums(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]);
        assert_abs_diff_eq!(s.slope().unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.intercept().unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.correlation().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn too_few_rows_are_rank_deficient() {
        let base = sums(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0)]);
        let one = sums(&[(0.0, 0.0)]);
        assert_eq!(RegressionMeasure::new(base).evaluate(&one), None);
        assert_eq!(
            CorrelationMeasure::new(Measure::CorrelationR, base).evaluate(&one),
            None
        );
    }

    #[test]
    fn distance_to_complement() {
        let inside = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        let outside = [(0.0, 2.0), (1.0, 1.0), (2.0, 0.0)];
        let base = sums(&[&inside[..], &outside[..]].concat());
        let m = CorrelationMeasure::new(Measure::CorrelationDistance, base);
        let score = m.evaluate(&sums(&inside)).unwrap();
        assert_abs_diff_eq!(score.quality, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(score.secondary, 1.0, epsilon = 1e-9);
    }
}
