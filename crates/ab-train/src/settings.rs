//! Typed values handed over by the external settings dispatcher.

use serde::{Deserialize, Serialize};

use crate::error::{TrainError, TrainResult};

/// A named setting's value. Deserializes untagged: a number, a list of
/// `[x, y]` pairs, or a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Scalar(f64),
    Curve(PiecewiseLinear),
    Text(String),
}

impl SettingValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            SettingValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Scalar(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Text(v.to_string())
    }
}

impl From<PiecewiseLinear> for SettingValue {
    fn from(v: PiecewiseLinear) -> Self {
        SettingValue::Curve(v)
    }
}

/// Piecewise-linear curve through `(x, y)` knots with strictly increasing `x`.
/// Outside the knot range the end values are held.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct PiecewiseLinear {
    knots: Vec<(f64, f64)>,
}

impl PiecewiseLinear {
    pub fn new(knots: Vec<(f64, f64)>) -> TrainResult<Self> {
        if knots.is_empty() {
            return Err(TrainError::InvalidArg {
                what: "curve needs at least one knot",
            });
        }
        if knots.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(TrainError::InvalidArg {
                what: "curve knots must be finite",
            });
        }
        if knots.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(TrainError::InvalidArg {
                what: "curve x values must be strictly increasing",
            });
        }
        Ok(Self { knots })
    }

    pub fn knots(&self) -> &[(f64, f64)] {
        &self.knots
    }

    pub fn eval(&self, x: f64) -> f64 {
        let i = self.knots.partition_point(|(kx, _)| *kx <= x);
        if i == 0 {
            return self.knots[0].1;
        }
        if i == self.knots.len() {
            return self.knots[i - 1].1;
        }
        let (x0, y0) = self.knots[i - 1];
        let (x1, y1) = self.knots[i];
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

impl TryFrom<Vec<(f64, f64)>> for PiecewiseLinear {
    type Error = TrainError;

    fn try_from(knots: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        PiecewiseLinear::new(knots)
    }
}

impl From<PiecewiseLinear> for Vec<(f64, f64)> {
    fn from(curve: PiecewiseLinear) -> Self {
        curve.knots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_and_clamps() {
        let c = PiecewiseLinear::new(vec![(5.0, 0.0), (50.0, 1.0)]).unwrap();
        assert_eq!(c.eval(0.0), 0.0);
        assert_eq!(c.eval(5.0), 0.0);
        assert!((c.eval(27.5) - 0.5).abs() < 1e-12);
        assert_eq!(c.eval(50.0), 1.0);
        assert_eq!(c.eval(90.0), 1.0);
    }

    #[test]
    fn single_knot_is_constant() {
        let c = PiecewiseLinear::new(vec![(1.0, 0.7)]).unwrap();
        assert_eq!(c.eval(-5.0), 0.7);
        assert_eq!(c.eval(5.0), 0.7);
    }

    #[test]
    fn rejects_bad_knots() {
        assert!(PiecewiseLinear::new(vec![]).is_err());
        assert!(PiecewiseLinear::new(vec![(1.0, 0.0), (1.0, 1.0)]).is_err());
        assert!(PiecewiseLinear::new(vec![(0.0, f64::NAN)]).is_err());
    }

    #[test]
    fn setting_values_deserialize_untagged() {
        let v: SettingValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(v, SettingValue::Scalar(12.5));

        let v: SettingValue = serde_json::from_str("\"HP\"").unwrap();
        assert_eq!(v, SettingValue::Text("HP".into()));

        let v: SettingValue = serde_json::from_str("[[0, 0], [50, 1]]").unwrap();
        match v {
            SettingValue::Curve(c) => assert_eq!(c.knots(), &[(0.0, 0.0), (50.0, 1.0)]),
            other => panic!("expected curve, got {other:?}"),
        }

        // Unsorted knots are not a curve, and not a scalar or text either.
        assert!(serde_json::from_str::<SettingValue>("[[5, 0], [1, 1]]").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn eval_stays_within_knot_values(
            ys in prop::collection::vec(-10.0_f64..10.0, 1..8),
            x in -20.0_f64..20.0,
        ) {
            let knots: Vec<(f64, f64)> = ys.iter().enumerate().map(|(i, &y)| (i as f64, y)).collect();
            let curve = PiecewiseLinear::new(knots).unwrap();
            let lo = ys.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let y = curve.eval(x);
            prop_assert!(y >= lo - 1e-12 && y <= hi + 1e-12);
        }

        #[test]
        fn eval_hits_every_knot(ys in prop::collection::vec(-10.0_f64..10.0, 1..8)) {
            let knots: Vec<(f64, f64)> = ys.iter().enumerate().map(|(i, &y)| (i as f64, y)).collect();
            let curve = PiecewiseLinear::new(knots).unwrap();
            for (i, &y) in ys.iter().enumerate() {
                prop_assert!((curve.eval(i as f64) - y).abs() < 1e-12);
            }
        }
    }
}
