use crate::AbError;

/// Floating point type used throughout the brake model.
pub type Real = f64;

/// Absolute + relative tolerance pair.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, AbError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(AbError::NonFinite { what, value: v })
    }
}

/// Finite and strictly positive. Volumes, lengths and orifice areas go through here
/// so that the per-tick physics never divides by zero.
pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, AbError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(AbError::InvalidArg { what })
    }
}

/// True when `value` lies in the closed interval spanned by `a` and `b`, in either order.
pub fn is_between(value: Real, a: Real, b: Real, tol: Tolerances) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (value >= lo && value <= hi) || nearly_equal(value, lo, tol) || nearly_equal(value, hi, tol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(ensure_positive(1.0, "volume").is_ok());
        assert_eq!(
            ensure_positive(0.0, "volume"),
            Err(AbError::InvalidArg { what: "volume" })
        );
        assert!(ensure_positive(-2.0, "volume").is_err());
        assert!(matches!(
            ensure_positive(Real::INFINITY, "volume"),
            Err(AbError::NonFinite { .. })
        ));
    }

    #[test]
    fn is_between_either_order() {
        let tol = Tolerances::default();
        assert!(is_between(2.0, 1.0, 3.0, tol));
        assert!(is_between(2.0, 3.0, 1.0, tol));
        assert!(is_between(3.0 + 1e-12, 1.0, 3.0, tol));
        assert!(!is_between(3.1, 1.0, 3.0, tol));
    }
}
