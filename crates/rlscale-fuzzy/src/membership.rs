//! Trapezoidal membership functions and the linguistic variables built
//! from them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rlscale_core::config::{LatencyTermsConfig, LoadTermsConfig};

#[derive(Debug, Error, PartialEq)]
pub enum FuzzyError {
    #[error("trapezoid breakpoints must be ascending, got [{a}, {b}, {c}, {d}]")]
    Breakpoints { a: f64, b: f64, c: f64, d: f64 },
}

/// Trapezoid with breakpoints `a <= b <= c <= d`.
///
/// Degree is 0 outside `[a, d]`, 1 on `[b, c]`, and ramps linearly on
/// `(a, b)` and `(c, d)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trapezoid {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl Trapezoid {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Result<Self, FuzzyError> {
        let ordered = a <= b && b <= c && c <= d;
        if !ordered {
            return Err(FuzzyError::Breakpoints { a, b, c, d });
        }
        Ok(Self { a, b, c, d })
    }

    pub fn from_array([a, b, c, d]: [f64; 4]) -> Result<Self, FuzzyError> {
        Self::new(a, b, c, d)
    }

    /// Membership degree of `x`, always in `[0, 1]`.
    pub fn degree(&self, x: f64) -> f64 {
        if x.is_nan() || x < self.a || x > self.d {
            return 0.0;
        }
        if x >= self.b && x <= self.c {
            return 1.0;
        }
        // Strict inequalities make the divisors non-zero here.
        if x < self.b {
            (x - self.a) / (self.b - self.a)
        } else {
            (self.d - x) / (self.d - self.c)
        }
    }

    pub fn breakpoints(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }
}

// ── Linguistic levels ─────────────────────────────────────────────

/// Labels of the CPU and memory variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadLevel {
    Low,
    Medium,
    High,
}

/// Labels of the response-time variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyLevel {
    Fast,
    Normal,
    Slow,
}

/// Dominant label per metric, used as a coarse categorical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FuzzyStateKey {
    pub cpu: LoadLevel,
    pub memory: LoadLevel,
    pub response: LatencyLevel,
}

// ── Terms ─────────────────────────────────────────────────────────

/// Membership functions of a load variable (percent, 0–100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTerms {
    pub low: Trapezoid,
    pub medium: Trapezoid,
    pub high: Trapezoid,
}

impl Default for LoadTerms {
    fn default() -> Self {
        Self {
            low: Trapezoid { a: 0.0, b: 0.0, c: 30.0, d: 50.0 },
            medium: Trapezoid { a: 40.0, b: 50.0, c: 60.0, d: 70.0 },
            high: Trapezoid { a: 60.0, b: 80.0, c: 100.0, d: 100.0 },
        }
    }
}

impl LoadTerms {
    pub fn from_config(config: &LoadTermsConfig) -> Result<Self, FuzzyError> {
        Ok(Self {
            low: Trapezoid::from_array(config.low)?,
            medium: Trapezoid::from_array(config.medium)?,
            high: Trapezoid::from_array(config.high)?,
        })
    }

    pub fn evaluate(&self, x: f64) -> LoadDegrees {
        LoadDegrees {
            low: self.low.degree(x),
            medium: self.medium.degree(x),
            high: self.high.degree(x),
        }
    }
}

/// Membership functions of the response-time variable (percent of SLA).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyTerms {
    pub fast: Trapezoid,
    pub normal: Trapezoid,
    pub slow: Trapezoid,
}

impl Default for LatencyTerms {
    fn default() -> Self {
        Self {
            fast: Trapezoid { a: 0.0, b: 0.0, c: 40.0, d: 60.0 },
            normal: Trapezoid { a: 40.0, b: 60.0, c: 70.0, d: 90.0 },
            slow: Trapezoid { a: 70.0, b: 90.0, c: 100.0, d: 100.0 },
        }
    }
}

impl LatencyTerms {
    pub fn from_config(config: &LatencyTermsConfig) -> Result<Self, FuzzyError> {
        Ok(Self {
            fast: Trapezoid::from_array(config.fast)?,
            normal: Trapezoid::from_array(config.normal)?,
            slow: Trapezoid::from_array(config.slow)?,
        })
    }

    pub fn evaluate(&self, x: f64) -> LatencyDegrees {
        LatencyDegrees {
            fast: self.fast.degree(x),
            normal: self.normal.degree(x),
            slow: self.slow.degree(x),
        }
    }
}

// ── Degrees ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadDegrees {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl LoadDegrees {
    /// Label with the highest degree. Ties go to the lower label.
    pub fn dominant(&self) -> LoadLevel {
        let mut best = (LoadLevel::Low, self.low);
        for candidate in [(LoadLevel::Medium, self.medium), (LoadLevel::High, self.high)] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }

    pub fn labels(&self) -> [(&'static str, f64); 3] {
        [("low", self.low), ("medium", self.medium), ("high", self.high)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyDegrees {
    pub fast: f64,
    pub normal: f64,
    pub slow: f64,
}

impl LatencyDegrees {
    /// Label with the highest degree. Ties go to the faster label.
    pub fn dominant(&self) -> LatencyLevel {
        let mut best = (LatencyLevel::Fast, self.fast);
        for candidate in [(LatencyLevel::Normal, self.normal), (LatencyLevel::Slow, self.slow)] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }

    pub fn labels(&self) -> [(&'static str, f64); 3] {
        [("fast", self.fast), ("normal", self.normal), ("slow", self.slow)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medium_peak_is_full_membership() {
        let medium = Trapezoid::new(40.0, 50.0, 60.0, 70.0).unwrap();
        assert_eq!(medium.degree(50.0), 1.0);
        assert_eq!(medium.degree(60.0), 1.0);
        assert_eq!(medium.degree(45.0), 0.5);
        assert_eq!(medium.degree(65.0), 0.5);
        assert_eq!(medium.degree(40.0), 0.0);
        assert_eq!(medium.degree(70.0), 0.0);
        assert_eq!(medium.degree(90.0), 0.0);
    }

    #[test]
    fn shoulder_trapezoids_hit_their_edges() {
        let terms = LoadTerms::default();
        assert_eq!(terms.low.degree(0.0), 1.0);
        assert_eq!(terms.high.degree(100.0), 1.0);
        assert_eq!(terms.high.degree(101.0), 0.0);
    }

    #[test]
    fn degrees_stay_in_unit_interval() {
        let load = LoadTerms::default();
        let latency = LatencyTerms::default();
        let mut x = -10.0;
        while x <= 110.0 {
            for (_, d) in load.evaluate(x).labels() {
                assert!((0.0..=1.0).contains(&d), "load degree {d} at {x}");
            }
            for (_, d) in latency.evaluate(x).labels() {
                assert!((0.0..=1.0).contains(&d), "latency degree {d} at {x}");
            }
            x += 0.25;
        }
    }

    #[test]
    fn nan_has_no_membership() {
        let t = Trapezoid::new(0.0, 0.0, 30.0, 50.0).unwrap();
        assert_eq!(t.degree(f64::NAN), 0.0);
    }

    #[test]
    fn rejects_descending_breakpoints() {
        assert_eq!(
            Trapezoid::new(10.0, 5.0, 20.0, 30.0),
            Err(FuzzyError::Breakpoints { a: 10.0, b: 5.0, c: 20.0, d: 30.0 })
        );
    }

    #[test]
    fn dominant_label_prefers_lower_on_tie() {
        let degrees = LoadDegrees { low: 0.5, medium: 0.5, high: 0.0 };
        assert_eq!(degrees.dominant(), LoadLevel::Low);

        let degrees = LatencyDegrees { fast: 0.0, normal: 0.2, slow: 0.7 };
        assert_eq!(degrees.dominant(), LatencyLevel::Slow);
    }

    #[test]
    fn terms_from_config() {
        let config = LoadTermsConfig {
            low: [0.0, 0.0, 20.0, 40.0],
            medium: [30.0, 45.0, 55.0, 70.0],
            high: [60.0, 80.0, 100.0, 100.0],
        };
        let terms = LoadTerms::from_config(&config).unwrap();
        assert_eq!(terms.medium.breakpoints(), [30.0, 45.0, 55.0, 70.0]);

        let bad = LoadTermsConfig {
            medium: [50.0, 45.0, 55.0, 70.0],
            ..config
        };
        assert!(LoadTerms::from_config(&bad).is_err());
    }
}
