//! Analysis settings.
//!
//! [`ThermalSettings`] is plain data with serde support so that a run can be
//! configured from JSON. Every field has a default; `validate` enforces the
//! ranges before any work is done.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of analysis performed by [`crate::ThermalSolver::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisType {
    /// K·T = F.
    #[default]
    Steady,
    /// θ-method time integration of C·dT/dt + K·T = F.
    Transient,
}

impl AnalysisType {
    /// Tag byte used in the result file.
    pub fn to_u8(self) -> u8 {
        match self {
            AnalysisType::Steady => 0,
            AnalysisType::Transient => 1,
        }
    }

    /// Inverse of [`AnalysisType::to_u8`].
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(AnalysisType::Steady),
            1 => Some(AnalysisType::Transient),
            _ => None,
        }
    }
}

/// Capacity matrix form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MassLumping {
    /// Full N Nᵀ integral.
    #[default]
    Consistent,
    /// Diagonal (row-sum) capacity.
    Lumped,
}

/// Linear solver backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverBackend {
    /// Sparse Cholesky with LU fallback.
    #[default]
    Direct,
    /// Preconditioned conjugate gradient.
    Iterative,
}

/// Preconditioner for the iterative backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preconditioner {
    /// Diagonal scaling.
    #[default]
    Jacobi,
    /// Zero fill-in incomplete Cholesky.
    IncompleteCholesky,
}

/// Settings for a thermal analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalSettings {
    pub analysis_type: AnalysisType,
    /// Start of the simulated interval (s).
    pub start_time: f64,
    /// End of the simulated interval (s).
    pub end_time: f64,
    /// Initial (or fixed) step size (s). Zero lets adaptive stepping pick
    /// the critical step estimate.
    pub time_step: f64,
    pub adaptive_time_step: bool,
    pub min_time_step: f64,
    pub max_time_step: f64,
    /// Step size controller safety factor, in (0, 1).
    pub safety_factor: f64,
    /// Local error tolerance of the step-doubling estimate.
    pub error_tolerance: f64,
    /// θ of the θ-method: 0 forward Euler, 0.5 Crank–Nicolson, 1 backward Euler.
    pub theta: f64,
    pub mass_lumping: MassLumping,
    /// Relative residual tolerance (iterative backend, radiation iteration).
    pub convergence_tolerance: f64,
    pub max_iterations: usize,
    pub backend: SolverBackend,
    pub preconditioner: Preconditioner,
    /// Initial temperature when none is supplied; also the floating-system anchor.
    pub ambient_temperature: f64,
    /// Fraction of elements that may be skipped as degenerate.
    pub degenerate_tolerance: f64,
}

impl Default for ThermalSettings {
    fn default() -> Self {
        Self {
            analysis_type: AnalysisType::Steady,
            start_time: 0.0,
            end_time: 1.0,
            time_step: 0.1,
            adaptive_time_step: false,
            min_time_step: 1e-6,
            max_time_step: 1.0,
            safety_factor: 0.9,
            error_tolerance: 1e-3,
            theta: 0.5,
            mass_lumping: MassLumping::Consistent,
            convergence_tolerance: 1e-10,
            max_iterations: 1000,
            backend: SolverBackend::Direct,
            preconditioner: Preconditioner::Jacobi,
            ambient_temperature: 20.0,
            degenerate_tolerance: 0.01,
        }
    }
}

impl ThermalSettings {
    /// Steady-state settings with defaults elsewhere.
    pub fn steady() -> Self {
        Self::default()
    }

    /// Fixed-step transient settings over `[start, end]`.
    pub fn transient(start_time: f64, end_time: f64, time_step: f64) -> Self {
        Self {
            analysis_type: AnalysisType::Transient,
            start_time,
            end_time,
            time_step,
            max_time_step: end_time - start_time,
            ..Self::default()
        }
    }

    /// Parse settings from JSON and validate them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file and validate them.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field range.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(Error::SettingsInvalid(msg.into()))
        }

        if !(0.0..=1.0).contains(&self.theta) {
            return invalid(format!("theta must lie in [0, 1], got {}", self.theta));
        }
        if !(self.convergence_tolerance > 0.0 && self.convergence_tolerance.is_finite()) {
            return invalid("convergence_tolerance must be positive");
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be positive");
        }
        if !self.ambient_temperature.is_finite() {
            return invalid("ambient_temperature must be finite");
        }
        if !(0.0..=1.0).contains(&self.degenerate_tolerance) {
            return invalid("degenerate_tolerance must lie in [0, 1]");
        }

        if self.analysis_type == AnalysisType::Steady {
            return Ok(());
        }

        if !(self.start_time.is_finite() && self.end_time.is_finite()) {
            return invalid("start_time and end_time must be finite");
        }
        if self.start_time >= self.end_time {
            return invalid(format!(
                "start_time ({}) must be before end_time ({})",
                self.start_time, self.end_time
            ));
        }
        if !self.time_step.is_finite() || self.time_step < 0.0 {
            return invalid("time_step must be non-negative");
        }
        if self.time_step == 0.0 && !self.adaptive_time_step {
            return invalid("time_step must be positive for fixed-step transient analysis");
        }

        if self.adaptive_time_step {
            if !(self.min_time_step > 0.0 && self.min_time_step < self.max_time_step) {
                return invalid(format!(
                    "adaptive stepping requires 0 < min_time_step < max_time_step, got {} and {}",
                    self.min_time_step, self.max_time_step
                ));
            }
            if !self.max_time_step.is_finite() {
                return invalid("max_time_step must be finite");
            }
            if !(self.safety_factor > 0.0 && self.safety_factor < 1.0) {
                return invalid("safety_factor must lie in (0, 1)");
            }
            if !(self.error_tolerance > 0.0 && self.error_tolerance.is_finite()) {
                return invalid("error_tolerance must be positive");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ThermalSettings::default().validate().is_ok());
        assert!(ThermalSettings::transient(0.0, 10.0, 1.0).validate().is_ok());
        assert_eq!(ThermalSettings::default().theta, 0.5);
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let mut s = ThermalSettings::transient(0.0, 10.0, 1.0);
        s.theta = 1.5;
        assert!(matches!(s.validate(), Err(Error::SettingsInvalid(_))));

        let s = ThermalSettings::transient(5.0, 1.0, 1.0);
        assert!(s.validate().is_err());

        let s = ThermalSettings::transient(0.0, 1.0, 0.0);
        assert!(s.validate().is_err());

        let mut s = ThermalSettings::transient(0.0, 1.0, 0.0);
        s.adaptive_time_step = true;
        s.min_time_step = 0.1;
        s.max_time_step = 0.5;
        assert!(s.validate().is_ok());

        s.safety_factor = 1.0;
        assert!(s.validate().is_err());

        s.safety_factor = 0.9;
        s.min_time_step = 1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_steady_ignores_time_fields() {
        let s = ThermalSettings {
            end_time: -1.0,
            time_step: 0.0,
            ..ThermalSettings::default()
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_json_partial_document() {
        let s = ThermalSettings::from_json_str(
            r#"{ "analysis_type": "Transient", "end_time": 100.0, "time_step": 2.0,
                 "theta": 1.0, "backend": "Iterative" }"#,
        )
        .unwrap();
        assert_eq!(s.analysis_type, AnalysisType::Transient);
        assert_eq!(s.backend, SolverBackend::Iterative);
        assert_eq!(s.theta, 1.0);
        assert_eq!(s.mass_lumping, MassLumping::Consistent);
    }

    #[test]
    fn test_json_round_trip() {
        let mut s = ThermalSettings::transient(0.0, 60.0, 0.5);
        s.preconditioner = Preconditioner::IncompleteCholesky;
        let json = s.to_json_string().unwrap();
        assert_eq!(ThermalSettings::from_json_str(&json).unwrap(), s);
    }

    #[test]
    fn test_json_invalid_values() {
        assert!(matches!(
            ThermalSettings::from_json_str(r#"{ "theta": -0.1 }"#),
            Err(Error::SettingsInvalid(_))
        ));
        assert!(matches!(
            ThermalSettings::from_json_str("not json"),
            Err(Error::Json(_))
        ));
    }
}
