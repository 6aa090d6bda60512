//! Thermal material properties.
//!
//! A material supplies the conductivity tensor D used in the element
//! conductivity matrix and the volumetric heat capacity ρcₚ used in the
//! capacity matrix. Conductivity may be isotropic, orthotropic (principal
//! axes aligned with x, y, z) or a full symmetric tensor.

use crate::error::{Error, Result};
use crate::types::ConductivityMatrix;

/// Thermal conductivity description (W/m·K).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conductivity {
    /// Same conductivity in every direction.
    Isotropic(f64),
    /// Diagonal tensor [kx, ky, kz].
    Orthotropic([f64; 3]),
    /// Full symmetric positive definite tensor.
    Anisotropic(ConductivityMatrix),
}

impl Conductivity {
    /// The 3×3 conductivity tensor D.
    pub fn tensor(&self) -> ConductivityMatrix {
        match *self {
            Conductivity::Isotropic(k) => ConductivityMatrix::identity() * k,
            Conductivity::Orthotropic([kx, ky, kz]) => {
                ConductivityMatrix::from_diagonal(&nalgebra::Vector3::new(kx, ky, kz))
            }
            Conductivity::Anisotropic(d) => d,
        }
    }

    /// Largest principal conductivity, used for the critical time step.
    pub fn max_principal(&self) -> f64 {
        match *self {
            Conductivity::Isotropic(k) => k,
            Conductivity::Orthotropic(k) => k.iter().copied().fold(f64::MIN, f64::max),
            Conductivity::Anisotropic(d) => d
                .symmetric_eigenvalues()
                .iter()
                .copied()
                .fold(f64::MIN, f64::max),
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Conductivity::Isotropic(k) => {
                if !(k > 0.0 && k.is_finite()) {
                    return Err(Error::InvalidMaterial(
                        "Thermal conductivity must be positive".into(),
                    ));
                }
            }
            Conductivity::Orthotropic(k) => {
                if k.iter().any(|&ki| !(ki > 0.0 && ki.is_finite())) {
                    return Err(Error::InvalidMaterial(
                        "Orthotropic conductivities must all be positive".into(),
                    ));
                }
            }
            Conductivity::Anisotropic(d) => {
                let asym = (d - d.transpose()).norm();
                if asym > 1e-12 * d.norm() {
                    return Err(Error::InvalidMaterial(
                        "Conductivity tensor must be symmetric".into(),
                    ));
                }
                if d.symmetric_eigenvalues().iter().any(|&l| l <= 0.0) {
                    return Err(Error::InvalidMaterial(
                        "Conductivity tensor must be positive definite".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Material properties for thermal analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Thermal conductivity.
    pub conductivity: Conductivity,
    /// Mass density (kg/m³).
    pub density: f64,
    /// Specific heat capacity (J/kg·K).
    pub specific_heat: f64,
}

impl Material {
    /// Create an isotropic material.
    ///
    /// # Arguments
    ///
    /// * `conductivity` - Thermal conductivity k (W/m·K)
    /// * `density` - Density ρ (kg/m³)
    /// * `specific_heat` - Specific heat cₚ (J/kg·K)
    ///
    /// # Errors
    ///
    /// Returns error if any property is non-positive.
    pub fn new(conductivity: f64, density: f64, specific_heat: f64) -> Result<Self> {
        Self::with_conductivity(Conductivity::Isotropic(conductivity), density, specific_heat)
    }

    /// Create a material with an arbitrary conductivity description.
    pub fn with_conductivity(
        conductivity: Conductivity,
        density: f64,
        specific_heat: f64,
    ) -> Result<Self> {
        let material = Self {
            conductivity,
            density,
            specific_heat,
        };
        material.validate()?;
        Ok(material)
    }

    /// Check every property range.
    pub fn validate(&self) -> Result<()> {
        self.conductivity.validate()?;
        if !(self.density > 0.0 && self.density.is_finite()) {
            return Err(Error::InvalidMaterial("Density must be positive".into()));
        }
        if !(self.specific_heat > 0.0 && self.specific_heat.is_finite()) {
            return Err(Error::InvalidMaterial(
                "Specific heat must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Conductivity tensor D.
    pub fn conductivity_tensor(&self) -> ConductivityMatrix {
        self.conductivity.tensor()
    }

    /// Volumetric heat capacity ρcₚ (J/m³·K).
    pub fn volumetric_heat_capacity(&self) -> f64 {
        self.density * self.specific_heat
    }

    /// Thermal diffusivity α = k_max / (ρcₚ) (m²/s).
    pub fn diffusivity(&self) -> f64 {
        self.conductivity.max_principal() / self.volumetric_heat_capacity()
    }
}

/// Common material presets.
impl Material {
    /// Carbon steel (k = 50 W/m·K, ρ = 7850 kg/m³, cₚ = 490 J/kg·K).
    pub fn steel() -> Self {
        Self {
            conductivity: Conductivity::Isotropic(50.0),
            density: 7850.0,
            specific_heat: 490.0,
        }
    }

    /// Aluminum 6061 (k = 167 W/m·K, ρ = 2700 kg/m³, cₚ = 896 J/kg·K).
    pub fn aluminum() -> Self {
        Self {
            conductivity: Conductivity::Isotropic(167.0),
            density: 2700.0,
            specific_heat: 896.0,
        }
    }

    /// Pure copper (k = 401 W/m·K, ρ = 8960 kg/m³, cₚ = 385 J/kg·K).
    pub fn copper() -> Self {
        Self {
            conductivity: Conductivity::Isotropic(401.0),
            density: 8960.0,
            specific_heat: 385.0,
        }
    }

    /// Normal-weight concrete (k = 1.7 W/m·K, ρ = 2300 kg/m³, cₚ = 880 J/kg·K).
    pub fn concrete() -> Self {
        Self {
            conductivity: Conductivity::Isotropic(1.7),
            density: 2300.0,
            specific_heat: 880.0,
        }
    }

    /// Soda-lime glass (k = 1.0 W/m·K, ρ = 2500 kg/m³, cₚ = 840 J/kg·K).
    pub fn glass() -> Self {
        Self {
            conductivity: Conductivity::Isotropic(1.0),
            density: 2500.0,
            specific_heat: 840.0,
        }
    }
}
