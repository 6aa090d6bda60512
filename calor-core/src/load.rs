//! Thermal loads and time profiles.
//!
//! Loads are a tagged variant evaluated per tag; every load carries a
//! [`TimeProfile`] multiplier. For the exchange loads (convective and
//! radiative) the profile scales the ambient temperature, for all others it
//! scales the magnitude.

use crate::mesh::SurfacePatch;
use serde::{Deserialize, Serialize};

/// Time dependence of a load or boundary value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TimeProfile {
    /// Always 1.
    #[default]
    Constant,
    /// 0 before `start`, 1 after `end`, linear in between.
    Ramp { start: f64, end: f64 },
    /// offset + amplitude · sin(2π · frequency · t + phase).
    Sinusoid {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        phase: f64,
    },
    /// Piecewise linear through (t, value) samples sorted by t, held
    /// constant outside the sampled range.
    Table(Vec<(f64, f64)>),
}

impl TimeProfile {
    /// Multiplier at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        match self {
            TimeProfile::Constant => 1.0,
            TimeProfile::Ramp { start, end } => {
                if t <= *start {
                    0.0
                } else if t >= *end {
                    1.0
                } else {
                    (t - start) / (end - start)
                }
            }
            TimeProfile::Sinusoid {
                offset,
                amplitude,
                frequency,
                phase,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t + phase).sin(),
            TimeProfile::Table(samples) => interpolate(samples, t),
        }
    }
}

fn interpolate(samples: &[(f64, f64)], t: f64) -> f64 {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    // First sample strictly after t; exists because t < last.0
    let i = samples.partition_point(|&(ts, _)| ts <= t);
    let (t0, v0) = samples[i - 1];
    let (t1, v1) = samples[i];
    if t1 == t0 {
        return v1;
    }
    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
}

/// A thermal load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Load {
    /// Concentrated heat input at a node (W).
    Point {
        node: usize,
        watts: f64,
        profile: TimeProfile,
    },
    /// Heat flux into the body through surface patches (W/m²).
    Surface {
        patches: Vec<SurfacePatch>,
        flux: f64,
        profile: TimeProfile,
    },
    /// Internal heat generation (W/m³).
    Volume {
        elements: Vec<usize>,
        power_density: f64,
        profile: TimeProfile,
    },
    /// Convective exchange h·(T∞ − T) with surroundings.
    Convective {
        patches: Vec<SurfacePatch>,
        film_coefficient: f64,
        ambient: f64,
        profile: TimeProfile,
    },
    /// Linearised radiative exchange εσ·(T∞⁴ − T⁴), absolute temperatures.
    Radiative {
        patches: Vec<SurfacePatch>,
        emissivity: f64,
        ambient: f64,
        profile: TimeProfile,
    },
}

impl Load {
    /// Constant point load.
    pub fn point(node: usize, watts: f64) -> Self {
        Load::Point {
            node,
            watts,
            profile: TimeProfile::Constant,
        }
    }

    /// Constant surface flux.
    pub fn surface(patches: Vec<SurfacePatch>, flux: f64) -> Self {
        Load::Surface {
            patches,
            flux,
            profile: TimeProfile::Constant,
        }
    }

    /// Constant volumetric source.
    pub fn volume(elements: Vec<usize>, power_density: f64) -> Self {
        Load::Volume {
            elements,
            power_density,
            profile: TimeProfile::Constant,
        }
    }

    /// Convective exchange with a constant ambient temperature.
    pub fn convective(patches: Vec<SurfacePatch>, film_coefficient: f64, ambient: f64) -> Self {
        Load::Convective {
            patches,
            film_coefficient,
            ambient,
            profile: TimeProfile::Constant,
        }
    }

    /// Radiative exchange with a constant ambient temperature.
    pub fn radiative(patches: Vec<SurfacePatch>, emissivity: f64, ambient: f64) -> Self {
        Load::Radiative {
            patches,
            emissivity,
            ambient,
            profile: TimeProfile::Constant,
        }
    }

    /// Replace the time profile.
    pub fn with_profile(mut self, new_profile: TimeProfile) -> Self {
        match &mut self {
            Load::Point { profile, .. }
            | Load::Surface { profile, .. }
            | Load::Volume { profile, .. }
            | Load::Convective { profile, .. }
            | Load::Radiative { profile, .. } => *profile = new_profile,
        }
        self
    }

    /// The load's time profile.
    pub fn profile(&self) -> &TimeProfile {
        match self {
            Load::Point { profile, .. }
            | Load::Surface { profile, .. }
            | Load::Volume { profile, .. }
            | Load::Convective { profile, .. }
            | Load::Radiative { profile, .. } => profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ramp() {
        let ramp = TimeProfile::Ramp {
            start: 1.0,
            end: 3.0,
        };
        assert_relative_eq!(ramp.value(0.0), 0.0);
        assert_relative_eq!(ramp.value(2.0), 0.5);
        assert_relative_eq!(ramp.value(10.0), 1.0);
    }

    #[test]
    fn test_sinusoid() {
        let s = TimeProfile::Sinusoid {
            offset: 1.0,
            amplitude: 2.0,
            frequency: 0.25,
            phase: 0.0,
        };
        assert_relative_eq!(s.value(0.0), 1.0);
        assert_relative_eq!(s.value(1.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_table_interpolation_and_clamping() {
        let table = TimeProfile::Table(vec![(0.0, 0.0), (10.0, 100.0), (20.0, 50.0)]);
        assert_relative_eq!(table.value(-5.0), 0.0);
        assert_relative_eq!(table.value(5.0), 50.0);
        assert_relative_eq!(table.value(10.0), 100.0);
        assert_relative_eq!(table.value(15.0), 75.0);
        assert_relative_eq!(table.value(30.0), 50.0);
        assert_relative_eq!(TimeProfile::Table(vec![]).value(1.0), 0.0);
    }

    #[test]
    fn test_with_profile() {
        let load = Load::point(3, 10.0).with_profile(TimeProfile::Ramp {
            start: 0.0,
            end: 1.0,
        });
        assert_relative_eq!(load.profile().value(0.5), 0.5);
    }
}
