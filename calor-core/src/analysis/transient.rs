//! Transient driver: θ-method time stepping with optional step doubling.
//!
//! One step solves
//!
//! ```text
//! (C + θΔt·K) Tⁿ⁺¹ = (C − (1−θ)Δt·K) Tⁿ + Δt·(θ·Fⁿ⁺¹ + (1−θ)·Fⁿ)
//! ```
//!
//! with prescribed temperatures at tⁿ⁺¹ imposed on the left-hand side. K
//! includes surface exchange; radiation is linearised about Tⁿ.
//!
//! With adaptive stepping each attempt is computed once with Δt and twice
//! with Δt/2. The relative difference drives the next step size; the
//! half-step result is the one kept.

use super::{linear_solve, Model};
use crate::boundary::apply_dirichlet;
use crate::error::{Diagnostic, Error, Result};
use crate::progress::{ProgressEvent, Reporter};
use crate::result::ThermalResult;
use crate::settings::AnalysisType;
use crate::solver::LinearSolver;
use crate::sparse::{linear_combination, spmv};
use tracing::{debug, info};

/// Relative slack when comparing times against `end_time`.
const TIME_EPS: f64 = 1e-12;

fn max_abs(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).fold(0.0, f64::max)
}

/// Advance `t_old` from `t` by `dt`.
fn theta_step(
    model: &Model<'_>,
    solver: &mut dyn LinearSolver,
    t_old: &[f64],
    t: f64,
    dt: f64,
) -> Result<Vec<f64>> {
    let theta = model.settings.theta;
    let (k, f_old) = model.operator(t, t_old)?;
    let f_new = model.load(t + dt, t_old)?;
    let c = model
        .system
        .capacity
        .as_ref()
        .ok_or_else(|| Error::AssemblyFailure("capacity matrix was not assembled".into()))?;

    let mut a = linear_combination(1.0, c, theta * dt, &k)?;
    let explicit = linear_combination(1.0, c, -(1.0 - theta) * dt, &k)?;
    let mut rhs = spmv(&explicit, t_old);
    for ((r, new), old) in rhs.iter_mut().zip(&f_new).zip(&f_old) {
        *r += dt * (theta * new + (1.0 - theta) * old);
    }

    apply_dirichlet(&mut a, &mut rhs, &model.dirichlet.values(t + dt))?;
    linear_solve(solver, &a, &rhs)
}

/// Outcome of one attempted adaptive step.
enum Attempt {
    Accept { temperatures: Vec<f64>, next_dt: f64 },
    Reject { next_dt: f64 },
}

fn adaptive_attempt(
    model: &Model<'_>,
    solver: &mut dyn LinearSolver,
    current: &[f64],
    t: f64,
    dt: f64,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Attempt> {
    let s = model.settings;
    let at_minimum = dt <= s.min_time_step * (1.0 + TIME_EPS);

    let solved = theta_step(model, solver, current, t, dt).and_then(|full| {
        let half = theta_step(model, solver, current, t, 0.5 * dt)?;
        let two_halves = theta_step(model, solver, &half, t + 0.5 * dt, 0.5 * dt)?;
        Ok((full, two_halves))
    });

    let (full, two_halves) = match solved {
        Ok(pair) => pair,
        Err(Error::NotConverged { .. }) if !at_minimum => {
            debug!(t, dt, "linear solve did not converge, shrinking step");
            return Ok(Attempt::Reject {
                next_dt: (0.5 * dt).max(s.min_time_step),
            });
        }
        Err(e) => return Err(e),
    };

    let difference = full
        .iter()
        .zip(&two_halves)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    let error = difference / max_abs(&two_halves).max(1.0);

    let factor = if error > 0.0 {
        s.safety_factor * (s.error_tolerance / error).sqrt()
    } else {
        f64::INFINITY
    };
    let next_dt = (dt * factor).clamp(s.min_time_step, s.max_time_step);

    if error <= s.error_tolerance {
        return Ok(Attempt::Accept {
            temperatures: two_halves,
            next_dt,
        });
    }
    if at_minimum {
        diagnostics.push(Diagnostic::StepToleranceExceeded {
            time: t + dt,
            dt,
            error,
        });
        return Ok(Attempt::Accept {
            temperatures: two_halves,
            next_dt: s.min_time_step,
        });
    }
    debug!(t, dt, error, "step rejected");
    Ok(Attempt::Reject { next_dt })
}

/// Run the time loop and return every accepted snapshot.
pub(super) fn run(
    model: &mut Model<'_>,
    solver: &mut dyn LinearSolver,
    initial: &[f64],
    reporter: &mut Reporter<'_>,
) -> Result<ThermalResult> {
    let s = model.settings;
    let (start, end) = (s.start_time, s.end_time);
    let span = end - start;
    let n = model.n_nodes();

    let mut current = if initial.is_empty() {
        vec![s.ambient_temperature; n]
    } else {
        initial.to_vec()
    };
    for (node, value) in model.dirichlet.values(start) {
        current[node] = value;
    }

    let mut result = ThermalResult::new(AnalysisType::Transient, n, model.mesh.n_elements());
    model.snapshot(&mut result, start, current.clone())?;

    let mut dt = if s.time_step > 0.0 {
        s.time_step
    } else {
        let critical = model.system.critical_time_step;
        if critical.is_finite() {
            critical * s.safety_factor
        } else {
            s.max_time_step
        }
    };
    if s.adaptive_time_step {
        dt = dt.clamp(s.min_time_step, s.max_time_step);
    }

    let mut diagnostics = Vec::new();
    let mut t = start;
    let mut step = 0;
    let mut rejected = 0;

    while end - t > TIME_EPS * span {
        let last = t + dt >= end - TIME_EPS * span;
        let h = if last { end - t } else { dt };

        let next = if s.adaptive_time_step {
            match adaptive_attempt(model, solver, &current, t, h, &mut diagnostics)? {
                Attempt::Accept {
                    temperatures,
                    next_dt,
                } => {
                    dt = next_dt;
                    temperatures
                }
                Attempt::Reject { next_dt } => {
                    rejected += 1;
                    dt = next_dt;
                    continue;
                }
            }
        } else {
            theta_step(model, solver, &current, t, h)?
        };

        t = if last { end } else { t + h };
        step += 1;
        current = next;
        model.snapshot(&mut result, t, current.clone())?;

        let event = ProgressEvent::TimeStep {
            step,
            time: t,
            dt: h,
            fraction: (t - start) / span,
        };
        if reporter.report(event).is_break() {
            model.diagnostics.append(&mut diagnostics);
            return Err(model.cancelled(result));
        }
    }

    info!(steps = step, rejected, "transient analysis finished");
    model.diagnostics.append(&mut diagnostics);
    Ok(result)
}
