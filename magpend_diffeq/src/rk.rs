use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::{
    DiffeqErrors, OdeModel, saving::History, state::NamedState, tableau::ButcherTableau,
};

const MAX_PREALLOCATED_STEPS: usize = 1 << 20;

/// Explicit Runge-Kutta stepper for a borrowed tableau.
pub struct RungeKutta<'a> {
    tableau: &'a ButcherTableau,
}

impl<'a> RungeKutta<'a> {
    pub fn new(tableau: &'a ButcherTableau) -> Self {
        Self { tableau }
    }

    /// Advances `x` by one step of size `h`.
    ///
    /// Stages are evaluated in increasing order and every sum is accumulated
    /// left to right from zero, including terms whose coefficient is zero, so
    /// results are reproducible bit for bit. Floating point exceptions are not
    /// trapped: an `inf` or `nan` from the model flows into the result.
    pub fn step<Params, Model>(
        &self,
        model: &Model,
        x: &NamedState,
        params: &Params,
        h: f64,
    ) -> Result<NamedState, DiffeqErrors>
    where
        Params: ?Sized,
        Model: OdeModel<Params> + ?Sized,
    {
        let a = self.tableau.a();
        let mut k: Vec<NamedState> = Vec::with_capacity(self.tableau.stages());

        for s in 0..self.tableau.stages() {
            // sum previous ks with appropriate scaling from tableau
            let mut sum = x.zeros_like();
            for i in 0..s {
                sum.add_scaled(&k[i], a[s][i])?;
            }
            let mut stage = x.clone();
            stage.add_scaled(&sum, h)?;

            k.push(evaluate(model, &stage, params)?);
        }

        let mut sum = x.zeros_like();
        for (b, ks) in self.tableau.b().iter().zip(&k) {
            sum.add_scaled(ks, *b)?;
        }
        let mut y = x.clone();
        y.add_scaled(&sum, h)?;
        Ok(y)
    }

    /// Runs exactly `steps` fixed steps from `x0`.
    ///
    /// The returned history holds `steps + 1` states, the first being a copy of
    /// `x0`. Any error aborts the run and nothing is returned.
    pub fn solve_fixed<Params, Model>(
        &self,
        model: &Model,
        x0: &NamedState,
        params: &Params,
        dt: f64,
        steps: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<History, DiffeqErrors>
    where
        Params: ?Sized,
        Model: OdeModel<Params> + ?Sized,
    {
        if !dt.is_finite() {
            return Err(DiffeqErrors::InvalidArgument(format!(
                "step size must be finite, got {dt}"
            )));
        }

        debug!(
            method = self.tableau.name(),
            stages = self.tableau.stages(),
            dt,
            steps,
            "starting fixed step integration"
        );
        let start = Instant::now();

        let mut history = History::with_capacity(dt, history_capacity(steps));
        history.push(x0.clone());

        // Non-finite states are kept, not rejected. They usually mean the model
        // divided by zero, e.g. a magnet sitting exactly on the bob.
        let mut reported_non_finite = !x0.is_finite();

        for i in 1..=steps {
            let y = self.step(model, &history[i - 1], params, dt)?;
            if !reported_non_finite && !y.is_finite() {
                warn!(step = i, state = %y, "state is no longer finite, integration continues");
                reported_non_finite = true;
            }
            history.push(y);
            if let Some(bar) = progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = progress {
            bar.finish();
        }
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "finished fixed step integration"
        );
        Ok(history)
    }
}

/// Room reserved up front for a run of `steps` steps. Very long runs grow the
/// history as they go instead.
fn history_capacity(steps: usize) -> usize {
    steps.min(MAX_PREALLOCATED_STEPS) + 1
}

/// Calls the model, keeping crate errors as they are and checking that the
/// derivative has the same fields as the state.
fn evaluate<Params, Model>(
    model: &Model,
    x: &NamedState,
    params: &Params,
) -> Result<NamedState, DiffeqErrors>
where
    Params: ?Sized,
    Model: OdeModel<Params> + ?Sized,
{
    let dx = model
        .f(x, params)
        .map_err(|e| match e.downcast::<DiffeqErrors>() {
            Ok(e) => *e,
            Err(e) => DiffeqErrors::Derivative(e),
        })?;
    if !dx.same_shape(x) {
        return Err(DiffeqErrors::ShapeMismatch {
            left: x.names().to_vec(),
            right: dx.names().to_vec(),
        });
    }
    Ok(dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelResult;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    fn decay(x: &NamedState, _p: &()) -> ModelResult {
        Ok(x.scale(-1.0))
    }

    fn zero(x: &NamedState, _p: &()) -> ModelResult {
        Ok(x.zeros_like())
    }

    fn oscillator(x: &NamedState, _p: &()) -> ModelResult {
        Ok(x.with_values(vec![x.get("v")?, -x.get("x")?])?)
    }

    /// Largest error at t = 2 of the unit oscillator started at x = 1.
    fn oscillator_error(tableau: &ButcherTableau, steps: usize) -> f64 {
        let x0 = NamedState::new([("x", 1.0), ("v", 0.0)]).unwrap();
        let history = RungeKutta::new(tableau)
            .solve_fixed(&oscillator, &x0, &(), 2.0 / steps as f64, steps, None)
            .unwrap();
        let last = history.last().unwrap();
        let ex = last.get("x").unwrap() - 2.0f64.cos();
        let ev = last.get("v").unwrap() + 2.0f64.sin();
        ex.abs().max(ev.abs())
    }

    fn random_explicit_tableau(rng: &mut SmallRng) -> ButcherTableau {
        let s = rng.random_range(1..=7);
        let mut a = vec![vec![0.0; s]; s];
        for (i, row) in a.iter_mut().enumerate() {
            for aij in row.iter_mut().take(i) {
                *aij = rng.random_range(-2.0..2.0);
            }
        }
        let b = (0..s)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        let c = a
            .iter()
            .map(|row| row.iter().sum::<f64>())
            .collect();
        ButcherTableau::new(a, b, c).unwrap()
    }

    #[test]
    fn test_rk4_exponential_decay() {
        let tableau = ButcherTableau::rk4();
        let x0 = NamedState::new([("x", 1.0)]).unwrap();
        let x1 = RungeKutta::new(&tableau)
            .step(&decay, &x0, &(), 0.1)
            .unwrap();
        assert_abs_diff_eq!(x1.get("x").unwrap(), (-0.1f64).exp(), epsilon = 1e-6);
        assert_abs_diff_eq!(x1.get("x").unwrap(), 0.9048375, epsilon = 1e-7);
    }

    #[test]
    fn test_rk4_step_is_bit_reproducible() {
        // hand rolled rk4 for y' = -y with the same accumulation order
        let h = 0.1;
        let y = 1.0f64;
        let k0 = -(y + 0.0 * h);
        let k1 = -(y + (0.0 + k0 * 0.5) * h);
        let k2 = -(y + (0.0 + k0 * 0.0 + k1 * 0.5) * h);
        let k3 = -(y + (0.0 + k0 * 0.0 + k1 * 0.0 + k2 * 1.0) * h);
        let sum = 0.0 + k0 * (1. / 6.) + k1 * (1. / 3.) + k2 * (1. / 3.) + k3 * (1. / 6.);
        let expected = y + sum * h;

        let tableau = ButcherTableau::rk4();
        let x0 = NamedState::new([("y", y)]).unwrap();
        let x1 = RungeKutta::new(&tableau)
            .step(&decay, &x0, &(), h)
            .unwrap();
        assert_eq!(x1.get("y").unwrap().to_bits(), expected.to_bits());
    }

    #[test]
    fn test_constant_derivative_random_tableaus() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..100 {
            let tableau = random_explicit_tableau(&mut rng);
            let weights: f64 = tableau.b().iter().sum();
            let x = NamedState::new([
                ("theta", rng.random_range(-10.0..10.0)),
                ("w", rng.random_range(-10.0..10.0)),
            ])
            .unwrap();
            let rate = x
                .with_values(vec![rng.random_range(-5.0..5.0), rng.random_range(-5.0..5.0)])
                .unwrap();
            let constant = |_: &NamedState, _: &()| -> ModelResult { Ok(rate.clone()) };
            let h = rng.random_range(-1.0..1.0);

            let y = RungeKutta::new(&tableau)
                .step(&constant, &x, &(), h)
                .unwrap();
            for ((yi, xi), ci) in y.values().iter().zip(x.values()).zip(rate.values()) {
                assert_abs_diff_eq!(*yi, xi + h * ci * weights, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_consistent_methods_advance_constant_rate_exactly() {
        let x = NamedState::new([("theta", 0.25), ("w", -0.5)]).unwrap();
        let rate = x.with_values(vec![1.0, 2.0]).unwrap();
        let constant = |_: &NamedState, _: &()| -> ModelResult { Ok(rate.clone()) };
        for method in crate::solvers::RungeKuttaMethods::ALL {
            let tableau = method.tableau();
            let y = RungeKutta::new(&tableau)
                .step(&constant, &x, &(), 0.5)
                .unwrap();
            assert_abs_diff_eq!(y.get("theta").unwrap(), 0.75, epsilon = 1e-14);
            assert_abs_diff_eq!(y.get("w").unwrap(), 0.5, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_convergence_matches_documented_order() {
        // halving the step divides the error by 2^order
        for method in crate::solvers::RungeKuttaMethods::ALL {
            let tableau = method.tableau();
            let observed = (oscillator_error(&tableau, 20) / oscillator_error(&tableau, 40)).log2();
            let documented = tableau.order().unwrap() as f64;
            assert!(
                (observed - documented).abs() < 0.2,
                "{method}: observed order {observed:.2}, documented {documented}"
            );
        }
    }

    #[test]
    fn test_zero_derivative_is_no_op() {
        let mut rng = SmallRng::seed_from_u64(7);
        let x = NamedState::new([("theta", -1.5), ("w", 0.6)]).unwrap();
        for method in crate::solvers::RungeKuttaMethods::ALL {
            let tableau = method.tableau();
            let h = rng.random_range(-100.0..100.0);
            let y = RungeKutta::new(&tableau)
                .step(&zero, &x, &(), h)
                .unwrap();
            assert_eq!(y, x);
        }
    }

    #[test]
    fn test_stages_see_only_earlier_stages() {
        // y' = 1 evaluated at the stage argument records the order of calls
        let calls = std::cell::RefCell::new(Vec::new());
        let record = |x: &NamedState, _: &()| -> ModelResult {
            calls
                .borrow_mut()
                .push(x.get("x")?);
            Ok(x.with_values(vec![1.0])?)
        };
        let tableau = ButcherTableau::rk4();
        let x0 = NamedState::new([("x", 0.0)]).unwrap();
        RungeKutta::new(&tableau)
            .step(&record, &x0, &(), 1.0)
            .unwrap();
        assert_eq!(*calls.borrow(), vec![0.0, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_model_errors_propagate() {
        let tableau = ButcherTableau::heun();
        let x0 = NamedState::new([("theta", 0.0), ("w", 0.0)]).unwrap();
        let solver = RungeKutta::new(&tableau);

        let missing_field = |x: &NamedState, _: &()| -> ModelResult {
            let omega = x.get("omega")?;
            Ok(x.with_values(vec![omega, 0.0])?)
        };
        assert!(matches!(
            solver.step(&missing_field, &x0, &(), 0.1),
            Err(DiffeqErrors::KeyNotFound(name)) if name == "omega"
        ));

        let failing = |_: &NamedState, _: &()| -> ModelResult { Err("model blew up".into()) };
        match solver.step(&failing, &x0, &(), 0.1) {
            Err(DiffeqErrors::Derivative(e)) => assert_eq!(e.to_string(), "model blew up"),
            other => panic!("expected derivative error, got {other:?}"),
        }
    }

    #[test]
    fn test_derivative_with_other_names_is_rejected() {
        let tableau = ButcherTableau::euler();
        let x0 = NamedState::new([("theta", 0.0), ("w", 0.0)]).unwrap();
        let renamed = |x: &NamedState, _: &()| -> ModelResult {
            Ok(NamedState::new([("dtheta", x.get("w")?), ("dw", 0.0)])?)
        };
        assert!(matches!(
            RungeKutta::new(&tableau).step(&renamed, &x0, &(), 0.1),
            Err(DiffeqErrors::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_solve_fixed_history() {
        let tableau = ButcherTableau::rk4();
        let x0 = NamedState::new([("x", 1.0)]).unwrap();
        let solver = RungeKutta::new(&tableau);
        let history = solver
            .solve_fixed(&decay, &x0, &(), 0.1, 10, None)
            .unwrap();

        assert_eq!(history.len(), 11);
        assert_eq!(history[0], x0);
        for i in 1..history.len() {
            let expected = solver
                .step(&decay, &history[i - 1], &(), 0.1)
                .unwrap();
            assert_eq!(history[i], expected);
            assert_eq!(history[i].names(), x0.names());
        }
        assert_abs_diff_eq!(history[10].get("x").unwrap(), (-1.0f64).exp(), epsilon = 1e-5);
    }

    #[test]
    fn test_solve_fixed_advances_progress() {
        let tableau = ButcherTableau::rk4();
        let x0 = NamedState::new([("x", 1.0)]).unwrap();
        let bar = ProgressBar::hidden();
        RungeKutta::new(&tableau)
            .solve_fixed(&decay, &x0, &(), 0.1, 10, Some(&bar))
            .unwrap();
        assert_eq!(bar.position(), 10);
        assert!(bar.is_finished());
    }

    #[test]
    fn test_history_capacity_is_bounded() {
        assert_eq!(history_capacity(0), 1);
        assert_eq!(history_capacity(2000), 2001);
        assert_eq!(history_capacity(usize::MAX), MAX_PREALLOCATED_STEPS + 1);
    }

    #[test]
    fn test_solve_fixed_rejects_non_finite_step() {
        let tableau = ButcherTableau::rk4();
        let x0 = NamedState::new([("x", 1.0)]).unwrap();
        let result = RungeKutta::new(&tableau).solve_fixed(&decay, &x0, &(), f64::NAN, 3, None);
        assert!(matches!(result, Err(DiffeqErrors::InvalidArgument(_))));
    }

    #[test]
    fn test_solve_fixed_discards_partial_history() {
        let tableau = ButcherTableau::euler();
        let x0 = NamedState::new([("x", 0.0)]).unwrap();
        let calls = std::cell::Cell::new(0);
        let fails_later = |x: &NamedState, _: &()| -> ModelResult {
            calls.set(calls.get() + 1);
            if calls.get() > 3 {
                return Err("fourth call fails".into());
            }
            Ok(x.with_values(vec![1.0])?)
        };
        let result = RungeKutta::new(&tableau).solve_fixed(&fails_later, &x0, &(), 1.0, 10, None);
        assert!(matches!(result, Err(DiffeqErrors::Derivative(_))));
        assert_eq!(calls.get(), 4);
    }
}
