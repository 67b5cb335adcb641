use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

/// Submodules for core ODE system components.
pub mod rk;
pub mod saving;
pub mod solvers;
pub mod state;
pub mod tableau;

use rk::RungeKutta;
use saving::History;
use state::NamedState;
use tableau::ButcherTableau;

pub type ModelError = Box<dyn std::error::Error + Send + Sync>;
pub type ModelResult = Result<NamedState, ModelError>;

#[derive(Debug, Error)]
pub enum DiffeqErrors {
    #[error("derivative function failed: {0}")]
    Derivative(ModelError),
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("index {index} is out of bounds for a state with {len} fields")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid butcher tableau: {0}")]
    InvalidTableau(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("state has no field named '{0}'")]
    KeyNotFound(String),
    #[error("state fields {left:?} do not match {right:?}")]
    ShapeMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },
}

/// Trait for defining a dynamical system model that can be numerically integrated.
///
/// `f` returns the time derivative of `state` under `params`, using the same field
/// names as `state`. It must not keep state between calls: the stepper calls it
/// once per stage, in stage order. Closures with the matching signature
/// implement this trait.
pub trait OdeModel<Params: ?Sized> {
    fn f(&self, state: &NamedState, params: &Params) -> ModelResult;
}

impl<Params, F> OdeModel<Params> for F
where
    Params: ?Sized,
    F: Fn(&NamedState, &Params) -> ModelResult,
{
    fn f(&self, state: &NamedState, params: &Params) -> ModelResult {
        self(state, params)
    }
}

/// Container for an ODE problem: the model, the parameters it reads, and
/// whether runs should report progress.
pub struct OdeProblem<Model, Params> {
    model: Model,
    params: Params,
    show_progress: bool,
}

impl<Model, Params> OdeProblem<Model, Params>
where
    Model: OdeModel<Params>,
{
    pub fn new(model: Model, params: Params) -> Self {
        Self {
            model,
            params,
            show_progress: false,
        }
    }

    /// Shows a terminal progress bar while solving.
    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }

    /// Integrates `steps` fixed steps of size `dt` from `x0` with `tableau`.
    pub fn solve_fixed(
        &self,
        tableau: &ButcherTableau,
        x0: &NamedState,
        dt: f64,
        steps: usize,
    ) -> Result<History, DiffeqErrors> {
        let progress = if self.show_progress {
            Some(progress_bar(steps))
        } else {
            None
        };
        RungeKutta::new(tableau).solve_fixed(
            &self.model,
            x0,
            &self.params,
            dt,
            steps,
            progress.as_ref(),
        )
    }
}

fn progress_bar(steps: usize) -> ProgressBar {
    let bar = ProgressBar::new(steps as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} steps ({eta})",
    ) {
        bar.set_style(style);
    }
    bar
}

/// Builds a named state from ordered `(name, value)` pairs.
pub fn make_state<I, S>(pairs: I) -> Result<NamedState, DiffeqErrors>
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    NamedState::new(pairs)
}

/// Builds and validates an explicit Butcher tableau.
pub fn make_tableau(
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    c: Vec<f64>,
) -> Result<ButcherTableau, DiffeqErrors> {
    ButcherTableau::new(a, b, c)
}

/// Advances `state` by a single step of size `h`.
pub fn step<Params, Model>(
    tableau: &ButcherTableau,
    model: &Model,
    state: &NamedState,
    params: &Params,
    h: f64,
) -> Result<NamedState, DiffeqErrors>
where
    Params: ?Sized,
    Model: OdeModel<Params> + ?Sized,
{
    RungeKutta::new(tableau).step(model, state, params, h)
}

/// Runs `steps` fixed steps and returns every state, `initial_state` first.
pub fn integrate<Params, Model>(
    tableau: &ButcherTableau,
    model: &Model,
    initial_state: &NamedState,
    params: &Params,
    h: f64,
    steps: usize,
) -> Result<History, DiffeqErrors>
where
    Params: ?Sized,
    Model: OdeModel<Params> + ?Sized,
{
    RungeKutta::new(tableau).solve_fixed(model, initial_state, params, h, steps, None)
}
