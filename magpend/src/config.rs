//! Everything needed to reproduce one pendulum run, stored as RON.

use std::{fs, path::Path};

use magpend_diffeq::{
    OdeProblem, make_state, saving::History, solvers::RungeKuttaMethods, state::NamedState,
};
use magpend_params::Params;
use ron::ser::{PrettyConfig, to_string_pretty};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    ConfigErrors,
    model::{MagneticPendulum, PendulumParams},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub method: RungeKuttaMethods,
    pub step_size: f64,
    pub steps: usize,
    /// Field names and starting values, in state order.
    pub initial_state: Vec<(String, f64)>,
    pub params: Params,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            method: RungeKuttaMethods::DormandPrince5,
            step_size: 0.01,
            steps: 2000,
            initial_state: vec![("theta".to_string(), -1.5), ("w".to_string(), 0.6)],
            params: PendulumParams::default().to_params(),
        }
    }
}

impl SimConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigErrors> {
        Ok(ron::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigErrors> {
        Ok(to_string_pretty(self, PrettyConfig::new())?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigErrors> {
        let ron_string = self.to_ron_string()?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn x0(&self) -> Result<NamedState, ConfigErrors> {
        Ok(make_state(
            self.initial_state
                .iter()
                .map(|(name, value)| (name.as_str(), *value)),
        )?)
    }

    pub fn pendulum_params(&self) -> Result<PendulumParams, ConfigErrors> {
        Ok(PendulumParams::try_from(&self.params)?)
    }

    /// Integrates the magnetic pendulum with the configured method.
    pub fn run(&self, show_progress: bool) -> Result<History, ConfigErrors> {
        let x0 = self.x0()?;
        let tableau = self.method.tableau();
        debug!(
            method = %self.method,
            stages = tableau.stages(),
            "selected tableau"
        );

        let mut problem = OdeProblem::new(MagneticPendulum, self.pendulum_params()?);
        if show_progress {
            problem = problem.with_progress();
        }
        let history = problem.solve_fixed(&tableau, &x0, self.step_size, self.steps)?;
        info!(states = history.len(), "simulation complete");
        Ok(history)
    }
}
