//! Pendulum pulled by point magnets.
//!
//! The bob of a rigid pendulum of length `l` hangs from the origin with the y
//! axis pointing up, so at angle `theta` it sits at `(l sin theta, -l cos theta)`.
//! Each magnet at `(x, y)` with strength `k` pushes the bob with
//! `k * d / |d|^3`, `d` being the vector from the bob to the magnet. Only the
//! component along the swing direction enters the equations.

use std::f64::consts::PI;

use magpend_diffeq::{DiffeqErrors, ModelResult, OdeModel, state::NamedState};
use magpend_params::{ParamErrors, Params};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Magnet {
    pub x: f64,
    pub y: f64,
    /// Strength, positive values attract and negative values repel.
    pub k: f64,
}

impl Magnet {
    pub fn new(x: f64, y: f64, k: f64) -> Self {
        Self { x, y, k }
    }

    pub fn to_params(&self) -> Params {
        Params::new()
            .with("x", self.x)
            .with("y", self.y)
            .with("k", self.k)
    }
}

impl TryFrom<&Params> for Magnet {
    type Error = ParamErrors;

    fn try_from(p: &Params) -> Result<Self, Self::Error> {
        Ok(Self {
            x: p.number("x")?,
            y: p.number("y")?,
            k: p.number("k")?,
        })
    }
}

/// Physical constants of the pendulum, read once from a `Params` tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendulumParams {
    /// Bob mass. Only used for energy reporting, the equations are per unit mass.
    pub m: f64,
    /// Linear damping coefficient.
    pub b: f64,
    pub g: f64,
    /// Rod length.
    pub l: f64,
    pub magnets: Vec<Magnet>,
}

impl PendulumParams {
    pub fn to_params(&self) -> Params {
        Params::new()
            .with("m", self.m)
            .with("b", self.b)
            .with("g", self.g)
            .with("l", self.l)
            .with(
                "magnets",
                self.magnets
                    .iter()
                    .map(Magnet::to_params)
                    .collect::<Vec<_>>(),
            )
    }

    /// Cartesian position of the bob for a swing angle.
    pub fn bob_position(&self, theta: f64) -> (f64, f64) {
        (self.l * theta.sin(), -self.l * theta.cos())
    }

    /// Kinetic plus gravitational energy, zero at rest at the bottom. The
    /// magnetic potential is not included.
    pub fn energy(&self, state: &NamedState) -> Result<f64, DiffeqErrors> {
        let theta = state.get("theta")?;
        let w = state.get("w")?;
        let kinetic = 0.5 * self.m * self.l * self.l * w * w;
        let potential = self.m * self.g * self.l * (1.0 - theta.cos());
        Ok(kinetic + potential)
    }
}

impl Default for PendulumParams {
    fn default() -> Self {
        Self {
            m: 1.0,
            b: 0.5,
            g: 9.81,
            l: 5.0,
            magnets: vec![Magnet::new(-5.0, -4.0, -20.0), Magnet::new(-4.0, -5.0, -50.0)],
        }
    }
}

impl TryFrom<&Params> for PendulumParams {
    type Error = ParamErrors;

    fn try_from(p: &Params) -> Result<Self, Self::Error> {
        let magnets = if p.contains("magnets") {
            p.tables("magnets")?
                .into_iter()
                .map(Magnet::try_from)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(Self {
            m: p.number("m")?,
            b: p.number("b")?,
            g: p.number("g")?,
            l: p.number("l")?,
            magnets,
        })
    }
}

/// Maps an angle onto `[-pi, pi)`.
pub fn wrap_angle(theta: f64) -> f64 {
    (theta + PI).rem_euclid(2.0 * PI) - PI
}

/// Equations of motion for the state `{theta, w}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MagneticPendulum;

impl OdeModel<PendulumParams> for MagneticPendulum {
    fn f(&self, x: &NamedState, p: &PendulumParams) -> ModelResult {
        let theta = wrap_angle(x.get("theta")?);
        let w = x.get("w")?;

        let (bob_x, bob_y) = p.bob_position(theta);
        // unit vector along the swing
        let n = [-bob_y / p.l, bob_x / p.l];

        // A magnet exactly on the bob gives 0/0 here. The nan is passed on
        // rather than reported, the integrator keeps going with it.
        let mut magnetic = 0.0;
        for magnet in &p.magnets {
            let dx = magnet.x - bob_x;
            let dy = magnet.y - bob_y;
            let r = (dx * dx + dy * dy).sqrt();
            let r3 = r * r * r;
            let force = [magnet.k * dx / r3, magnet.k * dy / r3];
            magnetic += n[0] * force[0] + n[1] * force[1];
        }

        let dw = -p.g / p.l * theta.sin() - p.b * w + magnetic;

        let mut dx = x.zeros_like();
        dx.set("theta", w)?;
        dx.set("w", dw)?;
        Ok(dx)
    }
}
