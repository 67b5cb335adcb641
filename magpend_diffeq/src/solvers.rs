use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{DiffeqErrors, tableau::ButcherTableau};

/// Enum representing the named explicit Runge-Kutta methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RungeKuttaMethods {
    /// Forward Euler, first order.
    Euler,
    /// Explicit midpoint, second order.
    Midpoint,
    /// Heun's method, second order.
    Heun,
    /// Ralston's method, second order.
    Ralston,
    /// Kutta's third order method.
    Kutta3,
    /// Classical Runge-Kutta 4th-order method.
    Rk4,
    /// Kutta's 3/8 rule, fourth order.
    Rk38,
    /// Dormand-Prince 5(4), fixed step with the fifth order weights.
    #[default]
    DormandPrince5,
}

impl RungeKuttaMethods {
    pub const ALL: [Self; 8] = [
        Self::Euler,
        Self::Midpoint,
        Self::Heun,
        Self::Ralston,
        Self::Kutta3,
        Self::Rk4,
        Self::Rk38,
        Self::DormandPrince5,
    ];

    pub fn tableau(&self) -> ButcherTableau {
        match self {
            Self::Euler => ButcherTableau::euler(),
            Self::Midpoint => ButcherTableau::midpoint(),
            Self::Heun => ButcherTableau::heun(),
            Self::Ralston => ButcherTableau::ralston(),
            Self::Kutta3 => ButcherTableau::kutta3(),
            Self::Rk4 => ButcherTableau::rk4(),
            Self::Rk38 => ButcherTableau::rk38(),
            Self::DormandPrince5 => ButcherTableau::dormand_prince5(),
        }
    }

    /// Short name used on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Euler => "euler",
            Self::Midpoint => "midpoint",
            Self::Heun => "heun",
            Self::Ralston => "ralston",
            Self::Kutta3 => "kutta3",
            Self::Rk4 => "rk4",
            Self::Rk38 => "rk38",
            Self::DormandPrince5 => "dopri5",
        }
    }
}

impl Display for RungeKuttaMethods {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for RungeKuttaMethods {
    type Err = DiffeqErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|method| method.key() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL
                    .iter()
                    .map(|m| m.key())
                    .collect();
                DiffeqErrors::InvalidArgument(format!(
                    "unknown method '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}
