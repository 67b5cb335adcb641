use tracing::warn;

use crate::DiffeqErrors;

/// Coefficients of an explicit Runge-Kutta method.
///
/// `a` is stored as a full `s x s` matrix but only entries below the diagonal
/// may be nonzero. The named methods below are built from const arrays and are
/// checked by the tests in this module.
#[derive(Clone, Debug, PartialEq)]
pub struct ButcherTableau {
    name: String,
    order: Option<usize>,
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl ButcherTableau {
    /// Builds a tableau from a full `s x s` coupling matrix, weights and abscissas.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTableau` if the dimensions disagree, a coefficient is not
    /// finite, or any entry on or above the diagonal of `a` is nonzero.
    pub fn new(a: Vec<Vec<f64>>, b: Vec<f64>, c: Vec<f64>) -> Result<Self, DiffeqErrors> {
        let tableau = Self {
            name: "custom".to_string(),
            order: None,
            a,
            b,
            c,
        };
        tableau.validate()?;
        if !tableau.is_consistent(1e-12) {
            warn!(
                "butcher tableau is not consistent (weights do not sum to 1 or rows of A do not sum to c)"
            );
        }
        Ok(tableau)
    }

    /// Builds a tableau from the strictly lower triangle only, row `i` holding
    /// `a[i][0..i]`. Missing entries are padded with zeros.
    pub fn from_lower_triangle(
        lower: Vec<Vec<f64>>,
        b: Vec<f64>,
        c: Vec<f64>,
    ) -> Result<Self, DiffeqErrors> {
        let s = c.len();
        let mut a = Vec::with_capacity(lower.len());
        for (i, row) in lower.into_iter().enumerate() {
            if row.len() > i {
                return Err(DiffeqErrors::InvalidTableau(format!(
                    "row {i} of the lower triangle has {} entries, at most {i} allowed",
                    row.len()
                )));
            }
            let mut full = row;
            full.resize(s, 0.0);
            a.push(full);
        }
        Self::new(a, b, c)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documented order of accuracy, if known.
    pub fn order(&self) -> Option<usize> {
        self.order
    }

    pub fn stages(&self) -> usize {
        self.c.len()
    }

    pub fn a(&self) -> &[Vec<f64>] {
        &self.a
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn c(&self) -> &[f64] {
        &self.c
    }

    /// True if the weights sum to one and each row of `a` sums to its abscissa,
    /// both within `tol`.
    pub fn is_consistent(&self, tol: f64) -> bool {
        let weights: f64 = self.b.iter().sum();
        if (weights - 1.0).abs() > tol {
            return false;
        }
        self.a
            .iter()
            .zip(&self.c)
            .all(|(row, ci)| (row.iter().sum::<f64>() - ci).abs() <= tol)
    }

    fn validate(&self) -> Result<(), DiffeqErrors> {
        let s = self.c.len();
        if s == 0 {
            return Err(DiffeqErrors::InvalidTableau(
                "tableau must have at least one stage".to_string(),
            ));
        }
        if self.b.len() != s {
            return Err(DiffeqErrors::InvalidTableau(format!(
                "b has {} entries but c has {s}",
                self.b.len()
            )));
        }
        if self.a.len() != s {
            return Err(DiffeqErrors::InvalidTableau(format!(
                "A has {} rows but c has {s} entries",
                self.a.len()
            )));
        }

        for (i, row) in self.a.iter().enumerate() {
            if row.len() != s {
                return Err(DiffeqErrors::InvalidTableau(format!(
                    "row {i} of A has {} entries, expected {s}",
                    row.len()
                )));
            }
            for (j, aij) in row.iter().enumerate() {
                if !aij.is_finite() {
                    return Err(DiffeqErrors::InvalidTableau(format!(
                        "A[{i}][{j}] is not finite"
                    )));
                }
                // explicit methods only
                if j >= i && *aij != 0.0 {
                    return Err(DiffeqErrors::InvalidTableau(format!(
                        "A[{i}][{j}] = {aij} is on or above the diagonal"
                    )));
                }
            }
        }

        for (name, coefficients) in [("b", &self.b), ("c", &self.c)] {
            if let Some(i) = coefficients
                .iter()
                .position(|v| !v.is_finite())
            {
                return Err(DiffeqErrors::InvalidTableau(format!(
                    "{name}[{i}] is not finite"
                )));
            }
        }
        Ok(())
    }

    fn from_arrays<const STAGES: usize>(
        name: &str,
        order: usize,
        a: [[f64; STAGES]; STAGES],
        b: [f64; STAGES],
        c: [f64; STAGES],
    ) -> Self {
        Self {
            name: name.to_string(),
            order: Some(order),
            a: a.iter().map(|row| row.to_vec()).collect(),
            b: b.to_vec(),
            c: c.to_vec(),
        }
    }

    pub fn euler() -> Self {
        Self::from_arrays("Euler", 1, [[0.]], [1.], [0.])
    }

    pub fn midpoint() -> Self {
        Self::from_arrays(
            "Midpoint",
            2,
            [[0., 0.], [1. / 2., 0.]],
            [0., 1.],
            [0., 1. / 2.],
        )
    }

    pub fn heun() -> Self {
        Self::from_arrays(
            "Heun",
            2,
            [[0., 0.], [1., 0.]],
            [1. / 2., 1. / 2.],
            [0., 1.],
        )
    }

    pub fn ralston() -> Self {
        Self::from_arrays(
            "Ralston",
            2,
            [[0., 0.], [2. / 3., 0.]],
            [1. / 4., 3. / 4.],
            [0., 2. / 3.],
        )
    }

    pub fn kutta3() -> Self {
        Self::from_arrays(
            "Kutta3",
            3,
            [[0., 0., 0.], [1. / 2., 0., 0.], [-1., 2., 0.]],
            [1. / 6., 2. / 3., 1. / 6.],
            [0., 1. / 2., 1.],
        )
    }

    /// Classic fourth order Runge-Kutta.
    pub fn rk4() -> Self {
        Self::from_arrays(
            "RK4",
            4,
            [
                [0., 0., 0., 0.],
                [1. / 2., 0., 0., 0.],
                [0., 1. / 2., 0., 0.],
                [0., 0., 1., 0.],
            ],
            [1. / 6., 1. / 3., 1. / 3., 1. / 6.],
            [0., 1.0 / 2.0, 1.0 / 2.0, 1.0],
        )
    }

    /// Kutta's 3/8 rule.
    pub fn rk38() -> Self {
        Self::from_arrays(
            "RK3/8",
            4,
            [
                [0., 0., 0., 0.],
                [1. / 3., 0., 0., 0.],
                [-1. / 3., 1., 0., 0.],
                [1., -1., 1., 0.],
            ],
            [1. / 8., 3. / 8., 3. / 8., 1. / 8.],
            [0., 1. / 3., 2. / 3., 1.],
        )
    }

    /// Dormand-Prince 5(4), advanced with the fifth order weights.
    ///
    /// The embedded fourth order weights are not kept since steps are never
    /// rejected.
    pub fn dormand_prince5() -> Self {
        Self::from_arrays(
            "DormandPrince5",
            5,
            [
                [0., 0., 0., 0., 0., 0., 0.],
                [1. / 5., 0., 0., 0., 0., 0., 0.],
                [3. / 40., 9. / 40., 0., 0., 0., 0., 0.],
                [44. / 45., -56. / 15., 32. / 9., 0., 0., 0., 0.],
                [
                    19372. / 6561.,
                    -25360. / 2187.,
                    64448. / 6561.,
                    -212. / 729.,
                    0.,
                    0.,
                    0.,
                ],
                [
                    9017. / 3168.,
                    -355. / 33.,
                    46732. / 5247.,
                    49. / 176.,
                    -5103. / 18656.,
                    0.,
                    0.,
                ],
                [
                    35. / 384.,
                    0.,
                    500. / 1113.,
                    125. / 192.,
                    -2187. / 6784.,
                    11. / 84.,
                    0.,
                ],
            ],
            [
                35. / 384.,
                0.,
                500. / 1113.,
                125. / 192.,
                -2187. / 6784.,
                11. / 84.,
                0.,
            ],
            [0., 1. / 5., 3. / 10., 4. / 5., 8. / 9., 1.0, 1.0],
        )
    }
}
