//! Named state vectors.
//!
//! A `NamedState` is an ordered set of `f64` values addressed by field name. Every
//! state derived from another one (arithmetic results, derivatives built with
//! `with_values`) shares the same layout, so shape checks between states of one
//! integration are usually a pointer comparison.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    ops::{Mul, MulAssign},
    sync::Arc,
};

use crate::DiffeqErrors;

/// Field names in order, plus the name -> position lookup table.
#[derive(Debug, PartialEq)]
struct StateLayout {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

/// An ordered, named tuple of `f64` values.
#[derive(Clone, Debug)]
pub struct NamedState {
    layout: Arc<StateLayout>,
    values: Vec<f64>,
}

impl NamedState {
    /// Constructs a new `NamedState` from ordered `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a name is empty or appears more than once.
    pub fn new<I, S>(pairs: I) -> Result<Self, DiffeqErrors>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<f64>) = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        Self::from_parts(names, values)
    }

    /// Constructs a new `NamedState` from separate name and value lists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the lists differ in length, or if a name is
    /// empty or repeated.
    pub fn from_parts(names: Vec<String>, values: Vec<f64>) -> Result<Self, DiffeqErrors> {
        if names.len() != values.len() {
            return Err(DiffeqErrors::InvalidArgument(format!(
                "state has {} names but {} values",
                names.len(),
                values.len()
            )));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(DiffeqErrors::InvalidArgument(
                    "state field names must not be empty".to_string(),
                ));
            }
            if index.insert(name.clone(), i).is_some() {
                return Err(DiffeqErrors::InvalidArgument(format!(
                    "state field '{name}' is declared more than once"
                )));
            }
        }

        Ok(Self {
            layout: Arc::new(StateLayout { names, index }),
            values,
        })
    }

    /// Returns a state with the same names as `self` holding `values`.
    ///
    /// This is the usual way for a derivative function to build its output.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self, DiffeqErrors> {
        if values.len() != self.len() {
            return Err(DiffeqErrors::InvalidArgument(format!(
                "state has {} fields but {} values were given",
                self.len(),
                values.len()
            )));
        }
        Ok(Self {
            layout: Arc::clone(&self.layout),
            values,
        })
    }

    /// Returns a state with the same names as `self` and every value set to zero.
    pub fn zeros_like(&self) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            values: vec![0.0; self.len()],
        }
    }

    pub fn get(&self, name: &str) -> Result<f64, DiffeqErrors> {
        self.position(name)
            .map(|i| self.values[i])
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<(), DiffeqErrors> {
        let i = self.position(name)?;
        self.values[i] = value;
        Ok(())
    }

    pub fn get_index(&self, i: usize) -> Result<f64, DiffeqErrors> {
        self.values
            .get(i)
            .copied()
            .ok_or(DiffeqErrors::IndexOutOfBounds {
                index: i,
                len: self.len(),
            })
    }

    pub fn set_index(&mut self, i: usize, value: f64) -> Result<(), DiffeqErrors> {
        let len = self.len();
        let slot = self
            .values
            .get_mut(i)
            .ok_or(DiffeqErrors::IndexOutOfBounds { index: i, len })?;
        *slot = value;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layout
            .index
            .contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.layout.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.layout
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// True if both states declare the same names in the same order.
    pub fn same_shape(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.layout, &other.layout) || self.layout.names == other.layout.names
    }

    /// True if every value is finite (no `inf` or `nan`).
    pub fn is_finite(&self) -> bool {
        self.values
            .iter()
            .all(|v| v.is_finite())
    }

    /// Componentwise sum of two states with identical names.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the name sets or their order differ.
    pub fn add(&self, other: &Self) -> Result<Self, DiffeqErrors> {
        self.check_shape(other)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self {
            layout: Arc::clone(&self.layout),
            values,
        })
    }

    /// Multiplies every value by `k`, returning a new state.
    pub fn scale(&self, k: f64) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            values: self
                .values
                .iter()
                .map(|v| v * k)
                .collect(),
        }
    }

    /// In place `self += k * other`.
    ///
    /// The product is rounded before the sum, so this gives the same bits as
    /// `self.add(&other.scale(k))` without the intermediate allocation.
    pub fn add_scaled(&mut self, other: &Self, k: f64) -> Result<(), DiffeqErrors> {
        self.check_shape(other)?;
        for (a, b) in self
            .values
            .iter_mut()
            .zip(&other.values)
        {
            *a += b * k;
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize, DiffeqErrors> {
        self.layout
            .index
            .get(name)
            .copied()
            .ok_or_else(|| DiffeqErrors::KeyNotFound(name.to_string()))
    }

    fn check_shape(&self, other: &Self) -> Result<(), DiffeqErrors> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(DiffeqErrors::ShapeMismatch {
                left: self.layout.names.clone(),
                right: other.layout.names.clone(),
            })
        }
    }
}

impl PartialEq for NamedState {
    fn eq(&self, other: &Self) -> bool {
        self.same_shape(other) && self.values == other.values
    }
}

impl MulAssign<f64> for NamedState {
    fn mul_assign(&mut self, rhs: f64) {
        for v in &mut self.values {
            *v *= rhs;
        }
    }
}

impl Mul<f64> for &NamedState {
    type Output = NamedState;

    fn mul(self, rhs: f64) -> NamedState {
        self.scale(rhs)
    }
}

impl Mul<f64> for NamedState {
    type Output = NamedState;

    fn mul(mut self, rhs: f64) -> NamedState {
        self *= rhs;
        self
    }
}

impl Display for NamedState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}
