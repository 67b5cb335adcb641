//! In-memory trajectory storage and CSV export.

use std::{
    fs::File,
    io::{BufWriter, Write},
    ops::Deref,
    path::Path,
};

use csv::Writer;

use crate::{DiffeqErrors, state::NamedState};

/// The states produced by a fixed-step run, index `i` at time `i * dt`.
#[derive(Clone, Debug, PartialEq)]
pub struct History {
    dt: f64,
    states: Vec<NamedState>,
}

impl History {
    /// Constructs an empty history with room for `n` states.
    pub fn with_capacity(dt: f64, n: usize) -> Self {
        Self {
            dt,
            states: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, state: NamedState) {
        self.states.push(state);
    }

    /// Step size the states were recorded with.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Time stamp of each recorded state, starting at zero.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.states.len()).map(|i| i as f64 * self.dt)
    }

    /// Field names of the recorded states, empty if nothing was recorded.
    pub fn names(&self) -> &[String] {
        self.states
            .first()
            .map(|x| x.names())
            .unwrap_or(&[])
    }

    /// All recorded values of one field.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, DiffeqErrors> {
        self.states
            .iter()
            .map(|x| x.get(name))
            .collect()
    }

    /// Writes a header of `t` plus the field names, then one row per state.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DiffeqErrors> {
        let mut writer = Writer::from_writer(writer);

        let mut headers = Vec::with_capacity(self.names().len() + 1);
        headers.push("t");
        headers.extend(
            self.names()
                .iter()
                .map(String::as_str),
        );
        writer.write_record(&headers)?;

        let mut record = Vec::with_capacity(headers.len());
        for (t, x) in self.times().zip(&self.states) {
            record.clear();
            record.push(t.to_string());
            record.extend(
                x.values()
                    .iter()
                    .map(f64::to_string),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the history as CSV to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), DiffeqErrors> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))
    }
}

impl Deref for History {
    type Target = [NamedState];

    fn deref(&self) -> &Self::Target {
        &self.states
    }
}

impl IntoIterator for History {
    type Item = NamedState;
    type IntoIter = std::vec::IntoIter<NamedState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.into_iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a NamedState;
    type IntoIter = std::slice::Iter<'a, NamedState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}
