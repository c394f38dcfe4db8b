use std::collections::BTreeMap;

use serde::Serialize;

use super::error::DataError;

/// Selects between the randomizing generator and the plumbing check.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Randomize,
    /// No randomization, no sampling. Output aggregates equal input aggregates.
    PassThrough,
}

/// Per-run parameters. Together with the input dataset and the configuration
/// these fully determine the output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RandomizationContext {
    pub tax_year: i32,
    pub seed: u64,
    pub sample_size: usize,
    pub mode: Mode,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Values::Int(v) => v.iter().map(|&x| x as f64).collect(),
            Values::Float(v) => v.clone(),
        }
    }

    pub fn sum(&self) -> f64 {
        match self {
            Values::Int(v) => v.iter().map(|&x| x as i128).sum::<i128>() as f64,
            Values::Float(v) => v.iter().sum(),
        }
    }

    fn take(&self, indices: &[usize]) -> Values {
        match self {
            Values::Int(v) => Values::Int(indices.iter().map(|&i| v[i]).collect()),
            Values::Float(v) => Values::Float(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Values,
}

/// In-memory column store. Column order is the source header order and is
/// the randomization order, so it is part of the output contract.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, DataError> {
        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DataError::DuplicateColumn(column.name.clone()));
            }
            if column.values.len() != rows {
                return Err(DataError::LengthMismatch {
                    column: column.name.clone(),
                    expected: rows,
                    found: column.values.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Values> {
        self.position(name).map(|i| &self.columns[i].values)
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    /// Removes `name`, returning whether it was present.
    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.columns.remove(i);
                true
            }
            None => false,
        }
    }

    /// Replaces the values of an existing column in place, or appends a new
    /// column at the end.
    pub fn set_column(&mut self, name: &str, values: Values) -> Result<(), DataError> {
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(DataError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows,
                found: values.len(),
            });
        }
        if self.columns.is_empty() {
            self.rows = values.len();
        }
        match self.position(name) {
            Some(i) => self.columns[i].values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Builds a new dataset from the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: c.values.take(indices),
            })
            .collect();
        Dataset {
            columns,
            rows: indices.len(),
        }
    }

    pub fn column_sums(&self) -> BTreeMap<String, f64> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.values.sum()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}
