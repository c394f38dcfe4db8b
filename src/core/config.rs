use std::collections::BTreeSet;

use super::error::{ColumnRole, ConfigError};
use super::schema::SchemaRegistry;
use super::types::{Dataset, Mode};

pub const MIN_YEAR: i64 = 2013;
pub const MAX_YEAR: i64 = 2023;
pub const MAX_SEED: i64 = 999_999_999;
pub const MAX_SIZE: i64 = 100_000;

/// Year the noise mean is anchored to.
pub const BASE_YEAR: i32 = 2009;
pub const ANNUAL_DRIFT: f64 = 0.03;
pub const NORM_STD_DEV: f64 = 0.25;

/// Availability tag of the source file in the variable registry.
pub const PUF_SOURCE: &str = "taxdata_puf";

const RANDOMIZE_DROP: &[&str] = &[
    "filer",
    "s006",
    "cmbtp",
    "nu05",
    "nu13",
    "elderly_dependent",
    "e09700",
    "e09800",
    "e09900",
    "e11200",
];

const PASS_THROUGH_DROP: &[&str] = &["filer"];

const PASS_THROUGH_SKIP: &[&str] = &[];

const RANDOMIZE_SKIP: &[&str] = &[
    "RECID",
    "MARS",
    "DSI",
    "MIDR",
    "FLPDYR",
    "age_head",
    "age_spouse",
    "XTOT",
    "EIC",
    "n24",
    "f2441",
    "f6251",
];

/// A linear accounting identity restored after randomization.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// `total = part_a + part_b`
    Sum {
        total: String,
        part_a: String,
        part_b: String,
    },
    /// `column = max(column, floor)`
    AtLeast { column: String, floor: String },
}

impl Constraint {
    pub fn sum(total: &str, part_a: &str, part_b: &str) -> Self {
        Constraint::Sum {
            total: total.to_string(),
            part_a: part_a.to_string(),
            part_b: part_b.to_string(),
        }
    }

    pub fn at_least(column: &str, floor: &str) -> Self {
        Constraint::AtLeast {
            column: column.to_string(),
            floor: floor.to_string(),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            Constraint::Sum {
                total,
                part_a,
                part_b,
            } => vec![total.as_str(), part_a.as_str(), part_b.as_str()],
            Constraint::AtLeast { column, floor } => vec![column.as_str(), floor.as_str()],
        }
    }
}

fn default_constraints() -> Vec<Constraint> {
    vec![
        Constraint::sum("e00200", "e00200p", "e00200s"),
        Constraint::sum("e00900", "e00900p", "e00900s"),
        Constraint::sum("e02100", "e02100p", "e02100s"),
        Constraint::at_least("e00600", "e00650"),
        Constraint::at_least("e01500", "e01700"),
    ]
}

/// Immutable generator configuration, built once and passed to every stage.
/// Which stages run is decided by the run's [`Mode`], not by this value.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorConfig {
    pub drop_columns: BTreeSet<String>,
    pub skip_columns: BTreeSet<String>,
    pub constraints: Vec<Constraint>,
    pub id_column: String,
    pub year_column: String,
    pub annual_drift: f64,
    pub noise_std_dev: f64,
}

impl GeneratorConfig {
    pub fn for_mode(mode: Mode) -> Self {
        let (drop, skip, constraints): (&[&str], &[&str], _) = match mode {
            Mode::Randomize => (RANDOMIZE_DROP, RANDOMIZE_SKIP, default_constraints()),
            Mode::PassThrough => (PASS_THROUGH_DROP, PASS_THROUGH_SKIP, Vec::new()),
        };
        Self {
            drop_columns: drop.iter().map(|s| s.to_string()).collect(),
            skip_columns: skip.iter().map(|s| s.to_string()).collect(),
            constraints,
            id_column: "RECID".to_string(),
            year_column: "FLPDYR".to_string(),
            annual_drift: ANNUAL_DRIFT,
            noise_std_dev: NORM_STD_DEV,
        }
    }

    /// Mean of the multiplicative noise factor for `tax_year`.
    pub fn noise_mean(&self, tax_year: i32) -> f64 {
        1.0 + self.annual_drift * f64::from(tax_year - BASE_YEAR)
    }

    /// Checks every configured name against the registry.
    pub fn validate(&self, registry: &SchemaRegistry) -> Result<(), ConfigError> {
        for name in &self.drop_columns {
            if !registry.is_usable(name) {
                return Err(ConfigError::AlreadyDropped(name.clone()));
            }
        }
        let named = self
            .skip_columns
            .iter()
            .map(|n| (ColumnRole::Skip, n.as_str()))
            .chain(
                self.constraints
                    .iter()
                    .flat_map(|c| c.columns())
                    .map(|n| (ColumnRole::Constraint, n)),
            )
            .chain([
                (ColumnRole::Identifier, self.id_column.as_str()),
                (ColumnRole::Year, self.year_column.as_str()),
            ]);
        for (role, name) in named {
            if !registry.is_usable(name) {
                return Err(ConfigError::UnknownColumn {
                    role,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Checks that every column the pipeline must read or remove is present.
    /// Skip entries are exempt: a protected column absent from the data has
    /// nothing to protect.
    pub fn validate_against(&self, dataset: &Dataset) -> Result<(), ConfigError> {
        let required = self
            .drop_columns
            .iter()
            .map(|n| (ColumnRole::Drop, n.as_str()))
            .chain(
                self.constraints
                    .iter()
                    .flat_map(|c| c.columns())
                    .map(|n| (ColumnRole::Constraint, n)),
            )
            .chain([(ColumnRole::Identifier, self.id_column.as_str())]);
        for (role, name) in required {
            if !dataset.contains(name) {
                return Err(ConfigError::MissingColumn {
                    role,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}
