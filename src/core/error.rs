use thiserror::Error;

/// Which configured set a column name came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    Drop,
    Skip,
    Constraint,
    Identifier,
    Year,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ColumnRole::Drop => "drop",
            ColumnRole::Skip => "skip",
            ColumnRole::Constraint => "constraint",
            ColumnRole::Identifier => "identifier",
            ColumnRole::Year => "year",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("variable {0} already dropped")]
    AlreadyDropped(String),

    #[error("{role} variable {name} is not a recognized input variable")]
    UnknownColumn { role: ColumnRole, name: String },

    #[error("{role} variable {name} is not present in the dataset")]
    MissingColumn { role: ColumnRole, name: String },

    #[error("invalid schema registry: {0}")]
    Registry(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("duplicate column {0} in header")]
    DuplicateColumn(String),

    #[error("row {row} has {found} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("non-numeric value {value:?} in column {column} at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column {column} has {found} values, dataset has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("numeric overflow in column {column} at row {row}")]
    Overflow { column: String, row: usize },

    #[error("sample size {requested} out of range [1,{available}]")]
    SampleSizeOutOfRange { requested: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
