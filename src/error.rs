//! Errors reported while setting up a search.
//!
//! Problems discovered while the search is running are not errors: they are logged and the
//! affected candidate is skipped.

/// Everything that can go wrong while building a table, a target or a search.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No column with this name exists in the table.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    /// A column was added whose length differs from the rest of the table.
    #[error("column `{name}` has {found} rows, expected {expected}")]
    ColumnLength {
        /// Name of the offending column.
        name: String,
        /// Row count of the table so far.
        expected: usize,
        /// Row count of the column.
        found: usize,
    },

    /// A column has the wrong type for the role it was given.
    #[error("column `{name}` is {found}, expected {expected}")]
    ColumnType {
        /// Name of the offending column.
        name: String,
        /// Type the role requires.
        expected: &'static str,
        /// Actual type of the column.
        found: &'static str,
    },

    /// A search parameter is outside its legal range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The quality measure cannot score the selected target kind.
    #[error("quality measure {measure} cannot be used with a {target} target")]
    IncompatibleMeasure {
        /// Name of the measure.
        measure: &'static str,
        /// Name of the target kind.
        target: &'static str,
    },

    /// A configuration name did not match any known option.
    #[error("unknown {kind} `{name}`")]
    UnknownName {
        /// What kind of option was being parsed.
        kind: &'static str,
        /// The text that failed to parse.
        name: String,
    },

    /// The target concept selects no positive rows, or selects every row.
    #[error("target `{0}` does not split the data")]
    EmptyTarget(String),

    /// A randomization procedure could not draw an acceptable sample.
    #[error("gave up after {attempts} attempts to draw an acceptable random {what}")]
    ValidationExhausted {
        /// What was being sampled.
        what: &'static str,
        /// How many draws were rejected.
        attempts: usize,
    },

    /// Malformed input data.
    #[error("line {line}: {message}")]
    Parse {
        /// One-based line number of the problem.
        line: u64,
        /// Description of the problem.
        message: String,
    },

    /// I/O failure while reading input data.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidParameter(message.into())
    }

    pub(crate) fn unknown_name(kind: &'static str, name: &str) -> Self {
        Error::UnknownName {
            kind,
            name: name.to_owned(),
        }
    }
}
