use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty role predicates, blank names, etc.).
    ConfigValidation(String),
    /// A required column role could not be located in a table's header.
    MissingColumn {
        table: String,
        role: String,
        candidates: Vec<String>,
    },
    /// More than one column is an exact match for the same role.
    AmbiguousColumn {
        table: String,
        role: String,
        columns: Vec<String>,
    },
    /// Pre-aggregated source with a column count outside the supported shapes.
    UnexpectedShape { table: String, columns: usize },
    /// A quantity sum for `key` left the `i64` range.
    QuantityOverflow { key: String },
    /// IO / loader error (file read, malformed CSV, etc.).
    Io(String),
}

impl ReconError {
    /// Structural problems with an input table. These abort the run.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::AmbiguousColumn { .. } | Self::UnexpectedShape { .. }
        )
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { table, role, candidates } => {
                write!(
                    f,
                    "{table}: no column found for role '{role}' (looked for: {})",
                    candidates.join(", ")
                )
            }
            Self::AmbiguousColumn { table, role, columns } => {
                write!(
                    f,
                    "{table}: role '{role}' is ambiguous, matched columns {}",
                    columns
                        .iter()
                        .map(|c| format!("'{c}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            Self::UnexpectedShape { table, columns } => {
                write!(
                    f,
                    "{table}: pre-aggregated source has {columns} column(s), expected 3 \
                     (key, internal, external) or 4 (key, internal, external, variance)"
                )
            }
            Self::QuantityOverflow { key } => {
                write!(f, "{key}: quantity total is out of range")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
