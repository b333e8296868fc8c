//! Construction-time configuration for benchmark clients.

use std::fmt;
use std::str::FromStr;

use ovsdb_client::{Row, Value};

use crate::error::BenchError;

/// Database targeted when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "OVN_Southbound";
/// Table targeted when nothing else is configured.
pub const DEFAULT_TABLE: &str = "DHCP_Options";
/// OVSDB's implicit row identity column.
pub const UUID_COLUMN: &str = "_uuid";

/// The logical operation a client issues on every request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OpKind {
    Insert,
    #[default]
    Select,
    Update,
    Mutate,
    Delete,
}

impl OpKind {
    pub const ALL: [OpKind; 5] = [
        OpKind::Insert,
        OpKind::Select,
        OpKind::Update,
        OpKind::Mutate,
        OpKind::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Select => "select",
            OpKind::Update => "update",
            OpKind::Mutate => "mutate",
            OpKind::Delete => "delete",
        }
    }

    /// Whether the operation is scoped to a cached row identity.
    pub fn targets_row(&self) -> bool {
        !matches!(self, OpKind::Insert)
    }

    /// Parse an optional token, defaulting to `select` when absent.
    pub fn resolve(token: Option<&str>) -> Result<Self, BenchError> {
        token.map_or(Ok(OpKind::default()), |t| t.parse())
    }
}

impl FromStr for OpKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| BenchError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where requests go and what they write.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchTarget {
    pub database: String,
    pub table: String,
    /// Column holding the row identity used in filters.
    pub id_column: String,
    /// String column rewritten by `update`.
    pub update_column: String,
    /// Integer column incremented by `mutate`.
    pub mutate_column: String,
    /// Row written by `insert`.
    pub insert_row: Row,
}

impl Default for BenchTarget {
    fn default() -> Self {
        let insert_row = Row::from([
            ("name".to_string(), Value::from("name")),
            ("code".to_string(), Value::from(210)),
            ("type".to_string(), Value::from("str")),
        ]);
        Self {
            database: DEFAULT_DATABASE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            id_column: UUID_COLUMN.to_string(),
            update_column: "name".to_string(),
            mutate_column: "code".to_string(),
            insert_row,
        }
    }
}

/// Everything needed to build one [`crate::BenchmarkClient`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientConfig {
    pub op: OpKind,
    pub target: BenchTarget,
    /// RNG seed for row selection; 0 picks a random seed.
    pub seed: u64,
}

impl ClientConfig {
    pub fn new(op: OpKind) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }
}
