//! OVSDB wire data model (RFC 7047 §5).
//!
//! Only the subset needed to issue single-table transactions is modelled:
//! atoms and datums, `where` conditions, mutations, the five row-level
//! operations and their per-operation results. Everything here serializes to
//! exactly the JSON shape `ovsdb-server` expects.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use uuid::Uuid;

/// Server-assigned row identity (`_uuid` column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowUuid(Uuid);

impl RowUuid {
    /// The all-zero identity. It is a valid UUID that matches no row.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Fresh random (v4) identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RowUuid {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for RowUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RowUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Serialize for RowUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ("uuid", self.to_string()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RowUuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, text) = <(String, String)>::deserialize(deserializer)?;
        if tag != "uuid" {
            return Err(D::Error::custom(format!("expected uuid atom, found {tag:?}")));
        }
        text.parse().map_err(D::Error::custom)
    }
}

/// An OVSDB datum: a scalar atom, a set of atoms or a map.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    Uuid(RowUuid),
    /// Reference to a row inserted earlier in the same transaction.
    NamedUuid(String),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_uuid(&self) -> Option<RowUuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Encode into the RFC 7047 JSON notation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(v) => json!(v),
            Value::Real(v) => json!(v),
            Value::Boolean(v) => json!(v),
            Value::String(v) => json!(v),
            Value::Uuid(id) => json!(["uuid", id.to_string()]),
            Value::NamedUuid(name) => json!(["named-uuid", name]),
            Value::Set(items) => {
                let items: Vec<_> = items.iter().map(Value::to_json).collect();
                json!(["set", items])
            }
            Value::Map(pairs) => {
                let pairs: Vec<_> = pairs
                    .iter()
                    .map(|(k, v)| json!([k.to_json(), v.to_json()]))
                    .collect();
                json!(["map", pairs])
            }
        }
    }

    /// Decode from the RFC 7047 JSON notation.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, String> {
        match json {
            serde_json::Value::Bool(v) => Ok(Value::Boolean(*v)),
            serde_json::Value::String(v) => Ok(Value::String(v.clone())),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Ok(Value::Integer(v)),
                None => n
                    .as_f64()
                    .map(Value::Real)
                    .ok_or_else(|| format!("unrepresentable number {n}")),
            },
            serde_json::Value::Array(items) => decode_tagged(items),
            other => Err(format!("unsupported datum {other}")),
        }
    }
}

fn decode_tagged(items: &[serde_json::Value]) -> Result<Value, String> {
    let [tag, body] = items else {
        return Err(format!("tagged datum must have 2 elements, found {}", items.len()));
    };
    let tag = tag.as_str().ok_or("datum tag must be a string")?;
    match tag {
        "uuid" => {
            let text = body.as_str().ok_or("uuid datum must be a string")?;
            text.parse()
                .map(Value::Uuid)
                .map_err(|err| format!("invalid uuid {text:?}: {err}"))
        }
        "named-uuid" => body
            .as_str()
            .map(|name| Value::NamedUuid(name.to_string()))
            .ok_or_else(|| "named-uuid datum must be a string".to_string()),
        "set" => {
            let members = body.as_array().ok_or("set datum must hold an array")?;
            members
                .iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Set)
        }
        "map" => {
            let pairs = body.as_array().ok_or("map datum must hold an array")?;
            let mut out = Vec::with_capacity(pairs.len());
            for pair in pairs {
                match pair.as_array().map(Vec::as_slice) {
                    Some([k, v]) => out.push((Value::from_json(k)?, Value::from_json(v)?)),
                    _ => return Err(format!("map entry must be a pair, found {pair}")),
                }
            }
            Ok(Value::Map(out))
        }
        other => Err(format!("unknown datum tag {other:?}")),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(&json).map_err(D::Error::custom)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Uuid(id) => write!(f, "{id}"),
            Value::NamedUuid(name) => write!(f, "@{name}"),
            Value::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<RowUuid> for Value {
    fn from(v: RowUuid) -> Self {
        Value::Uuid(v)
    }
}

/// Column name to datum.
pub type Row = BTreeMap<String, Value>;

/// Comparator used in a `where` condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "includes")]
    Includes,
    #[serde(rename = "excludes")]
    Excludes,
}

impl Function {
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Lt => "<",
            Function::Le => "<=",
            Function::Eq => "==",
            Function::Ne => "!=",
            Function::Ge => ">=",
            Function::Gt => ">",
            Function::Includes => "includes",
            Function::Excludes => "excludes",
        }
    }
}

/// `[column, function, value]` filter term.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub function: Function,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, function: Function, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            function,
            value: value.into(),
        }
    }

    /// Equality on a row identity column.
    pub fn uuid_eq(column: impl Into<String>, id: RowUuid) -> Self {
        Self::new(column, Function::Eq, id)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, self.function, &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (column, function, value) = <(String, Function, Value)>::deserialize(deserializer)?;
        Ok(Self {
            column,
            function,
            value,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.function.as_str(), self.value)
    }
}

/// Mutation operator applied in place by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutator {
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Sub,
    #[serde(rename = "*=")]
    Mul,
    #[serde(rename = "/=")]
    Div,
    #[serde(rename = "%=")]
    Rem,
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "delete")]
    Delete,
}

impl Mutator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutator::Add => "+=",
            Mutator::Sub => "-=",
            Mutator::Mul => "*=",
            Mutator::Div => "/=",
            Mutator::Rem => "%=",
            Mutator::Insert => "insert",
            Mutator::Delete => "delete",
        }
    }
}

/// `[column, mutator, value]` mutation term.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    pub column: String,
    pub mutator: Mutator,
    pub value: Value,
}

impl Mutation {
    pub fn new(column: impl Into<String>, mutator: Mutator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            mutator,
            value: value.into(),
        }
    }
}

impl Serialize for Mutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, self.mutator, &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Mutation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (column, mutator, value) = <(String, Mutator, Value)>::deserialize(deserializer)?;
        Ok(Self {
            column,
            mutator,
            value,
        })
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.mutator.as_str(), self.value)
    }
}

/// One row-level operation inside a `transact` request.
///
/// An empty `conditions` list matches every row. It is always serialized for
/// the filtered kinds because `ovsdb-server` rejects a missing `where`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Insert {
        table: String,
        row: Row,
        #[serde(rename = "uuid-name", default, skip_serializing_if = "Option::is_none")]
        uuid_name: Option<String>,
    },
    Select {
        table: String,
        #[serde(rename = "where", default)]
        conditions: Vec<Condition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
    Update {
        table: String,
        #[serde(rename = "where", default)]
        conditions: Vec<Condition>,
        row: Row,
    },
    Mutate {
        table: String,
        #[serde(rename = "where", default)]
        conditions: Vec<Condition>,
        mutations: Vec<Mutation>,
    },
    Delete {
        table: String,
        #[serde(rename = "where", default)]
        conditions: Vec<Condition>,
    },
}

impl Operation {
    /// Wire name of the operation (`"insert"`, `"select"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => "insert",
            Operation::Select { .. } => "select",
            Operation::Update { .. } => "update",
            Operation::Mutate { .. } => "mutate",
            Operation::Delete { .. } => "delete",
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Operation::Insert { table, .. }
            | Operation::Select { table, .. }
            | Operation::Update { table, .. }
            | Operation::Mutate { table, .. }
            | Operation::Delete { table, .. } => table,
        }
    }

    /// Filter terms; empty for inserts and for match-all operations.
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Operation::Insert { .. } => &[],
            Operation::Select { conditions, .. }
            | Operation::Update { conditions, .. }
            | Operation::Mutate { conditions, .. }
            | Operation::Delete { conditions, .. } => conditions,
        }
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &Row) -> fmt::Result {
    f.write_str("{")?;
    for (i, (column, value)) in row.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{column}={value}")?;
    }
    f.write_str("}")
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.table())?;
        match self {
            Operation::Insert { row, .. } => {
                f.write_str(" row ")?;
                write_row(f, row)
            }
            Operation::Select { conditions, .. } | Operation::Delete { conditions, .. } => {
                f.write_str(" where ")?;
                write_list(f, conditions)
            }
            Operation::Update {
                conditions, row, ..
            } => {
                f.write_str(" where ")?;
                write_list(f, conditions)?;
                f.write_str(" set ")?;
                write_row(f, row)
            }
            Operation::Mutate {
                conditions,
                mutations,
                ..
            } => {
                f.write_str(" where ")?;
                write_list(f, conditions)?;
                f.write_str(" mutate ")?;
                write_list(f, mutations)
            }
        }
    }
}

/// Per-operation outcome, positionally aligned with the request list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Rows affected by update/mutate/delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Identity assigned by an insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<RowUuid>,
    /// Rows returned by a select.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl OperationResult {
    pub fn error(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            details: Some(details.into()),
            ..Self::default()
        }
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: Some(rows),
            ..Self::default()
        }
    }

    pub fn with_count(count: u64) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    /// True when the server attached a non-empty error marker.
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn rows(&self) -> &[Row] {
        self.rows.as_deref().unwrap_or_default()
    }

    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    pub fn details_text(&self) -> &str {
        self.details.as_deref().unwrap_or_default()
    }
}

/// Decode a `transact` result array.
///
/// The server answers operations it never executed with `null`; those decode
/// to an empty, error-free result.
pub fn decode_results(json: serde_json::Value) -> Result<Vec<OperationResult>, serde_json::Error> {
    let items: Vec<Option<OperationResult>> = serde_json::from_value(json)?;
    Ok(items.into_iter().map(Option::unwrap_or_default).collect())
}
