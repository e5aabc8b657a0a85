//! Table and column specifications.
//!
//! Specs are plain data declared at runtime, either built fluently or
//! deserialized from configuration. The registry resolves them into
//! tables with relation maps on first use.

use indexmap::IndexMap;
use serde::Deserialize;

/// Column types, including the three relation kinds. Back-references and
/// many-to-many columns are virtual: they shape the relation graph but
/// have no storage of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "string:length")]
    StringWithLength,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "fk")]
    ForeignKey,
    #[serde(rename = "backref")]
    BackRef,
    #[serde(rename = "m2m")]
    ManyToMany,
}

impl ColumnType {
    /// Whether columns of this type exist in storage.
    pub fn is_stored(&self) -> bool {
        !matches!(self, ColumnType::BackRef | ColumnType::ManyToMany)
    }

    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            ColumnType::ForeignKey | ColumnType::BackRef | ColumnType::ManyToMany
        )
    }
}

/// A column specification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub index: bool,
    /// Target table for fk/backref/m2m columns.
    #[serde(default)]
    pub table: Option<String>,
}

impl ColumnSpec {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            nullable: false,
            unique: false,
            length: None,
            index: false,
            table: None,
        }
    }

    pub fn boolean() -> Self {
        Self::new(ColumnType::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(ColumnType::Integer)
    }

    pub fn double() -> Self {
        Self::new(ColumnType::Double)
    }

    pub fn string() -> Self {
        Self::new(ColumnType::String)
    }

    pub fn sized_string(length: u32) -> Self {
        let mut spec = Self::new(ColumnType::StringWithLength);
        spec.length = Some(length);
        spec
    }

    pub fn datetime() -> Self {
        Self::new(ColumnType::DateTime)
    }

    pub fn binary() -> Self {
        Self::new(ColumnType::Binary)
    }

    pub fn json() -> Self {
        Self::new(ColumnType::Json)
    }

    pub fn fk(table: impl Into<String>) -> Self {
        let mut spec = Self::new(ColumnType::ForeignKey);
        spec.table = Some(table.into());
        spec
    }

    pub fn backref(table: impl Into<String>) -> Self {
        let mut spec = Self::new(ColumnType::BackRef);
        spec.table = Some(table.into());
        spec
    }

    pub fn m2m(table: impl Into<String>) -> Self {
        let mut spec = Self::new(ColumnType::ManyToMany);
        spec.table = Some(table.into());
        spec
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }
}

/// A table specification: ordered columns, composite unique groups, and
/// an optional plural form for back-reference naming.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableSpec {
    #[serde(default)]
    pub columns: IndexMap<String, ColumnSpec>,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    #[serde(default)]
    pub plural: Option<String>,
}

impl TableSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.columns.insert(name.into(), spec);
        self
    }

    pub fn unique_together(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.unique
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }
}

/// A resolved table: a spec bound to its name and computed plural.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub plural: String,
    pub spec: TableSpec,
}

/// The implicit auto-increment primary key of every table.
pub const PK: &str = "pk";

impl Table {
    pub fn new(name: impl Into<String>, spec: TableSpec) -> Self {
        let name = name.into();
        let plural = spec
            .plural
            .clone()
            .unwrap_or_else(|| crate::util::plural(&name));
        Self { name, plural, spec }
    }

    /// Stored columns, in declaration order. Excludes the implicit pk.
    pub fn stored_columns(&self) -> impl Iterator<Item = (&String, &ColumnSpec)> {
        self.spec
            .columns
            .iter()
            .filter(|(_, spec)| spec.column_type.is_stored())
    }

    /// Look up a stored column.
    pub fn stored_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.spec
            .columns
            .get(name)
            .filter(|spec| spec.column_type.is_stored())
    }

    /// pk plus the stored column names, for error messages.
    pub fn available_columns(&self) -> Vec<String> {
        let mut columns = vec![PK.to_string()];
        columns.extend(self.stored_columns().map(|(name, _)| name.clone()));
        columns
    }

    /// Named unique constraints: single unique columns first, then the
    /// composite groups, all named `uq_<table>_<columns>`.
    pub fn unique_sets(&self) -> Vec<(String, Vec<String>)> {
        let mut sets = vec![];
        for (name, spec) in self.stored_columns() {
            if spec.unique {
                sets.push((
                    format!("uq_{}_{}", self.name, name),
                    vec![name.clone()],
                ));
            }
        }
        for group in &self.spec.unique {
            sets.push((
                format!("uq_{}_{}", self.name, group.join("_")),
                group.clone(),
            ));
        }
        sets
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table '{}'", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        let table = Table::new("a", TableSpec::new());
        assert_eq!(table.plural, "as");
        let table = Table::new("b", TableSpec::new().plural("bi"));
        assert_eq!(table.plural, "bi");
    }

    #[test]
    fn test_stored_columns() {
        let spec = TableSpec::new()
            .column("user", ColumnSpec::fk("user"))
            .column("content", ColumnSpec::string())
            .column("commentary", ColumnSpec::backref("comment"))
            .column("tagging", ColumnSpec::m2m("tag"));
        let table = Table::new("post", spec);
        let stored: Vec<&String> = table.stored_columns().map(|(name, _)| name).collect();
        assert_eq!(stored, ["user", "content"]);
        assert_eq!(table.available_columns(), ["pk", "user", "content"]);
    }

    #[test]
    fn test_unique_sets() {
        let spec = TableSpec::new()
            .column("s", ColumnSpec::sized_string(255).unique())
            .column("n1", ColumnSpec::integer())
            .column("n2", ColumnSpec::integer())
            .unique_together(["n1", "n2"]);
        let table = Table::new("u", spec);
        assert_eq!(
            table.unique_sets(),
            vec![
                ("uq_u_s".to_string(), vec!["s".to_string()]),
                (
                    "uq_u_n1_n2".to_string(),
                    vec!["n1".to_string(), "n2".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn test_spec_from_config() {
        let spec: TableSpec = serde_json::from_value(serde_json::json!({
            "columns": {
                "s": {"type": "string:length", "unique": true, "length": 255},
                "n": {"type": "integer", "nullable": true},
            },
        }))
        .unwrap();
        assert_eq!(spec.columns["s"].column_type, ColumnType::StringWithLength);
        assert_eq!(spec.columns["s"].length, Some(255));
        assert!(spec.columns["n"].nullable);
    }
}
