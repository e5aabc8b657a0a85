//! Schema registry: named table descriptors and the relation graph.
//!
//! Tables are declared before `create_tables` materializes them; the
//! relation graph (foreign keys, back-references, many-to-many links) is
//! resolved lazily on first access, which is when referential errors
//! surface.

mod relation;
mod table;

pub use relation::{link_table_name, LinkTable, Relation};
pub use table::{ColumnSpec, ColumnType, Table, TableSpec, PK};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::util::{and_, plural};

/// A dependent of a table, for cascade handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub table: String,
    pub column: String,
    pub nullable: bool,
    /// Link tables always cascade; they are not user tables.
    pub is_link: bool,
}

/// The set of declared tables for one database.
#[derive(Debug, Clone)]
pub struct Registry {
    dialect: Dialect,
    tables: IndexMap<String, Table>,
}

impl Registry {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: IndexMap::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Declare a table. Fails on duplicates and on invalid column specs.
    pub fn add_table(&mut self, name: &str, spec: TableSpec) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(Error::invalid(format!("table '{name}' already exists")));
        }
        self.validate_spec(name, &spec)?;
        self.tables.insert(name.to_string(), Table::new(name, spec));
        Ok(())
    }

    pub fn remove_table(&mut self, name: &str) -> Result<()> {
        if self.tables.shift_remove(name).is_none() {
            return Err(self.missing_table(name));
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables.get(name).ok_or_else(|| self.missing_table(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn missing_table(&self, name: &str) -> Error {
        Error::invalid(format!(
            "table '{name}' doesn't exist (available tables are {})",
            and_(self.tables.keys())
        ))
    }

    fn validate_spec(&self, table: &str, spec: &TableSpec) -> Result<()> {
        for (column, column_spec) in &spec.columns {
            if column == PK {
                return Err(Error::invalid(format!(
                    "invalid column '{table}.{column}': '{PK}' is reserved"
                )));
            }
            if column_spec.column_type.is_relation() && column_spec.table.is_none() {
                return Err(Error::invalid(format!(
                    "invalid column '{table}.{column}': relation columns require a target table"
                )));
            }
            if column_spec.column_type == ColumnType::ManyToMany
                && column_spec.table.as_deref() == Some(table)
            {
                return Err(Error::invalid(format!(
                    "invalid column '{table}.{column}': self-referential many-to-many is not supported"
                )));
            }
            if self.dialect.unique_string_requires_length()
                && column_spec.unique
                && column_spec.column_type == ColumnType::String
            {
                return Err(Error::invalid(format!(
                    "invalid column '{table}.{column}': MySQL requires unique string columns to have length"
                )));
            }
        }
        for group in &spec.unique {
            for column in group {
                if !spec.columns.contains_key(column) {
                    return Err(Error::invalid(format!(
                        "invalid column '{table}.{column}': unknown column in unique group"
                    )));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Relation resolution
    // =========================================================================

    /// The ordered relation map of a table: declared relation columns in
    /// declaration order, then back-references inferred from foreign keys
    /// elsewhere (unless suppressed by an explicit backref column).
    pub fn relations(&self, name: &str) -> Result<IndexMap<String, Relation>> {
        let table = self.table(name)?;
        let mut relations = IndexMap::new();
        for (column, spec) in &table.spec.columns {
            let Some(target) = spec.table.as_deref() else {
                continue;
            };
            match spec.column_type {
                ColumnType::ForeignKey => {
                    if !self.contains(target) {
                        return Err(self.missing_target("foreign key", name, column, target));
                    }
                    relations.insert(
                        column.clone(),
                        Relation::ForeignKey {
                            column: column.clone(),
                            target: target.to_string(),
                        },
                    );
                }
                ColumnType::BackRef => {
                    if !self.contains(target) {
                        return Err(self.missing_target("back-reference", name, column, target));
                    }
                    let child_column = self.fk_column(target, name).ok_or_else(|| {
                        Error::invalid(format!(
                            "table '{target}' has no foreign key referencing '{name}' \
                             for back-reference '{name}.{column}'"
                        ))
                    })?;
                    relations.insert(
                        column.clone(),
                        Relation::BackRef {
                            name: column.clone(),
                            child: target.to_string(),
                            child_column,
                        },
                    );
                }
                ColumnType::ManyToMany => {
                    if !self.contains(target) {
                        return Err(self.missing_target("many-to-many", name, column, target));
                    }
                    relations.insert(
                        column.clone(),
                        Relation::ManyToMany {
                            name: column.clone(),
                            target: target.to_string(),
                            link_table: link_table_name(name, target),
                            source_column: name.to_string(),
                            target_column: target.to_string(),
                        },
                    );
                }
                _ => {}
            }
        }
        // Inferred back-references: every fk pointing here contributes
        // one, named by the child's plural, unless an explicit backref
        // column already covers that child.
        for (child_name, child_table) in &self.tables {
            if child_name == name {
                continue;
            }
            let suppressed = table.spec.columns.values().any(|spec| {
                spec.column_type == ColumnType::BackRef
                    && spec.table.as_deref() == Some(child_name)
            });
            if suppressed {
                continue;
            }
            for (column, spec) in &child_table.spec.columns {
                if spec.column_type == ColumnType::ForeignKey
                    && spec.table.as_deref() == Some(name)
                {
                    let backref_name = child_table
                        .spec
                        .plural
                        .clone()
                        .unwrap_or_else(|| plural(child_name));
                    relations.entry(backref_name.clone()).or_insert(Relation::BackRef {
                        name: backref_name,
                        child: child_name.clone(),
                        child_column: column.clone(),
                    });
                }
            }
        }
        Ok(relations)
    }

    fn missing_target(&self, kind: &str, table: &str, column: &str, target: &str) -> Error {
        Error::invalid(format!(
            "table '{target}' referenced by {kind} '{table}.{column}' doesn't exist \
             (available tables are {})",
            and_(self.tables.keys())
        ))
    }

    /// The first fk column of `table` referencing `target`.
    fn fk_column(&self, table: &str, target: &str) -> Option<String> {
        let table = self.tables.get(table)?;
        table
            .spec
            .columns
            .iter()
            .find(|(_, spec)| {
                spec.column_type == ColumnType::ForeignKey
                    && spec.table.as_deref() == Some(target)
            })
            .map(|(name, _)| name.clone())
    }

    /// Dependents of a table: fk children plus link tables, for cascade
    /// and set-null handling.
    pub fn children(&self, name: &str) -> Result<Vec<ChildRef>> {
        let mut children = vec![];
        for (child_name, child_table) in &self.tables {
            for (column, spec) in &child_table.spec.columns {
                if spec.column_type == ColumnType::ForeignKey
                    && spec.table.as_deref() == Some(name)
                {
                    children.push(ChildRef {
                        table: child_name.clone(),
                        column: column.clone(),
                        nullable: spec.nullable,
                        is_link: false,
                    });
                }
            }
        }
        for link in self.link_tables()? {
            if link.left == name || link.right == name {
                children.push(ChildRef {
                    table: link.name.clone(),
                    column: name.to_string(),
                    nullable: false,
                    is_link: true,
                });
            }
        }
        Ok(children)
    }

    /// All link tables implied by m2m columns, deduplicated.
    pub fn link_tables(&self) -> Result<Vec<LinkTable>> {
        let mut links: IndexMap<String, LinkTable> = IndexMap::new();
        for (name, table) in &self.tables {
            for (column, spec) in &table.spec.columns {
                if spec.column_type != ColumnType::ManyToMany {
                    continue;
                }
                let Some(target) = spec.table.as_deref() else {
                    continue;
                };
                if !self.contains(target) {
                    return Err(self.missing_target("many-to-many", name, column, target));
                }
                let link_name = link_table_name(name, target);
                let (left, right) = if name.as_str() <= target {
                    (name.clone(), target.to_string())
                } else {
                    (target.to_string(), name.clone())
                };
                links.entry(link_name.clone()).or_insert(LinkTable {
                    name: link_name,
                    left,
                    right,
                });
            }
        }
        Ok(links.into_values().collect())
    }

    /// Creation order: referenced tables before their dependents, link
    /// tables last. Cycles fall back to declaration order.
    pub fn creation_order(&self, names: Option<&[String]>) -> Result<Vec<String>> {
        let selected: Vec<String> = match names {
            Some(names) => {
                for name in names {
                    self.table(name)?;
                }
                names.to_vec()
            }
            None => self.table_names(),
        };
        let mut ordered: Vec<String> = vec![];
        let mut remaining: Vec<String> = selected.clone();
        while !remaining.is_empty() {
            let mut progressed = false;
            let mut next = vec![];
            for name in remaining {
                let table = self.table(&name)?;
                let blocked = table.spec.columns.values().any(|spec| {
                    spec.column_type == ColumnType::ForeignKey
                        && spec
                            .table
                            .as_deref()
                            .map(|target| {
                                target != name
                                    && selected.contains(&target.to_string())
                                    && !ordered.contains(&target.to_string())
                            })
                            .unwrap_or(false)
                });
                if blocked {
                    next.push(name);
                } else {
                    ordered.push(name);
                    progressed = true;
                }
            }
            if !progressed {
                // Referential cycle; declaration order is the best we can do.
                ordered.extend(next);
                break;
            }
            remaining = next;
        }
        if names.is_none() {
            for link in self.link_tables()? {
                ordered.push(link.name);
            }
        }
        Ok(ordered)
    }
}
