//! Relation edges: foreign keys, back-references, and many-to-many links.

/// A resolved relation edge, reachable by name from its source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// A foreign-key column on the source table. To-one.
    ForeignKey { column: String, target: String },
    /// The reverse of a foreign key: rows of `child` whose `child_column`
    /// points at the source table. To-many.
    BackRef {
        name: String,
        child: String,
        child_column: String,
    },
    /// A many-to-many edge through an implicit link table. To-many.
    ManyToMany {
        name: String,
        target: String,
        link_table: String,
        /// Link-table column pointing back at the source table.
        source_column: String,
        /// Link-table column pointing at the target table.
        target_column: String,
    },
}

impl Relation {
    pub fn name(&self) -> &str {
        match self {
            Relation::ForeignKey { column, .. } => column,
            Relation::BackRef { name, .. } => name,
            Relation::ManyToMany { name, .. } => name,
        }
    }

    /// The table this edge lands on.
    pub fn target(&self) -> &str {
        match self {
            Relation::ForeignKey { target, .. } => target,
            Relation::BackRef { child, .. } => child,
            Relation::ManyToMany { target, .. } => target,
        }
    }

    /// Whether traversing this edge can multiply rows.
    pub fn is_to_many(&self) -> bool {
        !matches!(self, Relation::ForeignKey { .. })
    }
}

/// The implicit link table behind a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTable {
    pub name: String,
    /// The two linked tables, in sorted order.
    pub left: String,
    pub right: String,
}

/// Link-table name for a pair of tables: the names sorted and joined.
pub fn link_table_name(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}
