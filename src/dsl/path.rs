//! Path parsing.
//!
//! Filter keys and selector strings share one syntax: segments separated
//! by `__` (keyword form) or `.` (string form), walking relations first,
//! then a terminal column, then JSON keys, then a function chain. Filter
//! keys may end in a comparison operator; selector strings may carry a
//! `:alias` suffix.

use crate::error::{Error, Result};
use crate::schema::{ColumnType, Registry, Relation, PK};
use crate::sql::dialect::JsonSegment;
use crate::util::and_;

use super::functions;

/// Where a path ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// A stored column (or pk) on the target table.
    Column(String),
    /// The path ends on a relation; it stands for the joined pk.
    RelationPk,
    /// Selector form: expand every column of the joined relation.
    Expansion,
}

/// The context a path is parsed in; it decides how relation-terminal
/// paths read and which error message unknown names get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Filter,
    Selector,
    Order,
}

/// A parsed path, resolved against the schema.
#[derive(Debug, Clone)]
pub struct ParsedPath {
    /// Relation edges walked, in order, starting from the base table.
    pub relations: Vec<Relation>,
    /// The table the terminal column lives on.
    pub target_table: String,
    pub terminal: Terminal,
    /// Type of the terminal column; None for relation expansions.
    pub column_type: Option<ColumnType>,
    pub json_path: Vec<JsonSegment>,
    pub functions: Vec<String>,
    /// Detached comparison operator (filter keys only).
    pub operator: Option<String>,
    /// Output alias (selector strings only).
    pub alias: Option<String>,
    /// Canonical dotted form, without alias or operator.
    pub key: String,
}

impl ParsedPath {
    /// Whether any walked edge can multiply rows.
    pub fn is_to_many(&self) -> bool {
        self.relations.iter().any(Relation::is_to_many)
    }
}

/// Parse `key` against `table`'s schema.
pub fn parse(registry: &Registry, table: &str, key: &str, mode: PathMode) -> Result<ParsedPath> {
    let mut key = key;
    let mut alias = None;
    if mode == PathMode::Selector {
        if let Some((path, alias_part)) = key.rsplit_once(':') {
            key = path;
            alias = Some(alias_part.to_string());
        }
    }

    let mut segments: Vec<&str> = if key.contains("__") {
        key.split("__").collect()
    } else {
        key.split('.').collect()
    };

    let mut operator = None;
    if mode == PathMode::Filter && segments.len() > 1 {
        if let Some(last) = segments.last() {
            if functions::is_operator(last) {
                operator = Some(last.to_string());
                segments.pop();
            }
        }
    }

    let mut relations: Vec<Relation> = vec![];
    let mut current = table.to_string();
    let mut index = 0;
    let mut terminal = None;

    while index < segments.len() {
        let segment = segments[index];
        let current_table = registry.table(&current)?;
        let is_last = index == segments.len() - 1;
        let stored = segment == PK || current_table.stored_column(segment).is_some();
        let table_relations = registry.relations(&current)?;

        if is_last {
            if stored {
                terminal = Some(Terminal::Column(segment.to_string()));
                index += 1;
                break;
            }
            if let Some(relation) = table_relations.get(segment) {
                current = relation.target().to_string();
                relations.push(relation.clone());
                terminal = Some(match mode {
                    PathMode::Selector => Terminal::Expansion,
                    _ => Terminal::RelationPk,
                });
                index += 1;
                break;
            }
            return Err(unknown_column(registry, &current, segment, mode, &segments)?);
        }

        if let Some(relation) = table_relations.get(segment) {
            current = relation.target().to_string();
            relations.push(relation.clone());
            index += 1;
            continue;
        }
        if stored {
            terminal = Some(Terminal::Column(segment.to_string()));
            index += 1;
            break;
        }
        return Err(unknown_column(registry, &current, segment, mode, &segments)?);
    }

    let terminal = terminal.expect("paths always terminate");
    let rest = &segments[index..];

    // The trailing run of registered function names is the function
    // chain; anything before it navigates into a JSON document.
    let mut chain_start = rest.len();
    while chain_start > 0 && functions::is_function(rest[chain_start - 1]) {
        chain_start -= 1;
    }
    let json_segments = &rest[..chain_start];
    let function_chain: Vec<String> = rest[chain_start..].iter().map(|s| s.to_string()).collect();

    let column_type = match &terminal {
        Terminal::Column(name) => {
            if name.as_str() == PK {
                Some(ColumnType::Integer)
            } else {
                registry
                    .table(&current)?
                    .stored_column(name)
                    .map(|spec| spec.column_type)
            }
        }
        Terminal::RelationPk => Some(ColumnType::Integer),
        Terminal::Expansion => None,
    };

    if !json_segments.is_empty() && column_type != Some(ColumnType::Json) {
        let column = match &terminal {
            Terminal::Column(name) => name.clone(),
            _ => segments[index.saturating_sub(1)].to_string(),
        };
        return Err(Error::invalid(format!(
            "column '{current}.{column}' is not a JSON column"
        )));
    }

    let json_path: Vec<JsonSegment> = json_segments
        .iter()
        .map(|segment| JsonSegment::from_str(segment))
        .collect();

    let mut key_parts: Vec<String> = relations
        .iter()
        .map(|relation| relation.name().to_string())
        .collect();
    if let Terminal::Column(name) = &terminal {
        key_parts.push(name.clone());
    }
    key_parts.extend(json_segments.iter().map(|s| s.to_string()));
    key_parts.extend(function_chain.iter().cloned());

    Ok(ParsedPath {
        relations,
        target_table: current,
        terminal,
        column_type,
        json_path,
        functions: function_chain,
        operator,
        alias,
        key: key_parts.join("."),
    })
}

/// Build the unknown-name error. Plain single-segment filter keys speak
/// of columns; paths, selectors and order keys speak of selectors.
fn unknown_column(
    registry: &Registry,
    table: &str,
    column: &str,
    mode: PathMode,
    segments: &[&str],
) -> Result<Error> {
    let resolved = registry.table(table)?;
    let simple = mode == PathMode::Filter && segments.len() == 1;
    let mut available = resolved.available_columns();
    let noun = if simple {
        "columns"
    } else {
        available.extend(registry.relations(table)?.keys().cloned());
        "selectors"
    };
    Ok(Error::invalid(format!(
        "table '{table}' has no column '{column}' (available {noun} are {})",
        and_(available)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, TableSpec};
    use crate::sql::dialect::Dialect;

    fn registry() -> Registry {
        let mut registry = Registry::new(Dialect::Sqlite);
        registry
            .add_table(
                "user",
                TableSpec::new().column("name", ColumnSpec::string()),
            )
            .unwrap();
        registry
            .add_table(
                "post",
                TableSpec::new()
                    .column("user", ColumnSpec::fk("user"))
                    .column("content", ColumnSpec::string()),
            )
            .unwrap();
        registry
            .add_table(
                "t",
                TableSpec::new()
                    .column("s", ColumnSpec::string())
                    .column("d", ColumnSpec::json()),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_plain_column() {
        let registry = registry();
        let path = parse(&registry, "t", "s", PathMode::Filter).unwrap();
        assert!(path.relations.is_empty());
        assert_eq!(path.terminal, Terminal::Column("s".into()));
        assert_eq!(path.operator, None);
        assert_eq!(path.key, "s");
    }

    #[test]
    fn test_operator_detaches() {
        let registry = registry();
        let path = parse(&registry, "t", "s__startswith", PathMode::Filter).unwrap();
        assert_eq!(path.operator.as_deref(), Some("startswith"));
        assert_eq!(path.key, "s");
    }

    #[test]
    fn test_relation_walk() {
        let registry = registry();
        let path = parse(
            &registry,
            "user",
            "posts__content__startswith",
            PathMode::Filter,
        )
        .unwrap();
        assert_eq!(path.relations.len(), 1);
        assert_eq!(path.relations[0].name(), "posts");
        assert!(path.is_to_many());
        assert_eq!(path.terminal, Terminal::Column("content".into()));
        assert_eq!(path.target_table, "post");
        assert_eq!(path.key, "posts.content");
    }

    #[test]
    fn test_relation_terminal() {
        let registry = registry();
        let path = parse(&registry, "user", "posts__gt", PathMode::Filter).unwrap();
        assert_eq!(path.terminal, Terminal::RelationPk);
        assert_eq!(path.operator.as_deref(), Some("gt"));
        let path = parse(&registry, "user", "posts", PathMode::Selector).unwrap();
        assert_eq!(path.terminal, Terminal::Expansion);
    }

    #[test]
    fn test_fk_column_beats_relation() {
        let registry = registry();
        // A terminal "user" on post is the stored fk column, not a join.
        let path = parse(&registry, "post", "user", PathMode::Filter).unwrap();
        assert!(path.relations.is_empty());
        assert_eq!(path.terminal, Terminal::Column("user".into()));
        // With more segments it walks the relation instead.
        let path = parse(&registry, "post", "user__name", PathMode::Filter).unwrap();
        assert_eq!(path.relations.len(), 1);
        assert_eq!(path.terminal, Terminal::Column("name".into()));
    }

    #[test]
    fn test_json_and_functions() {
        let registry = registry();
        let path = parse(&registry, "t", "d__s__length__gt", PathMode::Filter).unwrap();
        assert_eq!(path.operator.as_deref(), Some("gt"));
        assert_eq!(path.json_path, vec![JsonSegment::Key("s".into())]);
        assert_eq!(path.functions, ["length"]);
        assert_eq!(path.key, "d.s.length");

        let path = parse(&registry, "t", "s.length.double:n", PathMode::Selector).unwrap();
        assert_eq!(path.alias.as_deref(), Some("n"));
        assert_eq!(path.functions, ["length", "double"]);
        assert!(path.json_path.is_empty());
    }

    #[test]
    fn test_json_index_segments() {
        let registry = registry();
        let path = parse(&registry, "t", "d__0__s", PathMode::Filter).unwrap();
        assert_eq!(
            path.json_path,
            vec![JsonSegment::Index(0), JsonSegment::Key("s".into())]
        );
    }

    #[test]
    fn test_not_a_json_column() {
        let registry = registry();
        let error = parse(&registry, "t", "s__x", PathMode::Filter).unwrap_err();
        assert_eq!(error.to_string(), "column 't.s' is not a JSON column");
    }

    #[test]
    fn test_unknown_column_messages() {
        let registry = registry();
        let error = parse(&registry, "t", "x", PathMode::Filter).unwrap_err();
        assert_eq!(
            error.to_string(),
            "table 't' has no column 'x' (available columns are pk, s and d)"
        );
        let error = parse(&registry, "t", "x", PathMode::Selector).unwrap_err();
        assert_eq!(
            error.to_string(),
            "table 't' has no column 'x' (available selectors are pk, s and d)"
        );
        let error = parse(&registry, "t", "x__y", PathMode::Filter).unwrap_err();
        assert!(error.to_string().contains("available selectors"));
    }
}
