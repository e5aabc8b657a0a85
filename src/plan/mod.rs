//! The query compiler.
//!
//! Walks filter trees, selectors, and order keys to plan joins, allocate
//! relation aliases, and emit dialect-appropriate statements. Filters
//! demand INNER joins; selectors and order keys join LEFT so they never
//! drop base rows. Identical relation paths share one alias
//! (`posts_commentary`), and many-to-many edges expand into two joins
//! through their link table.

use indexmap::IndexMap;

use crate::codec;
use crate::dsl::filter::{Leaf, Query};
use crate::dsl::functions::{self, Builtin, FunctionKind, Scalar};
use crate::dsl::path::{self, ParsedPath, PathMode, Terminal};
use crate::dsl::selector::{ArithOp, Selector};
use crate::error::{Error, Result};
use crate::schema::{ColumnType, Registry, Relation, Table, PK};
use crate::sql::dialect::{Dialect, JsonSegment, SqlDialect};
use crate::sql::dml::{Delete, Insert, InsertValue, OnConflict, Update};
use crate::sql::expr::{BindValue, Expr, ExprExt, Params};
use crate::sql::query::{Join, JoinType, OrderByExpr, Select, SelectExpr, TableRef};
use crate::value::{Row, Value};

// =============================================================================
// Compiled statements
// =============================================================================

/// A ready-to-execute statement: SQL text plus bound values in order.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// How to decode one output column.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeHint {
    /// A stored column of a known type.
    Typed(ColumnType),
    /// A JSON-extracted value: text on some dialects, native on others.
    Json,
    Int,
    Float,
    Bytes,
    /// Numeric expression result; integer or float depending on dialect.
    Numeric,
    Raw,
}

#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub key: String,
    pub hint: DecodeHint,
}

/// A compiled SELECT with its decode plan.
#[derive(Debug, Clone)]
pub struct CompiledSelect {
    pub statement: Statement,
    pub outputs: Vec<OutputColumn>,
    /// Deduplicate result rows on pk (joins multiplied rows).
    pub dedupe: bool,
    /// The last output column is a pk added only for deduplication and
    /// must be stripped from result rows.
    pub hidden_pk: bool,
}

/// An update assignment: a constant or a computed expression.
#[derive(Debug, Clone)]
pub enum Assign {
    Value(Value),
    Expr(Selector),
}

/// Inputs of a SELECT compilation.
#[derive(Debug, Clone, Default)]
pub struct SelectSpec {
    pub selectors: Vec<Selector>,
    pub filter: Query,
    pub order: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

// =============================================================================
// Join planning
// =============================================================================

#[derive(Debug, Clone)]
struct PlannedJoin {
    alias: String,
    source: String,
    relation: Relation,
    required: bool,
}

#[derive(Debug, Default)]
struct JoinPlan {
    joins: IndexMap<String, PlannedJoin>,
}

impl JoinPlan {
    /// Ensure joins exist for every edge of the path; returns the alias
    /// of the last joined table (or `base` for empty paths).
    fn add_path(&mut self, base: &str, relations: &[Relation], required: bool) -> String {
        let mut source = base.to_string();
        let mut alias_parts: Vec<&str> = vec![];
        for relation in relations {
            alias_parts.push(relation.name());
            let alias = alias_parts.join("_");
            let entry = self.joins.entry(alias.clone()).or_insert_with(|| PlannedJoin {
                alias: alias.clone(),
                source: source.clone(),
                relation: relation.clone(),
                required,
            });
            if required {
                entry.required = true;
            }
            source = alias;
        }
        source
    }

    fn has_to_many(&self) -> bool {
        self.joins.values().any(|join| join.relation.is_to_many())
    }

    fn to_joins(&self) -> Vec<Join> {
        let mut joins = vec![];
        for planned in self.joins.values() {
            let kind = if planned.required {
                JoinType::Inner
            } else {
                JoinType::Left
            };
            match &planned.relation {
                Relation::ForeignKey { column, target } => {
                    joins.push(Join {
                        kind,
                        table: TableRef::new(target).with_alias(&planned.alias),
                        on: Expr::Column {
                            table: Some(planned.source.clone()),
                            column: column.clone(),
                        }
                        .eq(Expr::Column {
                            table: Some(planned.alias.clone()),
                            column: PK.into(),
                        }),
                    });
                }
                Relation::BackRef {
                    child,
                    child_column,
                    ..
                } => {
                    joins.push(Join {
                        kind,
                        table: TableRef::new(child).with_alias(&planned.alias),
                        on: Expr::Column {
                            table: Some(planned.alias.clone()),
                            column: child_column.clone(),
                        }
                        .eq(Expr::Column {
                            table: Some(planned.source.clone()),
                            column: PK.into(),
                        }),
                    });
                }
                Relation::ManyToMany {
                    target,
                    link_table,
                    source_column,
                    target_column,
                    ..
                } => {
                    let link_alias = format!("{}_link", planned.alias);
                    joins.push(Join {
                        kind,
                        table: TableRef::new(link_table).with_alias(&link_alias),
                        on: Expr::Column {
                            table: Some(link_alias.clone()),
                            column: source_column.clone(),
                        }
                        .eq(Expr::Column {
                            table: Some(planned.source.clone()),
                            column: PK.into(),
                        }),
                    });
                    joins.push(Join {
                        kind,
                        table: TableRef::new(target).with_alias(&planned.alias),
                        on: Expr::Column {
                            table: Some(planned.alias.clone()),
                            column: PK.into(),
                        }
                        .eq(Expr::Column {
                            table: Some(link_alias),
                            column: target_column.clone(),
                        }),
                    });
                }
            }
        }
        joins
    }
}

// =============================================================================
// The compiler
// =============================================================================

pub struct Compiler<'a> {
    registry: &'a Registry,
    dialect: Dialect,
    table: &'a Table,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a Registry, table: &str) -> Result<Self> {
        Ok(Self {
            registry,
            dialect: registry.dialect(),
            table: registry.table(table)?,
        })
    }

    pub fn table(&self) -> &Table {
        self.table
    }

    // =========================================================================
    // SELECT
    // =========================================================================

    pub fn select(&self, spec: &SelectSpec) -> Result<CompiledSelect> {
        let mut plan = JoinPlan::default();
        let filter_expr = self.where_expr(&mut plan, &spec.filter)?;
        let filter_to_many = plan.has_to_many();

        let mut columns: Vec<SelectExpr> = vec![];
        let mut outputs: Vec<OutputColumn> = vec![];
        let mut selector_to_many = false;

        if spec.selectors.is_empty() {
            for (key, expr, hint) in self.table_outputs(self.table, &self.table.name, "") {
                columns.push(SelectExpr::new(expr).with_alias(&key));
                outputs.push(OutputColumn { key, hint });
            }
        } else {
            for selector in &spec.selectors {
                let parsed = path::parse(
                    self.registry,
                    &self.table.name,
                    &selector.full_path(),
                    PathMode::Selector,
                )?;
                selector_to_many |= parsed.is_to_many();
                if parsed.terminal == Terminal::Expansion {
                    let target = self.registry.table(&parsed.target_table)?;
                    let alias = plan.add_path(&self.table.name, &parsed.relations, false);
                    let prefix = format!("{}.", parsed.key);
                    for (key, expr, hint) in self.table_outputs(target, &alias, &prefix) {
                        columns.push(SelectExpr::new(expr).with_alias(&key));
                        outputs.push(OutputColumn { key, hint });
                    }
                    continue;
                }
                let alias = selector
                    .alias
                    .clone()
                    .or_else(|| parsed.alias.clone())
                    .unwrap_or_else(|| parsed.key.clone());
                let mut expr = self.column_expr(&mut plan, &parsed, false)?;
                let mut hint = self.output_hint(&parsed);
                if !selector.arith.is_empty() {
                    for (op, value) in &selector.arith {
                        expr = expr.binary(arith_op(*op), Expr::Param(BindValue::from_value(value)?));
                    }
                    hint = DecodeHint::Numeric;
                }
                columns.push(SelectExpr::new(expr).with_alias(&alias));
                outputs.push(OutputColumn { key: alias, hint });
            }
        }

        // Order keys join LEFT and count toward row multiplication.
        let mut order_by = vec![];
        let mut order_to_many = false;
        for key in &spec.order {
            let (direction, key) = match key.strip_prefix('-') {
                Some(rest) => (false, rest),
                None => (true, key.strip_prefix('+').unwrap_or(key)),
            };
            let parsed = path::parse(self.registry, &self.table.name, key, PathMode::Order)?;
            order_to_many |= parsed.is_to_many();
            let expr = self.column_expr(&mut plan, &parsed, false)?;
            order_by.push(if direction {
                OrderByExpr::asc(expr)
            } else {
                OrderByExpr::desc(expr)
            });
        }

        let dedupe = (filter_to_many || order_to_many) && !selector_to_many;
        let hidden_pk = dedupe
            && !spec.selectors.is_empty()
            && !outputs.iter().any(|output| output.key == PK);
        if hidden_pk {
            columns.push(SelectExpr::new(table_pk(&self.table.name)));
            outputs.push(OutputColumn {
                key: PK.to_string(),
                hint: DecodeHint::Typed(ColumnType::Integer),
            });
        }

        let mut select = Select::from_table(TableRef::new(&self.table.name));
        for column in columns {
            select = select.column(column);
        }
        for join in plan.to_joins() {
            select = select.join(join);
        }
        if let Some(expr) = filter_expr {
            select = select.filter(expr);
        }
        for order in order_by {
            select = select.order_by(order);
        }
        select = select.limit(spec.limit).offset(spec.offset);

        let mut params = Params::new();
        let sql = select.to_tokens(self.dialect, &mut params).serialize(self.dialect);
        Ok(CompiledSelect {
            statement: Statement {
                sql,
                params: params.into_values(),
            },
            outputs,
            dedupe,
            hidden_pk,
        })
    }

    /// pk plus stored columns of a table, qualified by `alias`, keyed
    /// with `prefix`.
    fn table_outputs(
        &self,
        table: &Table,
        alias: &str,
        prefix: &str,
    ) -> Vec<(String, Expr, DecodeHint)> {
        let mut outputs = vec![(
            format!("{prefix}{PK}"),
            Expr::Column {
                table: Some(alias.to_string()),
                column: PK.into(),
            },
            DecodeHint::Typed(ColumnType::Integer),
        )];
        for (name, spec) in table.stored_columns() {
            outputs.push((
                format!("{prefix}{name}"),
                Expr::Column {
                    table: Some(alias.to_string()),
                    column: name.clone(),
                },
                DecodeHint::Typed(spec.column_type),
            ));
        }
        outputs
    }

    fn output_hint(&self, parsed: &ParsedPath) -> DecodeHint {
        if let Some(last) = parsed.functions.last() {
            return match functions::lookup(last).map(|def| def.kind) {
                Some(FunctionKind::Scalar(Scalar::Length)) => DecodeHint::Int,
                Some(FunctionKind::Scalar(Scalar::Double)) => DecodeHint::Float,
                Some(FunctionKind::Scalar(Scalar::Binary)) => DecodeHint::Bytes,
                _ => DecodeHint::Raw,
            };
        }
        if !parsed.json_path.is_empty() {
            return DecodeHint::Json;
        }
        match parsed.column_type {
            Some(column_type) => DecodeHint::Typed(column_type),
            None => DecodeHint::Raw,
        }
    }

    // =========================================================================
    // COUNT / EXISTS
    // =========================================================================

    /// `COUNT(*)`, counting distinct pks when joins can multiply rows,
    /// or distinct tuples of `distinct` keys when given.
    pub fn count(&self, filter: &Query, distinct: &[String]) -> Result<Statement> {
        let mut plan = JoinPlan::default();
        let filter_expr = self.where_expr(&mut plan, filter)?;

        let count_star = SelectExpr::new(Expr::Func {
            name: "COUNT".into(),
            args: vec![Expr::Star { table: None }],
        });

        let inner_columns: Vec<SelectExpr> = if distinct.is_empty() {
            if !plan.has_to_many() {
                // No row multiplication; count directly.
                let mut select = Select::from_table(TableRef::new(&self.table.name))
                    .column(count_star);
                for join in plan.to_joins() {
                    select = select.join(join);
                }
                if let Some(expr) = filter_expr {
                    select = select.filter(expr);
                }
                return Ok(self.finish(|params| select.to_tokens(self.dialect, params)));
            }
            vec![SelectExpr::new(table_pk(&self.table.name))]
        } else {
            let mut columns = vec![];
            for key in distinct {
                let parsed =
                    path::parse(self.registry, &self.table.name, key, PathMode::Selector)?;
                if parsed.terminal == Terminal::Expansion {
                    return Err(Error::invalid(format!(
                        "cannot count distinct over relation '{key}'"
                    )));
                }
                columns.push(SelectExpr::new(self.column_expr(&mut plan, &parsed, false)?));
            }
            columns
        };

        let mut inner = Select::from_table(TableRef::new(&self.table.name)).distinct();
        for column in inner_columns {
            inner = inner.column(column);
        }
        for join in plan.to_joins() {
            inner = inner.join(join);
        }
        if let Some(expr) = filter_expr {
            inner = inner.filter(expr);
        }
        let outer = Select::from_subquery(inner, "counted").column(count_star_expr());
        Ok(self.finish(|params| outer.to_tokens(self.dialect, params)))
    }

    pub fn exists(&self, filter: &Query) -> Result<Statement> {
        let mut plan = JoinPlan::default();
        let filter_expr = self.where_expr(&mut plan, filter)?;
        let mut inner = Select::from_table(TableRef::new(&self.table.name))
            .column(SelectExpr::new(Expr::LitInt(1)));
        for join in plan.to_joins() {
            inner = inner.join(join);
        }
        if let Some(expr) = filter_expr {
            inner = inner.filter(expr);
        }
        let exists = Expr::Exists(Box::new(inner));
        let mut params = Params::new();
        let mut ts = crate::sql::token::TokenStream::new();
        ts.push(crate::sql::token::Token::Select).space();
        ts.append(&exists.to_tokens(self.dialect, &mut params));
        Ok(Statement {
            sql: ts.serialize(self.dialect),
            params: params.into_values(),
        })
    }

    // =========================================================================
    // INSERT
    // =========================================================================

    /// Multi-row insert. `update_columns` of `None` means ignore
    /// conflicting rows; an empty slice is not meaningful.
    pub fn insert(
        &self,
        rows: &[Row],
        on_conflict: Option<&[String]>,
        update_columns: Option<Vec<String>>,
    ) -> Result<Statement> {
        let mut columns: Vec<String> = vec![];
        for row in rows {
            for key in row.keys() {
                if key != PK && self.table.stored_column(key).is_none() {
                    return Err(Error::invalid(format!(
                        "table '{}' has no column '{key}' (available columns are {})",
                        self.table.name,
                        crate::util::and_(self.table.available_columns())
                    )));
                }
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut insert = Insert::into(&self.table.name).columns(columns.clone());
        for row in rows {
            let mut values = vec![];
            for column in &columns {
                let value = row.get(column).unwrap_or(&Value::Null);
                // JSON columns store JSON null, not SQL NULL.
                values.push(match value {
                    Value::Null if !self.is_json_column(column) => InsertValue::Null,
                    value => InsertValue::Bind(self.encode_column(column, value)?),
                });
            }
            insert = insert.row(values);
        }

        if let Some(conflict_columns) = on_conflict {
            let update = match update_columns {
                Some(update) => update,
                None => vec![],
            };
            insert = insert.on_conflict(OnConflict {
                columns: conflict_columns.to_vec(),
                update,
            });
        }
        if self.dialect.supports_returning() {
            insert = insert.returning(PK);
        }
        let mut params = Params::new();
        let sql = insert.to_tokens(self.dialect, &mut params).serialize(self.dialect);
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    fn is_json_column(&self, column: &str) -> bool {
        self.table
            .stored_column(column)
            .map(|spec| spec.column_type == ColumnType::Json)
            .unwrap_or(false)
    }

    /// Encode a value for storage in a column.
    fn encode_column(&self, column: &str, value: &Value) -> Result<BindValue> {
        let column_type = if column == PK {
            ColumnType::Integer
        } else {
            self.table
                .stored_column(column)
                .map(|spec| spec.column_type)
                .unwrap_or(ColumnType::String)
        };
        match column_type {
            ColumnType::Json => Ok(BindValue::Str(codec::to_json_text(value))),
            _ => BindValue::from_value(value),
        }
    }

    // =========================================================================
    // UPDATE / DELETE
    // =========================================================================

    pub fn update(&self, filter: &Query, assignments: &[(String, Assign)]) -> Result<Statement> {
        let mut update = Update::table(&self.table.name);
        for (column, assign) in assignments {
            if self.table.stored_column(column).is_none() {
                return Err(Error::invalid(format!(
                    "table '{}' has no column '{column}' (available columns are {})",
                    self.table.name,
                    crate::util::and_(self.table.available_columns())
                )));
            }
            let expr = match assign {
                Assign::Value(Value::Null) if !self.is_json_column(column) => Expr::Null,
                Assign::Value(value) => Expr::Param(self.encode_column(column, value)?),
                Assign::Expr(selector) => self.assignment_expr(selector)?,
            };
            update = update.set(column.clone(), expr);
        }
        if let Some(filter_expr) = self.dml_filter(filter)? {
            update = update.filter(filter_expr);
        }
        let mut params = Params::new();
        let sql = update.to_tokens(self.dialect, &mut params).serialize(self.dialect);
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    pub fn delete(&self, filter: &Query) -> Result<Statement> {
        let mut delete = Delete::from(&self.table.name);
        if let Some(filter_expr) = self.dml_filter(filter)? {
            delete = delete.filter(filter_expr);
        }
        let mut params = Params::new();
        let sql = delete.to_tokens(self.dialect, &mut params).serialize(self.dialect);
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    /// A computed assignment value: a local column with functions and
    /// arithmetic, no relation traversal.
    fn assignment_expr(&self, selector: &Selector) -> Result<Expr> {
        let parsed = path::parse(
            self.registry,
            &self.table.name,
            &selector.full_path(),
            PathMode::Selector,
        )?;
        if !parsed.relations.is_empty() {
            return Err(Error::invalid(format!(
                "assignment expression '{}' cannot traverse relations",
                selector.full_path()
            )));
        }
        let mut plan = JoinPlan::default();
        let mut expr = self.column_expr(&mut plan, &parsed, false)?;
        for (op, value) in &selector.arith {
            expr = expr.binary(arith_op(*op), Expr::Param(BindValue::from_value(value)?));
        }
        Ok(expr)
    }

    /// WHERE clause for UPDATE/DELETE. Relation filters rewrite to a
    /// `pk IN (derived table)`; the extra nesting keeps MySQL from
    /// rejecting a subquery over the mutated table.
    fn dml_filter(&self, filter: &Query) -> Result<Option<Expr>> {
        if filter.is_empty() {
            return Ok(None);
        }
        let mut plan = JoinPlan::default();
        let filter_expr = self.where_expr(&mut plan, filter)?;
        if plan.joins.is_empty() {
            return Ok(filter_expr);
        }
        let mut inner = Select::from_table(TableRef::new(&self.table.name))
            .distinct()
            .column(SelectExpr::new(table_pk(&self.table.name)).with_alias(PK));
        for join in plan.to_joins() {
            inner = inner.join(join);
        }
        if let Some(expr) = filter_expr {
            inner = inner.filter(expr);
        }
        let wrapped = Select::from_subquery(inner, "matched").column(SelectExpr::new(
            Expr::Column {
                table: None,
                column: PK.into(),
            },
        ));
        Ok(Some(Expr::InSubquery {
            expr: Box::new(Expr::Column {
                table: None,
                column: PK.into(),
            }),
            query: Box::new(wrapped),
            negated: false,
        }))
    }

    /// SELECT pk … for cascade planning.
    pub fn pk_select(&self, filter: &Query) -> Result<Statement> {
        let mut plan = JoinPlan::default();
        let filter_expr = self.where_expr(&mut plan, filter)?;
        let mut select = Select::from_table(TableRef::new(&self.table.name))
            .column(SelectExpr::new(table_pk(&self.table.name)));
        if plan.has_to_many() {
            select = select.distinct();
        }
        for join in plan.to_joins() {
            select = select.join(join);
        }
        if let Some(expr) = filter_expr {
            select = select.filter(expr);
        }
        Ok(self.finish(|params| select.to_tokens(self.dialect, params)))
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Translate a filter tree into a boolean expression, extending the
    /// join plan with every relation path it touches.
    fn where_expr(&self, plan: &mut JoinPlan, query: &Query) -> Result<Option<Expr>> {
        match query {
            Query::And(children) | Query::Or(children) => {
                let is_and = matches!(query, Query::And(_));
                let mut combined: Option<Expr> = None;
                for child in children {
                    let Some(child_expr) = self.where_expr(plan, child)? else {
                        continue;
                    };
                    let child_expr = if matches!(child, Query::And(_) | Query::Or(_)) {
                        Expr::Paren(Box::new(child_expr))
                    } else {
                        child_expr
                    };
                    combined = Some(match combined {
                        Some(left) if is_and => left.and(child_expr),
                        Some(left) => left.or(child_expr),
                        None => child_expr,
                    });
                }
                Ok(combined)
            }
            Query::Not(child) => {
                let Some(child_expr) = self.where_expr(plan, child)? else {
                    return Ok(None);
                };
                Ok(Some(Expr::Not(Box::new(Expr::Paren(Box::new(child_expr))))))
            }
            Query::Leaf(leaf) => self.leaf_expr(plan, leaf).map(Some),
        }
    }

    fn leaf_expr(&self, plan: &mut JoinPlan, leaf: &Leaf) -> Result<Expr> {
        let parsed = path::parse(self.registry, &self.table.name, &leaf.path, PathMode::Filter)?;
        let operator = leaf.operator.as_str();
        let definition = functions::lookup(operator)
            .ok_or_else(|| Error::invalid(format!("unknown operator '{operator}'")))?;

        match definition.kind {
            FunctionKind::Operator(builtin) => {
                self.builtin_condition(plan, &parsed, builtin, &leaf.value)
            }
            FunctionKind::Custom(builder) => {
                let column = self.column_expr(plan, &parsed, true)?;
                builder(column, &leaf.value)
            }
            _ => Err(Error::invalid(format!(
                "'{operator}' is a function, not a comparison operator"
            ))),
        }
    }

    fn builtin_condition(
        &self,
        plan: &mut JoinPlan,
        parsed: &ParsedPath,
        builtin: Builtin,
        value: &Value,
    ) -> Result<Expr> {
        // `has` needs the raw column; every other operator compares the
        // (possibly JSON-extracted, function-wrapped) column clause.
        if builtin == Builtin::Has {
            if parsed.column_type != Some(ColumnType::Json) {
                let column = column_name(parsed);
                return Err(Error::invalid(format!(
                    "column '{}.{column}' is not a JSON column",
                    parsed.target_table
                )));
            }
            let Value::Str(path_text) = value else {
                return Err(Error::invalid("has operator requires a string path"));
            };
            let alias = plan.add_path(&self.table.name, &parsed.relations, true);
            let mut path = parsed.json_path.clone();
            path.extend(JsonSegment::parse_path(path_text));
            return Ok(Expr::JsonHas {
                expr: Box::new(Expr::Column {
                    table: Some(alias),
                    column: column_name(parsed),
                }),
                path,
            });
        }

        let column = self.column_expr(plan, parsed, true)?;
        let json_context = matches!(column, Expr::JsonExtract { .. });
        let encode =
            |value: &Value| -> Result<BindValue> { self.encode_comparison(json_context, value) };

        match builtin {
            Builtin::Eq | Builtin::Is => {
                if value.is_null() {
                    Ok(Expr::IsNull {
                        expr: Box::new(column),
                        negated: false,
                    })
                } else {
                    Ok(column.eq(Expr::Param(encode(value)?)))
                }
            }
            Builtin::Ne | Builtin::IsNot => {
                if value.is_null() {
                    Ok(Expr::IsNull {
                        expr: Box::new(column),
                        negated: true,
                    })
                } else {
                    // Null-safe: SQL NULL <> v is unknown, but a missing
                    // value is unequal to any value.
                    let null_check = Expr::IsNull {
                        expr: Box::new(column.clone()),
                        negated: false,
                    };
                    Ok(Expr::Paren(Box::new(
                        column.ne(Expr::Param(encode(value)?)).or(null_check),
                    )))
                }
            }
            Builtin::Lt => Ok(column.lt(Expr::Param(encode(value)?))),
            Builtin::Le => Ok(column.le(Expr::Param(encode(value)?))),
            Builtin::Gt => Ok(column.gt(Expr::Param(encode(value)?))),
            Builtin::Ge => Ok(column.ge(Expr::Param(encode(value)?))),
            Builtin::In | Builtin::NotIn => {
                let negated = builtin == Builtin::NotIn;
                let Value::List(items) = value else {
                    return Err(Error::invalid("in operator requires a list"));
                };
                if items.is_empty() {
                    // IN () is not valid SQL.
                    return Ok(Expr::LitInt(1).eq(Expr::LitInt(if negated { 1 } else { 0 })));
                }
                let mut values = vec![];
                for item in items {
                    values.push(encode(item)?);
                }
                let in_list = Expr::InList {
                    expr: Box::new(column.clone()),
                    values,
                    negated,
                };
                if negated {
                    // Null-safe, like `ne`.
                    let null_check = Expr::IsNull {
                        expr: Box::new(column),
                        negated: false,
                    };
                    return Ok(Expr::Paren(Box::new(in_list.or(null_check))));
                }
                Ok(in_list)
            }
            Builtin::Contains => {
                if parsed.column_type == Some(ColumnType::Json)
                    && parsed.json_path.is_empty()
                    && parsed.functions.is_empty()
                {
                    return Ok(Expr::JsonContains {
                        expr: Box::new(column),
                        value: self.encode_json_document(value)?,
                    });
                }
                Ok(like_pattern(column, encode(value)?, true, true))
            }
            Builtin::StartsWith => Ok(like_pattern(column, encode(value)?, false, true)),
            Builtin::EndsWith => Ok(like_pattern(column, encode(value)?, true, false)),
            Builtin::Like | Builtin::NotLike => Ok(Expr::Like {
                expr: Box::new(column),
                pattern: Box::new(Expr::Param(encode(value)?)),
                negated: builtin == Builtin::NotLike,
            }),
            Builtin::Matches => Ok(Expr::RegexMatch {
                expr: Box::new(column),
                pattern: BindValue::from_value(value)?,
            }),
            Builtin::Has => unreachable!("handled above"),
        }
    }

    /// Encode a comparison value. JSON-extracted values compare as text
    /// on the dialects whose accessors yield text, so bound values get
    /// their JSON rendering there (strings stay raw, `true` and `1.0`
    /// become their literals); SQLite compares natively.
    fn encode_comparison(&self, json_context: bool, value: &Value) -> Result<BindValue> {
        if json_context && self.dialect.json_parameters_as_text() {
            return Ok(match value {
                Value::Str(text) => BindValue::Str(text.clone()),
                other => BindValue::Str(codec::to_json_text(other)),
            });
        }
        BindValue::from_value(value)
    }

    /// Encode a value for whole-document JSON containment.
    fn encode_json_document(&self, value: &Value) -> Result<BindValue> {
        if self.dialect.json_parameters_as_text() {
            Ok(BindValue::Str(codec::to_json_text(value)))
        } else {
            BindValue::from_value(value)
        }
    }

    // =========================================================================
    // Column clauses
    // =========================================================================

    /// The SQL clause a parsed path denotes: an aliased column reference
    /// wrapped in JSON accessors and function applications.
    fn column_expr(&self, plan: &mut JoinPlan, parsed: &ParsedPath, required: bool) -> Result<Expr> {
        let alias = plan.add_path(&self.table.name, &parsed.relations, required);
        let mut expr = Expr::Column {
            table: Some(alias),
            column: column_name(parsed),
        };
        if !parsed.json_path.is_empty() {
            expr = Expr::JsonExtract {
                expr: Box::new(expr),
                path: parsed.json_path.clone(),
            };
        }
        for name in &parsed.functions {
            let definition = functions::lookup(name)
                .ok_or_else(|| Error::invalid(format!("unknown function '{name}'")))?;
            expr = match definition.kind {
                FunctionKind::Scalar(Scalar::Length) => Expr::Func {
                    name: "LENGTH".into(),
                    args: vec![expr],
                },
                FunctionKind::Scalar(Scalar::Double) => Expr::CastDouble(Box::new(expr)),
                FunctionKind::Scalar(Scalar::Binary) => Expr::CastBinary(Box::new(expr)),
                FunctionKind::JsonUnwrap(key) => match expr {
                    // Unwrapping a codec marker navigates one level deeper.
                    Expr::JsonExtract { expr, mut path } => {
                        path.push(JsonSegment::Key(key.to_string()));
                        Expr::JsonExtract { expr, path }
                    }
                    other => other,
                },
                _ => {
                    return Err(Error::invalid(format!(
                        "'{name}' is not usable in a function chain"
                    )))
                }
            };
        }
        Ok(expr)
    }

    fn finish(
        &self,
        build: impl FnOnce(&mut Params) -> crate::sql::token::TokenStream,
    ) -> Statement {
        let mut params = Params::new();
        let sql = build(&mut params).serialize(self.dialect);
        Statement {
            sql,
            params: params.into_values(),
        }
    }
}

/// `column LIKE '%' || ? || '%'` and its one-sided forms.
fn like_pattern(column: Expr, value: BindValue, before: bool, after: bool) -> Expr {
    let mut parts = vec![];
    if before {
        parts.push(Expr::LitString("%".into()));
    }
    parts.push(Expr::Param(value));
    if after {
        parts.push(Expr::LitString("%".into()));
    }
    Expr::Like {
        expr: Box::new(column),
        pattern: Box::new(Expr::Concat(parts)),
        negated: false,
    }
}

fn column_name(parsed: &ParsedPath) -> String {
    match &parsed.terminal {
        Terminal::Column(name) => name.clone(),
        _ => PK.to_string(),
    }
}

fn table_pk(table: &str) -> Expr {
    Expr::Column {
        table: Some(table.to_string()),
        column: PK.into(),
    }
}

fn count_star_expr() -> SelectExpr {
    SelectExpr::new(Expr::Func {
        name: "COUNT".into(),
        args: vec![Expr::Star { table: None }],
    })
}

fn arith_op(op: ArithOp) -> crate::sql::expr::BinaryOp {
    use crate::sql::expr::BinaryOp;
    match op {
        ArithOp::Add => BinaryOp::Add,
        ArithOp::Sub => BinaryOp::Sub,
        ArithOp::Mul => BinaryOp::Mul,
        ArithOp::Div => BinaryOp::Div,
    }
}
