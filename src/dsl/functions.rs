//! The process-wide operator/function registry.
//!
//! Path keys resolve their trailing operator and function chains against
//! this registry: builtin comparison operators, scalar functions
//! (`length`, `double`, `binary`), the JSON marker unwrappers
//! (`datetime`, `bytes`), and user-registered operators. Registration is
//! scoped: the returned guard removes the entry when dropped, so tests
//! cannot leak definitions.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::sql::expr::Expr;
use crate::value::Value;

/// Builtin comparison operators, compiled with full column context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Like,
    NotLike,
    Matches,
    Is,
    IsNot,
    Has,
}

/// Builtin scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Length,
    Double,
    Binary,
}

/// A user-registered operator: receives the column clause and the bound
/// value, returns the condition expression.
pub type CustomBuilder = Arc<dyn Fn(Expr, &Value) -> Result<Expr> + Send + Sync>;

/// What a registry entry does when compiled.
#[derive(Clone)]
pub enum FunctionKind {
    Operator(Builtin),
    Scalar(Scalar),
    /// Unwraps a codec marker by extending the JSON path.
    JsonUnwrap(&'static str),
    Custom(CustomBuilder),
}

impl std::fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Operator(op) => write!(f, "Operator({op:?})"),
            FunctionKind::Scalar(scalar) => write!(f, "Scalar({scalar:?})"),
            FunctionKind::JsonUnwrap(key) => write!(f, "JsonUnwrap({key})"),
            FunctionKind::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// How a condition renders in filter strings and error messages: an
/// infix symbol, or a full template with `{selector}`/`{value}` holes.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    Infix(String),
    Full(String),
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub template: Option<Template>,
    pub kind: FunctionKind,
}

static REGISTRY: Lazy<RwLock<IndexMap<String, FunctionDef>>> = Lazy::new(|| {
    let mut registry = IndexMap::new();
    let operators: &[(&str, &str, Builtin)] = &[
        ("eq", "==", Builtin::Eq),
        ("ne", "!=", Builtin::Ne),
        ("lt", "<", Builtin::Lt),
        ("le", "<=", Builtin::Le),
        ("gt", ">", Builtin::Gt),
        ("ge", ">=", Builtin::Ge),
        ("in", "in", Builtin::In),
        ("not_in", "not in", Builtin::NotIn),
        ("contains", "contains", Builtin::Contains),
        ("startswith", "starts with", Builtin::StartsWith),
        ("endswith", "ends with", Builtin::EndsWith),
        ("like", "like", Builtin::Like),
        ("not_like", "not like", Builtin::NotLike),
        ("matches", "matches", Builtin::Matches),
        ("is", "is", Builtin::Is),
        ("is_not", "is not", Builtin::IsNot),
        ("has", "has", Builtin::Has),
    ];
    for (name, symbol, builtin) in operators {
        registry.insert(
            name.to_string(),
            FunctionDef {
                name: name.to_string(),
                template: Some(Template::Infix(symbol.to_string())),
                kind: FunctionKind::Operator(*builtin),
            },
        );
    }
    let scalars: &[(&str, Scalar)] = &[
        ("length", Scalar::Length),
        ("double", Scalar::Double),
        ("binary", Scalar::Binary),
    ];
    for (name, scalar) in scalars {
        registry.insert(
            name.to_string(),
            FunctionDef {
                name: name.to_string(),
                template: None,
                kind: FunctionKind::Scalar(*scalar),
            },
        );
    }
    registry.insert(
        "datetime".to_string(),
        FunctionDef {
            name: "datetime".to_string(),
            template: None,
            kind: FunctionKind::JsonUnwrap("datetime"),
        },
    );
    registry.insert(
        "bytes".to_string(),
        FunctionDef {
            name: "bytes".to_string(),
            template: None,
            kind: FunctionKind::JsonUnwrap("bytes"),
        },
    );
    RwLock::new(registry)
});

/// Look up a registry entry by name.
pub fn lookup(name: &str) -> Option<FunctionDef> {
    REGISTRY.read().expect("function registry poisoned").get(name).cloned()
}

/// Whether `name` detaches from a path key as a comparison operator.
pub fn is_operator(name: &str) -> bool {
    matches!(
        lookup(name).map(|def| def.kind),
        Some(FunctionKind::Operator(_)) | Some(FunctionKind::Custom(_))
    )
}

/// Whether `name` applies to a path as a function-chain step.
pub fn is_function(name: &str) -> bool {
    matches!(
        lookup(name).map(|def| def.kind),
        Some(FunctionKind::Scalar(_)) | Some(FunctionKind::JsonUnwrap(_))
    )
}

/// Register a custom operator.
///
/// `template` is either an infix symbol (`"->"`) or a full rendering
/// template containing `{selector}` (and `{value}` unless the operator
/// is unary). The returned guard deregisters on drop.
pub fn register(
    name: impl Into<String>,
    template: impl Into<String>,
    builder: impl Fn(Expr, &Value) -> Result<Expr> + Send + Sync + 'static,
) -> Result<FunctionGuard> {
    let name = name.into();
    let template = template.into();
    let template = if template.contains("{selector}") {
        Template::Full(template)
    } else {
        Template::Infix(template)
    };
    let mut registry = REGISTRY.write().expect("function registry poisoned");
    if registry.contains_key(&name) {
        return Err(Error::invalid(format!("function '{name}' already exists")));
    }
    registry.insert(
        name.clone(),
        FunctionDef {
            name: name.clone(),
            template: Some(template),
            kind: FunctionKind::Custom(Arc::new(builder)),
        },
    );
    Ok(FunctionGuard { name })
}

/// Removes its registration when dropped.
#[derive(Debug)]
pub struct FunctionGuard {
    name: String,
}

impl FunctionGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FunctionGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = REGISTRY.write() {
            registry.shift_remove(&self.name);
        }
    }
}

/// Render a condition for filter strings: `"n > 4"`, `"n -> 5"`,
/// `"n:even"`. Unknown operators fall back to the name as symbol.
pub fn render_condition(operator: &str, selector: &str, value: &Value) -> String {
    match lookup(operator).and_then(|def| def.template) {
        Some(Template::Infix(symbol)) => {
            format!("{selector} {symbol} {}", value.display())
        }
        Some(Template::Full(template)) => {
            let rendered = template.replace("{selector}", selector);
            if rendered.contains("{value}") {
                rendered.replace("{value}", &value.display())
            } else {
                rendered
            }
        }
        None => format!("{selector} {operator} {}", value.display()),
    }
}
