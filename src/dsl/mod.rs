//! The user-facing query surface: path parsing, filter trees, selector
//! expressions, and the operator/function registry.

pub mod filter;
pub mod functions;
pub mod path;
pub mod selector;

pub use filter::{q, Leaf, Query};
pub use functions::{register, FunctionGuard};
pub use path::{ParsedPath, PathMode, Terminal};
pub use selector::{col, ArithOp, Selector};
