//! Policy-driven interception
//!
//! Declarative statements that rewire named extension points at run time:
//! remove their callbacks, override their result, merge into it, or narrow
//! it with a `&:filter(...)` expression.
//!
//! Loading validates each statement (`parse_statements_with` reports unknown
//! effects and bad filters to a diagnostics sink and skips only the
//! offending statement); evaluation is lenient (a response that cannot be
//! applied leaves the chain value unchanged).

mod engine;
mod filter;
mod statement;

pub use engine::{InterceptionRegistration, PolicyEngine};
pub use filter::{is_filter, Filter, FilterParser, Response};
pub use statement::{
    parse_statements, parse_statements_with, Effect, PolicyStatement, Priority, StatementParser,
    Target,
};
