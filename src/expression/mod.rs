//! Inline expressions
//!
//! Small infix language used by configuration section headers and by inline
//! boolean checks:
//!
//! ```text
//! ($user.level >= 3 || @is_admin) && $request.path <> '/login' as privileged
//! ```
//!
//! - `$path` reads a dotted path from the `EvalContext` state
//! - `@name` calls a registered zero-argument callback
//! - everything else is a literal (`true`, `42`, `'quoted text'`, `word`)
//!
//! Unresolvable variables and callbacks evaluate to `null`; malformed
//! expressions evaluate to `null` through `evaluate` and to an error through
//! `try_evaluate`.

mod context;
mod evaluator;
mod tokenizer;

pub use context::{ContextCallback, EvalContext, CALLBACK_SIGIL, VARIABLE_SIGIL};
pub use evaluator::{Evaluation, ExpressionEvaluator};
pub use tokenizer::{Operator, Token, Tokenizer};
