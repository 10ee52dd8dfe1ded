//! Pipeline variables and macro expansion.
//!
//! - [`VariableStore`] - job-scoped variables with sticky secret flags
//! - [`Variable`] / [`VariableValue`] - variable records
//! - [`VariableScope`] - variables that disappear when the scope is dropped
//! - [`names`] - well-known variable names and macro delimiters
//!
//! Values may reference other variables using `$(name)`. Expansion is
//! explicit: mutate with `set`/`unset`, then call
//! [`VariableStore::recalculate_expanded`].

pub mod expansion;
pub mod names;
pub mod scope;
pub mod store;
pub mod variable;

pub use expansion::substitute;
pub use scope::VariableScope;
pub use store::VariableStore;
pub use variable::{Variable, VariableValue};
