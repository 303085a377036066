//! JavaScript scripting support via QuickJS (rquickjs)

mod assert;
mod runtime;

pub use runtime::{JsScriptEngine, ScriptLimits};
