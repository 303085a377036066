//! JavaScript runtime using QuickJS via rquickjs
//!
//! Every evaluation gets a fresh `Context`, so nothing a script does can
//! leak into the next one. Only the engine intrinsics are global; the host
//! assertion helpers reach the bridge as an argument.

use rquickjs::{CatchResultExt, Context, Ctx, Function, Object, Runtime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::assert;
use crate::errors::ScriptError;

const PRELUDE: &str = include_str!("prelude.js");

/// Resource bounds for a single script evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Wall-clock budget, enforced through the interrupt handler
    pub timeout: Duration,
    /// Heap limit in bytes
    pub memory_limit: usize,
    /// Stack limit in bytes
    pub max_stack_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            memory_limit: 32 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

/// JavaScript script engine powered by QuickJS
pub struct JsScriptEngine {
    runtime: Runtime,
    limits: ScriptLimits,
    timed_out: Arc<AtomicBool>,
}

impl JsScriptEngine {
    /// Create a new JavaScript engine
    pub fn new(limits: ScriptLimits) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()
            .map_err(|e| ScriptError::Engine(format!("Failed to create JS runtime: {}", e)))?;

        runtime.set_memory_limit(limits.memory_limit);
        runtime.set_max_stack_size(limits.max_stack_size);

        Ok(Self {
            runtime,
            limits,
            timed_out: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run `source` against the JSON `message` and return the JSON reply.
    ///
    /// Blocks the calling thread until the script finishes or its deadline
    /// passes.
    pub fn evaluate(&self, source: &str, message: &str) -> Result<String, ScriptError> {
        self.arm_deadline();
        let context = Context::full(&self.runtime)
            .map_err(|e| ScriptError::Engine(format!("Failed to create JS context: {}", e)))?;

        context.with(|ctx| {
            let (compile, run) = self.bridge(&ctx)?;

            let script: Function = compile
                .call((source,))
                .catch(&ctx)
                .map_err(|e| self.classify(ScriptError::Compile(e.to_string())))?;

            let host = assert::module(&ctx)?;
            run.call::<_, String>((script, message, host))
                .catch(&ctx)
                .map_err(|e| self.classify(ScriptError::Runtime(e.to_string())))
        })
    }

    /// Compile/validate JavaScript code without executing
    pub fn compile(&self, source: &str) -> Result<(), ScriptError> {
        self.arm_deadline();
        let context = Context::full(&self.runtime)
            .map_err(|e| ScriptError::Engine(format!("Failed to create JS context: {}", e)))?;

        context.with(|ctx| {
            let (compile, _) = self.bridge(&ctx)?;
            compile
                .call::<_, Function>((source,))
                .catch(&ctx)
                .map(|_| ())
                .map_err(|e| ScriptError::Compile(e.to_string()))
        })
    }

    fn bridge<'js>(&self, ctx: &Ctx<'js>) -> Result<(Function<'js>, Function<'js>), ScriptError> {
        let bridge: Object = ctx
            .eval(PRELUDE)
            .catch(ctx)
            .map_err(|e| ScriptError::Engine(format!("Failed to load sandbox bridge: {}", e)))?;
        Ok((bridge.get("compile")?, bridge.get("run")?))
    }

    fn arm_deadline(&self) {
        self.timed_out.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + self.limits.timeout;
        let timed_out = Arc::clone(&self.timed_out);
        self.runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                timed_out.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        })));
    }

    /// An interrupted script surfaces as an exception; report it as a timeout
    fn classify(&self, err: ScriptError) -> ScriptError {
        if self.timed_out.load(Ordering::SeqCst) {
            ScriptError::Timeout(self.limits.timeout)
        } else {
            err
        }
    }
}
