//! Per-component Luau VM with memory and time limits.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use mlua::{Lua, Table, Value, VmState};

/// Default VM heap limit: 8 MB.
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

/// Default time budget for one evaluation or render pass.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(250);

/// Language intrinsics copied into component scope.
///
/// Pure value computation only; nothing here reaches the host.
pub const INTRINSICS: &[&str] = &[
    "assert", "error", "ipairs", "next", "pairs", "pcall", "select", "tonumber", "tostring",
    "type", "unpack", "math", "string", "table", "utf8",
];

/// Resource limits applied to every component VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Heap limit in bytes
    pub memory_bytes: usize,

    /// Wall-clock budget for a single evaluation, render pass or handler call
    pub time_budget: Duration,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }
}

/// A Luau state whose interrupt aborts scripts that overrun the budget.
pub struct Sandbox {
    lua: Lua,
    deadline: Arc<Mutex<Option<Instant>>>,
    budget: Duration,
}

impl Sandbox {
    /// Create a fresh VM with the given limits.
    pub fn new(limits: &SandboxLimits) -> mlua::Result<Self> {
        let lua = Lua::new();
        lua.set_memory_limit(limits.memory_bytes)?;

        let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let check = Arc::clone(&deadline);
        lua.set_interrupt(move |_| {
            let expired = check
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some_and(|at| Instant::now() >= at);
            if expired {
                return Err(mlua::Error::RuntimeError(
                    "script exceeded its time budget".to_string(),
                ));
            }
            Ok(VmState::Continue)
        });

        Ok(Self {
            lua,
            deadline,
            budget: limits.time_budget,
        })
    }

    /// The underlying Lua state.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// A fresh environment table holding only [`INTRINSICS`].
    pub fn scope(&self) -> mlua::Result<Table> {
        let globals = self.lua.globals();
        let env = self.lua.create_table()?;
        for name in INTRINSICS {
            let value: Value = globals.raw_get(*name)?;
            if !value.is_nil() {
                env.raw_set(*name, value)?;
            }
        }
        Ok(env)
    }

    /// Run `f` with the time budget armed.
    pub fn with_budget<R, E>(&self, f: impl FnOnce(&Lua) -> Result<R, E>) -> Result<R, E> {
        self.set_deadline(Some(Instant::now() + self.budget));
        let result = f(&self.lua);
        self.set_deadline(None);
        result
    }

    fn set_deadline(&self, at: Option<Instant>) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}
