//! Hook state for mounted component trees.
//!
//! Each component instance is keyed by its position in the tree. Hooks are
//! resolved by call order within that instance, the same contract React
//! components are written against. Lua is never called while the state lock
//! is held: values are copied out, compared and written back.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlua::{Function, Lua, Table, Value};

#[derive(Clone)]
enum Slot {
    State(Value),
    Reducer { state: Value, reducer: Function },
    Ref(Table),
    Memo { value: Value, deps: Option<Vec<Value>> },
    Effect { deps: Option<Vec<Value>> },
}

/// An effect whose dependencies changed during the last render pass.
pub(crate) struct PendingEffect {
    pub key: String,
    pub index: usize,
    pub callback: Function,
}

#[derive(Default)]
struct HookState {
    slots: HashMap<String, Vec<Slot>>,
    frame: Option<(String, usize)>,
    rendered: HashSet<String>,
    cleanups: HashMap<(String, usize), Function>,
    pending: Vec<PendingEffect>,
    dirty: bool,
}

/// Shared hook storage for one component VM.
#[derive(Clone, Default)]
pub struct Hooks {
    state: Arc<Mutex<HookState>>,
}

impl Hooks {
    fn lock(&self) -> MutexGuard<'_, HookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop all instance state, returning the cleanups still registered.
    pub(crate) fn reset(&self) -> Vec<Function> {
        let mut state = self.lock();
        let cleanups = state.cleanups.drain().map(|(_, f)| f).collect();
        *state = HookState::default();
        cleanups
    }

    pub(crate) fn begin_pass(&self) {
        let mut state = self.lock();
        state.rendered.clear();
        state.frame = None;
        state.dirty = false;
    }

    pub(crate) fn enter(&self, key: String) {
        let mut state = self.lock();
        state.rendered.insert(key.clone());
        state.frame = Some((key, 0));
    }

    pub(crate) fn exit(&self) {
        self.lock().frame = None;
    }

    /// Forget instances that were not rendered this pass.
    ///
    /// Returns the effect cleanups of the removed instances.
    pub(crate) fn finish_pass(&self) -> Vec<Function> {
        let mut state = self.lock();
        let HookState {
            slots,
            rendered,
            cleanups,
            pending,
            ..
        } = &mut *state;

        slots.retain(|key, _| rendered.contains(key));
        pending.retain(|effect| rendered.contains(&effect.key));
        let stale: Vec<(String, usize)> = cleanups
            .keys()
            .filter(|(key, _)| !rendered.contains(key))
            .cloned()
            .collect();
        stale
            .into_iter()
            .filter_map(|k| cleanups.remove(&k))
            .collect()
    }

    pub(crate) fn take_effects(&self) -> Vec<PendingEffect> {
        std::mem::take(&mut self.lock().pending)
    }

    pub(crate) fn take_cleanup(&self, key: &str, index: usize) -> Option<Function> {
        self.lock().cleanups.remove(&(key.to_string(), index))
    }

    pub(crate) fn set_cleanup(&self, key: String, index: usize, cleanup: Function) {
        self.lock().cleanups.insert((key, index), cleanup);
    }

    /// Whether state changed since the current pass began.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    fn next_slot(&self) -> mlua::Result<(String, usize)> {
        let mut state = self.lock();
        match state.frame.as_mut() {
            Some((key, cursor)) => {
                let index = *cursor;
                *cursor += 1;
                Ok((key.clone(), index))
            }
            None => Err(mlua::Error::RuntimeError(
                "Invalid hook call: hooks can only be called inside the body of a component"
                    .to_string(),
            )),
        }
    }

    fn slot(&self, key: &str, index: usize) -> Option<Slot> {
        self.lock()
            .slots
            .get(key)
            .and_then(|slots| slots.get(index))
            .cloned()
    }

    fn store(&self, key: &str, index: usize, slot: Slot) {
        let mut state = self.lock();
        let slots = state.slots.entry(key.to_string()).or_default();
        if index < slots.len() {
            slots[index] = slot;
        } else {
            slots.push(slot);
        }
    }

    /// Queue an effect, replacing one queued for the same hook by a discarded pass.
    fn queue_effect(&self, effect: PendingEffect) {
        let mut state = self.lock();
        state
            .pending
            .retain(|queued| queued.key != effect.key || queued.index != effect.index);
        state.pending.push(effect);
    }

    /// Replace a state value, marking the tree dirty when it changed.
    ///
    /// Updates aimed at instances that no longer exist are ignored.
    fn update_state(&self, key: &str, index: usize, next: Value) -> mlua::Result<()> {
        let current = match self.slot(key, index) {
            Some(Slot::State(value)) => value,
            Some(Slot::Reducer { state, .. }) => state,
            _ => return Ok(()),
        };
        if current.equals(&next)? {
            return Ok(());
        }

        let mut guard = self.lock();
        if let Some(slot) = guard.slots.get_mut(key).and_then(|s| s.get_mut(index)) {
            match slot {
                Slot::State(value) => *value = next,
                Slot::Reducer { state, .. } => *state = next,
                _ => return Ok(()),
            }
            guard.dirty = true;
        }
        Ok(())
    }

    /// Register the hook functions on a runtime table.
    pub fn install(&self, lua: &Lua, runtime: &Table) -> mlua::Result<()> {
        runtime.set("useState", self.use_state(lua)?)?;
        runtime.set("useReducer", self.use_reducer(lua)?)?;
        runtime.set("useRef", self.use_ref(lua)?)?;
        runtime.set("useMemo", self.use_memo(lua)?)?;
        runtime.set("useCallback", self.use_callback(lua)?)?;
        let use_effect = self.use_effect(lua)?;
        runtime.set("useLayoutEffect", use_effect.clone())?;
        runtime.set("useEffect", use_effect)?;
        Ok(())
    }

    fn use_state(&self, lua: &Lua) -> mlua::Result<Function> {
        let hooks = self.clone();
        lua.create_function(move |lua, initial: Value| {
            let (key, index) = hooks.next_slot()?;
            let value = match hooks.slot(&key, index) {
                Some(Slot::State(value)) => value,
                _ => {
                    let value = match initial {
                        Value::Function(init) => init.call::<Value>(())?,
                        other => other,
                    };
                    hooks.store(&key, index, Slot::State(value.clone()));
                    value
                }
            };

            let setter_hooks = hooks.clone();
            let setter = lua.create_function(move |_, next: Value| {
                let next = match next {
                    Value::Function(update) => {
                        let previous = match setter_hooks.slot(&key, index) {
                            Some(Slot::State(value)) => value,
                            _ => Value::Nil,
                        };
                        update.call::<Value>(previous)?
                    }
                    other => other,
                };
                setter_hooks.update_state(&key, index, next)
            })?;

            Ok((value, setter))
        })
    }

    fn use_reducer(&self, lua: &Lua) -> mlua::Result<Function> {
        let hooks = self.clone();
        lua.create_function(
            move |lua, (reducer, initial, init): (Function, Value, Option<Function>)| {
                let (key, index) = hooks.next_slot()?;
                let state = match hooks.slot(&key, index) {
                    Some(Slot::Reducer { state, .. }) => state,
                    _ => match init {
                        Some(init) => init.call::<Value>(initial)?,
                        None => initial,
                    },
                };
                // Keep the latest reducer so dispatch sees current closures.
                hooks.store(
                    &key,
                    index,
                    Slot::Reducer {
                        state: state.clone(),
                        reducer,
                    },
                );

                let dispatch_hooks = hooks.clone();
                let dispatch = lua.create_function(move |_, action: Value| {
                    let Some(Slot::Reducer { state, reducer }) = dispatch_hooks.slot(&key, index)
                    else {
                        return Ok(());
                    };
                    let next = reducer.call::<Value>((state, action))?;
                    dispatch_hooks.update_state(&key, index, next)
                })?;

                Ok((state, dispatch))
            },
        )
    }

    fn use_ref(&self, lua: &Lua) -> mlua::Result<Function> {
        let hooks = self.clone();
        lua.create_function(move |lua, initial: Value| {
            let (key, index) = hooks.next_slot()?;
            if let Some(Slot::Ref(table)) = hooks.slot(&key, index) {
                return Ok(table);
            }
            let table = lua.create_table()?;
            table.set("current", initial)?;
            hooks.store(&key, index, Slot::Ref(table.clone()));
            Ok(table)
        })
    }

    fn use_memo(&self, lua: &Lua) -> mlua::Result<Function> {
        let hooks = self.clone();
        lua.create_function(move |_, (factory, deps): (Function, Value)| {
            let (key, index) = hooks.next_slot()?;
            let deps = read_deps(deps)?;
            if let Some(Slot::Memo { value, deps: prev }) = hooks.slot(&key, index) {
                if deps_equal(&prev, &deps)? {
                    return Ok(value);
                }
            }
            let value = factory.call::<Value>(())?;
            hooks.store(
                &key,
                index,
                Slot::Memo {
                    value: value.clone(),
                    deps,
                },
            );
            Ok(value)
        })
    }

    fn use_callback(&self, lua: &Lua) -> mlua::Result<Function> {
        let hooks = self.clone();
        lua.create_function(move |_, (callback, deps): (Function, Value)| {
            let (key, index) = hooks.next_slot()?;
            let deps = read_deps(deps)?;
            if let Some(Slot::Memo {
                value: Value::Function(prev_fn),
                deps: prev,
            }) = hooks.slot(&key, index)
            {
                if deps_equal(&prev, &deps)? {
                    return Ok(prev_fn);
                }
            }
            hooks.store(
                &key,
                index,
                Slot::Memo {
                    value: Value::Function(callback.clone()),
                    deps,
                },
            );
            Ok(callback)
        })
    }

    fn use_effect(&self, lua: &Lua) -> mlua::Result<Function> {
        let hooks = self.clone();
        lua.create_function(move |_, (callback, deps): (Function, Value)| {
            let (key, index) = hooks.next_slot()?;
            let deps = read_deps(deps)?;
            if let Some(Slot::Effect { deps: prev }) = hooks.slot(&key, index) {
                if deps_equal(&prev, &deps)? {
                    return Ok(());
                }
            }
            hooks.store(&key, index, Slot::Effect { deps });
            hooks.queue_effect(PendingEffect {
                key,
                index,
                callback,
            });
            Ok(())
        })
    }
}

fn read_deps(deps: Value) -> mlua::Result<Option<Vec<Value>>> {
    match deps {
        Value::Nil => Ok(None),
        Value::Table(table) => table
            .sequence_values::<Value>()
            .collect::<mlua::Result<Vec<_>>>()
            .map(Some),
        other => Err(mlua::Error::RuntimeError(format!(
            "hook dependencies must be an array, got {}",
            other.type_name()
        ))),
    }
}

/// Missing dependency lists never match, so the hook reruns every render.
fn deps_equal(prev: &Option<Vec<Value>>, next: &Option<Vec<Value>>) -> mlua::Result<bool> {
    match (prev, next) {
        (Some(prev), Some(next)) if prev.len() == next.len() => {
            for (a, b) in prev.iter().zip(next) {
                if !a.equals(b)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(lua: &Lua, hooks: &Hooks) -> Table {
        let table = lua.create_table().unwrap();
        hooks.install(lua, &table).unwrap();
        lua.globals().set("R", table.clone()).unwrap();
        table
    }

    #[test]
    fn state_persists_across_passes() {
        let lua = Lua::new();
        let hooks = Hooks::default();
        runtime(&lua, &hooks);
        let render: Function = lua
            .load(
                "return function()
                    local n, setN = R.useState(1)
                    return n, setN
                end",
            )
            .eval()
            .unwrap();

        hooks.begin_pass();
        hooks.enter("root".into());
        let (n, set_n): (i64, Function) = render.call(()).unwrap();
        hooks.exit();
        assert_eq!(n, 1);
        assert!(!hooks.is_dirty());

        set_n.call::<()>(5).unwrap();
        assert!(hooks.is_dirty());

        hooks.begin_pass();
        hooks.enter("root".into());
        let (n, _): (i64, Function) = render.call(()).unwrap();
        hooks.exit();
        assert_eq!(n, 5);
    }

    #[test]
    fn setting_equal_state_is_not_dirty() {
        let lua = Lua::new();
        let hooks = Hooks::default();
        runtime(&lua, &hooks);
        let render: Function = lua
            .load("return function() local v, set = R.useState('a') return set end")
            .eval()
            .unwrap();

        hooks.begin_pass();
        hooks.enter("root".into());
        let set: Function = render.call(()).unwrap();
        hooks.exit();

        set.call::<()>("a").unwrap();
        assert!(!hooks.is_dirty());
    }

    #[test]
    fn hooks_outside_render_fail() {
        let lua = Lua::new();
        let hooks = Hooks::default();
        runtime(&lua, &hooks);
        let err = lua.load("R.useState(0)").exec().unwrap_err();
        assert!(err.to_string().contains("Invalid hook call"));
    }

    #[test]
    fn effects_queue_only_when_deps_change() {
        let lua = Lua::new();
        let hooks = Hooks::default();
        runtime(&lua, &hooks);
        let render: Function = lua
            .load("return function(dep) R.useEffect(function() end, { dep }) end")
            .eval()
            .unwrap();

        for (dep, expected) in [(1, 1), (1, 0), (2, 1)] {
            hooks.begin_pass();
            hooks.enter("root".into());
            render.call::<()>(dep).unwrap();
            hooks.exit();
            assert_eq!(hooks.take_effects().len(), expected, "dep {dep}");
        }
    }

    #[test]
    fn unrendered_instances_are_dropped() {
        let lua = Lua::new();
        let hooks = Hooks::default();
        runtime(&lua, &hooks);
        let cleanup = lua.create_function(|_, ()| Ok(())).unwrap();

        hooks.begin_pass();
        hooks.enter("a".into());
        hooks.exit();
        hooks.set_cleanup("a".into(), 0, cleanup);
        assert!(hooks.finish_pass().is_empty());

        hooks.begin_pass();
        assert_eq!(hooks.finish_pass().len(), 1);
    }

    #[test]
    fn reducer_dispatch_updates_state() {
        let lua = Lua::new();
        let hooks = Hooks::default();
        runtime(&lua, &hooks);
        let render: Function = lua
            .load(
                "return function()
                    return R.useReducer(function(s, a) return s + a end, 10)
                end",
            )
            .eval()
            .unwrap();

        hooks.begin_pass();
        hooks.enter("root".into());
        let (_, dispatch): (i64, Function) = render.call(()).unwrap();
        hooks.exit();
        dispatch.call::<()>(5).unwrap();

        hooks.begin_pass();
        hooks.enter("root".into());
        let (state, _): (i64, Function) = render.call(()).unwrap();
        hooks.exit();
        assert_eq!(state, 15);
    }
}
