//! The scope store (§4.C): a stack of scopes plus the global, static, and
//! impl-static storage tiers variable lookup falls through to.

use crate::value::{FunctionPointerValue, Variable};
use std::collections::HashMap;

/// One stack frame's worth of bindings.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    pub variables: HashMap<String, Variable>,
    pub function_pointers: HashMap<String, FunctionPointerValue>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }
}

/// Stacked scopes plus the three persistent storage tiers the spec
/// describes: global (index 0, permanent), static (keyed by a
/// caller-supplied qualified name so that `static int n` in function `f`
/// and in function `g` don't collide), and impl-static (keyed by
/// `"{struct}::{interface}::{name}"`).
pub struct ScopeStack {
    scopes: Vec<Scope>,
    statics: HashMap<String, Variable>,
    impl_statics: HashMap<String, Variable>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope::new()],
            statics: HashMap::new(),
            impl_statics: HashMap::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
        tracing::trace!(depth = self.scopes.len(), "scope pushed");
    }

    /// Drops the top scope. Never removes the global scope (index 0),
    /// matching the contract in §4.C; calling this at depth 0 is logged
    /// and otherwise a no-op.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() <= 1 {
            tracing::warn!("pop_scope called with only the global scope present; ignored");
            return;
        }
        self.scopes.pop();
        tracing::trace!(depth = self.scopes.len(), "scope popped");
    }

    pub fn current_scope(&self) -> &Scope {
        self.scopes.last().expect("global scope is always present")
    }

    pub fn current_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("global scope is always present")
    }

    pub fn global_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn global_scope_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Swaps out every scope above the global one and pushes a fresh frame
    /// for a function call, returning the displaced frames so the caller's
    /// locals can be restored by `exit_function_scope` once the call
    /// returns. The global scope (index 0) and the static/impl-static tiers
    /// stay untouched, so a called function still sees globals, statics,
    /// and impl-statics (§4.C Lifecycles) instead of losing them the way a
    /// full `ScopeStack` replacement would.
    pub fn enter_function_scope(&mut self) -> Vec<Scope> {
        let saved = self.scopes.split_off(1);
        self.scopes.push(Scope::new());
        saved
    }

    /// Restores the caller's frames displaced by `enter_function_scope`.
    pub fn exit_function_scope(&mut self, saved: Vec<Scope>) {
        self.scopes.truncate(1);
        self.scopes.extend(saved);
    }

    /// Searches scopes top -> bottom, then statics, then impl-statics.
    /// (The global scope is scope index 0, already included in the
    /// top->bottom scan, so it needs no separate step.)
    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.variables.get(name) {
                return Some(v);
            }
        }
        if let Some(v) = self.statics.get(name) {
            return Some(v);
        }
        self.impl_statics.get(name)
    }

    pub fn find_variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        for scope in self.scopes.iter_mut().rev() {
            if scope.variables.contains_key(name) {
                return scope.variables.get_mut(name);
            }
        }
        if self.statics.contains_key(name) {
            return self.statics.get_mut(name);
        }
        if self.impl_statics.contains_key(name) {
            return self.impl_statics.get_mut(name);
        }
        None
    }

    /// True iff `name` resolves only in the global scope (not shadowed by
    /// an inner scope, and not a static/impl-static).
    pub fn is_global(&self, name: &str) -> bool {
        for scope in self.scopes.iter().skip(1).rev() {
            if scope.variables.contains_key(name) {
                return false;
            }
        }
        self.scopes[0].variables.contains_key(name)
    }

    pub fn declare_in_current(&mut self, name: impl Into<String>, var: Variable) {
        self.current_scope_mut().variables.insert(name.into(), var);
    }

    pub fn declare_global(&mut self, name: impl Into<String>, var: Variable) {
        self.global_scope_mut().variables.insert(name.into(), var);
    }

    /// Declares a static variable under `key` only if it doesn't already
    /// exist — statics are "initialized on first declaration and never
    /// re-initialized" (spec Lifecycles).
    pub fn declare_static_once(&mut self, key: impl Into<String>, make: impl FnOnce() -> Variable) {
        let key = key.into();
        self.statics.entry(key).or_insert_with(make);
    }

    pub fn find_static(&self, key: &str) -> Option<&Variable> {
        self.statics.get(key)
    }

    pub fn find_static_mut(&mut self, key: &str) -> Option<&mut Variable> {
        self.statics.get_mut(key)
    }

    pub fn declare_impl_static_once(
        &mut self,
        key: impl Into<String>,
        make: impl FnOnce() -> Variable,
    ) {
        let key = key.into();
        self.impl_statics.entry(key).or_insert_with(make);
    }

    pub fn find_impl_static(&self, key: &str) -> Option<&Variable> {
        self.impl_statics.get(key)
    }

    pub fn find_impl_static_mut(&mut self, key: &str) -> Option<&mut Variable> {
        self.impl_statics.get_mut(key)
    }

    pub fn register_function_pointer(&mut self, name: impl Into<String>, fp: FunctionPointerValue) {
        self.current_scope_mut().function_pointers.insert(name.into(), fp);
    }

    /// Searches local -> parent -> global for a function pointer, per the
    /// contract for replicating function-pointer parameters into a callee
    /// scope (§4.H `assign_function_parameter`).
    pub fn find_function_pointer(&self, name: &str) -> Option<&FunctionPointerValue> {
        for scope in self.scopes.iter().rev() {
            if let Some(fp) = scope.function_pointers.get(name) {
                return Some(fp);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::types::TypeInfo;

    #[test]
    fn global_scope_survives_excess_pops() {
        let mut s = ScopeStack::new();
        s.pop_scope();
        s.pop_scope();
        assert_eq!(s.depth(), 1);
    }

    #[test]
    fn lookup_falls_through_stack_then_statics() {
        let mut s = ScopeStack::new();
        s.declare_static_once("f::counter", || Variable::new_scalar(TypeInfo::Int));
        s.push_scope();
        assert!(s.find_variable("f::counter").is_some());
    }

    #[test]
    fn inner_scope_shadows_global() {
        let mut s = ScopeStack::new();
        s.declare_global("x", Variable::new_scalar(TypeInfo::Int));
        s.push_scope();
        let mut inner = Variable::new_scalar(TypeInfo::Int);
        inner.value = 42;
        s.declare_in_current("x", inner);
        assert_eq!(s.find_variable("x").unwrap().value, 42);
        assert!(!s.is_global("x"));
    }

    #[test]
    fn function_scope_keeps_globals_and_statics_reachable() {
        let mut s = ScopeStack::new();
        s.declare_global("g", Variable::new_scalar(TypeInfo::Int));
        s.declare_static_once("f::n", || Variable::new_scalar(TypeInfo::Int));
        s.push_scope();
        let mut local = Variable::new_scalar(TypeInfo::Int);
        local.value = 7;
        s.declare_in_current("caller_local", local);

        let saved = s.enter_function_scope();
        assert!(s.find_variable("g").is_some());
        assert!(s.find_variable("f::n").is_some());
        assert!(s.find_variable("caller_local").is_none());
        s.declare_in_current("param", Variable::new_scalar(TypeInfo::Int));

        s.exit_function_scope(saved);
        assert!(s.find_variable("caller_local").is_some());
        assert!(s.find_variable("param").is_none());
    }

    #[test]
    fn static_initialized_once() {
        let mut s = ScopeStack::new();
        s.declare_static_once("f::n", || {
            let mut v = Variable::new_scalar(TypeInfo::Int);
            v.value = 1;
            v
        });
        s.declare_static_once("f::n", || {
            let mut v = Variable::new_scalar(TypeInfo::Int);
            v.value = 999;
            v
        });
        assert_eq!(s.find_static("f::n").unwrap().value, 1);
    }
}
