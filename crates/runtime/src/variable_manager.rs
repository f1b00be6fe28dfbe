//! Variable manager (§4.H), grounded in
//! `examples/original_source/.../managers/variables/{declaration,assignment}.cpp`:
//! declaration, assignment, parameter binding, and the union/interface
//! assignment paths that route through the struct and type managers.

use crate::scope::ScopeStack;
use crate::struct_manager::StructManager;
use crate::type_manager::TypeManager;
use crate::typed_value::TypedValue;
use crate::value::Variable;
use cb_core::error::{CbError, CbResult};
use cb_core::types::TypeInfo;

pub struct VariableManager;

impl VariableManager {
    /// Declares `name` in the global scope. Fails on redeclaration — the
    /// spec treats a duplicate top-level declaration as a declaration
    /// error, not a silent shadow.
    pub fn declare_global_variable(scope: &mut ScopeStack, name: &str, var: Variable) -> CbResult<()> {
        if scope.global_scope().variables.contains_key(name) {
            return Err(CbError::declaration(format!(
                "global variable '{name}' is already declared"
            )));
        }
        scope.declare_global(name, var);
        tracing::debug!(variable = name, "global variable created");
        Ok(())
    }

    /// Declares `name` in the current (innermost) scope. Shadowing an outer
    /// variable is legal, so no duplicate check beyond the current scope.
    pub fn declare_local_variable(scope: &mut ScopeStack, name: &str, var: Variable) {
        scope.declare_in_current(name, var);
        tracing::debug!(variable = name, "local variable created");
    }

    /// A combined `var x = expr;` / `var x;` path: when `initial` is
    /// `None`, the declared variable keeps its zero/empty default; when
    /// `Some`, the initial value is routed through `assign_variable` so
    /// range checks, unsigned clamping, and union/struct sync all apply
    /// uniformly to both forms.
    pub fn process_var_decl_or_assign(
        scope: &mut ScopeStack,
        types: &TypeManager,
        structs: &StructManager,
        name: &str,
        mut declared: Variable,
        initial: Option<TypedValue>,
        is_local: bool,
    ) -> CbResult<()> {
        if is_local {
            VariableManager::declare_local_variable(scope, name, declared.clone());
        } else {
            VariableManager::declare_global_variable(scope, name, declared.clone())?;
        }
        if let Some(value) = initial {
            VariableManager::assign_variable(scope, types, structs, name, value, None)?;
        } else if declared.is_struct {
            // struct-typed declarations with no initializer still need their
            // flat mirror populated so member access works immediately.
            declared.is_assigned = true;
            structs.sync_direct_access_from_struct_value(scope, name, &declared);
        }
        Ok(())
    }

    /// The central assignment path. Honors `const` (once assigned), follows
    /// reference variables to their referent, routes struct values through
    /// `sync_direct_access_from_struct_value`, clamps unsigned targets, and
    /// range-checks everything except pointer/pointer-array targets.
    pub fn assign_variable(
        scope: &mut ScopeStack,
        types: &TypeManager,
        structs: &StructManager,
        name: &str,
        value: TypedValue,
        type_hint: Option<&str>,
    ) -> CbResult<()> {
        let target_name = VariableManager::resolve_reference_target(scope, name);

        {
            let existing = scope
                .find_variable(&target_name)
                .ok_or_else(|| CbError::access(format!("undefined variable '{target_name}'")))?;
            if existing.is_assigned && existing.qualifiers.is_const {
                return Err(CbError::type_violation(format!(
                    "'{target_name}' is const and cannot be reassigned"
                )));
            }
            if let Some(alias) = type_hint {
                if types.is_union_alias(alias) && !types.is_value_allowed_for_union(alias, &value) {
                    return Err(CbError::type_violation(format!(
                        "value of type {} is not a member of union '{alias}'",
                        value.variable.var_type
                    )));
                }
            }
        }

        let mut new_value = value.variable;
        let target_type = scope.find_variable(&target_name).unwrap().var_type.clone();
        let is_unsigned = scope.find_variable(&target_name).unwrap().qualifiers.is_unsigned;

        if new_value.is_struct {
            new_value.is_assigned = true;
            let stored = new_value.clone();
            *scope
                .find_variable_mut(&target_name)
                .expect("checked present above") = new_value;
            structs.sync_direct_access_from_struct_value(scope, &target_name, &stored);
            return Ok(());
        }

        if target_type.is_numeric() && !target_type.is_float() {
            let (clamped, warned) = crate::numeric::clamp_unsigned(new_value.value, is_unsigned);
            if warned {
                tracing::warn!(variable = %target_name, "negative value clamped to 0 for unsigned target");
            }
            new_value.value = clamped;
            types.check_type_range(&target_type, clamped, &target_name, is_unsigned)?;
        }

        new_value.is_assigned = true;
        new_value.var_type = target_type;
        *scope
            .find_variable_mut(&target_name)
            .expect("checked present above") = new_value;
        Ok(())
    }

    /// Binds a call argument into the callee's freshly pushed scope. Value
    /// parameters get a deep clone (structs included); reference parameters
    /// alias the caller's variable by re-declaring it under the parameter
    /// name with the same value, relying on `resolve_reference_target` to
    /// chase the alias back to the caller's storage on later writes.
    pub fn assign_function_parameter(
        caller: &ScopeStack,
        callee: &mut ScopeStack,
        caller_arg_name: &str,
        param_name: &str,
        is_reference: bool,
    ) -> CbResult<()> {
        let arg = caller
            .find_variable(caller_arg_name)
            .ok_or_else(|| CbError::access(format!("undefined variable '{caller_arg_name}'")))?
            .clone();
        if is_reference {
            callee.declare_in_current(format!("&{param_name}"), arg.clone());
            callee.declare_in_current(param_name, arg);
        } else if let Some(fp) = caller.find_function_pointer(caller_arg_name) {
            callee.register_function_pointer(param_name, fp.clone());
            callee.declare_in_current(param_name, arg);
        } else {
            callee.declare_in_current(param_name, arg);
        }
        Ok(())
    }

    /// Array parameters are always passed by reference to the backing
    /// storage (Cb has no array value semantics at the call boundary): the
    /// callee's name is just another alias for the same `Variable`.
    pub fn assign_array_parameter(
        caller: &ScopeStack,
        callee: &mut ScopeStack,
        caller_arg_name: &str,
        param_name: &str,
    ) -> CbResult<()> {
        let arg = caller
            .find_variable(caller_arg_name)
            .ok_or_else(|| CbError::access(format!("undefined variable '{caller_arg_name}'")))?;
        if arg.array.is_none() {
            return Err(CbError::type_violation(format!(
                "'{caller_arg_name}' is not an array"
            )));
        }
        callee.declare_in_current(format!("&{param_name}"), arg.clone());
        callee.declare_in_current(param_name, arg.clone());
        Ok(())
    }

    /// Builds and binds an interface-view copy of `source_name` under
    /// `target_name` (delegates the actual view construction to the
    /// interface manager; this just performs the declaration step).
    pub fn assign_interface_view(scope: &mut ScopeStack, target_name: &str, view: Variable) {
        scope.declare_in_current(target_name, view);
    }

    /// Assigns a value into a union-typed variable after checking the
    /// union's allow-set, recording which concrete type is currently active
    /// (`current_union_variant`) for later narrowing reads.
    pub fn assign_union_value(
        scope: &mut ScopeStack,
        types: &TypeManager,
        union_alias: &str,
        name: &str,
        value: TypedValue,
    ) -> CbResult<()> {
        if !types.is_value_allowed_for_union(union_alias, &value) {
            return Err(CbError::type_violation(format!(
                "value of type {} is not a member of union '{union_alias}'",
                value.variable.var_type
            )));
        }
        let mut var = value.variable;
        var.union_type_name = union_alias.to_string();
        var.current_union_variant = Some(var.var_type.clone());
        var.is_assigned = true;
        scope.declare_in_current(name, var);
        Ok(())
    }

    /// Chases a general local reference declaration (`T& r = x;`, see
    /// `Engine::execute_reference_var_decl`) back to its referent's scope
    /// key, following the chain far enough to cover a reference bound to
    /// another reference. A plain (non-reference) name resolves to itself.
    /// Reference *parameters* are handled separately by `call_function`'s
    /// copy-in/write-back, not through this alias chain.
    pub fn resolve_reference_target(scope: &ScopeStack, name: &str) -> String {
        let mut current = name.to_string();
        let mut seen = std::collections::HashSet::new();
        while let Some(var) = scope.find_variable(&current) {
            let Some(target) = var.reference_target.clone() else {
                break;
            };
            if !seen.insert(current.clone()) {
                break;
            }
            current = target;
        }
        current
    }

    /// Reads `name` for use in an expression, routed through
    /// `resolve_reference_target` so a reference parameter reads through to
    /// its referent the same way a plain local or a static does. The single
    /// entry point callers should use instead of calling
    /// `ScopeStack::find_variable` directly when `name` might be a
    /// reference.
    pub fn read_lvalue<'a>(scope: &'a ScopeStack, name: &str) -> CbResult<&'a Variable> {
        let target = VariableManager::resolve_reference_target(scope, name);
        scope
            .find_variable(&target)
            .ok_or_else(|| CbError::access(format!("undefined variable '{target}'")))
    }

    /// The write counterpart of `read_lvalue`: overwrites whatever storage
    /// `name` resolves to, wholesale (no range checks, no union/struct
    /// sync — callers that need those go through `assign_variable`
    /// instead; this is for call sites that already hold a fully-formed
    /// `Variable`, such as write-back after a call returns).
    pub fn write_lvalue(scope: &mut ScopeStack, name: &str, value: Variable) -> CbResult<()> {
        let target = VariableManager::resolve_reference_target(scope, name);
        let slot = scope
            .find_variable_mut(&target)
            .ok_or_else(|| CbError::access(format!("undefined variable '{target}'")))?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::types::TypeQualifiers;

    #[test]
    fn const_reassignment_rejected() {
        let mut scope = ScopeStack::new();
        let types = TypeManager::new();
        let structs = StructManager::new();
        let mut v = Variable::new_scalar(TypeInfo::Int);
        v.qualifiers = TypeQualifiers {
            is_const: true,
            ..Default::default()
        };
        v.value = 1;
        v.is_assigned = true;
        scope.declare_in_current("x", v);
        let result = VariableManager::assign_variable(
            &mut scope,
            &types,
            &structs,
            "x",
            TypedValue::int(2),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unsigned_target_clamps_negative_assignment() {
        let mut scope = ScopeStack::new();
        let types = TypeManager::new();
        let structs = StructManager::new();
        let mut v = Variable::new_scalar(TypeInfo::Int);
        v.qualifiers = TypeQualifiers {
            is_unsigned: true,
            ..Default::default()
        };
        scope.declare_in_current("u", v);
        let mut neg = TypedValue::int(-5);
        neg.variable.value = -5;
        VariableManager::assign_variable(&mut scope, &types, &structs, "u", neg, None).unwrap();
        assert_eq!(scope.find_variable("u").unwrap().value, 0);
    }

    #[test]
    fn out_of_range_assignment_rejected() {
        let mut scope = ScopeStack::new();
        let types = TypeManager::new();
        let structs = StructManager::new();
        scope.declare_in_current("t", Variable::new_scalar(TypeInfo::Tiny));
        let result = VariableManager::assign_variable(
            &mut scope,
            &types,
            &structs,
            "t",
            TypedValue::int(1000),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn union_assignment_rejects_non_member_type() {
        let mut scope = ScopeStack::new();
        let mut types = TypeManager::new();
        types.register_union(
            "IntOrStr",
            vec![crate::type_manager::UnionMember::Scalar(TypeInfo::Int)],
        );
        let result =
            VariableManager::assign_union_value(&mut scope, &types, "IntOrStr", "u", TypedValue::string("x"));
        assert!(result.is_err());
    }

    #[test]
    fn read_and_write_lvalue_round_trip() {
        let mut scope = ScopeStack::new();
        scope.declare_in_current("x", Variable::new_scalar(TypeInfo::Int));
        assert_eq!(VariableManager::read_lvalue(&scope, "x").unwrap().value, 0);

        let mut updated = Variable::new_scalar(TypeInfo::Int);
        updated.value = 9;
        VariableManager::write_lvalue(&mut scope, "x", updated).unwrap();
        assert_eq!(VariableManager::read_lvalue(&scope, "x").unwrap().value, 9);

        assert!(VariableManager::read_lvalue(&scope, "missing").is_err());
    }

    #[test]
    fn array_parameter_must_be_array_typed() {
        let mut caller = ScopeStack::new();
        let mut callee = ScopeStack::new();
        caller.declare_in_current("n", Variable::new_scalar(TypeInfo::Int));
        let result = VariableManager::assign_array_parameter(&caller, &mut callee, "n", "arr");
        assert!(result.is_err());
    }
}
