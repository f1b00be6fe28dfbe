//! Struct manager (§4.E), grounded in
//! `examples/original_source/.../managers/structs/{sync,assignment,operations}.cpp`:
//! struct registration, recursive-value-cycle validation, member lookup,
//! and the bidirectional sync between the nested `struct_members` map and
//! the flattened dotted/bracketed scope mirror.

use crate::scope::ScopeStack;
use crate::value::{ArrayPayload, Variable};
use cb_core::ast::FieldDecl;
use cb_core::error::{CbError, CbResult};
use cb_core::types::TypeInfo;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Default)]
pub struct StructManager {
    defs: HashMap<String, StructDef>,
}

impl StructManager {
    pub fn new() -> Self {
        StructManager::default()
    }

    /// Registers a struct definition then immediately validates the whole
    /// registry's recursion rules. On a cycle, the registration is rolled
    /// back so the registry never holds an invalid struct.
    pub fn register_struct_definition(&mut self, name: &str, fields: Vec<FieldDecl>) -> CbResult<()> {
        if self.defs.contains_key(name) {
            return Err(CbError::declaration(format!("struct '{name}' is already defined")));
        }
        self.defs.insert(
            name.to_string(),
            StructDef {
                name: name.to_string(),
                fields,
            },
        );
        if let Err(e) = self.validate_struct_recursion_rules() {
            self.defs.remove(name);
            return Err(e);
        }
        tracing::debug!(struct_name = name, "struct definition registered");
        Ok(())
    }

    /// Builds a directed graph whose edges are "struct S has a non-pointer
    /// member of struct type T", and rejects any cycle in it. Recursive
    /// relationships are legal only through pointer members.
    pub fn validate_struct_recursion_rules(&self) -> CbResult<()> {
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut done: HashSet<&str> = HashSet::new();
        for name in self.defs.keys() {
            self.visit_for_cycle(name, &mut visiting, &mut done)?;
        }
        Ok(())
    }

    fn visit_for_cycle<'a>(
        &'a self,
        name: &'a str,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> CbResult<()> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.contains(name) {
            return Err(CbError::declaration(format!(
                "struct '{name}' participates in a recursive value cycle (only pointer members may be recursive)"
            )));
        }
        let Some(def) = self.defs.get(name) else {
            return Ok(());
        };
        visiting.insert(name);
        for field in &def.fields {
            if field.qualifiers.is_reference {
                continue;
            }
            if let TypeInfo::Struct(member_struct) = &field.type_info {
                self.visit_for_cycle(member_struct.as_str(), visiting, done)?;
            }
        }
        visiting.remove(name);
        done.insert(name);
        Ok(())
    }

    pub fn find_struct_definition(&self, name: &str) -> Option<&StructDef> {
        self.defs.get(name)
    }

    /// A zero-initialized instance of `struct_name`, with nested members
    /// recursively zero-initialized per their declared types.
    pub fn instantiate_default(&self, struct_name: &str) -> CbResult<Variable> {
        let def = self
            .find_struct_definition(struct_name)
            .ok_or_else(|| CbError::declaration(format!("unknown struct type '{struct_name}'")))?;
        let mut var = Variable::new_struct(struct_name);
        for field in &def.fields {
            let member = self.instantiate_field_default(field)?;
            var.struct_member_order.push(field.name.clone());
            var.struct_members.insert(field.name.clone(), member);
        }
        var.is_assigned = true;
        Ok(var)
    }

    fn instantiate_field_default(&self, field: &FieldDecl) -> CbResult<Variable> {
        let mut member = if let Some(array_type) = &field.array_type {
            Variable::new_array(array_type)
        } else {
            match &field.type_info {
                TypeInfo::Struct(nested) => self.instantiate_default(nested)?,
                TypeInfo::String => Variable::new_string(),
                TypeInfo::Pointer(base) => Variable::new_pointer(1, (**base).clone()),
                other => Variable::new_scalar(other.clone()),
            }
        };
        member.qualifiers = field.qualifiers;
        member.is_private_member = field.is_private;
        Ok(member)
    }

    pub fn get_struct_member<'a>(&self, var: &'a Variable, member_name: &str) -> Option<&'a Variable> {
        var.struct_members.get(member_name)
    }

    pub fn get_struct_member_mut<'a>(
        &self,
        var: &'a mut Variable,
        member_name: &str,
    ) -> Option<&'a mut Variable> {
        var.struct_members.get_mut(member_name)
    }

    /// `sync_direct_access_from_struct_value`: after a whole-struct
    /// assignment, re-populate the flat mirror (`<var>.<m>`,
    /// `<var>.<m>[i]`, and deeper) from the nested value. Handles nested
    /// structs recursively and array members (1-D and multi-D).
    pub fn sync_direct_access_from_struct_value(&self, scope: &mut ScopeStack, var_name: &str, value: &Variable) {
        tracing::trace!(var = var_name, "struct member mirror synced from struct value");
        for member_name in &value.struct_member_order {
            let Some(member) = value.struct_members.get(member_name) else {
                continue;
            };
            let flat_name = format!("{var_name}.{member_name}");
            scope.declare_in_current(flat_name.clone(), member.clone());
            if member.is_struct {
                self.sync_direct_access_from_struct_value(scope, &flat_name, member);
            } else if let Some(array) = &member.array {
                self.mirror_array_elements(scope, &flat_name, array);
            }
        }
    }

    fn mirror_array_elements(&self, scope: &mut ScopeStack, flat_name: &str, array: &ArrayPayload) {
        match array {
            ArrayPayload::Int(v) => {
                for (i, val) in v.iter().enumerate() {
                    let mut cell = Variable::new_scalar(TypeInfo::Int);
                    cell.value = *val;
                    cell.is_assigned = true;
                    scope.declare_in_current(format!("{flat_name}[{i}]"), cell);
                }
            }
            ArrayPayload::Float(v) => {
                for (i, val) in v.iter().enumerate() {
                    let mut cell = Variable::new_scalar(TypeInfo::Double);
                    cell.set_float_coherent(*val);
                    cell.is_assigned = true;
                    scope.declare_in_current(format!("{flat_name}[{i}]"), cell);
                }
            }
            ArrayPayload::Str(v) => {
                for (i, val) in v.iter().enumerate() {
                    let mut cell = Variable::new_string();
                    cell.str_value = val.clone();
                    cell.is_assigned = true;
                    scope.declare_in_current(format!("{flat_name}[{i}]"), cell);
                }
            }
        }
    }

    /// `sync_struct_members_from_direct_access`: the inverse. Aggregates
    /// mirror variables in scope back into `struct_members`, in place on
    /// the variable currently bound to `var_name`. Triggered before any
    /// operation that reads the whole struct (return by value, pass by
    /// value, interface-view construction).
    pub fn sync_struct_members_from_direct_access(&self, scope: &mut ScopeStack, var_name: &str) -> CbResult<()> {
        let member_names: Vec<String> = {
            let Some(base) = scope.find_variable(var_name) else {
                return Ok(());
            };
            if !base.is_struct {
                return Ok(());
            }
            base.struct_member_order.clone()
        };
        let mut updated_members = HashMap::new();
        for member_name in &member_names {
            let flat_name = format!("{var_name}.{member_name}");
            if let Some(mirror) = scope.find_variable(&flat_name).cloned() {
                let mut mirror = mirror;
                if mirror.is_struct {
                    self.sync_struct_members_from_direct_access(scope, &flat_name)?;
                    if let Some(updated) = scope.find_variable(&flat_name) {
                        mirror = updated.clone();
                    }
                }
                updated_members.insert(member_name.clone(), mirror);
            }
        }
        if let Some(base) = scope.find_variable_mut(var_name) {
            for (name, value) in updated_members {
                base.struct_members.insert(name, value);
            }
        }
        tracing::trace!(var = var_name, "struct member mirror synced from direct access");
        Ok(())
    }

    /// Fatal unless an `impl` block for `struct_name` is currently in
    /// scope (§4.E access control).
    pub fn check_member_access(
        &self,
        struct_name: &str,
        member_name: &str,
        current_impl_struct: Option<&str>,
    ) -> CbResult<()> {
        let Some(def) = self.find_struct_definition(struct_name) else {
            return Ok(());
        };
        let Some(field) = def.fields.iter().find(|f| f.name == member_name) else {
            return Err(CbError::access(format!(
                "struct '{struct_name}' has no member '{member_name}'"
            )));
        };
        if field.is_private && current_impl_struct != Some(struct_name) {
            return Err(CbError::access(format!(
                "'{member_name}' is a private member of '{struct_name}'"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::types::TypeQualifiers;

    fn field(name: &str, ty: TypeInfo) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            type_info: ty,
            type_name: None,
            qualifiers: TypeQualifiers::default(),
            array_type: None,
            is_private: false,
        }
    }

    #[test]
    fn non_pointer_cycle_rejected() {
        let mut sm = StructManager::new();
        sm.register_struct_definition("A", vec![field("b", TypeInfo::Struct("B".into()))])
            .unwrap();
        let result = sm.register_struct_definition("B", vec![field("a", TypeInfo::Struct("A".into()))]);
        assert!(result.is_err());
    }

    #[test]
    fn pointer_only_cycle_accepted() {
        let mut sm = StructManager::new();
        let mut ptr_field = field("next", TypeInfo::Struct("Node".into()));
        ptr_field.qualifiers.is_pointer_const = false;
        // Pointer member: represented with a Pointer type, not a direct Struct edge.
        ptr_field.type_info = TypeInfo::Pointer(Box::new(TypeInfo::Struct("Node".into())));
        assert!(sm.register_struct_definition("Node", vec![ptr_field]).is_ok());
    }

    #[test]
    fn struct_member_sync_roundtrips() {
        let mut sm = StructManager::new();
        sm.register_struct_definition(
            "P",
            vec![field("x", TypeInfo::Int), field("n", TypeInfo::String)],
        )
        .unwrap();
        let mut scope = ScopeStack::new();
        let value = sm.instantiate_default("P").unwrap();
        scope.declare_in_current("p", value.clone());
        sm.sync_direct_access_from_struct_value(&mut scope, "p", &value);
        assert!(scope.find_variable("p.x").is_some());

        // mutate the flat mirror, then sync back into struct_members
        if let Some(x) = scope.find_variable_mut("p.x") {
            x.value = 25;
        }
        sm.sync_struct_members_from_direct_access(&mut scope, "p").unwrap();
        let p = scope.find_variable("p").unwrap();
        assert_eq!(p.struct_members.get("x").unwrap().value, 25);
    }
}
