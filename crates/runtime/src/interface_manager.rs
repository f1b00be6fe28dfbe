//! Interface/impl manager (§4.F): impl registry, method resolution, and
//! interface-view construction.

use crate::scope::ScopeStack;
use crate::struct_manager::StructManager;
use crate::value::Variable;
use cb_core::ast::AstNode;
use cb_core::error::{CbError, CbResult};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ImplDef {
    pub interface_name: String,
    pub struct_name: String,
    /// Method name -> the `FuncDecl` node implementing it.
    pub methods: HashMap<String, AstNode>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: String,
    /// (method name, declared param count) — enough to validate an impl
    /// provides every required method; full signature checking is a
    /// typechecker concern outside this core.
    pub method_names: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InterfaceManager {
    interfaces: HashMap<String, InterfaceDef>,
    /// Impls are expected to be few; a linear scan (as the original does)
    /// is simpler than a `(interface, struct)`-keyed map and just as fast
    /// at this scale.
    impls: Vec<ImplDef>,
}

impl InterfaceManager {
    pub fn new() -> Self {
        InterfaceManager::default()
    }

    pub fn register_interface_definition(&mut self, name: &str, method_names: Vec<String>) -> CbResult<()> {
        if self.interfaces.contains_key(name) {
            return Err(CbError::declaration(format!("interface '{name}' is already defined")));
        }
        self.interfaces.insert(
            name.to_string(),
            InterfaceDef {
                name: name.to_string(),
                method_names,
            },
        );
        Ok(())
    }

    pub fn register_impl_definition(
        &mut self,
        interface_name: &str,
        struct_name: &str,
        methods: HashMap<String, AstNode>,
    ) -> CbResult<()> {
        if let Some(def) = self.interfaces.get(interface_name) {
            for required in &def.method_names {
                if !methods.contains_key(required) {
                    return Err(CbError::declaration(format!(
                        "impl {interface_name} for {struct_name} is missing method '{required}'"
                    )));
                }
            }
        }
        self.impls.push(ImplDef {
            interface_name: interface_name.to_string(),
            struct_name: struct_name.to_string(),
            methods,
        });
        Ok(())
    }

    pub fn find_impl_for_struct(&self, struct_name: &str, interface_name: &str) -> Option<&ImplDef> {
        self.impls
            .iter()
            .find(|i| i.struct_name == struct_name && i.interface_name == interface_name)
    }

    pub fn impl_exists(&self, struct_name: &str, interface_name: &str) -> bool {
        self.find_impl_for_struct(struct_name, interface_name).is_some()
    }

    pub fn resolve_method(&self, struct_name: &str, interface_name: &str, method: &str) -> Option<&AstNode> {
        self.find_impl_for_struct(struct_name, interface_name)
            .and_then(|i| i.methods.get(method))
    }

    /// Finds whichever impl block attached to `struct_name` provides
    /// `method`, without requiring the caller to already know which
    /// interface it satisfies — the lookup a bare `receiver.method(...)`
    /// call site needs, as opposed to `resolve_method`'s interface-view
    /// lookup where the interface is already pinned down.
    pub fn find_method_for_struct(&self, struct_name: &str, method: &str) -> Option<(&str, &AstNode)> {
        self.impls
            .iter()
            .find(|i| i.struct_name == struct_name && i.methods.contains_key(method))
            .map(|i| (i.interface_name.as_str(), i.methods.get(method).expect("just checked")))
    }

    /// Builds a full interface-view copy: checks an impl exists for
    /// `(interface_name, source_type)`, synchronizes the source's flat
    /// mirror if it's a struct, then duplicates its payload into a
    /// `Variable` whose `implementing_struct` names the backing type and
    /// whose per-element mirror entries (for array members) are copied
    /// too. Fails with "No impl found for interface I with type T" on a
    /// missing impl.
    pub fn create_interface_variable(
        &self,
        structs: &StructManager,
        scope: &mut ScopeStack,
        interface_name: &str,
        source_name: &str,
    ) -> CbResult<Variable> {
        let source_type_name = {
            let source = scope
                .find_variable(source_name)
                .ok_or_else(|| CbError::access(format!("undefined variable '{source_name}'")))?;
            if source.is_struct {
                source.struct_type_name.clone()
            } else {
                source.var_type.to_string()
            }
        };

        if !self.impl_exists(&source_type_name, interface_name) {
            return Err(CbError::type_violation(format!(
                "No impl found for interface {interface_name} with type {source_type_name}"
            )));
        }

        if scope
            .find_variable(source_name)
            .map(|v| v.is_struct)
            .unwrap_or(false)
        {
            structs.sync_struct_members_from_direct_access(scope, source_name)?;
        }

        let source = scope
            .find_variable(source_name)
            .expect("checked present above")
            .clone();

        let mut view = source;
        view.interface_name = Some(interface_name.to_string());
        view.implementing_struct = Some(source_type_name.clone());

        if view.is_struct {
            structs.sync_direct_access_from_struct_value(scope, source_name, &view.clone());
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::types::TypeInfo;

    fn dummy_method() -> AstNode {
        AstNode::StmtList {
            statements: vec![],
            loc: None,
        }
    }

    #[test]
    fn impl_lookup_finds_matching_pair() {
        let mut im = InterfaceManager::new();
        im.register_interface_definition("Shape", vec!["area".into()]).unwrap();
        let mut methods = HashMap::new();
        methods.insert("area".to_string(), dummy_method());
        im.register_impl_definition("Shape", "Circle", methods).unwrap();
        assert!(im.impl_exists("Circle", "Shape"));
        assert!(!im.impl_exists("Square", "Shape"));
    }

    #[test]
    fn impl_missing_required_method_rejected() {
        let mut im = InterfaceManager::new();
        im.register_interface_definition("Shape", vec!["area".into(), "perimeter".into()])
            .unwrap();
        let mut methods = HashMap::new();
        methods.insert("area".to_string(), dummy_method());
        assert!(im.register_impl_definition("Shape", "Circle", methods).is_err());
    }

    #[test]
    fn find_method_for_struct_locates_receiver_method_without_naming_the_interface() {
        let mut im = InterfaceManager::new();
        im.register_interface_definition("Shape", vec!["area".into()]).unwrap();
        let mut methods = HashMap::new();
        methods.insert("area".to_string(), dummy_method());
        im.register_impl_definition("Shape", "Circle", methods).unwrap();

        let (interface, _) = im.find_method_for_struct("Circle", "area").unwrap();
        assert_eq!(interface, "Shape");
        assert!(im.find_method_for_struct("Circle", "perimeter").is_none());
    }

    #[test]
    fn interface_view_fails_without_impl() {
        let im = InterfaceManager::new();
        let structs = StructManager::new();
        let mut scope = ScopeStack::new();
        scope.declare_in_current("c", Variable::new_scalar(TypeInfo::Int));
        let result = im.create_interface_variable(&structs, &mut scope, "Shape", "c");
        assert!(result.is_err());
    }
}
