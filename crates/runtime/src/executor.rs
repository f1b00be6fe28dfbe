//! Statement executor (§4.J), grounded in
//! `examples/original_source/src/backend/interpreter/core/statement_executor.cpp`:
//! runs `AstNode` statements against the engine's scope, using a
//! `ControlFlow` enum in place of the original's non-local-exception model
//! for `return`/`break`/`continue` (Design Notes §9).

use crate::interpreter::Engine;
use crate::typed_value::TypedValue;
use crate::value::Variable;
use cb_core::ast::AstNode;
use cb_core::error::{CbError, CbResult};
use cb_core::types::{ArrayTypeInfo, TypeInfo};

/// Outcome of executing a statement: normal fall-through, or one of the
/// three forms of non-local exit a block can propagate upward.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(TypedValue),
}

impl ControlFlow {
    fn is_exiting(&self) -> bool {
        !matches!(self, ControlFlow::Normal)
    }
}

impl Engine {
    /// Registers a top-level declaration node into the owning manager.
    /// `var` declarations at this level are deferred rather than run
    /// immediately (see `run_global_initializers`).
    pub fn register_declaration(&mut self, node: &AstNode) -> CbResult<()> {
        match node {
            AstNode::StructDecl { name, fields, .. } => {
                self.structs.register_struct_definition(name, fields.clone())
            }
            AstNode::StructTypedefDecl { alias, struct_name, .. } => {
                self.types
                    .register_typedef(alias, TypeInfo::Struct(struct_name.clone()), None)
            }
            AstNode::InterfaceDecl { name, method_signatures, .. } => {
                let method_names = method_signatures.iter().map(|(n, _, _)| n.clone()).collect();
                self.interfaces.register_interface_definition(name, method_names)
            }
            AstNode::ImplDecl { interface_name, struct_name, methods, .. } => {
                let mut map = std::collections::HashMap::new();
                for m in methods {
                    if let AstNode::FuncDecl { name, .. } = m {
                        map.insert(name.clone(), m.clone());
                    }
                }
                self.interfaces
                    .register_impl_definition(interface_name, struct_name, map)
            }
            AstNode::EnumDecl { name, variants, .. } => {
                let mut next = 0i64;
                let variants = variants
                    .iter()
                    .map(|v| {
                        let value = v.value.unwrap_or(next);
                        next = value + 1;
                        crate::enum_manager::EnumVariant {
                            name: v.name.clone(),
                            value,
                            associated: v.associated_value.clone(),
                        }
                    })
                    .collect();
                self.enums.register_enum(name, variants)
            }
            AstNode::TypedefDecl { alias, target, target_name, .. } => {
                self.types.register_typedef(alias, target.clone(), target_name.clone())
            }
            AstNode::FuncDecl { .. } => self.register_function(node.clone()),
            AstNode::VarDecl { .. } => {
                self.global_initializers.push(node.clone());
                Ok(())
            }
            AstNode::PreprocessorDirective { .. } => Ok(()),
            other => Err(CbError::declaration(format!(
                "{other:?} is not valid at top level"
            ))),
        }
    }

    pub fn execute_stmt(&mut self, node: &AstNode) -> CbResult<ControlFlow> {
        match node {
            AstNode::StmtList { statements, .. } => {
                self.scope.push_scope();
                let result = self.execute_block(statements);
                self.scope.pop_scope();
                result
            }
            AstNode::VarDecl {
                name,
                type_info,
                qualifiers,
                array_type,
                init_expr,
                is_static,
                is_function_pointer_target,
                ..
            } => {
                self.execute_var_decl(
                    name,
                    type_info,
                    *qualifiers,
                    array_type.as_ref(),
                    init_expr.as_deref(),
                    *is_static,
                    is_function_pointer_target.as_deref(),
                )?;
                Ok(ControlFlow::Normal)
            }
            AstNode::If { cond, then_branch, else_branch, .. } => {
                if self.evaluate_typed_expression(cond)?.as_bool() {
                    self.execute_stmt(then_branch)
                } else if let Some(else_b) = else_branch {
                    self.execute_stmt(else_b)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }
            AstNode::While { cond, body, .. } => {
                while self.evaluate_typed_expression(cond)?.as_bool() {
                    match self.execute_stmt(body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Continue | ControlFlow::Normal => {}
                        r @ ControlFlow::Return(_) => return Ok(r),
                    }
                }
                Ok(ControlFlow::Normal)
            }
            AstNode::For { init, cond, update, body, .. } => {
                self.scope.push_scope();
                let result = (|| -> CbResult<ControlFlow> {
                    if let Some(init) = init {
                        self.execute_stmt(init)?;
                    }
                    loop {
                        if let Some(cond) = cond {
                            if !self.evaluate_typed_expression(cond)?.as_bool() {
                                break;
                            }
                        }
                        match self.execute_stmt(body)? {
                            ControlFlow::Break => break,
                            ControlFlow::Continue | ControlFlow::Normal => {}
                            r @ ControlFlow::Return(_) => return Ok(r),
                        }
                        if let Some(update) = update {
                            self.evaluate_typed_expression(update)?;
                        }
                    }
                    Ok(ControlFlow::Normal)
                })();
                self.scope.pop_scope();
                result
            }
            AstNode::Return { value, .. } => {
                let v = match value {
                    Some(expr) => self.evaluate_typed_expression(expr)?,
                    None => TypedValue::from_variable(Variable::default()),
                };
                Ok(ControlFlow::Return(v))
            }
            AstNode::Break { .. } => Ok(ControlFlow::Break),
            AstNode::Continue { .. } => Ok(ControlFlow::Continue),
            AstNode::Assert { cond, message, loc } => {
                if !self.evaluate_typed_expression(cond)?.as_bool() {
                    let msg = message.clone().unwrap_or_else(|| "assertion failed".to_string());
                    let mut err = CbError::assertion(msg);
                    if let Some(l) = loc {
                        err = err.with_location(l.clone());
                    }
                    return Err(err);
                }
                Ok(ControlFlow::Normal)
            }
            AstNode::PrintStmt { arguments, .. } | AstNode::PrintlnStmt { arguments, .. } => {
                let mut parts = Vec::with_capacity(arguments.len());
                for a in arguments {
                    parts.push(self.evaluate_typed_expression(a)?.variable.as_string());
                }
                let text = parts.join("");
                if matches!(node, AstNode::PrintlnStmt { .. }) {
                    println!("{text}");
                } else {
                    print!("{text}");
                }
                Ok(ControlFlow::Normal)
            }
            AstNode::PrintfStmt { format, arguments, .. } => {
                let fmt = self.evaluate_typed_expression(format)?.variable.as_string();
                let mut values = Vec::with_capacity(arguments.len());
                for a in arguments {
                    values.push(self.evaluate_typed_expression(a)?.variable.as_string());
                }
                print!("{}", render_printf(&fmt, &values));
                Ok(ControlFlow::Normal)
            }
            // declarations are legal mid-body too (e.g. a struct scoped to
            // a function); route them through the same registration path.
            AstNode::StructDecl { .. }
            | AstNode::InterfaceDecl { .. }
            | AstNode::ImplDecl { .. }
            | AstNode::EnumDecl { .. }
            | AstNode::TypedefDecl { .. }
            | AstNode::StructTypedefDecl { .. }
            | AstNode::FuncDecl { .. } => {
                self.register_declaration(node)?;
                Ok(ControlFlow::Normal)
            }
            AstNode::PreprocessorDirective { .. } => Ok(ControlFlow::Normal),
            // anything else is an expression used as a statement
            other => {
                self.evaluate_typed_expression(other)?;
                Ok(ControlFlow::Normal)
            }
        }
    }

    fn execute_block(&mut self, statements: &[AstNode]) -> CbResult<ControlFlow> {
        for stmt in statements {
            let cf = self.execute_stmt(stmt)?;
            if cf.is_exiting() {
                return Ok(cf);
            }
        }
        Ok(ControlFlow::Normal)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_var_decl(
        &mut self,
        name: &str,
        type_info: &TypeInfo,
        qualifiers: cb_core::types::TypeQualifiers,
        array_type: Option<&ArrayTypeInfo>,
        init_expr: Option<&AstNode>,
        is_static: bool,
        is_function_pointer_target: Option<&str>,
    ) -> CbResult<()> {
        if let Some(target_fn) = is_function_pointer_target {
            return self.execute_function_pointer_var_decl(name, target_fn, qualifiers, is_static);
        }
        if array_type.is_none() {
            if let TypeInfo::Interface(iface_name) = type_info {
                return self.execute_interface_var_decl(name, iface_name, qualifiers, init_expr, is_static);
            }
            if qualifiers.is_reference {
                return self.execute_reference_var_decl(name, qualifiers, init_expr, is_static);
            }
        }

        let mut declared = match array_type {
            Some(at) => Variable::new_array(at),
            None => match type_info {
                TypeInfo::Struct(n) => self.structs.instantiate_default(n)?,
                TypeInfo::String => Variable::new_string(),
                TypeInfo::Pointer(base) => Variable::new_pointer(1, (**base).clone()),
                other => Variable::new_scalar(other.clone()),
            },
        };
        declared.qualifiers = qualifiers;

        let initial = match init_expr {
            Some(expr) => Some(self.evaluate_typed_expression(expr)?),
            None => None,
        };

        if is_static {
            let already_present = self.scope.find_static(name).is_some();
            let default_value = declared.clone();
            self.scope.declare_static_once(name.to_string(), || default_value);
            if !already_present {
                if let Some(value) = initial {
                    if let Some(slot) = self.scope.find_static_mut(name) {
                        let mut v = value.variable;
                        v.is_assigned = true;
                        *slot = v;
                    }
                }
            }
            return Ok(());
        }

        let is_local = self.scope.depth() > 1;
        crate::variable_manager::VariableManager::process_var_decl_or_assign(
            &mut self.scope,
            &self.types,
            &self.structs,
            name,
            declared,
            initial,
            is_local,
        )
    }

    /// Handles `InterfaceType v = ...;`: builds the interface-view copy
    /// (§4.F `create_interface_variable`) and binds it under `name`, instead
    /// of falling through to the plain scalar/struct declaration path that
    /// has no notion of an interface view. A bare-variable initializer
    /// reuses the interface manager's struct-sync-aware view construction;
    /// an arbitrary expression initializer checks the impl exists and
    /// stamps the view fields directly; no initializer yields a view with
    /// no backing struct yet, waiting for a later assignment.
    fn execute_interface_var_decl(
        &mut self,
        name: &str,
        iface_name: &str,
        qualifiers: cb_core::types::TypeQualifiers,
        init_expr: Option<&AstNode>,
        is_static: bool,
    ) -> CbResult<()> {
        let mut view = match init_expr {
            Some(AstNode::Variable { name: source_name, .. }) => {
                self.interfaces
                    .create_interface_variable(&self.structs, &mut self.scope, iface_name, source_name)?
            }
            Some(other) => {
                let value = self.evaluate_typed_expression(other)?;
                let mut v = value.variable;
                let struct_name = if v.is_struct {
                    v.struct_type_name.clone()
                } else {
                    v.var_type.to_string()
                };
                if !self.interfaces.impl_exists(&struct_name, iface_name) {
                    return Err(CbError::type_violation(format!(
                        "No impl found for interface {iface_name} with type {struct_name}"
                    )));
                }
                v.interface_name = Some(iface_name.to_string());
                v.implementing_struct = Some(struct_name);
                v.is_assigned = true;
                v
            }
            None => {
                let mut v = Variable::default();
                v.interface_name = Some(iface_name.to_string());
                v
            }
        };
        view.qualifiers = qualifiers;

        if is_static {
            let already_present = self.scope.find_static(name).is_some();
            let default_view = view.clone();
            self.scope.declare_static_once(name.to_string(), || default_view);
            if !already_present {
                if let Some(slot) = self.scope.find_static_mut(name) {
                    *slot = view;
                }
            }
            return Ok(());
        }

        if self.scope.depth() > 1 {
            crate::variable_manager::VariableManager::declare_local_variable(&mut self.scope, name, view);
        } else {
            crate::variable_manager::VariableManager::declare_global_variable(&mut self.scope, name, view)?;
        }
        Ok(())
    }

    /// Handles `FuncType fp = target_func;` written so the parser captured
    /// the target directly as `is_function_pointer_target` rather than a
    /// plain `Variable` initializer: binds `name` to a function-pointer
    /// value over the named function (§4.I `&func_name` produces the same
    /// payload shape).
    fn execute_function_pointer_var_decl(
        &mut self,
        name: &str,
        target_fn: &str,
        qualifiers: cb_core::types::TypeQualifiers,
        is_static: bool,
    ) -> CbResult<()> {
        if !self.functions.contains_key(target_fn) {
            return Err(CbError::access(format!("undefined function '{target_fn}'")));
        }
        let mut fp = Variable::new_scalar(TypeInfo::Void);
        fp.is_function_pointer = true;
        fp.function_pointer = Some(crate::value::FunctionPointerValue {
            function_name: target_fn.to_string(),
            address: 0,
        });
        fp.qualifiers = qualifiers;
        fp.is_assigned = true;

        if is_static {
            self.scope.declare_static_once(name.to_string(), || fp);
            return Ok(());
        }
        if self.scope.depth() > 1 {
            crate::variable_manager::VariableManager::declare_local_variable(&mut self.scope, name, fp);
        } else {
            crate::variable_manager::VariableManager::declare_global_variable(&mut self.scope, name, fp)?;
        }
        Ok(())
    }

    /// Handles a general local reference declaration, `T& r = x;`: binds
    /// `name` to an alias cell carrying `reference_target`, rather than a
    /// copy of `x`'s value, so a later `r = ...` (routed through
    /// `VariableManager::assign_variable`, which chases
    /// `resolve_reference_target`) writes through to `x` itself. Distinct
    /// from a reference *parameter*, which binds by copy-in and writes back
    /// only once the call returns (`call_function`/`call_method`).
    fn execute_reference_var_decl(
        &mut self,
        name: &str,
        qualifiers: cb_core::types::TypeQualifiers,
        init_expr: Option<&AstNode>,
        is_static: bool,
    ) -> CbResult<()> {
        let init = init_expr.ok_or_else(|| {
            CbError::declaration(format!("reference variable '{name}' requires an initializer"))
        })?;
        let AstNode::Variable { name: target_name, .. } = init else {
            return Err(CbError::declaration(format!(
                "reference variable '{name}' must be initialized from another variable"
            )));
        };
        let resolved = crate::variable_manager::VariableManager::resolve_reference_target(&self.scope, target_name);
        if self.scope.find_variable(&resolved).is_none() {
            return Err(CbError::access(format!("undefined variable '{resolved}'")));
        }

        let alias = Variable {
            reference_target: Some(resolved),
            qualifiers,
            is_assigned: true,
            ..Variable::default()
        };

        if is_static {
            self.scope.declare_static_once(name.to_string(), || alias);
            return Ok(());
        }
        if self.scope.depth() > 1 {
            crate::variable_manager::VariableManager::declare_local_variable(&mut self.scope, name, alias);
        } else {
            crate::variable_manager::VariableManager::declare_global_variable(&mut self.scope, name, alias)?;
        }
        Ok(())
    }

    /// Invokes a registered function: binds arguments positionally (by
    /// value unless the parameter is declared `&`, which writes its final
    /// value back to the caller's variable once the call returns), runs the
    /// body in a fresh top frame, and unwraps a trailing `Return` into the
    /// call's result (a body that falls off the end without `return`
    /// yields a default-initialized value of the declared return type).
    ///
    /// `arg_names` carries the scope-key name each argument expression
    /// addressed, or `None` for arguments that aren't addressable
    /// (literals, temporaries) — only addressable arguments bound to a
    /// reference parameter get written back.
    pub fn call_function(
        &mut self,
        name: &str,
        args: Vec<TypedValue>,
        arg_names: &[Option<String>],
    ) -> CbResult<TypedValue> {
        let decl = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| CbError::access(format!("undefined function '{name}'")))?;
        let AstNode::FuncDecl { params, return_type, body, .. } = &decl else {
            return Err(CbError::declaration(format!("'{name}' is not callable")));
        };
        if args.len() != params.len() {
            return Err(CbError::declaration(format!(
                "function '{name}' expects {} argument(s), got {}",
                params.len(),
                args.len()
            )));
        }

        let saved = self.scope.enter_function_scope();
        for (param, arg) in params.iter().zip(args.into_iter()) {
            let mut var = arg.variable;
            var.qualifiers = param.qualifiers;
            if let Some(fp) = var.function_pointer.clone() {
                self.scope.register_function_pointer(param.name.clone(), fp);
            }
            self.scope.declare_in_current(param.name.clone(), var);
        }

        let result = self.execute_stmt(body);

        // Reference parameters write their final value back to the
        // caller's variable (§4.H: "mutations through a reference parameter
        // are visible to the caller"). Captured while the callee's scope is
        // still current, applied once the caller's scope is restored.
        let writebacks: Vec<(String, Variable)> = if result.is_ok() {
            params
                .iter()
                .zip(arg_names.iter())
                .filter(|(param, _)| param.qualifiers.is_reference)
                .filter_map(|(param, arg_name)| {
                    let arg_name = arg_name.as_ref()?;
                    let value = self.scope.find_variable(&param.name)?.clone();
                    Some((arg_name.clone(), value))
                })
                .collect()
        } else {
            Vec::new()
        };

        self.scope.exit_function_scope(saved);
        for (arg_name, value) in writebacks {
            let _ = crate::variable_manager::VariableManager::write_lvalue(&mut self.scope, &arg_name, value);
        }

        match result? {
            ControlFlow::Return(v) => Ok(v),
            _ => Ok(TypedValue::from_variable(match return_type {
                TypeInfo::String => Variable::new_string(),
                other => Variable::new_scalar(other.clone()),
            })),
        }
    }

    /// Invokes a struct method found through an `impl` block: binds `self`
    /// to the receiver (writing its final state back to the caller's
    /// variable, the same way a `new_struct` heap receiver would be
    /// dereferenced on delete), sets `current_impl_struct` for the
    /// duration of the call so the method body may read/write its own
    /// struct's private members, and otherwise follows `call_function`'s
    /// scope and reference-parameter contract.
    pub fn call_method(
        &mut self,
        struct_name: &str,
        method_decl: &AstNode,
        receiver_name: &str,
        args: Vec<TypedValue>,
        arg_names: &[Option<String>],
    ) -> CbResult<TypedValue> {
        let AstNode::FuncDecl { params, return_type, body, .. } = method_decl else {
            return Err(CbError::declaration(format!("'{struct_name}' method is not callable")));
        };
        if args.len() != params.len() {
            return Err(CbError::declaration(format!(
                "method on '{struct_name}' expects {} argument(s), got {}",
                params.len(),
                args.len()
            )));
        }

        let receiver = self
            .scope
            .find_variable(receiver_name)
            .cloned()
            .ok_or_else(|| CbError::access(format!("undefined variable '{receiver_name}'")))?;

        let saved = self.scope.enter_function_scope();
        self.scope.declare_in_current("self", receiver);
        for (param, arg) in params.iter().zip(args.into_iter()) {
            let mut var = arg.variable;
            var.qualifiers = param.qualifiers;
            if let Some(fp) = var.function_pointer.clone() {
                self.scope.register_function_pointer(param.name.clone(), fp);
            }
            self.scope.declare_in_current(param.name.clone(), var);
        }

        let previous_impl_struct = self.current_impl_struct.replace(struct_name.to_string());
        let result = self.execute_stmt(body);
        self.current_impl_struct = previous_impl_struct;

        let self_after = if result.is_ok() { self.scope.find_variable("self").cloned() } else { None };
        let writebacks: Vec<(String, Variable)> = if result.is_ok() {
            params
                .iter()
                .zip(arg_names.iter())
                .filter(|(param, _)| param.qualifiers.is_reference)
                .filter_map(|(param, arg_name)| {
                    let arg_name = arg_name.as_ref()?;
                    let value = self.scope.find_variable(&param.name)?.clone();
                    Some((arg_name.clone(), value))
                })
                .collect()
        } else {
            Vec::new()
        };

        self.scope.exit_function_scope(saved);
        if let Some(self_value) = self_after {
            let _ = crate::variable_manager::VariableManager::write_lvalue(&mut self.scope, receiver_name, self_value);
        }
        for (arg_name, value) in writebacks {
            let _ = crate::variable_manager::VariableManager::write_lvalue(&mut self.scope, &arg_name, value);
        }

        match result? {
            ControlFlow::Return(v) => Ok(v),
            _ => Ok(TypedValue::from_variable(match return_type {
                TypeInfo::String => Variable::new_string(),
                other => Variable::new_scalar(other.clone()),
            })),
        }
    }
}

/// A minimal `%d`/`%s`/`%f`-style formatter, matching the handful of
/// conversion specifiers the language surface actually exposes through
/// `printf`; anything else is passed through literally.
fn render_printf(format: &str, values: &[String]) -> String {
    let mut out = String::new();
    let mut values = values.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('%') => out.push('%'),
                Some('d') | Some('i') | Some('s') | Some('f') | Some('c') => {
                    if let Some(v) = values.next() {
                        out.push_str(v);
                    }
                }
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::ast::{BinOp, ParamDecl, SourceLocation};
    use cb_core::types::TypeQualifiers;

    fn num(value: i64) -> AstNode {
        AstNode::Number { value, type_hint: None, loc: None }
    }

    fn var(name: &str) -> AstNode {
        AstNode::Variable { name: name.to_string(), loc: None }
    }

    #[test]
    fn while_loop_honors_break() {
        let mut engine = Engine::new();
        engine.execute_stmt(&AstNode::VarDecl {
            name: "n".into(),
            type_info: TypeInfo::Int,
            type_name: None,
            qualifiers: TypeQualifiers::default(),
            array_type: None,
            init_expr: Some(Box::new(num(0))),
            is_static: false,
            is_function_pointer_target: None,
            loc: None,
        }).unwrap();

        let body = AstNode::StmtList {
            statements: vec![
                AstNode::Assign {
                    target: Box::new(var("n")),
                    value: Box::new(AstNode::BinaryOp {
                        op: BinOp::Add,
                        left: Box::new(var("n")),
                        right: Box::new(num(1)),
                        loc: None,
                    }),
                    loc: None,
                },
                AstNode::If {
                    cond: Box::new(AstNode::BinaryOp {
                        op: BinOp::Ge,
                        left: Box::new(var("n")),
                        right: Box::new(num(3)),
                        loc: None,
                    }),
                    then_branch: Box::new(AstNode::Break { loc: None }),
                    else_branch: None,
                    loc: None,
                },
            ],
            loc: None,
        };
        let while_node = AstNode::While {
            cond: Box::new(AstNode::Number { value: 1, type_hint: None, loc: None }),
            body: Box::new(body),
            loc: None,
        };
        engine.execute_stmt(&while_node).unwrap();
        assert_eq!(engine.scope.find_variable("n").unwrap().value, 3);
    }

    #[test]
    fn function_call_matches_sum_of_three_scenario() {
        let mut engine = Engine::new();
        let add = AstNode::FuncDecl {
            name: "add3".into(),
            params: vec![
                ParamDecl { name: "a".into(), type_info: TypeInfo::Int, type_name: None, qualifiers: TypeQualifiers::default(), array_type: None, is_function_pointer: false },
                ParamDecl { name: "b".into(), type_info: TypeInfo::Int, type_name: None, qualifiers: TypeQualifiers::default(), array_type: None, is_function_pointer: false },
                ParamDecl { name: "c".into(), type_info: TypeInfo::Int, type_name: None, qualifiers: TypeQualifiers::default(), array_type: None, is_function_pointer: false },
            ],
            return_type: TypeInfo::Int,
            return_type_name: None,
            body: Box::new(AstNode::StmtList {
                statements: vec![AstNode::Return {
                    value: Some(Box::new(AstNode::BinaryOp {
                        op: BinOp::Add,
                        left: Box::new(AstNode::BinaryOp {
                            op: BinOp::Add,
                            left: Box::new(var("a")),
                            right: Box::new(var("b")),
                            loc: None,
                        }),
                        right: Box::new(var("c")),
                        loc: None,
                    })),
                    loc: None,
                }],
                loc: None,
            }),
            loc: None,
        };
        engine.register_function(add).unwrap();
        let result = engine
            .call_function("add3", vec![TypedValue::int(1), TypedValue::int(42), TypedValue::int(3)], &[None, None, None])
            .unwrap();
        assert_eq!(result.variable.as_numeric(), 46);
    }

    #[test]
    fn function_call_preserves_caller_globals_and_statics() {
        let mut engine = Engine::new();
        engine.execute_stmt(&AstNode::VarDecl {
            name: "g".into(),
            type_info: TypeInfo::Int,
            type_name: None,
            qualifiers: TypeQualifiers::default(),
            array_type: None,
            init_expr: Some(Box::new(num(7))),
            is_static: false,
            is_function_pointer_target: None,
            loc: None,
        }).unwrap();

        let read_global = AstNode::FuncDecl {
            name: "read_global".into(),
            params: vec![],
            return_type: TypeInfo::Int,
            return_type_name: None,
            body: Box::new(AstNode::StmtList {
                statements: vec![AstNode::Return { value: Some(Box::new(var("g"))), loc: None }],
                loc: None,
            }),
            loc: None,
        };
        engine.register_function(read_global).unwrap();
        let result = engine.call_function("read_global", vec![], &[]).unwrap();
        assert_eq!(result.variable.as_numeric(), 7);
    }

    #[test]
    fn reference_parameter_mutation_is_visible_to_caller() {
        let mut engine = Engine::new();
        engine.execute_stmt(&AstNode::VarDecl {
            name: "n".into(),
            type_info: TypeInfo::Int,
            type_name: None,
            qualifiers: TypeQualifiers::default(),
            array_type: None,
            init_expr: Some(Box::new(num(1))),
            is_static: false,
            is_function_pointer_target: None,
            loc: None,
        }).unwrap();

        let bump = AstNode::FuncDecl {
            name: "bump".into(),
            params: vec![ParamDecl {
                name: "x".into(),
                type_info: TypeInfo::Int,
                type_name: None,
                qualifiers: TypeQualifiers { is_reference: true, ..TypeQualifiers::default() },
                array_type: None,
                is_function_pointer: false,
            }],
            return_type: TypeInfo::Int,
            return_type_name: None,
            body: Box::new(AstNode::StmtList {
                statements: vec![AstNode::Assign {
                    target: Box::new(var("x")),
                    value: Box::new(AstNode::BinaryOp {
                        op: BinOp::Add,
                        left: Box::new(var("x")),
                        right: Box::new(num(41)),
                        loc: None,
                    }),
                    loc: None,
                }],
                loc: None,
            }),
            loc: None,
        };
        engine.register_function(bump).unwrap();
        let arg = engine.evaluate_typed_expression(&var("n")).unwrap();
        engine.call_function("bump", vec![arg], &[Some("n".to_string())]).unwrap();
        assert_eq!(engine.scope.find_variable("n").unwrap().value, 42);
    }

    #[test]
    fn local_reference_declaration_aliases_the_referent() {
        let mut engine = Engine::new();
        engine.execute_stmt(&AstNode::VarDecl {
            name: "x".into(),
            type_info: TypeInfo::Int,
            type_name: None,
            qualifiers: TypeQualifiers::default(),
            array_type: None,
            init_expr: Some(Box::new(num(1))),
            is_static: false,
            is_function_pointer_target: None,
            loc: None,
        }).unwrap();
        engine.execute_stmt(&AstNode::VarDecl {
            name: "r".into(),
            type_info: TypeInfo::Int,
            type_name: None,
            qualifiers: TypeQualifiers { is_reference: true, ..TypeQualifiers::default() },
            array_type: None,
            init_expr: Some(Box::new(var("x"))),
            is_static: false,
            is_function_pointer_target: None,
            loc: None,
        }).unwrap();

        engine
            .execute_stmt(&AstNode::Assign { target: Box::new(var("r")), value: Box::new(num(5)), loc: None })
            .unwrap();
        assert_eq!(engine.scope.find_variable("x").unwrap().value, 5);
        assert_eq!(engine.evaluate(&var("r")).unwrap(), 5);
    }

    #[test]
    fn function_pointer_declaration_target_is_callable() {
        let mut engine = Engine::new();
        let answer = AstNode::FuncDecl {
            name: "answer".into(),
            params: vec![],
            return_type: TypeInfo::Int,
            return_type_name: None,
            body: Box::new(AstNode::StmtList {
                statements: vec![AstNode::Return { value: Some(Box::new(num(42))), loc: None }],
                loc: None,
            }),
            loc: None,
        };
        engine.register_function(answer).unwrap();

        engine.execute_stmt(&AstNode::VarDecl {
            name: "f".into(),
            type_info: TypeInfo::Void,
            type_name: None,
            qualifiers: TypeQualifiers::default(),
            array_type: None,
            init_expr: None,
            is_static: false,
            is_function_pointer_target: Some("answer".into()),
            loc: None,
        }).unwrap();

        let f = engine.scope.find_variable("f").unwrap();
        assert!(f.is_function_pointer);
        let result = engine
            .evaluate_typed_expression(&AstNode::FuncCall { callee: Box::new(var("f")), arguments: vec![], loc: None })
            .unwrap();
        assert_eq!(result.variable.as_numeric(), 42);
    }

    #[test]
    fn assert_false_is_fatal() {
        let mut engine = Engine::new();
        let node = AstNode::Assert {
            cond: Box::new(num(0)),
            message: Some("boom".into()),
            loc: Some(SourceLocation::new("t.cb", 4)),
        };
        assert!(engine.execute_stmt(&node).is_err());
    }
}
