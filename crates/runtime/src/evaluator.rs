//! Typed-expression evaluator (§4.I), grounded in
//! `examples/original_source/src/backend/interpreter/core/expression_evaluator.cpp`:
//! walks an `AstNode` expression tree and produces a `TypedValue`, handling
//! numeric promotion, pointer arithmetic, string concatenation, array/struct
//! access, and function calls.

use crate::interpreter::{Engine, HeapSlot};
use crate::typed_value::TypedValue;
use crate::value::{ArrayPayload, Variable};
use cb_core::ast::{AstNode, BinOp, SizeofOperand, UnOp};
use cb_core::error::{CbError, CbResult};
use cb_core::types::{InferredType, TypeInfo};

impl Engine {
    /// Narrow numeric-only entry point, for call sites (array sizes, `for`
    /// loop bounds) that only ever need an integer result.
    pub fn evaluate(&mut self, node: &AstNode) -> CbResult<i64> {
        Ok(self.evaluate_typed_expression(node)?.variable.as_numeric())
    }

    pub fn evaluate_typed_expression(&mut self, node: &AstNode) -> CbResult<TypedValue> {
        match node {
            AstNode::Number { value, type_hint, .. } => {
                let ty = type_hint.clone().unwrap_or(TypeInfo::Int);
                let mut v = Variable::new_scalar(ty.clone());
                v.value = *value;
                v.is_assigned = true;
                Ok(TypedValue::new(v, InferredType::new(ty)))
            }
            AstNode::FloatNumber { value, type_hint, .. } => {
                let mut v = Variable::new_scalar(type_hint.clone());
                v.set_float_coherent(*value);
                v.is_assigned = true;
                Ok(TypedValue::new(v, InferredType::new(type_hint.clone())))
            }
            AstNode::StringLiteral { value, .. } => Ok(TypedValue::string(value.clone())),
            AstNode::NullPtr { .. } => {
                let v = Variable::new_pointer(1, TypeInfo::Void);
                Ok(TypedValue::from_variable(v))
            }
            AstNode::Variable { name, loc } => self.eval_variable_ref(name, loc.as_ref()),
            AstNode::ArrayRef { base, index, loc } => self.eval_array_ref(base, index, loc.as_ref()),
            AstNode::ArrayLiteral { elements, .. } => self.eval_array_literal(elements),
            AstNode::StructLiteral { struct_name, fields, loc } => {
                self.eval_struct_literal(struct_name.as_deref(), fields, loc.as_ref())
            }
            AstNode::BinaryOp { op, left, right, loc } => self.eval_binary_op(*op, left, right, loc.as_ref()),
            AstNode::UnaryOp { op, operand, loc } => self.eval_unary_op(*op, operand, loc.as_ref()),
            AstNode::TernaryOp { cond, then_expr, else_expr, .. } => {
                if self.evaluate_typed_expression(cond)?.as_bool() {
                    self.evaluate_typed_expression(then_expr)
                } else {
                    self.evaluate_typed_expression(else_expr)
                }
            }
            AstNode::Assign { target, value, .. } => {
                let v = self.evaluate_typed_expression(value)?;
                self.assign_to_target(target, v)
            }
            AstNode::MemberAccess { base, name, loc } => self.eval_member_access(base, name, loc.as_ref()),
            AstNode::ArrowAccess { base, name, loc } => self.eval_member_access(base, name, loc.as_ref()),
            AstNode::MemberArrayAccess { base, name, indices, loc } => {
                self.eval_member_array_access(base, name, indices, loc.as_ref())
            }
            AstNode::EnumAccess { enum_name, variant, loc } => {
                let found = self.enums.lookup_variant(enum_name, variant).map_err(|e| locate(e, loc))?;
                let discriminant = found.value;
                let mut v = Variable::new_scalar(TypeInfo::Enum(enum_name.clone()));
                v.is_enum = true;
                v.enum_type_name = enum_name.clone();
                v.enum_variant = variant.clone();
                match &found.associated {
                    Some(cb_core::ast::EnumAssociatedValue::Int(i)) => v.associated_int_value = Some(*i),
                    Some(cb_core::ast::EnumAssociatedValue::Str(s)) => v.associated_str_value = Some(s.clone()),
                    None => {}
                }
                v.value = discriminant;
                v.is_assigned = true;
                Ok(TypedValue::new(v, InferredType::new(TypeInfo::Enum(enum_name.clone()))))
            }
            AstNode::FuncCall { callee, arguments, loc } => self.eval_func_call(callee, arguments, loc.as_ref()),
            AstNode::NewExpr { type_info, array_size, .. } => self.eval_new_expr(type_info, array_size.as_deref()),
            AstNode::DeleteExpr { target, loc } => self.eval_delete_expr(target, loc.as_ref()),
            AstNode::SizeofExpr { operand, .. } => self.eval_sizeof(operand),
            other => Err(CbError::declaration(format!(
                "node kind {other:?} is not a valid expression"
            ))),
        }
    }

    fn eval_variable_ref(&mut self, name: &str, loc: Option<&cb_core::ast::SourceLocation>) -> CbResult<TypedValue> {
        if let Some(fp) = self.scope.find_function_pointer(name) {
            let mut v = Variable::new_scalar(TypeInfo::Void);
            v.is_function_pointer = true;
            v.function_pointer = Some(fp.clone());
            return Ok(TypedValue::from_variable(v));
        }
        let var = crate::variable_manager::VariableManager::read_lvalue(&self.scope, name)
            .map_err(|e| locate(e, loc))?
            .clone();
        Ok(TypedValue::from_variable(var))
    }

    fn eval_array_ref(
        &mut self,
        base: &AstNode,
        index: &AstNode,
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        let idx = self.evaluate(index)?;
        // a single `[i]` on a multi-dim array reads that whole row; callers
        // chain `ArrayRef(ArrayRef(base, i), j)` for `m[i][j]`, which this
        // handles by collecting all index hops against the same base name.
        let indices = self.collect_array_indices(base, idx)?;
        let base_name = array_base_name(base)
            .ok_or_else(|| locate(CbError::access("array index applied to a non-variable base"), loc))?;

        let base_var = self
            .scope
            .find_variable(&base_name)
            .ok_or_else(|| locate(CbError::access(format!("undefined variable '{base_name}'")), loc))?;

        if base_var.is_string() {
            let chars: Vec<char> = base_var.str_value.chars().collect();
            let i = *indices.last().unwrap();
            let ch = *chars
                .get(i as usize)
                .ok_or_else(|| locate(CbError::access("string index out of bounds"), loc))?;
            return Ok(TypedValue::string(ch.to_string()));
        }

        let flat = base_var
            .flat_index(&indices)
            .ok_or_else(|| locate(CbError::access("array index out of bounds"), loc))?;
        let Some(array) = &base_var.array else {
            return Err(locate(CbError::type_violation(format!("'{base_name}' is not an array")), loc));
        };
        array_element_as_typed_value(array, flat as usize, loc)
    }

    /// Walks nested `ArrayRef` nodes (`m[i][j]` parses as
    /// `ArrayRef(ArrayRef(Variable(m), i), j)`) and returns every index in
    /// declaration order, evaluating the already-known outer index `outer`
    /// last.
    fn collect_array_indices(&mut self, base: &AstNode, outer: i64) -> CbResult<Vec<i64>> {
        match base {
            AstNode::ArrayRef { base: inner_base, index, .. } => {
                let idx = self.evaluate(index)?;
                let mut indices = self.collect_array_indices(inner_base, idx)?;
                indices.push(outer);
                Ok(indices)
            }
            _ => Ok(vec![outer]),
        }
    }

    /// Evaluates a (possibly nested) `{...}` literal into one flat, row-major
    /// array `Variable`. Nested literals (`{{1,2,3},{4,5,6}}`) are flattened
    /// recursively rather than evaluated element-by-element, so an N-D
    /// literal ends up with the single canonical flat representation every
    /// other array operation expects (Design Notes §9) instead of a
    /// 1-D array of zeroed sub-array values.
    fn eval_array_literal(&mut self, elements: &[AstNode]) -> CbResult<TypedValue> {
        let mut dims = Vec::new();
        let leaves = self.flatten_array_literal(elements, 0, &mut dims)?;
        if leaves.is_empty() {
            let v = Variable::new_scalar(TypeInfo::Array(Box::new(TypeInfo::Int)));
            return Ok(TypedValue::from_variable(v));
        }
        let element_type = leaves[0].variable.var_type.clone();
        for v in &leaves {
            if v.variable.var_type != element_type {
                return Err(CbError::type_violation("array literal elements must share one type"));
            }
        }
        let mut var = Variable::new_scalar(TypeInfo::Array(Box::new(element_type.clone())));
        var.array_dimensions = dims;
        var.is_multidimensional = var.array_dimensions.len() > 1;
        var.array = Some(match element_type {
            TypeInfo::Float | TypeInfo::Double | TypeInfo::Quad => {
                ArrayPayload::Float(leaves.iter().map(|v| v.variable.as_double()).collect())
            }
            TypeInfo::String => ArrayPayload::Str(leaves.iter().map(|v| v.variable.as_string()).collect()),
            _ => ArrayPayload::Int(leaves.iter().map(|v| v.variable.as_numeric()).collect()),
        });
        var.is_assigned = true;
        Ok(TypedValue::from_variable(var))
    }

    /// Walks one level of a (possibly nested) array literal, collecting
    /// scalar leaf values in row-major order and recording each nesting
    /// depth's row length into `dims` — validated for consistency against
    /// sibling rows at the same depth, since a ragged literal (`{{1,2},{3}}`)
    /// has no single flat-dimension representation.
    fn flatten_array_literal(
        &mut self,
        elements: &[AstNode],
        depth: usize,
        dims: &mut Vec<i32>,
    ) -> CbResult<Vec<TypedValue>> {
        if dims.len() == depth {
            dims.push(elements.len() as i32);
        } else if dims[depth] != elements.len() as i32 {
            return Err(CbError::type_violation("array literal rows have inconsistent lengths"));
        }
        let is_nested = matches!(elements.first(), Some(AstNode::ArrayLiteral { .. }));
        let mut leaves = Vec::new();
        for e in elements {
            if is_nested {
                let AstNode::ArrayLiteral { elements: inner, .. } = e else {
                    return Err(CbError::type_violation("array literal mixes scalar and nested rows"));
                };
                leaves.extend(self.flatten_array_literal(inner, depth + 1, dims)?);
            } else {
                leaves.push(self.evaluate_typed_expression(e)?);
            }
        }
        Ok(leaves)
    }

    fn eval_struct_literal(
        &mut self,
        struct_name: Option<&str>,
        fields: &[(Option<String>, AstNode)],
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        let name = struct_name
            .ok_or_else(|| locate(CbError::declaration("struct literal requires a known struct type"), loc))?;
        let mut var = self
            .structs
            .instantiate_default(name)
            .map_err(|e| locate(e, loc))?;
        // Positional fields (`P p = {25, "Bob"};`) assign in declaration
        // order; named fields (`P p = {x: 25, n: "Bob"};`) assign by name.
        // The two forms aren't mixed within one literal.
        let declared_fields = self
            .structs
            .find_struct_definition(name)
            .map(|def| def.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        let mut positional_index = 0usize;
        for (field_name, expr) in fields {
            let value = self.evaluate_typed_expression(expr)?;
            match field_name {
                Some(fname) => {
                    var.struct_members.insert(fname.clone(), value.variable);
                }
                None => {
                    let fname = declared_fields.get(positional_index).ok_or_else(|| {
                        locate(
                            CbError::type_violation(format!(
                                "struct literal for '{name}' has more positional fields than '{name}' declares"
                            )),
                            loc,
                        )
                    })?;
                    var.struct_members.insert(fname.clone(), value.variable);
                    positional_index += 1;
                }
            }
        }
        Ok(TypedValue::from_variable(var))
    }

    fn eval_binary_op(
        &mut self,
        op: BinOp,
        left: &AstNode,
        right: &AstNode,
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        if matches!(op, BinOp::And) {
            let l = self.evaluate_typed_expression(left)?;
            if !l.as_bool() {
                return Ok(TypedValue::bool(false));
            }
            let r = self.evaluate_typed_expression(right)?;
            return Ok(TypedValue::bool(r.as_bool()));
        }
        if matches!(op, BinOp::Or) {
            let l = self.evaluate_typed_expression(left)?;
            if l.as_bool() {
                return Ok(TypedValue::bool(true));
            }
            let r = self.evaluate_typed_expression(right)?;
            return Ok(TypedValue::bool(r.as_bool()));
        }

        let lv = self.evaluate_typed_expression(left)?;
        let rv = self.evaluate_typed_expression(right)?;

        if lv.variable.is_pointer_value() || rv.variable.is_pointer_value() {
            return self.eval_pointer_binary_op(op, lv, rv, loc);
        }

        if matches!(op, BinOp::Add) && (lv.variable.is_string() || rv.variable.is_string()) {
            return Ok(TypedValue::string(format!(
                "{}{}",
                lv.variable.as_string(),
                rv.variable.as_string()
            )));
        }

        if matches!(
            op,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        ) {
            return Ok(TypedValue::bool(compare(op, &lv, &rv)));
        }

        let promoted = crate::numeric::promote(&lv.variable.var_type, &rv.variable.var_type);
        if promoted.is_float() {
            let a = lv.variable.as_double();
            let b = rv.variable.as_double();
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => {
                    if b == 0.0 {
                        return Err(locate(CbError::arithmetic("division by zero"), loc));
                    }
                    a / b
                }
                _ => return Err(locate(CbError::type_violation("operator not valid for floating-point operands"), loc)),
            };
            let mut v = Variable::new_scalar(promoted.clone());
            v.set_float_coherent(result);
            v.is_assigned = true;
            return Ok(TypedValue::new(v, InferredType::new(promoted)));
        }

        let a = lv.variable.as_numeric();
        let b = rv.variable.as_numeric();
        let result = match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => {
                if b == 0 {
                    return Err(locate(CbError::arithmetic("division by zero"), loc));
                }
                a / b
            }
            BinOp::Mod => {
                if b == 0 {
                    return Err(locate(CbError::arithmetic("modulo by zero"), loc));
                }
                a % b
            }
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            BinOp::Shl => a << b,
            BinOp::Shr => a >> b,
            _ => return Err(locate(CbError::declaration("unreachable comparison operator"), loc)),
        };
        let mut v = Variable::new_scalar(promoted.clone());
        v.value = result;
        v.is_assigned = true;
        Ok(TypedValue::new(v, InferredType::new(promoted)))
    }

    fn eval_pointer_binary_op(
        &self,
        op: BinOp,
        lv: TypedValue,
        rv: TypedValue,
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        if matches!(op, BinOp::Eq | BinOp::Ne) {
            let equal = lv.variable.value == rv.variable.value
                && lv.variable.pointee_var_name == rv.variable.pointee_var_name;
            return Ok(TypedValue::bool(if matches!(op, BinOp::Eq) { equal } else { !equal }));
        }
        if lv.variable.is_pointer_value() && rv.variable.is_pointer_value() && matches!(op, BinOp::Sub) {
            let size = crate::numeric::pointee_size(
                lv.variable.pointer_base_type.as_deref().unwrap_or(&TypeInfo::Tiny),
                |_| None,
            ) as i64;
            let diff = (lv.variable.value - rv.variable.value) / size.max(1);
            return Ok(TypedValue::int(diff));
        }
        let (ptr, offset) = if lv.variable.is_pointer_value() {
            (lv.variable, rv.variable.as_numeric())
        } else {
            (rv.variable, lv.variable.as_numeric())
        };
        if !matches!(op, BinOp::Add | BinOp::Sub) {
            return Err(locate(CbError::type_violation("pointer arithmetic supports only + and -"), loc));
        }
        let size = crate::numeric::pointee_size(ptr.pointer_base_type.as_deref().unwrap_or(&TypeInfo::Tiny), |_| None) as i64;
        let delta = if matches!(op, BinOp::Sub) { -offset } else { offset };
        let mut result = ptr;
        result.value += delta * size.max(1);
        Ok(TypedValue::from_variable(result))
    }

    fn eval_unary_op(
        &mut self,
        op: UnOp,
        operand: &AstNode,
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        match op {
            UnOp::AddressOf => {
                let name = array_base_name(operand)
                    .ok_or_else(|| locate(CbError::type_violation("'&' requires an addressable variable"), loc))?;
                if self.scope.find_variable(&name).is_none() && self.functions.contains_key(&name) {
                    let mut fp = Variable::new_scalar(TypeInfo::Void);
                    fp.is_function_pointer = true;
                    fp.function_pointer = Some(crate::value::FunctionPointerValue {
                        function_name: name,
                        address: 0,
                    });
                    fp.is_assigned = true;
                    return Ok(TypedValue::from_variable(fp));
                }
                let target = self
                    .scope
                    .find_variable(&name)
                    .ok_or_else(|| locate(CbError::access(format!("undefined variable '{name}'")), loc))?;
                let mut ptr = Variable::new_pointer(1, target.var_type.clone());
                ptr.value = 1; // non-null sentinel; real storage is resolved by name
                ptr.pointee_var_name = Some(name);
                return Ok(TypedValue::from_variable(ptr));
            }
            UnOp::Deref => {
                let ptr = self.evaluate_typed_expression(operand)?;
                if ptr.variable.is_null_pointer() {
                    return Err(locate(CbError::access("dereference of a null pointer"), loc));
                }
                if let Some(addr) = ptr.variable.heap_address {
                    if let Some(HeapSlot::StructValue(v)) = self.heap.get(&addr) {
                        return Ok(TypedValue::from_variable(v.clone()));
                    }
                    return Err(locate(CbError::access("dereference of a freed pointer"), loc));
                }
                let name = ptr
                    .variable
                    .pointee_var_name
                    .ok_or_else(|| locate(CbError::access("pointer has no known referent"), loc))?;
                let var = self
                    .scope
                    .find_variable(&name)
                    .ok_or_else(|| locate(CbError::access(format!("undefined variable '{name}'")), loc))?;
                return Ok(TypedValue::from_variable(var.clone()));
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let name = array_base_name(operand)
                    .ok_or_else(|| locate(CbError::type_violation("increment/decrement requires a variable"), loc))?;
                let var = self
                    .scope
                    .find_variable_mut(&name)
                    .ok_or_else(|| locate(CbError::access(format!("undefined variable '{name}'")), loc))?;
                let before = TypedValue::from_variable(var.clone());
                let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
                if var.var_type.is_float() {
                    var.set_float_coherent(var.as_double() + delta as f64);
                } else {
                    var.value += delta;
                }
                let after = TypedValue::from_variable(var.clone());
                return Ok(if matches!(op, UnOp::PreInc | UnOp::PreDec) { after } else { before });
            }
            _ => {}
        }

        let v = self.evaluate_typed_expression(operand)?;
        match op {
            UnOp::Neg => {
                if v.variable.var_type.is_float() {
                    let mut out = Variable::new_scalar(v.variable.var_type.clone());
                    out.set_float_coherent(-v.variable.as_double());
                    out.is_assigned = true;
                    Ok(TypedValue::new(out, v.inferred))
                } else {
                    let mut out = Variable::new_scalar(v.variable.var_type.clone());
                    out.value = -v.variable.as_numeric();
                    out.is_assigned = true;
                    Ok(TypedValue::new(out, v.inferred))
                }
            }
            UnOp::Plus => Ok(v),
            UnOp::Not => Ok(TypedValue::bool(!v.as_bool())),
            UnOp::BitNot => Ok(TypedValue::int(!v.variable.as_numeric())),
            _ => unreachable!("increment/addr-of/deref handled above"),
        }
    }

    fn eval_member_access(
        &mut self,
        base: &AstNode,
        member: &str,
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        let base_name = array_base_name(base)
            .ok_or_else(|| locate(CbError::access("member access on a non-addressable expression"), loc))?;
        let flat_name = format!("{base_name}.{member}");
        if let Some(var) = self.scope.find_variable(&flat_name) {
            return Ok(TypedValue::from_variable(var.clone()));
        }
        let base_var = self
            .scope
            .find_variable(&base_name)
            .ok_or_else(|| locate(CbError::access(format!("undefined variable '{base_name}'")), loc))?;
        self.structs
            .check_member_access(&base_var.struct_type_name, member, self.current_impl_struct.as_deref())
            .map_err(|e| locate(e, loc))?;
        let member_var = self
            .structs
            .get_struct_member(base_var, member)
            .ok_or_else(|| locate(CbError::access(format!("'{base_name}' has no member '{member}'")), loc))?;
        Ok(TypedValue::from_variable(member_var.clone()))
    }

    fn eval_member_array_access(
        &mut self,
        base: &AstNode,
        member: &str,
        indices: &[AstNode],
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        let base_name = array_base_name(base)
            .ok_or_else(|| locate(CbError::access("member array access on a non-addressable expression"), loc))?;
        let mut idx_values = Vec::with_capacity(indices.len());
        for idx in indices {
            idx_values.push(self.evaluate(idx)?);
        }
        let flat_name = format!(
            "{base_name}.{member}{}",
            idx_values.iter().map(|i| format!("[{i}]")).collect::<String>()
        );
        let var = self
            .scope
            .find_variable(&flat_name)
            .ok_or_else(|| locate(CbError::access("array index out of bounds"), loc))?;
        Ok(TypedValue::from_variable(var.clone()))
    }

    fn eval_func_call(
        &mut self,
        callee: &AstNode,
        arguments: &[AstNode],
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        if let AstNode::MemberAccess { base, name, .. } | AstNode::ArrowAccess { base, name, .. } = callee {
            return self.eval_method_call(base, name, arguments, loc);
        }
        let name = match callee {
            AstNode::Variable { name, .. } => {
                if let Some(fp) = self.scope.find_function_pointer(name) {
                    fp.function_name.clone()
                } else if let Some(var) = self.scope.find_variable(name).filter(|v| v.is_function_pointer) {
                    var.function_pointer
                        .as_ref()
                        .map(|f| f.function_name.clone())
                        .ok_or_else(|| locate(CbError::type_violation("function pointer has no target"), loc))?
                } else {
                    name.clone()
                }
            }
            _ => {
                let fp = self.evaluate_typed_expression(callee)?;
                fp.variable
                    .function_pointer
                    .map(|f| f.function_name)
                    .ok_or_else(|| locate(CbError::type_violation("callee is not a function or function pointer"), loc))?
            }
        };
        let mut args = Vec::with_capacity(arguments.len());
        let mut arg_names = Vec::with_capacity(arguments.len());
        for a in arguments {
            args.push(self.evaluate_typed_expression(a)?);
            arg_names.push(array_base_name(a));
        }
        self.call_function(&name, args, &arg_names).map_err(|e| locate(e, loc))
    }

    /// Dispatches `receiver.method(args)`/`receiver->method(args)`: resolves
    /// the receiver's struct type (following an interface view's
    /// `implementing_struct` back to the concrete struct it was built from),
    /// finds the `impl` method of that name, and runs it through
    /// `call_method` with `self` bound to the receiver.
    fn eval_method_call(
        &mut self,
        base: &AstNode,
        method: &str,
        arguments: &[AstNode],
        loc: Option<&cb_core::ast::SourceLocation>,
    ) -> CbResult<TypedValue> {
        let receiver_name = array_base_name(base)
            .ok_or_else(|| locate(CbError::access("method call on a non-addressable expression"), loc))?;
        let receiver = self
            .scope
            .find_variable(&receiver_name)
            .ok_or_else(|| locate(CbError::access(format!("undefined variable '{receiver_name}'")), loc))?;
        let struct_name = receiver
            .implementing_struct
            .clone()
            .unwrap_or_else(|| receiver.struct_type_name.clone());
        if struct_name.is_empty() {
            return Err(locate(
                CbError::type_violation(format!("'{receiver_name}' has no method '{method}'")),
                loc,
            ));
        }
        let (_, method_decl) = self
            .interfaces
            .find_method_for_struct(&struct_name, method)
            .ok_or_else(|| {
                locate(
                    CbError::access(format!("'{struct_name}' has no method '{method}'")),
                    loc,
                )
            })?;
        let method_decl = method_decl.clone();

        let mut args = Vec::with_capacity(arguments.len());
        let mut arg_names = Vec::with_capacity(arguments.len());
        for a in arguments {
            args.push(self.evaluate_typed_expression(a)?);
            arg_names.push(array_base_name(a));
        }
        self.call_method(&struct_name, &method_decl, &receiver_name, args, &arg_names)
            .map_err(|e| locate(e, loc))
    }

    fn eval_new_expr(&mut self, type_info: &TypeInfo, array_size: Option<&AstNode>) -> CbResult<TypedValue> {
        if let Some(size_expr) = array_size {
            let n = self.evaluate(size_expr)?;
            if n < 0 {
                return Err(CbError::resource("new[] requires a non-negative size"));
            }
            let elements = (0..n)
                .map(|_| match type_info {
                    TypeInfo::Struct(name) => self.structs.instantiate_default(name),
                    TypeInfo::String => Ok(Variable::new_string()),
                    other => Ok(Variable::new_scalar(other.clone())),
                })
                .collect::<CbResult<Vec<_>>>()?;
            let id = self.allocate_heap(HeapSlot::Buffer {
                element_type: type_info.clone(),
                elements,
            });
            let mut ptr = Variable::new_pointer(1, type_info.clone());
            ptr.value = id;
            ptr.heap_address = Some(id);
            return Ok(TypedValue::from_variable(ptr));
        }
        let instance = match type_info {
            TypeInfo::Struct(name) => self.structs.instantiate_default(name)?,
            TypeInfo::String => Variable::new_string(),
            other => Variable::new_scalar(other.clone()),
        };
        let id = self.allocate_heap(HeapSlot::StructValue(instance));
        let mut ptr = Variable::new_pointer(1, type_info.clone());
        ptr.value = id;
        ptr.heap_address = Some(id);
        Ok(TypedValue::from_variable(ptr))
    }

    fn eval_delete_expr(&mut self, target: &AstNode, loc: Option<&cb_core::ast::SourceLocation>) -> CbResult<TypedValue> {
        let ptr = self.evaluate_typed_expression(target)?;
        let addr = ptr
            .variable
            .heap_address
            .ok_or_else(|| locate(CbError::resource("'delete' target was not allocated with 'new'"), loc))?;
        self.free_heap(addr).map_err(|e| locate(e, loc))?;
        Ok(TypedValue::from_variable(Variable::default()))
    }

    fn eval_sizeof(&mut self, operand: &SizeofOperand) -> CbResult<TypedValue> {
        let size = match operand {
            SizeofOperand::Type(ty, name) => self.sizeof_type(ty, name.as_deref())?,
            // Fixes the original's "sizeof on an expression always returns
            // sizeof(i64)": infer the expression's own static type first,
            // restricted to "simple" targets (no call or assignment) so
            // `sizeof(x)` never has a side effect, matching the original's
            // own restriction on sizeof targets.
            SizeofOperand::Expr(expr) => {
                if contains_call_or_assignment(expr) {
                    return Err(CbError::type_violation(
                        "sizeof operand must not contain a call or assignment",
                    ));
                }
                let v = self.evaluate_typed_expression(expr)?;
                self.sizeof_type(&v.variable.var_type, None)?
            }
        };
        Ok(TypedValue::int(size as i64))
    }

    fn sizeof_type(&self, ty: &TypeInfo, name: Option<&str>) -> CbResult<usize> {
        if let Some(size) = ty.scalar_size() {
            return Ok(size);
        }
        match ty {
            TypeInfo::Struct(n) => {
                let struct_name = name.unwrap_or(n);
                let def = self
                    .structs
                    .find_struct_definition(struct_name)
                    .ok_or_else(|| CbError::declaration(format!("unknown struct type '{struct_name}'")))?;
                def.fields
                    .iter()
                    .map(|f| self.sizeof_type(&f.type_info, f.type_name.as_deref()))
                    .sum()
            }
            TypeInfo::String => Ok(24), // pointer + len + cap, matching the original's string header size
            _ => Ok(8),
        }
    }
}

impl Engine {
    /// Assignment as an expression: resolves `target` to the scope-store
    /// key it addresses and routes the write through the variable manager
    /// (plain/union) or directly through the struct/array mirror (member
    /// and indexed targets), returning the value that was stored.
    fn assign_to_target(&mut self, target: &AstNode, value: TypedValue) -> CbResult<TypedValue> {
        match target {
            AstNode::Variable { name, loc } => {
                let is_union = self
                    .scope
                    .find_variable(name)
                    .map(|v| !v.union_type_name.is_empty())
                    .unwrap_or(false);
                if is_union {
                    let alias = self.scope.find_variable(name).unwrap().union_type_name.clone();
                    crate::variable_manager::VariableManager::assign_union_value(
                        &mut self.scope,
                        &self.types,
                        &alias,
                        name,
                        value.clone(),
                    )
                    .map_err(|e| locate(e, loc.as_ref()))?;
                } else {
                    crate::variable_manager::VariableManager::assign_variable(
                        &mut self.scope,
                        &self.types,
                        &self.structs,
                        name,
                        value.clone(),
                        None,
                    )
                    .map_err(|e| locate(e, loc.as_ref()))?;
                }
                Ok(value)
            }
            AstNode::MemberAccess { base, name, loc } | AstNode::ArrowAccess { base, name, loc } => {
                let base_name = array_base_name(base)
                    .ok_or_else(|| locate(CbError::access("assignment target has no addressable base"), loc.as_ref()))?;
                let flat_name = format!("{base_name}.{name}");
                self.scope.declare_in_current(flat_name, value.variable.clone());
                if let Some(base_var) = self.scope.find_variable(&base_name) {
                    if base_var.is_struct {
                        self.structs
                            .sync_struct_members_from_direct_access(&mut self.scope, &base_name)
                            .map_err(|e| locate(e, loc.as_ref()))?;
                    }
                }
                Ok(value)
            }
            AstNode::ArrayRef { base, index, loc } => {
                let idx = self.evaluate(index)?;
                let indices = self.collect_array_indices(base, idx)?;
                let base_name = array_base_name(base)
                    .ok_or_else(|| locate(CbError::access("array assignment target has no addressable base"), loc.as_ref()))?;
                let flat = {
                    let base_var = self
                        .scope
                        .find_variable(&base_name)
                        .ok_or_else(|| locate(CbError::access(format!("undefined variable '{base_name}'")), loc.as_ref()))?;
                    base_var
                        .flat_index(&indices)
                        .ok_or_else(|| locate(CbError::access("array index out of bounds"), loc.as_ref()))?
                };
                let base_var = self
                    .scope
                    .find_variable_mut(&base_name)
                    .expect("checked present above");
                let Some(array) = &mut base_var.array else {
                    return Err(locate(CbError::type_violation(format!("'{base_name}' is not an array")), loc.as_ref()));
                };
                write_array_element(array, flat as usize, &value.variable)
                    .map_err(|e| locate(e, loc.as_ref()))?;
                Ok(value)
            }
            AstNode::MemberArrayAccess { base, name, indices, loc } => {
                let base_name = array_base_name(base)
                    .ok_or_else(|| locate(CbError::access("assignment target has no addressable base"), loc.as_ref()))?;
                let mut idx_values = Vec::with_capacity(indices.len());
                for idx in indices {
                    idx_values.push(self.evaluate(idx)?);
                }
                let flat_name = format!(
                    "{base_name}.{name}{}",
                    idx_values.iter().map(|i| format!("[{i}]")).collect::<String>()
                );
                self.scope.declare_in_current(flat_name, value.variable.clone());
                Ok(value)
            }
            _ => Err(CbError::type_violation("expression is not assignable")),
        }
    }
}

fn write_array_element(array: &mut ArrayPayload, flat: usize, value: &Variable) -> CbResult<()> {
    match array {
        ArrayPayload::Int(v) => {
            *v.get_mut(flat).ok_or_else(|| CbError::access("array index out of bounds"))? = value.as_numeric();
        }
        ArrayPayload::Float(v) => {
            *v.get_mut(flat).ok_or_else(|| CbError::access("array index out of bounds"))? = value.as_double();
        }
        ArrayPayload::Str(v) => {
            *v.get_mut(flat).ok_or_else(|| CbError::access("array index out of bounds"))? = value.as_string();
        }
    }
    Ok(())
}

fn array_element_as_typed_value(
    array: &ArrayPayload,
    flat: usize,
    loc: Option<&cb_core::ast::SourceLocation>,
) -> CbResult<TypedValue> {
    match array {
        ArrayPayload::Int(v) => {
            let x = *v
                .get(flat)
                .ok_or_else(|| locate(CbError::access("array index out of bounds"), loc))?;
            Ok(TypedValue::int(x))
        }
        ArrayPayload::Float(v) => {
            let x = *v
                .get(flat)
                .ok_or_else(|| locate(CbError::access("array index out of bounds"), loc))?;
            let mut var = Variable::new_scalar(TypeInfo::Double);
            var.set_float_coherent(x);
            var.is_assigned = true;
            Ok(TypedValue::from_variable(var))
        }
        ArrayPayload::Str(v) => {
            let x = v
                .get(flat)
                .ok_or_else(|| locate(CbError::access("array index out of bounds"), loc))?;
            Ok(TypedValue::string(x.clone()))
        }
    }
}

fn compare(op: BinOp, lv: &TypedValue, rv: &TypedValue) -> bool {
    if lv.variable.is_string() || rv.variable.is_string() {
        let a = lv.variable.as_string();
        let b = rv.variable.as_string();
        return match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => false,
        };
    }
    if lv.variable.var_type.is_float() || rv.variable.var_type.is_float() {
        let a = lv.variable.as_double();
        let b = rv.variable.as_double();
        return match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => false,
        };
    }
    let a = lv.variable.as_numeric();
    let b = rv.variable.as_numeric();
    match op {
        BinOp::Eq => a == b,
        BinOp::Ne => a != b,
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => false,
    }
}

/// Recovers the scope-key name an lvalue-ish expression addresses: a bare
/// variable, or the base of a chained member/array access (each layer is
/// folded into the flat dotted/bracketed name the scope store uses).
fn array_base_name(node: &AstNode) -> Option<String> {
    match node {
        AstNode::Variable { name, .. } => Some(name.clone()),
        AstNode::ArrayRef { base, .. } => array_base_name(base),
        AstNode::MemberAccess { base, name, .. } | AstNode::ArrowAccess { base, name, .. } => {
            array_base_name(base).map(|b| format!("{b}.{name}"))
        }
        _ => None,
    }
}

/// True if evaluating `node` could call a function or perform an
/// assignment — the restriction `sizeof` places on its expression operand.
fn contains_call_or_assignment(node: &AstNode) -> bool {
    match node {
        AstNode::FuncCall { .. } | AstNode::Assign { .. } => true,
        AstNode::NewExpr { .. } | AstNode::DeleteExpr { .. } => true,
        AstNode::UnaryOp { op, operand, .. } => {
            matches!(op, UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec)
                || contains_call_or_assignment(operand)
        }
        AstNode::BinaryOp { left, right, .. } => {
            contains_call_or_assignment(left) || contains_call_or_assignment(right)
        }
        AstNode::TernaryOp { cond, then_expr, else_expr, .. } => {
            contains_call_or_assignment(cond)
                || contains_call_or_assignment(then_expr)
                || contains_call_or_assignment(else_expr)
        }
        AstNode::ArrayRef { base, index, .. } => {
            contains_call_or_assignment(base) || contains_call_or_assignment(index)
        }
        AstNode::ArrayLiteral { elements, .. } => elements.iter().any(contains_call_or_assignment),
        AstNode::StructLiteral { fields, .. } => {
            fields.iter().any(|(_, v)| contains_call_or_assignment(v))
        }
        AstNode::MemberAccess { base, .. } | AstNode::ArrowAccess { base, .. } => {
            contains_call_or_assignment(base)
        }
        AstNode::MemberArrayAccess { base, indices, .. } => {
            contains_call_or_assignment(base) || indices.iter().any(contains_call_or_assignment)
        }
        AstNode::SizeofExpr { operand: SizeofOperand::Expr(inner), .. } => contains_call_or_assignment(inner),
        _ => false,
    }
}

fn locate(err: CbError, loc: Option<&cb_core::ast::SourceLocation>) -> CbError {
    match loc {
        Some(l) => err.with_location(l.clone()),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::ast::SourceLocation;

    fn num(value: i64) -> AstNode {
        AstNode::Number { value, type_hint: None, loc: None }
    }

    fn var(name: &str) -> AstNode {
        AstNode::Variable { name: name.to_string(), loc: None }
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let mut engine = Engine::new();
        let node = AstNode::BinaryOp {
            op: BinOp::Div,
            left: Box::new(num(1)),
            right: Box::new(num(0)),
            loc: Some(SourceLocation::new("t.cb", 0)),
        };
        assert!(engine.evaluate_typed_expression(&node).is_err());
    }

    #[test]
    fn string_concatenation_via_plus() {
        let mut engine = Engine::new();
        let node = AstNode::BinaryOp {
            op: BinOp::Add,
            left: Box::new(AstNode::StringLiteral { value: "Bob".into(), loc: None }),
            right: Box::new(AstNode::StringLiteral { value: " Smith".into(), loc: None }),
            loc: None,
        };
        let result = engine.evaluate_typed_expression(&node).unwrap();
        assert_eq!(result.variable.as_string(), "Bob Smith");
    }

    #[test]
    fn two_dimensional_array_access_matches_spec_scenario() {
        use cb_core::types::{ArrayTypeInfo, Dimension};
        let mut engine = Engine::new();
        let array_type = ArrayTypeInfo::new(TypeInfo::Int, vec![Dimension::fixed(2), Dimension::fixed(3)]);
        let mut m = Variable::new_array(&array_type);
        if let Some(ArrayPayload::Int(v)) = &mut m.array {
            v[5] = 6; // m[1][2]
        }
        engine.scope.declare_in_current("m", m);
        let node = AstNode::ArrayRef {
            base: Box::new(AstNode::ArrayRef { base: Box::new(var("m")), index: Box::new(num(1)), loc: None }),
            index: Box::new(num(2)),
            loc: None,
        };
        let result = engine.evaluate_typed_expression(&node).unwrap();
        assert_eq!(result.variable.as_numeric(), 6);
    }

    #[test]
    fn pre_and_post_increment_differ_in_returned_value() {
        let mut engine = Engine::new();
        let mut x = Variable::new_scalar(TypeInfo::Int);
        x.value = 5;
        engine.scope.declare_in_current("x", x);
        let pre = AstNode::UnaryOp { op: UnOp::PreInc, operand: Box::new(var("x")), loc: None };
        let result = engine.evaluate_typed_expression(&pre).unwrap();
        assert_eq!(result.variable.as_numeric(), 6);

        let post = AstNode::UnaryOp { op: UnOp::PostInc, operand: Box::new(var("x")), loc: None };
        let result = engine.evaluate_typed_expression(&post).unwrap();
        assert_eq!(result.variable.as_numeric(), 6);
        assert_eq!(engine.scope.find_variable("x").unwrap().value, 7);
    }

    #[test]
    fn nested_array_literal_flattens_to_one_row_major_array() {
        let mut engine = Engine::new();
        let node = AstNode::ArrayLiteral {
            elements: vec![
                AstNode::ArrayLiteral { elements: vec![num(1), num(2), num(3)], loc: None },
                AstNode::ArrayLiteral { elements: vec![num(4), num(5), num(6)], loc: None },
            ],
            loc: None,
        };
        let result = engine.evaluate_typed_expression(&node).unwrap();
        assert_eq!(result.variable.array_dimensions, vec![2, 3]);
        assert!(result.variable.is_multidimensional);
        let ArrayPayload::Int(values) = result.variable.array.unwrap() else {
            panic!("expected an int array payload");
        };
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn sizeof_on_expression_uses_the_expressions_own_type_not_a_hardcoded_default() {
        let mut engine = Engine::new();
        let mut c = Variable::new_scalar(TypeInfo::Char);
        c.value = 65;
        engine.scope.declare_in_current("c", c);
        let node = AstNode::SizeofExpr { operand: SizeofOperand::Expr(Box::new(var("c"))), loc: None };
        let result = engine.evaluate_typed_expression(&node).unwrap();
        assert_eq!(result.variable.as_numeric(), 1);
    }

    #[test]
    fn sizeof_rejects_expression_with_a_call() {
        let mut engine = Engine::new();
        let call = AstNode::FuncCall {
            callee: Box::new(var("f")),
            arguments: vec![],
            loc: None,
        };
        let node = AstNode::SizeofExpr { operand: SizeofOperand::Expr(Box::new(call)), loc: None };
        assert!(engine.evaluate_typed_expression(&node).is_err());
    }

    #[test]
    fn address_of_a_function_name_produces_a_callable_function_pointer() {
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

        let fp = engine
            .evaluate_typed_expression(&AstNode::UnaryOp {
                op: UnOp::AddressOf,
                operand: Box::new(var("answer")),
                loc: None,
            })
            .unwrap();
        assert!(fp.variable.is_function_pointer);
        assert_eq!(
            fp.variable.function_pointer.as_ref().unwrap().function_name,
            "answer"
        );

        engine.scope.declare_in_current("f", fp.variable);
        let result = engine
            .evaluate_typed_expression(&AstNode::FuncCall {
                callee: Box::new(var("f")),
                arguments: vec![],
                loc: None,
            })
            .unwrap();
        assert_eq!(result.variable.as_numeric(), 42);
    }

    #[test]
    fn sizeof_rejects_expression_with_an_assignment() {
        let mut engine = Engine::new();
        engine.scope.declare_in_current("x", Variable::new_scalar(TypeInfo::Int));
        let assign = AstNode::Assign {
            target: Box::new(var("x")),
            value: Box::new(num(1)),
            loc: None,
        };
        let node = AstNode::SizeofExpr { operand: SizeofOperand::Expr(Box::new(assign)), loc: None };
        assert!(engine.evaluate_typed_expression(&node).is_err());
    }
}
