//! `TypedValue`: the currency of the expression evaluator — a `Variable`
//! paired with the `InferredType` the evaluator computed for it. Keeping
//! the two together lets binary-operator dispatch pick a promotion rule
//! without re-deriving the type from the payload every time.

use crate::value::Variable;
use cb_core::types::{InferredType, TypeInfo};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub variable: Variable,
    pub inferred: InferredType,
}

impl TypedValue {
    pub fn new(variable: Variable, inferred: InferredType) -> Self {
        TypedValue { variable, inferred }
    }

    pub fn from_variable(variable: Variable) -> Self {
        let tag = variable.var_type.clone();
        TypedValue {
            variable,
            inferred: InferredType::new(tag),
        }
    }

    pub fn int(value: i64) -> Self {
        let mut v = Variable::new_scalar(TypeInfo::Int);
        v.value = value;
        v.is_assigned = true;
        TypedValue::from_variable(v)
    }

    pub fn bool(value: bool) -> Self {
        let mut v = Variable::new_scalar(TypeInfo::Bool);
        v.value = if value { 1 } else { 0 };
        v.is_assigned = true;
        TypedValue::from_variable(v)
    }

    pub fn string(value: impl Into<String>) -> Self {
        let mut v = Variable::new_string();
        v.str_value = value.into();
        v.is_assigned = true;
        TypedValue::from_variable(v)
    }

    pub fn as_bool(&self) -> bool {
        if self.variable.var_type.is_float() {
            self.variable.as_double() != 0.0
        } else {
            self.variable.as_numeric() != 0
        }
    }
}
