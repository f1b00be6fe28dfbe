//! The value cell: `Variable`, the single record that holds any Cb runtime
//! value plus its metadata.
//!
//! Grounded in `examples/original_source/src/backend/interpreter/core/interpreter.h`'s
//! `struct Variable`: a struct-of-fields rather than a tagged union, because
//! the spec's invariant 3 ("nested `struct_members[m]` and the flattened
//! dotted variable `<var>.<m>` are equivalent representations") requires a
//! struct variable to carry both a nested-map payload *and* (via its flat
//! mirror entries living alongside it in the same scope) scalar/array
//! payloads simultaneously during sync. An `enum` tagged strictly by
//! `TypeInfo` would force a choice between "this cell is a struct" and
//! "this cell also has scalar data" that the sync algorithm needs to avoid.
//!
//! Fields that are genuinely absent for a given `type` use `Option`; fields
//! where zero is an observably correct default (the original relies on
//! this, e.g. a freshly declared `int` reading as `0`) stay non-`Option`.

use cb_core::types::{ArrayTypeInfo, TypeInfo, TypeQualifiers};
use std::collections::HashMap;

/// An array payload, keeping exactly one canonical N-D representation
/// (Design Notes §9 resolution): a row-major flat vector plus the
/// dimension list, regardless of whether the array is 1-D or N-D. 1-D
/// views are projected on demand rather than kept as a second mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayPayload {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl ArrayPayload {
    pub fn len(&self) -> usize {
        match self {
            ArrayPayload::Int(v) => v.len(),
            ArrayPayload::Float(v) => v.len(),
            ArrayPayload::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A function pointer value: the name of the referenced function plus an
/// opaque "address" (an index into the function registry) the evaluator
/// uses to invoke it without re-resolving by name on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPointerValue {
    pub function_name: String,
    pub address: i64,
}

/// The value cell. Selected payload is driven by `var_type`; see the
/// per-field docs for which fields are meaningful for which tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub var_type: TypeInfo,
    pub qualifiers: TypeQualifiers,
    pub is_assigned: bool,

    /// Set on a `T& r = x;`-style reference declaration: the scope key `r`
    /// should resolve to, chasing through `VariableManager::resolve_reference_target`.
    /// A reference parameter's binding is handled separately (copy-in plus
    /// write-back at call exit), so this is only populated for general local
    /// reference declarations.
    pub reference_target: Option<String>,

    // Scalar integer payload.
    pub value: i64,

    // Scalar float payload: kept coherent across all three precisions, the
    // canonical value is whichever `var_type` says is active.
    pub float_value: f32,
    pub double_value: f64,
    pub quad_value: f64,

    // String payload.
    pub str_value: String,

    // Array payload (1-D and N-D share one representation).
    pub array: Option<ArrayPayload>,
    pub array_dimensions: Vec<i32>,
    pub is_multidimensional: bool,

    // Struct payload.
    pub is_struct: bool,
    pub struct_type_name: String,
    pub struct_members: HashMap<String, Variable>,
    /// Preserves declaration order for deterministic flat-mirror sync and
    /// `println`-style whole-struct formatting.
    pub struct_member_order: Vec<String>,
    pub is_private_member: bool,

    // Union payload.
    pub union_type_name: String,
    pub current_union_variant: Option<TypeInfo>,

    // Enum payload.
    pub is_enum: bool,
    pub enum_type_name: String,
    pub enum_variant: String,
    pub associated_int_value: Option<i64>,
    pub associated_str_value: Option<String>,

    // Pointer payload.
    pub is_pointer: bool,
    pub pointer_depth: i32,
    pub pointer_base_type: Option<Box<TypeInfo>>,
    pub pointer_base_type_name: Option<String>,
    /// For a pointer produced by `&variable` (rather than `new`): the
    /// scope-resolvable name of the variable it points at. A tree-walker
    /// has no real stack addresses, so address-of/dereference of a local is
    /// modeled by name the same way the original interpreter core does.
    pub pointee_var_name: Option<String>,
    /// For a pointer produced by `new`: the heap slot id, distinguishing it
    /// from a name-addressed stack pointer above.
    pub heap_address: Option<i64>,

    // Function pointer payload.
    pub is_function_pointer: bool,
    pub function_pointer: Option<FunctionPointerValue>,

    // Interface view payload.
    pub interface_name: Option<String>,
    pub implementing_struct: Option<String>,
}

impl Default for Variable {
    fn default() -> Self {
        Variable {
            var_type: TypeInfo::Int,
            qualifiers: TypeQualifiers::default(),
            is_assigned: false,
            reference_target: None,
            value: 0,
            float_value: 0.0,
            double_value: 0.0,
            quad_value: 0.0,
            str_value: String::new(),
            array: None,
            array_dimensions: Vec::new(),
            is_multidimensional: false,
            is_struct: false,
            struct_type_name: String::new(),
            struct_members: HashMap::new(),
            struct_member_order: Vec::new(),
            is_private_member: false,
            union_type_name: String::new(),
            current_union_variant: None,
            is_enum: false,
            enum_type_name: String::new(),
            enum_variant: String::new(),
            associated_int_value: None,
            associated_str_value: None,
            is_pointer: false,
            pointer_depth: 0,
            pointer_base_type: None,
            pointer_base_type_name: None,
            pointee_var_name: None,
            heap_address: None,
            is_function_pointer: false,
            function_pointer: None,
            interface_name: None,
            implementing_struct: None,
        }
    }
}

impl Variable {
    /// A freshly declared scalar of the given type, zeroed per the spec's
    /// lifecycle rule ("initializes scalar payload to zero/empty").
    pub fn new_scalar(var_type: TypeInfo) -> Self {
        Variable {
            var_type,
            ..Default::default()
        }
    }

    pub fn new_string() -> Self {
        Variable {
            var_type: TypeInfo::String,
            str_value: String::new(),
            ..Default::default()
        }
    }

    pub fn new_struct(struct_type_name: impl Into<String>) -> Self {
        Variable {
            var_type: TypeInfo::Struct(String::new()),
            is_struct: true,
            struct_type_name: struct_type_name.into(),
            ..Default::default()
        }
    }

    pub fn new_array(array_info: &ArrayTypeInfo) -> Self {
        let is_multidim = array_info.dimensions.len() > 1;
        let total = array_info.total_elements().unwrap_or(0);
        let array = match array_info.base_type {
            TypeInfo::Float | TypeInfo::Double | TypeInfo::Quad => {
                ArrayPayload::Float(vec![0.0; total])
            }
            TypeInfo::String => ArrayPayload::Str(vec![String::new(); total]),
            _ => ArrayPayload::Int(vec![0; total]),
        };
        Variable {
            var_type: TypeInfo::Array(Box::new(array_info.base_type.clone())),
            array: Some(array),
            array_dimensions: array_info.dimensions.iter().map(|d| d.size).collect(),
            is_multidimensional: is_multidim,
            ..Default::default()
        }
    }

    pub fn new_pointer(depth: i32, base: TypeInfo) -> Self {
        Variable {
            var_type: TypeInfo::Pointer(Box::new(base.clone())),
            is_pointer: true,
            pointer_depth: depth,
            pointer_base_type: Some(Box::new(base)),
            value: 0, // null
            ..Default::default()
        }
    }

    pub fn is_null_pointer(&self) -> bool {
        self.is_pointer && self.value == 0
    }

    pub fn is_numeric(&self) -> bool {
        self.var_type.is_numeric()
    }

    pub fn is_string(&self) -> bool {
        matches!(self.var_type, TypeInfo::String)
    }

    pub fn is_struct_value(&self) -> bool {
        self.is_struct
    }

    pub fn is_pointer_value(&self) -> bool {
        self.is_pointer
    }

    pub fn as_quad(&self) -> f64 {
        match self.var_type {
            TypeInfo::Quad => self.quad_value,
            TypeInfo::Double => self.double_value,
            TypeInfo::Float => self.float_value as f64,
            _ => self.value as f64,
        }
    }

    pub fn as_double(&self) -> f64 {
        self.as_quad()
    }

    pub fn as_numeric(&self) -> i64 {
        match self.var_type {
            TypeInfo::Quad | TypeInfo::Double => self.as_double() as i64,
            TypeInfo::Float => self.float_value as i64,
            _ => self.value,
        }
    }

    pub fn as_string(&self) -> String {
        if self.is_string() {
            self.str_value.clone()
        } else if self.var_type.is_float() {
            self.as_double().to_string()
        } else if self.is_enum {
            self.enum_variant.clone()
        } else {
            self.value.to_string()
        }
    }

    /// Sets every float-precision field coherently from a canonical f64,
    /// per invariant: "the triple is always coherent".
    pub fn set_float_coherent(&mut self, canonical: f64) {
        self.quad_value = canonical;
        self.double_value = canonical;
        self.float_value = canonical as f32;
    }

    /// Row-major flat index for N-D element access; `None` on dimension
    /// mismatch or out-of-bounds index (spec: "out-of-bounds is fatal",
    /// left to the caller to turn into a `CbError`).
    pub fn flat_index(&self, indices: &[i64]) -> Option<i64> {
        if indices.len() != self.array_dimensions.len() {
            return None;
        }
        let mut flat: i64 = 0;
        for (idx, &dim) in indices.iter().zip(self.array_dimensions.iter()) {
            if *idx < 0 || *idx >= dim as i64 {
                return None;
            }
            flat = flat.checked_mul(dim as i64)?.checked_add(*idx)?;
        }
        Some(flat)
    }

    pub fn total_array_len(&self) -> usize {
        self.array.as_ref().map(ArrayPayload::len).unwrap_or(0)
    }
}
