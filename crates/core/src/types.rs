//! Type descriptor model for Cb.
//!
//! `TypeInfo` is the closed tag set described in the spec: scalars, the
//! aggregate kinds (struct/enum/union/interface), pointers, and arrays.
//! Unlike the C++ original, which encodes "array of T" as `T + ArrayBase`
//! and recovers the base type by subtraction, this port represents arrays
//! as `TypeInfo::Array(Box<TypeInfo>)` directly — Rust's enums give us the
//! same closed tag set without the offset arithmetic, and pattern matching
//! replaces the subtraction trick one-for-one.
//!
//! Qualifiers (`unsigned`, `const`, pointer-const, pointee-const,
//! reference) are orthogonal flags, not separate tags — they live on
//! `TypeQualifiers`, carried by the declaration/variable, not by the type
//! tag itself.

use std::fmt;

/// The closed set of type tags in Cb.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Unknown,
    Void,
    Bool,
    /// 8-bit integer.
    Tiny,
    /// 16-bit integer.
    Short,
    /// 8-bit character.
    Char,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    Float,
    Double,
    /// Extended precision ("quad").
    Quad,
    BigInt,
    String,
    Struct(String),
    Enum(String),
    Union(String),
    Interface(String),
    Pointer(Box<TypeInfo>),
    Array(Box<TypeInfo>),
}

impl TypeInfo {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeInfo::Tiny
                | TypeInfo::Short
                | TypeInfo::Char
                | TypeInfo::Int
                | TypeInfo::Long
                | TypeInfo::BigInt
                | TypeInfo::Bool
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TypeInfo::Float | TypeInfo::Double | TypeInfo::Quad)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeInfo::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeInfo::Array(_))
    }

    /// The base type of an array; `None` if `self` is not an array.
    /// Direct analogue of the original's "subtract the array base offset".
    pub fn array_base(&self) -> Option<&TypeInfo> {
        match self {
            TypeInfo::Array(base) => Some(base),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&TypeInfo> {
        match self {
            TypeInfo::Pointer(base) => Some(base),
            _ => None,
        }
    }

    /// Fixed per-element size in bytes, per the sizeof table in the spec.
    /// Struct/array sizes are computed elsewhere (they need the struct
    /// registry / dimension list), so this returns `None` for those.
    pub fn scalar_size(&self) -> Option<usize> {
        match self {
            TypeInfo::Tiny | TypeInfo::Char | TypeInfo::Bool => Some(1),
            TypeInfo::Short => Some(2),
            TypeInfo::Int | TypeInfo::Float => Some(4),
            TypeInfo::Long | TypeInfo::Double | TypeInfo::Pointer(_) => Some(8),
            TypeInfo::Quad => Some(16),
            TypeInfo::BigInt => Some(8),
            _ => None,
        }
    }

    /// Inclusive range for bounded integer types; `None` for unbounded or
    /// non-integer types (pointers and pointer-arrays are exempt from range
    /// checking per the spec).
    pub fn integer_range(&self, is_unsigned: bool) -> Option<(i64, i64)> {
        let bits: u32 = match self {
            TypeInfo::Tiny | TypeInfo::Char => 8,
            TypeInfo::Short => 16,
            TypeInfo::Int => 32,
            TypeInfo::Long => 64,
            TypeInfo::Bool => return Some((0, 1)),
            _ => return None,
        };
        if is_unsigned {
            if bits >= 64 {
                Some((0, i64::MAX))
            } else {
                Some((0, (1i64 << bits) - 1))
            }
        } else if bits >= 64 {
            Some((i64::MIN, i64::MAX))
        } else {
            Some((-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1))
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInfo::Unknown => write!(f, "unknown"),
            TypeInfo::Void => write!(f, "void"),
            TypeInfo::Bool => write!(f, "bool"),
            TypeInfo::Tiny => write!(f, "tiny"),
            TypeInfo::Short => write!(f, "short"),
            TypeInfo::Char => write!(f, "char"),
            TypeInfo::Int => write!(f, "int"),
            TypeInfo::Long => write!(f, "long"),
            TypeInfo::Float => write!(f, "float"),
            TypeInfo::Double => write!(f, "double"),
            TypeInfo::Quad => write!(f, "quad"),
            TypeInfo::BigInt => write!(f, "bigint"),
            TypeInfo::String => write!(f, "string"),
            TypeInfo::Struct(n) => write!(f, "struct {n}"),
            TypeInfo::Enum(n) => write!(f, "enum {n}"),
            TypeInfo::Union(n) => write!(f, "union {n}"),
            TypeInfo::Interface(n) => write!(f, "interface {n}"),
            TypeInfo::Pointer(base) => write!(f, "{base}*"),
            TypeInfo::Array(base) => write!(f, "{base}[]"),
        }
    }
}

/// Orthogonal qualifiers carried by a declaration or variable cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeQualifiers {
    pub is_unsigned: bool,
    pub is_const: bool,
    pub is_pointer_const: bool,
    pub is_pointee_const: bool,
    pub is_reference: bool,
}

/// One dimension of a (possibly multi-dimensional) array declaration.
///
/// A dimension with `size == -1` and a non-empty `size_expr` requires
/// resolving a constant variable at declaration time; failure to resolve is
/// a declaration error.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub size: i32,
    pub is_dynamic: bool,
    pub size_expr: String,
}

impl Dimension {
    pub fn fixed(size: i32) -> Self {
        Dimension {
            size,
            is_dynamic: false,
            size_expr: String::new(),
        }
    }

    pub fn resolved(&self) -> bool {
        self.size >= 0
    }
}

/// Full array type: base scalar/struct type plus ordered dimension list.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayTypeInfo {
    pub base_type: TypeInfo,
    pub dimensions: Vec<Dimension>,
}

impl ArrayTypeInfo {
    pub fn new(base_type: TypeInfo, dimensions: Vec<Dimension>) -> Self {
        ArrayTypeInfo {
            base_type,
            dimensions,
        }
    }

    /// Total element count; `None` if any dimension is unresolved.
    pub fn total_elements(&self) -> Option<usize> {
        let mut total: usize = 1;
        for dim in &self.dimensions {
            if !dim.resolved() {
                return None;
            }
            total = total.checked_mul(dim.size as usize)?;
        }
        Some(total)
    }

    /// Row-major flat index for a set of per-dimension indices.
    /// `flat(i1,...,in) = i1*d2*...*dn + i2*d3*...*dn + ... + in`
    pub fn flat_index(&self, indices: &[i64]) -> Option<i64> {
        if indices.len() != self.dimensions.len() {
            return None;
        }
        let mut flat: i64 = 0;
        for (idx, dim) in indices.iter().zip(self.dimensions.iter()) {
            let size = dim.size as i64;
            if *idx < 0 || (dim.resolved() && *idx >= size) {
                return None;
            }
            flat = flat
                .checked_mul(size)?
                .checked_add(*idx)?;
        }
        Some(flat)
    }
}

/// The canonical type + optional carried name (struct/enum/union/interface
/// alias) produced by the expression evaluator. Distinct from `TypeInfo`
/// because `TypeInfo::Struct` etc. already carry the name — `InferredType`
/// additionally tracks whether the value arrived through a typedef alias,
/// which matters for union-allow-set and interface-impl lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredType {
    pub tag: TypeInfo,
    pub alias_name: Option<String>,
}

impl InferredType {
    pub fn new(tag: TypeInfo) -> Self {
        InferredType {
            tag,
            alias_name: None,
        }
    }

    pub fn with_alias(tag: TypeInfo, alias: impl Into<String>) -> Self {
        InferredType {
            tag,
            alias_name: Some(alias.into()),
        }
    }
}

/// Numeric promotion ladder used by the expression evaluator:
/// `Quad > Double > Float > Int`.
pub fn promote(a: &TypeInfo, b: &TypeInfo) -> TypeInfo {
    if matches!(a, TypeInfo::Quad) || matches!(b, TypeInfo::Quad) {
        TypeInfo::Quad
    } else if matches!(a, TypeInfo::Double) || matches!(b, TypeInfo::Double) {
        TypeInfo::Double
    } else if matches!(a, TypeInfo::Float) || matches!(b, TypeInfo::Float) {
        TypeInfo::Float
    } else if matches!(a, TypeInfo::Long) || matches!(b, TypeInfo::Long) {
        TypeInfo::Long
    } else {
        TypeInfo::Int
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_base_recovers_element_type() {
        let arr = TypeInfo::Array(Box::new(TypeInfo::Int));
        assert_eq!(arr.array_base(), Some(&TypeInfo::Int));
    }

    #[test]
    fn unsigned_range_never_negative() {
        assert_eq!(TypeInfo::Char.integer_range(true), Some((0, 255)));
    }

    #[test]
    fn row_major_flat_index_matches_spec_example() {
        // int[2][3] m; m[1][2] -> flat index 1*3 + 2 = 5
        let arr = ArrayTypeInfo::new(
            TypeInfo::Int,
            vec![Dimension::fixed(2), Dimension::fixed(3)],
        );
        assert_eq!(arr.flat_index(&[1, 2]), Some(5));
    }

    #[test]
    fn promotion_prefers_quad_over_everything() {
        assert_eq!(promote(&TypeInfo::Quad, &TypeInfo::Int), TypeInfo::Quad);
        assert_eq!(promote(&TypeInfo::Double, &TypeInfo::Float), TypeInfo::Double);
    }
}
