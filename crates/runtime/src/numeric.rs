//! Shared numeric coercion/promotion helpers, grounded in the original's
//! `managers/common_operations.cpp` (per SPEC_FULL.md's "supplemented
//! features" list): the promotion ladder and unsigned-clamp rule are used
//! by both the expression evaluator and the variable manager, so they live
//! here as free functions rather than being duplicated in each.

use cb_core::types::TypeInfo;
pub use cb_core::types::promote;

/// Clamp a negative value assigned to an unsigned variable to zero.
/// Returns `(clamped_value, warned)`; the caller logs the warning (spec:
/// "non-fatal, stderr note, execution continues" — never wraps).
pub fn clamp_unsigned(value: i64, is_unsigned: bool) -> (i64, bool) {
    if is_unsigned && value < 0 {
        (0, true)
    } else {
        (value, false)
    }
}

/// `check_type_range`: bounded integer types only; pointers and
/// pointer-arrays are exempt per the spec.
pub fn in_range(ty: &TypeInfo, value: i64, is_unsigned: bool) -> bool {
    match ty.integer_range(is_unsigned) {
        Some((min, max)) => value >= min && value <= max,
        None => true,
    }
}

/// Pointer-arithmetic element size lookup, used by `p + n` / `p - p`.
pub fn pointee_size(pointee: &TypeInfo, struct_size: impl Fn(&str) -> Option<usize>) -> usize {
    match pointee {
        TypeInfo::Struct(name) => struct_size(name).unwrap_or(1),
        other => other.scalar_size().unwrap_or(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_negative_clamps_to_zero() {
        assert_eq!(clamp_unsigned(-3, true), (0, true));
        assert_eq!(clamp_unsigned(-3, false), (-3, false));
    }

    #[test]
    fn range_check_respects_bounds() {
        assert!(in_range(&TypeInfo::Tiny, 127, false));
        assert!(!in_range(&TypeInfo::Tiny, 128, false));
        assert!(in_range(&TypeInfo::Pointer(Box::new(TypeInfo::Int)), i64::MAX, false));
    }
}
