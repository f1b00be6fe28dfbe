//! Type manager (§4.D): typedef resolution, primitive name mapping, range
//! checking, and the union allow-set tests that power union assignment.

use crate::typed_value::TypedValue;
use cb_core::error::{CbError, CbResult};
use cb_core::types::TypeInfo;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct TypedefEntry {
    type_info: TypeInfo,
    /// If the target is itself a typedef name, the chain continues here.
    target_name: Option<String>,
}

/// One member of a union's declared allow-set.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionMember {
    Scalar(TypeInfo),
    /// A named struct/enum/typedef allowed by value.
    Custom(String),
    /// An array of the given element type is allowed.
    Array(TypeInfo),
}

#[derive(Debug, Clone, Default)]
struct UnionDef {
    members: Vec<UnionMember>,
}

#[derive(Debug, Default)]
pub struct TypeManager {
    typedefs: HashMap<String, TypedefEntry>,
    unions: HashMap<String, UnionDef>,
}

impl TypeManager {
    pub fn new() -> Self {
        TypeManager::default()
    }

    /// Registers `alias -> target`. Fails on redefinition, and fails if the
    /// new alias would close a cycle through the existing chain — the
    /// original claims acyclicity "by construction" but never actually
    /// walks transitive chains of three-or-more aliases; this closes that
    /// gap (recorded in DESIGN.md) rather than reproducing it.
    pub fn register_typedef(
        &mut self,
        alias: &str,
        target: TypeInfo,
        target_name: Option<String>,
    ) -> CbResult<()> {
        if self.typedefs.contains_key(alias) {
            return Err(CbError::declaration(format!(
                "typedef '{alias}' is already defined"
            )));
        }
        if let Some(ref target_alias) = target_name {
            let mut seen = vec![alias.to_string()];
            let mut cursor = target_alias.clone();
            loop {
                if cursor == alias {
                    return Err(CbError::declaration(format!(
                        "typedef '{alias}' would create a cycle through '{target_alias}'"
                    )));
                }
                if seen.contains(&cursor) {
                    break;
                }
                seen.push(cursor.clone());
                match self.typedefs.get(&cursor) {
                    Some(entry) => match &entry.target_name {
                        Some(next) => cursor = next.clone(),
                        None => break,
                    },
                    None => break,
                }
            }
        }
        self.typedefs.insert(
            alias.to_string(),
            TypedefEntry {
                type_info: target,
                target_name,
            },
        );
        Ok(())
    }

    /// Recursive resolution to the terminal name/type. Terminates because
    /// registration rejects cycles; a defensive visited-set still guards
    /// against any that slip through.
    pub fn resolve_typedef(&self, name: &str) -> (TypeInfo, String) {
        let mut seen = Vec::new();
        let mut cursor = name.to_string();
        loop {
            if seen.contains(&cursor) {
                break;
            }
            seen.push(cursor.clone());
            match self.typedefs.get(&cursor) {
                Some(entry) => match &entry.target_name {
                    Some(next) => cursor = next.clone(),
                    None => return (entry.type_info.clone(), cursor),
                },
                None => break,
            }
        }
        (TypeInfo::Unknown, cursor)
    }

    pub fn is_typedef(&self, name: &str) -> bool {
        self.typedefs.contains_key(name)
    }

    /// Maps a canonical type name (primitive keyword, `struct X`, `enum X`,
    /// or a registered typedef alias) to its `TypeInfo`.
    pub fn string_to_type_info(&self, name: &str) -> Option<TypeInfo> {
        let trimmed = name.trim();
        if let Some(rest) = trimmed.strip_prefix("struct ") {
            return Some(TypeInfo::Struct(rest.trim().to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("enum ") {
            return Some(TypeInfo::Enum(rest.trim().to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("union ") {
            return Some(TypeInfo::Union(rest.trim().to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("interface ") {
            return Some(TypeInfo::Interface(rest.trim().to_string()));
        }
        let primitive = match trimmed {
            "void" => Some(TypeInfo::Void),
            "bool" => Some(TypeInfo::Bool),
            "tiny" => Some(TypeInfo::Tiny),
            "short" => Some(TypeInfo::Short),
            "char" => Some(TypeInfo::Char),
            "int" => Some(TypeInfo::Int),
            "long" => Some(TypeInfo::Long),
            "float" => Some(TypeInfo::Float),
            "double" => Some(TypeInfo::Double),
            "quad" => Some(TypeInfo::Quad),
            "bigint" => Some(TypeInfo::BigInt),
            "string" => Some(TypeInfo::String),
            _ => None,
        };
        if primitive.is_some() {
            return primitive;
        }
        if self.is_typedef(trimmed) {
            return Some(self.resolve_typedef(trimmed).0);
        }
        None
    }

    /// Bounded-integer range check; pointer/pointer-array types are exempt.
    pub fn check_type_range(
        &self,
        ty: &TypeInfo,
        value: i64,
        var_name: &str,
        is_unsigned: bool,
    ) -> CbResult<()> {
        if ty.is_pointer() || ty.is_array() {
            return Ok(());
        }
        if crate::numeric::in_range(ty, value, is_unsigned) {
            Ok(())
        } else {
            Err(CbError::type_violation(format!(
                "value {value} out of range for '{var_name}' of type {ty}"
            )))
        }
    }

    pub fn register_union(&mut self, alias: &str, members: Vec<UnionMember>) {
        self.unions.insert(alias.to_string(), UnionDef { members });
    }

    pub fn is_union_alias(&self, alias: &str) -> bool {
        self.unions.contains_key(alias)
    }

    pub fn is_value_allowed_for_union(&self, alias: &str, value: &TypedValue) -> bool {
        let Some(def) = self.unions.get(alias) else {
            return false;
        };
        let ty = &value.variable.var_type;
        def.members.iter().any(|m| match m {
            UnionMember::Scalar(t) => t == ty,
            UnionMember::Custom(name) => match ty {
                TypeInfo::Struct(n) | TypeInfo::Enum(n) => n == name,
                _ => false,
            },
            UnionMember::Array(_) => false,
        })
    }

    pub fn is_custom_type_allowed_for_union(&self, alias: &str, type_name: &str) -> bool {
        let Some(def) = self.unions.get(alias) else {
            return false;
        };
        def.members
            .iter()
            .any(|m| matches!(m, UnionMember::Custom(name) if name == type_name))
    }

    /// Checks whether an array of `element_type` may be assigned to a
    /// union with this allow-set (the spec names this by the array
    /// variable's name; callers resolve the name to its element type via
    /// the scope store before calling this).
    pub fn is_array_type_allowed_for_union(&self, alias: &str, element_type: &TypeInfo) -> bool {
        let Some(def) = self.unions.get(alias) else {
            return false;
        };
        def.members
            .iter()
            .any(|m| matches!(m, UnionMember::Array(t) if t == element_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_chain_resolves_to_terminal_name() {
        let mut tm = TypeManager::new();
        tm.register_typedef("MyInt", TypeInfo::Int, None).unwrap();
        tm.register_typedef("Id", TypeInfo::Unknown, Some("MyInt".into()))
            .unwrap();
        tm.register_typedef("UserId", TypeInfo::Unknown, Some("Id".into()))
            .unwrap();
        let (ty, terminal) = tm.resolve_typedef("UserId");
        assert_eq!(ty, TypeInfo::Int);
        assert_eq!(terminal, "MyInt");
    }

    #[test]
    fn typedef_redefinition_rejected() {
        let mut tm = TypeManager::new();
        tm.register_typedef("A", TypeInfo::Int, None).unwrap();
        assert!(tm.register_typedef("A", TypeInfo::Long, None).is_err());
    }

    #[test]
    fn typedef_cycle_rejected() {
        let mut tm = TypeManager::new();
        tm.register_typedef("A", TypeInfo::Unknown, Some("B".into()))
            .unwrap();
        assert!(tm
            .register_typedef("B", TypeInfo::Unknown, Some("A".into()))
            .is_err());
    }

    #[test]
    fn union_allow_set_accepts_declared_members_only() {
        let mut tm = TypeManager::new();
        tm.register_union(
            "IntOrStr",
            vec![UnionMember::Scalar(TypeInfo::Int), UnionMember::Scalar(TypeInfo::String)],
        );
        assert!(tm.is_value_allowed_for_union("IntOrStr", &TypedValue::int(5)));
        assert!(tm.is_value_allowed_for_union("IntOrStr", &TypedValue::string("x")));
        assert!(!tm.is_value_allowed_for_union("IntOrStr", &TypedValue::bool(true)));
    }
}
