//! Enum manager (§4.G): enum definition registry and variant->value
//! lookup, with associated-value support for enum-with-payload variants.

use cb_core::ast::EnumAssociatedValue;
use cb_core::error::{CbError, CbResult};
use std::collections::{HashMap, HashSet};

/// One registered variant: its discriminant plus, if declared, the
/// associated payload distinct from that discriminant.
#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
    pub associated: Option<EnumAssociatedValue>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    /// Ordered variant list, in declaration order.
    pub variants: Vec<EnumVariant>,
}

impl EnumDef {
    pub fn value_of(&self, variant: &str) -> Option<i64> {
        self.variants.iter().find(|v| v.name == variant).map(|v| v.value)
    }

    pub fn variant(&self, variant: &str) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.name == variant)
    }
}

#[derive(Debug, Default)]
pub struct EnumManager {
    defs: HashMap<String, EnumDef>,
}

impl EnumManager {
    pub fn new() -> Self {
        EnumManager::default()
    }

    /// Registration fails on a duplicate enum name, duplicate variant
    /// value within the enum, or duplicate variant name.
    pub fn register_enum(&mut self, name: &str, variants: Vec<EnumVariant>) -> CbResult<()> {
        if self.defs.contains_key(name) {
            return Err(CbError::declaration(format!("enum '{name}' is already defined")));
        }
        let mut seen_names = HashSet::new();
        let mut seen_values = HashSet::new();
        for variant in &variants {
            if !seen_names.insert(variant.name.clone()) {
                return Err(CbError::declaration(format!(
                    "enum '{name}' declares variant '{}' more than once",
                    variant.name
                )));
            }
            if !seen_values.insert(variant.value) {
                return Err(CbError::declaration(format!(
                    "enum '{name}' reuses discriminant value {} across variants",
                    variant.value
                )));
            }
        }
        self.defs.insert(
            name.to_string(),
            EnumDef {
                name: name.to_string(),
                variants,
            },
        );
        Ok(())
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDef> {
        self.defs.get(name)
    }

    pub fn lookup(&self, enum_name: &str, variant: &str) -> CbResult<i64> {
        self.lookup_variant(enum_name, variant).map(|v| v.value)
    }

    /// The full variant record (discriminant plus any associated payload),
    /// for constructing the Variable that `EnumAccess` evaluates to.
    pub fn lookup_variant(&self, enum_name: &str, variant: &str) -> CbResult<&EnumVariant> {
        let def = self
            .find_enum(enum_name)
            .ok_or_else(|| CbError::access(format!("unknown enum '{enum_name}'")))?;
        def.variant(variant)
            .ok_or_else(|| CbError::access(format!("enum '{enum_name}' has no variant '{variant}'")))
    }
}
