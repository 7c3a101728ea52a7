//! Variable store
//!
//! Two tiers share the same table type: one global table owned by the
//! script world and one local table per entity. Variables are created on
//! first write. Reads of unset names return the type's zero value and leave
//! the table untouched.

use std::collections::BTreeMap;

use crate::value::{VarKey, VarScope, VarType, VarValue};

/// One tier of script variables, keyed by type and bare name
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    variables: BTreeMap<(VarType, String), VarValue>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, if the variable has been written
    pub fn get(&self, ty: VarType, name: &str) -> Option<&VarValue> {
        self.variables.get(&(ty, name.to_string()))
    }

    /// Value of the variable, or the zero value of `ty` when unset
    pub fn value(&self, ty: VarType, name: &str) -> VarValue {
        self.get(ty, name).cloned().unwrap_or_else(|| ty.zero())
    }

    pub fn text(&self, name: &str) -> String {
        match self.get(VarType::Text, name) {
            Some(VarValue::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.get(VarType::Int, name) {
            Some(value) => value.as_int(),
            None => 0,
        }
    }

    pub fn float(&self, name: &str) -> f64 {
        match self.get(VarType::Float, name) {
            Some(value) => value.as_float(),
            None => 0.0,
        }
    }

    /// Write a variable, converting the value to the slot's type
    pub fn set(&mut self, ty: VarType, name: &str, value: VarValue) {
        self.variables.insert((ty, name.to_string()), value.coerce(ty));
    }

    /// Write through a structured key (scope is ignored here)
    pub fn set_key(&mut self, key: &VarKey, value: VarValue) {
        self.set(key.ty, &key.name, value);
    }

    /// Remove a variable, returning its old value
    pub fn remove(&mut self, ty: VarType, name: &str) -> Option<VarValue> {
        self.variables.remove(&(ty, name.to_string()))
    }

    pub fn contains(&self, ty: VarType, name: &str) -> bool {
        self.get(ty, name).is_some()
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (VarType, &str, &VarValue)> {
        self.variables
            .iter()
            .map(|((ty, name), value)| (*ty, name.as_str(), value))
    }

    /// Copy of the table keyed by script name (sigil included)
    pub fn snapshot(&self, scope: VarScope) -> BTreeMap<String, VarValue> {
        self.iter()
            .map(|(ty, name, value)| (VarKey::new(scope, ty, name).to_string(), value.clone()))
            .collect()
    }
}
