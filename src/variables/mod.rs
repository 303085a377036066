//! Scoped variable storage
//!
//! Variables live in one of four scopes. Unscoped lookups search
//! local, then collection, then environment, then global, and the first
//! scope holding the key wins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace tier for a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    Global,
    Environment,
    #[serde(alias = "workspace")]
    Collection,
    Local,
}

impl VariableScope {
    /// Scopes in lookup order, highest precedence first
    pub const PRECEDENCE: [VariableScope; 4] = [
        VariableScope::Local,
        VariableScope::Collection,
        VariableScope::Environment,
        VariableScope::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariableScope::Global => "global",
            VariableScope::Environment => "environment",
            VariableScope::Collection => "collection",
            VariableScope::Local => "local",
        }
    }
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_scope() -> VariableScope {
    VariableScope::Environment
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    #[serde(default = "default_scope")]
    pub scope: VariableScope,
}

impl Variable {
    pub fn new(key: &str, value: &str, scope: VariableScope) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            scope,
        }
    }

    pub fn global(key: &str, value: &str) -> Self {
        Self::new(key, value, VariableScope::Global)
    }

    pub fn environment(key: &str, value: &str) -> Self {
        Self::new(key, value, VariableScope::Environment)
    }

    pub fn collection(key: &str, value: &str) -> Self {
        Self::new(key, value, VariableScope::Collection)
    }

    pub fn local(key: &str, value: &str) -> Self {
        Self::new(key, value, VariableScope::Local)
    }
}

/// Variables keyed by `(scope, key)`
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    global: IndexMap<String, Variable>,
    environment: IndexMap<String, Variable>,
    collection: IndexMap<String, Variable>,
    local: IndexMap<String, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, scope: VariableScope) -> &IndexMap<String, Variable> {
        match scope {
            VariableScope::Global => &self.global,
            VariableScope::Environment => &self.environment,
            VariableScope::Collection => &self.collection,
            VariableScope::Local => &self.local,
        }
    }

    fn scope_mut(&mut self, scope: VariableScope) -> &mut IndexMap<String, Variable> {
        match scope {
            VariableScope::Global => &mut self.global,
            VariableScope::Environment => &mut self.environment,
            VariableScope::Collection => &mut self.collection,
            VariableScope::Local => &mut self.local,
        }
    }

    /// Upsert by `(scope, key)`
    pub fn set(&mut self, variable: Variable) {
        let scope = variable.scope;
        self.scope_mut(scope).insert(variable.key.clone(), variable);
    }

    /// Exact-scope lookup when `scope` is given, precedence search otherwise
    pub fn get(&self, key: &str, scope: Option<VariableScope>) -> Option<&Variable> {
        match scope {
            Some(scope) => self.scope(scope).get(key),
            None => VariableScope::PRECEDENCE
                .iter()
                .find_map(|scope| self.scope(*scope).get(key)),
        }
    }

    /// Every variable of one scope, or of all scopes concatenated
    pub fn get_all(&self, scope: Option<VariableScope>) -> Vec<Variable> {
        match scope {
            Some(scope) => self.scope(scope).values().cloned().collect(),
            None => [
                VariableScope::Global,
                VariableScope::Environment,
                VariableScope::Collection,
                VariableScope::Local,
            ]
            .iter()
            .flat_map(|scope| self.scope(*scope).values().cloned())
            .collect(),
        }
    }

    /// Remove a single key from one scope
    pub fn remove(&mut self, key: &str, scope: VariableScope) -> Option<Variable> {
        self.scope_mut(scope).shift_remove(key)
    }

    pub fn clear_scope(&mut self, scope: VariableScope) {
        self.scope_mut(scope).clear();
    }

    pub fn clear_all(&mut self) {
        for scope in VariableScope::PRECEDENCE {
            self.clear_scope(scope);
        }
    }

    /// Flattened key to value map for one scope
    pub fn export_scope(&self, scope: VariableScope) -> IndexMap<String, String> {
        self.scope(scope)
            .iter()
            .map(|(key, variable)| (key.clone(), variable.value.clone()))
            .collect()
    }

    pub fn import(&mut self, variables: impl IntoIterator<Item = Variable>) {
        for variable in variables {
            self.set(variable);
        }
    }

    /// Snapshot for interpolation, ordered highest precedence first.
    ///
    /// The interpolator applies variables in list order, so a key shadowed by
    /// a higher scope has already been substituted by the time the lower
    /// scope's entry is reached.
    pub fn snapshot(&self) -> Vec<Variable> {
        VariableScope::PRECEDENCE
            .iter()
            .flat_map(|scope| self.scope(*scope).values().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        VariableScope::PRECEDENCE
            .iter()
            .map(|scope| self.scope(*scope).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
