use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::name::Name;
use crate::ast::r#type::Type;

use super::{Error, Result};

pub struct Aliases<'program> {
    table: &'program FxHashMap<Name, Name>,
}

impl<'program> Aliases<'program> {
    pub fn new(table: &'program FxHashMap<Name, Name>) -> Self {
        Aliases { table }
    }

    /// Resolves every alias once so a cycle is reported even if it is never used.
    pub fn validate(&self) -> Result<()> {
        let mut aliases = self.table.keys().collect::<Vec<_>>();
        aliases.sort();
        aliases
            .into_iter()
            .try_for_each(|alias| self.resolve(alias).map(|_| ()))
    }

    /// Keywords map directly, aliases are followed, anything unknown is int32.
    pub fn resolve(&self, name: &Name) -> Result<Type> {
        let mut seen = FxHashSet::default();
        let mut current = name;
        loop {
            if let Some(r#type) = Type::from_keyword(current.as_str()) {
                return Ok(r#type);
            }
            let Some(target) = self.table.get(current) else {
                return Ok(Type::Int32);
            };
            if !seen.insert(current) {
                return Err(Error::AliasCycle {
                    alias: name.clone(),
                });
            }
            current = target;
        }
    }
}
