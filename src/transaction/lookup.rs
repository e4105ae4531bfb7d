//! Resolution of transaction managers by qualifier or as the single default.

use crate::error::{TransactionError, TransactionResult};
use crate::transaction::manager::TransactionManager;

pub trait ManagerLookup: Send + Sync {
    /// Manager whose name or one of whose qualifiers equals `qualifier`
    fn lookup_by_qualifier(&self, qualifier: &str) -> TransactionResult<TransactionManager>;

    /// The one manager in scope
    fn lookup_default(&self) -> TransactionResult<TransactionManager>;
}

#[derive(Debug, Clone)]
struct ManagerEntry {
    name: String,
    qualifiers: Vec<String>,
    primary: bool,
    manager: TransactionManager,
}

/// Fixed set of named managers
#[derive(Debug, Default, Clone)]
pub struct StaticManagerLookup {
    entries: Vec<ManagerEntry>,
}

impl StaticManagerLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manager(self, name: impl Into<String>, manager: TransactionManager) -> Self {
        self.with_qualified_manager(name, Vec::<String>::new(), manager)
    }

    pub fn with_qualified_manager<Q: Into<String>>(
        mut self,
        name: impl Into<String>,
        qualifiers: impl IntoIterator<Item = Q>,
        manager: TransactionManager,
    ) -> Self {
        self.entries.push(ManagerEntry {
            name: name.into(),
            qualifiers: qualifiers.into_iter().map(Into::into).collect(),
            primary: false,
            manager,
        });
        self
    }

    /// Register a manager that wins default lookup among several
    pub fn with_primary_manager(mut self, name: impl Into<String>, manager: TransactionManager) -> Self {
        self.entries.push(ManagerEntry {
            name: name.into(),
            qualifiers: Vec::new(),
            primary: true,
            manager,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn single(qualifier: &str, matches: Vec<&ManagerEntry>) -> TransactionResult<TransactionManager> {
        match matches.as_slice() {
            [] => Err(TransactionError::ManagerNotFound {
                qualifier: qualifier.to_string(),
            }),
            [entry] => Ok(entry.manager.clone()),
            many => Err(TransactionError::AmbiguousManager {
                qualifier: qualifier.to_string(),
                candidates: many.iter().map(|entry| entry.name.clone()).collect(),
            }),
        }
    }
}

impl ManagerLookup for StaticManagerLookup {
    fn lookup_by_qualifier(&self, qualifier: &str) -> TransactionResult<TransactionManager> {
        let by_name: Vec<&ManagerEntry> = self.entries.iter().filter(|entry| entry.name == qualifier).collect();
        if !by_name.is_empty() {
            return Self::single(qualifier, by_name);
        }
        let by_qualifier = self
            .entries
            .iter()
            .filter(|entry| entry.qualifiers.iter().any(|q| q == qualifier))
            .collect();
        Self::single(qualifier, by_qualifier)
    }

    fn lookup_default(&self) -> TransactionResult<TransactionManager> {
        if self.entries.len() > 1 {
            let primaries: Vec<&ManagerEntry> = self.entries.iter().filter(|entry| entry.primary).collect();
            if !primaries.is_empty() {
                return Self::single("default", primaries);
            }
        }
        Self::single("default", self.entries.iter().collect())
    }
}
