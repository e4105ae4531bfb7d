//! Attribute sources answer which joinpoints are transactional.

use crate::transaction::attribute::TransactionAttribute;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifies an intercepted method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    pub declaring_type: String,
    pub method: String,
}

impl MethodId {
    pub fn new(declaring_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method: method.into(),
        }
    }

    /// `Type.method`, qualified by the target type when one is known
    pub fn qualified_name(&self, target_type: Option<&str>) -> String {
        format!("{}.{}", target_type.unwrap_or(&self.declaring_type), self.method)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.method)
    }
}

pub trait AttributeSource: Send + Sync {
    /// Attribute for the method, or `None` when it is not transactional
    fn get_attribute(&self, method: &MethodId, target_type: Option<&str>) -> Option<TransactionAttribute>;
}

/// Match `text` against a pattern where `*` stands for any run of characters
pub fn simple_match(pattern: &str, text: &str) -> bool {
    let Some(first_star) = pattern.find('*') else {
        return pattern == text;
    };
    let (prefix, rest) = pattern.split_at(first_star);
    if !text.starts_with(prefix) {
        return false;
    }
    let segments: Vec<&str> = rest.split('*').collect();
    let mut remaining = &text[prefix.len()..];
    let last = segments.len() - 1;
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if index == last {
            return remaining.ends_with(segment);
        }
        match remaining.find(segment) {
            Some(position) => remaining = &remaining[position + segment.len()..],
            None => return false,
        }
    }
    true
}

/// Attributes keyed by method-name pattern, e.g. `"get*"` or `"*Order"`.
/// An exact name beats any pattern; among patterns the longest wins.
#[derive(Debug, Default, Clone)]
pub struct NameMatchAttributeSource {
    patterns: Vec<(String, TransactionAttribute)>,
}

impl NameMatchAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, pattern: impl Into<String>, attribute: TransactionAttribute) -> Self {
        self.add_method(pattern, attribute);
        self
    }

    pub fn add_method(&mut self, pattern: impl Into<String>, attribute: TransactionAttribute) {
        self.patterns.push((pattern.into(), attribute));
    }
}

impl AttributeSource for NameMatchAttributeSource {
    fn get_attribute(&self, method: &MethodId, _target_type: Option<&str>) -> Option<TransactionAttribute> {
        if let Some((_, attribute)) = self.patterns.iter().find(|(pattern, _)| *pattern == method.method) {
            return Some(attribute.clone());
        }

        let mut best: Option<&(String, TransactionAttribute)> = None;
        for entry in &self.patterns {
            if simple_match(&entry.0, &method.method)
                && best.map_or(true, |(best_pattern, _)| best_pattern.len() <= entry.0.len())
            {
                best = Some(entry);
            }
        }
        best.map(|(_, attribute)| attribute.clone())
    }
}

/// Attributes keyed by exact `Type.method` names
#[derive(Debug, Default, Clone)]
pub struct MethodMapAttributeSource {
    methods: HashMap<String, TransactionAttribute>,
}

impl MethodMapAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, qualified_name: impl Into<String>, attribute: TransactionAttribute) -> Self {
        self.methods.insert(qualified_name.into(), attribute);
        self
    }
}

impl AttributeSource for MethodMapAttributeSource {
    fn get_attribute(&self, method: &MethodId, target_type: Option<&str>) -> Option<TransactionAttribute> {
        target_type
            .and_then(|target| self.methods.get(&method.qualified_name(Some(target))))
            .or_else(|| self.methods.get(&method.qualified_name(None)))
            .cloned()
    }
}

/// Asks each source in turn; the first answer wins
#[derive(Default, Clone)]
pub struct CompositeAttributeSource {
    sources: Vec<Arc<dyn AttributeSource>>,
}

impl CompositeAttributeSource {
    pub fn new(sources: Vec<Arc<dyn AttributeSource>>) -> Self {
        Self { sources }
    }
}

impl AttributeSource for CompositeAttributeSource {
    fn get_attribute(&self, method: &MethodId, target_type: Option<&str>) -> Option<TransactionAttribute> {
        self.sources
            .iter()
            .find_map(|source| source.get_attribute(method, target_type))
    }
}

impl fmt::Debug for CompositeAttributeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAttributeSource")
            .field("sources", &self.sources.len())
            .finish()
    }
}
