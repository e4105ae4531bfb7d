//! # Ordering Policy
//!
//! Deterministic total order over processors and interceptors. Items sort
//! by priority class first (priority-ordered, then ordered, then unordered),
//! then by ascending order value. Ties keep discovery order because every
//! sort here is stable.

use crate::constants::LOWEST_PRECEDENCE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared priority of a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "order")]
pub enum Priority {
    /// No ordering declared; sorts as [`LOWEST_PRECEDENCE`] in the last class
    #[default]
    Unordered,
    /// Explicit order value
    Ordered(i32),
    /// Explicit order value in the highest priority class
    PriorityOrdered(i32),
}

impl Priority {
    pub fn tier(&self) -> PriorityTier {
        match self {
            Self::PriorityOrdered(_) => PriorityTier::Highest,
            Self::Ordered(_) => PriorityTier::Explicit,
            Self::Unordered => PriorityTier::Unordered,
        }
    }

    pub fn order_value(&self) -> i32 {
        match self {
            Self::PriorityOrdered(order) | Self::Ordered(order) => *order,
            Self::Unordered => LOWEST_PRECEDENCE,
        }
    }

    fn sort_key(&self) -> (u8, i32) {
        (self.tier().rank(), self.order_value())
    }
}

/// Processing tier derived from a [`Priority`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Highest,
    Explicit,
    Unordered,
}

impl PriorityTier {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Highest => 0,
            Self::Explicit => 1,
            Self::Unordered => 2,
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => write!(f, "priority_ordered"),
            Self::Explicit => write!(f, "ordered"),
            Self::Unordered => write!(f, "unordered"),
        }
    }
}

/// Anything that can report a [`Priority`]
pub trait Ordered {
    fn priority(&self) -> Priority;
}

impl Ordered for Priority {
    fn priority(&self) -> Priority {
        *self
    }
}

/// Pairs an item with the priority it was discovered with
#[derive(Debug, Clone)]
pub struct Prioritized<T> {
    pub name: String,
    pub priority: Priority,
    pub item: T,
}

impl<T> Prioritized<T> {
    pub fn new(name: impl Into<String>, priority: Priority, item: T) -> Self {
        Self {
            name: name.into(),
            priority,
            item,
        }
    }
}

impl<T> Ordered for Prioritized<T> {
    fn priority(&self) -> Priority {
        self.priority
    }
}

/// Stable sort in place by (priority class, order value, discovery index)
pub fn sort_by_priority<T: Ordered>(items: &mut [T]) {
    items.sort_by_key(|item| item.priority().sort_key());
}

/// Consume a sequence and return it in priority order
pub fn order<T: Ordered>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut items: Vec<T> = items.into_iter().collect();
    sort_by_priority(&mut items);
    items
}
