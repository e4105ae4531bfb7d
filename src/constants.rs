//! # System Constants
//!
//! Precedence bounds, well-known component names, and descriptor attribute
//! keys shared by the registration pipeline and configuration processing.

/// Highest possible precedence: sorts before everything else.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Lowest possible precedence: the implicit order of anything unordered.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// Well-known component names registered by the bootstrap
pub mod names {
    pub const CONFIGURATION_PROCESSOR: &str = "internal.configurationProcessor";
    pub const BOUNDARY_CHECKER: &str = "internal.boundaryChecker";
    pub const LISTENER_DETECTOR: &str = "internal.listenerDetector";
}

/// Attribute keys stored in a descriptor's attribute bag
pub mod attributes {
    /// `"full"` or `"lite"` once a descriptor was recognized as a configuration
    pub const CONFIGURATION_CLASS: &str = "configuration_class";
    /// Explicit order of a configuration candidate
    pub const ORDER: &str = "order";
    /// Set on full configurations once factory-method calls route through the registry
    pub const ENHANCED: &str = "enhanced";
    /// Consumers that wrap instances must keep the declared type
    pub const PRESERVE_TARGET_TYPE: &str = "preserve_target_type";

    pub const CONFIGURATION_FULL: &str = "full";
    pub const CONFIGURATION_LITE: &str = "lite";
}

/// Event names published by the container
pub mod events {
    pub const CONTEXT_REFRESHED: &str = "context.refreshed";
}

/// Delimiters accepted between base packages in a component scan
pub const PACKAGE_DELIMITERS: &[char] = &[',', ';', ' ', '\t', '\n'];

/// Cache key used for the default transaction manager
pub const DEFAULT_MANAGER_KEY: &str = "__default_transaction_manager__";
