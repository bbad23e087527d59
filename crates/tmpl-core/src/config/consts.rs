//! Defaults shared across the compiler

/// Delimiters used when none (or empty ones) are configured.
pub mod delimiters {
    pub const LEFT: &str = "{{";
    pub const RIGHT: &str = "}}";
}

/// Template name that is always considered defined. Layouts invoke it, and the
/// render surface registers content under it on request.
pub const OUTLET: &str = "outlet";
