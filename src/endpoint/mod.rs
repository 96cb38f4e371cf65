//! Endpoint resolution.
//!
//! Determines the WebSocket URL for each connect attempt from layered
//! sources. See [`EndpointResolver`] for the order.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `discovery` | HTTP discovery against the launch origin |
//! | `environment` | Process/user/machine scoped variables |
//! | `launch` | Launch-location query parameter |
//! | `resolver` | Ordering and remediation |

// ============================================================================
// Submodules
// ============================================================================

/// HTTP discovery.
pub mod discovery;

/// Scoped environment lookup.
pub mod environment;

/// Launch-location query parsing.
pub mod launch;

/// Layered resolver.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use environment::{EnvScope, EnvironmentSource, StaticEnvironment, SystemEnvironment};
pub use resolver::{Endpoint, EndpointResolver, EndpointSource, ResolverConfig};
