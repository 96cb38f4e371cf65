//! Layered endpoint resolution.
//!
//! # Resolution Order
//!
//! First non-empty result wins:
//!
//! 1. `WebSocketURL` query parameter of the launch location
//! 2. Discovery request against the launch location's origin
//! 3. `NEURO_SDK_WS_URL` at process, user, then machine scope
//!
//! Nothing is cached: every connect attempt resolves from scratch so an
//! operator can retarget between attempts.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::discovery::Discovery;
use super::environment::{EnvScope, EnvironmentSource, SystemEnvironment};
use super::launch::query_param;

// ============================================================================
// Constants
// ============================================================================

/// Query key looked up in the launch location.
pub const DEFAULT_PARAMETER_KEY: &str = "WebSocketURL";

/// Environment variable and discovery path segment.
pub const DEFAULT_VARIABLE_NAME: &str = "NEURO_SDK_WS_URL";

/// Timeout for the discovery request.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Endpoint
// ============================================================================

/// Where an endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    /// Launch location query parameter.
    LaunchParameter,
    /// Discovery request.
    Discovery,
    /// Environment variable at the given scope.
    Environment(EnvScope),
}

impl fmt::Display for EndpointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LaunchParameter => f.write_str("launch parameter"),
            Self::Discovery => f.write_str("discovery"),
            Self::Environment(scope) => write!(f, "{scope} environment"),
        }
    }
}

/// A resolved endpoint URL, valid for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    source: EndpointSource,
}

impl Endpoint {
    /// Creates an endpoint.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>, source: EndpointSource) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }

    /// Returns the URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns where the URL came from.
    #[inline]
    #[must_use]
    pub fn source(&self) -> EndpointSource {
        self.source
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

// ============================================================================
// ResolverConfig
// ============================================================================

/// Settings for [`EndpointResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Location the process was launched from, if any.
    pub launch_location: Option<String>,
    /// Query key holding the endpoint.
    pub parameter_key: String,
    /// Environment variable and discovery path segment.
    pub variable_name: String,
    /// Timeout for the discovery request.
    pub discovery_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            launch_location: None,
            parameter_key: DEFAULT_PARAMETER_KEY.to_string(),
            variable_name: DEFAULT_VARIABLE_NAME.to_string(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

// ============================================================================
// EndpointResolver
// ============================================================================

/// Resolves the endpoint from the launch location, discovery and
/// environment.
#[derive(Clone)]
pub struct EndpointResolver {
    config: ResolverConfig,
    discovery: Discovery,
    environment: Arc<dyn EnvironmentSource>,
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EndpointResolver {
    /// Creates a resolver reading the system environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the discovery client cannot be built.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        Self::with_environment(config, Arc::new(SystemEnvironment::new()))
    }

    /// Creates a resolver with a custom environment source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the discovery client cannot be built.
    pub fn with_environment(
        config: ResolverConfig,
        environment: Arc<dyn EnvironmentSource>,
    ) -> Result<Self> {
        let discovery = Discovery::new(config.discovery_timeout)?;
        Ok(Self {
            config,
            discovery,
            environment,
        })
    }

    /// Returns the resolver settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEndpointFound`] with a remediation hint when no
    /// source yields a value.
    pub async fn resolve(&self) -> Result<Endpoint> {
        let endpoint = match self.from_launch_parameter() {
            Some(endpoint) => Some(endpoint),
            None => match self.from_discovery().await {
                Some(endpoint) => Some(endpoint),
                None => self.from_environment(),
            },
        };

        match endpoint {
            Some(endpoint) => {
                info!(url = %endpoint, source = %endpoint.source(), "Resolved WebSocket endpoint");
                Ok(endpoint)
            }
            None => Err(Error::no_endpoint_found(self.remediation())),
        }
    }

    fn from_launch_parameter(&self) -> Option<Endpoint> {
        let location = self.config.launch_location.as_deref()?;
        let url = query_param(location, &self.config.parameter_key)?;
        Some(Endpoint::new(url.trim(), EndpointSource::LaunchParameter))
    }

    async fn from_discovery(&self) -> Option<Endpoint> {
        let location = self.config.launch_location.as_deref()?;
        let discovery_url = Discovery::discovery_url(location, &self.config.variable_name)?;

        debug!(url = %discovery_url, "Requesting endpoint discovery");
        let url = self.discovery.fetch(&discovery_url).await?;
        Some(Endpoint::new(url, EndpointSource::Discovery))
    }

    fn from_environment(&self) -> Option<Endpoint> {
        EnvScope::ALL.into_iter().find_map(|scope| {
            let value = self.environment.var(scope, &self.config.variable_name)?;
            let value = value.trim();
            (!value.is_empty()).then(|| Endpoint::new(value, EndpointSource::Environment(scope)))
        })
    }

    /// Operator hint matching how the process was launched.
    fn remediation(&self) -> String {
        let variable = &self.config.variable_name;
        match self.config.launch_location.as_deref() {
            Some(location) => format!(
                "launched from {location}. Add ?{key}=ws://<host>:<port> to the launch URL, \
                 serve the endpoint at /$env/{variable} on the launch origin, \
                 or set the {variable} environment variable",
                key = self.config.parameter_key,
            ),
            None => format!(
                "set the {variable} environment variable \
                 (e.g. {variable}=ws://localhost:8000) and reconnect"
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
