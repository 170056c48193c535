//! Configuration for a router list manager.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::Deserialize;

/// An error that occurs while trying to construct a configuration object.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigBuildError {
    /// A mandatory field was not present.
    #[error("Field was not provided: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },
    /// A single field had a value that proved to be unusable.
    #[error("Value of {field} was incorrect: {problem}")]
    Invalid {
        /// The name of the invalid field
        field: String,
        /// A description of the problem.
        problem: String,
    },
}

impl From<derive_builder::UninitializedFieldError> for ConfigBuildError {
    fn from(val: derive_builder::UninitializedFieldError) -> Self {
        ConfigBuildError::MissingField {
            field: val.field_name().to_string(),
        }
    }
}

/// Rules for maintaining a router list.
///
/// This type is immutable once constructed.  To build one, use
/// [`RouterListConfigBuilder`], or deserialize it from a string.
#[derive(Debug, Clone, Builder, Deserialize, Eq, PartialEq)]
#[builder(build_fn(validate = "Self::validate", error = "ConfigBuildError"))]
#[serde(deny_unknown_fields)]
pub struct RouterListConfig {
    /// How old may a relay's descriptor become before we forget the relay?
    ///
    /// Directory caches are kept however old they get.
    #[builder(default = "default_max_router_age()")]
    #[serde(with = "humantime_serde", default = "default_max_router_age")]
    pub(crate) max_router_age: Duration,

    /// A file listing the directory servers we trust.
    ///
    /// When we can't find a directory server, we reload our trusted
    /// directories from here.  If this is unset, we use the built-in list
    /// instead.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub(crate) router_file: Option<PathBuf>,

    /// Are we accepting connections from other relays?
    ///
    /// If so, when we have to pick an arbitrary relay, we only pick relays
    /// that we're already connected to.
    #[builder(default)]
    #[serde(default)]
    pub(crate) accept_relay_connections: bool,
}

/// Return the default value for `max_router_age`.
fn default_max_router_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl RouterListConfigBuilder {
    /// Check that the configured values make sense.
    fn validate(&self) -> Result<(), ConfigBuildError> {
        if self.max_router_age == Some(Duration::ZERO) {
            return Err(ConfigBuildError::Invalid {
                field: "max_router_age".into(),
                problem: "must be nonzero".into(),
            });
        }
        Ok(())
    }
}

impl RouterListConfig {
    /// Return a new [`RouterListConfigBuilder`].
    pub fn builder() -> RouterListConfigBuilder {
        RouterListConfigBuilder::default()
    }

    /// Return the age after which we forget non-directory relays.
    pub fn max_router_age(&self) -> Duration {
        self.max_router_age
    }

    /// Return the file of trusted directory servers, if there is one.
    pub fn router_file(&self) -> Option<&PathBuf> {
        self.router_file.as_ref()
    }

    /// Return true if we accept connections from other relays.
    pub fn accept_relay_connections(&self) -> bool {
        self.accept_relay_connections
    }
}

impl Default for RouterListConfig {
    fn default() -> Self {
        RouterListConfig {
            max_router_age: default_max_router_age(),
            router_file: None,
            accept_relay_connections: false,
        }
    }
}

impl From<RouterListConfig> for RouterListConfigBuilder {
    fn from(cfg: RouterListConfig) -> RouterListConfigBuilder {
        let mut builder = RouterListConfigBuilder::default();
        builder
            .max_router_age(cfg.max_router_age)
            .accept_relay_connections(cfg.accept_relay_connections);
        if let Some(path) = cfg.router_file {
            builder.router_file(path);
        }
        builder
    }
}
