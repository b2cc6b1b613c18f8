//! Trace configuration for instrumented clients.

use std::sync::Arc;

use crate::config::CommandToggles;
use crate::tracing_support::{Attribute, ParentBasedSampler, Sampler, attribute_keys};
use crate::types::Command;

/// The instance label used when none is configured.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Tracing configuration for an instrumented client.
///
/// Options are fixed at construction and shared read-only by every call
/// made through the client.
///
/// ## Instance Label
///
/// The instance label identifies which store deployment a call went to. It
/// defaults to [`DEFAULT_INSTANCE_NAME`]; an empty name counts as unset.
/// When set explicitly, a single `cache.instance` attribute carrying it is
/// appended to the default attributes, and an entry with that key supplied
/// by the caller is replaced.
///
/// ## Root Spans
///
/// With `allow_root` off (the default), only calls that continue an
/// existing trace are traced. Turning it on lets calls without an active
/// span start new root spans.
///
/// ## Example
///
/// ```rust
/// use cachetrace::{CommandToggles, TraceOptions};
/// use cachetrace::tracing_support::Attribute;
///
/// let options = TraceOptions::builder()
///     .allow_root(true)
///     .instance_name("sessions")
///     .default_attributes(vec![Attribute::new("db.system", "redis")])
///     .commands(CommandToggles { get: true, set: true, ..CommandToggles::NONE })
///     .build();
///
/// assert_eq!(options.instance_name(), "sessions");
/// assert_eq!(options.default_attributes().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TraceOptions {
    allow_root: bool,
    instance_name: String,
    default_attributes: Vec<Attribute>,
    sampler: Arc<dyn Sampler>,
    commands: CommandToggles,
}

#[bon::bon]
impl TraceOptions {
    /// Builds trace options.
    #[builder]
    pub fn new(
        #[builder(default)]
        allow_root: bool,
        #[builder(into)]
        instance_name: Option<String>,
        #[builder(default)]
        default_attributes: Vec<Attribute>,
        sampler: Option<Arc<dyn Sampler>>,
        #[builder(default)]
        commands: CommandToggles,
    ) -> Self {
        let mut default_attributes = default_attributes;
        let instance_name = match instance_name.filter(|name| !name.is_empty()) {
            Some(name) => {
                default_attributes.retain(|a| a.key() != attribute_keys::CACHE_INSTANCE);
                default_attributes
                    .push(Attribute::new(attribute_keys::CACHE_INSTANCE, name.as_str()));
                name
            },
            None => DEFAULT_INSTANCE_NAME.to_string(),
        };

        Self {
            allow_root,
            instance_name,
            default_attributes,
            sampler: sampler.unwrap_or_else(|| Arc::new(ParentBasedSampler)),
            commands,
        }
    }
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TraceOptions {
    /// Options that trace every command and change nothing else.
    pub fn all() -> Self {
        Self::builder().commands(CommandToggles::ALL).build()
    }

    /// Returns whether root spans may be created.
    pub fn allow_root(&self) -> bool {
        self.allow_root
    }

    /// Returns the resolved instance label.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Returns the attributes attached to every span.
    pub fn default_attributes(&self) -> &[Attribute] {
        &self.default_attributes
    }

    /// Returns the sampling policy.
    pub fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }

    /// Returns the per-command toggles.
    pub fn commands(&self) -> &CommandToggles {
        &self.commands
    }

    /// Returns whether `command` is traced.
    pub fn is_enabled(&self, command: Command) -> bool {
        self.commands.is_enabled(command)
    }
}
