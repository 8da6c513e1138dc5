// Adapter Enumerator - instance handle and adapter discovery
//
// An Instance owns an ordered list of backends. Adapter indices are the
// concatenation of each backend's adapter list, in backend order, and are
// only meaningful until the next discovery pass.

use std::fmt;
use std::sync::Arc;

use crate::backend::{AdapterDiscovery, NativeAdapter, NullBackend, VulkanBackend, VulkanBackendConfig};
use crate::config::{BackendKind, Config};
use crate::error::{Error, Result};
use crate::registry::{convert_adapter_type, convert_backend_type, AdapterType, BackendType};

/// When discovery runs.
///
/// One policy covers every query path; there is no operation that discovers
/// implicitly under one policy and not another.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum DiscoveryPolicy {
    /// Discovery only runs on `discover_default_adapters`
    #[default]
    Explicit,
    /// Every count, property and creation call re-runs discovery first
    Eager,
}

/// Descriptive properties of one adapter, produced fresh per query
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct AdapterDescriptor {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub adapter_type: AdapterType,
    pub backend_type: BackendType,
}

pub struct Instance {
    backends: Vec<Box<dyn AdapterDiscovery>>,
    policy: DiscoveryPolicy,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("Instance")
            .field("backends", &names)
            .field("policy", &self.policy)
            .finish()
    }
}

#[derive(Default)]
pub struct InstanceBuilder {
    backends: Vec<Box<dyn AdapterDiscovery>>,
    policy: DiscoveryPolicy,
}

impl InstanceBuilder {
    pub fn backend(mut self, backend: impl AdapterDiscovery + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn discovery_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Instance {
        Instance {
            backends: self.backends,
            policy: self.policy,
        }
    }
}

impl Instance {
    pub fn builder() -> InstanceBuilder {
        InstanceBuilder::default()
    }

    /// Build an instance with the backends and policy named in `config`
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::builder().discovery_policy(config.discovery_policy());

        for kind in config.backend_kinds() {
            builder = match kind {
                BackendKind::Vulkan => builder.backend(VulkanBackend::new(VulkanBackendConfig {
                    app_name: config.instance.app_name.clone(),
                    enable_validation: config.debug.validation_layers,
                })),
                BackendKind::Null => {
                    builder.backend(NullBackend::new(config.null_backend.adapters.clone()))
                }
            };
        }

        let instance = builder.build();
        log::info!("Created instance: {:?}", instance);
        instance
    }

    pub fn discovery_policy(&self) -> DiscoveryPolicy {
        self.policy
    }

    /// Probe the host for adapters on every backend of this instance
    pub fn discover_default_adapters(&self) {
        for backend in &self.backends {
            backend.discover_default_adapters();
            log::debug!(
                "Backend '{}' reports {} adapter(s)",
                backend.name(),
                backend.adapter_count()
            );
        }
    }

    pub fn adapter_count(&self) -> usize {
        self.apply_policy();
        self.count()
    }

    pub fn adapter_properties(&self, index: usize) -> Result<AdapterDescriptor> {
        let adapter = self.resolve_adapter(index)?;
        let native = adapter.properties();
        Ok(AdapterDescriptor {
            name: native.name,
            vendor_id: native.vendor_id,
            device_id: native.device_id,
            adapter_type: convert_adapter_type(native.adapter_type),
            backend_type: convert_backend_type(native.backend_type),
        })
    }

    /// Mutation-style variant of `adapter_properties`; `out` is left
    /// untouched on failure.
    pub fn get_adapter_properties(&self, index: usize, out: &mut AdapterDescriptor) -> Result<()> {
        *out = self.adapter_properties(index)?;
        Ok(())
    }

    /// Extension names the adapter at `index` can enable
    pub fn adapter_extensions(&self, index: usize) -> Result<Vec<String>> {
        Ok(self.resolve_adapter(index)?.extensions())
    }

    pub(crate) fn resolve_adapter(&self, index: usize) -> Result<Arc<dyn NativeAdapter>> {
        self.apply_policy();

        let mut remaining = index;
        for backend in &self.backends {
            let mut adapters = backend.adapters();
            if remaining < adapters.len() {
                return Ok(adapters.swap_remove(remaining));
            }
            remaining -= adapters.len();
        }

        Err(Error::OutOfRange {
            index,
            count: self.count(),
        })
    }

    fn count(&self) -> usize {
        self.backends.iter().map(|b| b.adapter_count()).sum()
    }

    fn apply_policy(&self) {
        if self.policy == DiscoveryPolicy::Eager {
            self.discover_default_adapters();
        }
    }
}
