use std::{
    collections::HashSet,
    fmt::Debug,
    sync::Arc,
};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{
    conventions::AttributeProvider,
    errors::{ConfigureError, ExportError, HostDisposed},
    host::{downcast, CompositionHost, Source},
    overrides::{Dispose, InstanceOverride},
    part::{Assembly, Part, PartDescriptor},
    types::{Contract, Injectable, Instance, TypeInfo},
};

/// Lifecycle of a [`CompositionHelper`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Still configurable, nothing was requested yet
    Unbuilt,
    /// Built and queryable, configuration is frozen
    Built,
    /// Closed, every operation fails
    Disposed,
}

/// Composes parts for tests, while letting single components be replaced by stubs.
///
/// Parts are added by assembly or one by one. Any part can be excluded from its assembly,
/// which hides its exports, so a stub composed with [`CompositionHelper::compose_export`]
/// becomes the only candidate for the contract.
///
/// The composition is built once, on the first request for an export. From then on
/// the configuration is frozen and the helper can be shared between threads.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use partwire::{implements, Assembly, Attribute, CompositionHelper, DynError, Imports, Part, TypeInfo};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "Hello".to_string()
///     }
/// }
/// implements!(English => dyn Greeter);
/// impl Part for English {
///     fn attributes() -> Vec<Attribute> {
///         vec![Attribute::export::<dyn Greeter, Self>()]
///     }
///
///     fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
///         Ok(English)
///     }
/// }
///
/// struct StubGreeter;
/// impl Greeter for StubGreeter {
///     fn greet(&self) -> String {
///         "stub".to_string()
///     }
/// }
///
/// let assembly = Assembly::new("greetings").with_part::<English>();
/// let stub: Arc<dyn Greeter> = Arc::new(StubGreeter);
///
/// let mut helper = CompositionHelper::new();
/// helper
///     .add_assembly(assembly, [TypeInfo::of::<English>()])
///     .unwrap()
///     .compose_export(stub)
///     .unwrap();
///
/// let greeter = helper.get_export::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "stub");
/// ```
#[derive(Default)]
pub struct CompositionHelper {
    sources: Vec<Source>,
    overrides: Vec<InstanceOverride>,
    default_conventions: Option<Arc<dyn AttributeProvider>>,
    exportable: RwLock<HashSet<TypeInfo>>,
    host: OnceCell<CompositionHost>,
    /// Written by close, read after every build so a host built during close is closed as well
    disposed: RwLock<bool>,
}
impl Debug for CompositionHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
        f.debug_struct("CompositionHelper")
            .field("state", &self.state())
            .field("sources", &sources)
            .field("overrides", &self.overrides)
            .finish()
    }
}

// Configuration
impl CompositionHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds all parts of an assembly, hiding the excluded part types
    pub fn add_assembly(
        &mut self,
        assembly: Assembly,
        excluded: impl IntoIterator<Item = TypeInfo>,
    ) -> Result<&mut Self, ConfigureError> {
        self.add_assemblies([assembly], excluded)
    }

    /// Adds all parts of several assemblies, hiding the excluded part types in each of them
    pub fn add_assemblies(
        &mut self,
        assemblies: impl IntoIterator<Item = Assembly>,
        excluded: impl IntoIterator<Item = TypeInfo>,
    ) -> Result<&mut Self, ConfigureError> {
        self.ensure_configurable()?;
        let excluded: Vec<TypeInfo> = excluded.into_iter().collect();
        for assembly in assemblies {
            self.push_assembly(assembly, None, excluded.clone());
        }
        Ok(self)
    }

    /// Adds all parts of an assembly, attributed by the given conventions
    pub fn add_assembly_with_conventions(
        &mut self,
        assembly: Assembly,
        conventions: impl AttributeProvider + 'static,
        excluded: impl IntoIterator<Item = TypeInfo>,
    ) -> Result<&mut Self, ConfigureError> {
        self.ensure_configurable()?;
        self.push_assembly(
            assembly,
            Some(Arc::new(conventions)),
            excluded.into_iter().collect(),
        );
        Ok(self)
    }

    /// Adds a single part
    pub fn add_part<P: Part>(&mut self) -> Result<&mut Self, ConfigureError> {
        self.add_part_source(PartDescriptor::of::<P>(), None)
    }

    /// Adds a single part, attributed by the given conventions
    pub fn add_part_with_conventions<P: Part>(
        &mut self,
        conventions: impl AttributeProvider + 'static,
    ) -> Result<&mut Self, ConfigureError> {
        self.add_part_source(PartDescriptor::of::<P>(), Some(Arc::new(conventions)))
    }

    /// Adds a single type-erased part
    pub fn add_part_descriptor(
        &mut self,
        descriptor: PartDescriptor,
    ) -> Result<&mut Self, ConfigureError> {
        self.add_part_source(descriptor, None)
    }

    fn add_part_source(
        &mut self,
        descriptor: PartDescriptor,
        conventions: Option<Arc<dyn AttributeProvider>>,
    ) -> Result<&mut Self, ConfigureError> {
        self.ensure_configurable()?;
        tracing::debug!("Adding part {}", descriptor.info);

        self.sources.push(Source {
            name: descriptor.info.type_name.to_string(),
            parts: vec![descriptor],
            conventions,
            excluded: Vec::new(),
        });
        Ok(self)
    }

    /// Conventions for all sources added without their own
    pub fn with_default_conventions(
        &mut self,
        conventions: impl AttributeProvider + 'static,
    ) -> Result<&mut Self, ConfigureError> {
        self.ensure_configurable()?;
        self.default_conventions = Some(Arc::new(conventions));
        Ok(self)
    }

    /// Satisfies the contract type `C` with the given instance.
    ///
    /// The instance is not owned by the composition and is left alone on close.
    pub fn compose_export<C: ?Sized + Injectable>(
        &mut self,
        instance: Arc<C>,
    ) -> Result<&mut Self, ConfigureError> {
        self.add_override(InstanceOverride::new(instance))
    }

    /// Satisfies the contract type `T` with the given value
    pub fn compose_export_value<T: Injectable>(
        &mut self,
        value: T,
    ) -> Result<&mut Self, ConfigureError> {
        self.compose_export(Arc::new(value))
    }

    /// Satisfies the contract type `C` with the given instance and hands its ownership to
    /// the composition - it is disposed when the composition is closed
    pub fn compose_disposable_export<C: ?Sized + Injectable + Dispose>(
        &mut self,
        instance: Arc<C>,
    ) -> Result<&mut Self, ConfigureError> {
        self.add_override(InstanceOverride::disposable(instance))
    }

    fn add_override(&mut self, provider: InstanceOverride) -> Result<&mut Self, ConfigureError> {
        self.ensure_configurable()?;
        tracing::debug!("Composing override for {}", provider.contract_type());

        self.exportable.get_mut().insert(provider.contract_type());
        self.overrides.push(provider);
        Ok(self)
    }

    fn push_assembly(
        &mut self,
        assembly: Assembly,
        conventions: Option<Arc<dyn AttributeProvider>>,
        excluded: Vec<TypeInfo>,
    ) {
        tracing::debug!(
            "Adding assembly {} with {} parts, {} excluded",
            assembly.name(),
            assembly.parts().len(),
            excluded.len()
        );

        self.sources.push(Source {
            name: assembly.name().to_string(),
            parts: assembly.parts().to_vec(),
            conventions,
            excluded,
        });
    }

    fn ensure_configurable(&self) -> Result<(), ConfigureError> {
        if *self.disposed.read() {
            return Err(HostDisposed.into());
        }
        if self.host.get().is_some() {
            return Err(ConfigureError::AlreadyBuilt);
        }
        Ok(())
    }
}

// Lifecycle
impl CompositionHelper {
    pub fn state(&self) -> HostState {
        if *self.disposed.read() || self.host.get().is_some_and(CompositionHost::is_disposed) {
            HostState::Disposed
        } else if self.host.get().is_some() {
            HostState::Built
        } else {
            HostState::Unbuilt
        }
    }

    /// Returns the composition host, building it on first access.
    ///
    /// Concurrent first accesses build only once. A failed build leaves the helper unbuilt.
    pub fn host(&self) -> Result<&CompositionHost, ExportError> {
        if *self.disposed.read() {
            return Err(HostDisposed.into());
        }

        let host = self.host.get_or_try_init(|| {
            let host = CompositionHost::compile(
                &self.sources,
                &self.overrides,
                self.default_conventions.as_ref(),
            )
            .inspect_err(|error| tracing::warn!("Building the composition failed: {error}"))?;

            self.exportable
                .write()
                .extend(host.exportable_types().iter().copied());
            Ok::<_, ExportError>(host)
        })?;

        // Closed while building
        if *self.disposed.read() {
            host.close();
            return Err(HostDisposed.into());
        }

        Ok(host)
    }

    /// Builds the composition now instead of on the first request
    pub fn build(&self) -> Result<(), ExportError> {
        self.host().map(|_| ())
    }

    /// Contract types the composition can export.
    ///
    /// Contains the contracts of all overrides right away, and those of all parts
    /// which were not excluded once the composition is built. Fails once the helper is closed.
    pub fn exportable_types(&self) -> Result<HashSet<TypeInfo>, HostDisposed> {
        if *self.disposed.read() {
            return Err(HostDisposed);
        }
        Ok(self.exportable.read().clone())
    }

    /// Closes the composition, disposing the shared parts it created and the overrides it owns.
    ///
    /// Every later operation fails. Closing twice does nothing.
    /// Dropping the helper without closing it runs no release hooks.
    pub fn close(&self) {
        let mut disposed = self.disposed.write();
        if *disposed {
            return;
        }
        *disposed = true;

        tracing::debug!("Closing composition helper");
        if let Some(host) = self.host.get() {
            host.close();
        }
    }
}

// Resolution
impl CompositionHelper {
    /// Returns the only unnamed export of `C`
    ///
    /// Fails if there is none or more than one
    pub fn get_export<C: ?Sized + Injectable>(&self) -> Result<Arc<C>, ExportError> {
        self.get_export_as(&Contract::of::<C>())
    }

    /// Returns the only export of `C` with the given name
    pub fn get_named_export<C: ?Sized + Injectable>(
        &self,
        name: &str,
    ) -> Result<Arc<C>, ExportError> {
        self.get_export_as(&Contract::named::<C>(name))
    }

    /// Like [`CompositionHelper::get_export`], but a failed composition is `None`
    ///
    /// Only fails if the composition was closed
    pub fn try_get_export<C: ?Sized + Injectable>(&self) -> Result<Option<Arc<C>>, HostDisposed> {
        swallow_failure(self.get_export::<C>())
    }

    pub fn try_get_named_export<C: ?Sized + Injectable>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<C>>, HostDisposed> {
        swallow_failure(self.get_named_export::<C>(name))
    }

    /// Returns all unnamed exports of `C`, which may be none
    pub fn get_exports<C: ?Sized + Injectable>(&self) -> Result<Vec<Arc<C>>, ExportError> {
        self.get_exports_as(&Contract::of::<C>())
    }

    pub fn get_named_exports<C: ?Sized + Injectable>(
        &self,
        name: &str,
    ) -> Result<Vec<Arc<C>>, ExportError> {
        self.get_exports_as(&Contract::named::<C>(name))
    }

    /// Returns the only export of the contract, type-erased
    pub fn get_export_by(&self, contract: &Contract) -> Result<Instance, ExportError> {
        self.host()?.get_export(contract)
    }

    pub fn try_get_export_by(&self, contract: &Contract) -> Result<Option<Instance>, HostDisposed> {
        swallow_failure(self.get_export_by(contract))
    }

    /// Returns all exports of the contract, type-erased
    pub fn get_exports_by(&self, contract: &Contract) -> Result<Vec<Instance>, ExportError> {
        self.host()?.get_exports(contract)
    }

    fn get_export_as<C: ?Sized + Injectable>(
        &self,
        contract: &Contract,
    ) -> Result<Arc<C>, ExportError> {
        let instance = self.get_export_by(contract)?;
        Ok(downcast(&instance)?)
    }

    fn get_exports_as<C: ?Sized + Injectable>(
        &self,
        contract: &Contract,
    ) -> Result<Vec<Arc<C>>, ExportError> {
        let instances = self.get_exports_by(contract)?;
        let exports = instances
            .iter()
            .map(downcast::<C>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exports)
    }
}

fn swallow_failure<T>(result: Result<T, ExportError>) -> Result<Option<T>, HostDisposed> {
    match result {
        Ok(export) => Ok(Some(export)),
        Err(ExportError::Composition(failure)) => {
            tracing::debug!("Export not available: {failure}");
            Ok(None)
        }
        Err(ExportError::Disposed(disposed)) => Err(disposed),
    }
}
