use std::{
    any::type_name,
    collections::HashSet,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::{
    conventions::AttributeProvider,
    dependency_graph::{Dependency, DependencyGraph, Provider},
    errors::{CompositionFailure, ExportError, HostDisposed},
    filter::ConventionFilter,
    overrides::InstanceOverride,
    part::{Attribute, ErasedPart, ExportAttribute, ImportKind, Parameter, PartDescriptor},
    types::{Contract, Injectable, Instance, TypeInfo},
};

/// A set of parts added to the composition together, filtered by the same conventions
#[derive(Clone)]
pub(crate) struct Source {
    pub(crate) name: String,
    pub(crate) parts: Vec<PartDescriptor>,
    pub(crate) conventions: Option<Arc<dyn AttributeProvider>>,
    pub(crate) excluded: Vec<TypeInfo>,
}

/// A part that exports at least one contract, with its imports resolved to contracts
struct ComposedPart {
    descriptor: PartDescriptor,
    shared: bool,
    imports: Vec<ImportSite>,
}

struct ImportSite {
    parameter: &'static str,
    declared: TypeInfo,
    contract: Contract,
    kind: ImportKind,
}
impl ImportSite {
    fn new(filter: &ConventionFilter, part: &PartDescriptor, parameter: Parameter) -> Self {
        // The last import attribute wins, conventions are applied after declared attributes
        let name = filter
            .parameter_attributes(part, &parameter)
            .into_iter()
            .rev()
            .find_map(|attribute| match attribute {
                Attribute::Import(import) => Some(import.name),
                _ => None,
            })
            .flatten();

        ImportSite {
            parameter: parameter.name,
            declared: parameter.contract,
            contract: Contract {
                info: parameter.contract,
                name: None,
            }
            .with_name(name),
            kind: parameter.kind,
        }
    }
}

#[derive(Clone)]
enum Recipe {
    /// Construct the part and convert it to the exported contract
    Construct { part: usize, export: ExportAttribute },
    /// Hand out a pre-built instance
    Instance(InstanceOverride),
}

/// Something able to produce an instance for a contract
#[derive(Clone)]
pub struct ExportCandidate {
    contract: Contract,
    shared: bool,
    origin: &'static str,
    recipe: Recipe,
}
impl Debug for ExportCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCandidate")
            .field("contract", &self.contract.to_string())
            .field("shared", &self.shared)
            .field("origin", &self.origin)
            .finish()
    }
}
impl ExportCandidate {
    /// The contract this candidate was published under
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Name of the part type producing the instance.
    ///
    /// Overrides only know the contract they were composed as, their origin is the contract type name.
    pub fn origin(&self) -> &'static str {
        self.origin
    }

    pub fn is_override(&self) -> bool {
        matches!(self.recipe, Recipe::Instance(_))
    }

    /// Parts only satisfy the exact contract, overrides satisfy any name of their type
    pub fn satisfies(&self, contract: &Contract) -> bool {
        match &self.recipe {
            Recipe::Construct { .. } => self.contract == *contract,
            Recipe::Instance(provider) => provider.satisfies(contract),
        }
    }

    fn provider(&self) -> Provider {
        match &self.recipe {
            Recipe::Construct { part, .. } => Provider::Part(*part),
            Recipe::Instance(_) => Provider::Instance,
        }
    }
}

type SharedSlots = Vec<OnceCell<ErasedPart>>;

/// The built, read-only composition.
///
/// Owns every shared part it constructed and disposes them on [`CompositionHost::close`],
/// together with the overrides that were handed over as disposable.
pub struct CompositionHost {
    parts: Vec<ComposedPart>,
    candidates: Vec<ExportCandidate>,
    overrides: Vec<InstanceOverride>,
    exportable: HashSet<TypeInfo>,
    /// Shared part instances by part index - held for reading while composing, for writing while closing
    shared: RwLock<SharedSlots>,
    /// Creation order of shared parts
    created: Mutex<Vec<usize>>,
    disposed: AtomicBool,
}
impl Debug for CompositionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionHost")
            .field("candidates", &self.candidates)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl CompositionHost {
    /// Compiles the sources and overrides into a host
    ///
    /// Sources are processed in order, overrides are added after all sources
    pub(crate) fn compile(
        sources: &[Source],
        overrides: &[InstanceOverride],
        default_conventions: Option<&Arc<dyn AttributeProvider>>,
    ) -> Result<Self, CompositionFailure> {
        tracing::debug!(
            "Compiling composition with {} sources and {} overrides",
            sources.len(),
            overrides.len()
        );

        let mut parts = Vec::new();
        let mut candidates = Vec::new();
        let mut exportable = HashSet::new();

        for source in sources {
            let conventions = source
                .conventions
                .clone()
                .or_else(|| default_conventions.cloned());
            let filter = ConventionFilter::new(conventions, source.excluded.iter().copied());

            for descriptor in &source.parts {
                let attributes = filter.type_attributes(descriptor);
                let exports: Vec<ExportAttribute> = attributes
                    .iter()
                    .filter_map(Attribute::as_export)
                    .cloned()
                    .collect();

                if exports.is_empty() {
                    tracing::trace!("{} exports nothing in {}", descriptor.info, source.name);
                    continue;
                }

                let shared = attributes.iter().any(Attribute::is_shared);
                let imports = descriptor
                    .parameters()
                    .into_iter()
                    .map(|parameter| ImportSite::new(&filter, descriptor, parameter))
                    .collect();

                let index = parts.len();
                parts.push(ComposedPart {
                    descriptor: descriptor.clone(),
                    shared,
                    imports,
                });

                for export in exports {
                    tracing::trace!("{} is a candidate for {}", descriptor.info, export.contract());
                    candidates.push(ExportCandidate {
                        contract: export.contract(),
                        shared,
                        origin: descriptor.info.type_name,
                        recipe: Recipe::Construct {
                            part: index,
                            export,
                        },
                    });
                }
            }

            exportable.extend(filter.exportable_types());
        }

        for provider in overrides {
            candidates.push(ExportCandidate {
                contract: Contract {
                    info: provider.contract_type(),
                    name: None,
                },
                shared: true,
                origin: provider.instance().origin,
                recipe: Recipe::Instance(provider.clone()),
            });
            exportable.insert(provider.contract_type());
        }

        dependency_graph(&parts, &candidates).check()?;

        tracing::debug!(
            "Composition compiled with {} parts and {} candidates",
            parts.len(),
            candidates.len()
        );

        let shared = parts.iter().map(|_| OnceCell::new()).collect();
        Ok(CompositionHost {
            parts,
            candidates,
            overrides: overrides.to_vec(),
            exportable,
            shared: RwLock::new(shared),
            created: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// All candidates in resolution order
    pub fn candidates(&self) -> &[ExportCandidate] {
        &self.candidates
    }

    /// Candidates satisfying the contract, in resolution order
    pub fn matching(&self, contract: &Contract) -> Vec<&ExportCandidate> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.satisfies(contract))
            .collect()
    }

    /// Contract types exported by all parts that were not excluded, and by all overrides
    pub fn exportable_types(&self) -> &HashSet<TypeInfo> {
        &self.exportable
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns the only export satisfying the contract
    pub fn get_export(&self, contract: &Contract) -> Result<Instance, ExportError> {
        let slots = self.open()?;
        Ok(self.export_single(&slots, contract)?)
    }

    /// Returns every export satisfying the contract, in resolution order
    pub fn get_exports(&self, contract: &Contract) -> Result<Vec<Instance>, ExportError> {
        let slots = self.open()?;
        Ok(self.export_all(&slots, contract)?)
    }

    /// Disposes all shared parts this host constructed and all owned overrides.
    ///
    /// Parts are disposed in reverse creation order, overrides in reverse registration order.
    /// Closing twice does nothing. Only the owning helper closes its host.
    pub(crate) fn close(&self) {
        // Waits until no export is being composed
        let mut slots = self.shared.write();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let created = std::mem::take(&mut *self.created.lock());
        tracing::debug!(
            "Closing composition - disposing {} shared parts and {} owned overrides",
            created.len(),
            self.overrides.iter().filter(|o| o.is_owned()).count()
        );

        for index in created.into_iter().rev() {
            if let Some(instance) = slots[index].take() {
                tracing::trace!("Disposing {}", self.parts[index].descriptor.info);
                self.parts[index].descriptor.dispose(&instance);
            }
        }

        for provider in self.overrides.iter().rev() {
            provider.release();
        }

        slots.clear();
    }

    fn open(&self) -> Result<RwLockReadGuard<'_, SharedSlots>, HostDisposed> {
        // Recursive, parts compose their imports while the guard is held
        let slots = self.shared.read_recursive();
        if self.is_disposed() {
            return Err(HostDisposed);
        }
        Ok(slots)
    }

    fn export_single(
        &self,
        slots: &[OnceCell<ErasedPart>],
        contract: &Contract,
    ) -> Result<Instance, CompositionFailure> {
        match self.matching(contract).as_slice() {
            [candidate] => self.produce(slots, candidate),
            [] => {
                tracing::debug!("No export for {contract}");
                Err(CompositionFailure::NotFound(contract.clone()))
            }
            candidates => {
                tracing::debug!("{} exports for {contract}", candidates.len());
                Err(CompositionFailure::Ambiguous {
                    contract: contract.clone(),
                    candidates: candidates.iter().map(|c| c.origin).collect(),
                })
            }
        }
    }

    fn export_all(
        &self,
        slots: &[OnceCell<ErasedPart>],
        contract: &Contract,
    ) -> Result<Vec<Instance>, CompositionFailure> {
        self.matching(contract)
            .into_iter()
            .map(|candidate| self.produce(slots, candidate))
            .collect()
    }

    fn produce(
        &self,
        slots: &[OnceCell<ErasedPart>],
        candidate: &ExportCandidate,
    ) -> Result<Instance, CompositionFailure> {
        match &candidate.recipe {
            Recipe::Instance(provider) => Ok(provider.instance().clone()),
            Recipe::Construct { part, export } => {
                let instance = self.part_instance(slots, *part)?;
                export
                    .export(&instance)
                    .ok_or(CompositionFailure::DowncastFailed {
                        required_type: export.contract.type_name,
                        actual_type: self.parts[*part].descriptor.info.type_name,
                    })
            }
        }
    }

    fn part_instance(
        &self,
        slots: &[OnceCell<ErasedPart>],
        index: usize,
    ) -> Result<ErasedPart, CompositionFailure> {
        if !self.parts[index].shared {
            return self.construct(slots, index);
        }

        // Only one thread constructs, the others wait for its result
        slots[index]
            .get_or_try_init(|| {
                let instance = self.construct(slots, index)?;
                self.created.lock().push(index);
                Ok::<_, CompositionFailure>(instance)
            })
            .cloned()
    }

    fn construct(
        &self,
        slots: &[OnceCell<ErasedPart>],
        index: usize,
    ) -> Result<ErasedPart, CompositionFailure> {
        let part = &self.parts[index];
        tracing::debug!("Constructing instance of {}", part.descriptor.info);

        let imports = Imports {
            host: self,
            slots,
            part,
        };
        part.descriptor
            .construct(&imports)
            .map_err(|error| CompositionFailure::ConstructionFailed {
                part: part.descriptor.info.type_name,
                error: Arc::new(error),
            })
    }
}

impl Drop for CompositionHost {
    fn drop(&mut self) {
        // Composed values may outlive the host, their release hooks are only run by close
        if !self.is_disposed() {
            tracing::trace!("Composition dropped without being closed");
        }
    }
}

fn dependency_graph(parts: &[ComposedPart], candidates: &[ExportCandidate]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (index, part) in parts.iter().enumerate() {
        let dependencies = part
            .imports
            .iter()
            .map(|site| Dependency {
                contract: site.contract.clone(),
                kind: site.kind,
                providers: candidates
                    .iter()
                    .filter(|candidate| candidate.satisfies(&site.contract))
                    .map(ExportCandidate::provider)
                    .collect(),
            })
            .collect();

        graph.add(index, part.descriptor.info, dependencies);
    }
    graph
}

/// Access to the imports of a part while it is constructed
pub struct Imports<'a> {
    host: &'a CompositionHost,
    slots: &'a [OnceCell<ErasedPart>],
    part: &'a ComposedPart,
}
impl Imports<'_> {
    /// Imports exactly one export for the parameter
    pub fn single<C: ?Sized + Injectable>(
        &self,
        parameter: &str,
    ) -> Result<Arc<C>, CompositionFailure> {
        let site = self.site::<C>(parameter)?;
        let instance = self.host.export_single(self.slots, &site.contract)?;
        downcast(&instance)
    }

    /// Imports the export for the parameter if there is one
    pub fn optional<C: ?Sized + Injectable>(
        &self,
        parameter: &str,
    ) -> Result<Option<Arc<C>>, CompositionFailure> {
        let site = self.site::<C>(parameter)?;
        match self.host.export_single(self.slots, &site.contract) {
            Ok(instance) => downcast(&instance).map(Some),
            Err(CompositionFailure::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Imports every export for the parameter
    pub fn many<C: ?Sized + Injectable>(
        &self,
        parameter: &str,
    ) -> Result<Vec<Arc<C>>, CompositionFailure> {
        let site = self.site::<C>(parameter)?;
        self.host
            .export_all(self.slots, &site.contract)?
            .iter()
            .map(downcast::<C>)
            .collect()
    }

    fn site<C: ?Sized + Injectable>(&self, parameter: &str) -> Result<&ImportSite, CompositionFailure> {
        let part = self.part.descriptor.info.type_name;
        let site = self
            .part
            .imports
            .iter()
            .find(|site| site.parameter == parameter)
            .ok_or_else(|| CompositionFailure::UnknownImport {
                part,
                parameter: parameter.to_string(),
            })?;

        let requested = TypeInfo::of::<C>();
        if site.declared != requested {
            return Err(CompositionFailure::ImportTypeMismatch {
                part,
                parameter: parameter.to_string(),
                declared: site.declared,
                requested,
            });
        }

        Ok(site)
    }
}

pub(crate) fn downcast<C: ?Sized + Injectable>(
    instance: &Instance,
) -> Result<Arc<C>, CompositionFailure> {
    instance
        .downcast::<C>()
        .map_err(|actual_type| CompositionFailure::DowncastFailed {
            required_type: type_name::<C>(),
            actual_type,
        })
}
