use std::{
    any::{type_name, Any},
    fmt::Debug,
    sync::Arc,
};

use crate::{
    host::Imports,
    types::{Contract, DynError, Injectable, Instance, TypeInfo, Upcast},
};

/// A constructed part, erased so parts of different types can be cached together
pub type ErasedPart = Arc<dyn Any + Send + Sync + 'static>;

/// A composable component.
///
/// A part declares which contracts it exports and which contracts its constructor imports.
/// Whether those declarations are honored is decided by the conventions the part is added with.
///
/// # Example
/// ```rust
/// use partwire::{implements, Attribute, DynError, Imports, Part};
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         42
///     }
/// }
/// implements!(FixedClock => dyn Clock);
///
/// impl Part for FixedClock {
///     fn attributes() -> Vec<Attribute> {
///         vec![Attribute::export::<dyn Clock, Self>(), Attribute::Shared]
///     }
///
///     fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
///         Ok(FixedClock)
///     }
/// }
/// ```
pub trait Part: Injectable + Sized {
    /// Attributes declared on the type itself
    fn attributes() -> Vec<Attribute>;

    /// Constructor parameters, each one an import
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// Builds the part, pulling its imports from the composition
    fn construct(imports: &Imports<'_>) -> Result<Self, DynError>;

    /// Release hook, invoked when the host owning this instance is closed explicitly
    fn dispose(&self) {}
}

/// Annotations on a part type or on one of its constructor parameters
#[derive(Clone, Debug)]
pub enum Attribute {
    /// The part is published under a contract
    Export(ExportAttribute),
    /// One instance of the part is shared by everyone within a host
    Shared,
    /// Changes the contract a parameter imports
    Import(ImportAttribute),
}
impl Attribute {
    pub fn export<C: ?Sized + Injectable, P: Upcast<C>>() -> Self {
        Attribute::Export(ExportAttribute::of::<C, P>())
    }

    pub fn named_export<C: ?Sized + Injectable, P: Upcast<C>>(name: impl Into<String>) -> Self {
        Attribute::Export(ExportAttribute::of::<C, P>().named(name))
    }

    pub fn import_named(name: impl Into<String>) -> Self {
        Attribute::Import(ImportAttribute {
            name: Some(name.into()),
        })
    }

    pub fn as_export(&self) -> Option<&ExportAttribute> {
        match self {
            Attribute::Export(export) => Some(export),
            _ => None,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Attribute::Shared)
    }
}

/// Publishes a part under one contract
#[derive(Clone)]
pub struct ExportAttribute {
    /// The exported contract type
    pub contract: TypeInfo,
    /// Optional contract name
    pub name: Option<String>,
    upcast: fn(&ErasedPart) -> Option<Instance>,
}
impl Debug for ExportAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportAttribute")
            .field("contract", &self.contract.type_name)
            .field("name", &self.name)
            .finish()
    }
}
impl ExportAttribute {
    pub fn of<C: ?Sized + Injectable, P: Upcast<C>>() -> Self {
        ExportAttribute {
            contract: TypeInfo::of::<C>(),
            name: None,
            upcast: upcast_erased::<C, P>,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|name| !name.is_empty());
        self
    }

    pub fn contract(&self) -> Contract {
        Contract {
            info: self.contract,
            name: self.name.clone(),
        }
    }

    /// Converts a constructed part into the exported contract
    ///
    /// Returns None if the part is not of the type this attribute was declared for
    pub(crate) fn export(&self, part: &ErasedPart) -> Option<Instance> {
        (self.upcast)(part)
    }
}

fn upcast_erased<C: ?Sized + Injectable, P: Upcast<C>>(part: &ErasedPart) -> Option<Instance> {
    let part = Arc::downcast::<P>(part.clone()).ok()?;
    Some(Instance::new(type_name::<P>(), part.upcast()))
}

/// Overrides the contract name of an import
#[derive(Clone, Debug, Default)]
pub struct ImportAttribute {
    pub name: Option<String>,
}

/// How many exports an import accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// Exactly one
    Single,
    /// Zero or one
    Optional,
    /// Any number
    Many,
}

/// A constructor parameter of a part
#[derive(Clone, Debug)]
pub struct Parameter {
    /// Name the constructor uses to request this import
    pub name: &'static str,
    /// Contract type of the import
    pub contract: TypeInfo,
    pub kind: ImportKind,
    /// Attributes declared on the parameter
    pub attributes: Vec<Attribute>,
}
impl Parameter {
    pub fn single<C: ?Sized + 'static>(name: &'static str) -> Self {
        Self::new::<C>(name, ImportKind::Single)
    }

    pub fn optional<C: ?Sized + 'static>(name: &'static str) -> Self {
        Self::new::<C>(name, ImportKind::Optional)
    }

    pub fn many<C: ?Sized + 'static>(name: &'static str) -> Self {
        Self::new::<C>(name, ImportKind::Many)
    }

    fn new<C: ?Sized + 'static>(name: &'static str, kind: ImportKind) -> Self {
        Parameter {
            name,
            contract: TypeInfo::of::<C>(),
            kind,
            attributes: Vec::new(),
        }
    }

    /// Imports the contract under the given name instead of the unnamed one
    pub fn named(self, contract_name: impl Into<String>) -> Self {
        self.with_attribute(Attribute::import_named(contract_name))
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// A type-erased [`Part`], the unit sources are made of
#[derive(Clone)]
pub struct PartDescriptor {
    pub info: TypeInfo,
    attributes: fn() -> Vec<Attribute>,
    parameters: fn() -> Vec<Parameter>,
    construct: fn(&Imports<'_>) -> Result<ErasedPart, DynError>,
    dispose: fn(&ErasedPart),
}
impl Debug for PartDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PartDescriptor")
            .field(&self.info.type_name)
            .finish()
    }
}
impl PartDescriptor {
    pub fn of<P: Part>() -> Self {
        PartDescriptor {
            info: TypeInfo::of::<P>(),
            attributes: P::attributes,
            parameters: P::parameters,
            construct: construct_erased::<P>,
            dispose: dispose_erased::<P>,
        }
    }

    /// Attributes the part declares on itself
    pub fn declared_attributes(&self) -> Vec<Attribute> {
        (self.attributes)()
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        (self.parameters)()
    }

    pub(crate) fn construct(&self, imports: &Imports<'_>) -> Result<ErasedPart, DynError> {
        (self.construct)(imports)
    }

    pub(crate) fn dispose(&self, part: &ErasedPart) {
        (self.dispose)(part)
    }
}

fn construct_erased<P: Part>(imports: &Imports<'_>) -> Result<ErasedPart, DynError> {
    let part: ErasedPart = Arc::new(P::construct(imports)?);
    Ok(part)
}

fn dispose_erased<P: Part>(part: &ErasedPart) {
    if let Some(part) = part.downcast_ref::<P>() {
        part.dispose();
    }
}

/// A named, ordered collection of parts which is added to a composition as a whole
#[derive(Clone, Debug)]
pub struct Assembly {
    name: String,
    parts: Vec<PartDescriptor>,
}
impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Assembly {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    pub fn with_part<P: Part>(self) -> Self {
        self.with_descriptor(PartDescriptor::of::<P>())
    }

    pub fn with_descriptor(mut self, descriptor: PartDescriptor) -> Self {
        self.parts.push(descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[PartDescriptor] {
        &self.parts
    }
}
