use std::{any::TypeId, collections::HashMap, fmt::Debug};

use crate::{
    errors::ConventionError,
    part::{Attribute, ExportAttribute, ImportAttribute, Parameter, Part, PartDescriptor},
    types::{Contract, Injectable, TypeInfo, Upcast},
};

/// Answers which attributes a part carries.
///
/// This is the only way the composition learns about exports, sharing and imports.
pub trait AttributeProvider: Send + Sync {
    /// Attributes of the part type itself
    fn type_attributes(&self, part: &PartDescriptor) -> Vec<Attribute>;

    /// Attributes of one of the part's constructor parameters
    fn parameter_attributes(&self, part: &PartDescriptor, parameter: &Parameter) -> Vec<Attribute>;
}

/// Default attribution - whatever the part declares on itself
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredAttributes;
impl AttributeProvider for DeclaredAttributes {
    fn type_attributes(&self, part: &PartDescriptor) -> Vec<Attribute> {
        part.declared_attributes()
    }

    fn parameter_attributes(&self, _: &PartDescriptor, parameter: &Parameter) -> Vec<Attribute> {
        parameter.attributes.clone()
    }
}

type PartPredicate = Box<dyn Fn(&TypeInfo) -> bool + Send + Sync>;

#[derive(Default)]
struct PartRule {
    exports: Vec<ExportAttribute>,
    shared: bool,
    imports: Vec<(&'static str, ImportAttribute)>,
}

/// Rule based conventions, applied on top of the attributes parts declare themselves.
///
/// Rules can export parts under additional contracts, mark them as shared and
/// rename the contracts their parameters import.
///
/// # Example
/// ```rust
/// use partwire::{Attribute, Conventions, DynError, Imports, Part};
///
/// struct Cache;
/// impl Part for Cache {
///     fn attributes() -> Vec<Attribute> {
///         vec![]
///     }
///
///     fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
///         Ok(Cache)
///     }
/// }
///
/// let mut conventions = Conventions::new();
/// conventions
///     .export::<Cache, Cache>()
///     .unwrap()
///     .shared_when(|info| info.type_name.ends_with("Cache"));
/// ```
#[derive(Default)]
pub struct Conventions {
    rules: HashMap<TypeId, PartRule>,
    shared_predicates: Vec<PartPredicate>,
}
impl Debug for Conventions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conventions")
            .field("part_rules", &self.rules.len())
            .field("shared_predicates", &self.shared_predicates.len())
            .finish()
    }
}

impl Conventions {
    /// Initializes conventions without any rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `P` under the unnamed contract `C`
    ///
    /// Returns a [`ConventionError`] if the same contract was already exported for `P`
    pub fn export<C: ?Sized + Injectable, P: Part + Upcast<C>>(
        &mut self,
    ) -> Result<&mut Self, ConventionError> {
        self.add_export::<P>(ExportAttribute::of::<C, P>())
    }

    /// Export `P` under the contract `C` with the given name
    pub fn named_export<C: ?Sized + Injectable, P: Part + Upcast<C>>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<&mut Self, ConventionError> {
        self.add_export::<P>(ExportAttribute::of::<C, P>().named(name))
    }

    /// Can optionally export `P` under a named contract.
    ///
    /// `Some(name)` is the same as calling [`Conventions::named_export`],
    /// `None` is the same as calling [`Conventions::export`]
    pub fn maybe_named_export<C: ?Sized + Injectable, P: Part + Upcast<C>>(
        &mut self,
        name: Option<String>,
    ) -> Result<&mut Self, ConventionError> {
        match name {
            Some(name) => self.named_export::<C, P>(name),
            None => self.export::<C, P>(),
        }
    }

    /// One instance of `P` is shared within a host
    pub fn shared<P: Part>(&mut self) -> &mut Self {
        self.rules.entry(TypeId::of::<P>()).or_default().shared = true;
        self
    }

    /// All parts matching the predicate are shared within a host
    pub fn shared_when(
        &mut self,
        predicate: impl Fn(&TypeInfo) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.shared_predicates.push(Box::new(predicate));
        self
    }

    /// The parameter `parameter` of `P` imports the contract named `name`
    ///
    /// Returns a [`ConventionError`] if `P` has no such parameter
    pub fn import_named<P: Part>(
        &mut self,
        parameter: &'static str,
        name: impl Into<String>,
    ) -> Result<&mut Self, ConventionError> {
        if !P::parameters().iter().any(|known| known.name == parameter) {
            return Err(ConventionError::UnknownParameter {
                part: TypeInfo::of::<P>(),
                parameter,
            });
        }

        let import = ImportAttribute {
            name: Some(name.into()),
        };
        self.rules
            .entry(TypeId::of::<P>())
            .or_default()
            .imports
            .push((parameter, import));
        Ok(self)
    }

    fn add_export<P: Part>(
        &mut self,
        export: ExportAttribute,
    ) -> Result<&mut Self, ConventionError> {
        let rule = self.rules.entry(TypeId::of::<P>()).or_default();
        if rule
            .exports
            .iter()
            .any(|existing| existing.contract() == export.contract())
        {
            return Err(ConventionError::DuplicateExport {
                part: TypeInfo::of::<P>(),
                contract: export.contract(),
            });
        }

        rule.exports.push(export);
        Ok(self)
    }

    fn is_shared(&self, part: &PartDescriptor) -> bool {
        let by_rule = self
            .rules
            .get(&part.info.type_id)
            .is_some_and(|rule| rule.shared);

        by_rule || self.shared_predicates.iter().any(|matches| matches(&part.info))
    }
}

impl AttributeProvider for Conventions {
    fn type_attributes(&self, part: &PartDescriptor) -> Vec<Attribute> {
        let mut attributes = part.declared_attributes();

        if let Some(rule) = self.rules.get(&part.info.type_id) {
            // Declared exports win over rules for the same contract
            let declared: Vec<Contract> = attributes
                .iter()
                .filter_map(Attribute::as_export)
                .map(ExportAttribute::contract)
                .collect();
            attributes.extend(
                rule.exports
                    .iter()
                    .filter(|export| !declared.contains(&export.contract()))
                    .cloned()
                    .map(Attribute::Export),
            );
        }

        if self.is_shared(part) && !attributes.iter().any(Attribute::is_shared) {
            attributes.push(Attribute::Shared);
        }

        attributes
    }

    fn parameter_attributes(&self, part: &PartDescriptor, parameter: &Parameter) -> Vec<Attribute> {
        let mut attributes = parameter.attributes.clone();

        if let Some(rule) = self.rules.get(&part.info.type_id) {
            attributes.extend(
                rule.imports
                    .iter()
                    .filter(|(name, _)| *name == parameter.name)
                    .map(|(_, import)| Attribute::Import(import.clone())),
            );
        }

        attributes
    }
}
