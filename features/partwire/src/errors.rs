use std::sync::Arc;

use thiserror::Error;

use crate::{
    dependency_graph::DependencyGraphErrors,
    types::{Contract, DynError, TypeInfo},
};

/// Errors when configuring the composition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureError {
    /// The composition host was already built from this configuration
    #[error("The composition was already built and can no longer be configured")]
    AlreadyBuilt,
    /// The composition was closed
    #[error(transparent)]
    Disposed(#[from] HostDisposed),
}

/// Any operation on a closed composition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("The composition host has been disposed")]
pub struct HostDisposed;

/// Errors when requesting exports
#[derive(Error, Debug, Clone)]
pub enum ExportError {
    /// The export could not be composed
    #[error(transparent)]
    Composition(#[from] CompositionFailure),
    /// The composition was closed
    #[error(transparent)]
    Disposed(#[from] HostDisposed),
}

/// Composition failed - the requested contract could not be satisfied.
///
/// All variants are the same kind of failure, they only differ in detail.
#[derive(Error, Debug, Clone)]
pub enum CompositionFailure {
    /// No export matches the contract
    #[error("No export was found for the contract '{0}'")]
    NotFound(Contract),
    /// More than one export matches the contract
    #[error("{} exports were found for the contract '{contract}', expected exactly one: {candidates:?}", .candidates.len())]
    Ambiguous {
        contract: Contract,
        candidates: Vec<&'static str>,
    },
    /// The structure of the composition is invalid
    #[error(transparent)]
    DependencyGraph(#[from] DependencyGraphErrors),
    /// A part constructor failed
    #[error("Constructing '{part}' failed - error: {error:?}")]
    ConstructionFailed {
        part: &'static str,
        error: Arc<DynError>,
    },
    /// A part requested an import it did not declare as a parameter
    #[error("'{part}' has no parameter named '{parameter}'")]
    UnknownImport {
        part: &'static str,
        parameter: String,
    },
    /// A part requested an import as a different type than it declared
    #[error("'{part}' declared '{parameter}' as '{declared}' but requested '{requested}'")]
    ImportTypeMismatch {
        part: &'static str,
        parameter: String,
        declared: TypeInfo,
        requested: TypeInfo,
    },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// Errors while registering conventions
#[derive(Error, Debug, Clone)]
pub enum ConventionError {
    /// The part is already exported under this contract
    #[error("'{part}' is already exported as '{contract}'")]
    DuplicateExport { part: TypeInfo, contract: Contract },
    /// The part has no constructor parameter with this name
    #[error("'{part}' has no parameter named '{parameter}'")]
    UnknownParameter {
        part: TypeInfo,
        parameter: &'static str,
    },
}
