//! Partwire composes parts for tests, in the style of attributed composition containers.
//!
//! Parts declare which contracts they export and what their constructor imports. They are
//! added to a [`CompositionHelper`] by assembly or one by one. Any part can be excluded from
//! its assembly so a stub can take its place:
//! 1. [`CompositionHelper::add_assembly`] with the real part in the exclusion list
//! 2. [`CompositionHelper::compose_export`] with the stub
//! 3. Resolve exports - the stub is the only candidate for the contract
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use partwire::{
//!     implements, Assembly, Attribute, CompositionHelper, DynError, Imports, Parameter, Part,
//!     TypeInfo,
//! };
//!
//! trait Repository: Send + Sync {
//!     fn find(&self, id: u32) -> Option<String>;
//! }
//!
//! trait Service: Send + Sync {
//!     fn describe(&self, id: u32) -> String;
//! }
//!
//! struct SqlRepository;
//! impl Repository for SqlRepository {
//!     fn find(&self, _: u32) -> Option<String> {
//!         unimplemented!("needs a database")
//!     }
//! }
//! implements!(SqlRepository => dyn Repository);
//! impl Part for SqlRepository {
//!     fn attributes() -> Vec<Attribute> {
//!         vec![Attribute::export::<dyn Repository, Self>()]
//!     }
//!
//!     fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
//!         Ok(SqlRepository)
//!     }
//! }
//!
//! struct UserService {
//!     repository: Arc<dyn Repository>,
//! }
//! impl Service for UserService {
//!     fn describe(&self, id: u32) -> String {
//!         self.repository.find(id).unwrap_or_else(|| "unknown".to_string())
//!     }
//! }
//! implements!(UserService => dyn Service);
//! impl Part for UserService {
//!     fn attributes() -> Vec<Attribute> {
//!         vec![Attribute::export::<dyn Service, Self>()]
//!     }
//!
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::single::<dyn Repository>("repository")]
//!     }
//!
//!     fn construct(imports: &Imports<'_>) -> Result<Self, DynError> {
//!         Ok(UserService {
//!             repository: imports.single("repository")?,
//!         })
//!     }
//! }
//!
//! struct InMemoryRepository;
//! impl Repository for InMemoryRepository {
//!     fn find(&self, id: u32) -> Option<String> {
//!         (id == 7).then(|| "Ada".to_string())
//!     }
//! }
//!
//! let application = Assembly::new("application")
//!     .with_part::<SqlRepository>()
//!     .with_part::<UserService>();
//! let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository);
//!
//! let mut helper = CompositionHelper::new();
//! helper
//!     .add_assembly(application, [TypeInfo::of::<SqlRepository>()])
//!     .unwrap()
//!     .compose_export(repository)
//!     .unwrap();
//!
//! let service = helper.get_export::<dyn Service>().unwrap();
//! assert_eq!(service.describe(7), "Ada");
//! assert_eq!(service.describe(8), "unknown");
//! ```

pub mod conventions;
pub mod dependency_graph;
pub mod errors;
pub mod filter;
pub mod helper;
pub mod host;
pub mod overrides;
pub mod part;
pub mod types;

pub use conventions::{AttributeProvider, Conventions, DeclaredAttributes};
pub use errors::{CompositionFailure, ConfigureError, ConventionError, ExportError, HostDisposed};
pub use filter::ConventionFilter;
pub use helper::{CompositionHelper, HostState};
pub use host::{CompositionHost, ExportCandidate, Imports};
pub use overrides::{Dispose, InstanceOverride};
pub use part::{
    Assembly, Attribute, ExportAttribute, ImportAttribute, ImportKind, Parameter, Part,
    PartDescriptor,
};
pub use types::{Contract, DynError, Injectable, Instance, TypeInfo, Upcast};
