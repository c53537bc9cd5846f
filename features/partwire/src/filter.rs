use std::{
    any::TypeId,
    collections::HashSet,
    fmt::Debug,
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    conventions::{AttributeProvider, DeclaredAttributes},
    part::{Attribute, Parameter, PartDescriptor},
    types::TypeInfo,
};

/// Gates attribute lookups of one source.
///
/// Parts on the ignore list are reported without any attributes, which makes them
/// invisible to the composition. Their contracts can then be satisfied by an override
/// without competing with the part itself.
///
/// Every contract exported by a part that is not ignored is recorded, so the
/// composition can report what it is able to export.
pub struct ConventionFilter {
    ignored: HashSet<TypeId>,
    conventions: Arc<dyn AttributeProvider>,
    bookkeeping: Mutex<Bookkeeping>,
}

#[derive(Default)]
struct Bookkeeping {
    /// Parts whose exports were already recorded
    visited: HashSet<TypeId>,
    exportable: HashSet<TypeInfo>,
}

impl Debug for ConventionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConventionFilter")
            .field("ignored", &self.ignored.len())
            .field("exportable", &self.bookkeeping.lock().exportable)
            .finish()
    }
}

impl ConventionFilter {
    /// Creates a filter delegating to `conventions`, or to the declared attributes if there are none
    pub fn new(
        conventions: Option<Arc<dyn AttributeProvider>>,
        ignored: impl IntoIterator<Item = TypeInfo>,
    ) -> Self {
        ConventionFilter {
            ignored: ignored.into_iter().map(|info| info.type_id).collect(),
            conventions: conventions.unwrap_or_else(|| Arc::new(DeclaredAttributes)),
            bookkeeping: Mutex::new(Bookkeeping::default()),
        }
    }

    pub fn is_ignored(&self, part: &PartDescriptor) -> bool {
        self.ignored.contains(&part.info.type_id)
    }

    /// Contract types exported by all parts looked up so far
    pub fn exportable_types(&self) -> HashSet<TypeInfo> {
        self.bookkeeping.lock().exportable.clone()
    }

    /// Records the exports of a part the first time it is seen
    fn record_exports(&self, part: &PartDescriptor, attributes: &[Attribute]) {
        let mut bookkeeping = self.bookkeeping.lock();
        if !bookkeeping.visited.insert(part.info.type_id) {
            return;
        }

        for export in attributes.iter().filter_map(Attribute::as_export) {
            tracing::trace!("{} exports {}", part.info, export.contract());
            bookkeeping.exportable.insert(export.contract);
        }
    }
}

impl AttributeProvider for ConventionFilter {
    fn type_attributes(&self, part: &PartDescriptor) -> Vec<Attribute> {
        if self.is_ignored(part) {
            tracing::debug!("Ignoring attributes of excluded part {}", part.info);
            return Vec::new();
        }

        let attributes = self.conventions.type_attributes(part);
        self.record_exports(part, &attributes);
        attributes
    }

    fn parameter_attributes(&self, part: &PartDescriptor, parameter: &Parameter) -> Vec<Attribute> {
        if self.is_ignored(part) {
            return Vec::new();
        }

        let attributes = self.conventions.parameter_attributes(part, parameter);
        // Parameter attributes never export, the part's own attributes have to be looked up for that
        if !self.bookkeeping.lock().visited.contains(&part.info.type_id) {
            let type_attributes = self.conventions.type_attributes(part);
            self.record_exports(part, &type_attributes);
        }
        attributes
    }
}
