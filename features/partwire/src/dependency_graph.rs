use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::{
    part::ImportKind,
    types::{Contract, TypeInfo},
};

/// Graph of all constructed parts and what satisfies their imports
/// Used to check for missing, ambiguous and circular dependencies before anything is constructed
#[derive(Default)]
pub struct DependencyGraph {
    map: BTreeMap<usize, DependencyGraphEntry>,
}

/// What satisfies an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Part constructed by the composition, by part index
    Part(usize),
    /// Pre-built instance, has no dependencies itself
    Instance,
}

/// One import of a part together with everything that can satisfy it
#[derive(Debug, Clone)]
pub struct Dependency {
    pub contract: Contract,
    pub kind: ImportKind,
    pub providers: Vec<Provider>,
}

struct DependencyGraphEntry {
    info: TypeInfo,
    dependencies: Vec<Dependency>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the part with the given index
    pub fn add(&mut self, part: usize, info: TypeInfo, dependencies: Vec<Dependency>) {
        self.map
            .insert(part, DependencyGraphEntry { info, dependencies });
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();
        for part in self.map.keys() {
            let mut dependency_chain = Vec::new();
            check_recurse(self, &mut checked, &mut errors, &mut dependency_chain, *part);
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse(
            graph: &DependencyGraph,
            checked: &mut HashSet<usize>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<usize>,
            part: usize,
        ) {
            let Some(entry) = graph.map.get(&part) else {
                return;
            };

            // Circular Dependency Check
            if dependency_chain.contains(&part) {
                let from = dependency_chain
                    .last()
                    .and_then(|last| graph.map.get(last))
                    .map_or(entry.info, |last| last.info);
                let mut chain = graph.infos(dependency_chain);
                chain.push(entry.info); // Add current so chain is complete

                errors.push(DependencyGraphError::CircularDependency {
                    from,
                    to: entry.info,
                    chain,
                });
            }

            // Skip other checks if already checked
            if !checked.insert(part) {
                return;
            }

            dependency_chain.push(part);

            for dependency in &entry.dependencies {
                let count = dependency.providers.len();
                match dependency.kind {
                    ImportKind::Single if count == 0 => {
                        errors.push(DependencyGraphError::MissingDependency {
                            dependency: dependency.contract.clone(),
                            required_by: entry.info,
                        });
                    }
                    ImportKind::Single | ImportKind::Optional if count > 1 => {
                        errors.push(DependencyGraphError::AmbiguousDependency {
                            dependency: dependency.contract.clone(),
                            required_by: entry.info,
                            count,
                        });
                    }
                    _ => {}
                }

                for provider in &dependency.providers {
                    if let Provider::Part(next) = provider {
                        check_recurse(graph, checked, errors, dependency_chain, *next);
                    }
                }
            }

            dependency_chain.pop();
        }
    }

    fn infos(&self, parts: &[usize]) -> Vec<TypeInfo> {
        parts
            .iter()
            .filter_map(|part| self.map.get(part))
            .map(|entry| entry.info)
            .collect()
    }
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: Contract,
        required_by: TypeInfo,
    },
    #[error("'{required_by}' needs one '{dependency}' but {count} are exported")]
    AmbiguousDependency {
        dependency: Contract,
        required_by: TypeInfo,
        count: usize,
    },
    #[error("A Circular Dependency exists between '{from}' and '{to}' through {chain:?}")]
    CircularDependency {
        from: TypeInfo,
        to: TypeInfo,
        chain: Vec<TypeInfo>,
    },
}
impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Api;
    struct Repository;
    struct Database;

    fn single(contract: Contract, providers: Vec<Provider>) -> Dependency {
        Dependency {
            contract,
            kind: ImportKind::Single,
            providers,
        }
    }

    #[test]
    fn satisfied_graph_passes() {
        let mut graph = DependencyGraph::new();
        graph.add(
            0,
            TypeInfo::of::<Api>(),
            vec![single(Contract::of::<Repository>(), vec![Provider::Part(1)])],
        );
        graph.add(
            1,
            TypeInfo::of::<Repository>(),
            vec![single(Contract::of::<Database>(), vec![Provider::Instance])],
        );

        assert_eq!(graph.len(), 2);
        assert!(graph.check().is_ok());
    }

    #[test]
    fn missing_and_ambiguous_dependencies_are_all_reported() {
        let mut graph = DependencyGraph::new();
        graph.add(
            0,
            TypeInfo::of::<Api>(),
            vec![
                single(Contract::of::<Repository>(), vec![]),
                single(
                    Contract::of::<Database>(),
                    vec![Provider::Instance, Provider::Instance],
                ),
            ],
        );

        let errors = graph.check().unwrap_err().errors;
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            DependencyGraphError::MissingDependency { .. }
        ));
        assert!(matches!(
            errors[1],
            DependencyGraphError::AmbiguousDependency { count: 2, .. }
        ));
    }

    #[test]
    fn optional_and_many_imports_tolerate_missing_providers() {
        let mut graph = DependencyGraph::new();
        graph.add(
            0,
            TypeInfo::of::<Api>(),
            vec![
                Dependency {
                    contract: Contract::of::<Repository>(),
                    kind: ImportKind::Optional,
                    providers: vec![],
                },
                Dependency {
                    contract: Contract::of::<Database>(),
                    kind: ImportKind::Many,
                    providers: vec![Provider::Instance, Provider::Instance],
                },
            ],
        );

        assert!(graph.check().is_ok());
    }

    #[test]
    fn circular_dependency_is_detected() {
        let mut graph = DependencyGraph::new();
        graph.add(
            0,
            TypeInfo::of::<Api>(),
            vec![single(Contract::of::<Repository>(), vec![Provider::Part(1)])],
        );
        graph.add(
            1,
            TypeInfo::of::<Repository>(),
            vec![single(Contract::of::<Api>(), vec![Provider::Part(0)])],
        );

        let errors = graph.check().unwrap_err().errors;
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            DependencyGraphError::CircularDependency { from, to, chain } => {
                assert_eq!(*from, TypeInfo::of::<Repository>());
                assert_eq!(*to, TypeInfo::of::<Api>());
                assert_eq!(chain.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
