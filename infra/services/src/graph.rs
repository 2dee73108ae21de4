//! Graph walks shared by the live registry and batch plans.

use crate::definition::{Dependency, DependencyTarget};
use crate::error::RegistryError;
use capstan_domain::{ServiceName, ServiceState};
use fxhash::{FxHashMap, FxHashSet};

/// Read access to a set of registered services and the capabilities they publish.
pub(crate) trait DependencyView {
    fn names(&self) -> Vec<ServiceName>;

    fn dependencies(&self, name: &ServiceName) -> Option<&[Dependency]>;

    fn resolve(&self, target: &DependencyTarget) -> Option<ServiceName>;

    fn state(&self, name: &ServiceName) -> Option<ServiceState>;

    fn resolves_to(&self, target: &DependencyTarget, name: &ServiceName) -> bool {
        self.resolve(target).as_ref() == Some(name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// `root` and everything it transitively depends on, dependencies first.
///
/// Optional dependencies are followed when they resolve and skipped otherwise.
pub(crate) fn activation_order(
    view: &impl DependencyView,
    root: &ServiceName,
) -> Result<Vec<ServiceName>, RegistryError> {
    if view.dependencies(root).is_none() {
        return Err(RegistryError::NotRegistered { name: root.clone() });
    }
    let mut marks = FxHashMap::default();
    let mut path = Vec::new();
    let mut order = Vec::new();
    visit(view, root, &mut marks, &mut path, &mut order)?;
    Ok(order)
}

fn visit(
    view: &impl DependencyView,
    name: &ServiceName,
    marks: &mut FxHashMap<ServiceName, Mark>,
    path: &mut Vec<ServiceName>,
    order: &mut Vec<ServiceName>,
) -> Result<(), RegistryError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| n == name).unwrap_or_default();
            let mut cycle = path[start..].to_vec();
            cycle.push(name.clone());
            return Err(RegistryError::CyclicDependency { cycle });
        },
        None => {},
    }
    let dependencies =
        view.dependencies(name).ok_or_else(|| RegistryError::NotRegistered { name: name.clone() })?;

    marks.insert(name.clone(), Mark::Visiting);
    path.push(name.clone());
    for dependency in dependencies {
        match view.resolve(dependency.target()) {
            Some(target) => visit(view, &target, marks, path, order)?,
            None if dependency.is_optional() => {},
            None => {
                return Err(RegistryError::MissingDependency {
                    service: name.clone(),
                    dependency: dependency.target().to_string(),
                });
            },
        }
    }
    path.pop();
    marks.insert(name.clone(), Mark::Done);
    order.push(name.clone());
    Ok(())
}

/// Services holding a required dependency on `name`, directly or through a capability.
pub(crate) fn hard_dependents(view: &impl DependencyView, name: &ServiceName) -> Vec<ServiceName> {
    let mut dependents: Vec<_> = view
        .names()
        .into_iter()
        .filter(|candidate| candidate != name)
        .filter(|candidate| {
            view.dependencies(candidate).is_some_and(|deps| {
                deps.iter().any(|d| !d.is_optional() && view.resolves_to(d.target(), name))
            })
        })
        .collect();
    dependents.sort();
    dependents
}

/// Everything that transitively requires `root`, dependents first, ending with `root`.
pub(crate) fn stop_order(view: &impl DependencyView, root: &ServiceName) -> Vec<ServiceName> {
    let mut seen = FxHashSet::default();
    let mut order = Vec::new();
    collect_dependents(view, root, &mut seen, &mut order);
    order
}

fn collect_dependents(
    view: &impl DependencyView,
    name: &ServiceName,
    seen: &mut FxHashSet<ServiceName>,
    order: &mut Vec<ServiceName>,
) {
    if !seen.insert(name.clone()) {
        return;
    }
    for dependent in hard_dependents(view, name) {
        collect_dependents(view, &dependent, seen, order);
    }
    order.push(name.clone());
}

/// Every service, dependents before their dependencies. Cycles are broken arbitrarily.
pub(crate) fn shutdown_order(view: &impl DependencyView) -> Vec<ServiceName> {
    let mut names = view.names();
    names.sort();
    let mut marks = FxHashMap::default();
    let mut order = Vec::new();
    for name in &names {
        visit_lenient(view, name, &mut marks, &mut order);
    }
    order.reverse();
    order
}

fn visit_lenient(
    view: &impl DependencyView,
    name: &ServiceName,
    marks: &mut FxHashMap<ServiceName, Mark>,
    order: &mut Vec<ServiceName>,
) {
    if marks.contains_key(name) {
        return;
    }
    marks.insert(name.clone(), Mark::Visiting);
    if let Some(dependencies) = view.dependencies(name) {
        for dependency in dependencies {
            if let Some(target) = view.resolve(dependency.target()) {
                visit_lenient(view, &target, marks, order);
            }
        }
    }
    marks.insert(name.clone(), Mark::Done);
    order.push(name.clone());
}
