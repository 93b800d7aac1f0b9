//! Feature registry & scheduler (component C2, `spec.md` §4.2).
//!
//! An [`Analysis`] declares `requires`/`provides`/`invalidates` as
//! feature names; [`require`] walks the dependency graph, runs analyses
//! at most once per call, and cascades invalidation through anything
//! whose producer depended on what got invalidated.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::{OtawaError, Result};
use crate::workspace::Workspace;

/// One analysis the registry can schedule.
pub trait Analysis {
    fn name(&self) -> &'static str;
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }
    fn provides(&self) -> &'static [&'static str];
    fn invalidates(&self) -> &'static [&'static str] {
        &[]
    }
    fn run(&self, ws: &mut Workspace) -> Result<()>;
}

#[derive(Default)]
pub struct FeatureRegistry {
    analyses: HashMap<&'static str, Rc<dyn Analysis>>,
    /// feature -> candidate analysis names, in registration order.
    providers: HashMap<&'static str, Vec<&'static str>>,
    /// feature -> explicitly preferred analysis name.
    preferred: HashMap<&'static str, &'static str>,
    held: HashSet<&'static str>,
    /// feature -> name of the analysis that actually produced it, used
    /// to drive the invalidation cascade.
    producer_of: HashMap<&'static str, &'static str>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        FeatureRegistry::default()
    }

    pub fn register(&mut self, analysis: Rc<dyn Analysis>) {
        let name = analysis.name();
        for &feature in analysis.provides() {
            self.providers.entry(feature).or_default().push(name);
        }
        self.analyses.insert(name, analysis);
    }

    /// Explicitly select which analysis provides `feature`, overriding
    /// first-registered-wins.
    pub fn prefer(&mut self, feature: &'static str, analysis_name: &'static str) {
        self.preferred.insert(feature, analysis_name);
    }

    pub fn is_held(&self, feature: &str) -> bool {
        self.held.contains(feature)
    }

    fn provider_of(&self, feature: &str) -> Option<Rc<dyn Analysis>> {
        if let Some(&name) = self.preferred.get(feature) {
            return self.analyses.get(name).cloned();
        }
        self.providers.get(feature)?.first().and_then(|name| self.analyses.get(name).cloned())
    }

    fn mark_held(&mut self, analysis: &dyn Analysis) {
        for &feature in analysis.invalidates() {
            self.invalidate(feature);
        }
        for &feature in analysis.provides() {
            self.held.insert(feature);
            self.producer_of.insert(feature, analysis.name());
        }
    }

    fn invalidate(&mut self, feature: &'static str) {
        if !self.held.remove(feature) {
            return;
        }
        self.producer_of.remove(feature);
        let dependents: Vec<&'static str> = self
            .held
            .iter()
            .copied()
            .filter(|held_feature| {
                self.producer_of
                    .get(held_feature)
                    .and_then(|producer| self.analyses.get(producer))
                    .is_some_and(|a| a.requires().contains(&feature))
            })
            .collect();
        for dependent in dependents {
            self.invalidate(dependent);
        }
    }
}

/// Ensure `feature` is held, running whatever analysis provides it (and
/// recursively its prerequisites) if it is not already.
pub fn require(ws: &mut Workspace, feature: &'static str) -> Result<()> {
    if ws.registry.is_held(feature) {
        return Ok(());
    }
    let analysis = ws
        .registry
        .provider_of(feature)
        .ok_or_else(|| OtawaError::ConsistencyError(format!("no analysis registered to provide `{feature}`")))?;

    for &prereq in analysis.requires() {
        if ws.is_cancelled() {
            return Err(OtawaError::Cancelled);
        }
        require(ws, prereq)?;
    }
    analysis.run(ws)?;
    ws.registry.mark_held(analysis.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Platform;

    struct Base;
    impl Analysis for Base {
        fn name(&self) -> &'static str {
            "base"
        }
        fn provides(&self) -> &'static [&'static str] {
            &["base-feature"]
        }
        fn run(&self, ws: &mut Workspace) -> Result<()> {
            ws.props.set(crate::property::PropertyId::new("base-ran"), true);
            Ok(())
        }
    }

    struct Derived;
    impl Analysis for Derived {
        fn name(&self) -> &'static str {
            "derived"
        }
        fn requires(&self) -> &'static [&'static str] {
            &["base-feature"]
        }
        fn provides(&self) -> &'static [&'static str] {
            &["derived-feature"]
        }
        fn run(&self, _ws: &mut Workspace) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn requiring_a_feature_runs_its_prerequisites_first() {
        let mut ws = Workspace::new(Platform::new());
        ws.registry.register(Rc::new(Base));
        ws.registry.register(Rc::new(Derived));

        require(&mut ws, "derived-feature").unwrap();
        assert!(ws.registry.is_held("base-feature"));
        assert!(ws.registry.is_held("derived-feature"));
    }

    #[test]
    fn unknown_feature_is_a_consistency_error() {
        let mut ws = Workspace::new(Platform::new());
        assert!(require(&mut ws, "nope").is_err());
    }

    #[test]
    fn invalidating_a_feature_cascades_to_its_dependents() {
        struct Invalidator;
        impl Analysis for Invalidator {
            fn name(&self) -> &'static str {
                "invalidator"
            }
            fn provides(&self) -> &'static [&'static str] {
                &["invalidator-feature"]
            }
            fn invalidates(&self) -> &'static [&'static str] {
                &["base-feature"]
            }
            fn run(&self, _ws: &mut Workspace) -> Result<()> {
                Ok(())
            }
        }

        let mut ws = Workspace::new(Platform::new());
        ws.registry.register(Rc::new(Base));
        ws.registry.register(Rc::new(Derived));
        ws.registry.register(Rc::new(Invalidator));

        require(&mut ws, "derived-feature").unwrap();
        require(&mut ws, "invalidator-feature").unwrap();
        assert!(!ws.registry.is_held("base-feature"));
        assert!(!ws.registry.is_held("derived-feature"));
    }
}
