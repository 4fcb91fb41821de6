//! Pass registry: pass names to constructors.
//!
//! The registry is read-only once built and is shared by every worker that
//! runs test cases; each lookup constructs a fresh pass, so no pass state
//! is ever shared between functions.

use rustc_hash::FxHashMap;
use thiserror::Error;

use jit_hir::Function;

use crate::{
    run_pass, CallOptimization, DeadCodeElimination, DynamicComparisonElimination,
    LoadAttrSpecialization, Pass, PassError, PassOutcome, PhiElimination, RefcountInsertion,
    Simplify, SuperAccessResolution,
};

/// Constructs a fresh pass instance.
pub type PassFactory = fn() -> Box<dyn Pass>;

/// A lookup by name failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown pass name {name}")]
    UnknownPassName { name: String },
}

/// Map from pass name to constructor.
pub struct PassRegistry {
    factories: FxHashMap<&'static str, PassFactory>,
}

impl PassRegistry {
    /// A registry holding every built-in pass.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("RefcountInsertion", || Box::new(RefcountInsertion));
        registry.register("Simplify", || Box::new(Simplify));
        registry.register("DeadCodeElimination", || Box::new(DeadCodeElimination));
        registry.register("PhiElimination", || Box::new(PhiElimination));
        registry.register("DynamicComparisonElimination", || {
            Box::new(DynamicComparisonElimination)
        });
        registry.register("LoadAttrSpecialization", || Box::new(LoadAttrSpecialization));
        registry.register("CallOptimization", || Box::new(CallOptimization));
        registry.register("SuperAccessResolution", || Box::new(SuperAccessResolution));
        registry
    }

    /// A registry with no passes.
    pub fn empty() -> Self {
        PassRegistry {
            factories: FxHashMap::default(),
        }
    }

    /// Add or replace the constructor for `name`.
    pub fn register(&mut self, name: &'static str, factory: PassFactory) {
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// A fresh instance of the pass called `name`.
    pub fn make_pass(&self, name: &str) -> Result<Box<dyn Pass>, RegistryError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownPassName {
                name: name.to_owned(),
            })
    }

    /// Check that every name is registered, reporting the first that is not.
    pub fn validate<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), RegistryError> {
        for name in names {
            if !self.contains(name) {
                return Err(RegistryError::UnknownPassName {
                    name: name.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Instantiate `names` in order as a pipeline.
    pub fn build_pipeline<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Pipeline, RegistryError> {
        let passes = names
            .into_iter()
            .map(|name| self.make_pass(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pipeline { passes })
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered list of pass instances for one function.
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    /// Run every pass in order, stopping at the first failure.
    pub fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        for pass in &mut self.passes {
            let _span = tracing::debug_span!("pass", name = pass.name()).entered();
            if run_pass(pass.as_mut(), func)? == PassOutcome::Skipped {
                tracing::trace!(pass = pass.name(), "skipped");
            }
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

#[cfg(test)]
mod tests;
