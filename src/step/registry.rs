//! Name -> constructor table for steps.
//!
//! Configuration lists pipeline steps by name; the registry turns those names
//! into step instances that share one command runner.

use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{check_image, flash_fw_util, CheckImageFile, FlashFwUtil, Step};
use crate::command::CommandRunner;
use crate::error::ConfigError;

/// Builds a step from the shared command runner.
pub type StepFactory = fn(Arc<dyn CommandRunner>) -> Box<dyn Step>;

pub struct StepRegistry {
    runner: Arc<dyn CommandRunner>,
    factories: BTreeMap<String, StepFactory>,
}

impl StepRegistry {
    /// Empty registry; steps must be added with [`register`](Self::register).
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        StepRegistry {
            runner,
            factories: BTreeMap::new(),
        }
    }

    /// Registry preloaded with every step this crate ships.
    pub fn with_builtin_steps(runner: Arc<dyn CommandRunner>) -> Self {
        let mut registry = StepRegistry::new(runner);
        registry.register(check_image::STEP_NAME, build_check_image);
        registry.register(flash_fw_util::STEP_NAME, build_flash_fw_util);
        registry
    }

    /// Adds or replaces the factory for `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: StepFactory) {
        let name = name.into();
        if self.factories.insert(name.clone(), factory).is_some() {
            debug!("Replaced step factory '{}'", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn build(&self, name: &str) -> Result<Box<dyn Step>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStep {
                name: name.to_string(),
                known: self.names().join(", "),
            })?;
        Ok(factory(Arc::clone(&self.runner)))
    }

    /// Builds the ordered pipeline for `names`, failing on the first unknown one.
    pub fn build_pipeline<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Box<dyn Step>>, ConfigError> {
        names.iter().map(|name| self.build(name.as_ref())).collect()
    }
}

fn build_check_image(_runner: Arc<dyn CommandRunner>) -> Box<dyn Step> {
    Box::new(CheckImageFile::new())
}

fn build_flash_fw_util(runner: Arc<dyn CommandRunner>) -> Box<dyn Step> {
    Box::new(FlashFwUtil::new(runner))
}
