// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema context: the explicit, shareable state every writer and reader needs.
//!
//! ```text
//! SchemaContext
//!   descriptors  Arc<DescriptorRegistry>   every (class, version) seen
//!   identities   Arc<IdentityTable>        cross-graph object identities
//!   layouts      LayoutRegistry            current in-memory definitions
//!   rules        RuleSet                   evolution rules
//!   compiler     ActionCompiler            cached action sequences
//!   emulated     (class, checksum) -> Layout for classes nobody declared
//! ```
//!
//! Registries can be shared between contexts (`with_shared`) so several
//! connections see the same descriptors while keeping their own config.

use crate::actions::{ActionCompiler, ActionSequence, Mode, Plan};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::evolution::{EvolutionRule, RuleSet};
use crate::object::{instantiate, Layout, LayoutProvider, LayoutRegistry, Object};
use crate::registry::{DescriptorRegistry, IdentityTable};
use crate::schema::ClassDescriptor;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SchemaContext {
    descriptors: Arc<DescriptorRegistry>,
    identities: Arc<IdentityTable>,
    layouts: LayoutRegistry,
    rules: RuleSet,
    compiler: ActionCompiler,
    emulated: DashMap<(String, u32), Arc<Layout>>,
    config: StreamConfig,
}

impl SchemaContext {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Context over registries owned elsewhere.
    pub fn with_shared(
        descriptors: Arc<DescriptorRegistry>,
        identities: Arc<IdentityTable>,
        config: StreamConfig,
    ) -> Self {
        Self {
            descriptors,
            identities,
            config,
            ..Self::default()
        }
    }

    /// Consult `provider` for classes not registered through this context.
    pub fn with_layout_provider(mut self, provider: Arc<dyn LayoutProvider>) -> Self {
        self.layouts = LayoutRegistry::with_fallback(provider);
        self
    }

    /// Make `desc` the current in-memory definition of its class.
    pub fn register_class(&self, desc: ClassDescriptor) -> Result<Arc<Layout>> {
        let desc = Arc::new(desc);
        let layout = self.layouts.register(Arc::clone(&desc))?;
        self.descriptors.register_arc(desc);
        Ok(layout)
    }

    /// Parse class declarations and register each one as current.
    pub fn declare(&self, src: &str) -> Result<Vec<Arc<Layout>>> {
        ClassDescriptor::parse_all(src)?
            .into_iter()
            .map(|c| self.register_class(c))
            .collect()
    }

    /// Register an evolution rule. Invalidates cached sequences for its class.
    pub fn add_rule(&self, rule: EvolutionRule) -> Result<()> {
        let class = rule.class().to_string();
        self.rules.register(rule)?;
        self.descriptors.bump_epoch(&class);
        Ok(())
    }

    /// Zero-initialized instance of the current definition of `class`.
    pub fn instantiate(&self, class: &str) -> Result<Object> {
        instantiate(&self.layouts, class)
    }

    pub fn layout(&self, class: &str) -> Option<Arc<Layout>> {
        self.layouts.layout(class)
    }

    pub fn descriptors(&self) -> &Arc<DescriptorRegistry> {
        &self.descriptors
    }

    pub fn identities(&self) -> &Arc<IdentityTable> {
        &self.identities
    }

    pub fn layouts(&self) -> &LayoutRegistry {
        &self.layouts
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn compiler(&self) -> &ActionCompiler {
        &self.compiler
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: StreamConfig) {
        self.config = config;
    }

    /// Traversal mode the writer uses for a collection of `element` objects.
    pub(crate) fn collection_mode(&self, element: &Layout) -> Mode {
        crate::actions::choose_mode(element, &self.rules, &self.config)
    }

    /// Layout to decode `disk` into: the current one, else an emulated one.
    pub(crate) fn read_layout(&self, disk: &Arc<ClassDescriptor>) -> Result<Arc<Layout>> {
        if let Some(layout) = self.layouts.layout(disk.name()) {
            return Ok(layout);
        }
        if !self.config.emulate_unknown {
            return Err(Error::NoLayout(disk.name().to_string()));
        }
        let key = (disk.name().to_string(), disk.checksum());
        if let Some(layout) = self.emulated.get(&key) {
            return Ok(Arc::clone(layout.value()));
        }
        log::debug!(
            "[CONTEXT] emulating {} ({:#010x})",
            disk.name(),
            disk.checksum()
        );
        let layout = Arc::new(Layout::emulated(Arc::clone(disk))?);
        // A racing thread may have inserted first; keep whichever landed.
        Ok(Arc::clone(self.emulated.entry(key).or_insert(layout).value()))
    }

    /// On-disk descriptor for (`class`, `checksum`).
    ///
    /// Tries the current layout first, then the registry.
    pub(crate) fn disk_descriptor(&self, class: &str, checksum: u32) -> Result<Arc<ClassDescriptor>> {
        if let Some(layout) = self.layouts.layout(class) {
            if layout.checksum() == checksum {
                return Ok(Arc::clone(layout.descriptor()));
            }
        }
        self.descriptors
            .find_by_checksum(class, checksum)
            .ok_or_else(|| Error::UnknownClass {
                name: class.to_string(),
                checksum,
            })
    }

    /// Cached action sequence for (`disk`, `layout`, `plan`).
    pub(crate) fn sequence(
        &self,
        disk: &ClassDescriptor,
        layout: &Layout,
        plan: Plan,
    ) -> Result<Arc<ActionSequence>> {
        let epoch = self.descriptors.epoch(disk.name());
        self.compiler
            .sequence(disk, layout, plan, &self.rules, epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PrimitiveKind, Value};

    #[test]
    fn test_declare_and_instantiate() {
        let ctx = SchemaContext::default();
        ctx.declare(
            "class Vec3 { f32 v[3]; }
             class Particle : Vec3 version 2 { i8 charge; }",
        )
        .unwrap();
        let p = ctx.instantiate("Particle").unwrap();
        assert_eq!(p.get("charge").unwrap(), Value::I8(0));
        assert!(p.base("Vec3").unwrap().is_some());
        assert_eq!(ctx.descriptors().versions("Particle"), vec![2]);
    }

    #[test]
    fn test_add_rule_bumps_epoch() {
        let ctx = SchemaContext::default();
        ctx.register_class(
            ClassDescriptor::builder("P", 2)
                .primitive("b", PrimitiveKind::I32)
                .build(),
        )
        .unwrap();
        let before = ctx.descriptors().epoch("P");
        ctx.add_rule(EvolutionRule::rename("P", "a", "b")).unwrap();
        assert_eq!(ctx.descriptors().epoch("P"), before + 1);
        assert!(ctx.add_rule(EvolutionRule::rename("P", "a", "b")).is_err());
        assert_eq!(ctx.descriptors().epoch("P"), before + 1);
    }

    #[test]
    fn test_unknown_class_emulation() {
        let disk = Arc::new(
            ClassDescriptor::builder("Ghost", 1)
                .primitive("x", PrimitiveKind::U8)
                .build(),
        );
        let ctx = SchemaContext::default();
        let a = ctx.read_layout(&disk).unwrap();
        let b = ctx.read_layout(&disk).unwrap();
        assert!(a.is_emulated());
        assert!(Arc::ptr_eq(&a, &b));

        let strict = SchemaContext::new(StreamConfig::default().with_emulate_unknown(false));
        assert!(matches!(strict.read_layout(&disk), Err(Error::NoLayout(_))));
        assert!(matches!(
            strict.disk_descriptor("Ghost", disk.checksum()),
            Err(Error::UnknownClass { .. })
        ));
    }
}
