// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reflection seam: resolve a class name to its current in-memory layout.

use super::instance::Object;
use super::layout::Layout;
use crate::error::{Error, Result};
use crate::schema::{ClassDescriptor, MemberKind};
use dashmap::DashMap;
use std::sync::Arc;

/// Answers "what does class `name` look like in this program".
pub trait LayoutProvider: Send + Sync {
    fn layout(&self, class: &str) -> Option<Arc<Layout>>;
}

/// Thread-safe layout table, optionally backed by another provider.
#[derive(Default)]
pub struct LayoutRegistry {
    layouts: DashMap<String, Arc<Layout>>,
    fallback: Option<Arc<dyn LayoutProvider>>,
}

impl std::fmt::Debug for LayoutRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutRegistry")
            .field("classes", &self.layouts.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult `fallback` for classes not registered here.
    pub fn with_fallback(fallback: Arc<dyn LayoutProvider>) -> Self {
        Self {
            layouts: DashMap::new(),
            fallback: Some(fallback),
        }
    }

    /// Install `descriptor` as the current definition of its class.
    pub fn register(&self, descriptor: Arc<ClassDescriptor>) -> Result<Arc<Layout>> {
        let layout = Arc::new(Layout::from_descriptor(descriptor)?);
        self.layouts
            .insert(layout.class_name().to_string(), Arc::clone(&layout));
        Ok(layout)
    }

    pub fn remove(&self, class: &str) -> Option<Arc<Layout>> {
        self.layouts.remove(class).map(|(_, l)| l)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl LayoutProvider for LayoutRegistry {
    fn layout(&self, class: &str) -> Option<Arc<Layout>> {
        if let Some(l) = self.layouts.get(class) {
            return Some(Arc::clone(l.value()));
        }
        self.fallback.as_ref()?.layout(class)
    }
}

/// Zero-initialized instance of `class` with embedded members and bases
/// instantiated recursively.
pub fn instantiate(provider: &dyn LayoutProvider, class: &str) -> Result<Object> {
    let layout = provider
        .layout(class)
        .ok_or_else(|| Error::NoLayout(class.to_string()))?;
    instantiate_layout(provider, layout, 0)
}

const MAX_EMBED_DEPTH: usize = 64;

pub(crate) fn instantiate_layout(
    provider: &dyn LayoutProvider,
    layout: Arc<Layout>,
    depth: usize,
) -> Result<Object> {
    if depth > MAX_EMBED_DEPTH {
        return Err(Error::SchemaMismatch(format!(
            "{} embeds itself too deeply",
            layout.class_name()
        )));
    }
    let mut obj = Object::new(Arc::clone(&layout));
    for field in layout.fields() {
        if let MemberKind::Object { class } | MemberKind::Base { class } = &field.kind {
            let nested = provider
                .layout(class)
                .ok_or_else(|| Error::NoLayout(class.clone()))?;
            let child = instantiate_layout(provider, nested, depth + 1)?;
            obj.set_object(&field.name, child)?;
        }
    }
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PrimitiveKind, Value};

    struct Fixed(Arc<Layout>);

    impl LayoutProvider for Fixed {
        fn layout(&self, class: &str) -> Option<Arc<Layout>> {
            (class == self.0.class_name()).then(|| Arc::clone(&self.0))
        }
    }

    #[test]
    fn test_fallback_and_instantiate() {
        let vec3 = ClassDescriptor::builder("Vec3", 1)
            .array("v", PrimitiveKind::F32, 3)
            .build();
        let fallback = Arc::new(Fixed(Arc::new(Layout::from_descriptor(Arc::new(vec3)).unwrap())));
        let reg = LayoutRegistry::with_fallback(fallback);
        reg.register(Arc::new(
            ClassDescriptor::builder("Particle", 2)
                .base("Vec3")
                .object("momentum", "Vec3")
                .primitive("charge", PrimitiveKind::I8)
                .build(),
        ))
        .unwrap();

        let p = instantiate(&reg, "Particle").unwrap();
        let base = p.base("Vec3").unwrap().unwrap();
        assert_eq!(base.get_array("v").unwrap(), vec![Value::F32(0.0); 3]);
        assert!(p.object("momentum").unwrap().is_some());

        assert!(matches!(instantiate(&reg, "Ghost"), Err(Error::NoLayout(_))));
    }

    #[test]
    fn test_self_embedding_is_rejected() {
        let reg = LayoutRegistry::new();
        reg.register(Arc::new(
            ClassDescriptor::builder("Loop", 1).object("inner", "Loop").build(),
        ))
        .unwrap();
        assert!(matches!(
            instantiate(&reg, "Loop"),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
