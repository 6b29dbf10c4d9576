use crate::abi::enums::BindingLayoutKind;
use crate::registry::Handle;
use std::collections::HashMap;

/// Per-binding resource kinds of every live bind-group layout.
///
/// Filled exactly when a layout is created and read exactly when a bind group built against it
/// is decoded.
#[derive(Debug, Default)]
pub struct LayoutCache {
    layouts: HashMap<u32, HashMap<u32, BindingLayoutKind>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_layout(
        &mut self,
        handle: Handle,
        per_binding_kind: impl IntoIterator<Item = (u32, BindingLayoutKind)>,
    ) {
        self.layouts
            .insert(handle.get(), per_binding_kind.into_iter().collect());
    }

    /// Kind declared for `binding_index` in layout `handle`, if both exist.
    pub fn kind_for(&self, handle: u32, binding_index: u32) -> Option<BindingLayoutKind> {
        self.layouts
            .get(&handle)
            .and_then(|bindings| bindings.get(&binding_index))
            .copied()
    }

    pub fn forget(&mut self, handle: u32) {
        self.layouts.remove(&handle);
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_keyed_by_layout_and_binding() {
        let mut cache = LayoutCache::new();
        let a = Handle::new(1).unwrap();
        let b = Handle::new(2).unwrap();
        cache.record_layout(
            a,
            [(0, BindingLayoutKind::Buffer), (3, BindingLayoutKind::Texture)],
        );
        cache.record_layout(b, [(0, BindingLayoutKind::Sampler)]);

        assert_eq!(cache.kind_for(1, 3), Some(BindingLayoutKind::Texture));
        assert_eq!(cache.kind_for(2, 0), Some(BindingLayoutKind::Sampler));
        assert_eq!(cache.kind_for(1, 1), None);
        assert_eq!(cache.kind_for(0, 0), None);

        cache.forget(1);
        assert_eq!(cache.kind_for(1, 0), None);
        assert_eq!(cache.len(), 1);
    }
}
