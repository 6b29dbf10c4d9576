//! Handle registry.
//!
//! The guest never sees host objects, only `u32` handles. Every resource kind gets its own
//! append-only [`Registry`]: slot 0 is a permanent sentinel, new objects are pushed at the end
//! and released slots are tombstoned (set to `None`) rather than reused, so a stale handle
//! always fails lookup instead of aliasing a newer object.
//!
//! [`LayoutCache`] remembers which resource kind each binding of a bind-group layout expects;
//! bind-group decoding consults it to pick the right union arm.

mod layout_cache;

pub use layout_cache::LayoutCache;

use crate::error::{BridgeError, BridgeResult};
use std::num::NonZeroU32;

/// Resource kinds and their stable release ordinals.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Adapter = 2,
    Device = 3,
    Queue = 4,
    Buffer = 5,
    ShaderModule = 6,
    Texture = 7,
    TextureView = 8,
    Sampler = 9,
    BindGroupLayout = 10,
    BindGroup = 11,
    PipelineLayout = 12,
    ComputePipeline = 13,
    RenderPipeline = 14,
    CommandEncoder = 15,
    CommandBuffer = 16,
    ComputePass = 17,
    RenderPass = 18,
    QuerySet = 19,
    AudioContext = 32,
    AudioBuffer = 33,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 20] = [
        ResourceKind::Adapter,
        ResourceKind::Device,
        ResourceKind::Queue,
        ResourceKind::Buffer,
        ResourceKind::ShaderModule,
        ResourceKind::Texture,
        ResourceKind::TextureView,
        ResourceKind::Sampler,
        ResourceKind::BindGroupLayout,
        ResourceKind::BindGroup,
        ResourceKind::PipelineLayout,
        ResourceKind::ComputePipeline,
        ResourceKind::RenderPipeline,
        ResourceKind::CommandEncoder,
        ResourceKind::CommandBuffer,
        ResourceKind::ComputePass,
        ResourceKind::RenderPass,
        ResourceKind::QuerySet,
        ResourceKind::AudioContext,
        ResourceKind::AudioBuffer,
    ];

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| *k as u32 == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Adapter => "adapter",
            ResourceKind::Device => "device",
            ResourceKind::Queue => "queue",
            ResourceKind::Buffer => "buffer",
            ResourceKind::ShaderModule => "shader module",
            ResourceKind::Texture => "texture",
            ResourceKind::TextureView => "texture view",
            ResourceKind::Sampler => "sampler",
            ResourceKind::BindGroupLayout => "bind group layout",
            ResourceKind::BindGroup => "bind group",
            ResourceKind::PipelineLayout => "pipeline layout",
            ResourceKind::ComputePipeline => "compute pipeline",
            ResourceKind::RenderPipeline => "render pipeline",
            ResourceKind::CommandEncoder => "command encoder",
            ResourceKind::CommandBuffer => "command buffer",
            ResourceKind::ComputePass => "compute pass",
            ResourceKind::RenderPass => "render pass",
            ResourceKind::QuerySet => "query set",
            ResourceKind::AudioContext => "audio context",
            ResourceKind::AudioBuffer => "audio buffer",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A live, non-zero handle value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU32);

impl Handle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Handle)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> u32 {
        handle.get()
    }
}

/// Append-only slot table for one resource kind.
#[derive(Debug)]
pub struct Registry<T> {
    kind: ResourceKind,
    slots: Vec<Option<T>>,
}

impl<T> Registry<T> {
    pub fn new(kind: ResourceKind) -> Self {
        let mut slots = Vec::with_capacity(8);
        slots.push(None);
        Self { kind, slots }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Store `value` and mint its handle. Never returns 0.
    pub fn insert(&mut self, value: T) -> BridgeResult<Handle> {
        let handle = u32::try_from(self.slots.len())
            .ok()
            .and_then(Handle::new)
            .ok_or_else(|| {
                BridgeError::host("allocate handle", format!("{} table exhausted", self.kind))
            })?;
        self.slots.push(Some(value));
        log::trace!("minted {} handle {}", self.kind, handle.get());
        Ok(handle)
    }

    pub fn get(&self, raw: u32) -> Option<&T> {
        if raw == 0 {
            return None;
        }
        self.slots.get(raw as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, raw: u32) -> Option<&mut T> {
        if raw == 0 {
            return None;
        }
        self.slots.get_mut(raw as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, raw: u32) -> bool {
        self.get(raw).is_some()
    }

    /// Like [`Registry::get`], but a miss becomes an [`BridgeError::InvalidHandle`] naming
    /// `field`.
    pub fn resolve(&self, raw: u32, field: &'static str) -> BridgeResult<&T> {
        let kind = self.kind;
        self.get(raw).ok_or(BridgeError::InvalidHandle {
            kind,
            handle: raw,
            field,
        })
    }

    pub fn resolve_mut(&mut self, raw: u32, field: &'static str) -> BridgeResult<&mut T> {
        let kind = self.kind;
        self.get_mut(raw).ok_or(BridgeError::InvalidHandle {
            kind,
            handle: raw,
            field,
        })
    }

    /// Remove and return the object, tombstoning its slot.
    ///
    /// Used by operations that consume their receiver (`finish`, `end`, `submit`).
    pub fn take(&mut self, raw: u32, field: &'static str) -> BridgeResult<T> {
        self.release(raw).ok_or(BridgeError::InvalidHandle {
            kind: self.kind,
            handle: raw,
            field,
        })
    }

    /// Tombstone `raw`. Releasing 0, an out-of-range handle, or an already released handle is a
    /// no-op.
    pub fn release(&mut self, raw: u32) -> Option<T> {
        if raw == 0 {
            return None;
        }
        let released = self.slots.get_mut(raw as usize).and_then(Option::take);
        if released.is_some() {
            log::trace!("released {} handle {raw}", self.kind);
        }
        released
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Live objects with their raw handles, in minting order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i as u32, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_zero_is_never_found_or_minted() {
        for kind in ResourceKind::ALL {
            let mut reg = Registry::new(kind);
            assert!(reg.get(0).is_none());
            let h = reg.insert(kind.name()).unwrap();
            assert_ne!(h.get(), 0);
            assert!(reg.get(0).is_none());
        }
    }

    #[test]
    fn handles_are_sequential_and_never_reused() {
        let mut reg = Registry::new(ResourceKind::Buffer);
        let a = reg.insert("a").unwrap();
        let b = reg.insert("b").unwrap();
        assert_eq!((a.get(), b.get()), (1, 2));

        assert_eq!(reg.release(a.get()), Some("a"));
        let c = reg.insert("c").unwrap();
        assert_eq!(c.get(), 3);
        assert!(reg.get(a.get()).is_none());
        assert_eq!(reg.live(), 2);
    }

    #[test]
    fn release_is_idempotent() {
        let mut reg = Registry::new(ResourceKind::Texture);
        let h = reg.insert(42).unwrap().get();
        assert_eq!(reg.release(h), Some(42));
        assert_eq!(reg.release(h), None);
        assert_eq!(reg.release(0), None);
        assert_eq!(reg.release(9999), None);
        assert!(reg.get(h).is_none());
    }

    #[test]
    fn resolve_names_kind_and_field() {
        let reg: Registry<()> = Registry::new(ResourceKind::Sampler);
        let err = reg.resolve(5, "entries[1].sampler").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidHandle {
                kind: ResourceKind::Sampler,
                handle: 5,
                field: "entries[1].sampler"
            }
        ));
    }

    #[test]
    fn take_consumes_once() {
        let mut reg = Registry::new(ResourceKind::CommandEncoder);
        let h = reg.insert(String::from("enc")).unwrap().get();
        assert_eq!(reg.take(h, "encoder").unwrap(), "enc");
        assert!(reg.take(h, "encoder").is_err());
    }

    #[test]
    fn namespaces_are_independent() {
        let mut buffers = Registry::new(ResourceKind::Buffer);
        let mut textures = Registry::new(ResourceKind::Texture);
        let b = buffers.insert("buffer").unwrap();
        let t = textures.insert("texture").unwrap();
        assert_eq!(b.get(), t.get());
        buffers.release(b.get());
        assert_eq!(textures.get(t.get()), Some(&"texture"));
    }

    #[test]
    fn kind_ids_are_stable() {
        assert_eq!(ResourceKind::from_id(2), Some(ResourceKind::Adapter));
        assert_eq!(ResourceKind::from_id(16), Some(ResourceKind::CommandBuffer));
        assert_eq!(ResourceKind::from_id(19), Some(ResourceKind::QuerySet));
        assert_eq!(ResourceKind::from_id(1), None);
    }
}
