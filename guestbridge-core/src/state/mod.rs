//! Boundary context.
//!
//! One [`HostState`] lives in the wasmtime `Store` and is threaded through every import call.
//! It owns everything the bridge keeps between calls: the registries (inside the GPU and audio
//! states), the error slot, the completion queue and the input forwarder. Guest memory is never
//! stored here; imports re-derive it from the caller on every call.

use crate::abi::{Feature, FeatureSet};
use crate::audio::{AudioBackend, AudioState};
use crate::bridge::{CompletionQueue, GuestCall};
use crate::config::{BridgeConfig, ConfigError};
use crate::error::{BridgeError, BridgeResult, ErrorSlot};
use crate::gpu::{GpuBackend, GpuState};
use crate::input::{InputForwarder, Rect};
use crate::layout::PointerWidth;
use crate::layout::records::RecordLayouts;
use crate::registry::{Handle, ResourceKind};

pub struct HostState<G: GpuBackend, A: AudioBackend> {
    pub config: BridgeConfig,
    pub errors: ErrorSlot,
    pub gpu: GpuState<G>,
    pub audio: AudioState<A>,
    pub completions: CompletionQueue<G>,
    pub input: InputForwarder,
    /// Starts as the configured whitelist and narrows to what the guest asked for.
    pub features: FeatureSet,
}

impl<G: GpuBackend, A: AudioBackend> HostState<G, A> {
    pub fn new(config: BridgeConfig, gpu: G, audio: A) -> Result<Self, ConfigError> {
        config.validate()?;
        let features = config.allowed_features()?;
        let viewport = config.viewport;
        Ok(Self {
            gpu: GpuState::new(gpu, RecordLayouts::new(config.pointer_width)),
            audio: AudioState::new(audio),
            completions: CompletionQueue::new(),
            input: InputForwarder::new(Rect::new(
                0.0,
                0.0,
                viewport.width as f32,
                viewport.height as f32,
            )),
            errors: ErrorSlot::new(),
            features,
            config,
        })
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.config.pointer_width
    }

    /// Fail unless `feature` survived negotiation.
    pub fn require(&self, feature: Feature) -> BridgeResult<()> {
        if self.features.contains(feature) {
            Ok(())
        } else {
            Err(BridgeError::host(
                "feature check",
                format!("feature `{feature}` is not enabled"),
            ))
        }
    }

    /// Guest return value of a handle-producing import: the handle, or 0 with the reason left
    /// in the error slot.
    pub fn produce(&mut self, op: &'static str, result: BridgeResult<Handle>) -> u32 {
        match result {
            Ok(handle) => handle.get(),
            Err(err) => self.errors.record_error(op, &err),
        }
    }

    /// Void imports have nowhere to report to; their failures are only logged.
    pub fn complete(&self, op: &'static str, result: BridgeResult<()>) {
        if let Err(err) = result {
            log::warn!("{op}: {err}");
        }
    }

    /// `bridge_release`. Unknown kinds and dead handles are ignored.
    pub fn release(&mut self, kind_id: u32, handle: u32) {
        match ResourceKind::from_id(kind_id) {
            Some(kind @ (ResourceKind::AudioContext | ResourceKind::AudioBuffer)) => {
                self.audio.release(kind, handle);
            }
            Some(kind) => {
                self.gpu.release(kind, handle);
            }
            None => log::warn!("release: unknown resource kind {kind_id} (handle {handle})"),
        }
    }

    /// Settle everything completed since the last call, minting handles for produced objects.
    pub fn pump(&mut self) -> Vec<GuestCall> {
        let settled = self.completions.drain();
        settled
            .into_iter()
            .map(|c| c.settle(&mut self.gpu.objects, &mut self.audio.objects.buffers))
            .collect()
    }
}
