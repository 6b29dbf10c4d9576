//! guestbridge ABI module
//!
//! This module defines the contract between:
//! - **Host**: `guestbridge-core` (wasmtime host driving a [`GpuBackend`](crate::gpu::GpuBackend)
//!   and an [`AudioBackend`](crate::audio::AudioBackend))
//! - **Guest**: the loaded WASM module
//!
//! ## Model (handle-based)
//! The guest never holds host objects. Every host object lives in a per-kind registry and the
//! guest refers to it by a non-zero `u32` handle. Descriptors are fixed-layout records in guest
//! linear memory; the guest passes their address and the host decodes them during the call.
//!
//! Pointer-typed parameters (`ptr`, `len`, descriptor addresses) are `i32` for 32-bit guests and
//! `i64` for 64-bit guests. Handles, enum ordinals and counts of small things are always `i32`.
//! Byte offsets and sizes inside GPU buffers are always `i64`.
//!
//! ## Imports (guest -> host)
//! Imported from module `"env"`.
//!
//! ### ABI / diagnostics
//! - `bridge_abi_version() -> u32`
//! - `bridge_log(ptr, len)`
//! - `bridge_error_pending() -> u32`
//! - `bridge_error_len() -> u32`
//! - `bridge_error_copy(ptr, len) -> u32`
//!     - Copies the next `len` bytes of the pending message; the slot clears after the last byte.
//! - `bridge_release(kind: u32, handle: u32)`
//!
//! ### Graphics / compute (`gpu_*`)
//! Handle-producing imports return 0 on failure and leave a message in the error slot.
//! `gpu_request_adapter`, `gpu_adapter_request_device` and `gpu_queue_on_submitted_work_done`
//! return nothing; their result arrives through a guest export.
//!
//! ### Audio (`audio_*`)
//! `audio_decode` copies the encoded bytes and reports through `bridge_on_audio_decoded` or
//! `bridge_on_audio_decode_error`.
//!
//! ## Exports (host -> guest)
//! - `start()` (or `_start`): called once after instantiation.
//! - `update_frame(delta_ms: f64)`: called once per frame.
//! - `features_ptr() -> ptr` / `features_len() -> len` (optional): comma-separated feature
//!   names. Without them every feature allowed by the host configuration is enabled.
//! - completion and input callbacks (all optional), see [`guest_exports`].
//!
//! ## ABI Stability
//! Incompatible record layout changes bump [`ABI_VERSION`]. Version 2 tags every bind-group
//! entry with its resource kind.

pub mod enums;

use std::fmt;

/// Current ABI version reported by `bridge_abi_version`.
pub const ABI_VERSION: u32 = 2;

/// Import module name used by the guest.
pub const IMPORT_MODULE: &str = "env";

/// Guest export names.
pub mod guest_exports {
    /// Linear memory (required).
    pub const MEMORY: &str = "memory";

    /// Called once after instantiation.
    pub const START: &str = "start";
    /// Accepted when `start` is absent.
    pub const START_FALLBACK: &str = "_start";
    /// Called once per frame with the elapsed milliseconds.
    pub const UPDATE_FRAME: &str = "update_frame";

    pub const FEATURES_PTR: &str = "features_ptr";
    pub const FEATURES_LEN: &str = "features_len";

    // Completions
    pub const ON_ADAPTER_RECEIVED: &str = "bridge_on_adapter_received";
    pub const ON_DEVICE_RECEIVED: &str = "bridge_on_device_received";
    pub const ON_QUEUE_WORK_DONE: &str = "bridge_on_queue_work_done";
    pub const ON_AUDIO_DECODED: &str = "bridge_on_audio_decoded";
    pub const ON_AUDIO_DECODE_ERROR: &str = "bridge_on_audio_decode_error";

    // Input
    pub const ON_MOUSE_MOVE: &str = "bridge_on_mouse_move";
    pub const ON_MOUSE_BUTTON: &str = "bridge_on_mouse_button";
    pub const ON_MOUSE_WHEEL: &str = "bridge_on_mouse_wheel";
    pub const ON_KEY_EVENT: &str = "bridge_on_key_event";
}

/// Host import names provided to the guest under [`IMPORT_MODULE`].
pub mod host_imports {
    // ABI / diagnostics
    pub const ABI_VERSION: &str = "bridge_abi_version";
    pub const LOG: &str = "bridge_log";
    pub const ERROR_PENDING: &str = "bridge_error_pending";
    pub const ERROR_LEN: &str = "bridge_error_len";
    pub const ERROR_COPY: &str = "bridge_error_copy";
    pub const RELEASE: &str = "bridge_release";

    // Adapter / device
    pub const GPU_REQUEST_ADAPTER: &str = "gpu_request_adapter";
    pub const GPU_ADAPTER_REQUEST_DEVICE: &str = "gpu_adapter_request_device";
    pub const GPU_DEVICE_GET_QUEUE: &str = "gpu_device_get_queue";

    // Resource creation
    pub const GPU_CREATE_BUFFER: &str = "gpu_create_buffer";
    pub const GPU_CREATE_SHADER_MODULE: &str = "gpu_create_shader_module";
    pub const GPU_CREATE_TEXTURE: &str = "gpu_create_texture";
    pub const GPU_TEXTURE_CREATE_VIEW: &str = "gpu_texture_create_view";
    pub const GPU_CREATE_SAMPLER: &str = "gpu_create_sampler";
    pub const GPU_CREATE_BIND_GROUP_LAYOUT: &str = "gpu_create_bind_group_layout";
    pub const GPU_CREATE_BIND_GROUP: &str = "gpu_create_bind_group";
    pub const GPU_CREATE_PIPELINE_LAYOUT: &str = "gpu_create_pipeline_layout";
    pub const GPU_CREATE_COMPUTE_PIPELINE: &str = "gpu_create_compute_pipeline";
    pub const GPU_CREATE_RENDER_PIPELINE: &str = "gpu_create_render_pipeline";
    pub const GPU_CREATE_QUERY_SET: &str = "gpu_create_query_set";

    // Command encoding
    pub const GPU_CREATE_COMMAND_ENCODER: &str = "gpu_create_command_encoder";
    pub const GPU_ENCODER_COPY_BUFFER_TO_BUFFER: &str = "gpu_encoder_copy_buffer_to_buffer";
    pub const GPU_ENCODER_BEGIN_COMPUTE_PASS: &str = "gpu_encoder_begin_compute_pass";
    pub const GPU_ENCODER_BEGIN_RENDER_PASS: &str = "gpu_encoder_begin_render_pass";
    pub const GPU_ENCODER_FINISH: &str = "gpu_encoder_finish";

    // Compute pass
    pub const GPU_COMPUTE_SET_PIPELINE: &str = "gpu_compute_set_pipeline";
    pub const GPU_COMPUTE_SET_BIND_GROUP: &str = "gpu_compute_set_bind_group";
    pub const GPU_COMPUTE_DISPATCH: &str = "gpu_compute_dispatch";
    pub const GPU_COMPUTE_DISPATCH_INDIRECT: &str = "gpu_compute_dispatch_indirect";
    pub const GPU_COMPUTE_WRITE_TIMESTAMP: &str = "gpu_compute_write_timestamp";
    pub const GPU_COMPUTE_END: &str = "gpu_compute_end";

    // Render pass
    pub const GPU_RENDER_SET_PIPELINE: &str = "gpu_render_set_pipeline";
    pub const GPU_RENDER_SET_BIND_GROUP: &str = "gpu_render_set_bind_group";
    pub const GPU_RENDER_SET_VERTEX_BUFFER: &str = "gpu_render_set_vertex_buffer";
    pub const GPU_RENDER_SET_INDEX_BUFFER: &str = "gpu_render_set_index_buffer";
    pub const GPU_RENDER_DRAW: &str = "gpu_render_draw";
    pub const GPU_RENDER_DRAW_INDEXED: &str = "gpu_render_draw_indexed";
    pub const GPU_RENDER_DRAW_INDIRECT: &str = "gpu_render_draw_indirect";
    pub const GPU_RENDER_DRAW_INDEXED_INDIRECT: &str = "gpu_render_draw_indexed_indirect";
    pub const GPU_RENDER_WRITE_TIMESTAMP: &str = "gpu_render_write_timestamp";
    pub const GPU_RENDER_END: &str = "gpu_render_end";

    // Queue / surface
    pub const GPU_QUEUE_WRITE_BUFFER: &str = "gpu_queue_write_buffer";
    pub const GPU_QUEUE_SUBMIT: &str = "gpu_queue_submit";
    pub const GPU_QUEUE_ON_SUBMITTED_WORK_DONE: &str = "gpu_queue_on_submitted_work_done";
    pub const GPU_CONFIGURE_SURFACE: &str = "gpu_configure_surface";
    pub const GPU_SURFACE_CURRENT_TEXTURE_VIEW: &str = "gpu_surface_current_texture_view";

    // Audio
    pub const AUDIO_CREATE_CONTEXT: &str = "audio_create_context";
    pub const AUDIO_DECODE: &str = "audio_decode";
    pub const AUDIO_PLAY: &str = "audio_play";
    pub const AUDIO_PLAY_TAGGED: &str = "audio_play_tagged";
    pub const AUDIO_STOP_TAGGED: &str = "audio_stop_tagged";
}

/// Optional feature areas a guest can ask for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Feature {
    Gpu,
    Audio,
    Input,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Gpu, Feature::Audio, Feature::Input];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Gpu => "gpu",
            Feature::Audio => "audio",
            Feature::Input => "input",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The enabled feature areas.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FeatureSet {
    pub gpu: bool,
    pub audio: bool,
    pub input: bool,
}

impl FeatureSet {
    pub fn all() -> Self {
        Self {
            gpu: true,
            audio: true,
            input: true,
        }
    }

    /// Parse a comma-separated list. Unknown names are warned about and skipped.
    pub fn parse(list: &str) -> Self {
        let mut set = Self::default();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match Feature::from_name(name) {
                Some(feature) => set.insert(feature),
                None => log::warn!("guest requested unknown feature `{name}`"),
            }
        }
        set
    }

    pub fn insert(&mut self, feature: Feature) {
        match feature {
            Feature::Gpu => self.gpu = true,
            Feature::Audio => self.audio = true,
            Feature::Input => self.input = true,
        }
    }

    pub fn contains(&self, feature: Feature) -> bool {
        match feature {
            Feature::Gpu => self.gpu,
            Feature::Audio => self.audio,
            Feature::Input => self.input,
        }
    }

    /// Features present in both sets.
    pub fn intersect(self, other: FeatureSet) -> Self {
        Self {
            gpu: self.gpu && other.gpu,
            audio: self.audio && other.audio,
            input: self.input && other.input,
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Feature::ALL
            .into_iter()
            .filter(|feat| self.contains(*feat))
            .map(Feature::name)
            .collect();
        f.write_str(&names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_lists_parse_leniently() {
        let set = FeatureSet::parse(" gpu, input ,,webnn");
        assert_eq!(
            set,
            FeatureSet {
                gpu: true,
                audio: false,
                input: true
            }
        );
        assert_eq!(set.to_string(), "gpu,input");
        assert_eq!(FeatureSet::parse(""), FeatureSet::default());
    }

    #[test]
    fn intersection_applies_whitelist() {
        let requested = FeatureSet::all();
        let allowed = FeatureSet::parse("audio");
        assert_eq!(requested.intersect(allowed).to_string(), "audio");
    }
}
