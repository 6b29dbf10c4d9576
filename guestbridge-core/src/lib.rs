//! guestbridge-core: hosts a guest WASM/WAT module and bridges its `"env"` imports to GPU,
//! audio and input backends on the host.
//!
//! The guest describes work with flat records in its own linear memory and refers to host
//! objects through small integer handles. Results of asynchronous operations come back as calls
//! to guest exports, dispatched between frames.
//!
//! Required guest export:
//! - `memory`
//!
//! Optional guest exports:
//! - `start` (or `_start`)
//! - `update_frame(delta_ms: f64)`
//! - `features_ptr()` / `features_len()`
//! - the `bridge_on_*` completion and input callbacks
//!
//! The ABI surface is defined in [`abi`].

pub mod abi;
pub mod audio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod layout;
pub mod loader;
pub mod registry;
pub mod runtime;
pub mod state;

pub use abi::{ABI_VERSION, Feature, FeatureSet};
pub use audio::native::NativeAudio;
pub use audio::{AudioBackend, DecodedAudio};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use gpu::GpuBackend;
pub use gpu::trace::TraceBackend;
pub use input::InputEvent;
pub use layout::PointerWidth;
pub use runtime::WasmtimeRuntime;
pub use state::HostState;
