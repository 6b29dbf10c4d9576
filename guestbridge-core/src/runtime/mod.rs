//! Wasmtime-backed runtime glue.
//!
//! - `runtime`: engine/store/linker ownership and the guest lifecycle.
//! - `imports`: the `"env"` import table.
//! - `guest`: calling guest exports with host-side arguments.

pub mod guest;
pub mod imports;
pub mod runtime;

pub use runtime::WasmtimeRuntime;
