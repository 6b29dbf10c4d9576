//! Wasmtime-backed runtime glue.
//!
//! Responsibilities:
//! - Create a Wasmtime `Engine`/`Store` with feature flags enabled.
//! - Define host imports under module `"env"` for the configured guest pointer width.
//! - Instantiate a compiled `wasmtime::Module` and negotiate features.
//! - Drive the lifecycle: `start`, per-frame `update_frame`, completion dispatch and input.
//!
//! Completions are dispatched between guest calls, never from inside an import, so a callback
//! can't interleave with a descriptor that is still being decoded.

use super::guest;
use crate::abi::{FeatureSet, guest_exports};
use crate::audio::AudioBackend;
use crate::bridge::{Arg, GuestCall};
use crate::gpu::GpuBackend;
use crate::input::InputEvent;
use crate::layout::{GuestMemory, PointerWidth};
use crate::state::HostState;

use anyhow::{Context, Result, anyhow};
use wasmtime::{Extern, Func, Instance, Linker, Module, Store};

/// Upper bound on dispatch rounds per pump. Callbacks that keep issuing operations which settle
/// immediately are picked up by the next pump instead of starving the frame.
const MAX_DISPATCH_ROUNDS: usize = 64;

/// Host-side runtime container.
pub struct WasmtimeRuntime<G: GpuBackend, A: AudioBackend> {
    pub engine: wasmtime::Engine,
    pub store: Store<HostState<G, A>>,
    pub linker: Linker<HostState<G, A>>,
    instance: Option<Instance>,
}

impl<G: GpuBackend, A: AudioBackend> WasmtimeRuntime<G, A> {
    /// Create a new Wasmtime runtime around `state`.
    ///
    /// 64-bit guests need the memory64 proposal; the rest is what common toolchains emit.
    pub fn new(state: HostState<G, A>) -> Result<Self> {
        let mut cfg = wasmtime::Config::new();

        cfg.wasm_multi_value(true);
        cfg.wasm_bulk_memory(true);
        cfg.wasm_reference_types(true);
        cfg.wasm_simd(true);
        cfg.wasm_multi_memory(true);
        cfg.wasm_memory64(true);
        cfg.wasm_tail_call(true);

        let engine = wasmtime::Engine::new(&cfg)?;
        let store = Store::new(&engine, state);
        let linker = Linker::new(&engine);

        Ok(Self {
            engine,
            store,
            linker,
            instance: None,
        })
    }

    /// Define all host imports expected by guests under module `"env"`.
    ///
    /// Must be called before `instantiate`.
    pub fn define_imports(&mut self) -> Result<()> {
        match self.store.data().pointer_width() {
            PointerWidth::W32 => super::imports::define_imports::<G, A, u32>(&mut self.linker),
            PointerWidth::W64 => super::imports::define_imports::<G, A, u64>(&mut self.linker),
        }
    }

    /// Instantiate `module` and negotiate features. Does not call `start`.
    pub fn instantiate(&mut self, module: &Module) -> Result<FeatureSet> {
        let instance = self
            .linker
            .instantiate(&mut self.store, module)
            .context("instantiating guest module")?;
        if instance
            .get_export(&mut self.store, guest_exports::MEMORY)
            .and_then(Extern::into_memory)
            .is_none()
        {
            anyhow::bail!("guest does not export `{}`", guest_exports::MEMORY);
        }
        self.instance = Some(instance);

        let requested = self.requested_features()?;
        let features = match requested {
            Some(requested) => requested.intersect(self.store.data().features),
            None => self.store.data().features,
        };
        log::info!("enabled features: [{features}]");
        self.store.data_mut().features = features;
        Ok(features)
    }

    /// The instantiated guest.
    pub fn instance(&self) -> Result<Instance> {
        self.instance.ok_or_else(|| anyhow!("guest is not instantiated"))
    }

    /// The feature list the guest exports, if it exports one.
    fn requested_features(&mut self) -> Result<Option<FeatureSet>> {
        let instance = self.instance()?;
        let (Some(ptr_fn), Some(len_fn)) = (
            instance.get_func(&mut self.store, guest_exports::FEATURES_PTR),
            instance.get_func(&mut self.store, guest_exports::FEATURES_LEN),
        ) else {
            return Ok(None);
        };

        let scalar = |store: &mut Store<HostState<G, A>>, func: Func, name: &str| -> Result<u64> {
            let results = guest::call_func(store, &func, &[])?;
            results
                .first()
                .and_then(guest::val_as_u64)
                .ok_or_else(|| anyhow!("`{name}` must return one integer"))
        };
        let ptr = scalar(&mut self.store, ptr_fn, guest_exports::FEATURES_PTR)?;
        let len = scalar(&mut self.store, len_fn, guest_exports::FEATURES_LEN)?;

        let memory = instance
            .get_memory(&mut self.store, guest_exports::MEMORY)
            .ok_or_else(|| anyhow!("guest does not export `{}`", guest_exports::MEMORY))?;
        let width = self.store.data().pointer_width();
        let mem = GuestMemory::new(memory.data(&self.store), width);
        let list = mem.read_str(ptr, len).context("reading guest feature list")?;
        Ok(Some(FeatureSet::parse(list)))
    }

    /// Call `start` (or `_start`), then deliver anything it completed.
    pub fn start(&mut self) -> Result<()> {
        let instance = self.instance()?;
        let entry = [guest_exports::START, guest_exports::START_FALLBACK]
            .into_iter()
            .find_map(|name| instance.get_func(&mut self.store, name).map(|f| (name, f)));
        match entry {
            Some((name, func)) => {
                log::debug!("calling `{name}`");
                guest::call_func(&mut self.store, &func, &[])
                    .with_context(|| format!("calling guest export `{name}`"))?;
            }
            None => log::warn!("guest exports neither `start` nor `_start`"),
        }
        self.pump()?;
        Ok(())
    }

    /// Run one frame: deliver completions, call `update_frame`, deliver again.
    pub fn frame(&mut self, delta_ms: f64) -> Result<()> {
        self.pump()?;
        let instance = self.instance()?;
        match instance.get_func(&mut self.store, guest_exports::UPDATE_FRAME) {
            Some(func) => {
                guest::call_func(&mut self.store, &func, &[Arg::F64(delta_ms)])
                    .with_context(|| format!("calling guest export `{}`", guest_exports::UPDATE_FRAME))?;
            }
            None => log::trace!("guest has no `{}`", guest_exports::UPDATE_FRAME),
        }
        self.pump()?;
        Ok(())
    }

    /// Deliver settled asynchronous operations to the guest. Returns how many were delivered.
    ///
    /// Every drained call is dispatched even if an earlier one traps; the first failure is
    /// returned once the round is delivered.
    pub fn pump(&mut self) -> Result<usize> {
        let mut delivered = 0;
        for _ in 0..MAX_DISPATCH_ROUNDS {
            let calls = self.store.data_mut().pump();
            if calls.is_empty() {
                break;
            }
            let mut first_error = None;
            for call in &calls {
                if let Err(e) = self.call(call) {
                    log::warn!("guest callback `{}` failed: {e:#}", call.export);
                    first_error.get_or_insert(e);
                }
            }
            delivered += calls.len();
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(delivered)
    }

    /// Forward a host input event. Dropped when the `input` feature is off.
    pub fn input(&mut self, event: &InputEvent) -> Result<bool> {
        if !self.store.data().features.input {
            log::trace!("input disabled; dropping {event:?}");
            return Ok(false);
        }
        let instance = self.instance()?;
        let module = instance.module(&self.store).clone();
        let has_export = |name: &str| module.get_export(name).is_some();
        let Some(call) = self.store.data_mut().input.forward(event, has_export) else {
            return Ok(false);
        };
        self.call(&call)
    }

    /// Call a guest export; `Ok(false)` if the guest does not define it.
    pub fn call(&mut self, call: &GuestCall) -> Result<bool> {
        let instance = self.instance()?;
        guest::dispatch(&mut self.store, &instance, call)
    }

    pub fn state(&self) -> &HostState<G, A> {
        self.store.data()
    }

    pub fn state_mut(&mut self) -> &mut HostState<G, A> {
        self.store.data_mut()
    }
}
