//! Host import definitions for the Wasmtime runtime.
//!
//! Every function imported by guests under module `"env"` is registered here, from the static
//! name table in [`host_imports`]. Pointer and length parameters use `P` (`u32` for 32-bit guests,
//! `u64` for 64-bit guests); everything else has a fixed width.
//!
//! Guest memory is looked up through the caller on every call and never kept.

use crate::abi::{ABI_VERSION, Feature, IMPORT_MODULE, guest_exports, host_imports};
use crate::audio::{AudioBackend, AudioState};
use crate::error::BridgeResult;
use crate::gpu::{GpuBackend, GpuState};
use crate::layout::GuestMemory;
use crate::registry::Handle;
use crate::state::HostState;

use wasmtime::{Caller, Extern, Linker, WasmTy};

type Ctx<'a, G, A> = Caller<'a, HostState<G, A>>;

/// Run `f` with the guest's linear memory and the boundary context.
///
/// A guest without a `memory` export gets an empty view, so every read fails its bounds check.
fn with_memory<G, A, R>(
    caller: &mut Ctx<'_, G, A>,
    f: impl FnOnce(&mut [u8], &mut HostState<G, A>) -> R,
) -> R
where
    G: GpuBackend,
    A: AudioBackend,
{
    match caller
        .get_export(guest_exports::MEMORY)
        .and_then(Extern::into_memory)
    {
        Some(memory) => {
            let (bytes, state) = memory.data_and_store_mut(&mut *caller);
            f(bytes, state)
        }
        None => {
            log::warn!("guest has no `memory` export");
            f(&mut [], caller.data_mut())
        }
    }
}

fn with_guest<G, A, R>(
    caller: &mut Ctx<'_, G, A>,
    f: impl FnOnce(GuestMemory<'_>, &mut HostState<G, A>) -> R,
) -> R
where
    G: GpuBackend,
    A: AudioBackend,
{
    with_memory(caller, |bytes, state| {
        let mem = GuestMemory::new(bytes, state.pointer_width());
        f(mem, state)
    })
}

fn gpu_handle<G: GpuBackend, A: AudioBackend>(
    caller: &mut Ctx<'_, G, A>,
    op: &'static str,
    f: impl FnOnce(GuestMemory<'_>, &mut GpuState<G>) -> BridgeResult<Handle>,
) -> u32 {
    with_guest(caller, |mem, state| {
        let result = state
            .require(Feature::Gpu)
            .and_then(|()| f(mem, &mut state.gpu));
        state.produce(op, result)
    })
}

fn gpu_void<G: GpuBackend, A: AudioBackend>(
    caller: &mut Ctx<'_, G, A>,
    op: &'static str,
    f: impl FnOnce(GuestMemory<'_>, &mut GpuState<G>) -> BridgeResult<()>,
) {
    with_guest(caller, |mem, state| {
        let result = state
            .require(Feature::Gpu)
            .and_then(|()| f(mem, &mut state.gpu));
        state.complete(op, result);
    })
}

fn audio_void<G: GpuBackend, A: AudioBackend>(
    caller: &mut Ctx<'_, G, A>,
    op: &'static str,
    f: impl FnOnce(&mut AudioState<A>) -> BridgeResult<()>,
) {
    let state = caller.data_mut();
    let result = state
        .require(Feature::Audio)
        .and_then(|()| f(&mut state.audio));
    state.complete(op, result);
}

/// Define all host imports expected by guests under module `"env"`.
///
/// Must be called before instantiating the module.
pub fn define_imports<G, A, P>(linker: &mut Linker<HostState<G, A>>) -> anyhow::Result<()>
where
    G: GpuBackend,
    A: AudioBackend,
    P: WasmTy + Into<u64> + Copy + 'static,
{
    // --- ABI / diagnostics ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ABI_VERSION,
        |_caller: Ctx<'_, G, A>| -> u32 { ABI_VERSION },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::LOG,
        |mut caller: Ctx<'_, G, A>, ptr: P, len: P| {
            with_guest(&mut caller, |mem, _state| match mem.bytes(ptr.into(), len.into()) {
                Ok(bytes) => log::info!(target: "guest", "{}", String::from_utf8_lossy(bytes)),
                Err(err) => log::warn!("bridge_log: {err}"),
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ERROR_PENDING,
        |caller: Ctx<'_, G, A>| -> u32 { caller.data().errors.has_error() as u32 },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ERROR_LEN,
        |caller: Ctx<'_, G, A>| -> u32 {
            u32::try_from(caller.data().errors.len()).unwrap_or(u32::MAX)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ERROR_COPY,
        |mut caller: Ctx<'_, G, A>, ptr: P, len: P| -> u32 {
            let (ptr, len): (u64, u64) = (ptr.into(), len.into());
            with_memory(&mut caller, |bytes, state| {
                let want = len.min(state.errors.len() as u64);
                let range = usize::try_from(ptr)
                    .ok()
                    .zip(usize::try_from(want).ok())
                    .and_then(|(start, n)| Some(start..start.checked_add(n)?));
                let dest = match range {
                    Some(range) => bytes.get_mut(range),
                    None => None,
                };
                match dest {
                    Some(dest) => state.errors.copy_into(dest) as u32,
                    None => {
                        log::warn!(
                            "bridge_error_copy: {want} bytes at {ptr} exceed guest memory"
                        );
                        0
                    }
                }
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::RELEASE,
        |mut caller: Ctx<'_, G, A>, kind: u32, handle: u32| {
            caller.data_mut().release(kind, handle);
        },
    )?;

    // --- Adapter / device ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_REQUEST_ADAPTER,
        |mut caller: Ctx<'_, G, A>, options: P| {
            with_guest(&mut caller, |mem, state| {
                let result = state.require(Feature::Gpu).and_then(|()| {
                    state
                        .gpu
                        .request_adapter(mem, options.into(), &mut state.completions)
                });
                state.complete("request adapter", result);
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_ADAPTER_REQUEST_DEVICE,
        |mut caller: Ctx<'_, G, A>, adapter: u32| {
            let state = caller.data_mut();
            let result = state
                .require(Feature::Gpu)
                .and_then(|()| state.gpu.request_device(adapter, &mut state.completions));
            state.complete("request device", result);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_DEVICE_GET_QUEUE,
        |mut caller: Ctx<'_, G, A>, device: u32| -> u32 {
            gpu_handle(&mut caller, "device get queue", |_, gpu| {
                gpu.device_get_queue(device)
            })
        },
    )?;

    // --- Resource creation ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_BUFFER,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create buffer", |mem, gpu| {
                gpu.create_buffer(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_SHADER_MODULE,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create shader module", |mem, gpu| {
                gpu.create_shader_module(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_TEXTURE,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create texture", |mem, gpu| {
                gpu.create_texture(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_TEXTURE_CREATE_VIEW,
        |mut caller: Ctx<'_, G, A>, texture: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create texture view", |mem, gpu| {
                gpu.create_texture_view(mem, texture, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_SAMPLER,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create sampler", |mem, gpu| {
                gpu.create_sampler(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_BIND_GROUP_LAYOUT,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create bind group layout", |mem, gpu| {
                gpu.create_bind_group_layout(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_BIND_GROUP,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create bind group", |mem, gpu| {
                gpu.create_bind_group(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_PIPELINE_LAYOUT,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create pipeline layout", |mem, gpu| {
                gpu.create_pipeline_layout(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_COMPUTE_PIPELINE,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create compute pipeline", |mem, gpu| {
                gpu.create_compute_pipeline(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_RENDER_PIPELINE,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create render pipeline", |mem, gpu| {
                gpu.create_render_pipeline(mem, device, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_QUERY_SET,
        |mut caller: Ctx<'_, G, A>, device: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "create query set", |mem, gpu| {
                gpu.create_query_set(mem, device, desc.into())
            })
        },
    )?;

    // --- Command encoding ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CREATE_COMMAND_ENCODER,
        |mut caller: Ctx<'_, G, A>, device: u32, label: P| -> u32 {
            gpu_handle(&mut caller, "create command encoder", |mem, gpu| {
                gpu.create_command_encoder(mem, device, label.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_ENCODER_COPY_BUFFER_TO_BUFFER,
        |mut caller: Ctx<'_, G, A>,
         encoder: u32,
         source: u32,
         source_offset: u64,
         destination: u32,
         destination_offset: u64,
         size: u64| {
            gpu_void(&mut caller, "copy buffer to buffer", |_, gpu| {
                gpu.copy_buffer_to_buffer(
                    encoder,
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                )
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_ENCODER_BEGIN_COMPUTE_PASS,
        |mut caller: Ctx<'_, G, A>, encoder: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "begin compute pass", |mem, gpu| {
                gpu.begin_compute_pass(mem, encoder, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_ENCODER_BEGIN_RENDER_PASS,
        |mut caller: Ctx<'_, G, A>, encoder: u32, desc: P| -> u32 {
            gpu_handle(&mut caller, "begin render pass", |mem, gpu| {
                gpu.begin_render_pass(mem, encoder, desc.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_ENCODER_FINISH,
        |mut caller: Ctx<'_, G, A>, encoder: u32, label: P| -> u32 {
            gpu_handle(&mut caller, "finish command encoder", |mem, gpu| {
                gpu.finish_encoder(mem, encoder, label.into())
            })
        },
    )?;

    // --- Compute pass ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_COMPUTE_SET_PIPELINE,
        |mut caller: Ctx<'_, G, A>, pass: u32, pipeline: u32| {
            gpu_void(&mut caller, "set compute pipeline", |_, gpu| {
                gpu.compute_set_pipeline(pass, pipeline)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_COMPUTE_SET_BIND_GROUP,
        |mut caller: Ctx<'_, G, A>, pass: u32, index: u32, group: u32, offsets: P, count: P| {
            gpu_void(&mut caller, "set compute bind group", |mem, gpu| {
                gpu.compute_set_bind_group(mem, pass, index, group, offsets.into(), count.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_COMPUTE_DISPATCH,
        |mut caller: Ctx<'_, G, A>, pass: u32, x: u32, y: u32, z: u32| {
            gpu_void(&mut caller, "dispatch workgroups", |_, gpu| {
                gpu.compute_dispatch(pass, x, y, z)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_COMPUTE_DISPATCH_INDIRECT,
        |mut caller: Ctx<'_, G, A>, pass: u32, buffer: u32, offset: u64| {
            gpu_void(&mut caller, "dispatch workgroups indirect", |_, gpu| {
                gpu.compute_dispatch_indirect(pass, buffer, offset)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_COMPUTE_WRITE_TIMESTAMP,
        |mut caller: Ctx<'_, G, A>, pass: u32, query_set: u32, index: u32| {
            gpu_void(&mut caller, "write compute timestamp", |_, gpu| {
                gpu.compute_write_timestamp(pass, query_set, index)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_COMPUTE_END,
        |mut caller: Ctx<'_, G, A>, pass: u32| {
            gpu_void(&mut caller, "end compute pass", |_, gpu| gpu.compute_end(pass))
        },
    )?;

    // --- Render pass ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_SET_PIPELINE,
        |mut caller: Ctx<'_, G, A>, pass: u32, pipeline: u32| {
            gpu_void(&mut caller, "set render pipeline", |_, gpu| {
                gpu.render_set_pipeline(pass, pipeline)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_SET_BIND_GROUP,
        |mut caller: Ctx<'_, G, A>, pass: u32, index: u32, group: u32, offsets: P, count: P| {
            gpu_void(&mut caller, "set render bind group", |mem, gpu| {
                gpu.render_set_bind_group(mem, pass, index, group, offsets.into(), count.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_SET_VERTEX_BUFFER,
        |mut caller: Ctx<'_, G, A>, pass: u32, slot: u32, buffer: u32, offset: u64, size: u64| {
            gpu_void(&mut caller, "set vertex buffer", |_, gpu| {
                gpu.render_set_vertex_buffer(pass, slot, buffer, offset, size)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_SET_INDEX_BUFFER,
        |mut caller: Ctx<'_, G, A>, pass: u32, buffer: u32, format: u32, offset: u64, size: u64| {
            gpu_void(&mut caller, "set index buffer", |_, gpu| {
                gpu.render_set_index_buffer(pass, buffer, format, offset, size)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_DRAW,
        |mut caller: Ctx<'_, G, A>,
         pass: u32,
         vertex_count: u32,
         instance_count: u32,
         first_vertex: u32,
         first_instance: u32| {
            gpu_void(&mut caller, "draw", |_, gpu| {
                gpu.render_draw(pass, vertex_count, instance_count, first_vertex, first_instance)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_DRAW_INDEXED,
        |mut caller: Ctx<'_, G, A>,
         pass: u32,
         index_count: u32,
         instance_count: u32,
         first_index: u32,
         base_vertex: i32,
         first_instance: u32| {
            gpu_void(&mut caller, "draw indexed", |_, gpu| {
                gpu.render_draw_indexed(
                    pass,
                    index_count,
                    instance_count,
                    first_index,
                    base_vertex,
                    first_instance,
                )
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_DRAW_INDIRECT,
        |mut caller: Ctx<'_, G, A>, pass: u32, buffer: u32, offset: u64| {
            gpu_void(&mut caller, "draw indirect", |_, gpu| {
                gpu.render_draw_indirect(pass, buffer, offset)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_DRAW_INDEXED_INDIRECT,
        |mut caller: Ctx<'_, G, A>, pass: u32, buffer: u32, offset: u64| {
            gpu_void(&mut caller, "draw indexed indirect", |_, gpu| {
                gpu.render_draw_indexed_indirect(pass, buffer, offset)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_WRITE_TIMESTAMP,
        |mut caller: Ctx<'_, G, A>, pass: u32, query_set: u32, index: u32| {
            gpu_void(&mut caller, "write render timestamp", |_, gpu| {
                gpu.render_write_timestamp(pass, query_set, index)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_RENDER_END,
        |mut caller: Ctx<'_, G, A>, pass: u32| {
            gpu_void(&mut caller, "end render pass", |_, gpu| gpu.render_end(pass))
        },
    )?;

    // --- Queue / surface ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_QUEUE_WRITE_BUFFER,
        |mut caller: Ctx<'_, G, A>, queue: u32, buffer: u32, offset: u64, data: P, len: P| {
            gpu_void(&mut caller, "write buffer", |mem, gpu| {
                gpu.queue_write_buffer(mem, queue, buffer, offset, data.into(), len.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_QUEUE_SUBMIT,
        |mut caller: Ctx<'_, G, A>, queue: u32, list: P, count: P| {
            gpu_void(&mut caller, "submit", |mem, gpu| {
                gpu.queue_submit(mem, queue, list.into(), count.into())
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_QUEUE_ON_SUBMITTED_WORK_DONE,
        |mut caller: Ctx<'_, G, A>, queue: u32| {
            let state = caller.data_mut();
            let result = state.require(Feature::Gpu).and_then(|()| {
                state
                    .gpu
                    .queue_on_submitted_work_done(queue, &mut state.completions)
            });
            state.complete("queue on submitted work done", result);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_CONFIGURE_SURFACE,
        |mut caller: Ctx<'_, G, A>, device: u32, format: u32, width: u32, height: u32| {
            gpu_void(&mut caller, "configure surface", |_, gpu| {
                gpu.configure_surface(device, format, width, height)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::GPU_SURFACE_CURRENT_TEXTURE_VIEW,
        |mut caller: Ctx<'_, G, A>| -> u32 {
            gpu_handle(&mut caller, "get current texture view", |_, gpu| {
                gpu.surface_current_texture_view()
            })
        },
    )?;

    // --- Audio ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::AUDIO_CREATE_CONTEXT,
        |mut caller: Ctx<'_, G, A>| -> u32 {
            let state = caller.data_mut();
            let result = state
                .require(Feature::Audio)
                .and_then(|()| state.audio.create_context());
            state.produce("create audio context", result)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::AUDIO_DECODE,
        |mut caller: Ctx<'_, G, A>, ctx: u32, ptr: P, len: P, request_id: u32| {
            with_guest(&mut caller, |mem, state| {
                let result = state.require(Feature::Audio).and_then(|()| {
                    state.audio.decode(
                        mem,
                        ctx,
                        ptr.into(),
                        len.into(),
                        request_id,
                        &mut state.completions,
                    )
                });
                state.complete("decode audio", result);
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::AUDIO_PLAY,
        |mut caller: Ctx<'_, G, A>, ctx: u32, buffer: u32| {
            audio_void(&mut caller, "play audio", |audio| audio.play(ctx, buffer))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::AUDIO_PLAY_TAGGED,
        |mut caller: Ctx<'_, G, A>, ctx: u32, buffer: u32, tag: u32| {
            audio_void(&mut caller, "play tagged audio", |audio| {
                audio.play_tagged(ctx, buffer, tag)
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::AUDIO_STOP_TAGGED,
        |mut caller: Ctx<'_, G, A>, ctx: u32, tag: u32| {
            audio_void(&mut caller, "stop tagged audio", |audio| {
                audio.stop_tagged(ctx, tag)
            })
        },
    )?;

    Ok(())
}
