//! End-to-end runs of small WAT guests against the recording GPU backend and inline audio.

use guestbridge_core::layout::PointerWidth;
use guestbridge_core::{
    BridgeConfig, FeatureSet, HostState, InputEvent, NativeAudio, TraceBackend, WasmtimeRuntime,
    loader,
};

type Runtime = WasmtimeRuntime<TraceBackend, NativeAudio>;

fn runtime(config: BridgeConfig) -> Runtime {
    let _ = env_logger::builder().is_test(true).try_init();
    let state = HostState::new(config, TraceBackend::new(), NativeAudio::inline()).unwrap();
    let mut runtime = WasmtimeRuntime::new(state).unwrap();
    runtime.define_imports().unwrap();
    runtime
}

fn load(runtime: &mut Runtime, wat: &str) -> FeatureSet {
    let module = loader::compile_module(&runtime.engine, wat.as_bytes()).unwrap();
    runtime.instantiate(&module).unwrap()
}

fn global(runtime: &mut Runtime, name: &str) -> i32 {
    let instance = runtime.instance().unwrap();
    instance
        .get_global(&mut runtime.store, name)
        .unwrap_or_else(|| panic!("no global `{name}`"))
        .get(&mut runtime.store)
        .i32()
        .unwrap()
}

fn memory(runtime: &mut Runtime, at: usize, len: usize) -> Vec<u8> {
    let instance = runtime.instance().unwrap();
    let memory = instance.get_memory(&mut runtime.store, "memory").unwrap();
    memory.data(&runtime.store)[at..at + len].to_vec()
}

/// Requests an adapter at start, then a device, then a queue and a labelled buffer. Also
/// provokes one failing import and copies the error message to offset 4096.
const GPU_GUEST: &str = r#"
(module
  (import "env" "bridge_abi_version" (func $abi_version (result i32)))
  (import "env" "bridge_error_pending" (func $err_pending (result i32)))
  (import "env" "bridge_error_len" (func $err_len (result i32)))
  (import "env" "bridge_error_copy" (func $err_copy (param i32 i32) (result i32)))
  (import "env" "gpu_request_adapter" (func $request_adapter (param i32)))
  (import "env" "gpu_adapter_request_device" (func $request_device (param i32)))
  (import "env" "gpu_device_get_queue" (func $get_queue (param i32) (result i32)))
  (import "env" "gpu_create_buffer" (func $create_buffer (param i32 i32) (result i32)))

  (memory (export "memory") 1)
  (data (i32.const 1024) "vertices\00")
  ;; BufferDescriptor { label: 1024, size: 64, usage: 0x28, mapped_at_creation: false }
  (data (i32.const 2048)
    "\00\04\00\00" "\00\00\00\00"
    "\40\00\00\00\00\00\00\00"
    "\28\00\00\00" "\00\00\00\00")

  (global $abi (export "abi") (mut i32) (i32.const 0))
  (global $adapter (export "adapter") (mut i32) (i32.const 0))
  (global $adapter_status (export "adapter_status") (mut i32) (i32.const 0))
  (global $device (export "device") (mut i32) (i32.const 0))
  (global $queue (export "queue") (mut i32) (i32.const 0))
  (global $buffer (export "buffer") (mut i32) (i32.const 0))
  (global $bad (export "bad") (mut i32) (i32.const -1))
  (global $copied (export "copied") (mut i32) (i32.const 0))
  (global $pending (export "pending") (mut i32) (i32.const -1))
  (global $frames (export "frames") (mut i32) (i32.const 0))

  (func (export "start")
    (global.set $abi (call $abi_version))
    (call $request_adapter (i32.const 0)))

  (func (export "bridge_on_adapter_received") (param $handle i32) (param $status i32)
    (global.set $adapter (local.get $handle))
    (global.set $adapter_status (local.get $status))
    (call $request_device (local.get $handle)))

  (func (export "bridge_on_device_received") (param $handle i32) (param $status i32)
    (global.set $device (local.get $handle))
    (global.set $queue (call $get_queue (local.get $handle)))
    (global.set $buffer (call $create_buffer (local.get $handle) (i32.const 2048)))
    (global.set $bad (call $get_queue (i32.const 99)))
    (global.set $copied (call $err_copy (i32.const 4096) (call $err_len)))
    (global.set $pending (call $err_pending)))

  (func (export "update_frame") (param f64)
    (global.set $frames (i32.add (global.get $frames) (i32.const 1)))))
"#;

#[test]
fn adapter_device_and_buffer_roundtrip() {
    let mut rt = runtime(BridgeConfig::default());
    assert_eq!(load(&mut rt, GPU_GUEST), FeatureSet::all());
    rt.start().unwrap();

    assert_eq!(global(&mut rt, "abi"), 2);
    assert_eq!(global(&mut rt, "adapter"), 1);
    assert_eq!(global(&mut rt, "adapter_status"), 1);
    assert_eq!(global(&mut rt, "device"), 1);
    assert_eq!(global(&mut rt, "queue"), 1);
    assert_eq!(global(&mut rt, "buffer"), 1);

    let state = rt.state();
    assert_eq!(
        state.gpu.objects.buffers.get(1).map(|b| b.name.as_str()),
        Some("vertices")
    );
    assert!(
        state
            .gpu
            .backend
            .calls
            .iter()
            .any(|c| c == "create_buffer device=device#2 size=64 usage=0x28 mapped=false"),
        "{:#?}",
        state.gpu.backend.calls
    );
}

#[test]
fn failed_import_leaves_a_copyable_message() {
    let mut rt = runtime(BridgeConfig::default());
    load(&mut rt, GPU_GUEST);
    rt.start().unwrap();

    assert_eq!(global(&mut rt, "bad"), 0);
    let expected = "device get queue: invalid device handle 99 in `device`";
    let copied = global(&mut rt, "copied") as usize;
    assert_eq!(copied, expected.len());
    assert_eq!(memory(&mut rt, 4096, copied), expected.as_bytes());
    // Fully copied messages are cleared.
    assert_eq!(global(&mut rt, "pending"), 0);
    assert!(!rt.state().errors.has_error());
}

#[test]
fn frames_call_update_frame() {
    let mut rt = runtime(BridgeConfig::default());
    load(&mut rt, GPU_GUEST);
    rt.start().unwrap();
    for _ in 0..3 {
        rt.frame(16.0).unwrap();
    }
    assert_eq!(global(&mut rt, "frames"), 3);
}

#[test]
fn wasm64_guest_uses_wide_pointers() {
    let wat = r#"
    (module
      (import "env" "gpu_request_adapter" (func $request_adapter (param i64)))
      (import "env" "gpu_adapter_request_device" (func $request_device (param i32)))
      (import "env" "gpu_create_buffer" (func $create_buffer (param i32 i64) (result i32)))

      (memory (export "memory") i64 1)
      (data (i64.const 1024) "wide\00")
      (data (i64.const 2048)
        "\00\04\00\00\00\00\00\00"
        "\00\00\00\00\01\00\00\00"
        "\80\00\00\00" "\01\00\00\00")

      (global $buffer (export "buffer") (mut i32) (i32.const 0))

      (func (export "start") (call $request_adapter (i64.const 0)))
      (func (export "bridge_on_adapter_received") (param i32 i32)
        (call $request_device (local.get 0)))
      (func (export "bridge_on_device_received") (param i32 i32)
        (global.set $buffer (call $create_buffer (local.get 0) (i64.const 2048)))))
    "#;
    let mut rt = runtime(BridgeConfig {
        pointer_width: PointerWidth::W64,
        ..BridgeConfig::default()
    });
    load(&mut rt, wat);
    rt.start().unwrap();

    assert_eq!(global(&mut rt, "buffer"), 1);
    assert!(
        rt.state()
            .gpu
            .backend
            .calls
            .iter()
            .any(|c| c == "create_buffer device=device#2 size=4294967296 usage=0x80 mapped=true")
    );
}

#[test]
fn pointer_width_mismatch_fails_instantiation() {
    let mut rt = runtime(BridgeConfig {
        pointer_width: PointerWidth::W64,
        ..BridgeConfig::default()
    });
    let module = loader::compile_module(&rt.engine, GPU_GUEST.as_bytes()).unwrap();
    assert!(rt.instantiate(&module).is_err());
}

#[test]
fn guest_without_memory_is_rejected() {
    let mut rt = runtime(BridgeConfig::default());
    let module = loader::compile_module(&rt.engine, br#"(module (func (export "start")))"#).unwrap();
    let err = rt.instantiate(&module).unwrap_err();
    assert!(format!("{err:#}").contains("does not export `memory`"));
}

/// Asks for `gpu,input` only; tries audio anyway and handles key events.
const INPUT_GUEST: &str = r#"
(module
  (import "env" "audio_create_context" (func $audio_ctx (result i32)))
  (import "env" "bridge_error_pending" (func $err_pending (result i32)))

  (memory (export "memory") 1)
  (data (i32.const 512) "gpu,input")

  (global $audio (export "audio") (mut i32) (i32.const -1))
  (global $pending (export "pending") (mut i32) (i32.const 0))
  (global $key (export "key") (mut i32) (i32.const 0))
  (global $down (export "down") (mut i32) (i32.const 0))

  (func (export "features_ptr") (result i32) (i32.const 512))
  (func (export "features_len") (result i32) (i32.const 9))

  (func (export "start")
    (global.set $audio (call $audio_ctx))
    (global.set $pending (call $err_pending)))

  (func (export "bridge_on_key_event") (param $keycode i32) (param $down i32)
    (global.set $key (local.get $keycode))
    (global.set $down (local.get $down))))
"#;

#[test]
fn guest_feature_list_narrows_the_whitelist() {
    let mut rt = runtime(BridgeConfig::default());
    let features = load(&mut rt, INPUT_GUEST);
    assert_eq!(
        features,
        FeatureSet {
            gpu: true,
            audio: false,
            input: true,
        }
    );
    rt.start().unwrap();
    assert_eq!(global(&mut rt, "audio"), 0);
    assert_eq!(global(&mut rt, "pending"), 1);
    assert_eq!(rt.state().audio.objects.contexts.live(), 0);
}

#[test]
fn input_reaches_exported_handlers_only() {
    let mut rt = runtime(BridgeConfig::default());
    load(&mut rt, INPUT_GUEST);
    rt.start().unwrap();

    let key = InputEvent::Key {
        keycode: 65,
        down: true,
    };
    assert!(rt.input(&key).unwrap());
    assert_eq!(global(&mut rt, "key"), 65);
    assert_eq!(global(&mut rt, "down"), 1);

    let moved = InputEvent::MouseMove { x: 10.0, y: 10.0 };
    assert!(!rt.input(&moved).unwrap());
    assert_eq!(rt.state().input.missing(), 1);
}

#[test]
fn host_whitelist_can_disable_input() {
    let mut rt = runtime(BridgeConfig {
        enable_features: Some(vec!["gpu".to_owned()]),
        ..BridgeConfig::default()
    });
    let features = load(&mut rt, INPUT_GUEST);
    assert!(!features.input);
    let key = InputEvent::Key {
        keycode: 65,
        down: true,
    };
    assert!(!rt.input(&key).unwrap());
    assert_eq!(global(&mut rt, "key"), 0);
}

/// Decodes an embedded two-sample mono WAV and loops it under tag 1.
const AUDIO_GUEST: &str = r#"
(module
  (import "env" "audio_create_context" (func $audio_ctx (result i32)))
  (import "env" "audio_decode" (func $decode (param i32 i32 i32 i32)))
  (import "env" "audio_play_tagged" (func $play_tagged (param i32 i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 256)
    "RIFF\28\00\00\00WAVE"
    "fmt \10\00\00\00\01\00\01\00\40\1f\00\00\80\3e\00\00\02\00\10\00"
    "data\04\00\00\00\01\00\ff\ff")

  (global $ctx (export "ctx") (mut i32) (i32.const 0))
  (global $request (export "request") (mut i32) (i32.const 0))
  (global $buffer (export "buffer") (mut i32) (i32.const 0))
  (global $frames (export "frames") (mut i32) (i32.const 0))
  (global $rate (export "rate") (mut i32) (i32.const 0))
  (global $failed (export "failed") (mut i32) (i32.const 0))

  (func (export "start")
    (global.set $ctx (call $audio_ctx))
    (call $decode (global.get $ctx) (i32.const 256) (i32.const 48) (i32.const 7))
    (call $decode (global.get $ctx) (i32.const 1024) (i32.const 16) (i32.const 8)))

  (func (export "bridge_on_audio_decoded")
    (param $request i32) (param $buffer i32) (param $duration f64)
    (param $frames i32) (param $channels i32) (param $rate i32)
    (global.set $request (local.get $request))
    (global.set $buffer (local.get $buffer))
    (global.set $frames (local.get $frames))
    (global.set $rate (local.get $rate))
    (call $play_tagged (global.get $ctx) (local.get $buffer) (i32.const 1)))

  (func (export "bridge_on_audio_decode_error") (param $request i32)
    (global.set $failed (local.get $request))))
"#;

#[test]
fn audio_decodes_and_plays() {
    let mut rt = runtime(BridgeConfig::default());
    load(&mut rt, AUDIO_GUEST);
    rt.start().unwrap();

    assert_eq!(global(&mut rt, "request"), 7);
    assert_eq!(global(&mut rt, "buffer"), 1);
    assert_eq!(global(&mut rt, "frames"), 2);
    assert_eq!(global(&mut rt, "rate"), 8_000);
    // Zeroed memory is not an audio container.
    assert_eq!(global(&mut rt, "failed"), 8);

    let ctx = global(&mut rt, "ctx") as u32;
    let state = rt.state();
    assert_eq!(state.audio.objects.buffers.live(), 1);
    assert_eq!(
        state.audio.objects.contexts.get(ctx).map(|c| c.voices()),
        Some(1)
    );
}

/// Two overlapping adapter requests; the first callback traps after counting itself.
const TRAPPING_CALLBACK_GUEST: &str = r#"
(module
  (import "env" "gpu_request_adapter" (func $request_adapter (param i32)))

  (memory (export "memory") 1)

  (global $seen (export "seen") (mut i32) (i32.const 0))
  (global $last (export "last") (mut i32) (i32.const 0))

  (func (export "start")
    (call $request_adapter (i32.const 0))
    (call $request_adapter (i32.const 0)))

  (func (export "bridge_on_adapter_received") (param $handle i32) (param $status i32)
    (global.set $seen (i32.add (global.get $seen) (i32.const 1)))
    (global.set $last (local.get $handle))
    (if (i32.eq (global.get $seen) (i32.const 1))
      (then unreachable))))
"#;

#[test]
fn trapping_callback_does_not_swallow_the_rest_of_the_round() {
    let mut rt = runtime(BridgeConfig::default());
    load(&mut rt, TRAPPING_CALLBACK_GUEST);
    assert!(rt.start().is_err());

    assert_eq!(global(&mut rt, "seen"), 2);
    assert_eq!(global(&mut rt, "last"), 2);
    assert_eq!(rt.state().gpu.objects.adapters.live(), 2);
    assert_eq!(rt.pump().unwrap(), 0);
}
