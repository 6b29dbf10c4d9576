//! Audio host seam.
//!
//! The guest hands over encoded bytes and later receives a buffer handle through
//! `bridge_on_audio_decoded`. Playback is fire-and-forget or tagged (looping, replaceable).
//! What happens to the samples afterwards is up to the [`AudioBackend`].

pub mod native;

use crate::bridge::{Completer, Completion, CompletionQueue};
use crate::error::{BridgeError, BridgeResult};
use crate::gpu::GpuBackend;
use crate::layout::GuestMemory;
use crate::registry::{Handle, Registry, ResourceKind};

use anyhow::Result;

/// Interleaved signed 16-bit PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub channels: u32,
    pub sample_rate: u32,
}

/// The shape reported to the guest alongside a decoded buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AudioInfo {
    pub duration_ms: f64,
    pub frames: u32,
    pub channels: u32,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            ch => self.samples.len() / ch as usize,
        }
    }

    pub fn info(&self) -> AudioInfo {
        let frames = self.frames();
        let duration_ms = if self.sample_rate == 0 {
            0.0
        } else {
            frames as f64 * 1000.0 / f64::from(self.sample_rate)
        };
        AudioInfo {
            duration_ms,
            frames: u32::try_from(frames).unwrap_or(u32::MAX),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}

/// The host's audio implementation.
///
/// `decode` returns immediately; the result arrives through the [`Completer`], possibly from
/// another thread.
pub trait AudioBackend: 'static {
    type Context: 'static;

    fn create_context(&mut self) -> Result<Self::Context>;
    fn decode(&mut self, ctx: &mut Self::Context, bytes: Vec<u8>, done: Completer<DecodedAudio>);
    fn play(&mut self, ctx: &mut Self::Context, buffer: &DecodedAudio) -> Result<()>;
    /// Start looping `buffer` under `tag`, replacing whatever played under that tag before.
    fn play_tagged(&mut self, ctx: &mut Self::Context, buffer: &DecodedAudio, tag: u32)
    -> Result<()>;
    fn stop_tagged(&mut self, ctx: &mut Self::Context, tag: u32) -> Result<()>;
}

pub struct AudioObjects<A: AudioBackend> {
    pub contexts: Registry<A::Context>,
    pub buffers: Registry<DecodedAudio>,
}

impl<A: AudioBackend> Default for AudioObjects<A> {
    fn default() -> Self {
        Self {
            contexts: Registry::new(ResourceKind::AudioContext),
            buffers: Registry::new(ResourceKind::AudioBuffer),
        }
    }
}

pub struct AudioState<A: AudioBackend> {
    pub backend: A,
    pub objects: AudioObjects<A>,
}

fn host<T>(op: &'static str, result: Result<T>) -> BridgeResult<T> {
    result.map_err(|e| BridgeError::host(op, format!("{e:#}")))
}

impl<A: AudioBackend> AudioState<A> {
    pub fn new(backend: A) -> Self {
        Self {
            backend,
            objects: AudioObjects::default(),
        }
    }

    pub fn create_context(&mut self) -> BridgeResult<Handle> {
        let ctx = host("create audio context", self.backend.create_context())?;
        self.objects.contexts.insert(ctx)
    }

    /// Copy `len` bytes at `ptr` out of guest memory and start decoding them.
    ///
    /// Exactly one of `bridge_on_audio_decoded` / `bridge_on_audio_decode_error` follows for
    /// `request_id`, even when the arguments are rejected here.
    pub fn decode<G: GpuBackend>(
        &mut self,
        mem: GuestMemory<'_>,
        ctx: u32,
        ptr: u64,
        len: u64,
        request_id: u32,
        completions: &mut CompletionQueue<G>,
    ) -> BridgeResult<()> {
        let done = completions.completer(move |op, result| Completion::AudioDecoded {
            op,
            request_id,
            result,
        });
        let started = self
            .objects
            .contexts
            .resolve_mut(ctx, "context")
            .and_then(|ctx| Ok((ctx, mem.bytes(ptr, len)?.to_vec())));
        match started {
            Ok((ctx, bytes)) => {
                self.backend.decode(ctx, bytes, done);
                Ok(())
            }
            Err(err) => {
                done.reject(err.to_string());
                Err(err)
            }
        }
    }

    pub fn play(&mut self, ctx: u32, buffer: u32) -> BridgeResult<()> {
        let ctx = self.objects.contexts.resolve_mut(ctx, "context")?;
        let buffer = self.objects.buffers.resolve(buffer, "buffer")?;
        host("play audio", self.backend.play(ctx, buffer))
    }

    pub fn play_tagged(&mut self, ctx: u32, buffer: u32, tag: u32) -> BridgeResult<()> {
        let ctx = self.objects.contexts.resolve_mut(ctx, "context")?;
        let buffer = self.objects.buffers.resolve(buffer, "buffer")?;
        host("play tagged audio", self.backend.play_tagged(ctx, buffer, tag))
    }

    pub fn stop_tagged(&mut self, ctx: u32, tag: u32) -> BridgeResult<()> {
        let ctx = self.objects.contexts.resolve_mut(ctx, "context")?;
        host("stop tagged audio", self.backend.stop_tagged(ctx, tag))
    }

    /// Returns false for kinds this area does not own.
    pub fn release(&mut self, kind: ResourceKind, raw: u32) -> bool {
        match kind {
            ResourceKind::AudioContext => {
                self.objects.contexts.release(raw);
            }
            ResourceKind::AudioBuffer => {
                self.objects.buffers.release(raw);
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::native::{NativeAudio, testing::wav_bytes};
    use super::*;
    use crate::bridge::{Arg, GuestCall};
    use crate::abi::guest_exports;
    use crate::gpu::GpuObjects;
    use crate::gpu::trace::TraceBackend;
    use crate::layout::PointerWidth;
    use crate::layout::testing::Scratch;

    struct Fixture {
        audio: AudioState<NativeAudio>,
        completions: CompletionQueue<TraceBackend>,
        scratch: Scratch,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                audio: AudioState::new(NativeAudio::inline()),
                completions: CompletionQueue::new(),
                scratch: Scratch::new(PointerWidth::W32),
            }
        }

        fn pump(&mut self) -> Vec<GuestCall> {
            let mut gpu = GpuObjects::<TraceBackend>::default();
            self.completions
                .drain()
                .into_iter()
                .map(|c| c.settle(&mut gpu, &mut self.audio.objects.buffers))
                .collect()
        }

        fn decode(&mut self, ctx: u32, bytes: &[u8], request_id: u32) -> BridgeResult<()> {
            let ptr = self.scratch.data(bytes);
            self.audio.decode(
                self.scratch.memory(),
                ctx,
                ptr,
                bytes.len() as u64,
                request_id,
                &mut self.completions,
            )
        }
    }

    #[test]
    fn duration_follows_frames_and_rate() {
        let audio = DecodedAudio {
            samples: vec![0; 22_050],
            channels: 1,
            sample_rate: 44_100,
        };
        assert_eq!(audio.frames(), 22_050);
        assert_eq!(audio.info().duration_ms, 500.0);
    }

    #[test]
    fn decoded_wav_is_registered_and_reported() {
        let mut f = Fixture::new();
        let ctx = f.audio.create_context().unwrap().get();
        let wav = wav_bytes(2, 8_000, &[1, -1, 2, -2, 3, -3, 4, -4]);
        f.decode(ctx, &wav, 7).unwrap();

        let calls = f.pump();
        assert_eq!(
            calls,
            vec![GuestCall::new(
                guest_exports::ON_AUDIO_DECODED,
                vec![
                    Arg::U32(7),
                    Arg::U32(1),
                    Arg::F64(0.5),
                    Arg::U32(4),
                    Arg::U32(2),
                    Arg::U32(8_000),
                ]
            )]
        );
        assert_eq!(
            f.audio.objects.buffers.get(1).map(|b| b.samples.len()),
            Some(8)
        );
    }

    #[test]
    fn bad_context_still_reports_decode_error() {
        let mut f = Fixture::new();
        let err = f.decode(3, b"RIFF", 11).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidHandle {
                kind: ResourceKind::AudioContext,
                handle: 3,
                ..
            }
        ));

        let calls = f.pump();
        assert_eq!(
            calls,
            vec![GuestCall::new(
                guest_exports::ON_AUDIO_DECODE_ERROR,
                vec![Arg::U32(11)]
            )]
        );
    }

    #[test]
    fn unrecognized_bytes_fail_to_decode() {
        let mut f = Fixture::new();
        let ctx = f.audio.create_context().unwrap().get();
        f.decode(ctx, b"definitely not audio", 2).unwrap();
        let calls = f.pump();
        assert_eq!(calls[0].export, guest_exports::ON_AUDIO_DECODE_ERROR);
        assert_eq!(f.audio.objects.buffers.live(), 0);
    }

    #[test]
    fn playback_needs_live_handles() {
        let mut f = Fixture::new();
        let ctx = f.audio.create_context().unwrap().get();
        assert!(matches!(
            f.audio.play(ctx, 1),
            Err(BridgeError::InvalidHandle {
                kind: ResourceKind::AudioBuffer,
                ..
            })
        ));

        let buffer = f
            .audio
            .objects
            .buffers
            .insert(DecodedAudio {
                samples: vec![100, 100],
                channels: 2,
                sample_rate: 8_000,
            })
            .unwrap()
            .get();
        f.audio.play_tagged(ctx, buffer, 4).unwrap();
        assert!(f.audio.release(ResourceKind::AudioContext, ctx));
        assert!(f.audio.stop_tagged(ctx, 4).is_err());
        assert!(!f.audio.release(ResourceKind::Buffer, buffer));
    }
}
