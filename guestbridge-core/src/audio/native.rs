//! Software audio backend.
//!
//! Decodes RIFF/WAVE through `hound` and QOA through `qoaudio`, keeps a voice list per
//! context and mixes it down to interleaved stereo i16 on request. Voices play at their source
//! rate; there is no resampling.

use super::{AudioBackend, AudioState, DecodedAudio};
use crate::bridge::Completer;

use anyhow::{Context as _, Result, anyhow, bail};
use std::io::Cursor;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AudioFormat {
    Wav,
    Qoa,
}

/// Identify the container by its magic bytes.
pub fn sniff(bytes: &[u8]) -> Option<AudioFormat> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        Some(AudioFormat::Wav)
    } else if bytes.starts_with(b"qoaf") {
        Some(AudioFormat::Qoa)
    } else {
        None
    }
}

pub fn decode(bytes: Vec<u8>) -> Result<DecodedAudio> {
    match sniff(&bytes) {
        Some(AudioFormat::Wav) => decode_wav(bytes),
        Some(AudioFormat::Qoa) => decode_qoa(bytes),
        None => bail!("unrecognized audio container"),
    }
}

fn decode_wav(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).context("invalid WAV header")?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 0..=16) => reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .context("invalid WAV samples")?,
        (hound::SampleFormat::Int, bits) => {
            let shift = bits - 16;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<Result<_, _>>()
                .context("invalid WAV samples")?
        }
        (hound::SampleFormat::Float, _) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<Result<_, _>>()
            .context("invalid WAV samples")?,
    };

    Ok(DecodedAudio {
        samples,
        channels: u32::from(spec.channels),
        sample_rate: spec.sample_rate,
    })
}

fn decode_qoa(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let decoder =
        qoaudio::QoaDecoder::new(&bytes).map_err(|_| anyhow!("invalid QOA stream"))?;

    let channels = decoder.channels() as u32;
    let sample_rate = decoder.sample_rate() as u32;
    let samples: Vec<i16> = decoder
        .decoded_samples()
        .ok_or_else(|| anyhow!("QOA stream has no samples"))?
        .into_iter()
        .collect();

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}

#[inline]
pub fn sat_add_i16(a: i16, b: i16) -> i16 {
    let sum = a as i32 + b as i32;
    sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

struct Voice {
    pcm: Arc<[i16]>,
    channels: usize,
    position_frames: usize,
    loop_enabled: bool,
    tag: Option<u32>,
}

impl Voice {
    fn new(buffer: &DecodedAudio, loop_enabled: bool, tag: Option<u32>) -> Self {
        Self {
            pcm: buffer.samples.as_slice().into(),
            channels: buffer.channels as usize,
            position_frames: 0,
            loop_enabled,
            tag,
        }
    }

    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.pcm.len() / self.channels
        }
    }

    fn frame(&self, index: usize) -> (i16, i16) {
        let base = index * self.channels;
        if self.channels == 1 {
            let s = self.pcm[base];
            (s, s)
        } else {
            (self.pcm[base], self.pcm[base + 1])
        }
    }

    /// Mix into `out`; returns false once a one-shot voice has run out.
    fn mix_into(&mut self, out: &mut [i16]) -> bool {
        let frames = self.frames();
        if frames == 0 {
            return false;
        }
        for dst in out.chunks_exact_mut(2) {
            if self.position_frames >= frames {
                if self.loop_enabled {
                    self.position_frames = 0;
                } else {
                    return false;
                }
            }
            let (l, r) = self.frame(self.position_frames);
            dst[0] = sat_add_i16(dst[0], l);
            dst[1] = sat_add_i16(dst[1], r);
            self.position_frames += 1;
        }
        self.loop_enabled || self.position_frames < frames
    }
}

/// Voices playing in one audio context.
#[derive(Default)]
pub struct NativeContext {
    voices: Vec<Voice>,
}

impl NativeContext {
    pub fn voices(&self) -> usize {
        self.voices.len()
    }

    /// Add every voice into interleaved stereo `out`, dropping finished one-shots.
    pub fn mix_into(&mut self, out: &mut [i16]) {
        self.voices.retain_mut(|voice| voice.mix_into(out));
    }
}

pub struct NativeAudio {
    threaded: bool,
}

impl NativeAudio {
    /// Decode on a worker thread per request.
    pub fn new() -> Self {
        Self { threaded: true }
    }

    /// Decode on the calling thread. The result still reaches the guest through the
    /// completion queue, on the next dispatch.
    pub fn inline() -> Self {
        Self { threaded: false }
    }
}

impl Default for NativeAudio {
    fn default() -> Self {
        Self::new()
    }
}

fn settle(bytes: Vec<u8>, done: Completer<DecodedAudio>) {
    match decode(bytes) {
        Ok(audio) => done.resolve(audio),
        Err(err) => done.reject(format!("{err:#}")),
    }
}

impl AudioBackend for NativeAudio {
    type Context = NativeContext;

    fn create_context(&mut self) -> Result<NativeContext> {
        Ok(NativeContext::default())
    }

    fn decode(&mut self, _ctx: &mut NativeContext, bytes: Vec<u8>, done: Completer<DecodedAudio>) {
        if !self.threaded {
            settle(bytes, done);
            return;
        }
        let op = done.op();
        // If the thread cannot be spawned the completer is dropped with it and rejects.
        if let Err(err) = std::thread::Builder::new()
            .name(format!("audio-decode-{op}"))
            .spawn(move || settle(bytes, done))
        {
            log::warn!("could not spawn decoder for operation {op}: {err}");
        }
    }

    fn play(&mut self, ctx: &mut NativeContext, buffer: &DecodedAudio) -> Result<()> {
        if !matches!(buffer.channels, 1 | 2) {
            bail!("{} channel playback is not supported", buffer.channels);
        }
        ctx.voices.push(Voice::new(buffer, false, None));
        Ok(())
    }

    fn play_tagged(&mut self, ctx: &mut NativeContext, buffer: &DecodedAudio, tag: u32) -> Result<()> {
        if !matches!(buffer.channels, 1 | 2) {
            bail!("{} channel playback is not supported", buffer.channels);
        }
        ctx.voices.retain(|v| v.tag != Some(tag));
        ctx.voices.push(Voice::new(buffer, true, Some(tag)));
        Ok(())
    }

    fn stop_tagged(&mut self, ctx: &mut NativeContext, tag: u32) -> Result<()> {
        ctx.voices.retain(|v| v.tag != Some(tag));
        Ok(())
    }
}

impl AudioState<NativeAudio> {
    /// Fill interleaved stereo `out` with every context's voices.
    pub fn mix(&mut self, out: &mut [i16]) {
        out.fill(0);
        for (_, ctx) in self.objects.contexts.iter_mut() {
            ctx.mix_into(out);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::wav_bytes;
    use super::*;

    fn buffer(channels: u32, samples: &[i16]) -> DecodedAudio {
        DecodedAudio {
            samples: samples.to_vec(),
            channels,
            sample_rate: 8_000,
        }
    }

    #[test]
    fn sniffs_magic() {
        assert_eq!(sniff(&wav_bytes(1, 8_000, &[0])), Some(AudioFormat::Wav));
        assert_eq!(sniff(b"qoaf\0\0\0\0"), Some(AudioFormat::Qoa));
        assert_eq!(sniff(b"RIFF\0\0\0\0AVI "), None);
        assert_eq!(sniff(b""), None);
    }

    #[test]
    fn decodes_wav_samples() {
        let audio = decode(wav_bytes(1, 22_050, &[5, -5, i16::MAX])).unwrap();
        assert_eq!(audio, buffer_with_rate(1, &[5, -5, i16::MAX], 22_050));
    }

    fn buffer_with_rate(channels: u32, samples: &[i16], sample_rate: u32) -> DecodedAudio {
        DecodedAudio {
            sample_rate,
            ..buffer(channels, samples)
        }
    }

    #[test]
    fn rejects_unknown_container() {
        let err = decode(b"OggS....".to_vec()).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized audio container");
    }

    #[test]
    fn mono_is_upmixed_and_one_shots_finish() {
        let mut audio = NativeAudio::inline();
        let mut ctx = audio.create_context().unwrap();
        audio.play(&mut ctx, &buffer(1, &[10, 20])).unwrap();

        let mut out = [0i16; 6];
        ctx.mix_into(&mut out);
        assert_eq!(out, [10, 10, 20, 20, 0, 0]);
        assert_eq!(ctx.voices(), 0);
    }

    #[test]
    fn mixing_saturates() {
        let mut audio = NativeAudio::inline();
        let mut ctx = audio.create_context().unwrap();
        let loud = buffer(2, &[30_000, -30_000]);
        audio.play(&mut ctx, &loud).unwrap();
        audio.play(&mut ctx, &loud).unwrap();

        let mut out = [0i16; 2];
        ctx.mix_into(&mut out);
        assert_eq!(out, [i16::MAX, i16::MIN]);
    }

    #[test]
    fn tagged_voices_loop_and_replace() {
        let mut audio = NativeAudio::inline();
        let mut ctx = audio.create_context().unwrap();
        audio.play_tagged(&mut ctx, &buffer(2, &[1, 1]), 3).unwrap();
        audio.play_tagged(&mut ctx, &buffer(2, &[2, 2, 4, 4]), 3).unwrap();
        assert_eq!(ctx.voices(), 1);

        let mut out = [0i16; 6];
        ctx.mix_into(&mut out);
        assert_eq!(out, [2, 2, 4, 4, 2, 2]);
        assert_eq!(ctx.voices(), 1);

        audio.stop_tagged(&mut ctx, 3).unwrap();
        assert_eq!(ctx.voices(), 0);
    }

    #[test]
    fn surround_playback_is_refused() {
        let mut audio = NativeAudio::inline();
        let mut ctx = audio.create_context().unwrap();
        assert!(audio.play(&mut ctx, &buffer(6, &[0; 6])).is_err());
    }

    #[test]
    fn state_mix_clears_then_sums_contexts() {
        let mut state = AudioState::new(NativeAudio::inline());
        for value in [100, 200] {
            let ctx = state.create_context().unwrap().get();
            let buf = state
                .objects
                .buffers
                .insert(buffer(1, &[value]))
                .unwrap()
                .get();
            state.play(ctx, buf).unwrap();
        }
        let mut out = [7i16; 4];
        state.mix(&mut out);
        assert_eq!(out, [300, 300, 0, 0]);
    }

    #[test]
    fn threaded_decode_settles_off_thread() {
        use crate::bridge::{Completion, CompletionQueue};
        use crate::gpu::trace::TraceBackend;

        let mut queue = CompletionQueue::<TraceBackend>::new();
        let done = queue.completer(|op, result| Completion::AudioDecoded {
            op,
            request_id: 1,
            result,
        });
        let mut audio = NativeAudio::new();
        let mut ctx = audio.create_context().unwrap();
        audio.decode(&mut ctx, wav_bytes(1, 8_000, &[1, 2, 3]), done);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let completion = loop {
            if let Some(c) = queue.drain().pop() {
                break c;
            }
            assert!(std::time::Instant::now() < deadline, "decode never settled");
            std::thread::yield_now();
        };
        assert!(matches!(
            completion,
            Completion::AudioDecoded { result: Ok(audio), .. } if audio.frames() == 3
        ));
    }
}
