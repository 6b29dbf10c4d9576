//! Async bridge.
//!
//! Responsibilities:
//! - Hand the host a one-shot [`Completer`] for every asynchronous operation the guest issues.
//! - Queue settled operations as [`Completion`] messages instead of calling into the guest from
//!   whatever stack the host resolves on.
//! - Between guest calls, turn each queued completion into a minted handle plus a single
//!   [`GuestCall`] of a statically known export.
//!
//! Notes:
//! - Operations are independent: two overlapping requests produce two completions, delivered in
//!   the order the host settled them.
//! - A completer that is dropped without being settled rejects itself, so every issued operation
//!   produces exactly one callback.

use crate::abi::guest_exports;
use crate::audio::DecodedAudio;
use crate::gpu::{GpuBackend, GpuObjects};
use crate::registry::Registry;
use std::sync::mpsc::{self, Receiver, Sender};

/// Status passed to completion exports.
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 0;

/// Identifies one issued asynchronous operation.
pub type OpId = u64;

type Deliver<T> = Box<dyn FnOnce(Result<T, String>) + Send>;

/// One-shot resolver for a single asynchronous host operation.
///
/// Settling consumes the completer; it can be moved to another thread.
pub struct Completer<T> {
    op: OpId,
    deliver: Option<Deliver<T>>,
}

impl<T> Completer<T> {
    pub fn new(op: OpId, deliver: impl FnOnce(Result<T, String>) + Send + 'static) -> Self {
        Self {
            op,
            deliver: Some(Box::new(deliver)),
        }
    }

    pub fn op(&self) -> OpId {
        self.op
    }

    pub fn resolve(mut self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(mut self, reason: impl Into<String>) {
        self.settle(Err(reason.into()));
    }

    fn settle(&mut self, result: Result<T, String>) {
        if let Some(deliver) = self.deliver.take() {
            deliver(result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.deliver.is_some() {
            log::debug!("operation {} dropped without being settled", self.op);
            self.settle(Err("operation dropped by host".to_owned()));
        }
    }
}

impl<T> core::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completer")
            .field("op", &self.op)
            .field("settled", &self.deliver.is_none())
            .finish()
    }
}

/// A settled asynchronous operation waiting for dispatch.
pub enum Completion<G: GpuBackend> {
    Adapter {
        op: OpId,
        result: Result<G::Adapter, String>,
    },
    Device {
        op: OpId,
        result: Result<G::Device, String>,
    },
    QueueWorkDone {
        op: OpId,
        queue: u32,
        result: Result<(), String>,
    },
    AudioDecoded {
        op: OpId,
        request_id: u32,
        result: Result<DecodedAudio, String>,
    },
}

impl<G: GpuBackend> Completion<G> {
    pub fn op(&self) -> OpId {
        match self {
            Completion::Adapter { op, .. }
            | Completion::Device { op, .. }
            | Completion::QueueWorkDone { op, .. }
            | Completion::AudioDecoded { op, .. } => *op,
        }
    }

    /// Mint the produced resource (if any) and build the export call that reports it.
    ///
    /// Rejections, and successes whose handle cannot be minted, report handle 0 with
    /// [`STATUS_FAILURE`]. The reason is only logged: the issuing import returned long ago, so
    /// the synchronous error slot is left alone.
    pub fn settle(
        self,
        gpu: &mut GpuObjects<G>,
        audio_buffers: &mut Registry<DecodedAudio>,
    ) -> GuestCall {
        match self {
            Completion::Adapter { op, result } => {
                let (handle, status) =
                    mint("request adapter", op, result, &mut gpu.adapters);
                GuestCall::new(
                    guest_exports::ON_ADAPTER_RECEIVED,
                    vec![Arg::U32(handle), Arg::U32(status)],
                )
            }
            Completion::Device { op, result } => {
                let (handle, status) =
                    mint("request device", op, result, &mut gpu.devices);
                GuestCall::new(
                    guest_exports::ON_DEVICE_RECEIVED,
                    vec![Arg::U32(handle), Arg::U32(status)],
                )
            }
            Completion::QueueWorkDone { op, queue, result } => {
                let status = match result {
                    Ok(()) => STATUS_SUCCESS,
                    Err(reason) => {
                        log::warn!("queue work done (op {op}) failed: {reason}");
                        STATUS_FAILURE
                    }
                };
                GuestCall::new(
                    guest_exports::ON_QUEUE_WORK_DONE,
                    vec![Arg::U32(queue), Arg::U32(status)],
                )
            }
            Completion::AudioDecoded {
                op,
                request_id,
                result,
            } => {
                let info = result.as_ref().map(DecodedAudio::info).ok();
                match (info, mint("decode audio", op, result, audio_buffers)) {
                    (Some(info), (handle, STATUS_SUCCESS)) => GuestCall::new(
                        guest_exports::ON_AUDIO_DECODED,
                        vec![
                            Arg::U32(request_id),
                            Arg::U32(handle),
                            Arg::F64(info.duration_ms),
                            Arg::U32(info.frames),
                            Arg::U32(info.channels),
                            Arg::U32(info.sample_rate),
                        ],
                    ),
                    _ => GuestCall::new(
                        guest_exports::ON_AUDIO_DECODE_ERROR,
                        vec![Arg::U32(request_id)],
                    ),
                }
            }
        }
    }
}

fn mint<T>(
    what: &str,
    op: OpId,
    result: Result<T, String>,
    registry: &mut Registry<T>,
) -> (u32, u32) {
    let minted = result.and_then(|value| registry.insert(value).map_err(|e| e.to_string()));
    match minted {
        Ok(handle) => (handle.get(), STATUS_SUCCESS),
        Err(reason) => {
            log::warn!("{what} (op {op}) failed: {reason}");
            (0, STATUS_FAILURE)
        }
    }
}

/// Settled operations waiting for the dispatch loop, plus the operation counter.
pub struct CompletionQueue<G: GpuBackend> {
    tx: Sender<Completion<G>>,
    rx: Receiver<Completion<G>>,
    next_op: OpId,
}

impl<G: GpuBackend> Default for CompletionQueue<G> {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, next_op: 0 }
    }
}

impl<G: GpuBackend> CompletionQueue<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new operation. `wrap` turns its eventual result into a queued [`Completion`].
    pub fn completer<T: 'static>(
        &mut self,
        wrap: impl FnOnce(OpId, Result<T, String>) -> Completion<G> + Send + 'static,
    ) -> Completer<T> {
        self.next_op += 1;
        let op = self.next_op;
        let tx = self.tx.clone();
        Completer::new(op, move |result| {
            // The receiver lives as long as the boundary context; after teardown there is
            // nobody left to notify.
            if tx.send(wrap(op, result)).is_err() {
                log::debug!("completion for operation {op} arrived after shutdown");
            }
        })
    }

    /// Everything settled since the last drain, in settlement order.
    pub fn drain(&mut self) -> Vec<Completion<G>> {
        self.rx.try_iter().collect()
    }

    /// Number of operations issued so far.
    pub fn issued(&self) -> u64 {
        self.next_op
    }
}

/// An argument to a guest export.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Arg {
    I32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
}

/// A pending call of a guest export.
#[derive(Clone, Debug, PartialEq)]
pub struct GuestCall {
    pub export: &'static str,
    pub args: Vec<Arg>,
}

impl GuestCall {
    pub fn new(export: &'static str, args: Vec<Arg>) -> Self {
        Self { export, args }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::trace::{TraceBackend, TraceObject};
    use crate::registry::ResourceKind;

    type Queue = CompletionQueue<TraceBackend>;

    fn adapter_completer(queue: &mut Queue) -> Completer<TraceObject> {
        queue.completer(|op, result| Completion::Adapter { op, result })
    }

    fn settle_all(queue: &mut Queue) -> (Vec<GuestCall>, GpuObjects<TraceBackend>) {
        let mut gpu = GpuObjects::default();
        let mut audio = Registry::new(ResourceKind::AudioBuffer);
        let calls = queue
            .drain()
            .into_iter()
            .map(|c| c.settle(&mut gpu, &mut audio))
            .collect();
        (calls, gpu)
    }

    #[test]
    fn overlapping_requests_complete_in_resolution_order() {
        let mut queue = Queue::new();
        let first = adapter_completer(&mut queue);
        let second = adapter_completer(&mut queue);
        assert_eq!((first.op(), second.op()), (1, 2));

        second.resolve(TraceObject::named("second"));
        first.resolve(TraceObject::named("first"));

        let (calls, gpu) = settle_all(&mut queue);
        assert_eq!(
            calls,
            vec![
                GuestCall::new(
                    guest_exports::ON_ADAPTER_RECEIVED,
                    vec![Arg::U32(1), Arg::U32(STATUS_SUCCESS)]
                ),
                GuestCall::new(
                    guest_exports::ON_ADAPTER_RECEIVED,
                    vec![Arg::U32(2), Arg::U32(STATUS_SUCCESS)]
                ),
            ]
        );
        assert_eq!(gpu.adapters.get(1).map(|a| a.name.as_str()), Some("second"));
        assert_eq!(gpu.adapters.get(2).map(|a| a.name.as_str()), Some("first"));
    }

    #[test]
    fn rejection_reports_zero_handle_and_failure() {
        let mut queue = Queue::new();
        queue
            .completer(|op, result| Completion::Device { op, result })
            .reject("no device");

        let (calls, gpu) = settle_all(&mut queue);
        assert_eq!(
            calls,
            vec![GuestCall::new(
                guest_exports::ON_DEVICE_RECEIVED,
                vec![Arg::U32(0), Arg::U32(STATUS_FAILURE)]
            )]
        );
        assert_eq!(gpu.devices.live(), 0);
    }

    #[test]
    fn dropped_completer_rejects() {
        let mut queue = Queue::new();
        drop(adapter_completer(&mut queue));
        let completions = queue.drain();
        assert_eq!(completions.len(), 1);
        assert!(matches!(
            &completions[0],
            Completion::Adapter { op: 1, result: Err(reason) } if reason == "operation dropped by host"
        ));
    }

    #[test]
    fn completers_settle_from_other_threads() {
        let mut queue = Queue::new();
        let done = queue.completer(|op, result| Completion::QueueWorkDone {
            op,
            queue: 4,
            result,
        });
        std::thread::spawn(move || done.resolve(()))
            .join()
            .unwrap();

        let (calls, _) = settle_all(&mut queue);
        assert_eq!(
            calls,
            vec![GuestCall::new(
                guest_exports::ON_QUEUE_WORK_DONE,
                vec![Arg::U32(4), Arg::U32(STATUS_SUCCESS)]
            )]
        );
    }

    #[test]
    fn decoded_audio_reports_its_shape() {
        let mut queue = Queue::new();
        queue
            .completer(|op, result| Completion::AudioDecoded {
                op,
                request_id: 9,
                result,
            })
            .resolve(DecodedAudio {
                samples: vec![0; 44_100 * 2],
                channels: 2,
                sample_rate: 44_100,
            });
        queue
            .completer(|op, result: Result<DecodedAudio, String>| Completion::AudioDecoded {
                op,
                request_id: 10,
                result,
            })
            .reject("not audio");

        let (calls, _) = settle_all(&mut queue);
        assert_eq!(
            calls[0],
            GuestCall::new(
                guest_exports::ON_AUDIO_DECODED,
                vec![
                    Arg::U32(9),
                    Arg::U32(1),
                    Arg::F64(1000.0),
                    Arg::U32(44_100),
                    Arg::U32(2),
                    Arg::U32(44_100),
                ]
            )
        );
        assert_eq!(
            calls[1],
            GuestCall::new(guest_exports::ON_AUDIO_DECODE_ERROR, vec![Arg::U32(10)])
        );
    }
}
