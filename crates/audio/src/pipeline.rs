//! Audio Pipeline Controller (spec §4.3, C3): encoder/decoder lifecycle and
//! capture/playback gating. This crate owns no real codec or audio driver —
//! those are external collaborators (spec §1) — it owns the *state machine*
//! around them: which queues are live, whether capture/output are gated,
//! and when the encoder/decoder must be reset or replaced.
//!
//! A small set of mutex-guarded queues plus atomic flags, with no
//! background thread of its own — callers (the orchestrator's serializer
//! tasks) drive every transition explicitly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::debug;

use crate::codec::{CodecError, OpusDecoder, OpusEncoder};

/// Builds a fresh decoder for a renegotiated (sample_rate, frame_ms) pair.
/// A trait object can't be default-constructed generically, so the pipeline
/// takes a factory closure instead of constructing decoders itself.
pub type DecoderFactory = Box<dyn Fn(u32, u32) -> Box<dyn OpusDecoder> + Send + Sync>;

pub struct AudioPipeline {
    encoder: Mutex<Box<dyn OpusEncoder>>,
    decoder: Mutex<Box<dyn OpusDecoder>>,
    decoder_factory: DecoderFactory,

    decode_queue: Mutex<VecDeque<Bytes>>,
    /// When the decode queue last became empty; `None` while non-empty.
    decode_queue_idle_since: Mutex<Option<Instant>>,

    capture_enabled: AtomicBool,
    output_enabled: AtomicBool,

    /// Frames handed to the background encoder but not yet completed
    /// (spec §4.4 step 3 "wait for the background-encode queue to drain").
    pending_encodes: Mutex<u32>,
    encode_drained: Notify,
}

impl AudioPipeline {
    pub fn new(
        encoder: Box<dyn OpusEncoder>,
        decoder: Box<dyn OpusDecoder>,
        decoder_factory: DecoderFactory,
    ) -> Self {
        Self {
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            decoder_factory,
            decode_queue: Mutex::new(VecDeque::new()),
            decode_queue_idle_since: Mutex::new(Some(Instant::now())),
            capture_enabled: AtomicBool::new(false),
            output_enabled: AtomicBool::new(false),
            pending_encodes: Mutex::new(0),
            encode_drained: Notify::new(),
        }
    }

    // ---- capture gating --------------------------------------------------

    pub fn start_capture(&self) {
        self.capture_enabled.store(true, Ordering::SeqCst);
    }

    pub fn stop_capture(&self) {
        self.capture_enabled.store(false, Ordering::SeqCst);
    }

    pub fn capture_is_enabled(&self) -> bool {
        self.capture_enabled.load(Ordering::SeqCst)
    }

    // ---- encoder -----------------------------------------------------------

    /// Resets encoder state (spec §4.3 invariant i: on entering `Listening`
    /// from any state other than `Listening`).
    pub fn reset_encoder(&self) {
        self.encoder.lock().expect("encoder mutex poisoned").reset_state();
    }

    pub fn encode(&self, pcm: &[i16]) -> Result<Bytes, CodecError> {
        self.encoder.lock().expect("encoder mutex poisoned").encode(pcm)
    }

    // ---- background encode queue -------------------------------------------

    pub fn note_encode_enqueued(&self) {
        *self.pending_encodes.lock().expect("pending-encode mutex poisoned") += 1;
    }

    pub fn note_encode_completed(&self) {
        let mut pending = self.pending_encodes.lock().expect("pending-encode mutex poisoned");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.encode_drained.notify_waiters();
        }
    }

    /// Forcibly clears the background-encode accounting without waiting —
    /// used by [`Self::discard_pending_capture`], which abandons in-flight
    /// frames rather than draining them.
    fn clear_pending_encodes(&self) {
        *self.pending_encodes.lock().expect("pending-encode mutex poisoned") = 0;
        self.encode_drained.notify_waiters();
    }

    /// Waits for the background-encode queue to drain (spec §4.4 step 3).
    pub async fn wait_for_encode_drain(&self) {
        loop {
            if *self.pending_encodes.lock().expect("pending-encode mutex poisoned") == 0 {
                return;
            }
            self.encode_drained.notified().await;
        }
    }

    // ---- decoder / decode queue --------------------------------------------

    /// Replaces the decoder atomically when negotiated parameters change
    /// (spec §4.3).
    pub fn set_decode_sample_rate(&self, rate_hz: u32, frame_ms: u32) {
        let mut decoder = self.decoder.lock().expect("decoder mutex poisoned");
        if decoder.sample_rate_hz() == rate_hz && decoder.frame_ms() == frame_ms {
            return;
        }
        *decoder = (self.decoder_factory)(rate_hz, frame_ms);
        debug!(rate_hz, frame_ms, "decoder renegotiated");
    }

    pub fn reset_decoder(&self) {
        self.decoder.lock().expect("decoder mutex poisoned").reset_state();
    }

    /// Enqueues an inbound Opus payload awaiting PCM decode (spec §3
    /// `AudioFrameQueue`).
    pub fn enqueue_incoming(&self, payload: Bytes) {
        let mut queue = self.decode_queue.lock().expect("decode queue mutex poisoned");
        queue.push_back(payload);
        *self.decode_queue_idle_since.lock().expect("idle-since mutex poisoned") = None;
    }

    /// Pops and decodes the next queued payload, in order.
    pub fn decode_next(&self) -> Option<Result<Vec<i16>, CodecError>> {
        let next = {
            let mut queue = self.decode_queue.lock().expect("decode queue mutex poisoned");
            let next = queue.pop_front();
            if queue.is_empty() {
                *self.decode_queue_idle_since.lock().expect("idle-since mutex poisoned") = Some(Instant::now());
            }
            next
        }?;
        Some(self.decoder.lock().expect("decoder mutex poisoned").decode(&next))
    }

    /// Clears pending decoded audio — called on entering `Listening` (the
    /// user is about to speak; stale TTS must not play) and by the
    /// watchdog/preemption paths.
    pub fn clear_decode_queue(&self) {
        let mut queue = self.decode_queue.lock().expect("decode queue mutex poisoned");
        queue.clear();
        *self.decode_queue_idle_since.lock().expect("idle-since mutex poisoned") = Some(Instant::now());
    }

    pub fn decode_queue_is_empty(&self) -> bool {
        self.decode_queue.lock().expect("decode queue mutex poisoned").is_empty()
    }

    // ---- output gating ------------------------------------------------------

    pub fn enable_output(&self, enabled: bool) {
        self.output_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn output_is_idle(&self) -> bool {
        !self.output_enabled.load(Ordering::SeqCst) || self.decode_queue_is_empty()
    }

    /// Whether the decode queue has been continuously empty for at least
    /// `idle_timeout` (spec §4.3 invariant iii), unless `suppress` (the
    /// alarm preemption prelude) is set.
    pub fn should_auto_disable_output(&self, idle_timeout: std::time::Duration, suppress: bool) -> bool {
        if suppress || !self.output_enabled.load(Ordering::SeqCst) {
            return false;
        }
        match *self.decode_queue_idle_since.lock().expect("idle-since mutex poisoned") {
            Some(since) => since.elapsed() >= idle_timeout,
            None => false,
        }
    }

    /// Resets the idle clock so the 10 s auto-disable doesn't fire
    /// mid-prelude (spec §4.7 "ensure output enabled ... update
    /// last-output-time").
    pub fn touch_output_activity(&self) {
        *self.decode_queue_idle_since.lock().expect("idle-since mutex poisoned") = None;
    }

    // ---- combined reset paths -----------------------------------------------

    /// Stop capture, clear the background-encode queue, reset encoder
    /// state, clear the decode queue (spec §4.3 `discard_pending_capture`).
    pub fn discard_pending_capture(&self) {
        self.stop_capture();
        self.clear_pending_encodes();
        self.reset_encoder();
        self.clear_decode_queue();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{NullDecoder, NullEncoder};
    use std::time::Duration;

    fn pipeline() -> AudioPipeline {
        AudioPipeline::new(
            Box::new(NullEncoder::default()),
            Box::new(NullDecoder::new(16_000, 60)),
            Box::new(|rate, frame_ms| Box::new(NullDecoder::new(rate, frame_ms)) as Box<dyn OpusDecoder>),
        )
    }

    #[test]
    fn decode_queue_preserves_order() {
        let pipeline = pipeline();
        pipeline.enqueue_incoming(Bytes::from_static(&[1, 0, 2, 0]));
        pipeline.enqueue_incoming(Bytes::from_static(&[3, 0]));
        assert_eq!(pipeline.decode_next().unwrap().unwrap(), vec![1, 2]);
        assert_eq!(pipeline.decode_next().unwrap().unwrap(), vec![3]);
        assert!(pipeline.decode_next().is_none());
    }

    #[test]
    fn discard_pending_capture_clears_everything() {
        let pipeline = pipeline();
        pipeline.start_capture();
        pipeline.note_encode_enqueued();
        pipeline.enqueue_incoming(Bytes::from_static(&[1, 0]));

        pipeline.discard_pending_capture();

        assert!(!pipeline.capture_is_enabled());
        assert!(pipeline.decode_queue_is_empty());
        assert_eq!(*pipeline.pending_encodes.lock().unwrap(), 0);
    }

    #[test]
    fn decoder_renegotiation_replaces_atomically() {
        let pipeline = pipeline();
        pipeline.set_decode_sample_rate(24_000, 20);
        assert_eq!(pipeline.decoder.lock().unwrap().sample_rate_hz(), 24_000);
        assert_eq!(pipeline.decoder.lock().unwrap().frame_ms(), 20);
    }

    #[test]
    fn auto_disable_respects_prelude_suppression() {
        let pipeline = pipeline();
        pipeline.enable_output(true);
        std::thread::sleep(Duration::from_millis(5));
        assert!(pipeline.should_auto_disable_output(Duration::from_millis(1), false));
        assert!(!pipeline.should_auto_disable_output(Duration::from_millis(1), true));
    }

    #[test]
    fn touching_output_activity_resets_idle_clock() {
        let pipeline = pipeline();
        pipeline.enable_output(true);
        std::thread::sleep(Duration::from_millis(5));
        pipeline.touch_output_activity();
        assert!(!pipeline.should_auto_disable_output(Duration::from_millis(1), false));
    }

    #[tokio::test]
    async fn wait_for_encode_drain_resolves_after_completion() {
        let pipeline = pipeline();
        pipeline.note_encode_enqueued();
        let pipeline = std::sync::Arc::new(pipeline);
        let waiter = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline.wait_for_encode_drain().await;
            })
        };
        tokio::task::yield_now().await;
        pipeline.note_encode_completed();
        waiter.await.unwrap();
    }
}
