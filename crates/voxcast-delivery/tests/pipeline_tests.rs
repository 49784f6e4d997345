//! Delivery pipeline behavior: ordering, cancellation, timeouts,
//! backpressure, and sink loss.

mod common;

use common::{BackpressureSink, ClosingSink, CollectingSink, Payload, ScriptedProvider};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use voxcast_delivery::{
    CompletionReason, DeliveryConfig, DeliveryError, DeliveryPipeline, SessionState,
    SynthesisSession,
};
use voxcast_speech::{
    AudioFormat, AudioFrame, Provider, SynthesisProvider, SynthesisRequest, TtsError,
};

fn request(text: &str) -> SynthesisRequest {
    SynthesisRequest::new(text, "", AudioFormat::pcm_16k_mono())
}

fn quick_config() -> DeliveryConfig {
    DeliveryConfig {
        first_frame_timeout_ms: 2_000,
        frame_timeout_ms: 2_000,
        retry_backoff_ms: 1,
        backpressure_wait_ms: 5,
        ..DeliveryConfig::default()
    }
}

async fn deliver_one(
    provider: Arc<ScriptedProvider>,
    text: &str,
    sink: &mut (impl voxcast_delivery::FrameSink + Send),
    config: DeliveryConfig,
) -> (voxcast_delivery::DeliveryReport, SessionState) {
    let request = request(text);
    let stream = provider.synthesize(request.clone()).await.unwrap();
    let mut session = SynthesisSession::new(Provider::OneShot(provider), request);
    let pipeline = DeliveryPipeline::new(config);
    let report = pipeline.deliver(&mut session, stream, sink).await;
    let state = session.state();
    (report, state)
}

#[tokio::test]
async fn test_sequence_strictly_increasing_single_final() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Fixed(vec![3u8; 20_000])));
    let mut sink = CollectingSink::new();
    let (report, state) = deliver_one(provider, "hello", &mut sink, quick_config()).await;

    assert_eq!(report.reason, CompletionReason::Completed);
    assert_eq!(state, SessionState::Completed);

    let frames = sink.frames();
    assert_eq!(report.frames_sent as usize, frames.len());
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.sequence, i as u64);
    }
    assert_eq!(frames.iter().filter(|f| f.is_final).count(), 1);
    assert!(frames.last().unwrap().is_final);
}

#[tokio::test]
async fn test_payload_reaches_sink_intact() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Fixed(vec![0xAB; 1200])));
    let mut sink = CollectingSink::new();
    let (report, _) = deliver_one(provider, "你好，这是测试", &mut sink, quick_config()).await;

    assert_eq!(report.reason, CompletionReason::Completed);
    assert_eq!(report.bytes_sent, 1200);
    assert_eq!(sink.payload(), vec![0xAB; 1200]);
    assert!(sink.frames().last().unwrap().is_final);
}

#[tokio::test]
async fn test_cancel_stops_frames_within_one_interval() {
    let provider = Arc::new(
        ScriptedProvider::new(Payload::Fixed(vec![1u8; 60_000]))
            .with_frame_delay(Duration::from_millis(30)),
    );
    let sink = CollectingSink::new();
    let sink_view = sink.clone();

    let req = request("long");
    let stream = provider.synthesize(req.clone()).await.unwrap();
    let mut session = SynthesisSession::new(Provider::OneShot(provider), req);
    let cancel = session.cancel_handle();

    let pipeline = DeliveryPipeline::new(quick_config());
    let task = tokio::spawn(async move {
        let mut sink = sink;
        let report = pipeline.deliver(&mut session, stream, &mut sink).await;
        (report, session.state())
    });

    while sink_view.frame_count() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    let (report, state) = task.await.unwrap();
    assert_eq!(report.reason, CompletionReason::Cancelled);
    assert_eq!(state, SessionState::Cancelled);

    let frames_at_cancel = sink_view.frame_count();
    assert!(frames_at_cancel < 8, "delivery kept going after cancel");

    // nothing else arrives afterwards
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(sink_view.frame_count(), frames_at_cancel);
    assert!(!sink_view.frames().iter().any(|f| f.is_final));
}

#[tokio::test]
async fn test_frame_timeout_surfaces_as_failure() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Silent));
    let mut sink = CollectingSink::new();
    let config = DeliveryConfig {
        first_frame_timeout_ms: 50,
        frame_timeout_ms: 50,
        ..quick_config()
    };
    let (report, state) = deliver_one(provider, "hi", &mut sink, config).await;

    assert_eq!(report.reason, CompletionReason::Failed);
    assert_eq!(state, SessionState::Failed);
    let error = report.error.unwrap();
    assert!(matches!(error.as_tts(), Some(TtsError::Timeout(_))));
    assert_eq!(sink.frame_count(), 0);
}

#[tokio::test]
async fn test_truncated_stream_is_a_failure_not_silence() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Truncated(vec![2u8; 9_000])));
    let mut sink = CollectingSink::new();
    let (report, state) = deliver_one(provider, "hi", &mut sink, quick_config()).await;

    assert_eq!(report.reason, CompletionReason::Failed);
    assert_eq!(state, SessionState::Failed);
    let error = report.error.unwrap();
    match error.as_tts() {
        Some(TtsError::Provider { transient, .. }) => assert!(transient),
        other => panic!("unexpected error: {other:?}"),
    }
    // the frames that did arrive were still delivered in order
    assert!(sink.frame_count() > 0);
    assert!(!sink.frames().iter().any(|f| f.is_final));
}

#[tokio::test]
async fn test_backpressure_suspends_then_delivers_everything() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Fixed(vec![5u8; 20_000])));
    let mut sink = BackpressureSink::new(3);
    let req = request("hi");
    let stream = provider.synthesize(req.clone()).await.unwrap();
    let mut session = SynthesisSession::new(Provider::OneShot(provider), req);

    let pipeline = DeliveryPipeline::new(quick_config());
    let report = pipeline.deliver(&mut session, stream, &mut sink).await;

    assert_eq!(report.reason, CompletionReason::Completed);
    assert_eq!(sink.refused.load(Ordering::SeqCst), 3);
    assert_eq!(sink.inner.payload().len(), 20_000);
}

#[tokio::test]
async fn test_stalled_sink_fails_the_turn() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Fixed(vec![5u8; 100])));
    let mut sink = BackpressureSink::new(usize::MAX);
    let req = request("hi");
    let stream = provider.synthesize(req.clone()).await.unwrap();
    let mut session = SynthesisSession::new(Provider::OneShot(provider), req);

    let config = DeliveryConfig {
        backpressure_wait_ms: 5,
        backpressure_ceiling_ms: 30,
        ..quick_config()
    };
    let report = DeliveryPipeline::new(config)
        .deliver(&mut session, stream, &mut sink)
        .await;

    assert_eq!(report.reason, CompletionReason::Failed);
    assert!(matches!(report.error, Some(DeliveryError::SinkStalled(_))));
    assert_eq!(sink.inner.frame_count(), 0);
}

#[tokio::test]
async fn test_closed_sink_cancels_session() {
    let provider = Arc::new(ScriptedProvider::new(Payload::Fixed(vec![9u8; 40_000])));
    let mut sink = ClosingSink::new(1);
    let req = request("hi");
    let stream = provider.synthesize(req.clone()).await.unwrap();
    let mut session = SynthesisSession::new(Provider::OneShot(provider), req);

    let report = DeliveryPipeline::new(quick_config())
        .deliver(&mut session, stream, &mut sink)
        .await;

    assert_eq!(report.reason, CompletionReason::Cancelled);
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(session.is_cancelled());
    assert!(matches!(report.error, Some(DeliveryError::SinkClosed)));
    assert_eq!(sink.inner.frame_count(), 1);
}

#[tokio::test]
async fn test_regressing_sequence_rejected() {
    let frames = vec![
        Ok(AudioFrame::new(0, bytes::Bytes::from_static(b"aa"), false)),
        Ok(AudioFrame::new(0, bytes::Bytes::from_static(b"bb"), true)),
    ];
    let stream: voxcast_speech::FrameStream = Box::pin(futures::stream::iter(frames));

    let provider = Arc::new(ScriptedProvider::new(Payload::Fixed(vec![0u8; 4])));
    let mut session = SynthesisSession::new(Provider::OneShot(provider), request("hi"));
    let mut sink = CollectingSink::new();

    let report = DeliveryPipeline::new(quick_config())
        .deliver(&mut session, stream, &mut sink)
        .await;

    assert_eq!(report.reason, CompletionReason::Failed);
    assert!(matches!(
        report.error,
        Some(DeliveryError::OutOfOrder { expected: 1, got: 0 })
    ));
    assert_eq!(sink.frame_count(), 1);
}

#[tokio::test]
async fn test_concurrent_sessions_never_cross_sinks() {
    let provider = Arc::new(ScriptedProvider::new(Payload::EchoText { repeat: 2000 }));

    let run = |text: &'static str| {
        let provider = provider.clone();
        async move {
            let req = request(text);
            let stream = provider.synthesize(req.clone()).await.unwrap();
            let mut session = SynthesisSession::new(Provider::OneShot(provider), req);
            let mut sink = CollectingSink::new();
            let report = DeliveryPipeline::new(quick_config())
                .deliver(&mut session, stream, &mut sink)
                .await;
            (report, sink)
        }
    };

    let (a, b) = tokio::join!(run("aaaa"), run("bbbb"));

    assert_eq!(a.0.reason, CompletionReason::Completed);
    assert_eq!(b.0.reason, CompletionReason::Completed);

    let payload_a = a.1.payload();
    let payload_b = b.1.payload();
    assert!(!payload_a.is_empty() && payload_a.iter().all(|&byte| byte == b'a'));
    assert!(!payload_b.is_empty() && payload_b.iter().all(|&byte| byte == b'b'));
}
