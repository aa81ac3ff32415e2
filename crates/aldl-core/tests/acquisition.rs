//! End-to-end tests for the acquisition engine over in-memory transports.

use aldl_core::definition::{compile, DecoderSchema, MAX_FRAME_LENGTH};
use aldl_core::demo::SimulatedEcm;
use aldl_core::protocol::frame::seal_frame;
use aldl_core::protocol::{
    AcquisitionEngine, CycleFault, EngineConfig, FrameError, ProtocolError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REQUEST: [u8; 5] = [0xF4, 0x57, 0x01, 0x00, 0xB4];

fn schema(echo_cancel: bool) -> Arc<DecoderSchema> {
    let echo = if echo_cancel { "true" } else { "false" };
    let doc = format!(
        r#"<ADXFILE title="Test ECM">
            <echocancel>{echo}</echocancel>
            <ADXVALUE id="rpm" title="Engine RPM"><packetoffset>1</packetoffset><bytecount>2</bytecount><factor>0.25</factor></ADXVALUE>
            <ADXVALUE id="tps" title="TPS"><packetoffset>3</packetoffset><factor>0.5</factor><offset>-10</offset></ADXVALUE>
           </ADXFILE>"#
    );
    Arc::new(compile(&doc, "test.adx").unwrap())
}

/// Frame for the test schema: rpm raw 0x012C (300), tps raw 100
fn good_frame() -> Vec<u8> {
    seal_frame(vec![0xF4, 0x01, 0x2C, 100])
}

/// A device that answers each request with the next scripted response and
/// then stays silent.
fn scripted_device(responses: Vec<Vec<u8>>) -> (DuplexStream, JoinHandle<DuplexStream>) {
    let (host, mut device) = tokio::io::duplex(256);
    let handle = tokio::spawn(async move {
        for response in responses {
            let mut request = [0u8; REQUEST.len()];
            if device.read_exact(&mut request).await.is_err() {
                break;
            }
            assert_eq!(request, REQUEST);
            device.write_all(&response).await.unwrap();
        }
        device
    });
    (host, handle)
}

#[tokio::test]
async fn test_cycle_with_echo_decodes_snapshot() {
    let mut response = REQUEST.to_vec();
    response.extend(good_frame());
    let (host, _device) = scripted_device(vec![response]);

    let mut engine = AcquisitionEngine::new(host, schema(true));
    let latest = engine.subscribe();
    let counter = engine.frame_counter();

    let snapshot = engine.run_cycle().await.unwrap();
    assert_eq!(snapshot.get("rpm"), Some(75.0));
    assert_eq!(snapshot.get("tps"), Some(40.0));
    assert_eq!(counter.frames(), 1);

    let published = latest.borrow().clone().expect("snapshot published");
    assert!(Arc::ptr_eq(&published, &snapshot));
}

#[tokio::test]
async fn test_cycle_without_echo() {
    let (host, _device) = scripted_device(vec![good_frame()]);
    let mut engine = AcquisitionEngine::new(host, schema(false));
    let snapshot = engine.run_cycle().await.unwrap();
    assert_eq!(snapshot.get("rpm"), Some(75.0));
}

#[tokio::test(start_paused = true)]
async fn test_read_timeout_produces_no_snapshot() {
    // Device stays connected but never answers
    let (host, _device) = tokio::io::duplex(64);
    let mut engine = AcquisitionEngine::new(host, schema(true));
    let latest = engine.subscribe();
    let counter = engine.frame_counter();

    let result = engine.run_cycle().await;
    assert!(matches!(
        result,
        Err(CycleFault::Frame(FrameError::NoSync { received: 0, .. }))
    ));
    assert!(latest.borrow().is_none());
    assert_eq!(counter.frames(), 0);
    assert_eq!(counter.stats().sync_misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_partial_frame_then_timeout() {
    let mut partial = good_frame();
    partial.truncate(3);
    let (host, _device) = scripted_device(vec![partial]);
    let mut engine = AcquisitionEngine::new(host, schema(true));

    let result = engine.run_cycle().await;
    assert!(matches!(
        result,
        Err(CycleFault::Frame(FrameError::ShortFrame { expected: 5, actual: 3 }))
    ));
    assert_eq!(engine.frame_counter().stats().short_frames, 1);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_cycle_is_followed_by_recovery() {
    let mut corrupt = good_frame();
    corrupt[2] ^= 0xFF;
    let mut noisy = vec![0x00, 0x11];
    noisy.extend(good_frame());
    let (host, _device) = scripted_device(vec![corrupt, noisy]);

    let mut engine = AcquisitionEngine::new(host, schema(false));
    assert!(matches!(
        engine.run_cycle().await,
        Err(CycleFault::Frame(FrameError::ChecksumMismatch { .. }))
    ));
    let snapshot = engine.run_cycle().await.unwrap();
    assert_eq!(snapshot.get("tps"), Some(40.0));

    let stats = engine.frame_counter().stats();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.checksum_errors, 1);
    assert_eq!(stats.dropped(), 1);
}

#[tokio::test]
async fn test_oversized_offset_does_not_grow_the_frame() {
    let doc = r#"<ADXFILE><echocancel>false</echocancel>
        <ADXVALUE id="rpm" title="Engine RPM"><packetoffset>1</packetoffset><bytecount>2</bytecount><factor>0.25</factor></ADXVALUE>
        <ADXVALUE id="tps" title="TPS"><packetoffset>3</packetoffset><factor>0.5</factor><offset>-10</offset></ADXVALUE>
        <ADXVALUE id="bogus" title="Bogus"><packetoffset>9000000000000000000</packetoffset></ADXVALUE>
       </ADXFILE>"#;
    let schema = Arc::new(compile(doc, "bogus.adx").unwrap());
    assert_eq!(schema.expected_frame_length, 5);
    assert!(schema.parameter("bogus").is_none());

    let (host, _device) = scripted_device(vec![good_frame()]);
    let mut engine = AcquisitionEngine::new(host, schema);
    let snapshot = engine.run_cycle().await.unwrap();
    assert_eq!(snapshot.get("rpm"), Some(75.0));
}

#[tokio::test(start_paused = true)]
async fn test_huge_declared_frame_length_is_a_short_frame() {
    let mut schema = (*schema(false)).clone();
    schema.expected_frame_length = usize::MAX / 2;
    let schema = Arc::new(schema);

    let (host, _device) = scripted_device(vec![good_frame()]);
    let mut engine = AcquisitionEngine::new(host, schema.clone());
    assert!(matches!(
        engine.run_cycle().await,
        Err(CycleFault::Frame(FrameError::ShortFrame { actual: 5, .. }))
    ));

    let frame = SimulatedEcm::seeded(schema, 1).encode_frame(&Default::default());
    assert_eq!(frame.len(), MAX_FRAME_LENGTH);
}

#[tokio::test]
async fn test_closed_line_before_any_byte_is_disconnect() {
    let (host, mut device) = tokio::io::duplex(64);
    let hangup = tokio::spawn(async move {
        let mut request = [0u8; REQUEST.len()];
        device.read_exact(&mut request).await.unwrap();
    });

    let mut engine = AcquisitionEngine::new(host, schema(true));
    let result = engine.run_cycle().await;
    hangup.await.unwrap();
    assert!(matches!(
        result,
        Err(CycleFault::Transport(ProtocolError::Disconnected))
    ));
    assert_eq!(engine.frame_counter().stats().transport_errors, 1);
}

#[tokio::test]
async fn test_write_failure_is_transport_fault() {
    let (host, device) = tokio::io::duplex(64);
    drop(device);

    let mut engine = AcquisitionEngine::new(host, schema(true));
    let result = engine.run_cycle().await;
    assert!(matches!(
        result,
        Err(CycleFault::Transport(ProtocolError::IoError(_)))
    ));
    assert_eq!(engine.frame_counter().stats().transport_errors, 1);
}

#[tokio::test]
async fn test_streaming_until_cancelled() {
    let schema = schema(true);
    let (host, device) = SimulatedEcm::seeded(schema.clone(), 11).spawn();

    let engine = AcquisitionEngine::new(host, schema);
    let mut latest = engine.subscribe();
    let counter = engine.frame_counter();
    let cancel = CancellationToken::new();
    let task = engine.spawn(cancel.clone());

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), latest.changed())
            .await
            .expect("snapshot within deadline")
            .unwrap();
    }
    cancel.cancel();

    let transport = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("engine stops after cancellation")
        .unwrap();
    assert!(counter.frames() >= 3);

    let rpm = latest.borrow().as_ref().and_then(|s| s.get("rpm")).unwrap();
    assert!(rpm > 700.0 && rpm < 1000.0, "idle rpm {rpm}");

    // Closing the host end lets the simulator finish cleanly
    drop(transport);
    device.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancelled_before_start_runs_no_cycle() {
    let (host, _device) = tokio::io::duplex(64);
    let engine = AcquisitionEngine::new(host, schema(true));
    let counter = engine.frame_counter();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let _transport = engine.run(cancel).await;
    assert_eq!(counter.stats().dropped(), 0);
    assert_eq!(counter.frames(), 0);
}

#[tokio::test]
async fn test_sink_receives_snapshots() {
    let schema = schema(false);
    let (host, _device) = SimulatedEcm::seeded(schema.clone(), 5)
        .with_echo(false)
        .spawn();

    let (tx, mut rx) = mpsc::channel(8);
    // Without an echo the buffer never fills, so every cycle ends at the
    // read deadline
    let config = EngineConfig {
        read_deadline_ms: 50,
        cycle_pause_ms: 1,
        ..EngineConfig::default()
    };
    let engine = AcquisitionEngine::with_config(host, schema, config).with_sink(tx);
    let cancel = CancellationToken::new();
    let task = engine.spawn(cancel.clone());

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(second.captured_at() >= first.captured_at());

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_corrupting_simulator_drops_silently() {
    let schema = schema(true);
    let (host, _device) = SimulatedEcm::seeded(schema.clone(), 2)
        .with_corruption(1.0)
        .spawn();

    let engine = AcquisitionEngine::new(host, schema);
    let counter = engine.frame_counter();
    let latest = engine.subscribe();
    let cancel = CancellationToken::new();
    let task = engine.spawn(cancel.clone());

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();
    task.await.unwrap();

    let stats = counter.stats();
    assert_eq!(stats.frames, 0);
    assert!(stats.checksum_errors > 0);
    assert!(latest.borrow().is_none());
}
