mod common;

use common::{Reply, ScriptedTransport, f32_words};
use energymeter::acquisition::Acquisition;
use energymeter::decoder::{Endianness, Order, Value};
use energymeter::error::MeterError;
use energymeter::planner::ChunkPlanner;
use energymeter::register_map::{DeviceDescriptor, RegisterField, ValueKind};
use std::sync::Arc;
use std::time::Duration;

fn meter() -> Arc<DeviceDescriptor> {
    Arc::new(
        DeviceDescriptor::new(
            "meter",
            vec![
                RegisterField::new("voltage", 0, ValueKind::Float32).with_unit("V"),
                RegisterField::new("status", 2, ValueKind::UInt16),
                RegisterField::new("power", 200, ValueKind::Float32).with_unit("W"),
            ],
        )
        .unwrap(),
    )
}

fn acquisition(replies: Vec<Reply>) -> Acquisition<ScriptedTransport> {
    Acquisition::new(
        meter(),
        Endianness::default(),
        ChunkPlanner::new(100),
        ScriptedTransport::new(replies).connected(),
    )
    .unwrap()
}

#[tokio::test]
async fn cycle_reads_chunks_in_order_and_decodes_all_fields() {
    let power = f32_words(1500.0);
    let mut acq = acquisition(vec![
        Reply::Words(vec![0x4348, 0x0000, 3]),
        Reply::Words(power.to_vec()),
    ]);

    let record = acq.run_cycle().await.unwrap();

    assert_eq!(acq.transport().requests, vec![(0, 3), (200, 2)]);
    assert_eq!(record.device, "meter");
    assert_eq!(record.len(), 3);
    assert_eq!(record.get("voltage"), Some(&Value::Float(200.0)));
    assert_eq!(record.get("status"), Some(&Value::Unsigned(3)));
    assert_eq!(record.get("power"), Some(&Value::Float(1500.0)));
}

#[tokio::test]
async fn failing_second_chunk_aborts_cycle_without_record() {
    let mut acq = acquisition(vec![
        Reply::Words(vec![0x4348, 0x0000, 3]),
        Reply::Fail("illegal data address"),
    ]);

    let err = acq.run_cycle().await.unwrap_err();

    assert_eq!(err.failed_chunk(), Some(1));
    assert!(matches!(err.root_cause(), MeterError::Transport { .. }));
    match &err {
        MeterError::Cycle { start, count, .. } => {
            assert_eq!(*start, 200);
            assert_eq!(*count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn short_response_is_decode_error_and_stops_reading() {
    let mut acq = acquisition(vec![
        Reply::Words(vec![0x4348, 0x0000]),
        Reply::Words(f32_words(1.0).to_vec()),
    ]);

    let err = acq.run_cycle().await.unwrap_err();

    assert_eq!(err.failed_chunk(), Some(0));
    assert!(matches!(err.root_cause(), MeterError::Decode { .. }));
    assert_eq!(acq.transport().requests, vec![(0, 3)]);
}

#[tokio::test]
async fn long_response_is_not_truncated() {
    let mut acq = acquisition(vec![
        Reply::Words(vec![0x4348, 0x0000, 3, 9]),
        Reply::Words(f32_words(1.0).to_vec()),
    ]);
    let err = acq.run_cycle().await.unwrap_err();
    assert!(matches!(err.root_cause(), MeterError::Decode { .. }));
}

#[tokio::test]
async fn little_word_order_swaps_words_of_each_value() {
    let power = f32_words(-12.5);
    let mut acq = Acquisition::new(
        meter(),
        Endianness::new(Order::Big, Order::Little),
        ChunkPlanner::new(100),
        ScriptedTransport::new(vec![
            Reply::Words(vec![0x0000, 0x4348, 0xFFFF]),
            Reply::Words(vec![power[1], power[0]]),
        ])
        .connected(),
    )
    .unwrap();

    let record = acq.run_cycle().await.unwrap();
    assert_eq!(record.get("voltage"), Some(&Value::Float(200.0)));
    assert_eq!(record.get("status"), Some(&Value::Unsigned(0xFFFF)));
    assert_eq!(record.get("power"), Some(&Value::Float(-12.5)));
}

#[tokio::test]
async fn plan_is_computed_once_and_reused() {
    let mut acq = acquisition(vec![
        Reply::Words(vec![0x4348, 0x0000, 1]),
        Reply::Words(f32_words(1.0).to_vec()),
        Reply::Words(vec![0x4348, 0x0000, 2]),
        Reply::Words(f32_words(2.0).to_vec()),
    ]);
    let plan = Arc::clone(acq.plan());

    let first = acq.run_cycle().await.unwrap();
    let second = acq.run_cycle().await.unwrap();

    assert!(Arc::ptr_eq(&plan, acq.plan()));
    assert_eq!(first.get("status"), Some(&Value::Unsigned(1)));
    assert_eq!(second.get("status"), Some(&Value::Unsigned(2)));
    assert_eq!(
        acq.transport().requests,
        vec![(0, 3), (200, 2), (0, 3), (200, 2)]
    );
}

#[test]
fn oversized_field_fails_at_construction() {
    let descriptor = Arc::new(
        DeviceDescriptor::new("meter", vec![RegisterField::string("label", 0, 150)]).unwrap(),
    );
    let err = Acquisition::new(
        descriptor,
        Endianness::default(),
        ChunkPlanner::new(100),
        ScriptedTransport::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, MeterError::ChunkTooLarge { words: 150, .. }));
}

#[tokio::test]
async fn abandoned_cycle_leaves_acquisition_usable() {
    let mut acq = acquisition(vec![Reply::Words(vec![0x4348, 0x0000, 3]), Reply::Hang]);

    let abandoned = tokio::time::timeout(Duration::from_millis(50), acq.run_cycle()).await;
    assert!(abandoned.is_err());
    assert_eq!(acq.transport().requests, vec![(0, 3), (200, 2)]);

    let transport = acq.transport_mut();
    transport.push(Reply::Words(vec![0x4348, 0x0000, 4]));
    transport.push(Reply::Words(f32_words(7.0).to_vec()));
    let record = acq.run_cycle().await.unwrap();
    assert_eq!(record.get("status"), Some(&Value::Unsigned(4)));
    assert_eq!(record.get("power"), Some(&Value::Float(7.0)));
    assert_eq!(acq.transport().requests.len(), 4);
}
