/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_blob_stream::prelude::*;
use monotonic_time_rs::{Millis, MillisDuration};

const CHUNK_SIZE: u16 = 4;

fn example_blob() -> Vec<u8> {
    (0u8..=21).collect()
}

#[test_log::test]
fn transfer_completes_over_lossless_exchange() {
    let blob = example_blob();
    let mut sender = OutLogicFront::new(
        TransferId(1),
        CHUNK_SIZE,
        MillisDuration::from_millis(100),
        &blob,
    )
    .expect("transfer should start");
    let mut receiver = FrontLogic::new();

    let mut now_ms: u64 = 0;
    for _ in 0..16 {
        if sender.is_received_by_remote() {
            break;
        }
        for command in sender.send(Millis::from(now_ms)) {
            receiver.receive(&command).expect("receive");
        }
        let answer = receiver.send().expect("answer");
        sender.receive(&answer).expect("ack");
        now_ms += 50;
    }

    assert!(sender.is_received_by_remote());
    assert_eq!(receiver.blob().expect("blob complete"), blob.as_slice());
}

#[test_log::test]
fn lost_chunk_is_resent_after_resend_period() {
    let blob = example_blob();
    let mut sender = OutLogicFront::new(
        TransferId(7),
        CHUNK_SIZE,
        MillisDuration::from_millis(100),
        &blob,
    )
    .expect("transfer should start");
    let mut receiver = FrontLogic::new();

    let mut now_ms: u64 = 0;

    // Handshake.
    for command in sender.send(Millis::from(now_ms)) {
        receiver.receive(&command).expect("start");
    }
    let ack = receiver.send().expect("ack start");
    sender.receive(&ack).expect("ack");

    // First chunk burst: drop chunk index 1.
    let chunks = sender.send(Millis::from(now_ms));
    assert!(!chunks.is_empty());
    for command in chunks {
        let dropped = matches!(
            &command,
            SenderToReceiverFrontCommands::SetChunk(set_chunk) if set_chunk.data.chunk_index == 1
        );
        if !dropped {
            receiver.receive(&command).expect("receive");
        }
    }
    let ack = receiver.send().expect("progress");
    sender.receive(&ack).expect("ack");
    assert!(!sender.is_received_by_remote());

    // Before the resend period nothing is due.
    now_ms += 10;
    assert!(sender.send(Millis::from(now_ms)).is_empty());

    // After the resend period the missing chunk goes out again.
    now_ms += 200;
    let resent = sender.send(Millis::from(now_ms));
    assert!(resent
        .iter()
        .any(|command| matches!(command, SenderToReceiverFrontCommands::SetChunk(set_chunk) if set_chunk.data.chunk_index == 1)));
    for command in resent {
        receiver.receive(&command).expect("receive resend");
    }
    let ack = receiver.send().expect("final ack");
    sender.receive(&ack).expect("ack");

    assert!(sender.is_received_by_remote());
    assert_eq!(receiver.blob().expect("blob complete"), blob.as_slice());
}
