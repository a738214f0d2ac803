/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
mod support;

use lockstep_participant::ParticipantId;
use lockstep_server::prelude::*;
use lockstep_steps::step::Step;
use monotonic_time_rs::Millis;
use support::{small_setup, ClientSession};
use tick_id::TickId;

fn feed_step_batch(
    server: &mut Server,
    client: &mut ClientSession,
    connection_index: u8,
    participant_id: u8,
    waiting_for: u32,
    start: u32,
    count: u32,
) {
    let payload: [u8; 4] = [participant_id, 0, 0, 0];
    let payloads: Vec<&[u8]> = (0..count).map(|_| payload.as_slice()).collect();
    server
        .feed(
            connection_index,
            &client.steps(waiting_for, start, participant_id, &payloads),
            Millis::from(u64::from(start)),
        )
        .expect("steps batch accepted");
}

#[test_log::test]
fn backpressure_trims_the_authoritative_buffer() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    let mut client = ClientSession::new();
    server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join");

    // The client never advances its ack, so nothing is ever consumed.
    for batch in 0u32..4 {
        feed_step_batch(&mut server, &mut client, 0, 1, 0, batch * 10, 10);
    }
    assert_eq!(server.game().authoritative_steps.len(), 40);
    assert_eq!(
        server.game().authoritative_steps.expected_read_id(),
        TickId(0)
    );

    // The next incoming step datagram trims down to a third of the window.
    server
        .feed(0, &client.steps(0, 40, 1, &[]), Millis::from(50))
        .expect("empty steps datagram");

    let window_third = server.game().authoritative_steps.capacity() / 3;
    assert_eq!(server.game().authoritative_steps.len(), window_third);
    assert_eq!(
        server.game().authoritative_steps.expected_read_id(),
        TickId(40 - window_third as u32)
    );
    assert_eq!(
        server.game().authoritative_steps.expected_write_id(),
        TickId(40)
    );
}

#[test_log::test]
fn silent_connection_gets_forced_steps_and_goes_unresponsive() {
    let mut server = Server::new(small_setup(2, 2)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect a");
    server.connection_connected(1).expect("connect b");

    let mut client_a = ClientSession::new();
    let mut client_b = ClientSession::new();
    server
        .feed(0, &client_a.join(0, &[0]), Millis::from(0))
        .expect("join a");
    server
        .feed(1, &client_b.join(0, &[0]), Millis::from(0))
        .expect("join b");

    const TICKS: u32 = 15;
    feed_step_batch(&mut server, &mut client_a, 0, 1, 0, 0, TICKS);

    assert_eq!(server.game().authoritative_steps.len(), TICKS as usize);

    let connection_b = server
        .participant_connection_for(1)
        .expect("b's participant connection");
    assert_eq!(connection_b.forced_step_in_row_counter, TICKS);
    assert_eq!(connection_b.state, ConnectionState::Unresponsive);

    let connection_a = server
        .participant_connection_for(0)
        .expect("a's participant connection");
    assert_eq!(connection_a.forced_step_in_row_counter, 0);
    assert_eq!(connection_a.state, ConnectionState::Responsive);

    // Every composed tick has exactly one contribution per participant, and
    // the silent participant's are forced (after the join announcement).
    for (step_id, combined) in server.game().authoritative_steps.iter_from(TickId(0)) {
        assert_eq!(combined.len(), 2, "tick {step_id}");
        let for_b = combined
            .get(&ParticipantId(2))
            .expect("participant 2 present");
        if step_id > TickId(0) {
            assert_eq!(*for_b, Step::Forced, "tick {step_id}");
        }
    }
}

#[test_log::test]
fn snapshot_must_be_provided_after_the_catchup_limit() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    let mut client = ClientSession::new();
    server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join");

    for batch in 0u32..10 {
        feed_step_batch(
            &mut server,
            &mut client,
            0,
            1,
            batch * 8,
            batch * 8,
            8,
        );
    }
    assert_eq!(
        server.game().authoritative_steps.expected_write_id(),
        TickId(80)
    );
    assert!(!server.must_provide_game_state());

    feed_step_batch(&mut server, &mut client, 0, 1, 80, 80, 1);
    assert!(server.must_provide_game_state());

    // Pushing a fresh snapshot clears the condition.
    server
        .set_game_state(TickId(81), &[0xBB])
        .expect("set game state");
    assert!(!server.must_provide_game_state());
}

#[test_log::test]
fn client_fallen_off_the_ring_gets_no_step_ranges() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0x20), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    let mut client = ClientSession::new();
    server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join");
    feed_step_batch(&mut server, &mut client, 0, 1, 0x20, 0x20, 16);

    let before = server
        .transport_connection(0)
        .expect("slot")
        .next_authoritative_step_id_to_send;

    // Waiting for 0x5 while the ring starts at 0x20: no ranges, the client is
    // a candidate for a game state download instead.
    let replies = server
        .feed(0, &client.steps(0x5, 0x30, 1, &[]), Millis::from(100))
        .expect("request is not an error");
    assert!(replies.is_empty());

    // The send cursor never moves backwards.
    let after = server
        .transport_connection(0)
        .expect("slot")
        .next_authoritative_step_id_to_send;
    assert!(after >= before);
}

#[test_log::test]
fn frozen_game_ingests_but_does_not_compose() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    let mut client = ClientSession::new();
    server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join");

    server.game_mut().debug_frozen = true;
    feed_step_batch(&mut server, &mut client, 0, 1, 0, 0, 5);
    assert_eq!(server.game().authoritative_steps.len(), 0);
    assert_eq!(
        server
            .participant_connection_for(0)
            .expect("participant connection")
            .incoming_steps
            .len(),
        5
    );

    server.game_mut().debug_frozen = false;
    feed_step_batch(&mut server, &mut client, 0, 1, 0, 5, 1);
    assert_eq!(server.game().authoritative_steps.len(), 6);
}
