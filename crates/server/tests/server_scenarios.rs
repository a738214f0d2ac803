/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
mod support;

use lockstep_participant::ParticipantId;
use lockstep_protocol::prelude::*;
use lockstep_server::prelude::*;
use lockstep_steps::step::Step;
use monotonic_time_rs::Millis;
use support::{parse_reply, small_setup, ClientSession, TestTransport};
use tick_id::TickId;

#[test_log::test]
fn single_player_happy_path() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0x10), Millis::from(0))
        .expect("re-init with snapshot");

    let mut client = ClientSession::new();
    server.connection_connected(0).expect("connect slot 0");

    let replies = server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join should succeed");
    assert_eq!(replies.len(), 1);
    let commands = parse_reply(&replies[0]);
    let ServerToClientCommands::JoinGame(accepted) = &commands[0] else {
        panic!("expected join game accepted, got {:?}", commands[0]);
    };
    assert_eq!(accepted.participants.len(), 1);
    assert_eq!(accepted.participants[0].participant_id, ParticipantId(1));
    assert_eq!(
        server.transport_connection(0).expect("slot exists").phase,
        TransportConnectionPhase::InitialStateDetermined
    );

    let replies = server
        .feed(
            0,
            &client.steps(0x10, 0x10, 1, &[&[0, 0, 0, 0]]),
            Millis::from(16),
        )
        .expect("steps should be accepted");

    assert_eq!(server.game().authoritative_steps.len(), 1);
    assert_eq!(
        server.game().authoritative_steps.expected_write_id(),
        TickId(0x11)
    );

    assert_eq!(replies.len(), 1);
    let commands = parse_reply(&replies[0]);
    let ServerToClientCommands::StepRanges(response) = &commands[0] else {
        panic!("expected step ranges, got {:?}", commands[0]);
    };
    assert_eq!(response.ranges.len(), 1);
    assert_eq!(response.ranges[0].start_step_id, TickId(0x10));
    assert_eq!(response.ranges[0].steps.len(), 1);
    assert_eq!(response.header.next_authoritative_step_id, TickId(0x11));

    // The participant's first authoritative step announces the join.
    let first_step = response.ranges[0].steps[0]
        .get(&ParticipantId(1))
        .expect("participant present");
    assert!(matches!(first_step, Step::Joined(_)));
}

#[test_log::test]
fn unknown_command_is_a_soft_error_without_reply() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    // Valid ordered header, bogus command octet.
    let datagram = [0x00, 0x00, 0xFF];
    let replies = server
        .feed(0, &datagram, Millis::from(0))
        .expect("unknown command is not an error");
    assert!(replies.is_empty());
}

#[test_log::test]
fn leftover_octets_are_a_protocol_violation() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    let mut client = ClientSession::new();
    let mut datagram = client.join(1, &[0]);
    datagram.push(0x77); // trailing garbage

    let err = server
        .feed(0, &datagram, Millis::from(0))
        .expect_err("leftover octets must be rejected");
    assert_eq!(err.code(), -25);
}

#[test_log::test]
fn setup_limits_are_enforced() {
    assert!(Server::new(small_setup(65, 1)).is_err());

    let mut step_too_large = small_setup(1, 1);
    step_too_large.max_single_participant_step_octet_count = 25;
    assert!(Server::new(step_too_large).is_err());

    let mut game_state_too_large = small_setup(1, 1);
    game_state_too_large.max_game_state_octet_count = 65 * 1024;
    assert!(Server::new(game_state_too_large).is_err());
}

#[test_log::test]
fn connection_index_and_lifecycle_error_codes() {
    let mut server = Server::new(small_setup(64, 2)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");

    // 65th connection index is rejected before anything is parsed.
    let err = server
        .feed(64, &[0x00, 0x00, 0x01], Millis::from(0))
        .expect_err("index out of range");
    assert_eq!(err.code(), -13);

    server.connection_connected(0).expect("first connect");
    let err = server
        .connection_connected(0)
        .expect_err("double connect must fail");
    assert_eq!(err.code(), -44);

    // Disconnect of a slot that never joined.
    let err = server
        .connection_disconnected(1)
        .expect_err("unknown connection");
    assert_eq!(err.code(), -2);

    // Join, disconnect, then disconnect again: the second one hits the freed
    // participant connection.
    let mut client = ClientSession::new();
    server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join");
    server.connection_disconnected(0).expect("first disconnect");
    let err = server
        .connection_disconnected(0)
        .expect_err("already freed");
    assert_eq!(err.code(), -4);
}

#[test_log::test]
fn re_init_is_equivalent_to_a_fresh_start() {
    let mut server = Server::new(small_setup(2, 2)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0), Millis::from(0))
        .expect("re-init");
    server.connection_connected(0).expect("connect");

    let mut client = ClientSession::new();
    server
        .feed(0, &client.join(0, &[0]), Millis::from(0))
        .expect("join");
    server
        .feed(0, &client.steps(0, 0, 1, &[&[1, 2, 3, 4]]), Millis::from(16))
        .expect("steps");
    assert_eq!(server.game().authoritative_steps.len(), 1);

    server
        .re_init_with_game(&[0xBB], TickId(0x42), Millis::from(32))
        .expect("second re-init");

    assert_eq!(
        server.game().authoritative_steps.expected_write_id(),
        TickId(0x42)
    );
    assert_eq!(server.game().authoritative_steps.len(), 0);
    assert!(server.participant_connection_for(0).is_none());
    assert_eq!(
        server
            .game()
            .latest_snapshot()
            .expect("snapshot present")
            .octets,
        vec![0xBB]
    );
}

#[test_log::test]
fn update_drains_the_transport_and_replies() {
    let mut server = Server::new(small_setup(1, 1)).expect("server setup is valid");
    server
        .re_init_with_game(&[0xAA], TickId(0x10), Millis::from(0))
        .expect("re-init");

    let mut client = ClientSession::new();
    let mut transport = TestTransport::new();
    transport.incoming.push_back((0, client.join(0, &[0])));
    transport
        .incoming
        .push_back((0, client.steps(0x10, 0x10, 1, &[&[0, 0, 0, 0]])));

    // The first datagram on an unused slot connects it implicitly.
    server
        .update(Millis::from(0), &mut transport)
        .expect("update");

    assert!(server.transport_connection(0).expect("slot").is_used);
    assert_eq!(transport.sent.len(), 2);
    let commands = parse_reply(&transport.sent[1].1);
    assert!(matches!(
        commands[0],
        ServerToClientCommands::StepRanges(_)
    ));
}
