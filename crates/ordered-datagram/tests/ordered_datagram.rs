/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use flood_rs::prelude::{InOctetStream, OutOctetStream};
use lockstep_ordered_datagram::{DatagramOrderInError, OrderedIn, OrderedOut};

fn framed(out: &mut OrderedOut) -> Vec<u8> {
    let mut stream = OutOctetStream::new();
    out.to_stream(&mut stream).expect("write header");
    out.commit();
    stream.octets_ref().to_vec()
}

#[test_log::test]
fn in_order_datagrams_are_accepted() {
    let mut ordered_out = OrderedOut::new();
    let mut ordered_in = OrderedIn::default();

    for _ in 0..4 {
        let datagram = framed(&mut ordered_out);
        let mut in_stream = InOctetStream::new(&datagram);
        let diff = ordered_in
            .read_and_verify(&mut in_stream)
            .expect("in order");
        assert_eq!(diff.inner(), 0);
    }
}

#[test_log::test]
fn duplicate_datagram_is_rejected() {
    let mut ordered_out = OrderedOut::new();
    let mut ordered_in = OrderedIn::default();

    let datagram = framed(&mut ordered_out);
    ordered_in
        .read_and_verify(&mut InOctetStream::new(&datagram))
        .expect("first");

    let result = ordered_in.read_and_verify(&mut InOctetStream::new(&datagram));
    assert!(matches!(
        result,
        Err(DatagramOrderInError::WrongOrder { .. })
    ));
}

#[test_log::test]
fn gaps_are_tolerated_and_counted() {
    let mut ordered_out = OrderedOut::new();
    let mut ordered_in = OrderedIn::default();

    ordered_in
        .read_and_verify(&mut InOctetStream::new(&framed(&mut ordered_out)))
        .expect("first");

    // Drop two datagrams on the floor.
    framed(&mut ordered_out);
    framed(&mut ordered_out);

    let diff = ordered_in
        .read_and_verify(&mut InOctetStream::new(&framed(&mut ordered_out)))
        .expect("later datagram still accepted");
    assert_eq!(diff.inner(), 2);
}

#[test_log::test]
fn reset_allows_a_fresh_handshake() {
    let mut first_session_out = OrderedOut::new();
    let mut ordered_in = OrderedIn::default();

    for _ in 0..3 {
        ordered_in
            .read_and_verify(&mut InOctetStream::new(&framed(&mut first_session_out)))
            .expect("session one");
    }

    // A brand-new client on the same slot starts at sequence zero again.
    let mut second_session_out = OrderedOut::new();
    let replayed = framed(&mut second_session_out);
    assert!(ordered_in
        .read_and_verify(&mut InOctetStream::new(&replayed))
        .is_err());

    ordered_in.reset();
    ordered_in
        .read_and_verify(&mut InOctetStream::new(&replayed))
        .expect("accepted after reset");
}
