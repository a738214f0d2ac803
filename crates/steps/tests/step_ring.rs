/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_steps::{StepId, StepRing, StepRingError};
use tick_id::TickId;

#[test_log::test]
fn append_and_pop_keeps_ids_consecutive() {
    let mut ring = StepRing::new(TickId(10));
    ring.append(TickId(10), "a").expect("first append");
    ring.append(TickId(11), "b").expect("second append");

    assert_eq!(ring.len(), 2);
    assert_eq!(ring.expected_read_id(), TickId(10));
    assert_eq!(ring.expected_write_id(), TickId(12));

    let (step_id, item) = ring.pop().expect("should have a step");
    assert_eq!(step_id, TickId(10));
    assert_eq!(item, "a");
    assert_eq!(ring.expected_read_id(), TickId(11));
}

#[test_log::test]
fn out_of_order_append_is_rejected() {
    let mut ring = StepRing::new(TickId(0));
    ring.append(TickId(0), 1u8).expect("append");

    let err = ring.append(TickId(2), 2u8).expect_err("gap must fail");
    assert_eq!(
        err,
        StepRingError::UnexpectedStepId {
            expected: TickId(1),
            encountered: TickId(2),
        }
    );

    // The ring is unchanged after a rejected append.
    assert_eq!(ring.len(), 1);
    assert_eq!(ring.expected_write_id(), TickId(1));
}

#[test_log::test]
fn full_ring_rejects_instead_of_dropping() {
    let mut ring = StepRing::with_capacity(TickId(0), 3);
    for index in 0u32..3 {
        ring.append(TickId(index), index).expect("append");
    }

    let err = ring.append(TickId(3), 3).expect_err("must be full");
    assert_eq!(err, StepRingError::RingIsFull { capacity: 3 });
}

#[test_log::test]
fn discard_advances_read_cursor() {
    let mut ring = StepRing::new(TickId(100));
    for index in 0u32..5 {
        ring.append(TickId(100 + index), index).expect("append");
    }

    ring.discard_count(3).expect("discard");
    assert_eq!(ring.expected_read_id(), TickId(103));
    assert_eq!(ring.len(), 2);
    assert_eq!(ring.read_first(), Some((TickId(103), &3)));

    let err = ring.discard_count(5).expect_err("too many");
    assert_eq!(
        err,
        StepRingError::DiscardingMoreThanAvailable {
            requested: 5,
            available: 2,
        }
    );
}

#[test_log::test]
fn re_init_restarts_both_cursors() {
    let mut ring = StepRing::new(TickId(0));
    ring.append(TickId(0), 0u8).expect("append");
    ring.re_init(TickId(0x10));

    assert!(ring.is_empty());
    assert_eq!(ring.expected_read_id(), TickId(0x10));
    assert_eq!(ring.expected_write_id(), TickId(0x10));
    ring.append(TickId(0x10), 1u8).expect("append after re_init");
}

#[test_log::test]
fn iter_from_clamps_to_stored_range() {
    let mut ring: StepRing<u32> = StepRing::new(TickId(20));
    for index in 0u32..4 {
        ring.append(TickId(20 + index), index).expect("append");
    }

    let collected: Vec<(StepId, u32)> = ring
        .iter_from(TickId(22))
        .map(|(step_id, item)| (step_id, *item))
        .collect();
    assert_eq!(collected, vec![(TickId(22), 2), (TickId(23), 3)]);

    // Requests before the read cursor start at the oldest stored step.
    let clamped: Vec<StepId> = ring.iter_from(TickId(0)).map(|(step_id, _)| step_id).collect();
    assert_eq!(clamped.first(), Some(&TickId(20)));
    assert_eq!(clamped.len(), 4);
}
