#![cfg(not(feature = "loom"))]

use recring::{frame_len, status_code, Error, HeapRegion, PeekFlags, RingBuffer};

#[test]
fn basic_single_thread_roundtrip() {
    let backing = HeapRegion::new_zeroed(1024);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(1024).expect("ring");

    rb.push(b"hello", &region).expect("push");

    let mut out = [0u8; 5];
    let len = rb.pop(&mut out, &region).expect("pop");
    assert_eq!(len, 5);
    assert_eq!(&out, b"hello");
}

#[test]
fn fifo_across_every_payload_size() {
    let backing = HeapRegion::new_zeroed(256);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(256).unwrap();
    let mut out = vec![0u8; rb.max_payload()];

    // Two records in flight at a time so every size also lands across the
    // wrap boundary at some point.
    let mut pending = std::collections::VecDeque::new();
    for size in 0..=rb.max_payload() / 2 {
        let payload: Vec<u8> = (0..size).map(|i| (i * 7 + size) as u8).collect();
        while rb.push(&payload, &region) == Err(Error::Full) {
            let expected: Vec<u8> = pending.pop_front().unwrap();
            let len = rb.pop(&mut out, &region).unwrap();
            assert_eq!(&out[..len], &expected[..]);
        }
        pending.push_back(payload);
    }
    while let Some(expected) = pending.pop_front() {
        let len = rb.pop(&mut out, &region).unwrap();
        assert_eq!(&out[..len], &expected[..]);
    }

    assert_eq!(rb.pop(&mut out, &region), Err(Error::Empty));
    assert_eq!(rb.occupied(), 0);
}

#[test]
fn largest_record_fills_the_ring() {
    let backing = HeapRegion::new_zeroed(128);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(128).unwrap();
    let mut out = vec![0u8; 128];

    for round in 0..4u8 {
        let payload = vec![round; rb.max_payload()];
        rb.push(&payload, &region).unwrap();
        assert_eq!(rb.available(), 0);
        assert_eq!(rb.push(&[], &region), Err(Error::Full));

        let len = rb.pop(&mut out, &region).unwrap();
        assert_eq!(&out[..len], &payload[..]);
    }
}

#[test]
fn full_never_corrupts_unread_records() {
    let backing = HeapRegion::new_zeroed(64);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(64).unwrap();

    rb.push(&[0xAA; 30], &region).unwrap();
    for size in [27, 30, 40, 56] {
        assert_eq!(rb.push(&vec![0xBB; size], &region), Err(Error::Full));
    }

    let mut out = [0u8; 64];
    let len = rb.pop(&mut out, &region).unwrap();
    assert_eq!(&out[..len], &[0xAA; 30]);
}

#[test]
fn wrap_split_record_is_reassembled() {
    let backing = HeapRegion::new_zeroed(128);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(128).unwrap();
    let mut out = [0u8; 128];

    // Leave the cursors 24 bytes before the end.
    rb.push(&[0u8; 96], &region).unwrap();
    rb.pop(&mut out, &region).unwrap();
    assert_eq!(rb.status().cons_tail, frame_len(96) as u64);

    let payload: Vec<u8> = (0..60).collect();
    rb.push(&payload, &region).unwrap();

    let record = rb.peek(PeekFlags::empty(), &region).unwrap();
    let (first, second) = record.as_slices();
    assert_eq!(first.len(), 16);
    assert_eq!(second.len(), 44);
    assert_eq!([first, second].concat(), payload);
    drop(record);

    rb.push(&payload, &region).unwrap();
    let len = rb.pop(&mut out, &region).unwrap();
    assert_eq!(&out[..len], &payload[..]);
}

#[test]
fn contiguous_peek_falls_back_to_pop() {
    let backing = HeapRegion::new_zeroed(64);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(64).unwrap();
    let mut out = [0u8; 64];

    rb.push(&[0u8; 40], &region).unwrap();
    rb.pop(&mut out, &region).unwrap();
    rb.push(b"split across the end", &region).unwrap();

    let err = rb.peek(PeekFlags::CONTIGUOUS, &region).unwrap_err();
    assert_eq!(err, Error::Fragmented { len: 20 });
    assert_eq!(status_code::<()>(&Err(err)), -2);

    let len = rb.pop(&mut out, &region).unwrap();
    assert_eq!(&out[..len], b"split across the end");
}

#[test]
fn buffer_too_small_keeps_the_record() {
    let backing = HeapRegion::new_zeroed(256);
    let region = backing.region();
    let rb = RingBuffer::with_capacity(256).unwrap();

    rb.push(&[5u8; 100], &region).unwrap();
    rb.push(&[6u8; 10], &region).unwrap();

    let mut small = [0u8; 99];
    let result = rb.pop(&mut small, &region);
    assert_eq!(result, Err(Error::BufferTooSmall { needed: 100 }));
    assert_eq!(status_code(&result), -2);

    let mut out = [0u8; 100];
    assert_eq!(rb.pop(&mut out, &region), Ok(100));
    assert_eq!(out, [5u8; 100]);
    assert_eq!(rb.pop(&mut out, &region), Ok(10));
}

#[test]
fn control_block_and_storage_in_separate_regions() {
    let control = HeapRegion::new_zeroed(1024);
    let backing = HeapRegion::new_zeroed(512);
    let region = backing.region();

    let producer_view =
        unsafe { RingBuffer::init_in(control.region(), 0, recring::Config::new(512)) }.unwrap();
    let consumer_view = unsafe { RingBuffer::attach(control.region(), 0) }.unwrap();

    for i in 0..100u32 {
        producer_view.push(&i.to_le_bytes(), &region).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(consumer_view.pop(&mut out, &region), Ok(4));
        assert_eq!(u32::from_le_bytes(out), i);
    }
    assert_eq!(producer_view.occupied(), 0);
}
