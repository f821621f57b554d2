//! # Frame Cycle Verification Tests
//!
//! These tests verify the allocator contracts end to end:
//!
//! 1. **Pool**: exhaustion, LIFO slot reuse, constructor forwarding
//! 2. **Arena**: bump accounting and release
//! 3. **Frame strings**: empty invariant, move vs copy, concatenation, equality
//! 4. **Frame**: one full cycle of transient text followed by a reset
//!
//! Run with: cargo test --test frame_cycle_verification -- --nocapture

use kiln_core::{FrameString, LinearAllocator, MemoryError, PoolAllocator, StringArena};

// ============================================================================
// POOL ALLOCATOR
// ============================================================================

#[derive(Debug, PartialEq)]
struct Body {
    id: i32,
    layer: i32,
    flags: i32,
    mass: f64,
    drag: f32,
}

#[test]
fn verify_pool_exhaustion() {
    const CAPACITY: usize = 32;
    let mut pool: PoolAllocator<Body> = PoolAllocator::new(CAPACITY).unwrap();

    for i in 0..CAPACITY {
        assert!(pool.has_free());
        let id = i32::try_from(i).unwrap();
        pool.create(Body { id, layer: 0, flags: 0, mass: 1.0, drag: 0.0 })
            .unwrap();
    }

    assert!(!pool.has_free());
    let mut constructed = false;
    let result = pool.create_with(|| {
        constructed = true;
        Body { id: -1, layer: 0, flags: 0, mass: 0.0, drag: 0.0 }
    });
    assert_eq!(result.unwrap_err(), MemoryError::PoolExhausted { capacity: CAPACITY });
    assert!(!constructed);
    assert_eq!(pool.live_count(), CAPACITY);
}

#[test]
fn verify_pool_reuses_last_released_slot() {
    let mut pool: PoolAllocator<Body> = PoolAllocator::new(2).unwrap();

    let a = pool.create(Body { id: 1, layer: 0, flags: 0, mass: 1.0, drag: 0.0 }).unwrap();
    let b = pool.create(Body { id: 2, layer: 0, flags: 0, mass: 1.0, drag: 0.0 }).unwrap();
    let a_address = pool.get(a).unwrap() as *const Body;
    let b_address = pool.get(b).unwrap() as *const Body;
    assert_ne!(a_address, b_address);

    pool.release(a).unwrap();
    let c = pool.create(Body { id: 3, layer: 0, flags: 0, mass: 1.0, drag: 0.0 }).unwrap();

    assert_eq!(pool.get(c).unwrap() as *const Body, a_address);
    assert_eq!(pool.get(c).unwrap().id, 3);
    assert_eq!(pool.get(b).unwrap().id, 2);
}

#[test]
fn verify_pool_forwards_constructor_arguments() {
    let mut pool: PoolAllocator<Body> = PoolAllocator::new(1).unwrap();

    let h = pool
        .create_with(|| Body { id: 1, layer: 2, flags: 3, mass: 10.4, drag: 15.4 })
        .unwrap();
    let body = pool.get(h).unwrap();
    assert_eq!(body.id, 1);
    assert_eq!(body.layer, 2);
    assert_eq!(body.flags, 3);
    assert_eq!(body.mass, 10.4);
    assert_eq!(body.drag, 15.4_f32);
}

// ============================================================================
// LINEAR ALLOCATOR
// ============================================================================

#[test]
fn verify_arena_bump_accounting() {
    let mut arena = LinearAllocator::new(16).unwrap();

    arena.allocate(4).unwrap();
    assert!(!arena.has_free_for(16));
    assert!(arena.has_free_for(12));

    arena.create::<i32>(5).unwrap();
    assert!(arena.has_free_for(8));

    arena.allocate(8).unwrap();
    assert!(!arena.has_free());
    assert!(matches!(arena.allocate(1), Err(MemoryError::ArenaExhausted { .. })));

    arena.release();
    assert!(arena.has_free_for(16));
}

#[test]
fn verify_arena_release_restores_capacity() {
    let mut arena = LinearAllocator::new(256).unwrap();

    for _ in 0..3 {
        arena.alloc_slice::<u64>(32).unwrap().fill(7);
        assert!(!arena.has_free());
        arena.release();
        assert!(arena.has_free_for(256));
    }
    assert_eq!(arena.stats().releases, 3);
}

// ============================================================================
// FRAME STRINGS
// ============================================================================

#[test]
fn verify_empty_string_invariant() {
    let arena = LinearAllocator::new(64).unwrap();
    let strings = StringArena::new(&arena);

    let samples = [
        FrameString::default(),
        strings.make_string("").unwrap(),
        strings.concat("", "").unwrap(),
        strings.make_string("a").unwrap(),
        strings.concat("a", "").unwrap(),
    ];
    for sample in &samples {
        assert_eq!(sample.as_ptr().is_null(), sample.is_empty());
        assert_eq!(sample.is_empty(), sample.len() == 0);
    }
    assert_eq!(samples[0], samples[1]);
}

#[test]
fn verify_move_versus_copy() {
    let arena = LinearAllocator::new(64).unwrap();
    let strings = StringArena::new(&arena);

    let mut first = strings.make_string("frame text").unwrap();
    let (address, length) = (first.as_ptr(), first.len());

    let moved = first.take();
    assert!(first.as_ptr().is_null());
    assert_eq!(first.len(), 0);
    assert_eq!((moved.as_ptr(), moved.len()), (address, length));

    let copied = strings.copy(&moved).unwrap();
    assert_eq!(copied, moved);
    assert_ne!(copied.as_ptr(), moved.as_ptr());
    assert_eq!(moved, "frame text");
}

#[test]
fn verify_concatenation() {
    let arena = LinearAllocator::new(64).unwrap();
    let strings = StringArena::new(&arena);

    let s1 = strings.make_string("thisa").unwrap();
    let s2 = strings.make_string("THISA").unwrap();

    assert_eq!(strings.concat(&s1, &s2).unwrap(), "thisaTHISA");
    assert_eq!(strings.concat("THISA", &s1).unwrap(), "THISAthisa");
    assert_eq!(s1, "thisa");
    assert_eq!(s2, "THISA");
}

#[test]
fn verify_cross_type_equality() {
    let arena = LinearAllocator::new(64).unwrap();
    let strings = StringArena::new(&arena);

    let owned = String::from("this is a string.");
    let frame = strings.make_string("this is a string.").unwrap();

    assert!(owned == frame);
    assert!(frame == owned);
}

// ============================================================================
// FULL FRAME
// ============================================================================

#[test]
fn verify_single_frame_of_transient_text() {
    let mut arena = LinearAllocator::new(1024).unwrap();

    {
        let strings = StringArena::new(&arena);
        let title = strings.make_string("Water Simulation").unwrap();
        let line = strings.concat(&title, " | ").unwrap();
        let line = strings.concat(&line, "Grid 256x256").unwrap();
        let line = strings.concat(&line, " | Frame 42").unwrap();

        assert_eq!(line.as_bytes(), b"Water Simulation | Grid 256x256 | Frame 42");
        assert!(arena.used() < 1024);
    }

    arena.release();
    assert!(arena.has_free_for(1024));
}
