use tagalloc::alloc::{check_heap, Allocator, StaticExtender};

const ARENA: usize = 1 << 20;

fn new_allocator() -> Allocator<StaticExtender<ARENA>> {
    let mut alloc = Allocator::new(StaticExtender::<ARENA>::new());
    alloc.init().expect("extender has plenty of room");
    alloc
}

#[test]
fn round_trips_a_single_allocation() {
    let mut alloc = new_allocator();
    let p = alloc.malloc(100);
    assert!(!p.is_null());
    unsafe { p.write_bytes(0xAA, 100) };
    assert_eq!(check_heap(&alloc, false), 0);
    alloc.free(p);
    assert_eq!(check_heap(&alloc, false), 0);
}

#[test]
fn many_allocations_survive_interleaved_frees() {
    let mut alloc = new_allocator();
    let mut ptrs = std::vec::Vec::new();
    for i in 0..64 {
        let p = alloc.malloc(16 + i);
        assert!(!p.is_null());
        ptrs.push(p);
    }
    assert_eq!(check_heap(&alloc, false), 0);

    for (i, p) in ptrs.iter().enumerate() {
        if i % 2 == 0 {
            alloc.free(*p);
        }
    }
    assert_eq!(check_heap(&alloc, false), 0);

    for (i, p) in ptrs.into_iter().enumerate() {
        if i % 2 != 0 {
            alloc.free(p);
        }
    }
    assert_eq!(check_heap(&alloc, false), 0);
}

#[test]
fn realloc_preserves_contents_across_growth() {
    let mut alloc = new_allocator();
    let p = alloc.malloc(64);
    unsafe {
        for i in 0..64u8 {
            *p.add(i as usize) = i;
        }
    }

    let grown = alloc.realloc(p, 5000);
    assert!(!grown.is_null());
    unsafe {
        for i in 0..64u8 {
            assert_eq!(*grown.add(i as usize), i);
        }
    }
    assert_eq!(check_heap(&alloc, false), 0);
    alloc.free(grown);
}

#[test]
fn realloc_shrink_keeps_identity_and_contents() {
    let mut alloc = new_allocator();
    let p = alloc.malloc(400);
    unsafe { p.write_bytes(0x42, 400) };

    let shrunk = alloc.realloc(p, 8);
    assert_eq!(shrunk, p);
    unsafe {
        assert_eq!(*shrunk, 0x42);
    }
    alloc.free(shrunk);
}

#[test]
fn null_handling_matches_malloc_free_realloc_conventions() {
    let mut alloc = new_allocator();

    assert!(alloc.malloc(0).is_null());

    alloc.free(std::ptr::null_mut());

    let p = alloc.realloc(std::ptr::null_mut(), 32);
    assert!(!p.is_null());

    let freed = alloc.realloc(p, 0);
    assert!(freed.is_null());

    let noop = alloc.realloc(std::ptr::null_mut(), -5);
    assert!(noop.is_null());
}

#[test]
fn heap_extends_to_serve_allocations_larger_than_one_chunk() {
    let mut alloc = new_allocator();
    let big = alloc.malloc(500_000);
    assert!(!big.is_null());
    unsafe { big.write_bytes(0x7, 500_000) };
    assert_eq!(check_heap(&alloc, false), 0);
    alloc.free(big);
    assert_eq!(check_heap(&alloc, false), 0);
}

#[test]
fn freeing_in_lifo_order_coalesces_the_whole_run() {
    let mut alloc = new_allocator();
    let a = alloc.malloc(32);
    let b = alloc.malloc(32);
    let c = alloc.malloc(32);
    let d = alloc.malloc(32);

    alloc.free(d);
    alloc.free(c);
    alloc.free(b);
    alloc.free(a);
    assert_eq!(check_heap(&alloc, false), 0);

    let big = alloc.malloc(100);
    assert_eq!(big, a);
}
