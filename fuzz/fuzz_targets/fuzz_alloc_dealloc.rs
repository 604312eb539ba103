#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use range_indexer::RangeAllocator;

#[derive(Arbitrary, Debug)]
enum Op {
    Alloc(u16),
    DeallocLive(u8),
    DeallocRaw(u64),
}

#[derive(Arbitrary, Debug)]
struct Input {
    start: u64,
    length: u32,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut alloc = match RangeAllocator::create(input.start, u64::from(input.length)) {
        Ok(a) => a,
        Err(_) => return,
    };
    let mut live = Vec::new();

    for op in input.ops.into_iter().take(512) {
        match op {
            Op::Alloc(length) => {
                if let Ok(start) = alloc.alloc(u64::from(length)) {
                    live.push(start);
                }
            }
            Op::DeallocLive(pick) if !live.is_empty() => {
                let start = live.swap_remove(pick as usize % live.len());
                alloc.dealloc(start).unwrap();
            }
            Op::DeallocLive(_) => {}
            Op::DeallocRaw(start) => {
                // Either a live start (then forget it) or a no-op
                if alloc.dealloc(start).is_ok() {
                    live.retain(|&s| s != start);
                }
            }
        }
        alloc.check_invariants().unwrap();
    }

    assert_eq!(alloc.allocation_count(), live.len());
});
