use knalloc::{FreeListAllocator, ALIGNMENT};

fn print_alloc(label: &str, address: *const u8, size: usize) {
    println!("Requested {size} bytes for {label}");
    println!("Received this address: {address:?}");
    println!(
        "Alignment check: {address:?} % {ALIGNMENT} = {}",
        address as usize % ALIGNMENT
    );
}

fn main() {
    env_logger::init();

    let mut allocator = FreeListAllocator::new();
    allocator.initialize().expect("sentinel allocation failed");

    let first = allocator.malloc(1).unwrap();
    print_alloc("first", first.as_ptr(), 1);

    let second = allocator.malloc(1024).unwrap();
    print_alloc("second", second.as_ptr(), 1024);

    let third = allocator.malloc(4096).unwrap();
    print_alloc("third", third.as_ptr(), 4096);

    println!("\nFreeing everything...");
    unsafe {
        allocator.free(Some(first));
        allocator.free(Some(second));
        allocator.free(Some(third));
    }

    println!("\nFree list after coalescing:");
    for record in allocator.records() {
        println!(
            "block {:#x}: {} units, next {:#x}",
            record.address, record.size, record.next
        );
    }

    allocator.terminate().unwrap();
}
