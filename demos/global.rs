use knalloc::global;

// Run with RUST_LOG=debug to see the dump() records.
fn main() {
    env_logger::init();

    global::initialize().expect("sentinel allocation failed");

    let sizes = [24, 512, 4000];
    let mut addresses = Vec::new();

    for size in sizes {
        let address = global::malloc(size);
        assert!(!address.is_null());
        println!("malloc({size}) = {address:?}");
        addresses.push(address);
    }

    println!("Free list with three blocks handed out:");
    global::dump();

    for address in addresses {
        unsafe { global::free(address) };
    }

    println!("Free list after everything came back:");
    global::dump();

    global::terminate().unwrap();
}
