#![no_main]

use coinwire::core::BufferReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz the binary reader - bounds errors are fine, panics are not
    let mut reader = BufferReader::new(data);
    let _ = reader.read_varint();
    let _ = reader.read_var_bytes(1 << 20);
    let _ = reader.read_var_string(1 << 10);
    let _ = reader.read_u64();
    let _ = reader.read_null_string();
});
