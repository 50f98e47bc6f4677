#![no_main]

use coinwire::merkle::MerkleBlock;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz merkleblock parsing and verification against arbitrary wire bytes
    if let Ok(block) = MerkleBlock::deserialize(data) {
        let _ = block.extract();
        // A successful parse must re-serialize without panicking
        let _ = block.serialize();
    }
});
