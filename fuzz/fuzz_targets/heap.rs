#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use pballoc::{Flags, Heap};

// Drive an op stream over an in-memory medium and verify the structure
// afterwards. Every two input bytes select an operation and its argument.
fuzz_target!(|data: Vec<u8>| {
	let mut heap = Heap::new(Cursor::new(Vec::new())).unwrap();
	heap.init(Flags::DYNAMIC).unwrap();

	let mut live = Vec::new();
	for op in data.chunks_exact(2) {
		match op[0] % 4 {
			0 | 1 => {
				if let Some(ptr) = heap.alloc(op[1] as u64 + 1).unwrap() {
					live.push(ptr.get());
				}
			}
			2 => {
				if !live.is_empty() {
					let ptr = live.swap_remove(op[1] as usize % live.len());
					heap.free(ptr).unwrap();
				}
			}
			_ => {
				let _ = heap.blob_next(op[1] as u64);
			}
		}
	}
	heap.check().unwrap();
});
