use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use pballoc::{Flags, Heap};
use tempfile::TempDir;

fn churn(c: &mut Criterion) {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("bench.pba");
	let mut heap = Heap::open(&path, Flags::DYNAMIC).unwrap();
	heap.init(Flags::DYNAMIC).unwrap();

	c.bench_function("alloc_free", |b| {
		b.iter(|| {
			let p = heap.alloc(black_box(64)).unwrap().unwrap().get();
			heap.free(p).unwrap();
		})
	});
}

fn open(c: &mut Criterion) {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("bench.pba");
	let mut heap = Heap::open(&path, Flags::DYNAMIC).unwrap();
	heap.init(Flags::DYNAMIC).unwrap();
	for _ in 0..1000 {
		heap.alloc(64).unwrap().unwrap();
	}
	heap.close().unwrap();

	// Opening scans the block chain for the first free block.
	c.bench_function("open_1000_blobs", |b| {
		b.iter(|| {
			let heap = Heap::open(&path, Flags::empty()).unwrap();
			black_box(heap);
		})
	});
}

fn iterate(c: &mut Criterion) {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("bench.pba");
	let mut heap = Heap::open(&path, Flags::DYNAMIC).unwrap();
	heap.init(Flags::DYNAMIC).unwrap();
	for _ in 0..1000 {
		heap.alloc(64).unwrap().unwrap();
	}

	c.bench_function("iterate_1000_blobs", |b| {
		b.iter(|| {
			let mut count = 0u64;
			heap.blob_iter(|_, _| {
				count += 1;
				None::<()>
			})
			.unwrap();
			black_box(count);
		})
	});
}

criterion_group!(benches, churn, open, iterate);
criterion_main!(benches);
