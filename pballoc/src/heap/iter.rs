use std::num::NonZeroU64;

use super::*;
use crate::err;

impl<R: Backend> Heap<R> {
	/// Payload size of the blob at `ptr`.
	///
	/// Meaningful only for pointers returned by [`Heap::alloc`] and not
	/// yet freed; a freed pointer reports the free block's payload size.
	pub fn blob_size(&mut self, ptr: u64) -> IoResult<u64> {
		let block = self.checked_block(ptr)?;
		self.payload_size(block)
	}

	/// Pointer to the next allocated blob after `ptr`, skipping free
	/// blocks.
	///
	/// `ptr == 0` starts at the beginning of the medium; `None` marks the
	/// end. The walk is not stable across intervening [`Heap::alloc`] or
	/// [`Heap::free`] calls.
	pub fn blob_next(&mut self, ptr: u64) -> IoResult<Option<NonZeroU64>> {
		if ptr >= self.medium_size {
			return Ok(None);
		}
		let mut pos = if ptr == 0 {
			self.header_size
		} else {
			let block = self.checked_block(ptr)?;
			block + 2 * TAG_SIZE + self.payload_size(block)?
		};

		while pos < self.medium_size {
			let tag: Tag = self.file.decode_at(pos)?;
			if !tag.is_free() {
				return Ok(NonZeroU64::new(pos + TAG_SIZE));
			}
			pos = pos
				.checked_add(2 * TAG_SIZE + tag.size())
				.ok_or_else(|| err!(EIO))?;
		}
		Ok(None)
	}

	/// Call `f` for every allocated blob in medium order, with its pointer
	/// and payload size. A `Some` return stops the walk early and is
	/// passed back to the caller.
	pub fn blob_iter<T>(
		&mut self,
		mut f: impl FnMut(NonZeroU64, u64) -> Option<T>,
	) -> IoResult<Option<T>> {
		let mut ptr = 0;
		while let Some(p) = self.blob_next(ptr)? {
			let size = self.blob_size(p.get())?;
			if let Some(t) = f(p, size) {
				return Ok(Some(t));
			}
			ptr = p.get();
		}
		Ok(None)
	}
}

#[cfg(test)]
mod t {
	use std::io::Cursor;

	use super::*;

	fn fresh_static(len: usize) -> Heap<Cursor<Vec<u8>>> {
		let mut heap = Heap::new(Cursor::new(vec![0u8; len])).unwrap();
		heap.init(Flags::empty()).unwrap();
		heap
	}

	#[test]
	fn walk_skips_free_blocks() {
		let mut heap = fresh_static(1 << 12);
		let a = heap.alloc(32).unwrap().unwrap().get();
		let b = heap.alloc(32).unwrap().unwrap().get();
		let c = heap.alloc(32).unwrap().unwrap().get();
		heap.free(b).unwrap();

		assert_eq!(heap.blob_next(0).unwrap().unwrap().get(), a);
		assert_eq!(heap.blob_next(a).unwrap().unwrap().get(), c);
		assert_eq!(heap.blob_next(c).unwrap(), None);
	}

	#[test]
	fn empty_heap_has_nothing_to_visit() {
		let mut heap = fresh_static(1 << 12);
		assert_eq!(heap.blob_next(0).unwrap(), None);
		assert_eq!(heap.blob_iter(|_, _| None::<()>).unwrap(), None);
	}

	#[test]
	fn iter_reports_sizes_and_stops_early() {
		let mut heap = fresh_static(1 << 12);
		let a = heap.alloc(24).unwrap().unwrap().get();
		let _b = heap.alloc(48).unwrap().unwrap().get();

		let mut seen = Vec::new();
		heap.blob_iter(|ptr, size| {
			seen.push((ptr.get(), size));
			None::<()>
		})
		.unwrap();
		assert_eq!(seen, [(a, 24), (_b, 48)]);

		let hit = heap.blob_iter(|ptr, _| (ptr.get() == a).then_some(ptr)).unwrap();
		assert_eq!(hit.unwrap().get(), a);
	}
}
