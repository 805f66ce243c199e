use std::num::NonZeroU64;

use super::*;
use crate::err;

impl<R: Backend> Heap<R> {
	/// Allocate a blob with at least `size` bytes of payload.
	///
	/// First fit by offset: the lowest free block large enough wins. On a
	/// dynamic medium the file grows by exactly `size + 16` bytes when no
	/// free block fits; on a static one `None` is returned instead. The
	/// payload contents are uninitialized.
	pub fn alloc(&mut self, size: u64) -> IoResult<Option<NonZeroU64>> {
		log::trace!("alloc({size});");

		// Any block must be able to hold the free-list offsets once freed.
		let size = size.max(MIN_PAYLOAD);
		if size > Tag::MAX_SIZE {
			return Err(err!(EINVAL));
		}

		let mut last = 0;
		let mut selected = self.first_free;
		while selected != 0 && self.payload_size(selected)? < size {
			last = selected;
			selected = self.free_next(selected)?;
		}

		if selected == 0 {
			if !self.flags.contains(Flags::DYNAMIC) {
				return Ok(None);
			}
			selected = self.grow(size, last)?;
		}

		let selected_size = self.payload_size(selected)?;
		if selected_size - size > 2 * TAG_SIZE + MIN_PAYLOAD {
			self.split(selected, size)?;
		}

		// The block may have shrunk in the split.
		let size = self.payload_size(selected)?;
		self.unlink(selected)?;
		self.write_tags(selected, Tag::used(size))?;

		Ok(NonZeroU64::new(selected + TAG_SIZE))
	}

	/// Append a fresh free block of exactly `size` payload bytes at the
	/// tail of the medium, linked after `last_free`.
	fn grow(&mut self, size: u64, last_free: u64) -> IoResult<u64> {
		let block = self.medium_size;
		let Some(end) = block.checked_add(2 * TAG_SIZE + size) else {
			return Err(err!(EFBIG));
		};
		log::debug!("grow: block={block}, size={size}");

		let tag = Tag::free(size);
		self.file.encode_at(block, &tag)?;
		self.file.encode(&last_free)?; // prev
		self.file.encode(&0u64)?; // next
		self.file.encode_at(end - TAG_SIZE, &tag)?;

		if last_free != 0 {
			self.set_free_next(last_free, block)?;
		} else {
			self.first_free = block;
		}
		self.medium_size = end;
		Ok(block)
	}

	/// Split `block` so its payload becomes exactly `size` bytes; the
	/// leftover becomes a new free block directly after it.
	fn split(&mut self, block: u64, size: u64) -> IoResult<()> {
		let total = self.payload_size(block)?;
		let right = block + 2 * TAG_SIZE + size;
		let right_size = total - size - 2 * TAG_SIZE;
		log::debug!("split: block={block}, size={size}, right={right}, right_size={right_size}");

		let next = self.free_next(block)?;

		self.write_tags(block, Tag::free(size))?;
		self.set_free_next(block, right)?;

		self.write_tags(right, Tag::free(right_size))?;
		self.set_free_prev(right, block)?;
		self.set_free_next(right, next)?;

		if next != 0 {
			self.set_free_prev(next, right)?;
		}
		Ok(())
	}

	/// Take `block` out of the free list.
	fn unlink(&mut self, block: u64) -> IoResult<()> {
		let prev = self.free_prev(block)?;
		let next = self.free_next(block)?;

		if prev != 0 {
			self.set_free_next(prev, next)?;
		}
		if next != 0 {
			self.set_free_prev(next, prev)?;
		}
		if self.first_free == block {
			self.first_free = next;
		}
		Ok(())
	}
}
