use super::*;

impl<R: Backend> Heap<R> {
	/// Release the blob at `ptr`.
	///
	/// The block is spliced into the free list and coalesced with any
	/// physically adjacent free neighbour. Freeing an already-free blob is
	/// a no-op.
	pub fn free(&mut self, ptr: u64) -> IoResult<()> {
		log::trace!("free({ptr});");

		let block = self.checked_block(ptr)?;
		let tag = self.tag_at(block)?;
		if tag.is_free() {
			return Ok(());
		}

		// Nearest free neighbours in list order: the highest free block
		// below us and the lowest one above us.
		let mut prev = 0;
		let mut next = 0;
		let mut cur = self.first_free;
		while cur != 0 {
			if cur < block {
				prev = cur;
			}
			if cur > block {
				next = cur;
				break;
			}
			cur = self.free_next(cur)?;
		}

		let size = tag.size();
		self.file.encode_at(block, &Tag::free(size))?;
		self.file.encode(&prev)?;
		self.file.encode(&next)?;
		self.file.encode_at(block + TAG_SIZE + size, &Tag::free(size))?;

		if prev != 0 {
			self.set_free_next(prev, block)?;
		}
		if next != 0 {
			self.set_free_prev(next, block)?;
		}
		if self.first_free == 0 || self.first_free > block {
			self.first_free = block;
		}

		// Coalesce rightward first, so `block` stays valid for the second
		// merge.
		if next != 0 {
			self.merge(block, next)?;
		}
		if prev != 0 {
			self.merge(prev, block)?;
		}
		Ok(())
	}

	/// Merge two free blocks into one, if both are free and physically
	/// adjacent; otherwise do nothing.
	fn merge(&mut self, left: u64, right: u64) -> IoResult<()> {
		let left_tag = self.tag_at(left)?;
		let right_tag = self.tag_at(right)?;

		if !left_tag.is_free() || !right_tag.is_free() {
			return Ok(());
		}
		if left + 2 * TAG_SIZE + left_tag.size() != right {
			return Ok(());
		}

		let merged = left_tag.size() + right_tag.size() + 2 * TAG_SIZE;
		let next = self.free_next(right)?;
		log::debug!("merge: left={left}, right={right}, merged={merged}");

		self.file.encode_at(left, &Tag::free(merged))?;
		self.set_free_next(left, next)?;
		self.file.encode_at(left + TAG_SIZE + merged, &Tag::free(merged))?;

		if next != 0 {
			self.set_free_prev(next, left)?;
		}
		Ok(())
	}
}
