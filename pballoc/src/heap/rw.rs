use super::*;
use crate::err;

impl<R: Backend> Heap<R> {
	/// Read from the blob at `ptr`, starting `offset` bytes into its
	/// payload. Returns the number of bytes read; reads are clamped at the
	/// end of the payload.
	pub fn blob_read(&mut self, ptr: u64, offset: u64, buf: &mut [u8]) -> IoResult<usize> {
		log::trace!("blob_read({ptr}, {offset}, {});", buf.len());
		let block = self.checked_block(ptr)?;
		let size = self.payload_size(block)?;
		if offset > size {
			return Err(err!(EINVAL));
		}

		let num = (buf.len() as u64).min(size - offset) as usize;
		self.file.read_at(ptr + offset, &mut buf[..num])?;
		Ok(num)
	}

	/// Write into the blob at `ptr`, starting `offset` bytes into its
	/// payload. Returns the number of bytes written; a blob never grows,
	/// so writes are clamped at the end of the payload.
	pub fn blob_write(&mut self, ptr: u64, offset: u64, buf: &[u8]) -> IoResult<usize> {
		log::trace!("blob_write({ptr}, {offset}, {});", buf.len());
		let block = self.checked_block(ptr)?;
		let tag = self.tag_at(block)?;
		// A free block's payload holds the free-list offsets.
		if tag.is_free() {
			return Err(err!(EINVAL));
		}
		let size = tag.size();
		if offset > size {
			return Err(err!(EINVAL));
		}

		let num = (buf.len() as u64).min(size - offset) as usize;
		self.file.write_at(ptr + offset, &buf[..num])?;
		Ok(num)
	}
}
