use std::{
	fs::File,
	io::{ErrorKind, Result as IoResult},
	path::Path,
};

mod alloc;
mod free;
mod iter;
mod rw;

use crate::{
	data::{Flags, Info, Tag, HEADER_SIZE, MAGIC, MIN_MEDIUM, MIN_PAYLOAD, OFFSET_SIZE, TAG_SIZE},
	decoder::Decoder,
	medium::{self, Backend},
};

/// (INTERNAL) Constructs an [`std::io::Error`] from an `errno`.
#[macro_export]
macro_rules! err {
	($name:ident) => {
		::std::io::Error::from_raw_os_error(::libc::$name)
	};
}

macro_rules! iobail {
	($kind:expr, $($tk:tt)+) => {
		return Err(::std::io::Error::new($kind, format!($($tk)+)))
	};
}

/// A persistent blob heap over a seekable medium.
///
/// The handle caches `{flags, header_size, first_free, medium_size}`; all
/// of it is recomputable from the medium, so dropping the handle loses
/// nothing. One handle per medium, exclusive access assumed.
pub struct Heap<R: Backend> {
	file:        Decoder<R>,
	flags:       Flags,
	header_size: u64,
	first_free:  u64,
	medium_size: u64,
}

impl Heap<File> {
	/// Open (creating if absent) the heap medium at `path`.
	///
	/// `flags` only affect how the file is opened; the structural flags of
	/// an initialized medium are read from its header. Follow up with
	/// [`Heap::init`] to establish the structure on a fresh medium.
	pub fn open(path: &Path, flags: Flags) -> IoResult<Self> {
		log::trace!("open({path:?}, {flags:?});");
		let file = medium::open_file(path, flags)?;
		Self::new(file)
	}
}

impl<R: Backend> Heap<R> {
	/// Wrap an already-open medium.
	///
	/// Reads the header if one is present and precaches the first free
	/// block by scanning the block chain from the start.
	pub fn new(inner: R) -> IoResult<Self> {
		let mut file = Decoder::new(inner);
		let medium_size = file.size()?;

		let mut flags = Flags::empty();
		let mut initialized = false;
		if medium_size >= HEADER_SIZE {
			let mut magic = [0u8; 4];
			file.read_at(0, &mut magic)?;
			if magic == MAGIC {
				let bits: u32 = file.decode()?;
				flags = Flags::from_bits_retain(bits);
				if flags.contains(Flags::EXTENDED) {
					iobail!(
						ErrorKind::Unsupported,
						"incompatible medium: unknown extended header"
					);
				}
				initialized = true;
			}
		}

		let mut heap = Self {
			file,
			flags,
			header_size: HEADER_SIZE,
			first_free: 0,
			medium_size,
		};
		if initialized {
			heap.first_free = heap.scan_first_free()?;
			log::debug!(
				"new: flags={:?}, medium_size={}, first_free={}",
				heap.flags,
				heap.medium_size,
				heap.first_free
			);
		}
		Ok(heap)
	}

	/// Establish the medium structure, or validate it if already present.
	///
	/// On an initialized medium this is a no-op and `flags` are ignored:
	/// the persisted flags win. An uninitialized medium smaller than the
	/// minimum usable size is grown only when `flags` contain
	/// [`Flags::DYNAMIC`].
	pub fn init(&mut self, flags: Flags) -> IoResult<()> {
		log::trace!("init({flags:?});");
		if flags.contains(Flags::EXTENDED) {
			iobail!(ErrorKind::Unsupported, "extended headers are not supported");
		}

		let mut size = self.file.size()?;

		if size < HEADER_SIZE {
			if !flags.contains(Flags::DYNAMIC) {
				iobail!(
					ErrorKind::InvalidInput,
					"incompatible medium: {size} bytes and not dynamic"
				);
			}
			// The header write below extends the medium.
			size = HEADER_SIZE;
		} else {
			let mut magic = [0u8; 4];
			self.file.read_at(0, &mut magic)?;
			if magic == MAGIC {
				return Ok(());
			}
		}

		// A medium strictly between a bare header and the smallest usable
		// size cannot hold a block; round it up.
		if size > HEADER_SIZE && size < MIN_MEDIUM {
			if !flags.contains(Flags::DYNAMIC) {
				iobail!(
					ErrorKind::InvalidInput,
					"incompatible medium: {size} bytes and not dynamic"
				);
			}
			self.file.fill_at(size, 0, MIN_MEDIUM - size)?;
			size = MIN_MEDIUM;
		}

		let persisted = flags.persisted();
		self.file.write_at(0, &MAGIC)?;
		self.file.encode(&persisted.bits())?;

		// One free block spanning the remainder, if there is one.
		if size >= MIN_MEDIUM {
			let tag = Tag::free(size - HEADER_SIZE - 2 * TAG_SIZE);
			self.file.encode_at(HEADER_SIZE, &tag)?;
			self.file.encode(&0u64)?; // prev
			self.file.encode(&0u64)?; // next
			self.file.encode_at(size - TAG_SIZE, &tag)?;
			self.first_free = HEADER_SIZE;
		} else {
			self.first_free = 0;
		}

		self.flags = persisted;
		self.medium_size = size;
		Ok(())
	}

	/// Flush and drop the handle. The medium itself is left as-is.
	pub fn close(mut self) -> IoResult<()> {
		self.file.inner_mut().flush()
	}

	/// Flags the medium was initialized with.
	pub fn flags(&self) -> Flags {
		self.flags
	}

	/// Current size of the medium in bytes.
	pub fn medium_size(&self) -> u64 {
		self.medium_size
	}

	/// Medium statistics.
	pub fn info(&mut self) -> IoResult<Info> {
		let mut info = Info {
			size: self.medium_size,
			blobs: 0,
			used: 0,
			free_blocks: 0,
			free: 0,
			largest_free: 0,
			dynamic: self.flags.contains(Flags::DYNAMIC),
		};

		let mut pos = self.header_size;
		while pos < self.medium_size {
			let tag: Tag = self.file.decode_at(pos)?;
			if tag.is_free() {
				info.free_blocks += 1;
				info.free += tag.size();
				info.largest_free = info.largest_free.max(tag.size());
			} else {
				info.blobs += 1;
				info.used += tag.size();
			}
			pos = pos
				.checked_add(2 * TAG_SIZE + tag.size())
				.ok_or_else(|| err!(EIO))?;
		}
		Ok(info)
	}

	/// Verify the on-medium structure end to end: tag pairing, tiling,
	/// the coalescing invariant, free-list order and linkage, and the
	/// cached first-free offset.
	pub fn check(&mut self) -> IoResult<()> {
		macro_rules! ensure {
			($e:expr, $($tk:tt)+) => {
				if !($e) {
					log::error!($($tk)+);
					return Err(err!(EIO));
				}
			};
		}

		let mut magic = [0u8; 4];
		self.file.read_at(0, &mut magic)?;
		ensure!(magic == MAGIC, "bad magic: {magic:?}");

		// Blocks must tile the medium exactly, with matching boundary tags
		// and no two adjacent free blocks.
		let mut frees = Vec::new();
		let mut prev_was_free = false;
		let mut pos = self.header_size;
		while pos < self.medium_size {
			let tag: Tag = self.file.decode_at(pos)?;
			ensure!(
				tag.size() >= MIN_PAYLOAD,
				"block {pos}: payload {} below minimum",
				tag.size()
			);

			ensure!(
				self.medium_size - pos >= 2 * TAG_SIZE + tag.size(),
				"block {pos} overruns the medium"
			);
			let end = pos + TAG_SIZE + tag.size();
			let end_tag: Tag = self.file.decode_at(end)?;
			ensure!(
				tag == end_tag,
				"block {pos}: start and end tags disagree"
			);

			if tag.is_free() {
				ensure!(
					!prev_was_free,
					"block {pos} and its predecessor are both free"
				);
				frees.push(pos);
			}
			prev_was_free = tag.is_free();
			pos = end + TAG_SIZE;
		}
		ensure!(pos == self.medium_size, "block chain overruns the medium");

		// The free list must enumerate exactly the free blocks, in
		// ascending offset order, with agreeing back pointers.
		ensure!(
			self.first_free == frees.first().copied().unwrap_or(0),
			"cached first-free {} does not match the medium",
			self.first_free
		);
		let mut cur = self.first_free;
		let mut expected_prev = 0;
		for &b in &frees {
			ensure!(cur == b, "free list visits {cur}, expected {b}");
			let prev = self.free_prev(b)?;
			ensure!(
				prev == expected_prev,
				"free block {b}: prev is {prev}, expected {expected_prev}"
			);
			expected_prev = b;
			cur = self.free_next(b)?;
		}
		ensure!(cur == 0, "free list runs past the last free block into {cur}");

		log::debug!("check: OK");
		Ok(())
	}

	/// Linear scan through the block chain for the lowest free block.
	fn scan_first_free(&mut self) -> IoResult<u64> {
		let mut pos = self.header_size;
		while pos < self.medium_size {
			let tag: Tag = self.file.decode_at(pos)?;
			if tag.is_free() {
				return Ok(pos);
			}
			pos = pos
				.checked_add(2 * TAG_SIZE + tag.size())
				.ok_or_else(|| err!(EIO))?;
		}
		if pos != self.medium_size {
			log::error!(
				"block chain overruns the medium: pos={pos}, size={}",
				self.medium_size
			);
			return Err(err!(EIO));
		}
		Ok(0)
	}

	/// Bounds-check a client pointer and convert it to its block offset.
	fn checked_block(&self, ptr: u64) -> IoResult<u64> {
		if ptr < self.header_size + TAG_SIZE || ptr >= self.medium_size {
			return Err(err!(EINVAL));
		}
		Ok(ptr - TAG_SIZE)
	}

	fn tag_at(&mut self, block: u64) -> IoResult<Tag> {
		self.file.decode_at(block)
	}

	fn payload_size(&mut self, block: u64) -> IoResult<u64> {
		Ok(self.tag_at(block)?.size())
	}

	fn free_prev(&mut self, block: u64) -> IoResult<u64> {
		self.file.decode_at(block + TAG_SIZE)
	}

	fn free_next(&mut self, block: u64) -> IoResult<u64> {
		self.file.decode_at(block + TAG_SIZE + OFFSET_SIZE)
	}

	fn set_free_prev(&mut self, block: u64, to: u64) -> IoResult<()> {
		self.file.encode_at(block + TAG_SIZE, &to)
	}

	fn set_free_next(&mut self, block: u64, to: u64) -> IoResult<()> {
		self.file.encode_at(block + TAG_SIZE + OFFSET_SIZE, &to)
	}

	/// Write the identical tag at both ends of a block.
	fn write_tags(&mut self, block: u64, tag: Tag) -> IoResult<()> {
		self.file.encode_at(block, &tag)?;
		self.file.encode_at(block + TAG_SIZE + tag.size(), &tag)
	}
}

#[cfg(test)]
mod t {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn init_fresh_dynamic() {
		let mut buf = Vec::new();
		{
			let mut heap = Heap::new(Cursor::new(&mut buf)).unwrap();
			heap.init(Flags::DYNAMIC).unwrap();
			assert_eq!(heap.medium_size(), 8);
			assert_eq!(heap.flags(), Flags::DYNAMIC);
		}
		assert_eq!(buf.len(), 8);
		assert_eq!(&buf[0..4], b"PBA\0");
		assert_eq!(&buf[4..8], &1u32.to_be_bytes());
	}

	#[test]
	fn init_fails_on_empty_static() {
		let mut heap = Heap::new(Cursor::new(Vec::new())).unwrap();
		assert!(heap.init(Flags::empty()).is_err());
	}

	#[test]
	fn init_spans_prezeroed_medium() {
		let mut heap = Heap::new(Cursor::new(vec![0u8; 1024])).unwrap();
		heap.init(Flags::empty()).unwrap();
		heap.check().unwrap();

		let info = heap.info().unwrap();
		assert_eq!(info.free_blocks, 1);
		assert_eq!(info.free, 1024 - 8 - 16);
		assert!(!info.dynamic);
	}

	#[test]
	fn init_header_only_medium() {
		// Exactly a header's worth of medium holds no block, but is valid.
		let mut heap = Heap::new(Cursor::new(vec![0u8; 8])).unwrap();
		heap.init(Flags::empty()).unwrap();
		assert_eq!(heap.medium_size(), 8);
		assert_eq!(heap.alloc(1).unwrap(), None);
		heap.check().unwrap();
	}

	#[test]
	fn init_is_idempotent() {
		let mut buf = Vec::new();
		{
			let mut heap = Heap::new(Cursor::new(&mut buf)).unwrap();
			heap.init(Flags::DYNAMIC).unwrap();
		}
		let snapshot = buf.clone();
		{
			let mut heap = Heap::new(Cursor::new(&mut buf)).unwrap();
			// Persisted flags win over whatever is passed at reinit.
			heap.init(Flags::empty()).unwrap();
			assert_eq!(heap.flags(), Flags::DYNAMIC);
		}
		assert_eq!(buf, snapshot);
	}

	#[test]
	fn extended_header_is_rejected() {
		let mut buf = Vec::new();
		buf.extend_from_slice(b"PBA\0");
		buf.extend_from_slice(&(1u32 << 31).to_be_bytes());
		buf.extend_from_slice(&[0u8; 32]);

		assert!(Heap::new(Cursor::new(buf)).is_err());
	}

	#[test]
	fn init_rejects_extended() {
		let mut heap = Heap::new(Cursor::new(Vec::new())).unwrap();
		assert!(heap.init(Flags::DYNAMIC | Flags::EXTENDED).is_err());
	}

	#[test]
	fn reopen_scans_first_free() {
		let mut buf = Vec::new();
		let (p, q) = {
			let mut heap = Heap::new(Cursor::new(&mut buf)).unwrap();
			heap.init(Flags::DYNAMIC).unwrap();
			let p = heap.alloc(16).unwrap().unwrap().get();
			let q = heap.alloc(16).unwrap().unwrap().get();
			heap.free(p).unwrap();
			(p, q)
		};

		let mut heap = Heap::new(Cursor::new(&mut buf)).unwrap();
		assert_eq!(heap.flags(), Flags::DYNAMIC);
		heap.check().unwrap();
		assert_eq!(heap.blob_next(0).unwrap().unwrap().get(), q);
		let _ = p;
	}
}
