use bincode::{Decode, Encode};
use bitflags::bitflags;

/// Magic bytes at the start of every initialized medium.
pub const MAGIC: [u8; 4] = *b"PBA\0";

/// Fixed header size: magic plus the big-endian flags word.
pub const HEADER_SIZE: u64 = 8;

/// Size of one boundary tag.
pub const TAG_SIZE: u64 = 8;

/// Size of one free-list offset field.
pub const OFFSET_SIZE: u64 = 8;

/// Smallest payload any block may carry: room for the two free-list
/// offsets once the block is freed.
pub const MIN_PAYLOAD: u64 = 2 * OFFSET_SIZE;

/// Smallest initialized medium that can hold a block: the header plus one
/// minimum free block.
pub const MIN_MEDIUM: u64 = HEADER_SIZE + 2 * TAG_SIZE + MIN_PAYLOAD;

const FREE_BIT: u64 = 1 << 63;

bitflags! {
	/// Heap options. `DYNAMIC` and `EXTENDED` are persisted in the header;
	/// `SYNC` only affects how the medium is opened.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Flags: u32 {
		/// The medium may grow on demand instead of reporting out-of-space.
		const DYNAMIC = 1;

		/// Request data-sync-on-write from the OS when opening (best effort).
		const SYNC = 2;

		/// Reserved for a future extended header. A medium carrying it
		/// cannot be opened by this version.
		const EXTENDED = 1 << 31;
	}
}

impl Flags {
	/// The header stores everything but `SYNC`, which is an open-time
	/// concern rather than a format concern.
	pub(crate) fn persisted(self) -> Flags {
		self & !Flags::SYNC
	}
}

/// Boundary tag: payload size in the low 63 bits, free flag in the top
/// bit. Written byte-identically at both ends of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) struct Tag(u64);

impl Tag {
	/// Largest payload size a tag can describe.
	pub const MAX_SIZE: u64 = !FREE_BIT;

	pub fn used(size: u64) -> Self {
		debug_assert_eq!(size & FREE_BIT, 0);
		Tag(size)
	}

	pub fn free(size: u64) -> Self {
		debug_assert_eq!(size & FREE_BIT, 0);
		Tag(size | FREE_BIT)
	}

	pub fn size(self) -> u64 {
		self.0 & !FREE_BIT
	}

	pub fn is_free(self) -> bool {
		self.0 & FREE_BIT != 0
	}
}

/// Summary of medium statistics.
#[derive(Debug, Clone)]
pub struct Info {
	/// Total size of the medium in bytes.
	pub size: u64,

	/// Number of allocated blobs.
	pub blobs: u64,

	/// Payload bytes held by allocated blobs.
	pub used: u64,

	/// Number of free blocks.
	pub free_blocks: u64,

	/// Payload bytes available in free blocks.
	pub free: u64,

	/// Largest allocation served without growing the medium.
	pub largest_free: u64,

	/// Whether the medium grows on demand.
	pub dynamic: bool,
}

#[cfg(test)]
mod t {
	use super::*;

	#[test]
	fn tag_bits() {
		assert!(Tag::free(16).is_free());
		assert!(!Tag::used(16).is_free());
		assert_eq!(Tag::free(16).size(), 16);
		assert_eq!(Tag::used(Tag::MAX_SIZE).size(), Tag::MAX_SIZE);
	}

	#[test]
	fn tag_wire_format() {
		let cfg = bincode::config::standard()
			.with_fixed_int_encoding()
			.with_big_endian();
		let bytes = bincode::encode_to_vec(Tag::free(16), cfg).unwrap();
		assert_eq!(bytes, [0x80, 0, 0, 0, 0, 0, 0, 0x10]);
		let bytes = bincode::encode_to_vec(Tag::used(16), cfg).unwrap();
		assert_eq!(bytes, [0, 0, 0, 0, 0, 0, 0, 0x10]);
	}

	#[test]
	fn persisted_flags_mask_sync() {
		let f = Flags::DYNAMIC | Flags::SYNC;
		assert_eq!(f.persisted(), Flags::DYNAMIC);
	}
}
