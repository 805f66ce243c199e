use std::io::{Error, ErrorKind, Result, SeekFrom};

use bincode::{
	config::{BigEndian, Configuration, Fixint, NoLimit},
	Decode, Encode,
};

use crate::medium::Backend;

/// Every multi-byte integer on the medium is big-endian, independent of
/// host byte order.
const fn config() -> Configuration<BigEndian, Fixint, NoLimit> {
	bincode::config::standard()
		.with_fixed_int_encoding()
		.with_big_endian()
}

/// Positional codec over a medium.
///
/// Each `*_at` access seeks first, so no call depends on cursor state left
/// behind by an earlier one.
pub struct Decoder<T: Backend> {
	inner: T,
}

impl<T: Backend> Decoder<T> {
	pub fn new(inner: T) -> Self {
		Self {
			inner,
		}
	}

	pub fn inner_mut(&mut self) -> &mut T {
		&mut self.inner
	}

	pub fn decode<X: Decode<()>>(&mut self) -> Result<X> {
		bincode::decode_from_std_read(&mut self.inner, config())
			.map_err(|_| Error::new(ErrorKind::InvalidInput, "failed to decode"))
	}

	pub fn encode<X: Encode>(&mut self, x: &X) -> Result<()> {
		bincode::encode_into_std_write(x, &mut self.inner, config())
			.map_err(|_| Error::new(ErrorKind::InvalidInput, "failed to encode"))?;
		Ok(())
	}

	pub fn decode_at<X: Decode<()>>(&mut self, pos: u64) -> Result<X> {
		self.seek(pos)?;
		self.decode()
	}

	pub fn encode_at<X: Encode>(&mut self, pos: u64, x: &X) -> Result<()> {
		self.seek(pos)?;
		self.encode(x)
	}

	pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
		self.inner.read_exact(buf)
	}

	pub fn write(&mut self, buf: &[u8]) -> Result<()> {
		self.inner.write_all(buf)
	}

	pub fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
		self.seek(pos)?;
		self.read(buf)
	}

	pub fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<()> {
		self.seek(pos)?;
		self.write(buf)
	}

	pub fn fill_at(&mut self, pos: u64, byte: u8, mut len: u64) -> Result<()> {
		self.seek(pos)?;
		let chunk = [byte; 512];
		while len > 0 {
			let n = len.min(chunk.len() as u64) as usize;
			self.inner.write_all(&chunk[..n])?;
			len -= n as u64;
		}
		Ok(())
	}

	pub fn seek(&mut self, pos: u64) -> Result<()> {
		self.inner.seek(SeekFrom::Start(pos))?;
		Ok(())
	}

	/// Current size of the medium in bytes.
	pub fn size(&mut self) -> Result<u64> {
		self.inner.seek(SeekFrom::End(0))
	}
}
