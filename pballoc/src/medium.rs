use std::{
	fs::File,
	io::{ErrorKind, Read, Result as IoResult, Seek, Write},
	path::{Path, PathBuf},
};

use crate::{data::Flags, err};

/// Backing storage for a heap. Any seekable byte medium works.
pub trait Backend: Read + Write + Seek {}

impl<T: Read + Write + Seek> Backend for T {}

/// Open the medium file read-write, creating it if absent. With
/// [`Flags::SYNC`], data-sync-on-write is requested from the OS; on
/// platforms without the facility the flag is silently ignored.
pub(crate) fn open_file(path: &Path, flags: Flags) -> IoResult<File> {
	let path = canonical_path(path)?;

	let mut opts = File::options();
	opts.read(true).write(true).create(true);

	#[cfg(unix)]
	if flags.contains(Flags::SYNC) {
		use std::os::unix::fs::OpenOptionsExt;
		opts.custom_flags(libc::O_DSYNC);
	}
	#[cfg(not(unix))]
	let _ = flags;

	opts.open(path)
}

/// Resolve `path` even when its leaf does not exist yet: canonicalize the
/// longest existing prefix and append the remainder verbatim.
pub(crate) fn canonical_path(path: &Path) -> IoResult<PathBuf> {
	match path.canonicalize() {
		Ok(p) => return Ok(p),
		Err(e) if e.kind() == ErrorKind::NotFound => (),
		Err(e) => return Err(e),
	}

	let mut base = path.to_path_buf();
	let mut rest = Vec::new();
	while !base.exists() {
		match base.file_name() {
			Some(name) => {
				rest.push(name.to_os_string());
				base.pop();
			}
			None => return Err(err!(ENOENT)),
		}
		if base.as_os_str().is_empty() {
			base = PathBuf::from(".");
		}
	}

	let mut out = base.canonicalize()?;
	for name in rest.into_iter().rev() {
		out.push(name);
	}
	Ok(out)
}
