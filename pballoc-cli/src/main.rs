use std::{
	fs::{self, File},
	io::{self, Write},
};

use anyhow::{bail, Result};
use clap::Parser;
use pballoc::{Flags, Heap};

use crate::cli::{Cli, Command};

mod cli;

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::builder()
		.filter_level(cli.verbose.log_level_filter())
		.init();

	match cli.command {
		Command::Init { dynamic, sync, size } => {
			let mut flags = Flags::empty();
			if dynamic {
				flags |= Flags::DYNAMIC;
			}
			if sync {
				flags |= Flags::SYNC;
			}
			if let Some(size) = size {
				let file = File::options()
					.read(true)
					.write(true)
					.create(true)
					.open(&cli.medium)?;
				file.set_len(size)?;
			}
			let mut heap = Heap::open(&cli.medium, flags)?;
			heap.init(flags)?;
			heap.close()?;
		}
		Command::Info => {
			let mut heap = Heap::open(&cli.medium, Flags::empty())?;
			let info = heap.info()?;
			println!("size:         {}", info.size);
			println!("blobs:        {}", info.blobs);
			println!("used:         {}", info.used);
			println!("free blocks:  {}", info.free_blocks);
			println!("free:         {}", info.free);
			println!("largest free: {}", info.largest_free);
			println!("dynamic:      {}", info.dynamic);
		}
		Command::Check => {
			let mut heap = Heap::open(&cli.medium, Flags::empty())?;
			heap.check()?;
			println!("OK");
		}
		Command::Ls => {
			let mut heap = Heap::open(&cli.medium, Flags::empty())?;
			heap.blob_iter(|ptr, size| {
				println!("{ptr}\t{size}");
				None::<()>
			})?;
		}
		Command::Cat { ptr } => {
			let mut heap = Heap::open(&cli.medium, Flags::empty())?;
			let size = heap.blob_size(ptr)?;
			let mut buf = vec![0u8; size as usize];
			heap.blob_read(ptr, 0, &mut buf)?;
			io::stdout().write_all(&buf)?;
		}
		Command::Put { file } => {
			let data = fs::read(&file)?;
			let mut heap = Heap::open(&cli.medium, Flags::empty())?;
			let Some(ptr) = heap.alloc(data.len() as u64)? else {
				bail!("out of space on a non-dynamic medium");
			};
			heap.blob_write(ptr.get(), 0, &data)?;
			heap.close()?;
			println!("{ptr}");
		}
		Command::Rm { ptr } => {
			let mut heap = Heap::open(&cli.medium, Flags::empty())?;
			heap.free(ptr)?;
			heap.close()?;
		}
	}

	Ok(())
}
