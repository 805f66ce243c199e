use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
	/// Path to the medium
	pub medium: PathBuf,

	#[command(subcommand)]
	pub command: Command,

	#[command(flatten)]
	pub verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand)]
pub enum Command {
	/// Initialize the medium
	Init {
		/// Let the medium grow on demand
		#[arg(long)]
		dynamic: bool,

		/// Request data-sync-on-write from the OS
		#[arg(long)]
		sync: bool,

		/// Pre-size the medium to this many bytes first
		#[arg(long)]
		size: Option<u64>,
	},

	/// Print medium statistics
	Info,

	/// Verify the medium structure
	Check,

	/// List allocated blobs with their payload sizes
	Ls,

	/// Dump a blob's payload to stdout
	Cat { ptr: u64 },

	/// Store a file's contents as a new blob and print its pointer
	Put { file: PathBuf },

	/// Free a blob
	Rm { ptr: u64 },
}
