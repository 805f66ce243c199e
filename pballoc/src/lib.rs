mod data;
mod decoder;
mod heap;
mod medium;

pub use crate::{
	data::{Flags, Info},
	heap::Heap,
	medium::Backend,
};
