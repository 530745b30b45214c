//! File access: the positional byte source, glob expansion and the Parquet
//! decoder binding.

pub mod glob;
pub mod source;

pub use source::ByteSource;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;
