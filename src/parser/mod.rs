//! Archive parsing: gzip decompression, streaming mbox reading, header
//! decoding, and message classification.

pub mod archive;
pub mod header;
pub mod mbox;

pub use archive::MailArchive;
