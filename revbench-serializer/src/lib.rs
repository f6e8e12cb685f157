#![warn(missing_docs)]
//! revbench Suite Serialization
//!
//! Persists the full suite hierarchy as an XML document and loads it back:
//!
//! ```text
//! revbench > suite(context, date, config-path, uuid)
//!   > env > <information-name>(...)
//!   > benchmark(class) > subject(name) > group(name)
//!                                      > variant(revs, warmup, sleep, ...)
//!                                          > parameter(name, value | type="collection")
//!                                          > stats(...)
//!                                          > iteration(<result fields>)
//!                                          > error(exception-class, code, file, line)
//! ```

mod decoder;
mod document;
mod encoder;
mod error;

pub use decoder::{decode, decode_file, decode_files, decode_str};
pub use document::Element;
pub use encoder::{ROOT_ELEMENT, encode, encode_file, encode_suite, encode_to_string};
pub use error::SerializeError;
