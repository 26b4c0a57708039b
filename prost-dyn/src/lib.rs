#![doc = include_str!("../doc/intro.md")]
#![doc = "# Example - decoding"]
#![doc = include_str!("../doc/decoding.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]

pub mod dynamic;
mod global;
pub mod resolve;
pub mod types;

pub use {prost, prost::bytes, prost_reflect, prost_types};

pub use self::dynamic::{DynamicMessage, MapKey, MessageFactory, Value};
pub use self::global::global_resolver;
pub use self::resolve::Resolver;
