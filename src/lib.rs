//! Finds the playable videos of embed pages: packed player scripts are
//! decoded, the stream manifest is parsed and its variants are ranked by
//! quality.

pub mod codec;
pub mod fetch;
pub mod manifest;
pub mod packer;
pub mod pipeline;
pub mod quality;
pub mod resolve;
