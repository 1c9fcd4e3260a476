// crates/export-media/src/helpers/mod.rs
//
// Internal helper modules for export-media.
// Not re-exported from lib.rs — these are encode/decode implementation details.

pub mod yuv;
pub mod seek;