//! Shared primitives for the recompiler crates: endian-aware byte cursors and
//! a small time helper used by the CLI's log formatter.
//!
//! Every other crate in this workspace depends on [`data`] for reading the
//! pervasively big-endian XEX2/ELF/PE formats; set [`data::Endian::Big`] once
//! on a cursor and every scalar read swaps on the way out instead of
//! scattering `u32::from_be_bytes` calls through the parsers.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
mod no_std {
    extern crate alloc;
    pub use alloc::boxed::Box;
    pub use alloc::format;
    pub use alloc::string::String;
}

pub mod data;

#[cfg(feature = "time")]
pub mod time;

pub mod prelude {
    pub use crate::data::{
        DataCursor, DataCursorMut, DataCursorRef, DataCursorTrait, Endian, EndianRead, EndianWrite,
    };

    pub mod data {
        pub use crate::data::Error;
    }
}
