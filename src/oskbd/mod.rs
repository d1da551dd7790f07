//! OS-level keyboard and mouse IO.

mod linux;

pub use linux::*;
