#![forbid(unsafe_code)]

pub mod pic8259;

pub use pic8259::{Acknowledged, DualPic8259};
