//! Seams to the kernel compiler and device runtime the harness drives.

pub mod spec;
