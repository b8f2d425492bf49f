//! Concrete drivers.
//!
//! `wgpu` renders into a winit window. The recording driver used for tests and
//! dry runs lives in [`crate::driver::recording`].

pub mod wgpu;
