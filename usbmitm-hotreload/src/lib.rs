//! Optional dylib-based hot reload of a single stage implementation.
//! Entirely behind the off-by-default `dylib-reload` feature: without
//! it, this crate exposes only [`Error`] and compiles with zero unsafe
//! dynamic-loading surface.
//!
//! A [`HotReload`] is never itself registered as a [`usbmitm_engine::Stage`]
//! — that would reintroduce the same self-reference problem a stage
//! reaching into the registry that holds it already has. Instead a
//! driver calls [`HotReload::poll`] explicitly once per loop iteration,
//! alongside the registry's other hooks.

mod error;

#[cfg(feature = "dylib-reload")]
mod dylib;

pub use error::Error;

#[cfg(feature = "dylib-reload")]
pub use dylib::{HotReload, FACTORY_SYMBOL};
