//! Watches a `cdylib` path's mtime and swaps the stage it exports into a
//! [`StageRegistry`] whenever the file changes. There is no Rust
//! equivalent of `importlib.reload`; this is the closest analogue,
//! grounded on `examples/original_source/usbq/core.py`'s
//! `ReloadUSBQHooks` plugin, which watched a Python module's mtime and
//! re-imported it.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use libloading::{Library, Symbol};

use usbmitm_engine::{Stage, StageRegistry};

use crate::error::Error;

/// The symbol every reloadable stage dylib must export.
pub const FACTORY_SYMBOL: &[u8] = b"usbmitm_stage_new";

type StageFactory = unsafe extern "C" fn() -> *mut dyn Stage;

/// Owns the currently-loaded dylib (so the stage's vtable stays valid
/// for as long as it's registered) and the name it's registered under.
pub struct HotReload {
    path: PathBuf,
    stage_name: String,
    last_mtime: Option<SystemTime>,
    library: Option<Library>,
}

impl HotReload {
    pub fn new(path: impl Into<PathBuf>, stage_name: impl Into<String>) -> Self {
        HotReload {
            path: path.into(),
            stage_name: stage_name.into(),
            last_mtime: None,
            library: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mtime(&self) -> Result<SystemTime, Error> {
        Ok(std::fs::metadata(&self.path)?.modified()?)
    }

    /// Checks the dylib's mtime and reloads it if it changed since the
    /// last poll (or this is the first poll to see the file at all).
    /// Returns whether a reload happened.
    pub fn poll(&mut self, registry: &mut StageRegistry) -> Result<bool, Error> {
        let mtime = self.mtime()?;
        if self.last_mtime == Some(mtime) {
            return Ok(false);
        }
        // Recorded before the attempt so a dylib that fails to load
        // isn't retried on every single poll until it changes again.
        self.last_mtime = Some(mtime);
        self.reload(registry)?;
        Ok(true)
    }

    fn reload(&mut self, registry: &mut StageRegistry) -> Result<(), Error> {
        // Load the new library and construct its stage before touching
        // the registry or `self.library`: if either fails, the previous
        // stage (and the library backing its vtable) must be left
        // registered and untouched.
        //
        // Safety: the loaded library is expected to export a
        // `usbmitm_stage_new` symbol with the `StageFactory` signature,
        // per this module's documented contract; a mismatched dylib
        // is an operator error, not something this code can detect.
        let library = unsafe { Library::new(&self.path)? };
        let stage = unsafe {
            let factory: Symbol<StageFactory> = library
                .get(FACTORY_SYMBOL)
                .map_err(|_| Error::MissingSymbol("usbmitm_stage_new"))?;
            Box::from_raw(factory())
        };

        registry.unregister(&self.stage_name);
        registry
            .register(self.stage_name.clone(), stage)
            .map_err(Error::Register)?;
        self.library = Some(library);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/dylib.rs"]
mod tests;
