//! Compiled code objects - native artifacts as invocable runtime values
//!
//! An artifact is a raw block of instructions for the running architecture,
//! with no header, whose first byte is the entry point. Loading maps it
//! executable; the resulting object keeps the source code object alive and
//! releases the mapping exactly once when its last reference goes away.

mod mapping;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

pub use mapping::ExecMapping;

use crate::error::{RtResult, RuntimeError};
use crate::interop::RawOutcome;
use crate::objects::{payload_type, CodeData, DictData, ObjRef, ObjectType, Ref};

/// Entry ABI of an artifact
pub type EntryPoint = unsafe extern "C" fn() -> RawOutcome;

/// Loader counters
struct LoaderState {
    loaded: AtomicUsize,
    released: AtomicUsize,
    bytes_mapped: AtomicUsize,
}

static LOADER_STATE: Lazy<LoaderState> = Lazy::new(|| LoaderState {
    loaded: AtomicUsize::new(0),
    released: AtomicUsize::new(0),
    bytes_mapped: AtomicUsize::new(0),
});

/// Loader statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub artifacts_loaded: usize,
    pub artifacts_released: usize,
    /// Bytes currently mapped by live artifacts
    pub bytes_mapped: usize,
}

pub fn stats() -> LoaderStats {
    LoaderStats {
        artifacts_loaded: LOADER_STATE.loaded.load(Ordering::Relaxed),
        artifacts_released: LOADER_STATE.released.load(Ordering::Relaxed),
        bytes_mapped: LOADER_STATE.bytes_mapped.load(Ordering::Relaxed),
    }
}

/// Executable code object
pub struct CompiledCode {
    // Unmapped (and its file closed) before `code` is released
    mapping: ExecMapping,
    code: ObjRef,
    path: PathBuf,
    digest: blake3::Hash,
}

payload_type!(CompiledCode, COMPILED_TYPE, "compiled_code", ObjectType::Compiled);

impl CompiledCode {
    /// Map the artifact at `path` and wrap it with a keep-alive reference to
    /// the code object it was generated from
    ///
    /// Failures cite the path; nothing acquired before the failing step
    /// survives.
    ///
    /// # Safety
    /// The file must contain instructions for the running architecture whose
    /// first byte is a function following [`EntryPoint`]. Invoking the result
    /// runs that code unchecked.
    pub unsafe fn load(path: impl AsRef<Path>, code: &ObjRef) -> RtResult<Ref<CompiledCode>> {
        let path = path.as_ref();
        let mapping = ExecMapping::map(path).map_err(|source| {
            warn!(
                event = "artifact_load_failed",
                path = %path.display(),
                error = %source,
                "Artifact could not be mapped"
            );
            RuntimeError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let digest = blake3::hash(mapping.bytes());
        LOADER_STATE.loaded.fetch_add(1, Ordering::Relaxed);
        LOADER_STATE
            .bytes_mapped
            .fetch_add(mapping.len(), Ordering::Relaxed);
        debug!(
            event = "artifact_loaded",
            path = %path.display(),
            size_bytes = mapping.len(),
            digest = %digest.to_hex(),
            entry = ?mapping.as_ptr(),
            "Artifact mapped"
        );

        Ok(Ref::new(CompiledCode {
            mapping,
            code: code.clone(),
            path: path.to_path_buf(),
            digest,
        }))
    }

    /// Transfer control to the entry point; the outcome is returned as is
    pub fn invoke(&self) -> RawOutcome {
        // SAFETY: `load` callers vouch that the mapping starts with an EntryPoint
        unsafe {
            let entry: EntryPoint = core::mem::transmute(self.mapping.as_ptr());
            entry()
        }
    }

    /// Invoke and take ownership of the outcome
    pub fn call(&self) -> RtResult<ObjRef> {
        // SAFETY: artifacts honor the RawOutcome contract
        unsafe { self.invoke().into_result() }
    }

    /// The code object this artifact was generated from
    pub fn code(&self) -> &ObjRef {
        &self.code
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Address of the entry point inside the mapping
    pub fn entry_address(&self) -> usize {
        self.mapping.as_ptr() as usize
    }

    pub fn digest(&self) -> &blake3::Hash {
        &self.digest
    }

    /// Name used in failures raised on its behalf
    pub fn name(&self) -> String {
        match self.code.downcast::<CodeData>() {
            Some(code) => format!("<compiled {}>", code.name),
            None => "<compiled code>".to_string(),
        }
    }
}

impl Drop for CompiledCode {
    fn drop(&mut self) {
        LOADER_STATE.released.fetch_add(1, Ordering::Relaxed);
        LOADER_STATE
            .bytes_mapped
            .fetch_sub(self.mapping.len(), Ordering::Relaxed);
        debug!(
            event = "artifact_released",
            path = %self.path.display(),
            size_bytes = self.mapping.len(),
            "Artifact released"
        );
    }
}

/// Namespace key under which an artifact is stored for its code object
pub fn artifact_key(code: &Ref<CodeData>) -> String {
    format!("<native artifact {:#x}>", code.as_obj().id())
}

/// Mark `code` as backed by native code and park the artifact in `namespace`
///
/// The entry is write-only from this crate's point of view; it exists to
/// keep the artifact alive as long as the namespace.
pub fn attach_artifact(
    namespace: &Ref<DictData>,
    code: &Ref<CodeData>,
    artifact: Ref<CompiledCode>,
) {
    code.mark_compiled();
    namespace.set_str(&artifact_key(code), artifact.into_obj());
    debug!(
        event = "artifact_attached",
        code = %code.name,
        "Compiled artifact attached"
    );
}
