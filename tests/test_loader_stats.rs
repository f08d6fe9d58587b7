//! Loader counters; kept in their own binary since the counters are process-wide

#![cfg(all(any(unix, windows), any(target_arch = "x86_64", target_arch = "aarch64")))]

mod common;

use common::{artifact_for, source_code, trampoline};
use nativebridge::compiled::{self, CompiledCode};
use nativebridge::objects::none;
use nativebridge::RawOutcome;

extern "C" fn nothing() -> RawOutcome {
    RawOutcome::ok(none())
}

#[test]
fn test_loader_counters_track_lifetimes() {
    let code = source_code("counted");
    let size = trampoline(nothing).len();
    let first_file = artifact_for(nothing);
    let second_file = artifact_for(nothing);

    let start = compiled::stats();
    let first = unsafe { CompiledCode::load(first_file.path(), code.as_obj()) }.unwrap();
    let second = unsafe { CompiledCode::load(second_file.path(), code.as_obj()) }.unwrap();

    let loaded = compiled::stats();
    assert_eq!(loaded.artifacts_loaded - start.artifacts_loaded, 2);
    assert_eq!(loaded.bytes_mapped - start.bytes_mapped, 2 * size);
    assert_eq!(loaded.artifacts_released, start.artifacts_released);

    // Extra references do not release anything
    let alias = first.clone();
    drop(first);
    assert_eq!(compiled::stats().artifacts_released, start.artifacts_released);

    drop(alias);
    let after_one = compiled::stats();
    assert_eq!(after_one.artifacts_released - start.artifacts_released, 1);
    assert_eq!(after_one.bytes_mapped - start.bytes_mapped, size);

    assert!(second.call().unwrap().is::<nativebridge::objects::NoneData>());
    drop(second);
    let end = compiled::stats();
    assert_eq!(end.artifacts_released - start.artifacts_released, 2);
    assert_eq!(end.bytes_mapped, start.bytes_mapped);

    // Failed loads leave the counters alone
    let dir = tempfile::tempdir_in(env!("CARGO_TARGET_TMPDIR")).unwrap();
    assert!(unsafe { CompiledCode::load(dir.path().join("absent.bin"), code.as_obj()) }.is_err());
    assert_eq!(compiled::stats(), end);

    assert_eq!(code.as_obj().refcount(), 1);
}
