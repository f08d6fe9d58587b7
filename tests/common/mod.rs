//! Shared helpers: artifacts that jump straight to a Rust entry point

#![allow(dead_code)]

use std::io::Write;

use nativebridge::objects::{dict, CodeBuilder, CodeData, Ref};
use nativebridge::RawOutcome;
use tempfile::NamedTempFile;

pub type Entry = extern "C" fn() -> RawOutcome;

/// Machine code that tail-jumps to `target`
pub fn trampoline(target: Entry) -> Vec<u8> {
    let address = (target as usize as u64).to_le_bytes();
    let mut code = Vec::with_capacity(16);

    #[cfg(target_arch = "x86_64")]
    {
        // movabs rax, imm64 ; jmp rax
        code.extend_from_slice(&[0x48, 0xB8]);
        code.extend_from_slice(&address);
        code.extend_from_slice(&[0xFF, 0xE0]);
    }

    #[cfg(target_arch = "aarch64")]
    {
        // ldr x16, #8 ; br x16 ; .quad target
        code.extend_from_slice(&[0x50, 0x00, 0x00, 0x58]);
        code.extend_from_slice(&[0x00, 0x02, 0x1F, 0xD6]);
        code.extend_from_slice(&address);
    }

    code
}

/// Write an artifact under the target directory; /tmp may be mounted noexec
pub fn write_artifact(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("artifact-")
        .suffix(".bin")
        .tempfile_in(env!("CARGO_TARGET_TMPDIR"))
        .expect("create artifact file");
    file.write_all(bytes).expect("write artifact");
    file.flush().expect("flush artifact");
    file
}

pub fn artifact_for(target: Entry) -> NamedTempFile {
    write_artifact(&trampoline(target))
}

pub fn source_code(name: &str) -> Ref<CodeData> {
    CodeBuilder::new(name).build()
}

pub fn namespace() -> Ref<nativebridge::objects::DictData> {
    dict()
}
