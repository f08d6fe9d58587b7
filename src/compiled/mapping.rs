//! Executable memory for artifact files
//!
//! Both platforms map the file itself read+execute; the pages are never
//! writable. The mapping is released before the file handle it came from.

use core::ffi::c_void;
use core::ptr::NonNull;
use core::slice;
use std::io;
use std::path::Path;

#[cfg(any(unix, windows))]
use std::fs::File;
#[cfg(any(unix, windows))]
use std::io::{Seek, SeekFrom};

/// Read+execute view of an artifact
pub struct ExecMapping {
    ptr: NonNull<c_void>,
    len: usize,
    #[cfg(windows)]
    section: winapi::um::winnt::HANDLE,
    // Dropped after the region is unmapped
    #[cfg(any(unix, windows))]
    _file: File,
}

fn empty_artifact() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "artifact is empty")
}

/// Size of an open artifact, leaving the cursor at the start
#[cfg(any(unix, windows))]
fn measure(file: &mut File) -> io::Result<usize> {
    let len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    if len == 0 {
        return Err(empty_artifact());
    }
    usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "artifact too large"))
}

impl ExecMapping {
    #[cfg(unix)]
    pub fn map(path: &Path) -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let mut file = File::open(path)?;
        let len = measure(&mut file)?;

        // SAFETY: fd is open for reading and len is the file's size
        let raw = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_EXEC,
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(raw).ok_or_else(|| io::Error::other("mmap returned null"))?;
        Ok(Self {
            ptr,
            len,
            _file: file,
        })
    }

    #[cfg(windows)]
    pub fn map(path: &Path) -> io::Result<Self> {
        use std::fs::OpenOptions;
        use std::os::windows::fs::OpenOptionsExt;
        use std::os::windows::io::AsRawHandle;
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::memoryapi::{
            CreateFileMappingW, MapViewOfFile, FILE_MAP_EXECUTE, FILE_MAP_READ,
        };
        use winapi::um::winnt::{GENERIC_EXECUTE, GENERIC_READ, PAGE_EXECUTE_READ};

        // Execute views need an execute-capable file handle
        let mut file = OpenOptions::new()
            .read(true)
            .access_mode(GENERIC_READ | GENERIC_EXECUTE)
            .open(path)?;
        let len = measure(&mut file)?;

        // SAFETY: the file handle is open for read+execute and outlives the view
        unsafe {
            let section = CreateFileMappingW(
                file.as_raw_handle().cast(),
                core::ptr::null_mut(),
                PAGE_EXECUTE_READ,
                0,
                0,
                core::ptr::null(),
            );
            if section.is_null() {
                return Err(io::Error::last_os_error());
            }
            let view = MapViewOfFile(section, FILE_MAP_READ | FILE_MAP_EXECUTE, 0, 0, len);
            let Some(ptr) = NonNull::new(view.cast::<c_void>()) else {
                let err = io::Error::last_os_error();
                CloseHandle(section);
                return Err(err);
            };
            Ok(Self {
                ptr,
                len,
                section,
                _file: file,
            })
        }
    }

    #[cfg(not(any(unix, windows)))]
    pub fn map(_path: &Path) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "executable artifacts are not supported on this platform",
        ))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const c_void {
        self.ptr.as_ptr()
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the region is readable for len bytes while self lives
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().cast::<u8>(), self.len) }
    }
}

impl Drop for ExecMapping {
    #[cfg(unix)]
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr(), self.len);
        }
    }

    #[cfg(windows)]
    fn drop(&mut self) {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::memoryapi::UnmapViewOfFile;
        unsafe {
            UnmapViewOfFile(self.ptr.as_ptr() as winapi::shared::minwindef::LPCVOID);
            CloseHandle(self.section);
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn drop(&mut self) {}
}
