use std::{
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::Pointer;

/// Abstraction for platform specific memory handling. The allocator only
/// needs aligned chunks of heap memory, the page size and a couple of
/// physical RAM figures, but it doesn't care about the APIs offered by
/// the underlying kernel or libraries.
trait PlatformSpecificMemory {
    /// Requests `size` bytes aligned to `alignment` from the system
    /// allocator. `alignment` must be a power of two no smaller than a
    /// pointer.
    unsafe fn request_memory(size: usize, alignment: usize) -> Pointer<u8>;

    /// Returns memory previously obtained with `request_memory`.
    unsafe fn return_memory(address: NonNull<u8>);

    /// Virtual memory page size in bytes.
    unsafe fn page_size() -> usize;

    /// Total physical RAM in bytes, if the platform can report it.
    unsafe fn total_ram() -> Option<usize>;

    /// Currently free physical RAM in bytes, if the platform can report
    /// it.
    unsafe fn free_ram() -> Option<usize>;
}

/// Zero sized type that implements [`PlatformSpecificMemory`] for each
/// OS.
pub(crate) struct Platform;

/// Virtual memory page size. 4096 bytes on most computers. This should
/// be a constant but we only learn the value at runtime by calling into
/// C libraries, so we cache it after the first query.
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

#[inline]
pub(crate) fn page_size() -> usize {
    let mut size = PAGE_SIZE.load(Ordering::Relaxed);
    if size == 0 {
        size = unsafe { Platform::page_size() };
        PAGE_SIZE.store(size, Ordering::Relaxed);
    }

    size
}

/// Convenience wrapper for [`PlatformSpecificMemory::request_memory`].
#[inline]
pub(crate) unsafe fn request_memory(size: usize, alignment: usize) -> Pointer<u8> {
    Platform::request_memory(size, alignment)
}

/// Convenience wrapper for [`PlatformSpecificMemory::return_memory`].
#[inline]
pub(crate) unsafe fn return_memory(address: NonNull<u8>) {
    Platform::return_memory(address)
}

/// Convenience wrapper for [`PlatformSpecificMemory::total_ram`].
#[inline]
pub(crate) fn total_ram() -> Option<usize> {
    unsafe { Platform::total_ram() }
}

/// Convenience wrapper for [`PlatformSpecificMemory::free_ram`].
#[inline]
pub(crate) fn free_ram() -> Option<usize> {
    unsafe { Platform::free_ram() }
}

#[cfg(unix)]
mod unix {
    use std::ptr::{self, NonNull};

    use libc;

    use super::{Platform, PlatformSpecificMemory};
    use crate::Pointer;

    impl PlatformSpecificMemory for Platform {
        unsafe fn request_memory(size: usize, alignment: usize) -> Pointer<u8> {
            let mut address = ptr::null_mut::<libc::c_void>();

            // posix_memalign wants the alignment to be a power of two
            // multiple of sizeof(void *), which our callers guarantee.
            // See https://man7.org/linux/man-pages/man3/posix_memalign.3.html
            match libc::posix_memalign(&mut address, alignment, size) {
                0 => NonNull::new(address.cast()),
                _ => None,
            }
        }

        unsafe fn return_memory(address: NonNull<u8>) {
            libc::free(address.cast().as_ptr());
        }

        unsafe fn page_size() -> usize {
            libc::sysconf(libc::_SC_PAGE_SIZE) as usize
        }

        unsafe fn total_ram() -> Option<usize> {
            let pages = libc::sysconf(libc::_SC_PHYS_PAGES);
            if pages < 0 {
                return None;
            }

            Some(pages as usize * Self::page_size())
        }

        #[cfg(target_os = "linux")]
        unsafe fn free_ram() -> Option<usize> {
            let pages = libc::sysconf(libc::_SC_AVPHYS_PAGES);
            if pages < 0 {
                return None;
            }

            Some(pages as usize * Self::page_size())
        }

        // Not every libc exposes the free page count through sysconf.
        #[cfg(not(target_os = "linux"))]
        unsafe fn free_ram() -> Option<usize> {
            None
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, ptr::NonNull};

    use windows::Win32::System::{Memory, SystemInformation};

    use super::{Platform, PlatformSpecificMemory};
    use crate::Pointer;

    impl PlatformSpecificMemory for Platform {
        unsafe fn request_memory(size: usize, alignment: usize) -> Pointer<u8> {
            // VirtualAlloc hands back memory aligned to the allocation
            // granularity, which covers every alignment up to the page
            // size. For the details on each parameter, see
            // https://learn.microsoft.com/en-us/windows/win32/api/memoryapi/nf-memoryapi-virtualalloc#parameters
            debug_assert!(alignment <= Self::page_size());

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;
            let protection = Memory::PAGE_READWRITE;

            let address = Memory::VirtualAlloc(None, size, flags, protection);

            NonNull::new(address.cast())
        }

        unsafe fn return_memory(address: NonNull<u8>) {
            // Specifying length 0 with MEM_RELEASE decommits and releases
            // the entire allocation at once. See the docs for details:
            // https://learn.microsoft.com/en-us/windows/win32/api/memoryapi/nf-memoryapi-virtualfree#parameters
            let address = address.cast().as_ptr();
            let flags = Memory::MEM_RELEASE;

            if !Memory::VirtualFree(address, 0, flags).as_bool() {
                // Release failed, the pages stay mapped. The process can
                // keep running, it just holds on to more memory.
            }
        }

        unsafe fn page_size() -> usize {
            let mut system_info = MaybeUninit::uninit();
            SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

            system_info.assume_init().dwPageSize as usize
        }

        unsafe fn total_ram() -> Option<usize> {
            memory_status().map(|status| status.ullTotalPhys as usize)
        }

        unsafe fn free_ram() -> Option<usize> {
            memory_status().map(|status| status.ullAvailPhys as usize)
        }
    }

    unsafe fn memory_status() -> Option<SystemInformation::MEMORYSTATUSEX> {
        let mut status = SystemInformation::MEMORYSTATUSEX {
            dwLength: std::mem::size_of::<SystemInformation::MEMORYSTATUSEX>() as u32,
            ..Default::default()
        };

        SystemInformation::GlobalMemoryStatusEx(&mut status)
            .as_bool()
            .then_some(status)
    }
}
