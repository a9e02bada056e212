//! Fixed-size slot allocator over anonymous RWX pages.

use core::fmt;
use core::ptr::{self, NonNull};

use bitflags::bitflags;
use spin::Mutex;

/// Size of one executable slot. Large enough for the longest emitted thunk.
pub const SLOT_SIZE: usize = 256;

/// Size of the pages requested from the OS.
pub const PAGE_SIZE: usize = 4096;

/// Slots carved out of each mapped page.
pub const SLOTS_PER_PAGE: usize = PAGE_SIZE / SLOT_SIZE;

/// Upper bound on mapped pages. Past this the slab reports exhaustion
/// instead of growing.
const MAX_PAGES: usize = 256;

bitflags! {
    /// Protection bits requested for slab pages.
    #[derive(Clone, Copy)]
    struct Prot: libc::c_int {
        const READ = libc::PROT_READ;
        const WRITE = libc::PROT_WRITE;
        const EXEC = libc::PROT_EXEC;
    }
}

/// Errors surfaced by [`acquire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlabError {
    /// The page cap was reached and every slot is in use.
    Exhausted,
}

impl fmt::Display for SlabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlabError::Exhausted => write!(f, "executable code slab exhausted"),
        }
    }
}

impl std::error::Error for SlabError {}

/// Intrusive free list threaded through unused slots: the first machine word
/// of a free slot stores the address of its successor.
struct CodeSlab {
    free_head: *mut usize,
    pages: usize,
    free: usize,
}

// SAFETY: the raw pointers only ever reference pages owned by the slab
// itself; all access goes through the surrounding Mutex.
unsafe impl Send for CodeSlab {}

impl CodeSlab {
    const fn new() -> Self {
        Self {
            free_head: ptr::null_mut(),
            pages: 0,
            free: 0,
        }
    }

    /// Map one more RWX page and thread its slots onto the free list.
    fn grow(&mut self) -> Result<(), SlabError> {
        if self.pages >= MAX_PAGES {
            return Err(SlabError::Exhausted);
        }

        let page = map_rwx_page();
        for i in (0..SLOTS_PER_PAGE).rev() {
            // SAFETY: `page` spans PAGE_SIZE bytes and every slot start is
            // usize-aligned, so the link store stays in bounds.
            unsafe {
                let slot = page.add(i * SLOT_SIZE) as *mut usize;
                *slot = self.free_head as usize;
                self.free_head = slot;
            }
        }

        self.pages += 1;
        self.free += SLOTS_PER_PAGE;
        log::debug!(
            "code slab grew to {} page(s), {} free slot(s)",
            self.pages,
            self.free
        );
        Ok(())
    }

    fn acquire(&mut self) -> Result<NonNull<u8>, SlabError> {
        if self.free_head.is_null() {
            self.grow()?;
        }

        let slot = self.free_head;
        // SAFETY: a non-null head always points at a free slot whose first
        // word is the successor link.
        self.free_head = unsafe { *slot } as *mut usize;
        self.free -= 1;
        // SAFETY: slots are carved from non-null mappings.
        Ok(unsafe { NonNull::new_unchecked(slot as *mut u8) })
    }

    fn release(&mut self, slot: NonNull<u8>) {
        let link = slot.as_ptr() as *mut usize;
        // SAFETY: the slot is exclusively ours again; reusing its first word
        // as the free-list link is what the intrusive list is for.
        unsafe {
            *link = self.free_head as usize;
        }
        self.free_head = link;
        self.free += 1;
    }
}

static CODE_SLAB: Mutex<CodeSlab> = Mutex::new(CodeSlab::new());

fn map_rwx_page() -> *mut u8 {
    let prot = Prot::READ | Prot::WRITE | Prot::EXEC;
    // SAFETY: anonymous private mapping with no backing fd; the kernel picks
    // the address.
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            PAGE_SIZE,
            prot.bits(),
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        // An executable page can only come from the OS; nothing to fall
        // back to.
        panic!(
            "code slab: executable page mapping failed: {}",
            std::io::Error::last_os_error()
        );
    }
    addr as *mut u8
}

/// Owning handle to one RWX slot. Dropping it returns the slot to the slab;
/// the slot's address never changes while the handle lives.
pub struct CodeSlot {
    ptr: NonNull<u8>,
}

impl CodeSlot {
    /// Start of the slot's [`SLOT_SIZE`] bytes.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Slot start as a plain address, for imm64 emission.
    #[inline]
    pub fn addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }
}

impl Drop for CodeSlot {
    fn drop(&mut self) {
        CODE_SLAB.lock().release(self.ptr);
        log::trace!("released code slot {:p}", self.ptr);
    }
}

/// Pop one free slot, growing the slab if needed.
///
/// The returned region is readable, writable and executable, 256-byte
/// aligned, and stays mapped at the same address until the handle drops.
pub fn acquire() -> Result<CodeSlot, SlabError> {
    let ptr = CODE_SLAB.lock().acquire()?;
    log::trace!("acquired code slot {:p}", ptr);
    Ok(CodeSlot { ptr })
}

/// Number of currently free slots.
pub fn free_slots() -> usize {
    CODE_SLAB.lock().free
}

/// Total slots carved so far (free and in use).
pub fn capacity() -> usize {
    CODE_SLAB.lock().pages * SLOTS_PER_PAGE
}
