//! Executable memory management for emitted thunks.
//!
//! One process-global slab hands out fixed-size read+write+execute slots,
//! each large enough for the largest thunk the generator produces. Slot
//! addresses stay stable for the lifetime of the process; a thunk is never
//! relocated behind the back of the function pointers that reference it.

#[cfg(not(all(target_arch = "x86_64", unix)))]
compile_error!("trampoline-mm requires a 64-bit x86 System V target");

pub mod slab;


pub use slab::{CodeSlot, SlabError, acquire, capacity, free_slots, SLOT_SIZE};
