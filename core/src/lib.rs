//! Type-erased callables exportable as plain C-ABI function pointers.
//!
//! A [`Trampoline`] wraps any `Fn` callable of a supported signature and
//! exposes it two ways: direct invocation, and a raw
//! `unsafe extern "C" fn` pointer that any System V AMD64 caller can use as
//! if it were an ordinary free function. The raw view works because each
//! wrapper emits a small per-instance machine-code thunk into an executable
//! slot; the thunk shifts the incoming integer argument registers one
//! position to the right, injects the captured-state pointer into the first
//! slot, relocates stack-resident arguments when the injection displaces a
//! register-class argument, and transfers to a dispatcher monomorphised for
//! the captured callable's type.
//!
//! ```ignore
//! let tr = Trampoline::<fn(i32) -> i32>::new(|x| x + 42)?;
//! assert_eq!(tr.call((5,)), 47);
//!
//! let raw = tr.raw().unwrap();
//! // `raw` is a genuine C-ABI entry point; any FFI consumer may call it
//! // while `tr` is alive.
//! assert_eq!(unsafe { raw(5) }, 47);
//! ```

#[cfg(not(all(target_arch = "x86_64", unix)))]
compile_error!("trampoline requires a 64-bit x86 System V target");

pub mod signature;
pub mod thunk;
mod trampoline;

pub use signature::{Callable, Signature};
pub use trampoline::Trampoline;
pub use trampoline_abi as abi;
pub use trampoline_mm::SlabError;
