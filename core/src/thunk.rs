//! Byte-level thunk emission.
//!
//! A thunk rebinds a call arriving with some signature's ABI so that the
//! dispatcher receives the captured-object pointer prepended to the original
//! arguments. Integer-class registers shift one position right to open
//! `rdi`; XMM registers are never touched, since the injected pointer is
//! integer-class. When the shift displaces the sixth integer argument out of
//! `r9`, the thunk additionally rebuilds the outgoing stack-argument area
//! (see [`emit`], spill form).
//!
//! The instruction encodings below are the contract: hard-coded byte
//! triplets for the register shifts, `REX.W` moves with little-endian imm64
//! payloads for the two absolute operands, and indirect `jmp`/`call`
//! opcodes. Emission is plain byte pushes into a fixed buffer; x86 needs no
//! I-cache maintenance afterwards.

use trampoline_abi::{INTEGER_REGISTERS, MAX_ARGS, SSE_REGISTERS};
use trampoline_mm::SLOT_SIZE;

/// Register-shift table for argument slots 1→2 through 5→6.
const SHIFTS: [[u8; 3]; 5] = [
    [0x48, 0x89, 0xFE], // mov rsi, rdi
    [0x48, 0x89, 0xF2], // mov rdx, rsi
    [0x48, 0x89, 0xD1], // mov rcx, rdx
    [0x49, 0x89, 0xC8], // mov r8, rcx
    [0x4D, 0x89, 0xC1], // mov r9, r8
];

const MOV_RDI_IMM64: [u8; 2] = [0x48, 0xBF]; // mov rdi, imm64
const MOV_RAX_IMM64: [u8; 2] = [0x48, 0xB8]; // mov rax, imm64
const JMP_RAX: [u8; 2] = [0xFF, 0xE0];
const CALL_RAX: [u8; 2] = [0xFF, 0xD0];

const MOV_R11_RETADDR: [u8; 4] = [0x4C, 0x8B, 0x1C, 0x24]; // mov r11, [rsp]
const MOV_R10_R9: [u8; 3] = [0x4D, 0x89, 0xCA]; // mov r10, r9
const MOV_RAX_RSP: [u8; 3] = [0x48, 0x89, 0xE0]; // mov rax, rsp
const ADD_RAX_IMM32: [u8; 2] = [0x48, 0x05]; // add rax, imm32
const ADD_RSP_8: [u8; 4] = [0x48, 0x83, 0xC4, 0x08]; // add rsp, 8
const CMP_RAX_RSP: [u8; 3] = [0x48, 0x39, 0xE0]; // cmp rax, rsp
const JE_SLIDE_DONE: [u8; 2] = [0x74, 0x0F]; // je +15, past the loop body
const MOV_RDI_SLOT: [u8; 4] = [0x48, 0x8B, 0x3C, 0x24]; // mov rdi, [rsp]
const MOV_SLOT_DOWN: [u8; 5] = [0x48, 0x89, 0x7C, 0x24, 0xF8]; // mov [rsp-8], rdi
const JMP_SLIDE_HEAD: [u8; 2] = [0xEB, 0xEC]; // jmp -20, back to the cmp
const PARK_RETADDR: [u8; 5] = [0x4C, 0x89, 0x5C, 0x24, 0xF8]; // mov [rsp-8], r11
const SUB_RSP_IMM32: [u8; 3] = [0x48, 0x81, 0xEC]; // sub rsp, imm32
const SPILL_SIXTH: [u8; 4] = [0x4C, 0x89, 0x14, 0x24]; // mov [rsp], r10
const RELOAD_RETADDR: [u8; 4] = [0x4C, 0x8B, 0x5C, 0x24]; // mov r11, [rsp+disp8]
const RESTORE_RETADDR: [u8; 4] = [0x4C, 0x89, 0x1C, 0x24]; // mov [rsp], r11
const RET: [u8; 1] = [0xC3];

/// An emitted thunk body and its exact byte count.
pub struct Thunk {
    buf: [u8; SLOT_SIZE],
    len: usize,
}

impl Thunk {
    fn new() -> Self {
        Self {
            buf: [0; SLOT_SIZE],
            len: 0,
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    fn put_u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.put(&value.to_le_bytes());
    }

    /// The emitted bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Exact number of bytes emitted.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing was emitted yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Emit the thunk for a signature with `integer_args` INTEGER-class and
/// `sse_args` SSE-class parameters, binding `object` as the injected first
/// argument and `dispatcher` as the transfer target.
///
/// Register form (`integer_args < 6`): shift registers `n..1` one slot
/// right, load `object` into `rdi`, tail-jump to the dispatcher. The
/// dispatcher returns straight to the original caller; stack arguments (only
/// possible from SSE spill here) are already exactly where the dispatcher
/// expects them.
///
/// Spill form (`integer_args >= 6`): the injected pointer displaces the
/// sixth integer argument out of `r9`, so the outgoing stack area must be
/// rebuilt one slot lower. With `k = (integer_args - 6) + max(sse_args - 8, 0)`
/// existing stack arguments and entry `rsp = E`:
///
/// 1. save the return address from `[E]` in `r11` and the displaced sixth
///    argument in `r10`;
/// 2. run all five register shifts;
/// 3. slide each stack argument down one slot (`[E+8i]` → `[E+8(i-1)]`),
///    leaving the arguments at `E..E+8(k-1)`;
/// 4. park the return address in the slot the slide vacated at the top,
///    `[E+8k]`, above the outgoing argument area where the dispatcher cannot
///    touch it (`r10`/`r11` are dead across the call);
/// 5. drop `rsp` to `E-8` and store the displaced argument there: the
///    dispatcher's stack arguments now start immediately above its return
///    address, in source order, on a 16-byte-aligned frame;
/// 6. `call` the dispatcher (a tail-jump would leave no way to rebalance);
/// 7. re-install the parked return address at `[E]` and `ret`.
pub fn emit(integer_args: usize, sse_args: usize, object: u64, dispatcher: u64) -> Thunk {
    assert!(
        integer_args + sse_args <= MAX_ARGS,
        "unsupported argument count"
    );

    let mut code = Thunk::new();
    if integer_args < INTEGER_REGISTERS {
        for i in (0..integer_args).rev() {
            code.put(&SHIFTS[i]);
        }
        code.put(&MOV_RDI_IMM64);
        code.put_u64(object);
        code.put(&MOV_RAX_IMM64);
        code.put_u64(dispatcher);
        code.put(&JMP_RAX);
    } else {
        let stack_args =
            (integer_args - INTEGER_REGISTERS) + sse_args.saturating_sub(SSE_REGISTERS);

        code.put(&MOV_R11_RETADDR);
        code.put(&MOV_R10_R9);
        for shift in SHIFTS.iter().rev() {
            code.put(shift);
        }

        // Slide loop: rax marks one slot past the argument area.
        code.put(&MOV_RAX_RSP);
        code.put(&ADD_RAX_IMM32);
        code.put_u32(8 * (stack_args as u32 + 1));
        code.put(&ADD_RSP_8);
        code.put(&CMP_RAX_RSP);
        code.put(&JE_SLIDE_DONE);
        code.put(&MOV_RDI_SLOT);
        code.put(&MOV_SLOT_DOWN);
        code.put(&ADD_RSP_8);
        code.put(&JMP_SLIDE_HEAD);

        code.put(&PARK_RETADDR);
        code.put(&SUB_RSP_IMM32);
        code.put_u32(8 * (stack_args as u32 + 2));
        code.put(&SPILL_SIXTH);
        code.put(&MOV_RDI_IMM64);
        code.put_u64(object);
        code.put(&MOV_RAX_IMM64);
        code.put_u64(dispatcher);
        code.put(&CALL_RAX);
        code.put(&RELOAD_RETADDR);
        code.put(&[8 * (stack_args as u8 + 1)]);
        code.put(&ADD_RSP_8);
        code.put(&RESTORE_RETADDR);
        code.put(&RET);
    }

    debug_assert!(code.len() <= SLOT_SIZE);
    code
}
