//! # Memory Layout

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Size of a virtual page and of a physical frame, in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// [`PAGE_SIZE`] as a buffer length.
pub const PAGE_BYTES: usize = 1 << PAGE_SHIFT;

/// Lowest user address a page fault may resolve.
///
/// Everything below is the null guard region; programs are linked to start
/// their text segment here.
pub const USER_CODE_START: u64 = 0x0804_8000;

/// End of the user VA range (exclusive); kernel space begins here.
pub const USER_SPACE_END: u64 = 0xC000_0000;

/// How far below the stack pointer an access may land and still be treated
/// as a stack access. Covers instructions that fault before adjusting the
/// stack pointer, such as `PUSHA` (32 bytes below).
pub const STACK_HEURISTIC_SLACK: u64 = PAGE_SIZE / 8;

/// Maximum size a user stack may grow to.
pub const USER_STACK_LIMIT: u64 = 8 * 1024 * 1024;

/// Lowest address the user stack may grow down to.
pub const USER_STACK_FLOOR: u64 = USER_SPACE_END - USER_STACK_LIMIT;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(USER_CODE_START.is_multiple_of(PAGE_SIZE));
    assert!(USER_SPACE_END.is_multiple_of(PAGE_SIZE));
    assert!(USER_STACK_LIMIT.is_multiple_of(PAGE_SIZE));
    assert!(USER_STACK_FLOOR > USER_CODE_START);
    assert!(STACK_HEURISTIC_SLACK < PAGE_SIZE);
};
