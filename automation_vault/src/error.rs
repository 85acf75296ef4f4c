use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum VaultError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidConfig = 4,
    InvalidAmount = 5,
    Overflow = 6,
    InsufficientGas = 7,
    /// A deferred entry point was reached by anything other than a call this
    /// vault registered against itself.
    UnauthorizedInvocation = 8,
    InsufficientBalance = 9,
    InsufficientAllowance = 10,
    SwapLegFailed = 11,
    SystemicSwapFailure = 12,
    ScheduleNotFound = 13,
    MaxRetriesExceeded = 14,
    JobNotFound = 15,
    JobAlreadyActive = 16,
    JobNotActive = 17,
    JobNotPaused = 18,
    Reentrancy = 19,
    VaultPaused = 20,
    InvalidAllocation = 21,
}
