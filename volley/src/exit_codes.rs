#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run completed but one or more test cases failed.
    TestsFailed = 11,

    /// Invalid CLI/config input (bad flags, unreadable config, invalid run spec).
    InvalidInput = 30,

    /// Target unreachable, bind failures and other runtime errors.
    RuntimeError = 40,

    /// The run was interrupted (Ctrl-C); a partial report was printed.
    Canceled = 41,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_tests(pass: bool) -> Self {
        if pass { Self::Success } else { Self::TestsFailed }
    }
}
