pub mod plan;
pub mod restore;
pub mod run;

/// Process exit status of a `rampart` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Run completed, or the operator stopped before anything changed
    Success = 0,
    /// Fatal abort, interrupt, or a rollback that needs attention
    Failure = 1,
    Privilege = 2,
    /// Bad configuration or arguments
    Usage = 3,
}

impl Exit {
    pub fn code(self) -> i32 {
        self as i32
    }
}
