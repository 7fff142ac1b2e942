//! Error type shared by the library and the CLI.
//!
//! Only *malformed input* is an error: negative observations, non-integer
//! counts where integers are required, or a zero-truncation request that
//! leaves no mass to fit. Optimizer non-convergence is expected and handled
//! inside the model-order search (see `opt::OptimStatus`); it never surfaces
//! here.
//!
//! Exit codes (used by the binary):
//! - 2: invalid configuration (bad ranges, zero max order, bad flags)
//! - 3: invalid or degenerate input data
//! - 4: I/O or export failure

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
