/// Error handling utilities
pub struct ErrorHandler;

impl ErrorHandler {
    /// Log error and continue (for non-critical errors)
    pub fn log_and_continue(error: impl std::error::Error, context: &str) {
        tracing::warn!(context, error = %error, "continuing after error");
    }
}
