//! Result type used across the crate

use crate::core::error::AppError;

/// Application result type alias
///
/// # Examples
///
/// ```rust
/// use mk_volume_checkout::core::result::AppResult;
/// use mk_volume_checkout::core::error::AppError;
///
/// fn example_function() -> AppResult<String> {
///     Ok("Success".to_string())
/// }
///
/// fn failing_function() -> AppResult<()> {
///     Err(AppError::validation("Invalid input"))
/// }
/// ```
pub type AppResult<T> = std::result::Result<T, AppError>;
