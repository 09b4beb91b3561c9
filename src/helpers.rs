//! Small display and form helpers shared by the front ends.

use serde::Serialize;

use crate::supabase::types::SupabaseError;

/// Minimum password length accepted before a sign-in or sign-up request.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Initials for an avatar: first letter of the first and last word.
#[must_use]
pub fn avatar_text(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let initial = |word: &str| word.chars().next().map(|c| c.to_uppercase().collect::<String>()).unwrap_or_default();
    match words.as_slice() {
        [] => String::new(),
        [only] => initial(*only),
        [first, .., last] => initial(*first) + &initial(*last),
    }
}

/// Submission state of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAction {
    pub form_process: bool,
    pub form_status: u16,
    pub form_error_message: String,
    pub form_success_message: String,
}

impl Default for FormAction {
    fn default() -> Self {
        Self {
            form_process: false,
            form_status: 200,
            form_error_message: String::new(),
            form_success_message: String::new(),
        }
    }
}

impl FormAction {
    /// State while a request is in flight.
    #[must_use]
    pub fn processing() -> Self {
        Self { form_process: true, ..Self::default() }
    }

    /// Final state for a finished request.
    #[must_use]
    pub fn from_result<T>(result: &Result<T, SupabaseError>, success_message: &str) -> Self {
        match result {
            Ok(_) => Self { form_success_message: success_message.to_owned(), ..Self::default() },
            Err(e) => Self::from_error(e),
        }
    }

    /// Failed state: the remote status when there is one, else 500.
    #[must_use]
    pub fn from_error(error: &SupabaseError) -> Self {
        let message = match error {
            SupabaseError::ApiResponse { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            form_status: error.status().unwrap_or(500),
            form_error_message: message,
            ..Self::default()
        }
    }
}

/// Trim and check credentials before they leave the process.
///
/// # Errors
///
/// Returns a user-facing message when a field is missing or the password
/// is too short.
pub fn validate_credentials(email: &str, password: &str) -> Result<(String, String), &'static str> {
    let email = email.trim();
    if email.is_empty() {
        return Err("email is required");
    }
    if password.trim().is_empty() {
        return Err("password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("password must be at least 6 characters");
    }
    Ok((email.to_owned(), password.to_owned()))
}

#[cfg(test)]
#[path = "helpers_test.rs"]
mod tests;
