//! Test utilities for authbroker
//!
//! This module provides common test utilities including temporary directory
//! management, test file creation, and assertion helpers.

use crate::error::Result;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
///
/// # Examples
///
/// ```
/// use authbroker::test_utils::temp_dir;
///
/// let dir = temp_dir();
/// let path = dir.path();
/// ```
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Arguments
///
/// * `dir` - Directory to create the file in
/// * `name` - Name of the file
/// * `content` - Content to write to the file
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Registration file body pointing at `base` for both endpoints.
pub fn registration_json(label: &str, base: &str) -> String {
    serde_json::json!({
        "label": label,
        "clientid": "client-id",
        "clientsecret": "client-secret",
        "authurl": format!("{base}/auth"),
        "tokenurl": format!("{base}/token"),
    })
    .to_string()
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
///
/// # Examples
///
/// ```
/// use authbroker::error::BrokerError;
/// use authbroker::test_utils::assert_error_contains;
///
/// let result: authbroker::Result<()> = Err(BrokerError::NotFound("svc-a".to_string()).into());
/// assert_error_contains(result, "svc-a");
/// ```
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "svc.json", "{}");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }

    #[test]
    fn test_registration_json_parses() {
        let value: serde_json::Value =
            serde_json::from_str(&registration_json("A", "http://idp")).unwrap();
        assert_eq!(value["tokenurl"], "http://idp/token");
    }

    #[test]
    #[should_panic(expected = "but got Ok")]
    fn test_assert_error_contains_panics_on_ok() {
        assert_error_contains(Ok(()), "anything");
    }

    #[test]
    fn test_assert_error_contains_matches() {
        let result: Result<()> = Err(BrokerError::Config("bad port".to_string()).into());
        assert_error_contains(result, "bad port");
    }
}
