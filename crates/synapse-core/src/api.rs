use serde::{Deserialize, Serialize};

/// JSON envelope used by every HTTP route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }

    /// Unwrap the envelope into a plain result.
    pub fn into_result(self) -> std::result::Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("response envelope has no data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "unknown error".to_string())),
        }
    }
}
