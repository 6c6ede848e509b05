use crate::Error;

/// Uniform `{ success, data?, error? }` response of the comment endpoints.
///
/// Callers must branch on `success`, not on the HTTP status.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Envelope<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// `Error::contents` of the failure, to rebuild a typed error client-side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<serde_json::Value>,
}

impl Envelope<()> {
    pub fn success() -> Envelope<()> {
        Envelope {
            success: true,
            data: None,
            error: None,
            error_detail: None,
        }
    }
}

impl<T> Envelope<T> {
    pub fn with_data(data: T) -> Envelope<T> {
        Envelope {
            success: true,
            data: Some(data),
            error: None,
            error_detail: None,
        }
    }

    pub fn failure(err: &Error) -> Envelope<T> {
        Envelope {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_detail: Some(err.contents()),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, Error> {
        if self.success {
            return Ok(self.data);
        }
        let message = self
            .error
            .unwrap_or_else(|| String::from("request failed without an error message"));
        Err(self
            .error_detail
            .and_then(|d| Error::parse(&d).ok())
            .unwrap_or(Error::Unknown(message)))
    }
}
