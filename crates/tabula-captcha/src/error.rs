use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptchaError>;

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("failed to resolve captcha image URL from src '{0}'")]
    InvalidImageUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR service error: {0}")]
    Ocr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaptchaError::InvalidImageUrl("garbage".to_string());
        assert!(err.to_string().contains("garbage"));
    }
}
