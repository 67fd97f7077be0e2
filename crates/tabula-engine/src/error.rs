use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid job parameters: {0}")]
    InvalidJobParameters(String),

    #[error("transient session fault: {0}")]
    TransientSessionFault(String),

    #[error("session exhausted: refresh recovery failed: {0}")]
    SessionExhausted(String),

    #[error("result page parse failed: {0}")]
    ResultParse(String),

    #[error("browser error: {0}")]
    Browser(#[from] tabula_browser::BrowserError),

    #[error("captcha error: {0}")]
    Captcha(#[from] tabula_captcha::CaptchaError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
