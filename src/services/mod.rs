pub mod asset_fetcher;
pub mod captcha_gate;
pub mod cookie_jar;
pub mod drive_fallback;
pub mod form_driver;
pub mod text_spinner;

pub use asset_fetcher::{AssetFetcher, FallbackDownloader, RetryPolicy};
pub use captcha_gate::{CaptchaGate, StdinGate};
pub use cookie_jar::CookieJar;
pub use drive_fallback::DriveFallback;
pub use form_driver::{FormDriver, FormState, PublishOutcome};
pub use text_spinner::TextSpinner;
