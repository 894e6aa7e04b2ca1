//! Shared HTTP constants (headers, problem URIs, static strings).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://turnstile.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://turnstile.dev/problems/unauthorized";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://turnstile.dev/problems/bad-request";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://turnstile.dev/problems/service-unavailable";

pub(crate) const MSG_INVALID_BODY: &str = "Invalid request body";
pub(crate) const MSG_FIELDS_REQUIRED: &str = "Username and password are required";

pub(crate) const VERSION_TEXT: &str = concat!(
    "Auth API, written in Rust (turnstile ",
    env!("CARGO_PKG_VERSION"),
    ")\n"
);

pub(crate) const SECURITY_XSS_PROTECTION: &str = "1; mode=block";
pub(crate) const SECURITY_CONTENT_TYPE_OPTIONS: &str = "nosniff";
pub(crate) const SECURITY_FRAME_OPTIONS: &str = "DENY";
pub(crate) const SECURITY_HSTS: &str = "max-age=3600";
