//! Mapping of SDK failures onto ds-core errors

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use ds_core::Error;

const NOT_FOUND_CODES: &[&str] = &["NotFound", "NoSuchKey", "NoSuchBucket", "NoSuchUpload"];

const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

/// Classify an SDK error raised while working on `what`
pub(crate) fn classify<E>(err: SdkError<E, HttpResponse>, what: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_owned);
    classify_parts(
        code.as_deref(),
        status,
        what,
        DisplayErrorContext(&err).to_string(),
    )
}

fn classify_parts(code: Option<&str>, status: Option<u16>, what: &str, message: String) -> Error {
    let code = code.unwrap_or_default();
    if NOT_FOUND_CODES.contains(&code) || status == Some(404) {
        Error::NotFound(what.to_string())
    } else if AUTH_CODES.contains(&code) || matches!(status, Some(401) | Some(403)) {
        Error::AuthenticationRequired("s3".to_string())
    } else {
        Error::Network(message)
    }
}
