use validator::Validate;

use crate::api::errors::ApiError;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))
}
