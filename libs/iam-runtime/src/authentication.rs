use crate::context::RequestContext;
use crate::error::{Error, ErrorKind};
use crate::proto::authentication::{ValidateCredentialRequest, validate_credential_response};

impl RequestContext {
    /// Ask the runtime whether `credential` is valid.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::RuntimeNotFound`] when the carrier has no runtime with
    ///   the authentication capability
    /// - [`ErrorKind::CredentialValidationRequestFailed`] when the call fails
    ///   or the carrier is cancelled
    /// - [`ErrorKind::InvalidCredential`] when the runtime rejects the
    ///   credential
    pub async fn validate_credential(&self, credential: &str) -> Result<(), Error> {
        let client = self
            .runtime()
            .and_then(|runtime| runtime.authentication())
            .ok_or_else(|| Error::new(ErrorKind::RuntimeNotFound).with_context("authentication"))?;

        let resp = self
            .call(client.validate_credential(ValidateCredentialRequest::new(credential)))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "credential validation request failed");
                Error::wrap(ErrorKind::CredentialValidationRequestFailed, e)
            })?;

        if resp.result == validate_credential_response::Result::Invalid as i32 {
            tracing::debug!(subject = ?self.subject(), "credential rejected by runtime");
            return Err(Error::new(ErrorKind::InvalidCredential));
        }

        Ok(())
    }
}
