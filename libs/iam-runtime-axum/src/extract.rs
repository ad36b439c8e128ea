//! Handler access to the authenticated [`RequestContext`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use iam_runtime::proto::authorization::{
    CreateRelationshipsRequest, CreateRelationshipsResponse, DeleteRelationshipsRequest,
    DeleteRelationshipsResponse,
};
use iam_runtime::{AccessRequestAction, Error, ErrorKind, RequestContext};

use crate::error::IamError;

/// Extractor for the [`RequestContext`] inserted by the IAM middleware.
///
/// Rejects with a 500 problem when the middleware is not installed.
#[derive(Debug, Clone)]
pub struct Iam(pub RequestContext);

impl<S> FromRequestParts<S> for Iam
where
    S: Send + Sync,
{
    type Rejection = IamError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Iam)
            .ok_or_else(|| {
                Error::new(ErrorKind::RuntimeNotFound)
                    .with_context("IAM middleware not configured")
                    .into()
            })
    }
}

impl Iam {
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.0
    }

    /// Subject of the validated credential, empty when it has none.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.0.subject().unwrap_or_default()
    }

    /// # Errors
    ///
    /// See [`RequestContext::check_access`].
    pub async fn check_access(&self, actions: Vec<AccessRequestAction>) -> Result<(), IamError> {
        Ok(self.0.check_access(actions).await?)
    }

    /// Check `(resource_id, action)` pairs:
    ///
    /// ```ignore
    /// async fn update(iam: Iam, Path(id): Path<String>) -> Result<StatusCode, IamError> {
    ///     iam.check_access_to(&[id.as_str(), "loadbalancer_update"]).await?;
    ///     Ok(StatusCode::NO_CONTENT)
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`RequestContext::check_access_to`].
    pub async fn check_access_to<S: AsRef<str>>(&self, pairs: &[S]) -> Result<(), IamError> {
        Ok(self.0.check_access_to(pairs).await?)
    }

    /// # Errors
    ///
    /// See [`RequestContext::create_relationships`].
    pub async fn create_relationships(
        &self,
        request: CreateRelationshipsRequest,
    ) -> Result<CreateRelationshipsResponse, IamError> {
        Ok(self.0.create_relationships(request).await?)
    }

    /// # Errors
    ///
    /// See [`RequestContext::delete_relationships`].
    pub async fn delete_relationships(
        &self,
        request: DeleteRelationshipsRequest,
    ) -> Result<DeleteRelationshipsResponse, IamError> {
        Ok(self.0.delete_relationships(request).await?)
    }
}
