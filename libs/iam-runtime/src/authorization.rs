use crate::context::RequestContext;
use crate::error::{Error, ErrorKind};
use crate::proto::authorization::{
    AccessRequestAction, CheckAccessRequest, CreateRelationshipsRequest,
    CreateRelationshipsResponse, DeleteRelationshipsRequest, DeleteRelationshipsResponse,
    check_access_response,
};

impl RequestContext {
    /// Check every action in `actions` for the carrier's credential, in one
    /// remote call.
    ///
    /// Order and duplicates are sent as given. An empty list is still sent.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::TokenNotFound`] when no decoded credential is attached
    /// - [`ErrorKind::RuntimeNotFound`] when the carrier has no runtime with
    ///   the authorization capability
    /// - [`ErrorKind::AccessCheckFailed`] when the call fails or the carrier is
    ///   cancelled
    /// - [`ErrorKind::AccessDenied`] when the runtime denies the request
    pub async fn check_access(&self, actions: Vec<AccessRequestAction>) -> Result<(), Error> {
        let token = self
            .token()
            .ok_or_else(|| Error::new(ErrorKind::TokenNotFound))?;
        let client = self
            .runtime()
            .and_then(|runtime| runtime.authorization())
            .ok_or_else(|| Error::new(ErrorKind::RuntimeNotFound).with_context("authorization"))?;

        let action_count = actions.len();
        let request = CheckAccessRequest {
            credential: token.raw().to_owned(),
            actions,
        };

        let resp = self
            .call(client.check_access(request))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, action_count, "access check request failed");
                Error::wrap(ErrorKind::AccessCheckFailed, e)
            })?;

        if resp.result == check_access_response::Result::Denied as i32 {
            tracing::debug!(subject = ?self.subject(), action_count, "access denied");
            return Err(Error::new(ErrorKind::AccessDenied));
        }

        Ok(())
    }

    /// Check access for alternating `resource_id, action` arguments.
    ///
    /// ```ignore
    /// ctx.check_access_to(&["loadbal-1", "loadbalancer_get", "loadbal-2", "loadbalancer_update"])
    ///     .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidPairing`] when `pairs` has odd length, checked
    /// before anything else. Otherwise as [`RequestContext::check_access`].
    pub async fn check_access_to<S: AsRef<str>>(&self, pairs: &[S]) -> Result<(), Error> {
        if !pairs.len().is_multiple_of(2) {
            return Err(Error::new(ErrorKind::InvalidPairing)
                .with_context(format!("got {} arguments", pairs.len())));
        }

        let actions = pairs
            .chunks_exact(2)
            .map(|pair| AccessRequestAction::new(pair[0].as_ref(), pair[1].as_ref()))
            .collect();

        self.check_access(actions).await
    }

    /// Create relationships from a resource to subjects.
    ///
    /// No credential is required. Nothing is retried; after a transport
    /// failure the remote state is unknown.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::RuntimeNotFound`] when the carrier has no runtime with
    ///   the authorization capability
    /// - [`ErrorKind::RelationshipRequestFailed`] when the call fails or the
    ///   carrier is cancelled
    pub async fn create_relationships(
        &self,
        request: CreateRelationshipsRequest,
    ) -> Result<CreateRelationshipsResponse, Error> {
        let client = self
            .runtime()
            .and_then(|runtime| runtime.authorization())
            .ok_or_else(|| Error::new(ErrorKind::RuntimeNotFound).with_context("authorization"))?;

        let resource_id = request.resource_id.clone();
        self.call(client.create_relationships(request))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, %resource_id, "create relationships request failed");
                Error::wrap(ErrorKind::RelationshipRequestFailed, e).with_context("create")
            })
    }

    /// Delete relationships from a resource to subjects.
    ///
    /// # Errors
    ///
    /// As [`RequestContext::create_relationships`].
    pub async fn delete_relationships(
        &self,
        request: DeleteRelationshipsRequest,
    ) -> Result<DeleteRelationshipsResponse, Error> {
        let client = self
            .runtime()
            .and_then(|runtime| runtime.authorization())
            .ok_or_else(|| Error::new(ErrorKind::RuntimeNotFound).with_context("authorization"))?;

        let resource_id = request.resource_id.clone();
        self.call(client.delete_relationships(request))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, %resource_id, "delete relationships request failed");
                Error::wrap(ErrorKind::RelationshipRequestFailed, e).with_context("delete")
            })
    }
}
