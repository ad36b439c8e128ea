//! Wire messages and generated clients for the IAM runtime services and the
//! standard gRPC health service.
//!
//! Generated by `build.rs` from the contracts vendored under `proto/`:
//!
//! - `iam.runtime.authentication.Authentication`
//! - `iam.runtime.authorization.Authorization`
//! - `iam.runtime.identity.Identity`
//! - `grpc.health.v1.Health`

/// `iam.runtime.authentication`
pub mod authentication {
    #[allow(clippy::all, clippy::pedantic)]
    mod generated {
        tonic::include_proto!("iam.runtime.authentication");
    }

    #[allow(clippy::wildcard_imports)]
    pub use generated::*;

    /// Fully qualified service name.
    pub const SERVICE: &str = "iam.runtime.authentication.Authentication";

    impl ValidateCredentialRequest {
        #[must_use]
        pub fn new(credential: impl Into<String>) -> Self {
            Self {
                credential: credential.into(),
            }
        }
    }
}

/// `iam.runtime.authorization`
pub mod authorization {
    #[allow(clippy::all, clippy::pedantic)]
    mod generated {
        tonic::include_proto!("iam.runtime.authorization");
    }

    #[allow(clippy::wildcard_imports)]
    pub use generated::*;

    /// Fully qualified service name.
    pub const SERVICE: &str = "iam.runtime.authorization.Authorization";

    impl AccessRequestAction {
        #[must_use]
        pub fn new(resource_id: impl Into<String>, action: impl Into<String>) -> Self {
            Self {
                resource_id: resource_id.into(),
                action: action.into(),
            }
        }
    }

    impl Relationship {
        #[must_use]
        pub fn new(relation: impl Into<String>, subject_id: impl Into<String>) -> Self {
            Self {
                relation: relation.into(),
                subject_id: subject_id.into(),
            }
        }
    }

    impl CreateRelationshipsRequest {
        #[must_use]
        pub fn new(resource_id: impl Into<String>, relationships: Vec<Relationship>) -> Self {
            Self {
                resource_id: resource_id.into(),
                relationships,
            }
        }
    }

    impl DeleteRelationshipsRequest {
        #[must_use]
        pub fn new(resource_id: impl Into<String>, relationships: Vec<Relationship>) -> Self {
            Self {
                resource_id: resource_id.into(),
                relationships,
            }
        }
    }
}

/// `iam.runtime.identity`
pub mod identity {
    #[allow(clippy::all, clippy::pedantic)]
    mod generated {
        tonic::include_proto!("iam.runtime.identity");
    }

    #[allow(clippy::wildcard_imports)]
    pub use generated::*;

    /// Fully qualified service name.
    pub const SERVICE: &str = "iam.runtime.identity.Identity";
}

/// `grpc.health.v1`
pub mod health {
    #[allow(clippy::all, clippy::pedantic)]
    mod generated {
        tonic::include_proto!("grpc.health.v1");
    }

    #[allow(clippy::wildcard_imports)]
    pub use generated::*;

    /// Fully qualified service name.
    pub const SERVICE: &str = "grpc.health.v1.Health";
}
