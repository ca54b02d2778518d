// Copyright 2026 the PBS client authors. MIT license.
//! Narrow trait interfaces for the external collaborators spec.md §6 lists
//! as "interfaces only, not implemented here": cloud role-credential
//! providers, auth token caches, and KMS clients. Production
//! implementations live outside this workspace (cloud-provider glue); the
//! core only needs the shape of the call so `pbs_transaction_client` can
//! be built and tested against an in-memory double.

use async_trait::async_trait;

use crate::result::ExecutionResultOr;

/// AWS SigV4 signing material for a given account identity. Grounded on
/// `cc/cpio/client_providers/interface/...` role-credentials interfaces
/// referenced by spec.md §6; no implementation is provided here.
#[derive(Debug, Clone)]
pub struct RoleCredentials {
  pub access_key: String,
  pub secret_key: String,
  pub session_token: String,
}

#[async_trait]
pub trait RoleCredentialsProvider: Send + Sync {
  async fn get_role_credentials(
    &self,
    account_identity: &str,
  ) -> ExecutionResultOr<RoleCredentials>;
}

/// GCP bearer token source, refreshed and cached by the implementation.
#[async_trait]
pub trait AuthTokenProviderCache: Send + Sync {
  async fn get_token(&self) -> ExecutionResultOr<String>;
}

/// Decrypts ciphertext via a cloud KMS. Consumed only by bootstrap paths
/// (outside this crate's scope) that must run on `SyncHttpClient`.
#[async_trait]
pub trait KmsClient: Send + Sync {
  async fn decrypt(
    &self,
    ciphertext: &[u8],
    key_resource_name: &str,
  ) -> ExecutionResultOr<Vec<u8>>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::result::failure;
  use crate::result::StatusCode;

  struct AlwaysMissingTokenCache;

  #[async_trait]
  impl AuthTokenProviderCache for AlwaysMissingTokenCache {
    async fn get_token(&self) -> ExecutionResultOr<String> {
      Err(failure(StatusCode::Unknown))
    }
  }

  #[tokio::test]
  async fn trait_object_is_usable_behind_a_dyn_pointer() {
    let cache: Box<dyn AuthTokenProviderCache> = Box::new(AlwaysMissingTokenCache);
    assert!(cache.get_token().await.is_err());
  }
}
