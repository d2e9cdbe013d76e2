//! UseCase: credential issuance

use std::sync::Arc;

use kizuna_shared::api::CreateTokenRequest;

use crate::domain::{
    AccessCredential, BackendError, ChannelName, ParticipantId, Role, SessionBackend,
    SessionError,
};

/// Asks the backend for a credential scoped to one channel and one role.
///
/// Never caches: every join attempt gets a freshly issued credential.
pub struct TokenIssuer {
    backend: Arc<dyn SessionBackend>,
}

impl TokenIssuer {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Issue a credential for `channel_name` under `role`.
    ///
    /// # Returns
    ///
    /// * `Ok(AccessCredential)` - token and local participant id
    /// * `Err(SessionError::TokenIssuanceFailed)` - backend error or empty token
    pub async fn issue(
        &self,
        channel_name: &ChannelName,
        role: Role,
    ) -> Result<AccessCredential, SessionError> {
        let request = CreateTokenRequest {
            channel_name: channel_name.as_str().to_string(),
            role: role.into(),
        };

        let response = self
            .backend
            .create_token(request)
            .await
            .map_err(SessionError::TokenIssuanceFailed)?;

        if response.token.trim().is_empty() {
            return Err(SessionError::TokenIssuanceFailed(BackendError::Incomplete(
                "token",
            )));
        }

        tracing::debug!(channel = %channel_name, uid = response.uid, %role, "Token issued");

        Ok(AccessCredential {
            token: response.token,
            local_participant_id: ParticipantId::new(response.uid),
            role,
            channel_name: channel_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backend::MockSessionBackend;
    use kizuna_shared::api::{ApiRole, CreateTokenResponse};

    fn channel(name: &str) -> ChannelName {
        ChannelName::try_from(name).unwrap()
    }

    #[tokio::test]
    async fn test_issue_returns_scoped_credential() {
        // テスト項目: 発行されたクレデンシャルがチャンネルとロールに紐付く
        // given (前提条件):
        let mut backend = MockSessionBackend::new();
        backend
            .expect_create_token()
            .withf(|req| req.channel_name == "room-9" && req.role == ApiRole::Subscriber)
            .times(1)
            .returning(|_| {
                Ok(CreateTokenResponse {
                    token: "tok".to_string(),
                    uid: 42,
                })
            });
        let issuer = TokenIssuer::new(Arc::new(backend));

        // when (操作):
        let credential = issuer
            .issue(&channel("room-9"), Role::Subscriber)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(credential.token, "tok");
        assert_eq!(credential.local_participant_id, ParticipantId::new(42));
        assert_eq!(credential.role, Role::Subscriber);
        assert!(credential.is_scoped_to(&channel("room-9")));
    }

    #[tokio::test]
    async fn test_issue_never_caches() {
        // テスト項目: 同じチャンネルでも呼び出すたびにバックエンドへ問い合わせる
        // given (前提条件):
        let mut backend = MockSessionBackend::new();
        let mut uid = 0;
        backend.expect_create_token().times(2).returning(move |_| {
            uid += 1;
            Ok(CreateTokenResponse {
                token: format!("tok-{}", uid),
                uid,
            })
        });
        let issuer = TokenIssuer::new(Arc::new(backend));

        // when (操作):
        let first = issuer.issue(&channel("room"), Role::Publisher).await.unwrap();
        let second = issuer.issue(&channel("room"), Role::Publisher).await.unwrap();

        // then (期待する結果):
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn test_issue_failure_is_token_issuance_failed() {
        // テスト項目: バックエンドのエラーは TokenIssuanceFailed として返される
        // given (前提条件):
        let mut backend = MockSessionBackend::new();
        backend.expect_create_token().times(1).returning(|_| {
            Err(BackendError::Status {
                status: 404,
                message: "unknown channel".to_string(),
            })
        });
        let issuer = TokenIssuer::new(Arc::new(backend));

        // when (操作):
        let result = issuer.issue(&channel("room"), Role::Publisher).await;

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            SessionError::TokenIssuanceFailed(BackendError::Status {
                status: 404,
                message: "unknown channel".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_issue_rejects_empty_token() {
        // テスト項目: 空のトークンは不完全なレスポンスとして扱われる
        // given (前提条件):
        let mut backend = MockSessionBackend::new();
        backend.expect_create_token().times(1).returning(|_| {
            Ok(CreateTokenResponse {
                token: String::new(),
                uid: 1,
            })
        });
        let issuer = TokenIssuer::new(Arc::new(backend));

        // when (操作):
        let result = issuer.issue(&channel("room"), Role::Publisher).await;

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            SessionError::TokenIssuanceFailed(BackendError::Incomplete("token"))
        );
    }
}
