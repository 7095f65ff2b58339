//! Signature acceptance and rejection tests.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use securecn_auth::{
        AuthError, CredentialScope, Credentials, EscherSigner, RequestAuthenticator, SigningTime,
    };
    use securecn_client::{ClientError, ReqwestRequest, SecureCnClient};
    use serde_json::{Value, json};

    use crate::{MockSecureCn, TEST_ACCESS_KEY, TEST_SECRET_KEY_B64};

    #[tokio::test]
    async fn test_should_accept_signed_get_with_query() {
        let server = MockSecureCn::start().await.unwrap();
        let client = server.client(0).unwrap();

        let body: Value = client
            .get_json("/api/kubernetesClusters?offset=0&limit=10")
            .await
            .unwrap();

        assert_eq!(body["accessKeyId"], TEST_ACCESS_KEY);
        let recorded = server.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].verified);
        assert_eq!(recorded[0].auth_headers.len(), 1);
        assert_eq!(recorded[0].date_headers.len(), 1);
        server.stop();
    }

    #[tokio::test]
    async fn test_should_accept_signed_json_bodies() {
        let server = MockSecureCn::start().await.unwrap();
        let client = server.client(0).unwrap();

        let created: Value = client
            .post_json("/kubernetesClusters", &json!({ "name": "test" }))
            .await
            .unwrap();
        assert_eq!(created["body"], r#"{"name":"test"}"#);

        let updated: Value = client
            .put_json("/kubernetesClusters/1", &json!({ "name": "renamed" }))
            .await
            .unwrap();
        assert_eq!(updated["target"], "PUT /kubernetesClusters/1");

        client.delete("/kubernetesClusters/1").await.unwrap();

        assert!(server.recorded().iter().all(|r| r.verified));
        assert_eq!(server.recorded().len(), 3);
        server.stop();
    }

    #[tokio::test]
    async fn test_should_reject_wrong_secret_as_unauthorized() {
        let server = MockSecureCn::start().await.unwrap();
        // base64 of "not-the-right-secret"
        let config = server.config("bm90LXRoZS1yaWdodC1zZWNyZXQ=", 0);
        let client = SecureCnClient::from_config(&config).unwrap();

        let result = client.get_json::<Value>("/deployers").await;

        match result {
            Err(ClientError::Unauthorized { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("signature"), "unexpected message: {message}");
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
        assert!(!server.recorded()[0].verified);
        server.stop();
    }

    #[tokio::test]
    async fn test_should_reject_stale_signature() {
        let server = MockSecureCn::start().await.unwrap();
        let credentials = Credentials::from_base64(TEST_ACCESS_KEY, TEST_SECRET_KEY_B64).unwrap();
        let signer = EscherSigner::new(credentials, CredentialScope::securecn());

        let mut request = reqwest::Request::new(
            reqwest::Method::GET,
            format!("{}/deployers", server.endpoint).parse().unwrap(),
        );
        let stale = SigningTime::from_datetime(Utc::now() - Duration::minutes(10));
        signer
            .authenticate_request_at(&mut ReqwestRequest::new(&mut request), stale)
            .unwrap();

        let response = reqwest::Client::new().execute(request).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await.unwrap();
        assert!(
            body["message"]
                .as_str()
                .is_some_and(|m| m.contains("outside the accepted window"))
        );
        server.stop();
    }

    #[tokio::test]
    async fn test_should_not_send_when_unconfigured() {
        let server = MockSecureCn::start().await.unwrap();
        let authenticator = RequestAuthenticator::new();

        let mut request = reqwest::Request::new(
            reqwest::Method::GET,
            format!("{}/deployers", server.endpoint).parse().unwrap(),
        );
        let result = authenticator.authenticate_request(&mut ReqwestRequest::new(&mut request));

        assert!(matches!(result, Err(AuthError::NotConfigured)));
        assert!(server.recorded().is_empty());
        server.stop();
    }
}
