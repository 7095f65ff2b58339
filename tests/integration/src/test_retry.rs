//! Retry and re-signing tests.

#[cfg(test)]
mod tests {
    use securecn_client::ClientError;
    use serde_json::Value;

    use crate::MockSecureCn;

    #[tokio::test]
    async fn test_should_resign_each_retry_attempt() {
        let server = MockSecureCn::start_with_unavailable(2).await.unwrap();
        let client = server.client(2).unwrap();

        let body: Value = client.get_json("/deployers").await.unwrap();
        assert_eq!(body["target"], "GET /deployers");

        let recorded = server.recorded();
        assert_eq!(recorded.len(), 3);
        for attempt in &recorded {
            assert!(attempt.verified, "attempt {attempt:?} was not signed correctly");
            assert_eq!(attempt.auth_headers.len(), 1);
            assert_eq!(attempt.date_headers.len(), 1);
        }
        server.stop();
    }

    #[tokio::test]
    async fn test_should_surface_unavailable_after_retries_exhausted() {
        let server = MockSecureCn::start_with_unavailable(5).await.unwrap();
        let client = server.client(1).unwrap();

        let result = client.get_json::<Value>("/deployers").await;

        assert!(
            matches!(result, Err(ClientError::Api { status: 503, .. })),
            "unexpected result: {result:?}"
        );
        assert_eq!(server.recorded().len(), 2);
        server.stop();
    }

    #[tokio::test]
    async fn test_should_not_retry_rejected_signature() {
        let server = MockSecureCn::start().await.unwrap();
        let config = server.config("d3Jvbmc=", 3);
        let client = securecn_client::SecureCnClient::from_config(&config)
            .unwrap()
            .with_retry_base_delay(std::time::Duration::from_millis(10));

        let result = client.delete("/deployers/1").await;

        assert!(matches!(result, Err(ClientError::Unauthorized { status: 401, .. })));
        assert_eq!(server.recorded().len(), 1);
        server.stop();
    }
}
