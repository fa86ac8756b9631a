//! S3Storage Integration Tests
//!
//! Exercises the SDK-backed [`ObjectStore`] against a wiremock S3 endpoint
//! (path-style, as with the local emulator).

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use docvault_gateway::config::AwsConfig;
    use docvault_gateway::s3::{ObjectStore, S3Storage, StorageError};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn storage_for(mock_server: &MockServer) -> S3Storage {
        let config = AwsConfig {
            use_local_endpoint: true,
            local_endpoint: mock_server.uri(),
            timeout_seconds: 5,
            ..AwsConfig::default()
        };
        S3Storage::from_config(&config).await
    }

    fn list_xml(prefix: &str, keys: &[(&str, u64)], next_token: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|(key, size)| {
                format!(
                    "<Contents><Key>{}</Key><LastModified>2023-11-14T22:13:20.000Z</LastModified>\
                     <ETag>\"etag\"</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                    key, size
                )
            })
            .collect();
        let truncation = match next_token {
            Some(token) => format!(
                "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
                token
            ),
            None => "<IsTruncated>false</IsTruncated>".to_string(),
        };
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Name>ai-powered-documents</Name><Prefix>{}</Prefix><KeyCount>{}</KeyCount>\
             <MaxKeys>1000</MaxKeys>{}{}</ListBucketResult>",
            prefix,
            keys.len(),
            truncation,
            contents
        )
    }

    // ========================================================================
    // PutObject
    // ========================================================================

    #[tokio::test]
    async fn test_put_object_returns_etag() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/ai-powered-documents/user-1/1700000000000-notes.txt"))
            .and(header("content-type", "text/plain"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"5d41402abc4b2a76b9719d911017c592\""),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let output = storage
            .put_object(
                "ai-powered-documents",
                "user-1/1700000000000-notes.txt",
                Bytes::from("hello"),
                "text/plain",
            )
            .await
            .unwrap();

        assert_eq!(output.bucket, "ai-powered-documents");
        assert_eq!(output.key, "user-1/1700000000000-notes.txt");
        assert_eq!(
            output.etag.as_deref(),
            Some("\"5d41402abc4b2a76b9719d911017c592\"")
        );
    }

    #[tokio::test]
    async fn test_put_object_server_error_is_unavailable_without_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(500).set_body_raw(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>InternalError</Code>\
                     <Message>We encountered an internal error.</Message></Error>",
                    "application/xml",
                ),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let result = storage
            .put_object("ai-powered-documents", "user-1/1-a.txt", Bytes::from("x"), "text/plain")
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_put_object_unreachable_endpoint() {
        let config = AwsConfig {
            use_local_endpoint: true,
            local_endpoint: "http://127.0.0.1:1".into(),
            timeout_seconds: 5,
            ..AwsConfig::default()
        };
        let storage = S3Storage::from_config(&config).await;

        let result = storage
            .put_object("ai-powered-documents", "user-1/1-a.txt", Bytes::from("x"), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    // ========================================================================
    // HeadObject
    // ========================================================================

    #[tokio::test]
    async fn test_head_object_metadata() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/ai-powered-resumes/user-1/1700000000000-cv.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 2048])
                    .insert_header("Content-Type", "application/pdf")
                    .insert_header("Last-Modified", "Tue, 14 Nov 2023 22:13:20 GMT")
                    .insert_header("x-amz-meta-origin", "gateway"),
            )
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let metadata = storage
            .head_object("ai-powered-resumes", "user-1/1700000000000-cv.pdf")
            .await
            .unwrap();

        assert_eq!(metadata.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(metadata.size, 2048);
        assert_eq!(
            metadata.last_modified.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(
            metadata.metadata.get("origin").map(String::as_str),
            Some("gateway")
        );
    }

    #[tokio::test]
    async fn test_head_object_missing_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let result = storage
            .head_object("ai-powered-resumes", "user-1/1-missing.pdf")
            .await;

        match result {
            Err(StorageError::NotFound { bucket, key }) => {
                assert_eq!(bucket, "ai-powered-resumes");
                assert_eq!(key, "user-1/1-missing.pdf");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_head_object_forbidden_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let result = storage.head_object("ai-powered-resumes", "user-1/1-a.pdf").await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    // ========================================================================
    // ListObjectsV2
    // ========================================================================

    #[tokio::test]
    async fn test_list_objects_with_prefix() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex("^/ai-powered-documents/?$"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "user-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                list_xml(
                    "user-1/",
                    &[("user-1/1-a.txt", 5), ("user-1/2-b.pdf", 1024)],
                    None,
                ),
                "application/xml",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let objects = storage
            .list_objects("ai-powered-documents", "user-1/")
            .await
            .unwrap();

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "user-1/1-a.txt");
        assert_eq!(objects[0].size, 5);
        assert_eq!(objects[1].size, 1024);
        assert!(objects[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_list_objects_empty_prefix_is_empty_vec() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex("^/ai-powered-documents/?$"))
            .and(query_param("list-type", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                list_xml("nobody/", &[], None),
                "application/xml",
            ))
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let objects = storage
            .list_objects("ai-powered-documents", "nobody/")
            .await
            .unwrap();
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_list_objects_follows_continuation_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex("^/ai-powered-documents/?$"))
            .and(query_param("continuation-token", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                list_xml("user-1/", &[("user-1/3-c.txt", 3)], None),
                "application/xml",
            ))
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex("^/ai-powered-documents/?$"))
            .and(query_param("list-type", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                list_xml(
                    "user-1/",
                    &[("user-1/1-a.txt", 1), ("user-1/2-b.txt", 2)],
                    Some("page-2"),
                ),
                "application/xml",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = storage_for(&mock_server).await;
        let keys: Vec<String> = storage
            .list_objects("ai-powered-documents", "user-1/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();

        assert_eq!(
            keys,
            vec!["user-1/1-a.txt", "user-1/2-b.txt", "user-1/3-c.txt"]
        );
    }

    // ========================================================================
    // Presigning
    // ========================================================================

    #[tokio::test]
    async fn test_presign_put_makes_no_request() {
        let mock_server = MockServer::start().await;
        let storage = storage_for(&mock_server).await;

        let url = storage
            .presign_put(
                "ai-powered-resumes",
                "user-1/1700000000000-cv.pdf",
                "application/pdf",
                Duration::from_secs(900),
            )
            .await
            .unwrap();

        assert!(url.starts_with(&format!(
            "{}/ai-powered-resumes/user-1/1700000000000-cv.pdf?",
            mock_server.uri()
        )));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("content-type"));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_presign_get_rejects_expiry_beyond_seven_days() {
        let mock_server = MockServer::start().await;
        let storage = storage_for(&mock_server).await;

        let result = storage
            .presign_get(
                "ai-powered-resumes",
                "user-1/1-cv.pdf",
                Duration::from_secs(8 * 24 * 3600),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
