//! Batch endpoints of the Uplink API.

use std::path::Component;

use reqwest::multipart::{Form, Part};
use uplink_core::validation::{validate_case_id, validate_quality};
use uplink_core::{
    BatchHandle, BatchRequest, BatchStatusResponse, UploadError, UploadItem, UploadQueue,
};

use crate::ApiClient;

impl ApiClient {
    fn batches_path(&self) -> String {
        format!("{}/batches", self.api_prefix())
    }

    /// Submit every queued item as one batch.
    ///
    /// Validation runs before anything touches the network. Exactly one request is
    /// sent; on failure the queue is left untouched and the single error is returned.
    /// On success queued items move to `uploading` and per-file acknowledgments are
    /// applied.
    #[tracing::instrument(
        skip(self, queue, request),
        fields(case_id = %request.case_id(), files = queue.pending().len())
    )]
    pub async fn submit_batch(
        &self,
        queue: &mut UploadQueue,
        request: &BatchRequest,
    ) -> Result<BatchHandle, UploadError> {
        queue.ensure_submittable()?;
        validate_case_id(request.case_id())?;
        validate_quality(request.quality(), self.upload_options())?;

        let form = build_form(&queue.pending(), request).await?;
        let handle: BatchHandle = self.post_multipart(&self.batches_path(), form).await?;

        if handle.batch_id.trim().is_empty() {
            return Err(UploadError::InvalidResponse(
                "Submission response carried an empty batch_id".to_string(),
            ));
        }

        queue.mark_submitted();
        queue.apply_acks(&handle.files);

        tracing::info!(
            batch_id = %handle.batch_id,
            acknowledged = handle.files.len(),
            "Batch submitted"
        );
        Ok(handle)
    }

    /// Re-query the server-side status of a batch.
    pub async fn get_batch_status(
        &self,
        batch_id: &str,
    ) -> Result<BatchStatusResponse, UploadError> {
        let path = format!("{}/{}", self.batches_path(), urlencoding::encode(batch_id));
        self.get(&path, &[]).await
    }
}

async fn build_form(items: &[&UploadItem], request: &BatchRequest) -> Result<Form, UploadError> {
    let mut form = Form::new();

    for item in items {
        let bytes = read_item(item).await?;
        let part = Part::bytes(bytes)
            .file_name(item.filename.clone())
            .mime_str(&item.mime_type)
            .map_err(|e| {
                UploadError::InvalidFile(format!("{}: bad MIME type: {}", item.filename, e))
            })?;
        form = form.part("files", part).text("file_ids", item.id.clone());
    }

    for (name, value) in request.form_fields() {
        form = form.text(name, value);
    }

    Ok(form)
}

async fn read_item(item: &UploadItem) -> Result<Vec<u8>, UploadError> {
    let Some(path) = item.path.as_deref() else {
        return Err(UploadError::InvalidFile(format!(
            "{} has no local source",
            item.filename
        )));
    };
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(UploadError::InvalidFile(format!(
            "Invalid input: {}",
            path.display()
        )));
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| UploadError::InvalidFile(format!("Failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::io::Write;
    use uplink_core::{ClientConfig, UploadOptions, UploadStatus};

    fn client_for(server: &mockito::Server) -> ApiClient {
        let mut config = ClientConfig::for_api_url(&server.url());
        config.api_key = Some("secret".to_string());
        ApiClient::new(&config).unwrap()
    }

    fn queue_with_files(dir: &tempfile::TempDir, ids: &[&str]) -> UploadQueue {
        let mut queue = UploadQueue::new();
        for id in ids {
            let path = dir.path().join(format!("{id}.mp4"));
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(b"not really a video").unwrap();
            let item = UploadItem::from_path(&path).unwrap().with_id(*id);
            queue.add(item);
        }
        queue
    }

    fn request(case_id: &str) -> BatchRequest {
        BatchRequest::new(case_id, "high", true, false, &UploadOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn empty_queue_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/batches")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut queue = UploadQueue::new();
        let err = client
            .submit_batch(&mut queue, &request("case-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::EmptyQueue));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn successful_submission_marks_items_uploading() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/batches")
            .match_header("x-api-key", "secret")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="case_id""#.to_string()),
                Matcher::Regex(r#"filename="f-1.mp4""#.to_string()),
                Matcher::Regex(r#"filename="f-2.mp4""#.to_string()),
                Matcher::Regex(r#"name="quality"\r\n\r\nhigh"#.to_string()),
                Matcher::Regex(r#"name="transcription"\r\n\r\ntrue"#.to_string()),
            ]))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"batch_id":"b-1","files":[{"id":"f-1","status":"received"},{"id":"f-2","status":"processing"},{"id":"other","status":"received"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut queue = queue_with_files(&dir, &["f-1", "f-2"]);
        let client = client_for(&server);

        let handle = client
            .submit_batch(&mut queue, &request("  case-1  "))
            .await
            .unwrap();

        assert_eq!(handle.batch_id, "b-1");
        assert_eq!(handle.files.len(), 3);
        assert_eq!(queue.get("f-1").unwrap().status, UploadStatus::Uploading);
        assert_eq!(queue.get("f-2").unwrap().status, UploadStatus::Processing);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_leaves_queue_untouched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/batches")
            .with_status(422)
            .with_body("case not found")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut queue = queue_with_files(&dir, &["f-1", "f-2"]);
        let client = client_for(&server);

        let err = client
            .submit_batch(&mut queue, &request("case-1"))
            .await
            .unwrap_err();

        match err {
            UploadError::SubmissionRejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "case not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(queue
            .items()
            .iter()
            .all(|item| item.status == UploadStatus::Queued));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn undecodable_success_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v0/batches")
            .with_status(200)
            .with_body("<html>ok</html>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut queue = queue_with_files(&dir, &["f-1"]);
        let err = client_for(&server)
            .submit_batch(&mut queue, &request("case-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidResponse(_)));
        assert_eq!(queue.get("f-1").unwrap().status, UploadStatus::Queued);
    }

    #[tokio::test]
    async fn item_without_source_is_rejected_locally() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/batches")
            .expect(0)
            .create_async()
            .await;

        let mut queue = UploadQueue::new();
        queue.add(UploadItem::new("ghost.mp4", 10, "video/mp4"));
        let err = client_for(&server)
            .submit_batch(&mut queue, &request("case-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidFile(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn quality_outside_client_options_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/batches")
            .expect(0)
            .create_async()
            .await;

        let mut config = ClientConfig::for_api_url(&server.url());
        config.upload_options.quality_values = vec!["low".to_string()];
        config.upload_options.default_quality = "low".to_string();
        let client = ApiClient::new(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut queue = queue_with_files(&dir, &["f-1"]);
        let err = client
            .submit_batch(&mut queue, &request("case-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidQuality { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn batch_status_is_fetched_by_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v0/batches/b%2F1")
            .with_status(200)
            .with_body(r#"{"batch_id":"b/1","status":"processing","progress":40.0,"files":[]}"#)
            .create_async()
            .await;

        let status = client_for(&server).get_batch_status("b/1").await.unwrap();
        assert_eq!(status.batch_id, "b/1");
        assert_eq!(status.progress, Some(40.0));
        mock.assert_async().await;
    }
}
