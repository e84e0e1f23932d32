//! Integration tests for the chat API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_string, test_app, write_models};

    const ANSWER_SSE: &str = r#"data: {"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}

data: {"id":"c2","choices":[{"index":0,"delta":{"content":"Use "},"finish_reason":null}]}

data: {"id":"c3","choices":[{"index":0,"delta":{"content":"response.usage"},"finish_reason":null}]}

data: {"id":"c4","choices":[{"index":0,"delta":{"content":"."},"finish_reason":null}]}

data: [DONE]

"#;

    fn chat_request(session_id: &str, message: &str, model: Option<&str>) -> Request<Body> {
        let mut payload = json!({
            "session_id": session_id,
            "message": message,
        });
        if let Some(model) = model {
            payload["model"] = json!(model);
        }
        Request::builder()
            .uri("/api/chat")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_string(response.into_body()).await)
    }

    /// Tests a full turn streams the answer and records it with the
    /// retrieved passages
    #[tokio::test]
    async fn it_streams_a_grounded_answer() {
        let mut llm = mockito::Server::new_async().await;
        let mut retriever = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let models_path = write_models(dir.path());

        let retriever_mock = retriever
            .mock("POST", "/api/retrievers/retrieve")
            .match_header("authorization", "Bearer test-retriever-key")
            .match_body(mockito::Matcher::Json(json!({
                "query": "How do I get token usage?",
                "id": "test-retriever-id",
                "k": 3,
            })))
            .with_status(200)
            .with_body(
                json!({
                    "passages": [
                        {"page_content": "response.usage has token counts", "score": 0.81},
                        {"page_content": "Use create_with_completion", "score": 0.64},
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let llm_mock = llm
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-groq-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "llama3-8b-8192",
                "stream": true,
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(ANSWER_SSE)
            .create_async()
            .await;

        let app = test_app(&llm.url(), &retriever.url(), &models_path);

        let response = app
            .clone()
            .oneshot(chat_request("session-1", "How do I get token usage?", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        retriever_mock.assert_async().await;
        llm_mock.assert_async().await;

        assert!(body.contains("event: user"));
        assert!(body.contains(r#"{"content":"response.usage"}"#));
        assert!(body.contains("event: passages"));
        assert!(body.contains("event: done"));
        assert!(!body.contains("event: error"));
        // Fragments arrive before the passages panel
        assert!(body.find("event: delta").unwrap() < body.find("event: passages").unwrap());

        let (status, body) = get(&app, "/api/chat/session-1").await;
        assert_eq!(status, StatusCode::OK);
        let session: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(session["model"], "llama3-8b-8192");
        assert_eq!(session["state"], "rendered");

        let transcript = session["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0]["role"], "user");
        assert_eq!(transcript[0]["content"], "How do I get token usage?");
        assert!(transcript[0].get("chunks").is_none());
        assert_eq!(transcript[1]["role"], "assistant");
        assert_eq!(transcript[1]["content"], "Use response.usage.");
        assert_eq!(transcript[1]["chunks"].as_array().unwrap().len(), 2);
        assert_eq!(transcript[1]["chunks"][0]["score"], 0.81);
    }

    /// Tests a failed retrieval is reported and keeps only the
    /// question in the transcript
    #[tokio::test]
    async fn it_reports_retrieval_failure() {
        let llm = mockito::Server::new_async().await;
        let mut retriever = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let models_path = write_models(dir.path());

        let _retriever_mock = retriever
            .mock("POST", "/api/retrievers/retrieve")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let app = test_app(&llm.url(), &retriever.url(), &models_path);

        let response = app
            .clone()
            .oneshot(chat_request("session-2", "Anything?", None))
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("event: error"));
        assert!(body.contains("500"));
        assert!(!body.contains("event: done"));

        let (_, body) = get(&app, "/api/chat/session-2").await;
        let session: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(session["state"], "failed");
        assert_eq!(session["transcript"].as_array().unwrap().len(), 1);
    }

    /// Tests selecting a model that is not in the catalog is rejected
    #[tokio::test]
    async fn it_rejects_unknown_model() {
        let dir = tempdir().unwrap();
        let models_path = write_models(dir.path());
        let app = test_app("http://localhost:1", "http://localhost:1", &models_path);

        let response = app
            .clone()
            .oneshot(chat_request("session-3", "Hello", Some("gpt-nope")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _) = get(&app, "/api/chat/session-3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Tests getting a chat session that does not exist
    #[tokio::test]
    async fn it_returns_not_found_for_unknown_session() {
        let dir = tempdir().unwrap();
        let models_path = write_models(dir.path());
        let app = test_app("http://localhost:1", "http://localhost:1", &models_path);

        let (status, body) = get(&app, "/api/chat/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("missing"));

        let (status, _) = get(&app, "/api/chat/missing/export").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Tests exporting and clearing a transcript
    #[tokio::test]
    async fn it_exports_and_clears_a_session() {
        let llm = mockito::Server::new_async().await;
        let mut retriever = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let models_path = write_models(dir.path());

        // A failed turn still records the question
        let _retriever_mock = retriever
            .mock("POST", "/api/retrievers/retrieve")
            .with_status(503)
            .create_async()
            .await;

        let app = test_app(&llm.url(), &retriever.url(), &models_path);
        let response = app
            .clone()
            .oneshot(chat_request("session-4", "What is Instructor?", Some("gemma-7b-it")))
            .await
            .unwrap();
        let _ = body_to_string(response.into_body()).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/chat/session-4/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"chat_history.json\""
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = body_to_string(response.into_body()).await;
        let exported: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            exported,
            json!([{"role": "user", "content": "What is Instructor?"}])
        );

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/chat/session-4")
                        .method("DELETE")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let (_, body) = get(&app, "/api/chat/session-4").await;
        let session: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(session["model"], "gemma-7b-it");
        assert_eq!(session["state"], "idle");
        assert!(session["transcript"].as_array().unwrap().is_empty());
    }

    /// Tests ending a session removes it
    #[tokio::test]
    async fn it_ends_a_session() {
        let llm = mockito::Server::new_async().await;
        let mut retriever = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let models_path = write_models(dir.path());

        let _retriever_mock = retriever
            .mock("POST", "/api/retrievers/retrieve")
            .with_status(503)
            .create_async()
            .await;

        let app = test_app(&llm.url(), &retriever.url(), &models_path);
        let response = app
            .clone()
            .oneshot(chat_request("session-5", "What is Instructor?", None))
            .await
            .unwrap();
        let _ = body_to_string(response.into_body()).await;

        let (status, _) = get(&app, "/api/chat/session-5").await;
        assert_eq!(status, StatusCode::OK);

        let end = || {
            Request::builder()
                .uri("/api/chat/session-5/session")
                .method("DELETE")
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(end()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (status, _) = get(&app, "/api/chat/session-5").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&app, "/api/chat/session-5/export").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let response = app.clone().oneshot(end()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // The same id starts over with an empty transcript
        let response = app
            .clone()
            .oneshot(chat_request("session-5", "Again?", None))
            .await
            .unwrap();
        let _ = body_to_string(response.into_body()).await;
        let (_, body) = get(&app, "/api/chat/session-5").await;
        let session: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(session["transcript"].as_array().unwrap().len(), 1);
    }
}
