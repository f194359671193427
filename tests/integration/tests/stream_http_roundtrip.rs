use std::sync::{Arc, Mutex};

use httpmock::prelude::*;
use serde_json::json;
use vera_events::{known_agent_ids, AgentStatus, PipelineEvent};
use vera_stream::{
    ChatMessageRequest, ChatStream, ConnectionState, Dispatched, EventDispatcher, EventFilter,
    PipelineSessionState, PipelineStream, StreamClientConfig, StreamError, StreamOutcome,
};

fn config_for(server: &MockServer) -> StreamClientConfig {
    StreamClientConfig {
        auth_token: Some("test-token".to_string()),
        ..StreamClientConfig::new(format!("{}/api", server.base_url()))
    }
}

#[tokio::test]
async fn integration_pipeline_stream_dispatches_events_from_http_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/reports/r-7/stream")
            .header("accept", "text/event-stream")
            .header("authorization", "Bearer test-token");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                ": keep-alive\n\n",
                "event: agent_started\r\ndata: {\"agent\":\"verdict_judge\"}\r\nid: 6\r\n\r\n",
                "event: verdict_issued\ndata: {\"agent\":\"verdict_judge\",\"claim_id\":3,",
                "\"verdict\":\"mostly_true\",\"confidence\":0.82}\nid: 7\n\n",
                "event: agent_completed\ndata: {\"agent\":\"verdict_judge\"}\nid: 8\n\n",
                "event: pipeline_completed\ndata: {}\nid: 9\n\n",
            ));
    });

    let stream = PipelineStream::new(config_for(&server)).expect("pipeline stream");
    let dispatcher = EventDispatcher::new();
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let sink = verdicts.clone();
    dispatcher.subscribe(
        EventFilter::tag("verdict_issued"),
        Arc::new(move |dispatched: &Dispatched<PipelineEvent>| {
            if let PipelineEvent::VerdictIssued(verdict) = &dispatched.event {
                sink.lock()
                    .expect("verdicts lock")
                    .push((dispatched.server_id, verdict.verdict.clone()));
            }
        }),
    );

    let (handle, tracker) = stream
        .open_tracked(
            "r-7",
            dispatcher.clone(),
            PipelineSessionState::with_roster(known_agent_ids()),
        )
        .expect("stream opens");
    let completion = handle.join().await.expect("stream completes");

    mock.assert();
    assert_eq!(completion.outcome, StreamOutcome::EndOfStream);
    assert_eq!(completion.summary.dispatched, 4);
    assert_eq!(dispatcher.dispatched_count(), 4);
    assert_eq!(
        *verdicts.lock().expect("verdicts lock"),
        vec![(7, "mostly_true".to_string())]
    );
    let state = tracker.snapshot();
    assert_eq!(state.status("verdict_judge"), AgentStatus::Completed);
    assert!(state.pipeline_complete());
}

#[tokio::test]
async fn integration_chat_stream_posts_message_and_returns_final_answer() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/reports/r-7/chat")
            .header("authorization", "Bearer test-token")
            .json_body(json!({"message": "Who said it?", "conversation_id": "c-2"}));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                "event: chat_token\ndata: {\"token\":\"The \"}\n\n",
                "event: chat_token\ndata: {\"token\":\"minister.\"}\n\n",
                "event: chat_citations\ndata: {\"citations\":[{\"type\":\"evidence\",",
                "\"source_id\":\"e-4\",\"title\":\"Hansard\"}]}\n\n",
                "event: chat_done\ndata: {\"message_id\":12,\"full_content\":\"The minister.\"}\n\n",
            ));
    });

    let stream = ChatStream::new(config_for(&server)).expect("chat stream");
    let reply = stream
        .complete(
            "r-7",
            &ChatMessageRequest::new("Who said it?").with_conversation("c-2"),
            None,
        )
        .await
        .expect("chat completes");

    mock.assert();
    assert_eq!(reply.message_id, "12");
    assert_eq!(reply.content, "The minister.");
    assert_eq!(reply.citations.len(), 1);
    assert_eq!(reply.citations[0].source_type.as_deref(), Some("evidence"));
    assert_eq!(reply.citations[0].title.as_deref(), Some("Hansard"));
}

#[tokio::test]
async fn integration_non_success_status_surfaces_http_status_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/reports/missing/stream");
        then.status(404).body("report not found");
    });

    let stream = PipelineStream::new(config_for(&server)).expect("pipeline stream");
    let handle = stream
        .open("missing", EventDispatcher::new())
        .expect("request is valid");
    let mut state = handle.state_receiver();
    let error = handle.join().await.expect_err("404 fails the stream");

    assert!(error.is_transport());
    match error {
        StreamError::HttpStatus { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("report not found"));
        }
        other => panic!("expected StreamError::HttpStatus, got {other:?}"),
    }
    assert_eq!(*state.borrow_and_update(), ConnectionState::Error);
}

#[tokio::test]
async fn integration_extra_headers_are_sent_with_stream_requests() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/reports/r-1/stream")
            .header("x-vera-client", "integration");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body("event: pipeline_completed\ndata: {}\n\n");
    });

    let mut config = config_for(&server);
    config
        .extra_headers
        .insert("x-vera-client".to_string(), "integration".to_string());
    config.close_on_terminal_event = true;
    let stream = PipelineStream::new(config).expect("pipeline stream");
    let completion = stream
        .open("r-1", EventDispatcher::new())
        .expect("stream opens")
        .join()
        .await
        .expect("stream completes");

    mock.assert();
    assert_eq!(completion.outcome, StreamOutcome::TerminalEvent);
}
