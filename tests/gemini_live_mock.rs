//! Gemini Live connector against a local mock server

mod common;

use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value, json};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use interview_relay::config::{DEFAULT_MODEL, Secret, UpstreamSettings};
use interview_relay::core::tools::ToolResponse;
use interview_relay::core::upstream::{
    FunctionDeclaration, GeminiLiveConfig, GeminiLiveConnector, LiveSessionConfig,
    UpstreamConnector, UpstreamError,
};

use common::{MockLiveServer, within};

fn connector(server: &MockLiveServer) -> GeminiLiveConnector {
    GeminiLiveConnector::new(GeminiLiveConfig::from(&UpstreamSettings {
        api_key: Some(Secret::new("test-key")),
        endpoint: Some(server.endpoint()),
        connect_timeout_seconds: 5,
        ..Default::default()
    }))
}

fn session_config() -> LiveSessionConfig {
    LiveSessionConfig {
        system_instruction: "You are an MBA admissions interviewer.".to_string(),
        tools: vec![FunctionDeclaration {
            name: "take_interview_notes".to_string(),
            description: "Record an observation".to_string(),
            parameters: json!({"type": "object"}),
        }],
        voice: None,
    }
}

fn text_json(message: Message) -> Value {
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_setup_exchange_and_frame_forwarding() {
    let mut server = MockLiveServer::start().await;
    let session = within(connector(&server).connect(session_config()))
        .await
        .unwrap();

    let setup = text_json(server.next_received().await);
    assert_eq!(setup["setup"]["model"], format!("models/{DEFAULT_MODEL}"));
    assert_eq!(
        setup["setup"]["systemInstruction"]["parts"][0]["text"],
        "You are an MBA admissions interviewer."
    );
    assert_eq!(
        setup["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
            ["voiceName"],
        "Kore"
    );
    assert_eq!(
        setup["setup"]["tools"][0]["functionDeclarations"][0]["name"],
        "take_interview_notes"
    );

    session
        .sink
        .send_frame(Bytes::from_static(b"\x00\x01pcm"))
        .await
        .unwrap();
    match server.next_received().await {
        Message::Binary(data) => assert_eq!(data.as_ref(), b"\x00\x01pcm"),
        other => panic!("expected binary frame, got {other:?}"),
    }

    let mut response = Map::new();
    response.insert("output".to_string(), json!("Note recorded: calm"));
    session
        .sink
        .send_tool_response(ToolResponse {
            id: "call-1".to_string(),
            name: "take_interview_notes".to_string(),
            response,
        })
        .await
        .unwrap();
    let tool_response = text_json(server.next_received().await);
    assert_eq!(
        tool_response["toolResponse"]["functionResponses"][0]["id"],
        "call-1"
    );
    assert_eq!(
        tool_response["toolResponse"]["functionResponses"][0]["response"]["output"],
        "Note recorded: calm"
    );

    session.sink.send_text("Please begin.").await.unwrap();
    let kickoff = text_json(server.next_received().await);
    assert_eq!(
        kickoff["clientContent"]["turns"][0]["parts"][0]["text"],
        "Please begin."
    );
    assert_eq!(kickoff["clientContent"]["turnComplete"], true);
}

#[tokio::test]
async fn test_server_messages_become_events() {
    let mut server = MockLiveServer::start().await;
    let mut session = within(connector(&server).connect(session_config()))
        .await
        .unwrap();
    server.next_received().await;

    let content = json!({
        "serverContent": {
            "modelTurn": {"parts": [{"text": "Welcome to your interview."}]},
            "turnComplete": true
        }
    })
    .to_string();
    server
        .outgoing
        .send(Message::Text(content.clone().into()))
        .unwrap();

    let tool_call = json!({
        "toolCall": {"functionCalls": [
            {"id": "call-7", "name": "get_school_info", "args": {"school_name": "Wharton School"}}
        ]}
    })
    .to_string();
    server
        .outgoing
        .send(Message::Binary(Bytes::from(tool_call)))
        .unwrap();

    server
        .outgoing
        .send(Message::Text("not json".into()))
        .unwrap();

    let event = within(session.events.next_event()).await.unwrap().unwrap();
    assert_eq!(event.raw.as_ref(), content.as_bytes());
    assert_eq!(event.agent_text.as_deref(), Some("Welcome to your interview."));
    assert!(event.turn_complete);

    let event = within(session.events.next_event()).await.unwrap().unwrap();
    assert_eq!(event.tool_calls.len(), 1);
    assert_eq!(event.tool_calls[0].id.as_deref(), Some("call-7"));
    assert_eq!(event.tool_calls[0].args["school_name"], "Wharton School");

    let event = within(session.events.next_event()).await.unwrap().unwrap();
    assert_eq!(event.raw.as_ref(), b"not json");
    assert!(event.tool_calls.is_empty());
    assert!(event.agent_text.is_none());

    server.outgoing.send(Message::Close(None)).unwrap();
    assert!(within(session.events.next_event()).await.is_none());
    assert!(within(session.events.next_event()).await.is_none());
}

#[tokio::test]
async fn test_abnormal_close_is_an_error() {
    let mut server = MockLiveServer::start().await;
    let mut session = within(connector(&server).connect(session_config()))
        .await
        .unwrap();
    server.next_received().await;

    server
        .outgoing
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: "quota exceeded".into(),
        })))
        .unwrap();

    match within(session.events.next_event()).await {
        Some(Err(UpstreamError::Closed(reason))) => assert!(reason.contains("quota exceeded")),
        other => panic!("expected close error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_refused_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = GeminiLiveConnector::new(GeminiLiveConfig::from(&UpstreamSettings {
        api_key: Some(Secret::new("test-key")),
        endpoint: Some(format!("ws://{addr}/live")),
        connect_timeout_seconds: 2,
        ..Default::default()
    }));

    let result = tokio::time::timeout(Duration::from_secs(5), connector.connect(session_config()))
        .await
        .unwrap();
    assert!(matches!(result, Err(UpstreamError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_malformed_setup_reply_is_a_protocol_error() {
    let server = MockLiveServer::start_with_ack(Message::Text("not json".into())).await;

    let result = within(connector(&server).connect(session_config())).await;
    assert!(matches!(result, Err(UpstreamError::Protocol(_))));
}
