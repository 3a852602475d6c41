//! Gemini Live websocket client.
//!
//! One websocket per session. A writer task owns the write half and is fed
//! through an mpsc channel, so the sink can be shared between the client
//! relay loop and tool tasks. The read half is handed to the caller as the
//! event stream.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Map;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::config::GeminiLiveConfig;
use super::messages::{
    ClientContentMessage, Content, GenerationConfig, PrebuiltVoiceConfig, Setup, SetupMessage,
    SpeechConfig, ToolDeclarations, ToolResponseMessage, VoiceConfig, is_setup_complete,
    parse_server_message,
};
use crate::core::tools::ToolResponse;
use crate::core::upstream::base::{
    LiveSessionConfig, UpstreamConnector, UpstreamError, UpstreamEvent, UpstreamEvents,
    UpstreamResult, UpstreamSession, UpstreamSink,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the outgoing message channel
const WS_CHANNEL_CAPACITY: usize = 256;

/// Connector for the Gemini Live `BidiGenerateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> Self {
        Self { config }
    }

    fn build_setup(&self, session: LiveSessionConfig) -> SetupMessage {
        let tools = if session.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: session.tools,
            }]
        };

        SetupMessage {
            setup: Setup {
                model: self.config.model_resource(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: session
                                    .voice
                                    .unwrap_or_else(|| self.config.voice.clone()),
                            },
                        },
                    },
                    enable_affective_dialog: true,
                },
                system_instruction: Content::text(None, session.system_instruction),
                tools,
                output_audio_transcription: Map::new(),
            },
        }
    }
}

#[async_trait]
impl UpstreamConnector for GeminiLiveConnector {
    async fn connect(&self, session: LiveSessionConfig) -> UpstreamResult<UpstreamSession> {
        let url = self.config.build_ws_url()?;
        let timeout = self.config.connect_timeout;

        let (ws_stream, _response) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| UpstreamError::Timeout("connecting to Gemini Live".to_string()))?
                .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let setup = serde_json::to_string(&self.build_setup(session))
            .map_err(|e| UpstreamError::Serialization(e.to_string()))?;
        ws_sink
            .send(Message::Text(setup.into()))
            .await
            .map_err(|e| UpstreamError::WebSocket(e.to_string()))?;

        tokio::time::timeout(
            timeout,
            wait_for_setup_complete(&mut ws_sink, &mut ws_stream),
        )
        .await
        .map_err(|_| UpstreamError::Timeout("waiting for setupComplete".to_string()))??;

        info!(model = %self.config.model, "Connected to Gemini Live");

        let (tx, rx) = mpsc::channel::<Message>(WS_CHANNEL_CAPACITY);
        tokio::spawn(run_writer(ws_sink, rx));

        Ok(UpstreamSession {
            sink: Arc::new(GeminiSink {
                tx: tx.clone(),
                closed: AtomicBool::new(false),
            }),
            events: Box::new(GeminiEvents {
                stream: ws_stream,
                pong_tx: tx,
                finished: false,
            }),
        })
    }

    fn name(&self) -> &'static str {
        "gemini-live"
    }
}

/// Read until the server acknowledges the setup message.
async fn wait_for_setup_complete(
    sink: &mut SplitSink<WsStream, Message>,
    stream: &mut SplitStream<WsStream>,
) -> UpstreamResult<()> {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if setup_acknowledged(text.as_bytes())? {
                    return Ok(());
                }
            }
            Ok(Message::Binary(data)) => {
                if setup_acknowledged(&data)? {
                    return Ok(());
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = sink.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| format!("{}: {}", u16::from(f.code), f.reason.as_str()))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Err(UpstreamError::Closed(reason));
            }
            Ok(other) => {
                debug!("Ignoring message before setupComplete: {:?}", other);
            }
            Err(e) => return Err(UpstreamError::WebSocket(e.to_string())),
        }
    }

    Err(UpstreamError::Closed(
        "stream ended before setupComplete".to_string(),
    ))
}

fn setup_acknowledged(raw: &[u8]) -> UpstreamResult<bool> {
    let acknowledged = is_setup_complete(raw).map_err(|e| {
        UpstreamError::Protocol(format!("malformed message before setupComplete: {e}"))
    })?;
    if !acknowledged {
        debug!("Ignoring server message before setupComplete");
    }
    Ok(acknowledged)
}

/// Own the write half until the channel closes or a close frame is sent.
async fn run_writer(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        let should_close = matches!(message, Message::Close(_));

        if let Err(e) = sink.send(message).await {
            if !should_close {
                error!("Failed to send Gemini Live message: {}", e);
            }
            break;
        }

        if should_close {
            break;
        }
    }
    debug!("Gemini Live writer stopped");
}

struct GeminiSink {
    tx: mpsc::Sender<Message>,
    closed: AtomicBool,
}

impl GeminiSink {
    async fn send(&self, message: Message) -> UpstreamResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(UpstreamError::NotConnected);
        }
        self.tx
            .send(message)
            .await
            .map_err(|_| UpstreamError::NotConnected)
    }

    async fn send_json<T: serde::Serialize>(&self, value: &T) -> UpstreamResult<()> {
        let json =
            serde_json::to_string(value).map_err(|e| UpstreamError::Serialization(e.to_string()))?;
        self.send(Message::Text(json.into())).await
    }
}

#[async_trait]
impl UpstreamSink for GeminiSink {
    async fn send_frame(&self, frame: Bytes) -> UpstreamResult<()> {
        self.send(Message::Binary(frame)).await
    }

    async fn send_tool_response(&self, response: ToolResponse) -> UpstreamResult<()> {
        self.send_json(&ToolResponseMessage::from(response)).await
    }

    async fn send_text(&self, text: &str) -> UpstreamResult<()> {
        self.send_json(&ClientContentMessage::user_text(text)).await
    }

    async fn close(&self) -> UpstreamResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // The writer may already be gone if the upstream dropped first
        let _ = self.tx.send(Message::Close(None)).await;
        Ok(())
    }
}

struct GeminiEvents {
    stream: SplitStream<WsStream>,
    pong_tx: mpsc::Sender<Message>,
    finished: bool,
}

#[async_trait]
impl UpstreamEvents for GeminiEvents {
    async fn next_event(&mut self) -> Option<UpstreamResult<UpstreamEvent>> {
        if self.finished {
            return None;
        }

        loop {
            let Some(message) = self.stream.next().await else {
                self.finished = true;
                return None;
            };

            match message {
                Ok(Message::Text(text)) => {
                    return Some(Ok(parse_server_message(Bytes::copy_from_slice(
                        text.as_bytes(),
                    ))));
                }
                Ok(Message::Binary(data)) => return Some(Ok(parse_server_message(data))),
                Ok(Message::Ping(data)) => {
                    if self.pong_tx.send(Message::Pong(data)).await.is_err() {
                        warn!("Failed to queue pong, writer is gone");
                    }
                }
                Ok(Message::Close(frame)) => {
                    self.finished = true;
                    return match frame {
                        Some(f) if f.code != CloseCode::Normal => {
                            Some(Err(UpstreamError::Closed(format!(
                                "{}: {}",
                                u16::from(f.code),
                                f.reason.as_str()
                            ))))
                        }
                        _ => {
                            info!("Gemini Live session closed by server");
                            None
                        }
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(UpstreamError::WebSocket(e.to_string())));
                }
            }
        }
    }
}
