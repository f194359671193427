use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL};

use crate::{
    ChunkSource, StreamClientConfig, StreamError, StreamMethod, StreamRequest, StreamTransport,
};

#[derive(Debug, Clone)]
/// `reqwest`-backed transport for `text/event-stream` responses.
pub struct HttpTransport {
    client: reqwest::Client,
    config: StreamClientConfig,
}

impl HttpTransport {
    pub fn new(config: StreamClientConfig) -> Result<Self, StreamError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(token) = &config.auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|e| {
                    StreamError::InvalidConfig(format!("invalid auth token header: {e}"))
                })?,
            );
        }
        for (raw_name, raw_value) in &config.extra_headers {
            let name = HeaderName::from_bytes(raw_name.as_bytes()).map_err(|e| {
                StreamError::InvalidConfig(format!("invalid header name '{raw_name}': {e}"))
            })?;
            let value = HeaderValue::from_str(raw_value).map_err(|e| {
                StreamError::InvalidConfig(format!("invalid value for header '{raw_name}': {e}"))
            })?;
            headers.insert(name, value);
        }

        // No whole-request timeout: the body is expected to stay open.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_millis(
                config.connect_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StreamClientConfig {
        &self.config
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn ChunkSource>, StreamError> {
        let builder = match request.method {
            StreamMethod::Get => self.client.get(&request.url),
            StreamMethod::Post => {
                let builder = self.client.post(&request.url);
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(StreamError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("text/event-stream"))
            .unwrap_or(false);
        if !is_event_stream {
            tracing::debug!(
                url = %request.url,
                "stream response is not labelled text/event-stream; decoding anyway"
            );
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Box::new(HttpChunkSource {
            stream: Some(stream),
        }))
    }
}

struct HttpChunkSource {
    stream: Option<BoxStream<'static, Result<Vec<u8>, reqwest::Error>>>,
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        let stream = self.stream.as_mut()?;
        stream
            .next()
            .await
            .map(|chunk| chunk.map_err(StreamError::from))
    }

    fn close(&mut self) {
        // Dropping the body stream aborts the underlying connection.
        if self.stream.take().is_some() {
            tracing::debug!("released http stream body");
        }
    }
}
