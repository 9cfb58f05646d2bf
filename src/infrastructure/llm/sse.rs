//! Server-sent events decoding for streaming provider APIs

use futures::stream::{self, StreamExt};

use super::http_client::ByteStream;
use crate::domain::llm::{AiStream, AiStreamEvent, ProviderCallError};

/// One decoded server-sent event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE decoder
///
/// Network chunks may split lines (and UTF-8 sequences) anywhere, so bytes
/// are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flushes an event left unterminated at end of stream
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }

        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }

        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

pub type TranslatedEvents = Vec<Result<AiStreamEvent, ProviderCallError>>;

/// Provider-specific mapping from SSE events to stream events
pub trait SseTranslator: Send + 'static {
    fn on_event(&mut self, event: SseEvent) -> TranslatedEvents;

    /// Called once when the body ends
    fn on_end(&mut self) -> TranslatedEvents;
}

/// Turns a raw SSE body into a provider full stream
pub fn translate<T: SseTranslator>(bytes: ByteStream, translator: T) -> AiStream {
    let state = Some((bytes, SseDecoder::new(), translator));

    let stream = stream::unfold(state, |state| async move {
        let (mut bytes, mut decoder, mut translator) = state?;

        match bytes.next().await {
            Some(Ok(chunk)) => {
                let events = decoder
                    .push(&chunk)
                    .into_iter()
                    .flat_map(|event| translator.on_event(event))
                    .collect::<Vec<_>>();
                Some((events, Some((bytes, decoder, translator))))
            }
            Some(Err(e)) => Some((vec![Err(e)], Some((bytes, decoder, translator)))),
            None => {
                let mut events = match decoder.finish() {
                    Some(event) => translator.on_event(event),
                    None => Vec::new(),
                };
                events.extend(translator.on_end());
                Some((events, None))
            }
        }
    })
    .flat_map(stream::iter);

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"event: message_start\nda").is_empty());
        let events = decoder.push(b"ta: {\"a\":1}\n\ndata: second\r\n\r\n");

        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: Some("message_start".to_string()),
                    data: "{\"a\":1}".to_string(),
                },
                SseEvent {
                    event: None,
                    data: "second".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\ndata: one\ndata: two\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: ¡hola!\n\n".as_bytes();

        assert!(decoder.push(&bytes[..7]).is_empty());
        let events = decoder.push(&bytes[7..]);

        assert_eq!(events[0].data, "¡hola!");
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());

        assert_eq!(decoder.finish().unwrap().data, "[DONE]");
        assert!(decoder.finish().is_none());
    }

    struct EchoTranslator;

    impl SseTranslator for EchoTranslator {
        fn on_event(&mut self, event: SseEvent) -> TranslatedEvents {
            vec![Ok(AiStreamEvent::TextDelta(event.data))]
        }

        fn on_end(&mut self) -> TranslatedEvents {
            vec![Ok(AiStreamEvent::Finish {
                finish_reason: crate::domain::llm::FinishReason::Stop,
            })]
        }
    }

    #[test]
    fn test_translate_forwards_events_then_end() {
        let chunks: Vec<Result<bytes::Bytes, ProviderCallError>> = vec![
            Ok(bytes::Bytes::from_static(b"data: a\n\nda")),
            Err(ProviderCallError::other("connection reset")),
            Ok(bytes::Bytes::from_static(b"ta: b\n\n")),
        ];
        let body: ByteStream = Box::pin(stream::iter(chunks));

        let events: Vec<_> = tokio_test::block_on(translate(body, EchoTranslator).collect());

        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], Ok(AiStreamEvent::TextDelta(text)) if text == "a"));
        assert!(events[1].is_err());
        assert!(matches!(&events[2], Ok(AiStreamEvent::TextDelta(text)) if text == "b"));
        assert!(matches!(&events[3], Ok(AiStreamEvent::Finish { .. })));
    }
}
