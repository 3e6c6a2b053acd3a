use std::io;

use futures::{future, Stream, StreamExt};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Line-oriented `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (without its terminator); returns a frame on the blank line ending it.
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }

        // Comment, used by servers as keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_owned()),
            "event" => self.event = Some(value.to_owned()),
            "id" => self.id = Some(value.to_owned()),
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();

        if self.data.is_empty() {
            return None;
        }

        let data = self.data.join("\n");
        self.data.clear();

        Some(SseFrame {
            event,
            id: self.id.clone(),
            data,
        })
    }
}

/// Turns a stream of lines into a stream of frames. An unterminated trailing
/// frame is discarded.
pub fn frames<S>(lines: S) -> impl Stream<Item = io::Result<SseFrame>>
where
    S: Stream<Item = io::Result<String>>,
{
    let mut decoder = SseDecoder::new();

    lines.filter_map(move |line| {
        future::ready(match line {
            Ok(line) => decoder.push_line(&line).map(Ok),
            Err(e) => Some(Err(e)),
        })
    })
}

#[cfg(test)]
mod tests {
    use futures::{executor::block_on, stream, TryStreamExt};

    use super::*;

    fn decode_all(lines: &[&str]) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        lines
            .iter()
            .filter_map(|line| decoder.push_line(line))
            .collect()
    }

    #[test]
    fn joins_multi_line_data() {
        let frames = decode_all(&["data: {\"status\":", "data: \"processing\"}", ""]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"status\":\n\"processing\"}");
    }

    #[test]
    fn skips_comments_and_keeps_event_names() {
        let frames = decode_all(&[
            ": keep-alive",
            "",
            "event: progress",
            "id: 7",
            "data:{}",
            "",
            "data: second",
            "",
        ]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("progress"));
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[0].data, "{}");
        assert_eq!(frames[1].event, None);
        assert_eq!(frames[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn tolerates_crlf_terminators() {
        let frames = decode_all(&["data: a\r", "\r"]);
        assert_eq!(frames, vec![SseFrame { event: None, id: None, data: "a".into() }]);
    }

    #[test]
    fn frames_drops_unterminated_tail() {
        let lines = stream::iter(
            ["data: one", "", "data: two"]
                .into_iter()
                .map(|l| Ok::<_, io::Error>(l.to_string())),
        );

        let frames: Vec<SseFrame> = block_on(frames(lines).try_collect()).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "one");
    }
}
