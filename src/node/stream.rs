/// Newline-delimited JSON framing for LND streaming endpoints
///
/// Each line is one object, either `{"result": ...}` or `{"error": ...}`.
/// An error frame is the last item the stream yields.
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Result(Value),
    /// The node closed the stream with an error
    Error(String),
    /// Not JSON, or JSON without `result`/`error`. Passed on so the
    /// normalizer can discard it.
    Malformed(String),
}

/// Parse one line. Blank lines yield `None`.
pub fn parse_frame(line: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => return Some(Frame::Malformed(line.to_string())),
    };

    if let Some(result) = value.get_mut("result") {
        return Some(Frame::Result(result.take()));
    }
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(Frame::Error(message));
    }
    Some(Frame::Malformed(line.to_string()))
}

/// Accumulates bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Whatever is left once the body ends.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(rest)
    }
}

struct FrameState<S> {
    body: S,
    splitter: LineSplitter,
    pending: VecDeque<String>,
    body_done: bool,
    errored: bool,
}

/// Turn a chunked response body into frames.
///
/// Ends when the body ends, when the body reports a transport error, or right
/// after an error frame.
pub fn frames<S, B, E>(body: S) -> impl Stream<Item = Frame> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
{
    let state = FrameState {
        body,
        splitter: LineSplitter::default(),
        pending: VecDeque::new(),
        body_done: false,
        errored: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.errored {
            return None;
        }
        loop {
            if let Some(line) = state.pending.pop_front() {
                match parse_frame(&line) {
                    Some(frame) => {
                        if matches!(frame, Frame::Error(_)) {
                            state.errored = true;
                        }
                        return Some((frame, state));
                    }
                    None => continue,
                }
            }
            if state.body_done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.splitter.push(chunk.as_ref());
                    state.pending.extend(lines);
                }
                Some(Err(_)) | None => {
                    state.body_done = true;
                    if let Some(rest) = state.splitter.finish() {
                        state.pending.push_back(rest);
                    }
                }
            }
        }
    })
}
