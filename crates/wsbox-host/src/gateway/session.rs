use crate::protocol::{Frame, RequestFrame, parse_request_line};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    AwaitingRequest,
    /// A PUT line has been read; the next binary frame is its payload.
    AwaitingBody { pending: RequestFrame },
}

/// Per-connection request decoder.
///
/// Feeds on frames and yields a complete request whenever one is ready to be
/// handed to the backend. Frames of the wrong kind for the current state, and
/// malformed request lines, are dropped without a response.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn on_frame(&mut self, frame: Frame) -> Option<RequestFrame> {
        match (std::mem::take(&mut self.state), frame) {
            (SessionState::AwaitingRequest, Frame::Text(line)) => match parse_request_line(&line) {
                Ok(request) if request.method.needs_payload() => {
                    self.state = SessionState::AwaitingBody { pending: request };
                    None
                }
                Ok(request) => Some(request),
                Err(err) => {
                    tracing::debug!("dropping request line: {err}");
                    None
                }
            },
            (SessionState::AwaitingBody { mut pending }, Frame::Binary(payload)) => {
                pending.payload = Some(payload);
                Some(pending)
            }
            (state, frame) => {
                tracing::debug!("ignoring {} frame in state {state:?}", frame.kind());
                self.state = state;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::protocol::Method;

    fn text(line: &str) -> Frame {
        Frame::Text(line.to_string())
    }

    fn binary(bytes: &'static [u8]) -> Frame {
        Frame::Binary(Bytes::from_static(bytes))
    }

    #[test]
    fn list_and_get_are_dispatched_immediately() {
        let mut session = Session::new();
        assert_eq!(session.on_frame(text("LIST /")), Some(RequestFrame::list("/")));
        assert_eq!(session.state(), &SessionState::AwaitingRequest);
        assert_eq!(session.on_frame(text("GET /a.txt")), Some(RequestFrame::get("/a.txt")));
        assert_eq!(session.state(), &SessionState::AwaitingRequest);
    }

    #[test]
    fn put_waits_for_its_binary_payload() {
        let mut session = Session::new();
        assert_eq!(session.on_frame(text("PUT /sub/file.bin")), None);
        assert!(matches!(session.state(), SessionState::AwaitingBody { .. }));

        let request = session.on_frame(binary(&[0xDE, 0xAD, 0xBE, 0xEF])).unwrap();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "/sub/file.bin");
        assert_eq!(request.payload.as_deref(), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
        assert_eq!(session.state(), &SessionState::AwaitingRequest);
    }

    #[test]
    fn empty_binary_frame_is_a_valid_payload() {
        let mut session = Session::new();
        session.on_frame(text("PUT /empty"));
        let request = session.on_frame(binary(b"")).unwrap();
        assert_eq!(request.payload, Some(Bytes::new()));
    }

    #[test]
    fn wrong_kind_frames_are_ignored() {
        let mut session = Session::new();
        assert_eq!(session.on_frame(binary(b"stray")), None);
        assert_eq!(session.state(), &SessionState::AwaitingRequest);

        session.on_frame(text("PUT /x"));
        assert_eq!(session.on_frame(text("GET /y")), None);
        assert!(matches!(
            session.state(),
            SessionState::AwaitingBody { pending } if pending.path == "/x"
        ));

        let request = session.on_frame(binary(b"data")).unwrap();
        assert_eq!(request.path, "/x");
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let mut session = Session::new();
        assert_eq!(session.on_frame(text("GET")), None);
        assert_eq!(session.on_frame(text("")), None);
        assert_eq!(session.state(), &SessionState::AwaitingRequest);
        assert_eq!(session.on_frame(text("GET /ok")), Some(RequestFrame::get("/ok")));
    }

    #[test]
    fn scripted_exchange_yields_requests_in_order() {
        let script = vec![
            text("LIST /"),
            binary(b"ignored"),
            text("PUT /a.txt"),
            binary(b"hello"),
            text("GET /a.txt"),
            text("DELETE /a.txt"),
        ];
        let mut session = Session::new();
        let methods: Vec<Method> = script
            .into_iter()
            .filter_map(|frame| session.on_frame(frame))
            .map(|request| request.method)
            .collect();
        assert_eq!(
            methods,
            vec![
                Method::List,
                Method::Put,
                Method::Get,
                Method::Other("DELETE".into())
            ]
        );
    }
}
