//! Wire contract shared by the gateway and the client driver.
//!
//! A request is one text frame `METHOD PATH[ ARG]`; a PUT is followed by
//! exactly one binary frame carrying the whole payload. A response is always a
//! text frame `"<status> <length>"` followed by exactly one binary frame of
//! that length, empty bodies included.

use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

/// Path the legacy `GET` form uses to request a listing.
pub const LIST_ROUTE: &str = "/_list";

/// Characters escaped when a path is placed on a request line or in a URL.
/// `/` is kept so the path stays readable.
pub const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("request line needs a method and a path: '{0}'")]
    MissingPath(String),
    #[error("path is not valid percent-encoded UTF-8: '{0}'")]
    BadPath(String),
    #[error("malformed response header '{0}'")]
    BadHeader(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    List,
    Get,
    Put,
    /// Any token the protocol does not know; answered with 405.
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::List => "LIST",
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Other(token) => token,
        }
    }

    pub fn needs_payload(&self) -> bool {
        matches!(self, Method::Put)
    }
}

/// One message unit on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub method: Method,
    /// Decoded logical path.
    pub path: String,
    /// Optional third field of the request line.
    pub inline_body: Option<String>,
    /// Binary payload; only ever set for PUT.
    pub payload: Option<Bytes>,
}

impl RequestFrame {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            inline_body: None,
            payload: None,
        }
    }

    pub fn list(dir: impl Into<String>) -> Self {
        Self::new(Method::List, dir)
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn put(path: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Self::new(Method::Put, path)
        }
    }

    /// Text frame announcing this request. The payload, if any, travels in the
    /// following binary frame.
    pub fn request_line(&self) -> String {
        let path = escape_path(&self.path);
        match &self.inline_body {
            Some(arg) => format!("{} {path} {arg}", self.method.as_str()),
            None => format!("{} {path}", self.method.as_str()),
        }
    }
}

/// Decode a request line. The returned frame never carries a payload.
pub fn parse_request_line(line: &str) -> Result<RequestFrame, ProtocolError> {
    let mut fields = line.trim().splitn(3, char::is_whitespace);
    let token = fields.next().unwrap_or_default();
    let Some(raw_path) = fields.next().filter(|path| !path.is_empty()) else {
        return Err(ProtocolError::MissingPath(line.to_string()));
    };
    let inline_body = fields.next().map(str::to_string);

    let (raw_path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw_path, None),
    };

    let (method, path) = match token {
        "LIST" => (Method::List, decode_path(raw_path)?),
        "GET" if raw_path == LIST_ROUTE => {
            let dir = match query.map(list_dir_param).transpose()?.flatten() {
                Some(dir) if !dir.is_empty() => dir,
                _ => "/".to_string(),
            };
            (Method::List, dir)
        }
        "GET" => (Method::Get, decode_path(raw_path)?),
        "PUT" | "POST" => (Method::Put, decode_path(raw_path)?),
        other => (Method::Other(other.to_string()), decode_path(raw_path)?),
    };

    Ok(RequestFrame {
        method,
        path,
        inline_body,
        payload: None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub status: u16,
    pub body: Bytes,
}

impl ResponseFrame {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, message.into())
    }

    pub fn header(&self) -> String {
        format!("{} {}", self.status, self.body.len())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: u16,
    pub length: usize,
}

pub fn parse_response_header(text: &str) -> Result<ResponseHeader, ProtocolError> {
    let bad = || ProtocolError::BadHeader(text.to_string());
    let mut fields = text.split_whitespace();
    let (Some(status), Some(length), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(bad());
    };
    Ok(ResponseHeader {
        status: status.parse().map_err(|_| bad())?,
        length: length.parse().map_err(|_| bad())?,
    })
}

pub fn escape_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_ESCAPE).to_string()
}

fn decode_path(raw: &str) -> Result<String, ProtocolError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|_| ProtocolError::BadPath(raw.to_string()))
}

/// Value of `dir` in a form-encoded query string.
fn list_dir_param(query: &str) -> Result<Option<String>, ProtocolError> {
    let Some(value) = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("dir="))
    else {
        return Ok(None);
    };
    decode_path(&value.replace('+', " ")).map(Some)
}
