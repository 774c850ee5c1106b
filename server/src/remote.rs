//! Client side of the control service.
//!
//! The service speaks plain HTTP and serves JSON documents; a document
//! without the marker section (`device` for schedules, `action` for
//! requests) means nothing is pending. Completion reports and responses go
//! back as query-string POSTs, and every call carries the shared secret as
//! a `SALT` query parameter.

use std::error;
use std::fmt;
use std::io;

use async_net::TcpStream;
use futures_lite::{AsyncReadExt, AsyncWriteExt};
use serde::Deserialize;

use pinbridge_proto::{Action, Condition, PinType, Request, Response, Schedule};

/// What the polling loop needs from the control service.
#[allow(async_fn_in_trait)]
pub trait RemoteService {
    async fn fetch_schedule(&self) -> Result<Option<Schedule>, RemoteError>;
    async fn report_schedule_done(&self, id: u32, error: bool) -> Result<(), RemoteError>;
    async fn fetch_request(&self) -> Result<Option<Request>, RemoteError>;
    async fn post_response(&self, response: &Response) -> Result<(), RemoteError>;
}

#[derive(Debug)]
pub enum RemoteError {
    BadUri(String),
    Io(io::Error),
    BadReply,
    Status(u16),
    Malformed(serde_json::Error),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::BadUri(uri) => write!(f, "unsupported service uri {uri}"),
            RemoteError::Io(_) => write!(f, "io error talking to the control service"),
            RemoteError::BadReply => write!(f, "control service reply is not http"),
            RemoteError::Status(code) => write!(f, "control service answered status {code}"),
            RemoteError::Malformed(_) => write!(f, "could not parse control service document"),
        }
    }
}

impl error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            RemoteError::Io(e) => Some(e),
            RemoteError::Malformed(e) => Some(e),
            RemoteError::BadUri(_) | RemoteError::BadReply | RemoteError::Status(_) => None,
        }
    }
}

impl From<io::Error> for RemoteError {
    fn from(value: io::Error) -> Self {
        RemoteError::Io(value)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(value: serde_json::Error) -> Self {
        RemoteError::Malformed(value)
    }
}

/// Control service client speaking HTTP/1.0, one connection per call.
/// 1.0 keeps replies unchunked, which keeps body extraction trivial.
pub struct HttpRemote {
    root: String,
    salt: String,
}

impl HttpRemote {
    pub fn new(root: &str, salt: &str) -> Self {
        let root = if root.ends_with('/') {
            root.to_string()
        } else {
            format!("{root}/")
        };
        HttpRemote { root, salt: salt.to_string() }
    }

    async fn exchange(&self, method: &str, resource: &str) -> Result<String, RemoteError> {
        let uri = salted(&format!("{}{resource}", self.root), &self.salt);
        let (host, port, path) = split_http_uri(&uri)?;

        let mut stream = TcpStream::connect((host.as_str(), port)).await?;
        let request =
            format!("{method} {path} HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await?;
        body_of(&raw)
    }
}

impl RemoteService for HttpRemote {
    async fn fetch_schedule(&self) -> Result<Option<Schedule>, RemoteError> {
        let body = self.exchange("GET", "schedule/").await?;
        parse_schedule(&body)
    }

    async fn report_schedule_done(&self, id: u32, error: bool) -> Result<(), RemoteError> {
        let flag = if error { "Y" } else { "N" };
        self.exchange("POST", &format!("schedule/?scheduleId={id}&error={flag}"))
            .await?;
        Ok(())
    }

    async fn fetch_request(&self) -> Result<Option<Request>, RemoteError> {
        let body = self.exchange("GET", "request/").await?;
        parse_request(&body)
    }

    async fn post_response(&self, response: &Response) -> Result<(), RemoteError> {
        // A response without a correlation id has nowhere to go.
        let id = match response.request_id {
            Some(id) => id,
            None => return Ok(()),
        };
        self.exchange(
            "POST",
            &format!("response/?requestId={id}&value={}", response.value),
        )
        .await?;
        Ok(())
    }
}

/// The shared token rides along on every call, as first or additional
/// query parameter.
fn salted(uri: &str, salt: &str) -> String {
    if uri.contains('?') {
        format!("{uri}&SALT={salt}")
    } else {
        format!("{uri}?SALT={salt}")
    }
}

fn split_http_uri(uri: &str) -> Result<(String, u16, String), RemoteError> {
    let rest = uri
        .strip_prefix("http://")
        .ok_or_else(|| RemoteError::BadUri(uri.to_string()))?;

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| RemoteError::BadUri(uri.to_string()))?;
            (host, port)
        }
        None => (authority, 80),
    };

    if host.is_empty() {
        return Err(RemoteError::BadUri(uri.to_string()));
    }

    Ok((host.to_string(), port, path.to_string()))
}

fn body_of(raw: &str) -> Result<String, RemoteError> {
    let (head, body) = raw.split_once("\r\n\r\n").ok_or(RemoteError::BadReply)?;
    let status: u16 = head
        .split_whitespace()
        .nth(1)
        .and_then(|field| field.parse().ok())
        .ok_or(RemoteError::BadReply)?;

    if status != 200 {
        return Err(RemoteError::Status(status));
    }

    Ok(body.to_string())
}

#[derive(Deserialize)]
struct ScheduleEnvelope {
    schedule: Option<ScheduleDoc>,
}

/// A pending schedule is signalled by the presence of the device section.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleDoc {
    id: u32,
    device: Option<DeviceTarget>,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceTarget {
    port: String,
    pin_type: PinType,
    pin_number: u8,
    true_value: i32,
    false_value: i32,
}

#[derive(Deserialize)]
struct RequestEnvelope {
    request: Option<RequestDoc>,
}

/// A pending request is signalled by the presence of the action field.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestDoc {
    request_id: u32,
    port: String,
    action: Option<Action>,
    pin_type: PinType,
    pin_number: u8,
    #[serde(default)]
    value: i32,
}

fn parse_schedule(body: &str) -> Result<Option<Schedule>, RemoteError> {
    let envelope: ScheduleEnvelope = serde_json::from_str(body)?;
    let doc = match envelope.schedule {
        Some(doc) => doc,
        None => return Ok(None),
    };
    let device = match doc.device {
        Some(device) => device,
        None => return Ok(None),
    };

    Ok(Some(Schedule {
        id: doc.id,
        port: device.port,
        pin_type: device.pin_type,
        pin_number: device.pin_number,
        true_value: device.true_value,
        false_value: device.false_value,
        conditions: doc.conditions,
    }))
}

fn parse_request(body: &str) -> Result<Option<Request>, RemoteError> {
    let envelope: RequestEnvelope = serde_json::from_str(body)?;
    let doc = match envelope.request {
        Some(doc) => doc,
        None => return Ok(None),
    };
    let action = match doc.action {
        Some(action) => action,
        None => return Ok(None),
    };

    Ok(Some(Request {
        id: Some(doc.request_id),
        port: doc.port,
        action,
        pin_type: doc.pin_type,
        pin_number: doc.pin_number,
        value: doc.value,
    }))
}
