//! HTTP command channel
//!
//! The arm's web server exposes `GET /js?json=<command>` and answers with a
//! JSON object.

use super::CommandChannel;
use crate::error::Result;
use crate::protocol::{Command, CommandResponse};
use std::time::Duration;

/// Command channel over the arm's web interface
pub struct HttpChannel {
    agent: ureq::Agent,
    url: String,
}

impl HttpChannel {
    /// `base_url` is scheme + host, e.g. `http://192.168.4.1`
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            url: format!("{}/js", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CommandChannel for HttpChannel {
    fn send(&mut self, command: &Command) -> Result<CommandResponse> {
        let payload = command.to_json_string();
        log::debug!("HTTP {} <- {}", self.url, payload);

        let response = self.agent.get(&self.url).query("json", &payload).call()?;
        let body = response.into_string()?;
        log::trace!("HTTP {} -> {}", self.url, body);

        CommandResponse::parse(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Instant;

    /// Read a request line and headers, returning the request line
    fn read_request(stream: &TcpStream) -> String {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            if header == "\r\n" || header.is_empty() {
                break;
            }
        }
        request_line
    }

    /// Serve one request with `status` and `body`, returning the request line
    fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request_line = read_request(&stream);
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
            request_line
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_send_encodes_command_in_query() {
        let (base, server) = serve_once("200 OK", r#"{"mac":"AA:BB:CC:DD:EE:FF"}"#);
        let mut channel = HttpChannel::new(&base, Duration::from_secs(2));

        let resp = channel.send(&Command::GetMacAddress).unwrap();
        assert_eq!(resp.str_field("mac"), Some("AA:BB:CC:DD:EE:FF"));

        let request_line = server.join().unwrap();
        assert!(request_line.starts_with("GET /js?json="));
        assert!(request_line.contains("302"));
    }

    #[test]
    fn test_malformed_body_is_transport_error() {
        let (base, server) = serve_once("200 OK", "<html>busy</html>");
        let mut channel = HttpChannel::new(&base, Duration::from_secs(2));

        let err = channel.send(&Command::GetMacAddress).unwrap_err();
        assert!(matches!(err, Error::MalformedReply(_)));
        assert!(err.is_transport());
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut channel =
            HttpChannel::new(&format!("http://127.0.0.1:{}", port), Duration::from_millis(500));

        let err = channel.send(&Command::GetMacAddress).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_error_status_keeps_device_body() {
        let (base, server) = serve_once("500 Internal Server Error", "servo bus fault");
        let mut channel = HttpChannel::new(&base, Duration::from_secs(2));

        let err = channel.send(&Command::Home).unwrap_err();
        match &err {
            Error::HttpStatus { status, url, body } => {
                assert_eq!(*status, 500);
                assert!(url.starts_with(&base));
                assert_eq!(body, "servo bus fault");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_transport());
        server.join().unwrap();
    }

    #[test]
    fn test_silent_device_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (release, released) = crossbeam_channel::bounded::<()>(0);
        // Accept and read the request, then hold the connection without answering
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            read_request(&stream);
            let _ = released.recv_timeout(Duration::from_secs(5));
            drop(stream);
        });
        let mut channel = HttpChannel::new(&base, Duration::from_millis(300));

        let started = Instant::now();
        let err = channel.send(&Command::QueryEspNowMode).unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_transport(), "{:?}", err);
        assert!(elapsed >= Duration::from_millis(250), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);

        drop(release);
        server.join().unwrap();
    }
}
