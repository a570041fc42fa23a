#![allow(dead_code)]

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Write a raw HTTP request and read until the server closes the
    /// connection or goes quiet.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(2000)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// `GET`-style request with no body that asks the server to close.
    pub fn simple(method: &str, target: &str) -> String {
        format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
    }

    pub struct ParsedResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl ParsedResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    pub fn parse_response(resp: &str) -> ParsedResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        ParsedResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }
}

pub mod test_server {
    use std::net::SocketAddr;

    use trierouter::server::{HttpServer, ServerHandle};
    use trierouter::{ServerConfig, SharedRouter};

    /// Running server bound to an ephemeral port, stopped on drop
    pub struct TestServer {
        handle: Option<ServerHandle>,
        pub addr: SocketAddr,
    }

    impl TestServer {
        pub fn start(router: impl Into<SharedRouter>) -> Self {
            Self::start_with(router, 64 * 1024)
        }

        pub fn start_with(router: impl Into<SharedRouter>, max_body_bytes: usize) -> Self {
            let config = ServerConfig {
                addr: "127.0.0.1:0".parse().unwrap(),
                workers: 2,
                max_body_bytes,
            };
            let handle = HttpServer::new(router, config).start().unwrap();
            handle.wait_ready().unwrap();
            let addr = handle.addr();
            Self {
                handle: Some(handle),
                addr,
            }
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }
}
