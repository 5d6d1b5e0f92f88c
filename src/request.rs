use crate::error::Error;
use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

// Limit the maximum amount of data read to prevent a denial of service attack.
const MAX_REQUEST_HEAD: usize = 1024 * 16;
const MAX_HEADERS: usize = 64;

/// Head of an HTTP/1.x request, which is everything this layer needs for deciding on an upgrade.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: u8,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    // Reads the request line by line, so the buffered reader keeps any byte that comes after the
    // blank line, which is already WebSocket traffic in the case of an eager client
    pub async fn parse_http_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self, Error> {
        let mut head = BytesMut::with_capacity(1024);
        let mut line = Vec::with_capacity(256);

        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line).await?;
            if n == 0 {
                return Err(Error::IncompleteHTTPRequest);
            }
            head.extend_from_slice(&line);

            if head.len() > MAX_REQUEST_HEAD {
                return Err(Error::IncompleteHTTPRequest);
            }
            if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
                break;
            }
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        match req.parse(&head)? {
            httparse::Status::Complete(_) => Ok(Self {
                method: req.method.unwrap_or_default().to_string(),
                path: req.path.unwrap_or_default().to_string(),
                version: req.version.unwrap_or_default(),
                headers: req
                    .headers
                    .iter()
                    .map(|header| {
                        (
                            header.name.to_string(),
                            String::from_utf8_lossy(header.value).to_string(),
                        )
                    })
                    .collect(),
            }),
            httparse::Status::Partial => Err(Error::IncompleteHTTPRequest),
        }
    }

    pub fn get_header_value(&self, header_name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header_name))
            .map(|(_, value)| value.trim().to_string())
    }
}
