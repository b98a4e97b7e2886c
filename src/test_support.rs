//! One-shot mock S3 endpoint for exercising the client over a real socket.

use crate::settings::{Settings, DEFAULT_LIMIT, DEFAULT_OBJECT_PREFIX};
use reqwest::Url;
use std::{
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

pub fn settings_for(endpoint: &str) -> Settings {
    Settings {
        key: "AKIATEST".to_string(),
        secret: "secret123".to_string(),
        endpoint: endpoint.to_string(),
        bucket: "mybucket".to_string(),
        region: "eu-west-3".to_string(),
        prefix: DEFAULT_OBJECT_PREFIX.to_string(),
        timeout: Duration::from_secs(5),
        limit: DEFAULT_LIMIT,
        debug: false,
    }
}

pub enum MockResponse {
    /// Fixed status and body.
    Raw {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    /// A `ListBucketResult` over `keys`, honouring the `prefix`, `delimiter`
    /// and `max-keys` query parameters of the request.
    Listing { keys: Vec<String> },
    /// Sleeps before answering.
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self::Raw {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Raw {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::Raw {
            status: 307,
            headers: vec![("Location".to_string(), location.to_string())],
            body: String::new(),
        }
    }

    pub fn listing<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Listing {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn delayed(delay: Duration, response: MockResponse) -> Self {
        Self::Delayed(delay, Box::new(response))
    }

    fn render(&self, request: &RecordedRequest) -> (u16, Vec<(String, String)>, String) {
        match self {
            Self::Raw {
                status,
                headers,
                body,
            } => (*status, headers.clone(), body.clone()),
            Self::Listing { keys } => (200, Vec::new(), render_listing(keys, request)),
            Self::Delayed(delay, response) => {
                thread::sleep(*delay);
                response.render(request)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn path(&self) -> String {
        self.url().path().to_string()
    }

    pub fn query(&self, name: &str) -> Option<String> {
        self.url()
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    fn url(&self) -> Url {
        Url::parse(&format!("http://mock{}", self.target)).unwrap()
    }
}

pub struct MockServer {
    addr: SocketAddr,
    handle: JoinHandle<RecordedRequest>,
}

impl MockServer {
    /// Serves exactly one connection with `response`.
    pub fn start(response: MockResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, &response)
        });

        Self { addr, handle }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Waits for the connection to be served and returns what was received.
    pub fn finish(self) -> RecordedRequest {
        self.handle.join().unwrap()
    }
}

fn serve(stream: TcpStream, response: &MockResponse) -> RecordedRequest {
    let mut reader = BufReader::new(stream);
    let mut request = RecordedRequest::default();

    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let mut parts = line.split_whitespace();
    request.method = parts.next().unwrap_or_default().to_string();
    request.target = parts.next().unwrap_or_default().to_string();

    loop {
        line.clear();
        if reader.read_line(&mut line).unwrap() == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            request
                .headers
                .push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let (status, headers, body) = response.render(&request);
    let mut out = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    out.push_str(&body);

    // The client may already have hung up after a timeout.
    let mut stream = reader.into_inner();
    let _ = stream.write_all(out.as_bytes());
    let _ = stream.flush();

    request
}

fn render_listing(keys: &[String], request: &RecordedRequest) -> String {
    let prefix = request.query("prefix").unwrap_or_default();
    let delimiter = request.query("delimiter").unwrap_or_default();
    let max_keys = request
        .query("max-keys")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(1000);

    let mut contents = Vec::new();
    let mut common_prefixes: Vec<String> = Vec::new();
    for key in keys.iter().filter(|key| key.starts_with(&prefix)) {
        let rest = &key[prefix.len()..];
        match rest.find(delimiter.as_str()).filter(|_| !delimiter.is_empty()) {
            Some(index) => {
                let common = format!("{}{}", prefix, &rest[..index + delimiter.len()]);
                if !common_prefixes.contains(&common) {
                    common_prefixes.push(common);
                }
            }
            None => contents.push(key.clone()),
        }
    }

    let truncated = contents.len() + common_prefixes.len() > max_keys;
    contents.truncate(max_keys);
    common_prefixes.truncate(max_keys - contents.len());

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
    );
    xml.push_str(&format!(
        "<Name>mybucket</Name><Prefix>{}</Prefix><Marker></Marker><MaxKeys>{}</MaxKeys><Delimiter>{}</Delimiter><IsTruncated>{}</IsTruncated><EncodingType>url</EncodingType>",
        prefix, max_keys, delimiter, truncated
    ));
    for key in &contents {
        xml.push_str(&format!(
            "<Contents><Key>{}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified><ETag>&quot;d41d8cd98f00b204e9800998ecf8427e&quot;</ETag><Size>0</Size><StorageClass>STANDARD</StorageClass></Contents>",
            key
        ));
    }
    for common in &common_prefixes {
        xml.push_str(&format!(
            "<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>",
            common
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml
}
