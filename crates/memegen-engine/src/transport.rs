use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use memegen_contracts::decode::{
    bytes_to_data_uri, content_type_for_path, decode_response, decode_text_payload,
    is_image_data_uri, ResponseBody, DEFAULT_IMAGE_MIME,
};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{MemeError, Result};

/// Where the client runs. Injected once; decides which upload strategies
/// exist for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimePlatform {
    Browser,
    NativeApp,
    MiniProgram,
}

impl RuntimePlatform {
    pub fn is_browser(&self) -> bool {
        matches!(self, RuntimePlatform::Browser)
    }
}

impl FromStr for RuntimePlatform {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "browser" | "web" | "h5" => Ok(RuntimePlatform::Browser),
            "native" | "app" => Ok(RuntimePlatform::NativeApp),
            "mini-program" | "mini_program" | "mp" => Ok(RuntimePlatform::MiniProgram),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportKind {
    BrowserMultipart,
    NativeMultipart,
    JsonOnly,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::BrowserMultipart => "browser_multipart",
            TransportKind::NativeMultipart => "native_multipart",
            TransportKind::JsonOnly => "json_only",
        }
    }

    pub fn select(platform: RuntimePlatform, has_images: bool) -> Self {
        if platform.is_browser() {
            TransportKind::BrowserMultipart
        } else if has_images {
            TransportKind::NativeMultipart
        } else {
            TransportKind::JsonOnly
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One generation submission. Immutable once handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub template_key: String,
    pub images: Vec<PathBuf>,
    pub texts: Vec<String>,
    pub args: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(template_key: impl Into<String>) -> Self {
        Self {
            template_key: template_key.into(),
            images: Vec::new(),
            texts: Vec::new(),
            args: Map::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<PathBuf>) -> Self {
        self.images = images;
        self
    }

    pub fn with_texts(mut self, texts: Vec<String>) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }
}

/// Status, declared content type and body of a generation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    fn read(response: HttpResponse) -> Result<Self> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .filter(|value| !value.trim().is_empty());
        let body = response.bytes()?.to_vec();
        Ok(Self {
            status,
            content_type,
            body,
        })
    }
}

/// Submits a generation request and returns the canonical image data URI.
/// Implementations never retry.
pub trait UploadTransport: Send + Sync {
    fn kind(&self) -> TransportKind;
    fn submit(&self, url: &str, request: &GenerationRequest) -> Result<String>;
}

/// The strategies available on one platform, keyed by kind.
#[derive(Default)]
pub struct TransportSet {
    transports: BTreeMap<TransportKind, Box<dyn UploadTransport>>,
}

impl TransportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Browsers always post multipart; the other runtimes pick between the
    /// native file upload and a JSON-only request per submission.
    pub fn for_platform(platform: RuntimePlatform, config: &ClientConfig) -> Result<Self> {
        let http = HttpClient::builder().build()?;
        let mut transports = Self::new();
        if platform.is_browser() {
            transports.register(BrowserMultipart::new(http));
        } else {
            transports.register(NativeMultipart::new(http.clone(), config));
            transports.register(JsonOnly::new(http, config));
        }
        Ok(transports)
    }

    pub fn register<T: UploadTransport + 'static>(&mut self, transport: T) {
        self.transports.insert(transport.kind(), Box::new(transport));
    }

    pub fn get(&self, kind: TransportKind) -> Option<&dyn UploadTransport> {
        self.transports.get(&kind).map(|transport| transport.as_ref())
    }

    pub fn kinds(&self) -> Vec<TransportKind> {
        self.transports.keys().copied().collect()
    }
}

/// Multipart form as a web page builds it: one `images` part per file named
/// `image_<idx>.<ext>`, one `texts` part per text, `args` as a JSON field.
pub struct BrowserMultipart {
    http: HttpClient,
}

impl BrowserMultipart {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn build_form(request: &GenerationRequest) -> Result<MultipartForm> {
        let mut form = MultipartForm::new();
        for (idx, path) in request.images.iter().enumerate() {
            let (bytes, content_type) = read_image(path)?;
            let ext = content_type
                .and_then(|value| value.split('/').nth(1))
                .filter(|value| !value.is_empty())
                .unwrap_or("jpg");
            let mut part = MultipartPart::bytes(bytes).file_name(format!("image_{idx}.{ext}"));
            if let Some(content_type) = content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part("images", part);
        }
        for text in &request.texts {
            form = form.text("texts", text.clone());
        }
        if !request.args.is_empty() {
            form = form.text("args", Value::Object(request.args.clone()).to_string());
        }
        Ok(form)
    }

    pub fn interpret(response: RawResponse) -> Result<String> {
        if !(200..300).contains(&response.status) {
            return Err(MemeError::UploadFailed(response.status));
        }
        Ok(decode_response(
            response.content_type.as_deref(),
            ResponseBody::Bytes(response.body),
        ))
    }
}

impl UploadTransport for BrowserMultipart {
    fn kind(&self) -> TransportKind {
        TransportKind::BrowserMultipart
    }

    fn submit(&self, url: &str, request: &GenerationRequest) -> Result<String> {
        let form = Self::build_form(request)?;
        debug!("POST {url} (multipart, {} images)", request.images.len());
        let response = self.http.post(url).multipart(form).send()?;
        Self::interpret(RawResponse::read(response)?)
    }
}

/// File upload as installed apps and mini-programs perform it: local files
/// under `images`, `texts` and `args` each JSON-encoded when non-empty.
pub struct NativeMultipart {
    http: HttpClient,
    timeout: std::time::Duration,
}

impl NativeMultipart {
    pub fn new(http: HttpClient, config: &ClientConfig) -> Self {
        Self {
            http,
            timeout: config.upload_timeout,
        }
    }

    fn build_form(request: &GenerationRequest) -> Result<MultipartForm> {
        let mut form = MultipartForm::new();
        for path in &request.images {
            let (bytes, content_type) = read_image(path)?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image")
                .to_string();
            let mut part = MultipartPart::bytes(bytes).file_name(file_name);
            if let Some(content_type) = content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part("images", part);
        }
        if !request.args.is_empty() {
            form = form.text("args", Value::Object(request.args.clone()).to_string());
        }
        if !request.texts.is_empty() {
            form = form.text("texts", json!(request.texts).to_string());
        }
        Ok(form)
    }

    /// A formed data URI passes through. Otherwise an `image/*` header or
    /// non-UTF-8 content means bytes, and anything else is decoded as text.
    pub fn interpret(response: RawResponse) -> Result<String> {
        if response.status != 200 {
            return Err(MemeError::UploadFailed(response.status));
        }
        if response.body.is_empty() {
            return Err(MemeError::EmptyResponse);
        }
        if let Some(formed) = std::str::from_utf8(&response.body)
            .ok()
            .filter(|text| is_image_data_uri(text))
        {
            return Ok(formed.to_string());
        }
        let content_type = response.content_type.as_deref();
        let is_image_header = content_type
            .map(|value| value.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false);
        if is_image_header {
            return Ok(bytes_to_data_uri(&response.body, content_type));
        }
        match String::from_utf8(response.body) {
            Ok(text) => Ok(decode_text_payload(&text, content_type)),
            Err(err) => Ok(bytes_to_data_uri(err.as_bytes(), content_type)),
        }
    }
}

impl UploadTransport for NativeMultipart {
    fn kind(&self) -> TransportKind {
        TransportKind::NativeMultipart
    }

    fn submit(&self, url: &str, request: &GenerationRequest) -> Result<String> {
        let form = Self::build_form(request)?;
        debug!("POST {url} (file upload, {} images)", request.images.len());
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .multipart(form)
            .send()?;
        Self::interpret(RawResponse::read(response)?)
    }
}

/// Text-only generation: `{texts, args}` as a JSON body, raw bytes back.
pub struct JsonOnly {
    http: HttpClient,
    timeout: std::time::Duration,
}

impl JsonOnly {
    pub fn new(http: HttpClient, config: &ClientConfig) -> Self {
        Self {
            http,
            timeout: config.json_timeout,
        }
    }

    pub fn interpret(response: RawResponse) -> Result<String> {
        if response.status != 200 {
            return Err(MemeError::RequestFailed(response.status));
        }
        if let Ok(text) = std::str::from_utf8(&response.body) {
            if is_image_data_uri(text) {
                return Ok(text.to_string());
            }
        }
        let content_type = response.content_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME);
        Ok(bytes_to_data_uri(&response.body, Some(content_type)))
    }
}

impl UploadTransport for JsonOnly {
    fn kind(&self) -> TransportKind {
        TransportKind::JsonOnly
    }

    fn submit(&self, url: &str, request: &GenerationRequest) -> Result<String> {
        debug!("POST {url} (json, {} texts)", request.texts.len());
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&json!({
                "texts": request.texts,
                "args": request.args,
            }))
            .send()?;
        Self::interpret(RawResponse::read(response)?)
    }
}

fn read_image(path: &Path) -> Result<(Vec<u8>, Option<&'static str>)> {
    let bytes = fs::read(path).map_err(|err| {
        MemeError::Platform(format!("failed reading image {}: {err}", path.display()))
    })?;
    let head_len = bytes.len().min(64);
    let content_type = content_type_for_path(path, &bytes[..head_len]);
    Ok((bytes, content_type))
}
