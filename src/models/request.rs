use crate::error::{ClientError, ClientResult};
use crate::models::job::Operation;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

pub const DEFAULT_COMPRESSION_QUALITY: u8 = 50;

/// A PDF held in memory for upload.
#[derive(Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> ClientResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Io(format!("Failed to read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Page selection such as `1-3,5,7-10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRanges(Vec<PageRange>);

fn page_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+(-[0-9]+)?)(,[0-9]+(-[0-9]+)?)*$").expect("page range pattern compiles"))
}

impl PageRanges {
    pub fn ranges(&self) -> &[PageRange] {
        &self.0
    }
}

impl FromStr for PageRanges {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ClientError::Validation(
                "Please enter page ranges (e.g., 1-3,5,7-10)".to_string(),
            ));
        }
        if !page_range_pattern().is_match(trimmed) {
            return Err(ClientError::Validation(
                "Invalid page range format. Use: 1-3,5,7-10".to_string(),
            ));
        }

        let parse_page = |part: &str| -> ClientResult<u32> {
            let page: u32 = part
                .parse()
                .map_err(|_| ClientError::Validation(format!("Page number out of range: {part}")))?;
            if page == 0 {
                return Err(ClientError::Validation("Page numbers start at 1".to_string()));
            }
            Ok(page)
        };

        let mut ranges = Vec::new();
        for segment in trimmed.split(',') {
            let range = match segment.split_once('-') {
                Some((start, end)) => PageRange {
                    start: parse_page(start)?,
                    end: parse_page(end)?,
                },
                None => {
                    let page = parse_page(segment)?;
                    PageRange { start: page, end: page }
                }
            };
            if range.start > range.end {
                return Err(ClientError::Validation(format!(
                    "Page range {}-{} ends before it starts",
                    range.start, range.end
                )));
            }
            ranges.push(range);
        }

        Ok(Self(ranges))
    }
}

impl fmt::Display for PageRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    Pages(PageRanges),
    Interval(u32),
    All,
}

impl SplitMode {
    pub fn type_name(&self) -> &'static str {
        match self {
            SplitMode::Pages(_) => "pages",
            SplitMode::Interval(_) => "interval",
            SplitMode::All => "all",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProtectOptions {
    pub user_password: String,
    pub owner_password: Option<String>,
    pub allow_printing: bool,
    pub allow_copying: bool,
    pub allow_modification: bool,
    pub allow_assembly: bool,
}

impl ProtectOptions {
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: None,
            allow_printing: true,
            allow_copying: true,
            allow_modification: true,
            allow_assembly: true,
        }
    }
}

impl fmt::Debug for ProtectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectOptions")
            .field("user_password", &"<redacted>")
            .field("owner_password", &self.owner_password.as_ref().map(|_| "<redacted>"))
            .field("allow_printing", &self.allow_printing)
            .field("allow_copying", &self.allow_copying)
            .field("allow_modification", &self.allow_modification)
            .field("allow_assembly", &self.allow_assembly)
            .finish()
    }
}

/// One job submission: the operation plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    Compress { file: UploadFile, quality: u8 },
    Merge { files: Vec<UploadFile> },
    Split { file: UploadFile, mode: SplitMode },
    Protect { file: UploadFile, options: ProtectOptions },
    RemoveProtection { file: UploadFile, password: String },
    PdfToWord { file: UploadFile },
}

impl JobRequest {
    pub fn operation(&self) -> Operation {
        match self {
            JobRequest::Compress { .. } => Operation::Compress,
            JobRequest::Merge { .. } => Operation::Merge,
            JobRequest::Split { .. } => Operation::Split,
            JobRequest::Protect { .. } => Operation::Protect,
            JobRequest::RemoveProtection { .. } => Operation::RemoveProtection,
            JobRequest::PdfToWord { .. } => Operation::PdfToWord,
        }
    }

    /// Multipart field name for the uploaded file parts.
    pub fn file_field(&self) -> &'static str {
        match self {
            JobRequest::Merge { .. } => "files",
            _ => "file",
        }
    }

    pub fn files(&self) -> Vec<&UploadFile> {
        match self {
            JobRequest::Merge { files } => files.iter().collect(),
            JobRequest::Compress { file, .. }
            | JobRequest::Split { file, .. }
            | JobRequest::Protect { file, .. }
            | JobRequest::RemoveProtection { file, .. }
            | JobRequest::PdfToWord { file } => vec![file],
        }
    }

    /// Text parts sent alongside the files.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            JobRequest::Compress { quality, .. } => vec![
                ("operation", Operation::Compress.as_str().to_string()),
                ("quality", quality.to_string()),
            ],
            JobRequest::Merge { .. } | JobRequest::PdfToWord { .. } => Vec::new(),
            JobRequest::Split { mode, .. } => {
                let mut fields = vec![("splitType", mode.type_name().to_string())];
                match mode {
                    SplitMode::Pages(ranges) => fields.push(("splitRanges", ranges.to_string())),
                    SplitMode::Interval(pages) => fields.push(("splitInterval", pages.to_string())),
                    SplitMode::All => {}
                }
                fields
            }
            JobRequest::Protect { options, .. } => {
                let mut fields = vec![("userPassword", options.user_password.clone())];
                if let Some(owner) = options.owner_password.as_ref().filter(|p| !p.is_empty()) {
                    fields.push(("ownerPassword", owner.clone()));
                }
                fields.push(("allowPrinting", options.allow_printing.to_string()));
                fields.push(("allowCopying", options.allow_copying.to_string()));
                fields.push(("allowModification", options.allow_modification.to_string()));
                fields.push(("allowAssembly", options.allow_assembly.to_string()));
                fields
            }
            JobRequest::RemoveProtection { password, .. } => vec![("password", password.clone())],
        }
    }
}
