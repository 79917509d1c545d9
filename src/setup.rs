use crate::models::{Difficulty, QuizMode};
use crate::prompt::InlineData;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;

pub const QUESTION_RANGE: RangeInclusive<u32> = 3..=20;
pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["pdf", "doc", "docx", "ppt", "pptx", "txt"];
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("a topic is required")]
    EmptyTopic,
    #[error("question count {0} is outside 3-20")]
    CountOutOfRange(u32),
    #[error("{0} is not a supported reference file")]
    UnsupportedFile(String),
    #[error("could not read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn mime_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("txt") => "text/plain",
        _ => FALLBACK_MIME,
    }
}

pub fn is_accepted(name: &str) -> bool {
    extension(name).is_some_and(|e| ACCEPTED_EXTENSIONS.contains(&e.as_str()))
}

/// A reference document attached to a quiz request.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_for(&name).to_string();
        Self { name, mime_type, data }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| SetupError::Read { name: name.clone(), source })?;
        Ok(Self::from_bytes(name, data))
    }

    pub fn to_inline(&self) -> InlineData {
        InlineData {
            data: STANDARD.encode(&self.data),
            mime_type: self.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizConfig {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub mode: QuizMode,
    pub files: Vec<Attachment>,
    pub video_link: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            difficulty: Difficulty::Intermediate,
            question_count: 5,
            mode: QuizMode::Practice,
            files: Vec::new(),
            video_link: String::new(),
        }
    }
}

impl QuizConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn add_file(&mut self, file: Attachment) -> Result<(), SetupError> {
        if !is_accepted(&file.name) {
            return Err(SetupError::UnsupportedFile(file.name));
        }
        self.files.push(file);
        Ok(())
    }

    pub fn remove_file(&mut self, index: usize) -> Option<Attachment> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn video(&self) -> Option<&str> {
        Some(self.video_link.trim()).filter(|l| !l.is_empty())
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.topic.trim().is_empty() {
            return Err(SetupError::EmptyTopic);
        }
        if !QUESTION_RANGE.contains(&self.question_count) {
            return Err(SetupError::CountOutOfRange(self.question_count));
        }
        Ok(())
    }
}
