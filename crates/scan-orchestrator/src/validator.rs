//! 네트워크 요청 전에 수행하는 클라이언트 측 파일 검증
//!
//! 검증은 참고용이며 최종 판단은 원격 서비스가 합니다. 크기, 확장자,
//! 선언된 MIME 타입을 각각 독립적으로 검사하고 위반 사항을
//! 이 순서대로 모두 보고합니다.

use serde::Serialize;

use scanpost_core::types::CandidateFile;

use crate::error::ScanError;

/// 허용 최대 파일 크기 (10 MiB)
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 허용 확장자 (소문자)
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "zip"];

/// 허용 content type
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "application/zip",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// 허용 확장자에 대응하는 MIME 타입
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "zip" => Some("application/zip"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

/// [`FileValidator::validate`] 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// 실패한 결과를 [`ScanError::Validation`]으로 변환합니다.
    pub fn into_result(self) -> Result<(), ScanError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ScanError::Validation(self.errors))
        }
    }
}

/// 후보 파일에 대한 순수 검증기
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_size: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self {
            max_size: MAX_FILE_SIZE,
        }
    }
}

impl FileValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// 파일을 검사합니다. `None`이면 "No file provided"만 보고합니다.
    pub fn validate(&self, file: Option<&CandidateFile>) -> ValidationReport {
        let Some(file) = file else {
            return ValidationReport::from_errors(vec!["No file provided".to_owned()]);
        };

        let mut errors = Vec::new();

        if file.size() > self.max_size {
            errors.push(format!(
                "File size exceeds {}MB limit",
                self.max_size / (1024 * 1024)
            ));
        }

        let ext = file.extension();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            errors.push(format!(
                "File extension not allowed. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ));
        }

        let declared = file.content_type.as_deref().unwrap_or("");
        if !ALLOWED_MIME_TYPES.contains(&declared) {
            let shown = if declared.is_empty() { "none" } else { declared };
            errors.push(format!("File type not allowed. Detected: {shown}"));
        }

        ValidationReport::from_errors(errors)
    }

    pub fn is_allowed(&self, file: Option<&CandidateFile>) -> bool {
        self.validate(file).is_valid
    }
}
