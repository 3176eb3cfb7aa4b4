use chrono::NaiveDate;

use crate::error::ClearanceError;
use crate::filename;
use crate::locale::Locale;
use crate::text;
use crate::verification::VerificationCode;

pub const DEFAULT_DOCUMENT_COUNT: u64 = 2895;
pub const MIN_NAME_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub raw_name: String,
    pub document_count: u64,
}

impl CertificateRequest {
    pub fn new(raw_name: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into(),
            document_count: DEFAULT_DOCUMENT_COUNT,
        }
    }

    pub fn with_document_count(mut self, count: u64) -> Self {
        self.document_count = count;
        self
    }
}

/// Everything a renderer draws, computed once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateContent {
    full_name: String,
    display_name: String,
    name_font_size: u32,
    issue_date_text: String,
    document_count_text: String,
    verification_code: VerificationCode,
    sanitized_filename_stem: String,
    locale: Locale,
}

impl CertificateContent {
    /// Fails with `InvalidInput` when the trimmed name has fewer than 2 chars.
    pub fn build(
        request: &CertificateRequest,
        date: NaiveDate,
        locale: Locale,
    ) -> Result<Self, ClearanceError> {
        let trimmed = request.raw_name.trim();
        if trimmed.chars().count() < MIN_NAME_CHARS {
            return Err(ClearanceError::InvalidInput(format!(
                "name must be at least {MIN_NAME_CHARS} characters long"
            )));
        }

        let issue_date_text = locale.format_date(date);
        let display_name = text::escape_and_truncate(trimmed);
        let name_font_size = text::select_font_size(&display_name);

        Ok(Self {
            full_name: trimmed.to_uppercase(),
            name_font_size,
            display_name,
            document_count_text: locale.format_count(request.document_count),
            verification_code: VerificationCode::derive(trimmed, &issue_date_text),
            issue_date_text,
            sanitized_filename_stem: filename::sanitize(trimmed),
            locale,
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn name_font_size(&self) -> u32 {
        self.name_font_size
    }

    pub fn issue_date_text(&self) -> &str {
        &self.issue_date_text
    }

    pub fn document_count_text(&self) -> &str {
        &self.document_count_text
    }

    pub fn verification_code(&self) -> &VerificationCode {
        &self.verification_code
    }

    pub fn sanitized_filename_stem(&self) -> &str {
        &self.sanitized_filename_stem
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}
