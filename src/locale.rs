use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::error::ClearanceError;

/// Formatting locale handed in by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    #[default]
    EnUs,
    DeDe,
}

impl Locale {
    pub fn tag(self) -> &'static str {
        match self {
            Locale::EnUs => "en-US",
            Locale::DeDe => "de-DE",
        }
    }

    /// `January 15, 2026` or `15. Januar 2026`.
    pub fn format_date(self, date: NaiveDate) -> String {
        let (pattern, locale) = match self {
            Locale::EnUs => ("%B %-d, %Y", chrono::Locale::en_US),
            Locale::DeDe => ("%-d. %B %Y", chrono::Locale::de_DE),
        };
        date.format_localized(pattern, locale).to_string()
    }

    /// Groups of three digits, `,` for en-US and `.` for de-DE.
    pub fn format_count(self, count: u64) -> String {
        let separator = match self {
            Locale::EnUs => ',',
            Locale::DeDe => '.',
        };
        let digits = count.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (idx, ch) in digits.chars().enumerate() {
            if idx > 0 && (digits.len() - idx) % 3 == 0 {
                out.push(separator);
            }
            out.push(ch);
        }
        out
    }

    pub fn copy(self) -> &'static CertificateCopy {
        match self {
            Locale::EnUs => &EN_US,
            Locale::DeDe => &DE_DE,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Locale {
    type Err = ClearanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace('_', "-").to_ascii_lowercase();
        match normalized.as_str() {
            "en" | "en-us" => Ok(Locale::EnUs),
            "de" | "de-de" => Ok(Locale::DeDe),
            _ => Err(ClearanceError::InvalidConfiguration(format!(
                "unsupported locale {value:?} (expected en-US or de-DE)"
            ))),
        }
    }
}

/// Fixed wording of one certificate variant.
#[derive(Debug)]
pub struct CertificateCopy {
    pub header: &'static str,
    pub image_title: [&'static str; 2],
    pub document_title: &'static str,
    pub image_subtitle: &'static str,
    pub document_subtitle: &'static str,
    pub image_confirmation: &'static str,
    pub document_confirmation: &'static str,
    pub verified_label: &'static str,
    pub seal_caption: &'static str,
    pub seal_status: &'static str,
    pub image_disclaimer: &'static str,
    pub document_disclaimers: [&'static str; 2],
    image_issued: &'static str,
    document_issued: &'static str,
    document_code: &'static str,
    image_not_found: [&'static str; 2],
    document_not_found: &'static [&'static str],
}

impl CertificateCopy {
    /// Two lines; `{count}` sits in the first.
    pub fn image_not_found(&self, count: &str) -> [String; 2] {
        [
            self.image_not_found[0].replace("{count}", count),
            self.image_not_found[1].to_string(),
        ]
    }

    pub fn document_not_found(&self, count: &str) -> Vec<String> {
        self.document_not_found
            .iter()
            .map(|line| line.replace("{count}", count))
            .collect()
    }

    pub fn image_issued(&self, date: &str) -> String {
        format!("{}: {date}", self.image_issued)
    }

    pub fn image_code(&self, code: &str) -> String {
        format!("Code: {code}")
    }

    pub fn document_issued(&self, date: &str) -> String {
        format!("{}: {date}", self.document_issued)
    }

    pub fn document_code(&self, code: &str) -> String {
        format!("{}: {code}", self.document_code)
    }
}

static EN_US: CertificateCopy = CertificateCopy {
    header: "REPUBLIC OF SATIRE",
    image_title: ["CLEARANCE", "CERTIFICATE"],
    document_title: "CLEARANCE CERTIFICATE",
    image_subtitle: "Epstein Document Archive",
    document_subtitle: "Epstein Document Archive - Official Search Result",
    image_confirmation: "This is to certify that the name",
    document_confirmation: "This is to officially certify that the name",
    verified_label: "VERIFIED CLEAN",
    seal_caption: "VERIFIED",
    seal_status: "CLEAN",
    image_disclaimer: "SATIRICAL WEB APP - NO LEGAL SIGNIFICANCE",
    document_disclaimers: [
        "DISCLAIMER: This is a satirical web application with no legal significance.",
        "This certificate is for entertainment purposes only and does not constitute official confirmation.",
    ],
    image_issued: "Issued",
    document_issued: "Issued on",
    document_code: "Verification Code",
    image_not_found: [
        "was not found in any of the {count}",
        "searched Epstein documents.",
    ],
    document_not_found: &["was not found in any of the {count} searched Epstein documents."],
};

static DE_DE: CertificateCopy = CertificateCopy {
    header: "BUNDESREPUBLIK SATIRE",
    image_title: ["UNBEDENKLICHKEITS-", "ZERTIFIKAT"],
    document_title: "UNBEDENKLICHKEITSZERTIFIKAT",
    image_subtitle: "Epstein Document Archive",
    document_subtitle: "Epstein Document Archive - Offizielles Suchergebnis",
    image_confirmation: "Hiermit wird bestaetigt, dass der Name",
    document_confirmation: "Hiermit wird offiziell bestaetigt, dass der Name",
    verified_label: "VERIFIZIERT CLEAN",
    seal_caption: "VERIFIZIERT",
    seal_status: "CLEAN",
    image_disclaimer: "SATIRISCHE WEB-APP - KEINE RECHTLICHE BEDEUTUNG",
    document_disclaimers: [
        "DISCLAIMER: Dies ist eine satirische Web-Anwendung ohne jegliche rechtliche Bedeutung.",
        "Das Zertifikat dient ausschliesslich Unterhaltungszwecken und stellt keine offizielle Bestaetigung dar.",
    ],
    image_issued: "Ausgestellt",
    document_issued: "Ausgestellt am",
    document_code: "Verifizierungscode",
    image_not_found: [
        "in keinem der {count} durchsuchten",
        "Epstein-Dokumente gefunden wurde.",
    ],
    document_not_found: &[
        "in keinem der {count} durchsuchten Epstein-Dokumente",
        "gefunden wurde.",
    ],
};
