//! MIME type tables: display descriptors, dispatch categories and the
//! extension lookup used when serving converted files.

use serde::Serialize;

const OCTET_STREAM: &str = "application/octet-stream";

/// Icon hint for the client: a glyph name plus a colour tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IconHint {
    pub glyph: &'static str,
    pub tone: &'static str,
}

const fn icon(tone: &'static str) -> IconHint {
    IconHint { glyph: "file", tone }
}

/// What the client shows for a MIME type and which targets it may pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileTypeDescriptor {
    pub label: &'static str,
    pub icon: IconHint,
    pub allowed_targets: &'static [&'static str],
}

pub const UNKNOWN_TYPE: FileTypeDescriptor = FileTypeDescriptor {
    label: "Unknown",
    icon: icon("gray-500"),
    allowed_targets: &[],
};

macro_rules! file_type {
    ($label:expr, $tone:expr, [$($target:expr),* $(,)?]) => {
        FileTypeDescriptor {
            label: $label,
            icon: icon($tone),
            allowed_targets: &[$($target),*],
        }
    };
}

static FILE_TYPES: &[(&str, FileTypeDescriptor)] = &[
    // Documents
    ("application/pdf", file_type!("PDF", "red-500", ["DOCX", "JPG", "PNG", "TXT"])),
    ("application/msword", file_type!("DOC", "blue-500", ["PDF", "DOCX", "TXT"])),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        file_type!("DOCX", "blue-500", ["PDF", "DOC", "TXT"]),
    ),
    ("application/rtf", file_type!("RTF", "blue-500", ["PDF", "DOCX", "TXT"])),
    (
        "application/vnd.oasis.opendocument.text",
        file_type!("ODT", "blue-500", ["PDF", "DOCX", "TXT"]),
    ),
    ("text/plain", file_type!("TXT", "gray-500", ["PDF", "DOCX", "HTML"])),
    ("text/html", file_type!("HTML", "orange-500", ["PDF", "TXT", "DOCX"])),
    ("text/markdown", file_type!("MD", "gray-500", ["PDF", "HTML", "DOCX", "TXT"])),
    ("application/vnd.ms-excel", file_type!("XLS", "green-600", ["XLSX", "CSV", "PDF"])),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        file_type!("XLSX", "green-600", ["XLS", "CSV", "PDF"]),
    ),
    ("text/csv", file_type!("CSV", "green-600", ["XLSX", "XLS", "JSON", "PDF"])),
    ("application/vnd.ms-powerpoint", file_type!("PPT", "red-600", ["PPTX", "PDF"])),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        file_type!("PPTX", "red-600", ["PPT", "PDF"]),
    ),
    // Images
    ("image/jpeg", file_type!("JPG", "green-500", ["PNG", "WEBP", "GIF", "PDF", "AVIF"])),
    ("image/png", file_type!("PNG", "green-500", ["JPG", "WEBP", "GIF", "PDF", "AVIF"])),
    ("image/webp", file_type!("WEBP", "green-500", ["JPG", "PNG", "GIF"])),
    ("image/gif", file_type!("GIF", "green-500", ["JPG", "PNG", "WEBP", "MP4"])),
    ("image/svg+xml", file_type!("SVG", "green-500", ["PNG", "JPG", "PDF"])),
    ("image/tiff", file_type!("TIFF", "green-500", ["JPG", "PNG", "PDF"])),
    ("image/bmp", file_type!("BMP", "green-500", ["JPG", "PNG", "PDF"])),
    ("image/avif", file_type!("AVIF", "green-500", ["JPG", "PNG", "WEBP"])),
    // Audio
    ("audio/mpeg", file_type!("MP3", "purple-500", ["WAV", "OGG", "AAC", "FLAC"])),
    ("audio/wav", file_type!("WAV", "purple-500", ["MP3", "OGG", "AAC", "FLAC"])),
    ("audio/ogg", file_type!("OGG", "purple-500", ["MP3", "WAV", "AAC"])),
    ("audio/aac", file_type!("AAC", "purple-500", ["MP3", "WAV", "OGG"])),
    ("audio/flac", file_type!("FLAC", "purple-500", ["MP3", "WAV", "OGG", "AAC"])),
    ("audio/webm", file_type!("WEBM Audio", "purple-500", ["MP3", "WAV", "OGG"])),
    // Video
    ("video/mp4", file_type!("MP4", "orange-500", ["AVI", "MOV", "GIF", "WEBM", "MKV"])),
    ("video/x-msvideo", file_type!("AVI", "orange-500", ["MP4", "MOV", "WEBM", "MKV"])),
    ("video/quicktime", file_type!("MOV", "orange-500", ["MP4", "AVI", "WEBM", "MKV"])),
    ("video/webm", file_type!("WEBM", "orange-500", ["MP4", "AVI", "MOV", "MKV"])),
    ("video/x-matroska", file_type!("MKV", "orange-500", ["MP4", "AVI", "WEBM"])),
    ("video/3gpp", file_type!("3GP", "orange-500", ["MP4", "AVI", "MOV"])),
    ("video/x-flv", file_type!("FLV", "orange-500", ["MP4", "AVI", "WEBM"])),
    // Archives
    ("application/zip", file_type!("ZIP", "yellow-500", ["RAR", "7Z", "TAR.GZ"])),
    ("application/x-rar-compressed", file_type!("RAR", "yellow-500", ["ZIP", "7Z", "TAR.GZ"])),
    ("application/x-7z-compressed", file_type!("7Z", "yellow-500", ["ZIP", "RAR", "TAR.GZ"])),
    ("application/gzip", file_type!("GZIP", "yellow-500", ["ZIP", "RAR", "7Z", "TAR"])),
    ("application/x-tar", file_type!("TAR", "yellow-500", ["ZIP", "RAR", "7Z", "TAR.GZ"])),
];

/// No converter exists for these, even though they sit under `application/`.
const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/gzip",
    "application/x-tar",
];

static EXTENSION_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("doc", "application/msword"),
    ("txt", "text/plain"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
];

/// Coarse routing group used by the conversion dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionCategory {
    Document,
    Image,
    AudioVideo,
}

impl ConversionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionCategory::Document => "document",
            ConversionCategory::Image => "image",
            ConversionCategory::AudioVideo => "audio_video",
        }
    }
}

impl std::fmt::Display for ConversionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduces a declared MIME type to its lower-cased essence.
///
/// `Text/Plain; charset=utf-8` becomes `text/plain`. Unparseable input is
/// trimmed and lower-cased as-is.
pub fn normalize_mime(content_type: &str) -> String {
    match content_type.trim().parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_lowercase(),
        Err(_) => content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase(),
    }
}

/// Looks up the display descriptor for a MIME type
pub fn classify(mime_type: &str) -> FileTypeDescriptor {
    let normalized = normalize_mime(mime_type);
    FILE_TYPES
        .iter()
        .find(|(key, _)| *key == normalized)
        .map(|(_, descriptor)| *descriptor)
        .unwrap_or(UNKNOWN_TYPE)
}

/// Full table in display order
pub fn known_types() -> impl Iterator<Item = (&'static str, FileTypeDescriptor)> {
    FILE_TYPES.iter().map(|(mime, descriptor)| (*mime, *descriptor))
}

/// Routing by MIME prefix. `None` means no converter handles the type.
pub fn category_for(mime_type: &str) -> Option<ConversionCategory> {
    let normalized = normalize_mime(mime_type);

    if ARCHIVE_TYPES.contains(&normalized.as_str()) {
        return None;
    }

    if normalized.starts_with("application/") || normalized == "text/plain" {
        Some(ConversionCategory::Document)
    } else if normalized.starts_with("image/") {
        Some(ConversionCategory::Image)
    } else if normalized.starts_with("audio/") || normalized.starts_with("video/") {
        Some(ConversionCategory::AudioVideo)
    } else {
        None
    }
}

/// Content type for a stored file's extension, `application/octet-stream` if unknown
pub fn content_type_for_extension(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_lowercase();
    EXTENSION_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}
