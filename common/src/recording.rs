//! In-memory recording payloads handed to the playback engine.

/// MIME type used when the source does not declare one.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A named binary recording, as produced by any of the loaders.
#[derive(Clone, PartialEq, Eq)]
pub struct RecordingHandle {
    pub name: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
}

impl RecordingHandle {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        RecordingHandle {
            name: name.into(),
            content,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// Recordings can be large; never dump the bytes into logs.
impl std::fmt::Debug for RecordingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingHandle")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl std::fmt::Display for RecordingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name,
            crate::format::format_file_size(self.content.len() as u64)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_debug() {
        let h = RecordingHandle::new("bar.guac", vec![0u8; 1536]).with_mime_type(OCTET_STREAM);
        assert_eq!(h.to_string(), "bar.guac (1.5 KB)");
        let dbg = format!("{h:?}");
        assert!(dbg.contains("len: 1536"));
        assert!(!h.is_empty());
    }
}
