use anyhow::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::editor::Editor;

// Refuse to write anything larger than this
const LARGE_CONTENT_THRESHOLD: usize = 50 * 1024 * 1024;

pub struct FileManager {
    pub current_path: Option<PathBuf>,
    pub is_readonly: bool,
}

impl FileManager {
    pub fn new() -> Self {
        Self {
            current_path: None,
            is_readonly: false,
        }
    }

    pub fn get_current_path(&self) -> Option<&PathBuf> {
        self.current_path.as_ref()
    }

    pub fn has_file(&self) -> bool {
        self.current_path.is_some()
    }

    /// Name shown in the title bar and used as the exported page title.
    pub fn display_name(&self) -> String {
        self.current_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("[No Name]"))
    }

    /// `explicit` if given, otherwise the current file with an `.html` extension.
    pub fn export_path(&self, explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| self.current_path.as_ref().map(|p| p.with_extension("html")))
    }

    pub async fn open_file(&mut self, path: PathBuf) -> Result<String> {
        if !path.exists() {
            return Err(anyhow::anyhow!("File not found: {}", path.display()));
        }

        if !path.is_file() {
            return Err(anyhow::anyhow!("Not a file: {}", path.display()));
        }

        match fs::metadata(&path).await {
            Ok(metadata) => {
                self.is_readonly = metadata.permissions().readonly();
            }
            Err(e) => {
                log::warn!("Failed to get file metadata: {}", e);
                self.is_readonly = false;
            }
        }

        match fs::read_to_string(&path).await {
            Ok(content) => {
                if content.contains('\0') {
                    return Err(anyhow::anyhow!(
                        "File looks like binary data: {}",
                        path.display()
                    ));
                }

                self.current_path = Some(path.clone());
                log::info!("Successfully opened file: {}", path.display());
                Ok(content)
            }
            Err(e) => Err(anyhow::anyhow!(describe_io_error(&path, &e, "read"))),
        }
    }

    pub async fn save_file(&self, editor: &mut Editor) -> Result<String> {
        let Some(path) = &self.current_path else {
            return Err(anyhow::anyhow!("No file name"));
        };

        if self.is_readonly {
            return Err(anyhow::anyhow!("File is read-only: {}", path.display()));
        }

        write_checked(path, &editor.get_content()).await?;
        editor.mark_saved();
        log::info!("Successfully saved file: {}", path.display());
        Ok(format!("{} lines written", editor.line_count()))
    }

    pub async fn save_file_as(&mut self, path: PathBuf, editor: &mut Editor) -> Result<String> {
        if path.exists() {
            if let Ok(metadata) = fs::metadata(&path).await {
                if metadata.permissions().readonly() {
                    return Err(anyhow::anyhow!(
                        "Target file is read-only: {}",
                        path.display()
                    ));
                }
            }
        }

        write_checked(&path, &editor.get_content()).await?;
        self.current_path = Some(path.clone());
        self.is_readonly = false;
        editor.mark_saved();
        log::info!("Successfully saved file as: {}", path.display());
        Ok(format!(
            "{} lines written to '{}'",
            editor.line_count(),
            path.display()
        ))
    }

    pub async fn write_export(&self, path: &Path, html: &str) -> Result<String> {
        write_checked(path, html).await?;
        log::info!("Exported HTML to: {}", path.display());
        Ok(format!("Exported to '{}'", path.display()))
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_checked(path: &Path, content: &str) -> Result<()> {
    if content.len() > LARGE_CONTENT_THRESHOLD {
        return Err(anyhow::anyhow!(
            "Content too large to save ({} bytes)",
            content.len()
        ));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create directory: {} - {}",
                    parent.display(),
                    e
                )
            })?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    fs::write(path, content.as_bytes())
        .await
        .map_err(|e| anyhow::anyhow!(describe_io_error(path, &e, "write")))
}

fn describe_io_error(path: &Path, e: &std::io::Error, action: &str) -> String {
    match e.kind() {
        ErrorKind::PermissionDenied => {
            format!("Permission denied ({}): {}", action, path.display())
        }
        ErrorKind::NotFound => format!("File not found: {}", path.display()),
        ErrorKind::InvalidData => format!("File is not valid UTF-8: {}", path.display()),
        _ => format!("Failed to {} {}: {}", action, path.display(), e),
    }
}
