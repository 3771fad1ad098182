//! File exporter: writes the document as Markdown, a standalone HTML page or a PDF

use std::path::PathBuf;

use async_trait::async_trait;
use kinesis_agent::{ExportError, ExportFormat, Exporter};
use pulldown_cmark::{Event, Options, Parser, html};

use crate::pdf;

/// Writes exports into a directory
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Exporter for FileExporter {
    async fn export(
        &self,
        document: &str,
        filename: &str,
        format: ExportFormat,
    ) -> Result<PathBuf, ExportError> {
        let content = match format {
            ExportFormat::Markdown => document.as_bytes().to_vec(),
            ExportFormat::Html => render_html(document, filename).into_bytes(),
            ExportFormat::Pdf => {
                let (document, title) = (document.to_string(), filename.to_string());
                tokio::task::spawn_blocking(move || pdf::render_pdf(&document, &title))
                    .await
                    .map_err(|e| ExportError::Render(e.to_string()))??
            }
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(format!("{}.{}", filename, format.extension()));
        tokio::fs::write(&path, content).await?;

        tracing::debug!(path = %path.display(), bytes = document.len(), "export written");
        Ok(path)
    }
}

/// Render Markdown into a minimal standalone page
pub fn render_html(document: &str, title: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut body = String::new();
    html::push_html(&mut body, Parser::new_ext(document, options));

    let mut title_html = String::new();
    html::push_html(&mut title_html, std::iter::once(Event::Text(title.into())));

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title_html}</title>
<style>
body {{ font-family: sans-serif; max-width: 50em; margin: 2em auto; padding: 0 1em; line-height: 1.5; }}
table {{ border-collapse: collapse; }}
th, td {{ border: 1px solid #999; padding: 0.3em 0.6em; }}
pre {{ background: #f4f4f4; padding: 0.8em; overflow-x: auto; }}
</style>
</head>
<body>
{body}</body>
</html>
"#
    )
}
