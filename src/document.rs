use crate::error::{ReportError, Result};
use crate::markup::{parse_markup, Block, MarkupDocument, TextRun};
use docx_rs::{
    AbstractNumbering, AlignmentType, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText,
    NumberFormat, Numbering, NumberingId, Paragraph, Pic, Run, RunFonts, SpecialIndentType, Start,
    Style, StyleType,
};
use image::{ImageError, ImageFormat};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

const FONT: &str = "Calibri";
/// Half-points, i.e. 11pt.
const BODY_SIZE: usize = 22;
const IMAGE_WIDTH_EMU: u32 = 6 * 914_400;
const BULLET_NUMBERING: usize = 1;
const BULLET_LEVELS: usize = 3;

/// What ended up in the written document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub headings: usize,
    pub paragraphs: usize,
    pub bullets: usize,
    pub images_embedded: usize,
    pub images_skipped: usize,
    pub captions: usize,
    pub page_breaks: usize,
}

/// Writes a parsed markup document as a Word document. Image paths are
/// resolved against `output_dir`.
pub struct DocxWriter {
    output_dir: PathBuf,
}

impl DocxWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn write(&self, document: &MarkupDocument, path: &Path) -> Result<ConversionSummary> {
        let mut summary = ConversionSummary::default();
        let mut docx = base_document();

        docx = docx.add_paragraph(
            Paragraph::new()
                .style("Title")
                .add_run(Run::new().add_text(&document.title)),
        );
        summary.headings += 1;

        for block in &document.blocks {
            match block {
                Block::Heading { level, text } => {
                    let style = if *level <= 1 { "Heading1" } else { "Heading3" };
                    docx = docx.add_paragraph(
                        Paragraph::new()
                            .style(style)
                            .add_run(Run::new().add_text(text)),
                    );
                    summary.headings += 1;
                }
                Block::Image { alt, path } => {
                    let Some(pic) = self.load_picture(path) else {
                        summary.images_skipped += 1;
                        continue;
                    };
                    docx = docx
                        .add_paragraph(
                            Paragraph::new()
                                .align(AlignmentType::Center)
                                .add_run(Run::new().add_image(pic)),
                        )
                        .add_paragraph(
                            Paragraph::new()
                                .style("Caption")
                                .add_run(Run::new().add_text(alt)),
                        );
                    summary.images_embedded += 1;
                    summary.captions += 1;
                }
                Block::Bullet { level, runs } => {
                    let level = (*level).min(BULLET_LEVELS - 1);
                    docx = docx.add_paragraph(
                        with_runs(Paragraph::new(), runs).numbering(
                            NumberingId::new(BULLET_NUMBERING),
                            IndentLevel::new(level),
                        ),
                    );
                    summary.bullets += 1;
                }
                Block::Paragraph { runs } => {
                    docx = docx.add_paragraph(with_runs(Paragraph::new(), runs));
                    summary.paragraphs += 1;
                }
                Block::PageBreak => {
                    docx = docx.add_paragraph(
                        Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
                    );
                    summary.page_breaks += 1;
                }
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        docx.build()
            .pack(file)
            .map_err(|e| ReportError::Export(format!("{}: {}", path.display(), e)))?;

        info!(
            "Wrote {} ({} headings, {} images, {} skipped)",
            path.display(),
            summary.headings,
            summary.images_embedded,
            summary.images_skipped
        );
        Ok(summary)
    }

    fn load_picture(&self, relative: &str) -> Option<Pic> {
        let full = self.output_dir.join(relative);
        let bytes = match std::fs::read(&full) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Skipping image {}: {}", full.display(), e);
                return None;
            }
        };
        let (png, width, height) = match picture_png(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Skipping image {}: {}", full.display(), e);
                return None;
            }
        };
        if width == 0 || height == 0 {
            debug!("Skipping image {}: empty image", full.display());
            return None;
        }

        let height_emu = (IMAGE_WIDTH_EMU as u64 * height as u64 / width as u64) as u32;
        Some(Pic::new_with_dimensions(png, width, height).size(IMAGE_WIDTH_EMU, height_emu))
    }
}

fn base_document() -> Docx {
    let bullet_levels = (0..BULLET_LEVELS).fold(AbstractNumbering::new(BULLET_NUMBERING), |abs, i| {
        abs.add_level(
            Level::new(
                i,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new(if i % 2 == 0 { "\u{2022}" } else { "\u{25E6}" }),
                LevelJc::new("left"),
            )
            .indent(
                Some(720 * (i as i32 + 1)),
                Some(SpecialIndentType::Hanging(360)),
                None,
                None,
            ),
        )
    });

    Docx::new()
        .default_fonts(
            RunFonts::new()
                .ascii(FONT)
                .hi_ansi(FONT)
                .east_asia(FONT)
                .cs(FONT),
        )
        .default_size(BODY_SIZE)
        .add_style(
            Style::new("Title", StyleType::Paragraph)
                .name("Title")
                .size(52)
                .color("17365D"),
        )
        .add_style(
            Style::new("Heading1", StyleType::Paragraph)
                .name("Heading 1")
                .size(32)
                .bold()
                .color("2F5496"),
        )
        .add_style(
            Style::new("Heading3", StyleType::Paragraph)
                .name("Heading 3")
                .size(24)
                .bold()
                .color("1F3763"),
        )
        .add_style(
            Style::new("Caption", StyleType::Paragraph)
                .name("Caption")
                .size(18)
                .italic()
                .color("44546A")
                .align(AlignmentType::Center),
        )
        .add_abstract_numbering(bullet_levels)
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
}

fn with_runs(mut paragraph: Paragraph, runs: &[TextRun]) -> Paragraph {
    for run in runs {
        let mut r = Run::new().add_text(&run.text);
        if run.bold {
            r = r.bold();
        }
        paragraph = paragraph.add_run(r);
    }
    paragraph
}

/// Decodes an image in any supported format and returns it as PNG bytes with
/// its pixel size. PNG input is passed through unchanged.
pub fn picture_png(bytes: &[u8]) -> std::result::Result<(Vec<u8>, u32, u32), ImageError> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = (img.width(), img.height());
    if format == ImageFormat::Png {
        return Ok((bytes.to_vec(), width, height));
    }

    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png)?;
    Ok((png.into_inner(), width, height))
}

/// Reads a markup file and writes `executive_report.docx` into `output_dir`.
pub fn convert_markdown_file(md_path: &Path, output_dir: &Path) -> Result<ConversionSummary> {
    convert_markdown_file_to(md_path, output_dir, &output_dir.join("executive_report.docx"))
}

pub fn convert_markdown_file_to(
    md_path: &Path,
    output_dir: &Path,
    docx_path: &Path,
) -> Result<ConversionSummary> {
    let content = std::fs::read_to_string(md_path).map_err(|e| {
        ReportError::Load(format!("markdown file {}: {}", md_path.display(), e))
    })?;

    let document = parse_markup(&content);
    debug!(
        "Parsed {} blocks from {}",
        document.blocks.len(),
        md_path.display()
    );
    DocxWriter::new(output_dir).write(&document, docx_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    /// Smallest valid 1x1 RGBA PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
        0xCF, 0xC0, 0xF0, 0x1F, 0x00, 0x05, 0x00, 0x01, 0xFF, 0x89, 0x99, 0x3D, 0x1D, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    const MARKUP: &str = "# Executive Sales Report\n\n## Annual Revenue Overview\n![Annual Revenue by Property](visualizations/annual_revenue.png)\n\nRevenue grew **12%**.\n\n- Total Revenue by Year:\n  - **2023**: $1,500.00\n";

    fn assert_is_zip(path: &Path) {
        let mut bytes = Vec::new();
        File::open(path).unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_picture_png() {
        let (png, width, height) = picture_png(TINY_PNG).unwrap();
        assert_eq!((width, height), (1, 1));
        assert_eq!(png, TINY_PNG);

        let (png, width, height) = picture_png(&jpeg_bytes(4, 2)).unwrap();
        assert_eq!((width, height), (4, 2));
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let mut gif = Cursor::new(Vec::new());
        image::DynamicImage::new_rgba8(1, 1)
            .write_to(&mut gif, ImageFormat::Gif)
            .unwrap();
        let (_, width, height) = picture_png(gif.get_ref()).unwrap();
        assert_eq!((width, height), (1, 1));

        assert!(picture_png(b"not an image").is_err());
    }

    #[test]
    fn test_non_png_image_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chart.jpg"), jpeg_bytes(4, 2)).unwrap();
        let writer = DocxWriter::new(dir.path());

        let pic = writer.load_picture("chart.jpg").unwrap();
        assert_eq!(pic.size, (IMAGE_WIDTH_EMU, IMAGE_WIDTH_EMU / 2));

        let document = parse_markup("# Report\n## Charts\n![Chart](chart.jpg)\n");
        let summary = writer.write(&document, &dir.path().join("out.docx")).unwrap();
        assert_eq!(summary.images_embedded, 1);
        assert_eq!(summary.captions, 1);
        assert_eq!(summary.images_skipped, 0);
    }

    #[test]
    fn test_undecodable_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chart.png"), b"not an image").unwrap();
        let document = parse_markup("# Report\n## Charts\n![Chart](chart.png)\n");

        let summary = DocxWriter::new(dir.path())
            .write(&document, &dir.path().join("out.docx"))
            .unwrap();
        assert_eq!(summary.images_embedded, 0);
        assert_eq!(summary.images_skipped, 1);
    }

    #[test]
    fn test_embeds_existing_image_with_caption() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("visualizations")).unwrap();
        std::fs::write(dir.path().join("visualizations/annual_revenue.png"), TINY_PNG).unwrap();
        let md_path = dir.path().join("executive_report.md");
        std::fs::write(&md_path, MARKUP).unwrap();

        let summary = convert_markdown_file(&md_path, dir.path()).unwrap();

        assert_eq!(summary.images_embedded, 1);
        assert_eq!(summary.captions, 1);
        assert_eq!(summary.images_skipped, 0);
        assert_eq!(summary.headings, 2);
        assert_eq!(summary.paragraphs, 1);
        assert_eq!(summary.bullets, 2);
        assert_eq!(summary.page_breaks, 1);
        assert_is_zip(&dir.path().join("executive_report.docx"));
    }

    #[test]
    fn test_missing_image_is_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let md_path = dir.path().join("executive_report.md");
        std::fs::write(&md_path, MARKUP).unwrap();

        let summary = convert_markdown_file(&md_path, dir.path()).unwrap();

        assert_eq!(summary.images_embedded, 0);
        assert_eq!(summary.captions, 0);
        assert_eq!(summary.images_skipped, 1);
        assert!(dir.path().join("executive_report.docx").exists());
    }

    #[test]
    fn test_image_only_markup() {
        let dir = tempfile::tempdir().unwrap();
        let document = parse_markup("# Report\n## Charts\n![Chart](chart.png)\n");
        let writer = DocxWriter::new(dir.path());

        let absent = writer.write(&document, &dir.path().join("absent.docx")).unwrap();
        assert_eq!(absent.images_embedded, 0);
        assert_eq!(absent.captions, 0);

        std::fs::write(dir.path().join("chart.png"), TINY_PNG).unwrap();
        let present = writer.write(&document, &dir.path().join("present.docx")).unwrap();
        assert_eq!(present.images_embedded, 1);
        assert_eq!(present.captions, 1);
        assert_eq!(present.paragraphs, 0);
    }

    #[test]
    fn test_unreadable_markup_is_a_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = convert_markdown_file(&dir.path().join("missing.md"), dir.path());

        assert!(matches!(result, Err(ReportError::Load(_))));
        assert!(!dir.path().join("executive_report.docx").exists());
    }
}
