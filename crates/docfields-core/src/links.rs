//! Printing lists of web links to PDF files.
//!
//! Links are read from the first column of a `.csv` or `.xlsx` sheet, or from
//! the lines of a `.txt` file. Every link becomes one PDF; links that already
//! serve a PDF are downloaded, anything else goes through the page renderer.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calamine::{Reader, Xlsx, open_workbook};
use reqwest::Url;
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::backend::PdfRenderer;
use crate::error::{ConfigError, DocfieldsError, FileError, Result};

/// Cells without this substring are not links.
const LINK_MARKER: &str = "http";

/// Links in `path`, in file order. Repeated links are kept and reported.
pub fn read_links(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(ConfigError::LinkList(path.to_path_buf()).into());
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    let cells = match extension.as_deref() {
        Some("csv") => csv_first_column(path)?,
        Some("xlsx") => xlsx_first_column(path)?,
        Some("txt") => fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect(),
        _ => return Err(ConfigError::LinkList(path.to_path_buf()).into()),
    };

    let links: Vec<String> = cells
        .into_iter()
        .map(|cell| cell.trim().to_string())
        .filter(|cell| cell.contains(LINK_MARKER))
        .collect();

    let repeated = repeated(&links);
    if !repeated.is_empty() {
        warn!("Repeated links in {:?}: {}", path, repeated.join(", "));
    }
    debug!("Read {} links from {:?}", links.len(), path);
    Ok(links)
}

fn csv_first_column(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut cells = Vec::new();
    for record in reader.records() {
        if let Some(first) = record?.get(0) {
            cells.push(first.to_string());
        }
    }
    Ok(cells)
}

fn xlsx_first_column(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&sheet)?;

    Ok(range
        .rows()
        .filter_map(|row| row.first())
        .map(|cell| cell.to_string())
        .collect())
}

fn repeated(links: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for link in links {
        *counts.entry(link.as_str()).or_default() += 1;
    }
    let mut repeated: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(link, _)| link.to_string())
        .collect();
    repeated.sort();
    repeated
}

/// Last path segment when it names a `.pdf` file.
fn pdf_segment(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let last = url.path_segments()?.next_back()?.to_string();
    last.to_ascii_lowercase().ends_with(".pdf").then_some(last)
}

/// Whether `link` already serves a PDF.
pub fn is_pdf_link(link: &str) -> bool {
    pdf_segment(link).is_some()
}

/// Output file name for `link`: the linked file's own name for PDF links,
/// otherwise the MD5 of the link.
pub fn pdf_file_name(link: &str) -> String {
    match pdf_segment(link) {
        Some(name) if name.len() > ".pdf".len() => {
            format!("{}.pdf", &name[..name.len() - ".pdf".len()])
        }
        _ => format!("{:x}.pdf", md5::compute(link.as_bytes())),
    }
}

/// Turns single links into PDF files.
#[derive(Clone)]
pub struct LinkPrinter {
    pages: Arc<dyn PdfRenderer>,
    downloads: Arc<dyn PdfRenderer>,
}

impl LinkPrinter {
    /// `pages` prints HTML; `downloads` fetches links that are already PDFs.
    pub fn new(pages: Arc<dyn PdfRenderer>, downloads: Arc<dyn PdfRenderer>) -> Self {
        Self { pages, downloads }
    }

    /// Write the PDF for `link` into `out_dir`, returning its path.
    pub fn print(&self, link: &str, out_dir: &Path) -> std::result::Result<PathBuf, FileError> {
        let target = out_dir.join(pdf_file_name(link));
        let backend = if is_pdf_link(link) {
            &self.downloads
        } else {
            &self.pages
        };

        backend.render(link, &target)?;
        debug!("Printed {} via {} to {:?}", link, backend.name(), target);
        Ok(target)
    }
}

/// Where a link batch writes its PDFs and, optionally, its archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutput {
    pub pdf_dir: PathBuf,
    pub archive: PathBuf,
}

impl LinkOutput {
    /// `output` is either a `.zip` path or a directory. PDFs go to a
    /// `linktopdf_<stamp>` directory next to the archive.
    pub fn resolve(output: &Path, stamp: &str) -> Self {
        let is_zip = output
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

        let (base, archive) = if is_zip {
            let base = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            (base, output.to_path_buf())
        } else {
            let archive = output.join(format!("linktopdf_{stamp}.zip"));
            (output.to_path_buf(), archive)
        };

        Self {
            pdf_dir: base.join(format!("linktopdf_{stamp}")),
            archive,
        }
    }
}

/// Result of archiving a PDF directory.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub files: usize,
    /// Files whose content matches an earlier file in the archive.
    pub duplicates: Vec<String>,
}

/// Pack every PDF directly inside `dir` into `archive`, then remove `dir`.
pub fn archive_pdfs(dir: &Path, archive: &Path) -> Result<ArchiveReport> {
    let mut pdfs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();

    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = zip::ZipWriter::new(File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut seen: HashMap<[u8; 16], String> = HashMap::new();
    let mut report = ArchiveReport::default();
    for pdf in &pdfs {
        let name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = fs::read(pdf)?;

        writer.start_file(name.as_str(), options)?;
        writer.write_all(&bytes)?;
        report.files += 1;

        let digest = md5::compute(&bytes).0;
        if let Some(first) = seen.get(&digest) {
            debug!("{} has the same content as {}", name, first);
            report.duplicates.push(name);
        } else {
            seen.insert(digest, name);
        }
    }
    writer.finish()?;

    if !report.duplicates.is_empty() {
        warn!("Identical PDFs in archive: {}", report.duplicates.join(", "));
    }

    fs::remove_dir_all(dir)?;
    info!("Archived {} PDFs into {:?}", report.files, archive);
    Ok(report)
}

/// Fails when the list yielded nothing to print.
pub fn ensure_links(links: &[String], source: &Path) -> Result<()> {
    if links.is_empty() {
        return Err(DocfieldsError::NoLinks(source.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records the links it was asked for and writes a stub PDF.
    #[derive(Default)]
    struct Recording {
        links: Mutex<Vec<String>>,
    }

    impl PdfRenderer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn render(&self, url: &str, output: &Path) -> std::result::Result<(), BackendError> {
            self.links.lock().unwrap().push(url.to_string());
            fs::write(output, b"%PDF-1.4 stub").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_read_links_from_txt_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("links.txt");
        fs::write(&txt, "https://a.example/1\r\n\nnot a link\nhttps://a.example/1\n").unwrap();
        assert_eq!(
            read_links(&txt).unwrap(),
            vec!["https://a.example/1", "https://a.example/1"]
        );

        let csv = dir.path().join("links.csv");
        fs::write(&csv, "url,note\nhttps://b.example/x.pdf,first\n,empty\nhttp://c.example\n").unwrap();
        assert_eq!(
            read_links(&csv).unwrap(),
            vec!["https://b.example/x.pdf", "http://c.example"]
        );
    }

    #[test]
    fn test_read_links_from_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "link").unwrap();
        sheet.write_string(1, 0, "https://d.example/ticket").unwrap();
        sheet.write_string(2, 1, "https://ignored.example").unwrap();
        workbook.save(&path).unwrap();

        assert_eq!(read_links(&path).unwrap(), vec!["https://d.example/ticket"]);
    }

    #[test]
    fn test_read_links_rejects_other_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("links.json");
        fs::write(&json, "[]").unwrap();

        assert!(matches!(
            read_links(&json),
            Err(DocfieldsError::Config(ConfigError::LinkList(_)))
        ));
        assert!(matches!(
            read_links(&dir.path().join("missing.txt")),
            Err(DocfieldsError::Config(ConfigError::LinkList(_)))
        ));
        assert!(ensure_links(&[], &json).is_err());
    }

    #[test]
    fn test_pdf_file_names() {
        assert_eq!(pdf_file_name("https://x.example/upload/2019/voucher.PDF?v=2"), "voucher.pdf");
        assert!(is_pdf_link("https://x.example/upload/2019/voucher.PDF?v=2"));

        let hashed = pdf_file_name("https://x.example/order?id=7");
        assert_eq!(hashed, format!("{:x}.pdf", md5::compute("https://x.example/order?id=7")));
        assert!(!is_pdf_link("https://x.example/order?id=7"));
        assert_ne!(hashed, pdf_file_name("https://x.example/order?id=8"));
    }

    #[test]
    fn test_printer_routes_pdf_links_to_download() {
        let dir = tempfile::tempdir().unwrap();
        let pages = Arc::new(Recording::default());
        let downloads = Arc::new(Recording::default());
        let printer = LinkPrinter::new(pages.clone(), downloads.clone());

        let html = printer.print("https://x.example/order?id=7", dir.path()).unwrap();
        let pdf = printer.print("https://x.example/files/a.pdf", dir.path()).unwrap();

        assert!(html.is_file());
        assert_eq!(pdf, dir.path().join("a.pdf"));
        assert_eq!(*pages.links.lock().unwrap(), vec!["https://x.example/order?id=7"]);
        assert_eq!(*downloads.links.lock().unwrap(), vec!["https://x.example/files/a.pdf"]);
    }

    #[test]
    fn test_output_layout() {
        assert_eq!(
            LinkOutput::resolve(Path::new("/out/batch.zip"), "20240102150405"),
            LinkOutput {
                pdf_dir: PathBuf::from("/out/linktopdf_20240102150405"),
                archive: PathBuf::from("/out/batch.zip"),
            }
        );
        assert_eq!(
            LinkOutput::resolve(Path::new("pdfs"), "20240102150405"),
            LinkOutput {
                pdf_dir: PathBuf::from("pdfs/linktopdf_20240102150405"),
                archive: PathBuf::from("pdfs/linktopdf_20240102150405.zip"),
            }
        );
        assert_eq!(
            LinkOutput::resolve(Path::new("batch.zip"), "1").pdf_dir,
            PathBuf::from("./linktopdf_1")
        );
    }

    #[test]
    fn test_archive_reports_duplicates_and_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let pdfs = root.path().join("linktopdf_1");
        fs::create_dir(&pdfs).unwrap();
        fs::write(pdfs.join("a.pdf"), b"same").unwrap();
        fs::write(pdfs.join("b.pdf"), b"same").unwrap();
        fs::write(pdfs.join("c.pdf"), b"other").unwrap();
        fs::write(pdfs.join("notes.txt"), b"skipped").unwrap();
        let archive = root.path().join("out.zip");

        let report = archive_pdfs(&pdfs, &archive).unwrap();

        assert_eq!(report.files, 3);
        assert_eq!(report.duplicates, vec!["b.pdf"]);
        assert!(!pdfs.exists());

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 3);
        assert!(zip.by_name("c.pdf").is_ok());
    }
}
