//! Integration tests for the single-file and batch paths.
//!
//! These run without tesseract or pdfium: a scripted engine reports each
//! image's dimensions as its text, a scripted rasteriser returns fixed page
//! images, and URL inputs are served by a throwaway in-process HTTP server.
//!
//! Run with:
//!   cargo test --test integration

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgb, RgbImage};
use ocr_batch::engine::{RawRecognition, RawWordRow};
use ocr_batch::{
    ErrorKind, FileDescriptor, Job, JobProgressCallback, JobStatus, OcrConfig, OcrConfigBuilder, OcrError,
    OcrService, Rasterizer, RawFileInput, RecognitionEngine, TaskResult,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_test::{assert_err, assert_ok};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Engine whose page text is `"{width}x{height} {language}"`.
///
/// Every call records the image path and whether the file existed, so
/// tests can check temp files are alive during recognition and gone after.
#[derive(Default)]
struct ScriptedEngine {
    delay: Duration,
    unavailable: bool,
    panic_on_width: Option<u32>,
    calls: Mutex<Vec<(PathBuf, bool)>>,
}

impl ScriptedEngine {
    fn with_delay(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(PathBuf, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(&self, image_path: &Path, language: &str) -> Result<RawRecognition, OcrError> {
        self.calls
            .lock()
            .unwrap()
            .push((image_path.to_path_buf(), image_path.exists()));
        if self.unavailable {
            return Err(OcrError::EngineUnavailable {
                engine: "scripted".into(),
                detail: "executable not found on PATH".into(),
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let (w, h) = image::image_dimensions(image_path).map_err(|e| OcrError::RecognitionFailed {
            detail: e.to_string(),
        })?;
        if self.panic_on_width == Some(w) {
            panic!("scripted engine exploded on a {w}px image");
        }

        let word = |text: Option<&str>, word_num: u32| RawWordRow {
            level: 5,
            page_num: 1,
            block_num: 1,
            par_num: 1,
            line_num: 1,
            word_num,
            left: 1,
            top: 2,
            width: w.saturating_sub(2),
            height: h.saturating_sub(2),
            conf: Some(95.0),
            text: text.map(|t| t.to_string()),
        };
        Ok(RawRecognition {
            text: format!("{w}x{h} {language}"),
            rows: vec![
                RawWordRow {
                    level: 1,
                    conf: None,
                    ..Default::default()
                },
                word(Some(&format!("{w}x{h}")), 1),
                word(Some("   "), 2),
                word(Some(language), 3),
            ],
        })
    }

    async fn version(&self) -> Result<String, OcrError> {
        if self.unavailable {
            Err(OcrError::EngineUnavailable {
                engine: "scripted".into(),
                detail: "executable not found on PATH".into(),
            })
        } else {
            Ok("scripted 1.0".into())
        }
    }

    async fn languages(&self) -> Result<Vec<String>, OcrError> {
        Ok(vec!["deu".into(), "eng".into()])
    }
}

/// Rasteriser returning one blank page per configured size.
struct ScriptedRasterizer {
    pages: Vec<(u32, u32)>,
}

#[async_trait]
impl Rasterizer for ScriptedRasterizer {
    async fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, OcrError> {
        assert!(path.exists(), "rasteriser called on missing file");
        Ok(self
            .pages
            .iter()
            .map(|&(w, h)| DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))))
            .collect())
    }
}

/// Records every progress event as a short string.
#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl JobProgressCallback for RecordingCallback {
    fn on_job_start(&self, _job_id: &str, total_files: usize) {
        self.events.lock().unwrap().push(format!("job_start {total_files}"));
    }
    fn on_file_start(&self, _job_id: &str, index: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("file_start {index}"));
    }
    fn on_file_complete(&self, _job_id: &str, index: usize, _total: usize, result: &TaskResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("file_complete {index} {}", result.is_error()));
    }
    fn on_job_complete(&self, _job_id: &str, status: JobStatus) {
        self.events.lock().unwrap().push(format!("job_complete {status}"));
    }
}

/// Panics when the runner announces file `panic_at`.
struct PanickingCallback {
    panic_at: usize,
}

impl JobProgressCallback for PanickingCallback {
    fn on_file_start(&self, _job_id: &str, index: usize, _total: usize) {
        if index == self.panic_at {
            panic!("progress sink closed");
        }
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(w, h)).unwrap();
    path
}

/// Route library logs through the test writer; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn upload_dir(tmp: &TempDir) -> PathBuf {
    tmp.path().join("uploads")
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(rd) => rd.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

struct Harness {
    service: OcrService,
    engine: Arc<ScriptedEngine>,
    tmp: TempDir,
}

fn harness_with(
    engine: ScriptedEngine,
    configure: impl FnOnce(OcrConfigBuilder) -> OcrConfigBuilder,
) -> Harness {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let config = configure(OcrConfig::builder().upload_dir(upload_dir(&tmp)))
        .build()
        .unwrap();
    let engine = Arc::new(engine);
    let rasterizer = Arc::new(ScriptedRasterizer {
        pages: vec![(40, 30), (50, 20)],
    });
    let service = OcrService::with_components(config, engine.clone(), rasterizer).unwrap();
    Harness {
        tmp,
        engine,
        service,
    }
}

fn harness() -> Harness {
    harness_with(ScriptedEngine::default(), |b| b)
}

struct Route {
    path: &'static str,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

/// Serve `routes` over plain HTTP/1.1 on an ephemeral port; returns the base URL.
async fn serve(routes: Vec<Route>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, content_type, body) = match routes.iter().find(|r| r.path == path) {
                    Some(r) => (r.status, r.content_type, r.body.clone()),
                    None => (404, "text/plain", b"not found".to_vec()),
                };
                let reason = if status == 200 { "OK" } else { "Error" };
                let head = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = sock.write_all(head.as_bytes()).await;
                let _ = sock.write_all(&body).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

// ── Single-file path ─────────────────────────────────────────────────────────

#[tokio::test]
async fn local_image_is_recognised_and_left_in_place() {
    let h = harness();
    let path = write_png(h.tmp.path(), "scan.png", 64, 32);

    let result = h.service.recognize(&FileDescriptor::path(&path)).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.text.as_deref(), Some("64x32 eng"));
    assert_eq!(result.filename, "scan.png");
    assert_eq!(result.source, format!("filepath://{}", path.display()));
    assert_eq!(result.language, "en");
    assert_eq!(result.engine_version, "scripted 1.0");
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].page_number, 1);
    assert_eq!((result.pages[0].image_width, result.pages[0].image_height), (64, 32));
    assert!(result
        .image_preview
        .as_deref()
        .is_some_and(|p| p.starts_with("data:image/png;base64,")));
    assert!(result.ended_at >= result.started_at);

    assert!(path.exists(), "caller-supplied file must not be deleted");
    assert_eq!(h.engine.calls()[0].0, path);
}

#[tokio::test]
async fn blank_words_never_reach_the_caller() {
    let h = harness();
    let path = write_png(h.tmp.path(), "scan.png", 16, 16);

    let result = h.service.recognize(&FileDescriptor::path(&path)).await;

    let words: Vec<&str> = result.pages[0].words.iter().map(|w| w.text.as_str()).collect();
    assert_eq!(words, vec!["16x16", "eng"]);
    assert!(result.pages[0].words.iter().all(|w| w.confidence == Some(95.0)));
    assert_eq!(result.word_count(), 2);
}

#[tokio::test]
async fn caller_language_is_mapped_for_the_engine_only() {
    let h = harness();
    let path = write_png(h.tmp.path(), "brief.png", 8, 8);

    let result = h
        .service
        .recognize(&FileDescriptor::path(&path).with_language("de"))
        .await;

    assert_eq!(result.text.as_deref(), Some("8x8 deu"));
    assert_eq!(result.language, "de");
}

#[tokio::test]
async fn unknown_language_is_a_validation_error() {
    let h = harness();
    let path = write_png(h.tmp.path(), "scan.png", 8, 8);

    let result = h
        .service
        .recognize(&FileDescriptor::path(&path).with_language("xx"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::Validation));
    assert!(result.text.is_none());
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn inline_payload_temp_file_is_removed_after_success() {
    let h = harness();
    let payload = STANDARD.encode(png_bytes(20, 10));

    let result = h
        .service
        .recognize(&FileDescriptor::inline(payload, "My Scan.png"))
        .await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.filename, "My_Scan.png");
    assert_eq!(result.source, "base64_data");
    assert_eq!(result.text.as_deref(), Some("20x10 eng"));

    let calls = h.engine.calls();
    assert_eq!(calls.len(), 1);
    let (temp_path, existed) = &calls[0];
    assert!(existed, "temp file must exist while recognising");
    assert!(temp_path.starts_with(upload_dir(&h.tmp)));
    assert!(!temp_path.exists(), "temp file must be deleted afterwards");
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

#[tokio::test]
async fn temp_file_is_removed_when_recognition_fails() {
    let h = harness_with(
        ScriptedEngine {
            unavailable: true,
            ..Default::default()
        },
        |b| b,
    );
    let payload = STANDARD.encode(png_bytes(4, 4));

    let result = h.service.recognize(&FileDescriptor::inline(payload, "a.png")).await;

    assert_eq!(result.error_kind, Some(ErrorKind::EngineUnavailable));
    assert_eq!(result.engine_version, "Not Installed");
    assert!(result.text.is_none());
    assert!(result.pages.is_empty());
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

#[tokio::test]
async fn engine_panic_is_captured_and_temp_file_removed() {
    let h = harness_with(
        ScriptedEngine {
            panic_on_width: Some(13),
            ..Default::default()
        },
        |b| b,
    );
    let payload = STANDARD.encode(png_bytes(13, 4));

    let result = h.service.recognize(&FileDescriptor::inline(payload, "boom.png")).await;

    assert_eq!(result.error_kind, Some(ErrorKind::Unexpected));
    assert!(result.error.as_deref().unwrap().contains("exploded"));
    assert!(result.text.is_none());
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

#[tokio::test]
async fn undecodable_image_is_a_processing_error() {
    let h = harness();
    let path = h.tmp.path().join("broken.png");
    std::fs::write(&path, b"this is not a png").unwrap();

    let result = h.service.recognize(&FileDescriptor::path(&path)).await;

    assert_eq!(result.error_kind, Some(ErrorKind::Processing));
    assert!(result.pages.is_empty());
    assert!(path.exists());
}

#[tokio::test]
async fn descriptor_with_no_source_yields_error_result() {
    let h = harness();

    let result = h.service.recognize_input(&RawFileInput::default()).await;

    assert!(result.is_error());
    assert_eq!(result.error_kind, Some(ErrorKind::Validation));
    assert!(result.text.is_none());
    assert!(result.pages.is_empty());
    assert_eq!(result.filename, "unknown_file");
    assert_eq!(result.engine_version, "scripted 1.0");
}

#[tokio::test]
async fn pdf_pages_are_recognised_in_order_and_stored() {
    let h = harness_with(ScriptedEngine::default(), |b| b.public_prefix("https://files.example/uploads/"));
    let pdf = h.tmp.path().join("doc.pdf");
    std::fs::write(&pdf, b"%PDF-1.4 scripted").unwrap();

    let result = h.service.recognize(&FileDescriptor::path(&pdf)).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.text.as_deref(), Some("40x30 eng\n50x20 eng"));
    let numbers: Vec<usize> = result.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert!(result.image_preview.is_none());

    assert!(result.source.starts_with("https://files.example/uploads/ocr_"));
    assert!(result.source.ends_with("_doc.pdf"));
    let stored = entries(&upload_dir(&h.tmp));
    assert_eq!(stored.len(), 1, "only the permanent copy remains: {stored:?}");
    assert_eq!(std::fs::read(&stored[0]).unwrap(), b"%PDF-1.4 scripted");
    assert!(pdf.exists());

    for (page_path, existed) in h.engine.calls() {
        assert!(existed);
        assert!(!page_path.exists(), "page images are temporary");
    }
}

#[tokio::test]
async fn pdf_source_is_a_path_without_public_prefix() {
    let h = harness();
    let pdf = h.tmp.path().join("doc.pdf");
    std::fs::write(&pdf, b"%PDF").unwrap();

    let result = h.service.recognize(&FileDescriptor::path(&pdf)).await;

    assert!(Path::new(&result.source).starts_with(upload_dir(&h.tmp)));
    assert!(Path::new(&result.source).exists());
}

#[tokio::test]
async fn pdf_copy_stays_flat_in_upload_dir_whatever_the_display_name() {
    let h = harness();
    let pdf = h.tmp.path().join("doc.pdf");
    std::fs::write(&pdf, b"%PDF").unwrap();

    for name in ["scans/doc.pdf", "../../evil.pdf", "///"] {
        let input = RawFileInput {
            filepath: Some(pdf.display().to_string()),
            filename: Some(name.to_string()),
            ..Default::default()
        };
        let result = h.service.recognize_input(&input).await;

        assert!(result.error.is_none(), "[{name}] unexpected error: {:?}", result.error);
        assert_eq!(result.filename, name);
        let stored = PathBuf::from(&result.source);
        assert_eq!(stored.parent(), Some(upload_dir(&h.tmp).as_path()), "[{name}]");
        assert!(stored.exists(), "[{name}] permanent copy missing");
    }
    let names: Vec<String> = entries(&upload_dir(&h.tmp))
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().any(|n| n.ends_with("_scans_doc.pdf")));
    assert!(names.iter().any(|n| n.ends_with("_evil.pdf")));
    assert!(names.iter().any(|n| n.ends_with("_unknown_file")));
}

// ── URL inputs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn url_input_is_downloaded_recognised_and_cleaned_up() {
    let base = serve(vec![Route {
        path: "/scans/receipt.png",
        status: 200,
        content_type: "image/png",
        body: png_bytes(30, 12),
    }])
    .await;
    let h = harness();
    let url = format!("{base}/scans/receipt.png");

    let result = h.service.recognize(&FileDescriptor::url(&url)).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.source, url);
    assert_eq!(result.filename, "receipt.png");
    assert_eq!(result.text.as_deref(), Some("30x12 eng"));
    assert!(h.engine.calls()[0].1);
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

#[tokio::test]
async fn unsupported_url_format_is_rejected_and_cleaned_up() {
    let base = serve(vec![Route {
        path: "/report.docx",
        status: 200,
        content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        body: b"PK\x03\x04".to_vec(),
    }])
    .await;
    let h = harness();
    let url = format!("{base}/report.docx");

    let result = h.service.recognize(&FileDescriptor::url(&url)).await;

    assert_eq!(result.error.as_deref(), Some("File format not supported"));
    assert_eq!(result.error_kind, Some(ErrorKind::Format));
    assert_eq!(result.filename, "report.docx");
    assert_eq!(result.source, url);
    assert!(result.text.is_none());
    assert!(h.engine.calls().is_empty());
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

#[tokio::test]
async fn http_error_is_a_download_error() {
    let base = serve(vec![]).await;
    let h = harness();

    let result = h
        .service
        .recognize(&FileDescriptor::url(format!("{base}/missing.png")))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::Download));
    assert!(result.error.as_deref().unwrap().contains("404"));
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

#[tokio::test]
async fn oversized_download_is_refused() {
    let base = serve(vec![Route {
        path: "/huge.png",
        status: 200,
        content_type: "image/png",
        body: vec![0u8; 4096],
    }])
    .await;
    let h = harness_with(ScriptedEngine::default(), |b| b.max_download_bytes(1024));

    let result = h
        .service
        .recognize(&FileDescriptor::url(format!("{base}/huge.png")))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::Download));
    assert!(entries(&upload_dir(&h.tmp)).is_empty());
}

// ── Batches ──────────────────────────────────────────────────────────────────

async fn wait(service: &OcrService, job_id: &str) -> Job {
    let job = service
        .wait_for_job(job_id, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(job.status.is_terminal(), "job did not finish: {:?}", job.status);
    job
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_lifecycle_is_observable_in_order() {
    let h = harness_with(ScriptedEngine::with_delay(150), |b| b);
    let files: Vec<FileDescriptor> = [(10, 10), (20, 10), (30, 10)]
        .iter()
        .enumerate()
        .map(|(i, &(w, hgt))| FileDescriptor::path(write_png(h.tmp.path(), &format!("f{i}.png"), w, hgt)))
        .collect();

    let receipt = h.service.submit(files).unwrap();
    assert_eq!(receipt.status, JobStatus::Pending);

    let mut seen = Vec::new();
    loop {
        let job = h.service.status(&receipt.job_id).unwrap();
        assert_eq!(job.total_files, 3);
        assert!(job.results.len() <= 3);
        if job.status != JobStatus::InProgress {
            assert!(
                job.status != JobStatus::Pending || job.results.is_empty(),
                "a pending job has no results"
            );
        }
        let terminal = job.status.is_terminal();
        seen.push((job.status, job.results.len()));
        if terminal {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Status never moves backwards and results only grow.
    let rank = |s: JobStatus| match s {
        JobStatus::Pending => 0,
        JobStatus::InProgress => 1,
        JobStatus::Completed | JobStatus::Failed => 2,
    };
    for pair in seen.windows(2) {
        assert!(rank(pair[0].0) <= rank(pair[1].0));
        assert!(pair[0].1 <= pair[1].1);
    }
    assert!(seen
        .iter()
        .any(|&(s, n)| s == JobStatus::InProgress && n > 0 && n < 3));

    let job = h.service.status(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    assert!(job.ended_at.is_some());
    let texts: Vec<&str> = job.results.iter().filter_map(|r| r.text.as_deref()).collect();
    assert_eq!(texts, vec!["10x10 eng", "20x10 eng", "30x10 eng"]);
}

#[tokio::test]
async fn polling_a_finished_job_is_idempotent() {
    let h = harness();
    let path = write_png(h.tmp.path(), "a.png", 5, 5);
    let receipt = h.service.submit(vec![FileDescriptor::path(path)]).unwrap();
    wait(&h.service, &receipt.job_id).await;

    let first = h.service.status(&receipt.job_id).unwrap();
    let second = h.service.status(&receipt.job_id).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn failed_file_does_not_stop_the_batch() {
    let h = harness();
    let good = write_png(h.tmp.path(), "good.png", 6, 6);
    let docx = h.tmp.path().join("notes.docx");
    std::fs::write(&docx, b"PK").unwrap();

    let receipt = h
        .service
        .submit(vec![
            FileDescriptor::path(&good),
            FileDescriptor::path(&docx),
            FileDescriptor::path(&good),
        ])
        .unwrap();
    let job = wait(&h.service, &receipt.job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    assert_eq!(job.results.len(), 3);
    assert!(!job.results[0].is_error());
    assert_eq!(job.results[1].error.as_deref(), Some("File format not supported"));
    assert!(!job.results[2].is_error());
    assert_eq!(job.failed_files(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_batches_keep_their_own_results() {
    let h = harness_with(ScriptedEngine::with_delay(20), |b| b);
    let batch = |prefix: &str, width: u32| -> Vec<FileDescriptor> {
        (0..3)
            .map(|i| FileDescriptor::path(write_png(h.tmp.path(), &format!("{prefix}{i}.png"), width, 7)))
            .collect()
    };

    let a = h.service.submit(batch("a", 11)).unwrap();
    let b = h.service.submit(batch("b", 22)).unwrap();
    assert_ne!(a.job_id, b.job_id);

    let job_a = wait(&h.service, &a.job_id).await;
    let job_b = wait(&h.service, &b.job_id).await;

    let names = |job: &Job| job.results.iter().map(|r| r.filename.clone()).collect::<Vec<_>>();
    assert_eq!(names(&job_a), vec!["a0.png", "a1.png", "a2.png"]);
    assert_eq!(names(&job_b), vec!["b0.png", "b1.png", "b2.png"]);
    assert!(job_a.results.iter().all(|r| r.text.as_deref() == Some("11x7 eng")));
    assert!(job_b.results.iter().all(|r| r.text.as_deref() == Some("22x7 eng")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn job_limit_keeps_later_batches_pending() {
    let h = harness_with(ScriptedEngine::with_delay(200), |b| b.max_concurrent_jobs(1));
    let first = write_png(h.tmp.path(), "first.png", 3, 3);
    let second = write_png(h.tmp.path(), "second.png", 4, 4);

    let a = h
        .service
        .submit(vec![FileDescriptor::path(&first), FileDescriptor::path(&first)])
        .unwrap();
    loop {
        let job_a = h.service.status(&a.job_id).unwrap();
        if job_a.status == JobStatus::InProgress {
            break;
        }
        assert_eq!(job_a.status, JobStatus::Pending);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let b = h.service.submit(vec![FileDescriptor::path(&second)]).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.service.status(&a.job_id).unwrap().status, JobStatus::InProgress);
    assert_eq!(h.service.status(&b.job_id).unwrap().status, JobStatus::Pending);

    assert_eq!(wait(&h.service, &a.job_id).await.status, JobStatus::Completed);
    assert_eq!(wait(&h.service, &b.job_id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn malformed_batches_are_rejected_before_a_job_exists() {
    let h = harness();

    assert!(matches!(h.service.submit(vec![]), Err(OcrError::EmptyBatch)));
    assert!(matches!(h.service.submit_raw(vec![]), Err(OcrError::EmptyBatch)));

    let err = assert_err!(h.service.submit_raw(vec![
        RawFileInput {
            filepath: Some("a.png".into()),
            ..Default::default()
        },
        RawFileInput {
            base64: Some("AAAA".into()),
            ..Default::default()
        },
    ]));
    assert!(matches!(err, OcrError::InvalidBatchEntry { index: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(h.service.store().is_empty());
}

#[tokio::test]
async fn json_payloads_are_accepted() {
    let h = harness();
    let path = write_png(h.tmp.path(), "j.png", 9, 9);
    let payload = serde_json::json!({
        "files": [
            {"filepath": path.display().to_string(), "language": "de"},
            {"base64": STANDARD.encode(png_bytes(2, 2)), "filename": "inline.png"},
        ]
    });

    let receipt = assert_ok!(h.service.submit_json(payload));
    let job = wait(&h.service, &receipt.job_id).await;

    assert_eq!(job.results.len(), 2);
    assert_eq!(job.results[0].text.as_deref(), Some("9x9 deu"));
    assert_eq!(job.results[1].source, "base64_data");

    let wire = serde_json::to_value(&job).unwrap();
    assert_eq!(wire["status"], "completed");
    assert_eq!(wire["results"][0]["language"], "de");
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let h = harness();
    let err = h.service.status("no-such-job").unwrap_err();
    assert!(matches!(err, OcrError::JobNotFound { .. }));
    assert_eq!(err.to_string(), "Job no-such-job not found.");
}

#[tokio::test]
async fn progress_events_follow_the_batch() {
    let recorder = Arc::new(RecordingCallback::default());
    let cb = recorder.clone();
    let h = harness_with(ScriptedEngine::default(), move |b| b.progress_callback(cb));
    let good = write_png(h.tmp.path(), "good.png", 6, 6);
    let bad = h.tmp.path().join("bad.txt");
    std::fs::write(&bad, b"text").unwrap();

    let receipt = h
        .service
        .submit(vec![FileDescriptor::path(&good), FileDescriptor::path(&bad)])
        .unwrap();
    h.service.drain().await;

    assert_eq!(h.service.status(&receipt.job_id).unwrap().status, JobStatus::Completed);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "job_start 2",
            "file_start 0",
            "file_complete 0 false",
            "file_start 1",
            "file_complete 1 true",
            "job_complete completed",
        ]
    );
    assert_eq!(h.service.active_workers(), 0);
}

#[tokio::test]
async fn runner_panic_fails_the_job_and_keeps_finished_results() {
    let h = harness_with(ScriptedEngine::default(), |b| {
        b.progress_callback(Arc::new(PanickingCallback { panic_at: 1 }))
    });
    let first = write_png(h.tmp.path(), "first.png", 7, 5);
    let second = write_png(h.tmp.path(), "second.png", 9, 3);

    let receipt = h
        .service
        .submit(vec![FileDescriptor::path(&first), FileDescriptor::path(&second)])
        .unwrap();
    h.service.drain().await;

    let job = h.service.status(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.as_deref().unwrap_or_default();
    assert!(error.starts_with("Job processing failed:"), "error: {error}");
    assert!(error.contains("progress sink closed"));
    assert!(job.ended_at.is_some());
    assert!(job.duration_ms.is_some());
    assert_eq!(job.total_files, 2);
    assert_eq!(job.results.len(), 1);
    assert_eq!(job.results[0].filename, "first.png");
    assert_eq!(job.results[0].text.as_deref(), Some("7x5 eng"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.service.status(&receipt.job_id).unwrap(), job);
    assert_eq!(h.service.active_workers(), 0);
}

#[tokio::test]
async fn languages_and_version_come_from_the_engine() {
    let h = harness();
    assert_eq!(h.service.languages().await.unwrap(), vec!["deu", "eng"]);
    assert_eq!(h.service.engine_version().await, "scripted 1.0");
}

#[test]
fn sync_wrapper_reports_unsupported_format() {
    let tmp = TempDir::new().unwrap();
    let docx = tmp.path().join("letter.docx");
    std::fs::write(&docx, b"PK").unwrap();
    let config = OcrConfig::builder()
        .upload_dir(upload_dir(&tmp))
        .build()
        .unwrap();

    let result = ocr_batch::recognize_file_sync(config, &FileDescriptor::path(&docx)).unwrap();

    assert_eq!(result.error.as_deref(), Some("File format not supported"));
    assert!(docx.exists());
}
