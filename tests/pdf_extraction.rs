//! PDF uploads through the production extractor chain, using fixtures built
//! in-test with `lopdf`.

use docqa::config::Config;
use docqa::engine::{Engine, UploadOptions};
use docqa::extract::{ExtractOptions, Extractors};
use docqa_core::models::{AttemptOutcome, ExtractionStatus};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// A PDF with one page per entry in `pages`, each showing that word.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let fonted: Vec<(&str, &str)> = pages.iter().map(|word| ("F1", *word)).collect();
    pdf_with_font_pages(&fonted)
}

/// Like [`pdf_with_pages`], but each page names the font resource it draws
/// with. Only `F1` is defined.
fn pdf_with_font_pages(pages: &[(&str, &str)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (font, word) in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(*word)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn config_with_page_limit(limit: usize) -> Config {
    let mut config = Config::default();
    config.extraction.pdf_page_limit = limit;
    config.ocr.primary = "disabled".to_string();
    config.ocr.fallback = "disabled".to_string();
    config.qa.provider = "disabled".to_string();
    config
}

#[tokio::test]
async fn primary_mode_reads_text_layer() {
    let extractors = Extractors::from_config(&config_with_page_limit(20)).unwrap();
    let result = extractors
        .extract(
            &pdf_with_pages(&["Quarterly", "Revenue"]),
            "application/pdf",
            &ExtractOptions::default(),
        )
        .await;
    assert_eq!(result.status, ExtractionStatus::Extracted);
    assert_eq!(result.backend.as_deref(), Some("pdf-extract"));
    assert!(result.text.contains("Quarterly"));
    assert!(result.text.contains("Revenue"));
    assert!(result.text.find("Quarterly") < result.text.find("Revenue"));
}

#[tokio::test]
async fn page_limit_applies_unless_full_document() {
    let pdf = pdf_with_pages(&["Alpha", "Bravo", "Charlie"]);
    let extractors = Extractors::from_config(&config_with_page_limit(2)).unwrap();

    let limited = extractors
        .extract(&pdf, "application/pdf", &ExtractOptions::default())
        .await;
    assert!(limited.text.contains("Bravo"));
    assert!(!limited.text.contains("Charlie"));

    let full = extractors
        .extract(
            &pdf,
            "application/pdf",
            &ExtractOptions {
                process_full_document: true,
            },
        )
        .await;
    assert!(full.text.contains("Charlie"));
}

#[tokio::test]
async fn pages_past_the_limit_are_never_parsed() {
    // Page 3 draws with an undefined font, which pdf-extract cannot decode.
    let pdf = pdf_with_font_pages(&[("F1", "Alpha"), ("F1", "Bravo"), ("F9", "Broken")]);
    let extractors = Extractors::from_config(&config_with_page_limit(2)).unwrap();

    let result = extractors
        .extract(&pdf, "application/pdf", &ExtractOptions::default())
        .await;
    assert_eq!(result.backend.as_deref(), Some("pdf-extract"));
    assert_eq!(result.attempts.len(), 1);
    assert!(result.text.contains("Alpha"));
    assert!(result.text.contains("Bravo"));
}

#[tokio::test]
async fn corrupt_pdf_tries_both_modes_then_fails() {
    let extractors = Extractors::from_config(&config_with_page_limit(20)).unwrap();
    let result = extractors
        .extract(b"%PDF-1.4\nthis is not a pdf", "application/pdf", &ExtractOptions::default())
        .await;
    assert_eq!(result.status, ExtractionStatus::Failed);
    let backends: Vec<_> = result.attempts.iter().map(|a| a.backend.as_str()).collect();
    assert_eq!(backends, ["pdf-extract", "lopdf"]);
    assert!(result
        .attempts
        .iter()
        .all(|a| matches!(a.outcome, AttemptOutcome::Error(_))));
}

#[tokio::test]
async fn pdf_upload_becomes_active_document() {
    let engine = Engine::from_config(&config_with_page_limit(20)).unwrap();
    let receipt = engine
        .upload(
            &pdf_with_pages(&["Contract", "Signature"]),
            "application/pdf",
            UploadOptions {
                name: Some("contract.pdf".to_string()),
                ..UploadOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.backend, "pdf-extract");
    assert_eq!(receipt.chunk_count, 1);

    let text = engine.document_text().unwrap();
    assert!(text.contains("Signature"));
    assert_eq!(
        engine.snapshot().document.unwrap().media_type,
        "application/pdf"
    );
}
