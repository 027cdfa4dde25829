//! Page Extraction Benchmarks
//!
//! Measures a full `PageExtractor::extract` call (parse, interpret, lay out,
//! inline images) on small generated documents.
//!
//! Run with: `cargo bench --bench extraction`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::Arc;
use std::time::Duration;

use page_extract_server::engine::lopdf_backend::LopdfEngine;
use page_extract_server::extract::PageExtractor;

/// Single page with `lines` lines of Helvetica text and one 64x64 gray image
fn create_pdf(lines: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 64,
            "Height" => 64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        (0..64 * 64).map(|i| (i % 256) as u8).collect(),
    ));

    let mut content = String::from("q 64 0 0 64 400 700 cm /Im0 Do Q BT /F1 10 Tf 12 TL 72 760 Td ");
    for i in 0..lines {
        content.push_str(&format!("(Line {i} of the benchmark page, with some words.) Tj T* "));
    }
    content.push_str("ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("Failed to write PDF");
    buf
}

/// Benchmark full page extraction
fn bench_extract_page(c: &mut Criterion) {
    let extractor = PageExtractor::new(Arc::new(LopdfEngine::new()));

    let mut group = c.benchmark_group("extract_page");
    group.measurement_time(Duration::from_secs(10));

    for lines in [10, 60] {
        let pdf_data = create_pdf(lines);
        group.throughput(Throughput::Bytes(pdf_data.len() as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &pdf_data, |b, data| {
            b.iter(|| {
                let result = extractor
                    .extract(black_box(data.as_slice()), 1)
                    .expect("Failed to extract page");
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract_page);
criterion_main!(benches);
