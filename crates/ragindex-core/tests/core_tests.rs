use std::fs;
use std::io::Write;
use tempfile::TempDir;

use ragindex_core::corpus::{read_chunks, write_chunks};
use ragindex_core::data_processor::DataProcessor;
use ragindex_core::error::Error;
use ragindex_core::types::ChunkStrategy;

fn long_body(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Paragraph sentence {i} describes the history of the steel mills along the river."))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn load_documents_reads_headers_and_skips_short_bodies() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut f = fs::File::create(dir.join("b_pittsburgh.txt")).unwrap();
    writeln!(f, "SOURCE: https://en.wikipedia.org/wiki/Pittsburgh").unwrap();
    writeln!(f, "TITLE: Pittsburgh").unwrap();
    writeln!(f, "{}", long_body(5)).unwrap();
    fs::write(dir.join("a_short.txt"), "Short text").unwrap();
    fs::write(dir.join("ignored.md"), long_body(5)).unwrap();

    let processor = DataProcessor::default();
    let docs = processor.load_documents(dir).expect("load");

    assert_eq!(docs.len(), 1, "short body and non-txt file are skipped");
    assert_eq!(docs[0].title, "Pittsburgh");
    assert_eq!(docs[0].source, "https://en.wikipedia.org/wiki/Pittsburgh");
    assert!(docs[0].body.starts_with("Paragraph sentence 0"));
}

#[test]
fn chunking_is_deterministic_across_runs() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("doc.txt"), long_body(200)).unwrap();

    let processor = DataProcessor::default();
    let docs = processor.load_documents(tmp.path()).unwrap();
    for strategy in ChunkStrategy::ALL {
        let a = processor.chunk_documents(&docs, strategy);
        let b = processor.chunk_documents(&docs, strategy);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.id, format!("{strategy}_{i:06}"));
            assert_eq!(c.strategy, strategy);
            assert_eq!(c.title, "doc");
        }
    }
}

#[test]
fn chunk_file_round_trips_in_order() {
    let tmp = TempDir::new().unwrap();
    let processor = DataProcessor::default();
    fs::write(tmp.path().join("doc.txt"), long_body(60)).unwrap();
    let docs = processor.load_documents(tmp.path()).unwrap();
    let chunks = processor.chunk_documents(&docs, ChunkStrategy::Fixed);

    let path = tmp.path().join("processed/chunks.jsonl");
    write_chunks(&path, &chunks).unwrap();
    let back = read_chunks(&path).unwrap();
    assert_eq!(back, chunks);

    let first_line = fs::read_to_string(&path).unwrap().lines().next().unwrap().to_string();
    assert!(first_line.contains("\"strategy\":\"fixed\""));
}

#[test]
fn malformed_chunk_line_reports_line_number() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("chunks.jsonl");
    fs::write(&path, "{\"id\":\"fixed_000000\",\"source\":\"\",\"title\":\"t\",\"text\":\"x\",\"strategy\":\"fixed\"}\nnot json\n").unwrap();
    let err = read_chunks(&path).unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::Corpus { line, .. }) => assert_eq!(*line, 2),
        other => panic!("unexpected error: {other:?}"),
    }
}
