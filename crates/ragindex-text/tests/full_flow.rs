use ragindex_core::types::{Chunk, ChunkStrategy, SourceKind};
use ragindex_text::LexicalIndex;
use tempfile::TempDir;

fn chunk(i: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("sentence_{i:06}"),
        source: format!("https://example.org/{i}"),
        title: format!("Doc {i}"),
        text: text.to_string(),
        strategy: ChunkStrategy::Sentence,
    }
}

fn pittsburgh() -> Vec<Chunk> {
    vec![
        chunk(0, "Pittsburgh is a city in Pennsylvania."),
        chunk(1, "Carnegie Mellon University is in Pittsburgh."),
        chunk(2, "The Steelers are a football team."),
    ]
}

#[test]
fn lexical_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("lexical");
    let index = LexicalIndex::build(&pittsburgh(), &index_dir).expect("build");
    assert_eq!(index.len(), 3);
    assert_eq!(index.ids(), &["sentence_000000", "sentence_000001", "sentence_000002"]);

    let hits = index.search("Pittsburgh university", 2).expect("search");
    eprintln!("hits: {hits:?}");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "sentence_000001");
    assert_eq!(hits[1].id, "sentence_000000");
    assert!(hits[0].score > hits[1].score);
    assert!(hits.iter().all(|h| h.source == SourceKind::Lexical));
}

#[test]
fn k_larger_than_corpus_clamps_and_pads_with_unmatched_rows() {
    let index = LexicalIndex::build_in_ram(&pittsburgh()).expect("build");
    let hits = index.search("football", 10).expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "sentence_000002");
    assert!(hits[0].score > 0.0);
    // unmatched chunks follow in row order with score 0
    assert_eq!((hits[1].row, hits[1].score), (0, 0.0));
    assert_eq!((hits[2].row, hits[2].score), (1, 0.0));
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn stop_word_only_and_malformed_queries_do_not_fail() {
    let index = LexicalIndex::build_in_ram(&pittsburgh()).expect("build");
    let hits = index.search("the are a", 3).expect("stop words");
    assert_eq!(hits.iter().map(|h| h.row).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(hits.iter().all(|h| h.score == 0.0));

    let hits = index.search("\"unbalanced AND (Pittsburgh", 2).expect("lenient parse");
    assert_eq!(hits.len(), 2);
}

#[test]
fn empty_corpus_and_zero_k_return_nothing() {
    let tmp = TempDir::new().expect("tmp");
    let index = LexicalIndex::build(&[], &tmp.path().join("lexical")).expect("build empty");
    assert!(index.is_empty());
    assert!(index.search("anything", 5).expect("search").is_empty());

    let index = LexicalIndex::build_in_ram(&pittsburgh()).expect("build");
    assert!(index.search("Pittsburgh", 0).expect("search").is_empty());
}

#[test]
fn reopened_index_scores_identically() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("lexical");
    let built = LexicalIndex::build(&pittsburgh(), &index_dir).expect("build");
    let before = built.search("Pittsburgh Pennsylvania city", 3).expect("search");
    drop(built);

    let reopened = LexicalIndex::open(&index_dir).expect("open");
    assert_eq!(reopened.ids().len(), 3);
    let after = reopened.search("Pittsburgh Pennsylvania city", 3).expect("search");
    assert_eq!(before, after);
}

#[test]
fn rebuild_replaces_previous_contents() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("lexical");
    LexicalIndex::build(&pittsburgh(), &index_dir).expect("first build");
    let index = LexicalIndex::build(&pittsburgh()[..1], &index_dir).expect("second build");
    assert_eq!(index.len(), 1);
    assert_eq!(LexicalIndex::open(&index_dir).expect("open").len(), 1);
}
