use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const ID_FIELD: &str = "id";
pub const ROW_FIELD: &str = "row";
pub const TEXT_FIELD: &str = "text";

/// Name the text field's analyzer is registered under.
pub const TOKENIZER_NAME: &str = "chunk_text";

/// Tokens longer than this (in bytes) are dropped at index and query time.
const MAX_TOKEN_LEN: usize = 40;

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	schema_builder.add_u64_field(ROW_FIELD, STORED | FAST);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

/// The one analyzer used for chunk text, at build time and at query time.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}

/// Digest of the analyzer pipeline. Persisted next to the index so a changed
/// analyzer is rejected at load instead of silently degrading recall.
pub fn tokenizer_fingerprint() -> String {
	let mut hasher = blake3::Hasher::new();
	hasher.update(format!("tantivy-{}", tantivy::version_string()).as_bytes());
	hasher.update(TOKENIZER_NAME.as_bytes());
	hasher.update(b"simple|remove_long|lowercase|stopwords");
	hasher.update(&MAX_TOKEN_LEN.to_le_bytes());
	for word in STOP_WORDS {
		hasher.update(word.as_bytes());
		hasher.update(&[0]);
	}
	let hex = hasher.finalize().to_hex();
	format!("{TOKENIZER_NAME}:{}", &hex[..16])
}
