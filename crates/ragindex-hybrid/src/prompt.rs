use ragindex_core::types::RetrievedChunk;

pub const DEFAULT_CONTEXT_CHARS: usize = 600;

const INSTRUCTION: &str = "Answer concisely using only the context below.";

/// Render the generator prompt for `query` over retrieved chunks. Each chunk
/// text is cut to its first `context_chars` characters.
pub fn build_prompt(query: &str, results: &[RetrievedChunk], context_chars: usize) -> String {
    let context = results.iter().enumerate()
        .map(|(i, r)| {
            let text: String = r.chunk.text.chars().take(context_chars).collect();
            format!("[{}] {}: {}", i + 1, r.chunk.title, text)
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{INSTRUCTION}\n\nContext:\n{context}\n\nQuestion: {query}\nAnswer:")
}
