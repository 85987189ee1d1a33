use std::path::Path;

use serde::Serialize;

use crate::{index::VectorIndex, pipeline::RankedChunk};

/// Characters of passage text shown per result in human output.
pub const PREVIEW_CHARS: usize = 300;

#[derive(Serialize)]
struct JsonResult<'a> {
    rank: usize,
    score: f32,
    retrieval_score: f32,
    source_id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct JsonResults<'a> {
    query: &'a str,
    result_count: usize,
    results: Vec<JsonResult<'a>>,
}

/// Store statistics printed by `status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub data_dir: String,
    pub store: String,
    pub dimension: usize,
    pub chunks: usize,
    pub sources: usize,
    pub embedding_model: Option<String>,
}

impl StatusReport {
    pub fn new(
        data_dir: &Path,
        store_dir: &Path,
        index: &VectorIndex,
        embedding_model: Option<&str>,
    ) -> Self {
        Self {
            data_dir: data_dir.display().to_string(),
            store: store_dir.display().to_string(),
            dimension: index.dimension(),
            chunks: index.len(),
            sources: index.source_count(),
            embedding_model: embedding_model.map(str::to_string),
        }
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`, marked when cut.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[RankedChunk]) -> String {
    if results.is_empty() {
        return "No results found.\n".to_string();
    }

    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. [{:.3}] {}\n",
            i + 1,
            r.score,
            r.chunk.source_id
        ));
        for line in preview(&r.chunk.text).lines() {
            out.push_str(&format!("     {line}\n"));
        }
        out.push('\n');
    }
    out.push_str(&format!("{} result(s)\n", results.len()));
    out
}

/// Format results as a single JSON object.
pub fn format_json(
    results: &[RankedChunk],
    query: &str,
) -> serde_json::Result<String> {
    let payload = JsonResults {
        query,
        result_count: results.len(),
        results: results
            .iter()
            .enumerate()
            .map(|(i, r)| JsonResult {
                rank: i + 1,
                score: r.score,
                retrieval_score: r.retrieval_score,
                source_id: &r.chunk.source_id,
                text: &r.chunk.text,
            })
            .collect(),
    };
    serde_json::to_string(&payload)
}

pub fn format_status_human(report: &StatusReport) -> String {
    format!(
        "Data directory: {}\nStore: {}\nEmbedding model: {}\n\
         Dimension: {}\nChunks: {}\nSources: {}\n",
        report.data_dir,
        report.store,
        report.embedding_model.as_deref().unwrap_or("unknown"),
        report.dimension,
        report.chunks,
        report.sources
    )
}

pub fn format_status_json(report: &StatusReport) -> serde_json::Result<String> {
    serde_json::to_string(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    fn ranked(source: &str, text: &str, score: f32) -> RankedChunk {
        RankedChunk {
            chunk: Chunk::new(source, text),
            score,
            retrieval_score: score / 2.0,
        }
    }

    #[test]
    fn preview_cuts_on_char_boundaries() {
        let long = "é".repeat(PREVIEW_CHARS + 5);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));

        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn human_output_ranks_from_one() {
        let out = format_human(&[
            ranked("a.txt", "first passage", 0.9),
            ranked("b.md", "second\npassage", 0.5),
        ]);
        assert!(out.starts_with("  1. [0.900] a.txt\n     first passage\n"));
        assert!(out.contains("  2. [0.500] b.md\n     second\n     passage\n"));
        assert!(out.ends_with("2 result(s)\n"));
    }

    #[test]
    fn human_output_for_no_results() {
        assert_eq!(format_human(&[]), "No results found.\n");
    }

    #[test]
    fn json_output_shape() {
        let json = format_json(&[ranked("a.txt", "say \"hi\"", 0.5)], "q?")
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["query"], "q?");
        assert_eq!(value["result_count"], 1);
        let first = &value["results"][0];
        assert_eq!(first["rank"], 1);
        assert_eq!(first["score"], 0.5);
        assert_eq!(first["retrieval_score"], 0.25);
        assert_eq!(first["source_id"], "a.txt");
        assert_eq!(first["text"], "say \"hi\"");
    }

    #[test]
    fn status_report_counts_sources() {
        let mut index = VectorIndex::create(2).unwrap();
        index
            .add(
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                vec![
                    Chunk::new("a.txt", "x"),
                    Chunk::new("a.txt", "y"),
                    Chunk::new("b.txt", "z"),
                ],
            )
            .unwrap();
        let report = StatusReport::new(
            Path::new("/data"),
            Path::new("/data/store"),
            &index,
            Some("nomic-embed-text"),
        );

        let human = format_status_human(&report);
        assert!(human.contains("Chunks: 3\n"));
        assert!(human.contains("Sources: 2\n"));
        assert!(human.contains("Embedding model: nomic-embed-text\n"));

        let json = format_status_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dimension"], 2);
        assert_eq!(value["embedding_model"], "nomic-embed-text");
    }
}
