//! Markdown context assembled from search results

use super::hyde::truncate_chars;
use crate::types::SearchResult;

/// Rough characters-per-token ratio used for budget estimates
const CHARS_PER_TOKEN: usize = 4;

const SECTION_MARKER: &str = "\n## ";
const RESULTS_TRUNCATED: &str = "\n\n[... Additional results truncated due to length ...]";
const CONTENT_TRUNCATED: &str = "\n\n[... Content truncated due to length ...]";

#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_context_tokens: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(8000)
    }
}

impl ContextBuilder {
    pub fn new(max_context_tokens: usize) -> Self {
        Self { max_context_tokens }
    }

    /// Render results grouped by file, in first-seen file order and line order within a file
    pub fn build_context(&self, results: &[SearchResult], query: &str) -> String {
        if results.is_empty() {
            return "No relevant code found.".to_string();
        }

        let mut parts: Vec<String> = Vec::new();
        if !query.is_empty() {
            parts.push(format!("Query: {}\n", query));
        }

        let mut files: Vec<(&str, Vec<&SearchResult>)> = Vec::new();
        for result in results {
            match files.iter_mut().find(|(path, _)| *path == result.file_path) {
                Some((_, group)) => group.push(result),
                None => files.push((result.file_path.as_str(), vec![result])),
            }
        }

        for (file_path, mut group) in files {
            parts.push(format!("\n## File: {}\n", file_path));
            group.sort_by_key(|r| r.line_start);

            for result in group {
                parts.push(header_line(result));
                parts.push(String::new());

                if let Some(ref description) = result.description
                    && !description.is_empty()
                {
                    parts.push(format!("*Description: {}*", description));
                    parts.push(String::new());
                }

                parts.push(format_code_block(
                    &result.content,
                    &result.language,
                    result.line_start,
                ));
                parts.push(String::new());
            }
        }

        self.optimize_context_window(&parts.join("\n"))
    }

    /// Fit `context` into the token budget, dropping whole file sections from the end
    pub fn optimize_context_window(&self, context: &str) -> String {
        let char_limit = self.max_context_tokens * CHARS_PER_TOKEN;
        let estimated_tokens = context.len() / CHARS_PER_TOKEN;
        if estimated_tokens <= self.max_context_tokens {
            return context.to_string();
        }

        tracing::info!("Context too large ({} tokens), optimizing...", estimated_tokens);

        let mut sections = context.split(SECTION_MARKER);
        let head = sections.next().unwrap_or_default();
        let rest: Vec<&str> = sections.collect();

        if rest.is_empty() {
            let mut truncated = truncate_chars(context, char_limit).to_string();
            truncated.push_str(CONTENT_TRUNCATED);
            return truncated;
        }

        let mut optimized = head.to_string();
        for section in rest {
            let piece_len = SECTION_MARKER.len() + section.len();
            if optimized.len() + piece_len < char_limit {
                optimized.push_str(SECTION_MARKER);
                optimized.push_str(section);
            } else {
                optimized.push_str(RESULTS_TRUNCATED);
                break;
            }
        }
        optimized
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn header_line(result: &SearchResult) -> String {
    let mut header = vec![format!(
        "**{}**: `{}`",
        title_case(result.chunk_type.as_str()),
        result.name
    )];
    if let Some(ref parent) = result.parent_name {
        header.push(format!("Parent: `{}`", parent));
    }
    header.push(format!("Lines {}-{}", result.line_start, result.line_end));
    header.push(format!("Language: {}", result.language));
    header.push(format!("Score: {:.3}", result.score));
    header.join(" | ")
}

fn format_code_block(code: &str, language: &str, start_line: usize) -> String {
    let numbered: Vec<String> = code
        .trim()
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:4} | {}", start_line + i, line))
        .collect();
    format!("```{}\n{}\n```", language, numbered.join("\n"))
}

/// One-line overview: result count, distinct files and per-type counts
pub fn format_search_summary(
    query: &str,
    results: &[SearchResult],
    total_matches: Option<usize>,
) -> String {
    if results.is_empty() {
        return format!("No results found for query: '{}'", query);
    }

    let mut parts = vec![
        format!("Search Results for: '{}'", query),
        format!("Found {} relevant code chunks", results.len()),
    ];
    if let Some(total) = total_matches
        && total > results.len()
    {
        parts.push(format!(
            "(showing top {} of {} total matches)",
            results.len(),
            total
        ));
    }

    let mut files: Vec<&str> = Vec::new();
    let mut types: Vec<(&str, usize)> = Vec::new();
    for result in results {
        if !files.contains(&result.file_path.as_str()) {
            files.push(&result.file_path);
        }
        let chunk_type = result.chunk_type.as_str();
        match types.iter_mut().find(|(t, _)| *t == chunk_type) {
            Some((_, count)) => *count += 1,
            None => types.push((chunk_type, 1)),
        }
    }

    let types: Vec<String> = types
        .iter()
        .map(|(t, count)| format!("{}({})", t, count))
        .collect();
    parts.push(format!("Files: {}", files.len()));
    parts.push(format!("Types: {}", types.join(", ")));
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkRecord, ChunkType};

    fn result(
        name: &str,
        chunk_type: ChunkType,
        file_path: &str,
        line_start: usize,
        parent: Option<&str>,
    ) -> SearchResult {
        SearchResult::from_record(
            ChunkRecord {
                id: format!("{}:{}", file_path, name),
                content: format!("def {}():\n    pass", name),
                chunk_type,
                name: name.to_string(),
                parent_name: parent.map(str::to_string),
                file_path: file_path.to_string(),
                language: "python".to_string(),
                line_start,
                line_end: line_start + 1,
                description: None,
            },
            0.87654,
        )
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(
            ContextBuilder::default().build_context(&[], "q"),
            "No relevant code found."
        );
        assert_eq!(
            format_search_summary("q", &[], None),
            "No results found for query: 'q'"
        );
    }

    #[test]
    fn test_build_context_groups_by_file_in_line_order() {
        let mut described = result("login", ChunkType::Function, "auth.py", 30, None);
        described.description = Some("Logs a user in".to_string());
        let results = vec![
            described,
            result("parse", ChunkType::Function, "util.py", 1, None),
            result("save", ChunkType::Method, "auth.py", 5, Some("User")),
        ];

        let context = ContextBuilder::default().build_context(&results, "login");

        assert!(context.starts_with("Query: login\n"));
        let auth = context.find("## File: auth.py").unwrap();
        let util = context.find("## File: util.py").unwrap();
        assert!(auth < util);

        let save = context.find("`save`").unwrap();
        let login = context.find("`login`").unwrap();
        assert!(save < login && login < util);

        assert!(context.contains(
            "**Method**: `save` | Parent: `User` | Lines 5-6 | Language: python | Score: 0.877"
        ));
        assert!(context.contains("*Description: Logs a user in*"));
        assert!(context.contains("```python\n  30 | def login():\n  31 |     pass\n```"));
    }

    #[test]
    fn test_optimize_keeps_short_context() {
        let builder = ContextBuilder::new(100);
        assert_eq!(builder.optimize_context_window("short"), "short");
    }

    #[test]
    fn test_optimize_drops_trailing_sections() {
        let builder = ContextBuilder::new(10);
        let context = format!(
            "Query: q\n\n## File: a.py\n{}\n## File: b.py\n{}",
            "a".repeat(10),
            "b".repeat(30)
        );

        let optimized = builder.optimize_context_window(&context);
        assert!(optimized.contains("## File: a.py"));
        assert!(!optimized.contains("## File: b.py"));
        assert!(optimized.ends_with("[... Additional results truncated due to length ...]"));
    }

    #[test]
    fn test_optimize_truncates_single_section() {
        let builder = ContextBuilder::new(2);
        let optimized = builder.optimize_context_window(&"x".repeat(100));
        assert!(optimized.starts_with(&"x".repeat(8)));
        assert!(!optimized.starts_with(&"x".repeat(9)));
        assert!(optimized.ends_with("[... Content truncated due to length ...]"));
    }

    #[test]
    fn test_summary_counts_files_and_types() {
        let results = vec![
            result("a", ChunkType::Function, "a.py", 1, None),
            result("b", ChunkType::Function, "b.py", 1, None),
            result("C", ChunkType::Class, "a.py", 10, None),
        ];
        assert_eq!(
            format_search_summary("auth", &results, Some(10)),
            "Search Results for: 'auth' | Found 3 relevant code chunks | (showing top 3 of 10 total matches) | Files: 2 | Types: function(2), class(1)"
        );
        assert!(!format_search_summary("auth", &results, Some(3)).contains("showing top"));
    }
}
