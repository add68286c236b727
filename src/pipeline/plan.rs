//! Batch planning: split a source into ordered, non-overlapping batches.
//!
//! Short documents (≤ `small_document_pages`) go out as one batch so the
//! model sees the whole thing. Longer ones are cut into
//! `ceil(pages / max_pages_per_batch)` consecutive groups whose sizes differ
//! by at most one page, earlier groups taking the extra page. With the
//! default of three pages per batch every group has two or three pages
//! (10 pages → 3+3+2+2), which avoids a lonely one-page tail batch that would
//! give the generator almost no context.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{Batch, BatchScope, Source};
use tracing::debug;

/// Plan the batches for `source`.
///
/// # Errors
/// [`PipelineError::EmptyContent`] when the source has no pages, or every
/// page (or the topic) is blank.
pub fn plan(source: &Source, config: &PipelineConfig) -> Result<Vec<Batch>, PipelineError> {
    if source.is_empty() {
        return Err(PipelineError::EmptyContent);
    }

    let batches = match source {
        Source::Topic { topic } => vec![Batch {
            id: Batch::batch_id(0),
            ordinal: 0,
            scope: BatchScope::Topic,
            text: topic.trim().to_string(),
        }],
        Source::File { pages, .. } => {
            partition(pages.len(), config.small_document_pages, config.max_pages_per_batch)
                .into_iter()
                .enumerate()
                .map(|(ordinal, (start, end))| Batch {
                    id: Batch::batch_id(ordinal),
                    ordinal,
                    scope: BatchScope::Pages { start, end },
                    text: join_pages(&pages[start - 1..end], start),
                })
                .collect()
        }
    };

    debug!("Planned {} batch(es)", batches.len());
    Ok(batches)
}

/// 1-indexed inclusive page ranges covering `1..=total` exactly once.
fn partition(total: usize, small_document_pages: usize, max_per_batch: usize) -> Vec<(usize, usize)> {
    if total == 0 {
        return Vec::new();
    }
    if total <= small_document_pages {
        return vec![(1, total)];
    }

    let count = total.div_ceil(max_per_batch);
    let base = total / count;
    let extra = total % count;

    let mut ranges = Vec::with_capacity(count);
    let mut start = 1;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        ranges.push((start, start + size - 1));
        start += size;
    }
    ranges
}

/// Concatenate page texts with page markers the prompts refer to.
fn join_pages(pages: &[String], first_page: usize) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[Page {}]\n{}", first_page + i, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(n: usize) -> Source {
        Source::file((1..=n).map(|i| format!("text of page {i}")).collect())
    }

    fn ranges(batches: &[Batch]) -> Vec<(usize, usize)> {
        batches
            .iter()
            .map(|b| match b.scope {
                BatchScope::Pages { start, end } => (start, end),
                BatchScope::Topic => panic!("unexpected topic batch"),
            })
            .collect()
    }

    #[test]
    fn topic_is_a_single_batch() {
        let b = plan(&Source::topic("  Cardiology "), &PipelineConfig::default()).unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].ordinal, 0);
        assert_eq!(b[0].scope, BatchScope::Topic);
        assert_eq!(b[0].text, "Cardiology");
    }

    #[test]
    fn small_documents_are_one_batch() {
        let config = PipelineConfig::default();
        for n in 1..=5 {
            let b = plan(&pages(n), &config).unwrap();
            assert_eq!(b.len(), 1, "{n} pages");
            assert_eq!(ranges(&b), vec![(1, n)]);
        }
    }

    #[test]
    fn ten_pages_make_four_batches() {
        let b = plan(&pages(10), &PipelineConfig::default()).unwrap();
        assert_eq!(ranges(&b), vec![(1, 3), (4, 6), (7, 8), (9, 10)]);
        assert_eq!(
            b.iter().map(|b| b.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn large_documents_partition_exactly() {
        let config = PipelineConfig::default();
        for n in 6..=40 {
            let b = plan(&pages(n), &config).unwrap();
            let r = ranges(&b);
            let mut expected_start = 1;
            for (i, &(start, end)) in r.iter().enumerate() {
                assert_eq!(start, expected_start, "{n} pages: gap or overlap at batch {i}");
                let size = end + 1 - start;
                assert!(size <= 3, "{n} pages: batch {i} has {size} pages");
                if i + 1 < r.len() {
                    assert!(size >= 2, "{n} pages: batch {i} has {size} pages");
                }
                expected_start = end + 1;
            }
            assert_eq!(expected_start, n + 1, "{n} pages: range not covered");
        }
    }

    #[test]
    fn batch_text_carries_page_markers() {
        let b = plan(&pages(7), &PipelineConfig::default()).unwrap();
        assert!(b[0].text.starts_with("[Page 1]\ntext of page 1"));
        assert!(b[1].text.contains("[Page 4]"));
        assert!(!b[1].text.contains("[Page 3]"));
    }

    #[test]
    fn empty_sources_are_rejected() {
        let config = PipelineConfig::default();
        assert!(matches!(
            plan(&Source::file(vec![]), &config),
            Err(PipelineError::EmptyContent)
        ));
        assert!(matches!(
            plan(&Source::file(vec![" ".into(); 9]), &config),
            Err(PipelineError::EmptyContent)
        ));
        assert!(matches!(
            plan(&Source::topic(""), &config),
            Err(PipelineError::EmptyContent)
        ));
    }

    #[test]
    fn custom_batch_size() {
        let config = PipelineConfig::builder()
            .small_document_pages(2)
            .max_pages_per_batch(4)
            .build()
            .unwrap();
        let b = plan(&pages(9), &config).unwrap();
        assert_eq!(ranges(&b), vec![(1, 3), (4, 6), (7, 9)]);
    }
}
