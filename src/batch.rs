//! Processing independent documents on a worker pool.
//!
//! Results always come back in input order, whatever order the workers
//! finish in.

use std::panic;
use std::thread;
use tracing::debug;

use crate::error::Result;
use crate::pdf::{HocrInput, OcrOutput, apply_ocr, assemble_with_ocr};
use crate::settings::OcrConfig;

pub(crate) fn default_parallelism() -> usize {
    num_cpus::get().clamp(1, 8)
}

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Number of worker threads.
    pub parallelism: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
        }
    }
}

impl BatchOptions {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }
}

/// Existing PDF plus the OCR data to overlay on it.
#[derive(Debug, Clone, Copy)]
pub struct OverlayJob<'a> {
    pub pdf: &'a [u8],
    pub hocr: HocrInput<'a>,
}

/// Page images plus the OCR data describing them.
#[derive(Debug, Clone, Copy)]
pub struct AssembleJob<'a> {
    pub hocr: HocrInput<'a>,
    pub images: &'a [Vec<u8>],
}

pub fn apply_many(
    jobs: &[OverlayJob<'_>],
    config: &OcrConfig,
    options: BatchOptions,
) -> Vec<Result<OcrOutput>> {
    debug!("overlaying {} document(s)", jobs.len());
    map_ordered(jobs, options.parallelism, |_, job| {
        apply_ocr(job.pdf, job.hocr, config)
    })
}

pub fn assemble_many(
    jobs: &[AssembleJob<'_>],
    config: &OcrConfig,
    options: BatchOptions,
) -> Vec<Result<OcrOutput>> {
    debug!("assembling {} document(s)", jobs.len());
    map_ordered(jobs, options.parallelism, |_, job| {
        assemble_with_ocr(job.hocr, job.images, config)
    })
}

/// Runs `f` over `items` on up to `parallelism` scoped threads, keeping order.
pub(crate) fn map_ordered<T, R, F>(items: &[T], parallelism: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let workers = parallelism.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().enumerate().map(|(i, item)| f(i, item)).collect();
    }

    let chunk_size = items.len().div_ceil(workers);
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(offset, item)| f(chunk_index * chunk_size + offset, item))
                        .collect::<Vec<R>>()
                })
            })
            .collect();

        let mut results = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => results.extend(chunk),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        results
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hocr::{BoundingBox, Document, Line, Page, Word};
    use crate::pdf::fixtures::{png_bytes, sample_pdf};
    use std::time::Duration;

    fn model(words: &[&str]) -> Document {
        let mut page = Page::new(BoundingBox::new(0.0, 0.0, 200.0, 100.0));
        page.lines.push(Line::new(
            BoundingBox::new(0.0, 0.0, 200.0, 20.0),
            words
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let x = i as f64 * 40.0;
                    Word::new(*text, BoundingBox::new(x, 0.0, x + 35.0, 20.0))
                })
                .collect(),
        ));
        Document {
            pages: vec![page],
            ..Document::default()
        }
    }

    #[test]
    fn map_ordered_keeps_input_order() {
        let items: Vec<u64> = (0..37).collect();
        let out = map_ordered(&items, 4, |index, item| {
            thread::sleep(Duration::from_millis((37 - item) % 5));
            (index, item * 2)
        });
        let expected: Vec<(usize, u64)> = (0..37).map(|i| (i as usize, i * 2)).collect();
        assert_eq!(out, expected);
        assert!(map_ordered(&[] as &[u64], 4, |_, item| *item).is_empty());
    }

    #[test]
    fn options_never_drop_below_one_worker() {
        assert_eq!(BatchOptions::default().with_parallelism(0).parallelism, 1);
        assert!(BatchOptions::default().parallelism >= 1);
    }

    #[test]
    fn batches_return_results_per_job() {
        let config = OcrConfig {
            log_warnings: false,
            ..OcrConfig::default()
        };
        let first = model(&["alpha"]);
        let second = model(&["beta", "gamma"]);
        let images = vec![png_bytes(20, 10)];
        let jobs = [
            AssembleJob {
                hocr: HocrInput::Document(&first),
                images: &images,
            },
            AssembleJob {
                hocr: HocrInput::Document(&second),
                images: &[],
            },
            AssembleJob {
                hocr: HocrInput::Document(&second),
                images: &images,
            },
        ];
        let results = assemble_many(&jobs, &config, BatchOptions::default().with_parallelism(3));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().expect("first").stats.words, 1);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().expect("third").stats.words, 2);

        let pdf = sample_pdf(1, None);
        let overlays = [OverlayJob {
            pdf: &pdf,
            hocr: HocrInput::Document(&first),
        }];
        let results = apply_many(&overlays, &config, BatchOptions::default());
        assert!(results[0].is_ok());
    }
}
