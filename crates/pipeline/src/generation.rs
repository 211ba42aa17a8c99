//! Audio generation runs
//!
//! A run splits a vocabulary list into parts, creates one `Pending` entry
//! per part and synthesizes the parts in parallel (bounded by the speech
//! concurrency ceiling) or one after another. When at least two parts
//! complete, a combined entry holding all of them is added. Cancelling a
//! run moves every unfinished entry to `Cancelled` at once; results of calls
//! still in flight are discarded.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use vocab_audio_config::constants::audio::{MAX_ITEMS_PER_FILE, MIN_ITEMS_PER_FILE};
use vocab_audio_config::{AudioConfig, ConcurrencyConfig, GenerationMode};
use vocab_audio_core::{
    AudioFileEntry, CancellationToken, EncodedAudio, FileId, FileStatus, VocabItem, VocabList,
};

use crate::scheduler::TaskRunner;
use crate::tts::AudioSynthesisPipeline;
use crate::PipelineError;

const EVENT_CAPACITY: usize = 256;

/// Scheduling knobs for one run
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub items_per_file: usize,
    pub mode: GenerationMode,
    pub max_concurrent: usize,
    pub sequential_delay: Duration,
}

impl GenerationSettings {
    pub fn from_settings(audio: &AudioConfig, concurrency: &ConcurrencyConfig) -> Self {
        Self {
            items_per_file: audio.items_per_file,
            mode: audio.generation_mode,
            max_concurrent: concurrency.max_concurrent_tts,
            sequential_delay: Duration::from_millis(audio.sequential_delay_ms),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_settings(&AudioConfig::default(), &ConcurrencyConfig::default())
    }
}

/// Final tally of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_parts: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// A combined entry was created (it may still have failed)
    pub combined: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    EntryUpdated { entry: AudioFileEntry },
    Finished { summary: RunSummary },
}

/// Split items into consecutive parts of `items_per_file`
pub fn split_parts(
    items: &[VocabItem],
    items_per_file: usize,
) -> Result<Vec<Vec<VocabItem>>, PipelineError> {
    if !(MIN_ITEMS_PER_FILE..=MAX_ITEMS_PER_FILE).contains(&items_per_file) {
        return Err(PipelineError::InvalidInput(format!(
            "Items per file must be between {} and {}, got {}",
            MIN_ITEMS_PER_FILE, MAX_ITEMS_PER_FILE, items_per_file
        )));
    }
    if items.is_empty() {
        return Err(PipelineError::InvalidInput("Vocabulary list has no items".to_string()));
    }
    Ok(items.chunks(items_per_file).map(<[VocabItem]>::to_vec).collect())
}

pub struct AudioGenerationRun {
    title: String,
    parts: Vec<Vec<VocabItem>>,
    entries: RwLock<Vec<AudioFileEntry>>,
    cancel: CancellationToken,
    events: broadcast::Sender<GenerationEvent>,
    settings: GenerationSettings,
    finished_at: Mutex<Option<Instant>>,
}

impl AudioGenerationRun {
    pub fn new(list: &VocabList, settings: GenerationSettings) -> Result<Self, PipelineError> {
        let parts = split_parts(&list.items, settings.items_per_file)?;
        let total = parts.len();
        let entries = parts
            .iter()
            .enumerate()
            .map(|(i, part)| AudioFileEntry::pending(i + 1, total, part.len()))
            .collect();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            title: list.title.clone(),
            parts,
            entries: RwLock::new(entries),
            cancel: CancellationToken::new(),
            events,
            settings,
            finished_at: Mutex::new(None),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn total_parts(&self) -> usize {
        self.parts.len()
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.lock().is_some()
    }

    /// When `run` returned, `None` while still running
    pub fn finished_at(&self) -> Option<Instant> {
        *self.finished_at.lock()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events.subscribe()
    }

    /// Snapshot of all entries, parts first then the combined entry
    pub fn entries(&self) -> Vec<AudioFileEntry> {
        self.entries.read().clone()
    }

    pub fn entry(&self, id: FileId) -> Option<AudioFileEntry> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn file_name(&self, entry: &AudioFileEntry) -> String {
        entry.file_name(&self.title)
    }

    /// Stop the run and mark every unfinished entry `Cancelled`
    pub fn cancel(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        tracing::info!(title = %self.title, "Audio generation cancelled");
        self.cancel_unfinished();
    }

    fn cancel_unfinished(&self) {
        let updated: Vec<AudioFileEntry> = {
            let mut entries = self.entries.write();
            entries
                .iter_mut()
                .filter_map(|entry| entry.cancel().then(|| entry.clone()))
                .collect()
        };
        for entry in updated {
            self.emit(GenerationEvent::EntryUpdated { entry });
        }
    }

    fn emit(&self, event: GenerationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply a transition to entry `index` and broadcast it if it took effect
    fn update(&self, index: usize, transition: impl FnOnce(&mut AudioFileEntry) -> bool) -> bool {
        let snapshot = {
            let mut entries = self.entries.write();
            match entries.get_mut(index) {
                Some(entry) => {
                    if transition(entry) {
                        Some(entry.clone())
                    } else {
                        None
                    }
                },
                None => None,
            }
        };
        match snapshot {
            Some(entry) => {
                self.emit(GenerationEvent::EntryUpdated { entry });
                true
            },
            None => false,
        }
    }

    /// Generate all parts, then the combined entry
    pub async fn run(&self, pipeline: &AudioSynthesisPipeline) -> RunSummary {
        let total = self.parts.len();
        tracing::info!(
            title = %self.title,
            parts = total,
            mode = ?self.settings.mode,
            "Audio generation started"
        );

        match self.settings.mode {
            GenerationMode::Parallel => {
                let runner = TaskRunner::new(self.settings.max_concurrent);
                let run = self;
                runner
                    .run(
                        (0..total).collect(),
                        move |index: usize, _| async move { run.generate_part(pipeline, index).await },
                        |progress| {
                            tracing::debug!(
                                completed = progress.completed,
                                total = progress.total,
                                part = progress.index + 1,
                                "Part settled"
                            )
                        },
                    )
                    .await;
            },
            GenerationMode::Sequential => {
                for index in 0..total {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    // Failures are recorded on the entry; the next part still runs.
                    let _ = self.generate_part(pipeline, index).await;

                    if index + 1 < total && !self.cancel.is_cancelled() {
                        tokio::time::sleep(self.settings.sequential_delay).await;
                    }
                }
            },
        }

        let mut combined = false;
        if self.cancel.is_cancelled() {
            self.cancel_unfinished();
        } else {
            combined = self.combine_completed(pipeline).await;
        }

        let summary = self.summary(combined);
        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            combined = summary.combined,
            "Audio generation finished"
        );
        *self.finished_at.lock() = Some(Instant::now());
        self.emit(GenerationEvent::Finished { summary });
        summary
    }

    async fn generate_part(
        &self,
        pipeline: &AudioSynthesisPipeline,
        index: usize,
    ) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            self.update(index, AudioFileEntry::cancel);
            return Err(PipelineError::Cancelled);
        }
        if !self.update(index, AudioFileEntry::start) {
            return Err(PipelineError::Cancelled);
        }

        let part = index + 1;
        tracing::debug!(part, items = self.parts[index].len(), "Generating part");
        let result = pipeline.synthesize_items(&self.parts[index], &self.cancel).await;

        if self.cancel.is_cancelled() {
            self.update(index, AudioFileEntry::cancel);
            return Err(PipelineError::Cancelled);
        }

        match result {
            Ok(audio) if audio.is_empty() => {
                tracing::warn!(part, "Part produced empty audio");
                self.update(index, |e| e.fail("Generated empty audio"));
                Err(PipelineError::Decode("Generated empty audio".to_string()))
            },
            Ok(audio) => {
                tracing::info!(part, bytes = audio.len(), "Part completed");
                self.update(index, |e| e.complete(audio));
                Ok(())
            },
            Err(PipelineError::Cancelled) => {
                self.update(index, AudioFileEntry::cancel);
                Err(PipelineError::Cancelled)
            },
            Err(e) => {
                tracing::warn!(part, error = %e, "Part failed");
                self.update(index, |entry| entry.fail(e.to_string()));
                Err(e)
            },
        }
    }

    /// Combine completed parts when there are at least two
    async fn combine_completed(&self, pipeline: &AudioSynthesisPipeline) -> bool {
        let (audio, item_count): (Vec<EncodedAudio>, usize) = {
            let entries = self.entries.read();
            let completed: Vec<&AudioFileEntry> = entries
                .iter()
                .filter(|e| !e.is_combined && e.status == FileStatus::Completed)
                .collect();
            (
                completed.iter().filter_map(|e| e.audio.clone()).collect(),
                completed.iter().map(|e| e.item_count).sum(),
            )
        };
        if audio.len() < 2 {
            return false;
        }

        let index = {
            let mut entries = self.entries.write();
            entries.push(AudioFileEntry::combined(self.parts.len(), item_count));
            entries.len() - 1
        };
        if let Some(entry) = self.entry(FileId::Combined) {
            self.emit(GenerationEvent::EntryUpdated { entry });
        }

        match pipeline.assembler().combine_blocking(audio).await {
            Ok(combined) if !combined.is_empty() => {
                tracing::info!(bytes = combined.len(), "Combined file created");
                self.update(index, |e| e.complete(combined));
            },
            Ok(_) => {
                self.update(index, |e| e.fail("Failed to create combined audio"));
            },
            Err(e) => {
                tracing::error!(error = %e, "Combining parts failed");
                self.update(index, |entry| entry.fail(e.to_string()));
            },
        }
        true
    }

    fn summary(&self, combined: bool) -> RunSummary {
        let entries = self.entries.read();
        let count = |status: FileStatus| {
            entries
                .iter()
                .filter(|e| !e.is_combined && e.status == status)
                .count()
        };
        RunSummary {
            total_parts: self.parts.len(),
            completed: count(FileStatus::Completed),
            failed: count(FileStatus::Error),
            cancelled: count(FileStatus::Cancelled),
            combined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(count: usize) -> VocabList {
        VocabList::new(
            "Les 7",
            "Test",
            (0..count)
                .map(|i| VocabItem::new(format!("woord{}", i), "kelime"))
                .collect(),
        )
    }

    #[test]
    fn test_split_parts() {
        let parts = split_parts(&list(45).items, 20).unwrap();
        let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);

        assert!(split_parts(&list(5).items, 0).is_err());
        assert!(split_parts(&list(5).items, 201).is_err());
        assert!(split_parts(&[], 20).is_err());
    }

    #[test]
    fn test_entries_created_pending() {
        let run = AudioGenerationRun::new(&list(45), GenerationSettings::default()).unwrap();
        let entries = run.entries();

        assert_eq!(run.total_parts(), 3);
        assert!(entries.iter().all(|e| e.status == FileStatus::Pending));
        assert_eq!(entries[2].id, FileId::Part(3));
        assert_eq!(entries[2].item_count, 5);
        assert_eq!(run.file_name(&entries[0]), "les_7_part1_of3.mp3");
    }

    #[test]
    fn test_cancel_marks_unfinished() {
        let run = AudioGenerationRun::new(&list(3), GenerationSettings {
            items_per_file: 1,
            ..Default::default()
        })
        .unwrap();
        let mut events = run.subscribe();

        run.update(0, AudioFileEntry::start);
        run.update(0, |e| e.complete(EncodedAudio::new(vec![1u8], Default::default())));
        run.update(1, AudioFileEntry::start);
        run.cancel();

        let statuses: Vec<FileStatus> = run.entries().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Completed, FileStatus::Cancelled, FileStatus::Cancelled]
        );

        let mut received = 0;
        while events.try_recv().is_ok() {
            received += 1;
        }
        // start, complete, start, then two cancellations
        assert_eq!(received, 5);
    }
}
