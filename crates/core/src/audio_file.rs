//! Audio file entries produced by a generation run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audio::EncodedAudio;

/// Lifecycle status of an audio file entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Generating,
    Completed,
    Error,
    Cancelled,
}

impl FileStatus {
    /// Completed, Error and Cancelled never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::Completed | FileStatus::Error | FileStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Generating => "generating",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
            FileStatus::Cancelled => "cancelled",
        }
    }
}

/// Identifier of an entry within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FileId {
    /// 1-based part number
    Part(usize),
    Combined,
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::Part(n) => write!(f, "{}", n),
            FileId::Combined => f.write_str("combined"),
        }
    }
}

impl FromStr for FileId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("combined") {
            return Ok(FileId::Combined);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(FileId::Part(n)),
            _ => Err(format!("invalid file id: {}", s)),
        }
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for FileId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// One generated (or pending) audio artifact
///
/// Created `Pending`, moves to `Generating`, then transitions exactly once
/// to a terminal status. Every transition method returns `false` and leaves
/// the entry untouched when it is already terminal.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFileEntry {
    pub id: FileId,
    pub part_index: usize,
    pub total_parts: usize,
    pub item_count: usize,
    pub status: FileStatus,
    #[serde(skip)]
    pub audio: Option<EncodedAudio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_combined: bool,
}

impl AudioFileEntry {
    pub fn pending(part_index: usize, total_parts: usize, item_count: usize) -> Self {
        Self {
            id: FileId::Part(part_index),
            part_index,
            total_parts,
            item_count,
            status: FileStatus::Pending,
            audio: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            is_combined: false,
        }
    }

    /// Synthetic entry holding all completed parts, starts out `Generating`
    pub fn combined(total_parts: usize, item_count: usize) -> Self {
        Self {
            id: FileId::Combined,
            part_index: 0,
            total_parts,
            item_count,
            status: FileStatus::Generating,
            audio: None,
            error_message: None,
            started_at: Some(Utc::now()),
            finished_at: None,
            is_combined: true,
        }
    }

    pub fn start(&mut self) -> bool {
        if self.status != FileStatus::Pending {
            return false;
        }
        self.status = FileStatus::Generating;
        self.started_at = Some(Utc::now());
        true
    }

    pub fn complete(&mut self, audio: EncodedAudio) -> bool {
        if !self.finish(FileStatus::Completed) {
            return false;
        }
        self.audio = Some(audio);
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.finish(FileStatus::Error) {
            return false;
        }
        self.error_message = Some(message.into());
        true
    }

    pub fn cancel(&mut self) -> bool {
        self.finish(FileStatus::Cancelled)
    }

    fn finish(&mut self, status: FileStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Deterministic download name derived from the list title
    ///
    /// `{title}_part{n}_of{total}.{ext}` or `{title}_combined_all_parts.{ext}`,
    /// where every non-alphanumeric title character becomes `_`.
    pub fn file_name(&self, title: &str) -> String {
        let stem: String = title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let ext = self
            .audio
            .as_ref()
            .map(|audio| audio.format.extension())
            .unwrap_or("mp3");

        if self.is_combined {
            format!("{}_combined_all_parts.{}", stem, ext)
        } else {
            format!("{}_part{}_of{}.{}", stem, self.part_index, self.total_parts, ext)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    #[test]
    fn test_single_terminal_transition() {
        let mut entry = AudioFileEntry::pending(1, 3, 20);
        assert!(entry.start());
        assert!(!entry.start());
        assert!(entry.cancel());
        assert!(!entry.complete(EncodedAudio::new(vec![1u8], AudioFormat::Mp3)));
        assert!(!entry.fail("late"));

        assert_eq!(entry.status, FileStatus::Cancelled);
        assert!(entry.audio.is_none());
        assert!(entry.error_message.is_none());
        assert!(entry.finished_at.is_some());
    }

    #[test]
    fn test_file_names() {
        let mut part = AudioFileEntry::pending(2, 5, 20);
        part.start();
        part.complete(EncodedAudio::new(vec![0u8; 4], AudioFormat::Mp3));
        assert_eq!(part.file_name("Les 3: Werk & Zorg"), "les_3__werk___zorg_part2_of5.mp3");

        let mut combined = AudioFileEntry::combined(5, 100);
        combined.complete(EncodedAudio::new(vec![0u8; 4], AudioFormat::Wav));
        assert_eq!(combined.file_name("Week1"), "week1_combined_all_parts.wav");
    }

    #[test]
    fn test_file_id_parse() {
        assert_eq!("3".parse::<FileId>().unwrap(), FileId::Part(3));
        assert_eq!("combined".parse::<FileId>().unwrap(), FileId::Combined);
        assert!("0".parse::<FileId>().is_err());
        assert!("abc".parse::<FileId>().is_err());

        let json = serde_json::to_string(&FileId::Part(7)).unwrap();
        assert_eq!(json, "\"7\"");
    }
}
