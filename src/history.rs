// ============================================================================
// HISTORY MANAGER — bounded undo/redo stacks with snapshot bookkeeping
// ============================================================================

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::Command;

/// A cached page state letting replay fast-forward instead of redrawing from
/// a blank page: `image` is the page as it looked right after
/// `undo_stack[index]` was drawn.
pub struct HistorySnapshot {
    pub index: usize,
    pub image: RgbaImage,
}

/// Undo/redo history over replayable commands.
///
/// Undo here is replay-based: `undo` hands back the commands that are still
/// live and the caller re-renders the page from them, optionally
/// fast-forwarding from a snapshot. Nothing in this struct touches pixels.
pub struct HistoryManager {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Sorted ascending by index.
    snapshots: Vec<HistorySnapshot>,
    max_history: usize,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            snapshots: Vec::new(),
            max_history: max_history.max(1),
            total_memory: 0,
        }
    }

    /// Record a new command. Anything sitting on the redo stack is gone for
    /// good, and the oldest entries are evicted once the stack outgrows the
    /// configured limit.
    pub fn push(&mut self, command: Command) {
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        tracing::debug!(label = command.label(), "history push");
        self.total_memory += command.memory_size();
        self.undo_stack.push(command);

        if self.undo_stack.len() > self.max_history {
            let excess = self.undo_stack.len() - self.max_history;
            self.trim_front(excess);
        }
    }

    /// Step one command back. Returns the commands that remain live, oldest
    /// first, for the caller to replay; `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&[Command]> {
        let command = self.undo_stack.pop()?;
        tracing::debug!(label = command.label(), "undo");
        self.redo_stack.push(command);
        Some(&self.undo_stack)
    }

    /// Step one command forward again. Returns the full live list including
    /// the restored command; `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&[Command]> {
        let command = self.redo_stack.pop()?;
        tracing::debug!(label = command.label(), "redo");
        self.undo_stack.push(command);
        Some(&self.undo_stack)
    }

    /// Swap the command at `index` for a replacement. Invalidates the redo
    /// stack and every snapshot at or after the edited slot. Bounds-checked
    /// no-op returning `false` on a bad index.
    pub fn replace_action(&mut self, index: usize, command: Command) -> bool {
        if index >= self.undo_stack.len() {
            return false;
        }
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }
        self.total_memory = self
            .total_memory
            .saturating_sub(self.undo_stack[index].memory_size());
        self.total_memory += command.memory_size();
        self.undo_stack[index] = command;
        self.drop_snapshots_from(index);
        true
    }

    /// Remove the command at `index` outright, returning it. Same
    /// redo/snapshot invalidation as `replace_action`; `None` on a bad index.
    pub fn remove_action(&mut self, index: usize) -> Option<Command> {
        if index >= self.undo_stack.len() {
            return None;
        }
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }
        let removed = self.undo_stack.remove(index);
        self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
        self.drop_snapshots_from(index);
        Some(removed)
    }

    /// Commit the re-edit of the text command at `index`. The replacement
    /// comes from `Command::text`, which is `None` for blank input; a blank
    /// edit removes the slot entirely instead of leaving an empty command.
    pub fn commit_text_edit(&mut self, index: usize, replacement: Option<Command>) -> bool {
        match replacement {
            Some(command) => self.replace_action(index, command),
            None => self.remove_action(index).is_some(),
        }
    }

    /// Change the capacity, trimming oldest-first if the stack already
    /// exceeds the new limit.
    pub fn set_limit(&mut self, max_history: usize) {
        self.max_history = max_history.max(1);
        if self.undo_stack.len() > self.max_history {
            let excess = self.undo_stack.len() - self.max_history;
            self.trim_front(excess);
        }
    }

    pub fn limit(&self) -> usize {
        self.max_history
    }

    /// The live command list, oldest first.
    pub fn actions(&self) -> &[Command] {
        &self.undo_stack
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo_stack.last().map(|c| c.label())
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo_stack.last().map(|c| c.label())
    }

    /// Labels of the live commands, most recent first, for a history listing.
    pub fn undo_labels(&self) -> Vec<&'static str> {
        self.undo_stack.iter().rev().map(|c| c.label()).collect()
    }

    /// Current memory usage of both stacks (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.snapshots.clear();
        self.total_memory = 0;
    }

    // ------------------------------------------------------------------------
    // Snapshots — cached page states so replay can fast-forward
    // ------------------------------------------------------------------------

    /// Cache the page as it looks now, covering the newest command. No-op on
    /// an empty stack; snapshotting the same position again overwrites.
    pub fn add_snapshot(&mut self, image: RgbaImage) {
        let Some(index) = self.undo_stack.len().checked_sub(1) else {
            return;
        };
        match self.snapshots.binary_search_by_key(&index, |s| s.index) {
            Ok(pos) => self.snapshots[pos].image = image,
            Err(pos) => self.snapshots.insert(pos, HistorySnapshot { index, image }),
        }
    }

    /// The newest snapshot usable when replaying `action_count` commands:
    /// the one with the greatest index inside that prefix.
    pub fn latest_snapshot(&self, action_count: usize) -> Option<&HistorySnapshot> {
        self.snapshots.iter().rev().find(|s| s.index < action_count)
    }

    #[cfg(test)]
    fn snapshot_indices(&self) -> Vec<usize> {
        self.snapshots.iter().map(|s| s.index).collect()
    }

    /// Evict the oldest `count` commands and re-derive snapshot indices:
    /// every surviving snapshot shifts down by `count`, and any snapshot
    /// whose command was evicted goes with it.
    fn trim_front(&mut self, count: usize) {
        for cmd in self.undo_stack.drain(..count) {
            tracing::debug!(label = cmd.label(), "history evict");
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }
        self.snapshots.retain(|s| s.index >= count);
        for snapshot in &mut self.snapshots {
            snapshot.index -= count;
        }
    }

    /// Drop every snapshot recorded at or after `index`; an upstream edit
    /// invalidates any cached state downstream of it.
    fn drop_snapshots_from(&mut self, index: usize) {
        self.snapshots.retain(|s| s.index < index);
    }
}

// ============================================================================
// ACTION LOG — serialized command lists
// ============================================================================

/// Magic header for the serialized action log.
const LOG_MAGIC: &str = "IPL1";

#[derive(Serialize)]
struct ActionLogRef<'a> {
    magic: &'a str,
    actions: &'a [Command],
}

#[derive(Deserialize)]
struct ActionLog {
    magic: String,
    actions: Vec<Command>,
}

#[derive(Debug, Error)]
pub enum ActionLogError {
    #[error("failed to encode action log")]
    Encode(#[source] bincode::Error),
    #[error("malformed action log")]
    Decode(#[source] bincode::Error),
    #[error("unrecognized action log header")]
    BadMagic,
}

/// Serialize a command list for storage or transfer.
pub fn encode_actions(actions: &[Command]) -> Result<Vec<u8>, ActionLogError> {
    let log = ActionLogRef {
        magic: LOG_MAGIC,
        actions,
    };
    bincode::serialize(&log).map_err(ActionLogError::Encode)
}

/// Deserialize a command list written by [`encode_actions`].
pub fn decode_actions(bytes: &[u8]) -> Result<Vec<Command>, ActionLogError> {
    // bincode encodes a string as an 8-byte length prefix + UTF-8 data, so
    // bytes 8..12 hold the 4-char magic. Check it before parsing the body.
    if bytes.len() < 12 || &bytes[8..12] != LOG_MAGIC.as_bytes() {
        return Err(ActionLogError::BadMagic);
    }
    let log: ActionLog = bincode::deserialize(bytes).map_err(ActionLogError::Decode)?;
    if log.magic != LOG_MAGIC {
        return Err(ActionLogError::BadMagic);
    }
    Ok(log.actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::text::FontCatalog;
    use crate::page::{PageId, blank_page};
    use crate::style::{Color, TextStyle};
    use image::Rgba;

    fn fill_cmd(r: u8) -> Command {
        Command::fill(0, 0, Color::rgb(r, 0, 0), PageId::new())
    }

    #[test]
    fn test_push_bounds_stack_oldest_first() {
        let mut history = HistoryManager::new(2);
        let (a, b, c) = (fill_cmd(1), fill_cmd(2), fill_cmd(3));
        history.push(a);
        history.push(b.clone());
        history.push(c.clone());
        assert_eq!(history.actions(), &[b, c]);
    }

    #[test]
    fn test_undo_returns_remaining_redo_returns_full() {
        let mut history = HistoryManager::new(10);
        history.push(fill_cmd(1));
        history.push(fill_cmd(2));

        assert_eq!(history.undo().map(|a| a.len()), Some(1));
        assert_eq!(history.undo().map(|a| a.len()), Some(0));
        assert!(history.undo().is_none());

        assert_eq!(history.redo().map(|a| a.len()), Some(1));
        assert_eq!(history.redo().map(|a| a.len()), Some(2));
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_undo_redo_round_trip_restores_order() {
        let mut history = HistoryManager::new(10);
        let commands = vec![fill_cmd(1), fill_cmd(2), fill_cmd(3)];
        for cmd in &commands {
            history.push(cmd.clone());
        }
        while history.undo().is_some() {}
        assert!(!history.can_undo());
        while history.redo().is_some() {}
        assert_eq!(history.actions(), commands.as_slice());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = HistoryManager::new(10);
        history.push(fill_cmd(1));
        history.push(fill_cmd(2));
        history.undo();
        assert!(history.can_redo());
        history.push(fill_cmd(3));
        assert!(!history.can_redo());
        assert_eq!(history.undo_count(), 2);
    }

    #[test]
    fn test_eviction_renumbers_snapshots() {
        let mut history = HistoryManager::new(2);
        history.push(fill_cmd(1));
        history.add_snapshot(blank_page(1, 1));
        history.push(fill_cmd(2));
        history.add_snapshot(blank_page(1, 1));
        history.push(fill_cmd(3));
        // Oldest command evicted: its snapshot dropped, the other shifted down.
        assert_eq!(history.snapshot_indices(), vec![0]);
        assert_eq!(history.latest_snapshot(2).map(|s| s.index), Some(0));
    }

    #[test]
    fn test_set_limit_trims_like_eviction() {
        let mut history = HistoryManager::new(10);
        let third = fill_cmd(3);
        history.push(fill_cmd(1));
        history.add_snapshot(blank_page(1, 1));
        history.push(fill_cmd(2));
        history.push(third.clone());
        history.push(fill_cmd(4));
        history.add_snapshot(blank_page(1, 1));

        history.set_limit(2);
        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.actions()[0], third);
        assert_eq!(history.snapshot_indices(), vec![1]);
    }

    #[test]
    fn test_replace_action_invalidates_downstream() {
        let mut history = HistoryManager::new(10);
        history.push(fill_cmd(1));
        history.add_snapshot(blank_page(1, 1));
        history.push(fill_cmd(2));
        history.push(fill_cmd(3));
        history.add_snapshot(blank_page(1, 1));
        history.undo();
        assert!(history.can_redo());

        let replacement = fill_cmd(9);
        assert!(history.replace_action(1, replacement.clone()));
        assert!(!history.can_redo());
        assert_eq!(history.actions()[1], replacement);
        assert_eq!(history.snapshot_indices(), vec![0]);
        assert!(!history.replace_action(7, fill_cmd(9)));
    }

    #[test]
    fn test_remove_action_returns_removed() {
        let mut history = HistoryManager::new(10);
        let only = fill_cmd(1);
        history.push(only.clone());
        assert!(history.remove_action(1).is_none());
        assert_eq!(history.undo_count(), 1);
        assert_eq!(history.remove_action(0), Some(only));
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn test_blank_text_edit_removes_slot() {
        let mut history = HistoryManager::new(10);
        let style = TextStyle::default();
        let page = PageId::new();
        history.push(Command::text("draft", 4.0, 4.0, &style, page).unwrap());

        let blank = Command::text("   ", 4.0, 4.0, &style, page);
        assert!(blank.is_none());
        assert!(history.commit_text_edit(0, blank));
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn test_text_edit_replaces_in_place() {
        let mut history = HistoryManager::new(10);
        let style = TextStyle::default();
        let page = PageId::new();
        history.push(Command::text("draft", 4.0, 4.0, &style, page).unwrap());
        history.push(fill_cmd(1));

        let replacement = Command::text("final", 4.0, 4.0, &style, page);
        assert!(history.commit_text_edit(0, replacement));
        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.actions()[0].text_content(), Some("final"));
    }

    #[test]
    fn test_add_snapshot_needs_actions() {
        let mut history = HistoryManager::new(10);
        history.add_snapshot(blank_page(1, 1));
        assert!(history.snapshot_indices().is_empty());
        history.push(fill_cmd(1));
        history.add_snapshot(blank_page(1, 1));
        history.add_snapshot(blank_page(2, 2));
        assert_eq!(history.snapshot_indices(), vec![0]);
        assert_eq!(
            history.latest_snapshot(1).map(|s| s.image.dimensions()),
            Some((2, 2))
        );
    }

    #[test]
    fn test_latest_snapshot_picks_greatest_covered_index() {
        let mut history = HistoryManager::new(10);
        history.push(fill_cmd(1));
        history.push(fill_cmd(2));
        history.add_snapshot(blank_page(1, 1));
        history.push(fill_cmd(3));
        history.push(fill_cmd(4));
        history.add_snapshot(blank_page(1, 1));
        history.push(fill_cmd(5));

        assert!(history.latest_snapshot(0).is_none());
        assert!(history.latest_snapshot(1).is_none());
        assert_eq!(history.latest_snapshot(2).map(|s| s.index), Some(1));
        assert_eq!(history.latest_snapshot(4).map(|s| s.index), Some(3));
        assert_eq!(history.latest_snapshot(5).map(|s| s.index), Some(3));
    }

    #[test]
    fn test_memory_usage_tracks_stack_contents() {
        let mut history = HistoryManager::new(10);
        assert_eq!(history.memory_usage(), 0);
        history.push(fill_cmd(1));
        let one = history.memory_usage();
        assert!(one > 0);
        history.push(fill_cmd(2));
        assert!(history.memory_usage() > one);
        history.undo();
        // Undone commands still occupy the redo stack.
        assert!(history.memory_usage() > one);
        history.clear();
        assert_eq!(history.memory_usage(), 0);
    }

    #[test]
    fn test_action_log_round_trip() {
        let commands = vec![fill_cmd(1), fill_cmd(2)];
        let bytes = encode_actions(&commands).unwrap();
        assert_eq!(&bytes[8..12], b"IPL1");
        let back = decode_actions(&bytes).unwrap();
        assert_eq!(back, commands);
    }

    #[test]
    fn test_action_log_rejects_garbage() {
        assert!(matches!(
            decode_actions(b"short"),
            Err(ActionLogError::BadMagic)
        ));
        let mut bytes = encode_actions(&[fill_cmd(1)]).unwrap();
        bytes[9] = b'X';
        assert!(matches!(
            decode_actions(&bytes),
            Err(ActionLogError::BadMagic)
        ));
        // Right magic, truncated body.
        let good = encode_actions(&[fill_cmd(1)]).unwrap();
        assert!(matches!(
            decode_actions(&good[..good.len() - 2]),
            Err(ActionLogError::Decode(_))
        ));
    }

    #[test]
    fn test_fill_undo_replay_end_to_end() {
        let fonts = FontCatalog::new();
        let mut page = blank_page(2, 2);
        let mut history = HistoryManager::new(10);

        let cmd = Command::fill(0, 0, Color::rgb(255, 0, 0), PageId::new());
        cmd.draw(&mut page, &fonts);
        history.push(cmd);
        assert!(page.pixels().all(|p| p.0 == [255, 0, 0, 255]));

        let remaining = history.undo().map(|a| a.to_vec());
        assert_eq!(remaining.as_deref(), Some(&[][..]));

        let mut replayed = blank_page(2, 2);
        for cmd in remaining.iter().flatten() {
            cmd.draw(&mut replayed, &fonts);
        }
        assert!(replayed.pixels().all(|p| p.0 == [255, 255, 255, 255]));
        assert_eq!(*replayed.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }
}
