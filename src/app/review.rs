//! Operator-facing chapter review: a column table, a single-key decision
//! prompt, and an $EDITOR round-trip through the text-sidecar format.
//!
//! The prompts are capabilities the resolver and split command inject, so
//! their decision logic stays testable without a terminal.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use super::chapters::{Chapter, parse_chapters_text, serialize_chapters};
use super::pipeline::process::run_interactive;

/// Operator verdict on a looked-up chapter candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterDecision {
    Accept,
    Edit,
    Reject,
}

/// Operator verdict in the pre-split review loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    Continue,
    Edit,
    Abort,
}

pub fn display_chapter_table(chapters: &[Chapter], heading: &str) {
    println!("\n  {heading}");
    println!("  {:>4} {:<10} {:<10} {}", "#", "START", "LENGTH", "TITLE");
    for ch in chapters {
        println!(
            "  {:>4} {:<10} {:<10} {}",
            ch.index,
            ch.start_ts(),
            ch.duration_str(),
            truncate(&ch.title, 60)
        );
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub fn format_recorded_display(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

// ── prompts ───────────────────────────────────────────────────────────────

/// `[Y/n/e]` prompt for a lookup candidate. Interrupt, Esc, and end of
/// input all map to reject for this one decision.
pub fn prompt_chapter_decision() -> ChapterDecision {
    print!("  Use these chapters? [Y/n/e=edit] ");
    let _ = io::stdout().flush();

    match read_prompt_key(&[
        (KeyCode::Enter, 'y'),
        (KeyCode::Char('y'), 'y'),
        (KeyCode::Char('e'), 'e'),
        (KeyCode::Char('n'), 'n'),
        (KeyCode::Char('q'), 'n'),
        (KeyCode::Esc, 'n'),
    ]) {
        Some('y') => ChapterDecision::Accept,
        Some('e') => ChapterDecision::Edit,
        _ => ChapterDecision::Reject,
    }
}

/// `[c/e/a]` prompt used by the standalone split review loop.
pub fn prompt_review_choice() -> ReviewChoice {
    print!("  [c]ontinue  [e]dit  [a]bort — choice [c] ");
    let _ = io::stdout().flush();

    match read_prompt_key(&[
        (KeyCode::Enter, 'c'),
        (KeyCode::Char('c'), 'c'),
        (KeyCode::Char('e'), 'e'),
        (KeyCode::Char('a'), 'a'),
        (KeyCode::Char('q'), 'a'),
        (KeyCode::Esc, 'a'),
    ]) {
        Some('c') => ReviewChoice::Continue,
        Some('e') => ReviewChoice::Edit,
        _ => ReviewChoice::Abort,
    }
}

/// Read one mapped key in raw mode. `None` means rejection by interrupt,
/// read failure, or a non-terminal stdin (where a line read is used
/// instead and unmapped input falls through to `None`).
fn read_prompt_key(mapping: &[(KeyCode, char)]) -> Option<char> {
    if terminal::enable_raw_mode().is_err() {
        return read_prompt_line(mapping);
    }

    let mut answer = None;
    loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
                {
                    break;
                }
                let pressed = match key.code {
                    KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
                    other => other,
                };
                if let Some((_, mapped)) = mapping.iter().find(|(code, _)| *code == pressed) {
                    answer = Some(*mapped);
                    break;
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    let _ = terminal::disable_raw_mode();
    match answer {
        Some(c) => println!("{c}"),
        None => println!(),
    }
    answer
}

fn read_prompt_line(mapping: &[(KeyCode, char)]) -> Option<char> {
    let mut raw = String::new();
    match io::stdin().read_line(&mut raw) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let first = raw.trim().chars().next().map(|c| c.to_ascii_lowercase());
            match first {
                None => mapping
                    .iter()
                    .find(|(code, _)| *code == KeyCode::Enter)
                    .map(|(_, mapped)| *mapped),
                Some(c) => mapping
                    .iter()
                    .find(|(code, _)| *code == KeyCode::Char(c))
                    .map(|(_, mapped)| *mapped),
            }
        }
    }
}

// ── editor round-trip ─────────────────────────────────────────────────────

pub fn resolve_editor() -> String {
    resolve_editor_from_env(env::var_os("EDITOR"), env::var_os("VISUAL"))
}

pub fn resolve_editor_from_env(editor: Option<OsString>, visual: Option<OsString>) -> String {
    for value in [editor, visual].into_iter().flatten() {
        if let Some(text) = value.to_str()
            && !text.trim().is_empty()
        {
            return text.trim().to_string();
        }
    }
    "vi".to_string()
}

struct ScratchChaptersFile {
    path: PathBuf,
}

impl ScratchChaptersFile {
    fn create(contents: &str) -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = env::temp_dir().join(format!(
            "tracksmith-{}-{nanos}.chapters.txt",
            std::process::id()
        ));
        fs::write(&path, contents)
            .with_context(|| format!("failed to write scratch file {}", path.display()))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchChaptersFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Serialize to a scratch sidecar, open $EDITOR on it, parse the result.
/// An edit that leaves no valid chapter lines keeps the original list.
pub fn edit_in_editor(chapters: &[Chapter]) -> Result<Vec<Chapter>> {
    let scratch = ScratchChaptersFile::create(&serialize_chapters(chapters))?;

    let editor = resolve_editor();
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi").to_string();
    let mut cmd = ProcessCommand::new(&program);
    for arg in parts {
        cmd.arg(arg);
    }
    cmd.arg(scratch.path());

    println!("  Opening {} in {editor:?}...", scratch.path().display());
    run_interactive(cmd, &program)?;

    let raw = fs::read_to_string(scratch.path())
        .with_context(|| format!("failed to re-read {}", scratch.path().display()))?;
    let updated = parse_chapters_text(&raw);
    if updated.is_empty() {
        println!("  No valid chapters found after editing — keeping original.");
        return Ok(chapters.to_vec());
    }
    println!("  Chapters updated ({} tracks).", updated.len());
    Ok(updated)
}

/// Review loop for the standalone split command: show the table, then
/// continue, edit and show again, or abort.
pub fn review_chapters(mut chapters: Vec<Chapter>) -> Result<Option<Vec<Chapter>>> {
    loop {
        display_chapter_table(&chapters, "Chapters");
        match prompt_review_choice() {
            ReviewChoice::Continue => return Ok(Some(chapters)),
            ReviewChoice::Abort => {
                println!("  Aborted.");
                return Ok(None);
            }
            ReviewChoice::Edit => chapters = edit_in_editor(&chapters)?,
        }
    }
}
