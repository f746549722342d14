//! Tolerant parser adapter.
//!
//! oxc recovers from most syntax errors by itself. When it cannot (the parser
//! panics and hands back an empty program) the source is split into top-level
//! chunks, every chunk that fails to parse on its own is blanked out with
//! spaces, and the remainder is parsed again. Blanking keeps byte offsets and
//! line numbers intact, so spans in the recovered tree still point into the
//! original text. One malformed helper never hides the statements the
//! extractors look for.

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::path::Path;

pub struct ParsedModule<'a> {
    pub program: Program<'a>,
    /// Text the program was parsed from. Equal to the input unless chunks
    /// had to be blanked during recovery.
    pub source: &'a str,
    /// Number of syntax errors reported or recovered from.
    pub diagnostics: usize,
    /// Top-level chunks dropped during recovery, as byte ranges.
    pub dropped: Vec<(usize, usize)>,
}

/// Source type for a file, falling back to TypeScript module syntax for
/// unknown extensions.
pub fn source_type_for(filename: &str) -> SourceType {
    SourceType::from_path(Path::new(filename)).unwrap_or_else(|_| {
        SourceType::default()
            .with_module(true)
            .with_typescript(true)
    })
}

pub fn parse_module<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    filename: &str,
) -> ParsedModule<'a> {
    let source_type = source_type_for(filename);
    let ret = Parser::new(allocator, source, source_type).parse();
    if !ret.panicked {
        if !ret.errors.is_empty() {
            tracing::debug!(
                filename,
                errors = ret.errors.len(),
                "recovered from syntax errors while parsing"
            );
        }
        return ParsedModule {
            program: ret.program,
            source,
            diagnostics: ret.errors.len(),
            dropped: Vec::new(),
        };
    }

    let diagnostics = ret.errors.len();
    let dropped = unparsable_chunks(source, &top_level_chunks(source), source_type);
    tracing::debug!(
        filename,
        errors = diagnostics,
        dropped = dropped.len(),
        "parser bailed out; retrying without unparsable top-level chunks"
    );

    let patched: &'a str = allocator.alloc_str(&blank_ranges(source, &dropped));
    let ret = Parser::new(allocator, patched, source_type).parse();
    ParsedModule {
        program: ret.program,
        source: patched,
        diagnostics: diagnostics.max(ret.errors.len()),
        dropped,
    }
}

/// A candidate top-level statement range and the net number of brackets it
/// leaves open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    start: usize,
    end: usize,
    depth: i32,
}

/// Ranges to blank out. A failing chunk that leaves brackets open is first
/// joined with the chunks that follow until they close; the join is kept if
/// it parses.
fn unparsable_chunks(source: &str, chunks: &[Chunk], source_type: SourceType) -> Vec<(usize, usize)> {
    let mut dropped = Vec::new();
    let mut i = 0;
    while i < chunks.len() {
        let chunk = chunks[i];
        if chunk_parses(source, chunk.start, chunk.end, source_type) {
            i += 1;
            continue;
        }

        let mut depth = chunk.depth;
        let mut j = i + 1;
        while depth > 0 && j < chunks.len() {
            depth += chunks[j].depth;
            j += 1;
        }
        if j > i + 1 && depth <= 0 && chunk_parses(source, chunk.start, chunks[j - 1].end, source_type) {
            i = j;
            continue;
        }

        dropped.push((chunk.start, chunk.end));
        i += 1;
    }
    dropped
}

fn chunk_parses(source: &str, start: usize, end: usize, source_type: SourceType) -> bool {
    let others: Vec<(usize, usize)> = [(0, start), (end, source.len())]
        .into_iter()
        .filter(|(s, e)| s < e)
        .collect();
    let isolated = blank_ranges(source, &others);
    let scratch = Allocator::default();
    let ret = Parser::new(&scratch, &isolated, source_type).parse();
    !ret.panicked && ret.errors.is_empty()
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Template,
    /// `${ ... }` inside a template, with the braces opened since.
    Interpolation(u32),
}

/// A line that starts in column zero with something other than a closing
/// bracket, a chain dot or a binary-operator continuation.
fn opens_statement(first: u8) -> bool {
    !(first.is_ascii_whitespace()
        || matches!(first, b'}' | b')' | b']' | b'.' | b'?' | b':' | b'+' | b'|' | b'&' | b','))
}

/// Splits source at lines that open a statement. Lines that begin inside a
/// string, template literal or block comment never start a chunk, unless the
/// literal is left unterminated at the end of the file.
fn top_level_chunks(source: &str) -> Vec<Chunk> {
    let bytes = source.as_bytes();
    // (offset, starts inside a literal, bracket depth at offset)
    let mut candidates: Vec<(usize, bool, i32)> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut quote: Option<u8> = None;
    let mut line_comment = false;
    let mut block_comment = false;
    let mut depth = 0i32;
    let mut line_start = true;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        if line_start && opens_statement(b) {
            let in_literal = block_comment || quote.is_some() || !frames.is_empty();
            candidates.push((i, in_literal, depth));
        }

        if line_comment {
            line_comment = b != b'\n';
        } else if block_comment {
            if b == b'*' && next == Some(b'/') {
                block_comment = false;
                i += 1;
            }
        } else if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q || b == b'\n' {
                quote = None;
            }
        } else if matches!(frames.last(), Some(Frame::Template)) {
            match b {
                b'\\' => i += 1,
                b'`' => {
                    frames.pop();
                }
                b'$' if next == Some(b'{') => {
                    frames.push(Frame::Interpolation(0));
                    i += 1;
                }
                _ => {}
            }
        } else {
            match b {
                b'/' if next == Some(b'/') => {
                    line_comment = true;
                    i += 1;
                }
                b'/' if next == Some(b'*') => {
                    block_comment = true;
                    i += 1;
                }
                b'\'' | b'"' => quote = Some(b),
                b'`' => frames.push(Frame::Template),
                b'{' => match frames.last_mut() {
                    Some(Frame::Interpolation(open)) => *open += 1,
                    _ => depth += 1,
                },
                b'}' => match frames.last().copied() {
                    Some(Frame::Interpolation(0)) => {
                        frames.pop();
                    }
                    Some(Frame::Interpolation(open)) => {
                        frames.pop();
                        frames.push(Frame::Interpolation(open - 1));
                    }
                    _ => depth -= 1,
                },
                b'(' | b'[' if frames.is_empty() => depth += 1,
                b')' | b']' if frames.is_empty() => depth -= 1,
                _ => {}
            }
        }

        line_start = bytes.get(i) == Some(&b'\n');
        i += 1;
    }

    let terminated = frames.is_empty() && !block_comment;
    let mut starts: Vec<(usize, i32)> = candidates
        .into_iter()
        .filter(|&(_, in_literal, _)| !in_literal || !terminated)
        .map(|(offset, _, depth)| (offset, depth))
        .collect();
    if starts.first().map(|&(offset, _)| offset) != Some(0) {
        starts.insert(0, (0, 0));
    }

    starts
        .iter()
        .enumerate()
        .map(|(k, &(start, open))| {
            let (end, close) = starts.get(k + 1).copied().unwrap_or((source.len(), depth));
            Chunk {
                start,
                end,
                depth: close - open,
            }
        })
        .filter(|c| c.start < c.end)
        .collect()
}

/// Replaces every non-newline character in `ranges` with spaces, byte for byte.
fn blank_ranges(source: &str, ranges: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(source.len());
    for (i, ch) in source.char_indices() {
        let blanked = ranges.iter().any(|&(start, end)| i >= start && i < end);
        if blanked && ch != '\n' {
            for _ in 0..ch.len_utf8() {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// 1-based line number of a byte offset.
pub fn line_of(source: &str, offset: u32) -> u32 {
    let end = (offset as usize).min(source.len());
    let newlines = source.as_bytes()[..end]
        .iter()
        .filter(|b| **b == b'\n')
        .count();
    newlines as u32 + 1
}
