//! Coverage profiles and their correlation with syntax trees.
//!
//! A profile is the text file written by an instrumented run, one record per
//! executed-or-not basic block. Correlation maps those records back onto the
//! extents of the original tree with a single forward sweep.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::common::error::ProfileError;
use crate::domain::ast::{FuncId, Pos, Span, StmtId, SyntaxTree};
use crate::domain::extent::{Extent, Extents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverMode {
    Set,
    Count,
    Atomic,
}

impl FromStr for CoverMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(CoverMode::Set),
            "count" => Ok(CoverMode::Count),
            "atomic" => Ok(CoverMode::Atomic),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CoverMode::Set => "set",
            CoverMode::Count => "count",
            CoverMode::Atomic => "atomic",
        })
    }
}

/// One `<file>:<sl>.<sc>,<el>.<ec> <numStmt> <count>` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageRecord {
    pub span: Span,
    pub num_stmt: u32,
    pub count: u64,
}

/// The records of one file, sorted by start position.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecords {
    /// Logical path, `<module dir>/<file name>`.
    pub file: String,
    pub records: Vec<CoverageRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoverageProfile {
    pub mode: Option<CoverMode>,
    /// Files in order of first appearance.
    pub files: Vec<FileRecords>,
}

impl CoverageProfile {
    /// Parses a profile. Records of one file may be interleaved with other
    /// files; they are grouped, sorted, and records with identical spans are
    /// merged.
    pub fn parse(src: &str) -> Result<Self, ProfileError> {
        let mut profile = CoverageProfile::default();
        let mut by_file: HashMap<String, usize> = HashMap::new();

        for (idx, raw) in src.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(mode) = line.strip_prefix("mode:") {
                if line_no != 1 {
                    return Err(ProfileError::BadMode { line_no, line: line.to_string() });
                }
                let mode = mode.trim().parse().map_err(|_| ProfileError::BadMode {
                    line_no,
                    line: line.to_string(),
                })?;
                profile.mode = Some(mode);
                continue;
            }

            let (file, record) = parse_record(line).ok_or_else(|| ProfileError::MalformedRecord {
                line_no,
                line: line.to_string(),
            })?;
            let slot = *by_file.entry(file.to_string()).or_insert_with(|| {
                profile.files.push(FileRecords { file: file.to_string(), records: Vec::new() });
                profile.files.len() - 1
            });
            profile.files[slot].records.push(record);
        }

        let set_mode = profile.mode == Some(CoverMode::Set);
        for file in &mut profile.files {
            file.records = merge_records(std::mem::take(&mut file.records), set_mode);
        }
        Ok(profile)
    }

    pub fn record_count(&self) -> usize {
        self.files.iter().map(|f| f.records.len()).sum()
    }
}

fn parse_record(line: &str) -> Option<(&str, CoverageRecord)> {
    let (file, rest) = line.rsplit_once(':')?;
    if file.is_empty() {
        return None;
    }
    let mut fields = rest.split_whitespace();
    let (start, end) = fields.next()?.split_once(',')?;
    let num_stmt = fields.next()?.parse().ok()?;
    let count = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    let span = Span::new(parse_pos(start)?, parse_pos(end)?);
    Some((file, CoverageRecord { span, num_stmt, count }))
}

fn parse_pos(s: &str) -> Option<Pos> {
    let (line, col) = s.split_once('.')?;
    Some(Pos::new(line.parse().ok()?, col.parse().ok()?))
}

fn merge_records(mut records: Vec<CoverageRecord>, set_mode: bool) -> Vec<CoverageRecord> {
    records.sort_by_key(|r| (r.span.start, r.span.end));
    let mut merged: Vec<CoverageRecord> = Vec::with_capacity(records.len());
    for record in records {
        match merged.last_mut() {
            Some(last) if last.span == record.span => {
                last.count = if set_mode {
                    last.count | record.count
                } else {
                    last.count.saturating_add(record.count)
                };
            }
            _ => merged.push(record),
        }
    }
    merged
}

// ─────────────────────────────────────────────────────────────────────
// Correlation
// ─────────────────────────────────────────────────────────────────────

/// Reached flags of one tree. Every indexed function and statement has an
/// entry; nodes without one were synthesized after indexing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reach {
    pub funcs: HashMap<FuncId, bool>,
    pub stmts: HashMap<StmtId, bool>,
}

impl Reach {
    pub fn func(&self, id: FuncId) -> bool {
        self.funcs.get(&id).copied().unwrap_or(false)
    }

    /// `None` for a statement that was never indexed.
    pub fn stmt(&self, id: StmtId) -> Option<bool> {
        self.stmts.get(&id).copied()
    }

    pub fn reached_funcs(&self) -> usize {
        self.funcs.values().filter(|r| **r).count()
    }

    pub fn reached_stmts(&self) -> usize {
        self.stmts.values().filter(|r| **r).count()
    }
}

/// Matches one file's records against its extents. Functions and statements
/// are swept independently, each from the first record.
pub fn correlate(extents: &Extents, records: &[CoverageRecord]) -> Reach {
    Reach { funcs: sweep(&extents.funcs, records), stmts: sweep(&extents.stmts, records) }
}

/// Both sides are sorted by start. A record ending at or before an extent's
/// start can never overlap a later extent and is skipped for good; a record
/// starting at or after the extent's end leaves the extent unmatched. The
/// first overlapping record decides.
fn sweep<Id: Copy + Eq + Hash>(extents: &[Extent<Id>], records: &[CoverageRecord]) -> HashMap<Id, bool> {
    let mut reached = HashMap::with_capacity(extents.len());
    let mut cursor = 0;
    for extent in extents {
        let mut hit = false;
        while let Some(record) = records.get(cursor) {
            if record.span.end <= extent.span.start {
                cursor += 1;
                continue;
            }
            if record.span.start < extent.span.end {
                hit = record.count > 0;
            }
            break;
        }
        reached.insert(extent.id, hit);
    }
    reached
}

/// A tree paired with the reach data of its records.
#[derive(Debug, Clone)]
pub struct ProfiledFile {
    pub tree: SyntaxTree,
    pub reach: Reach,
}

/// The correlation result of one run.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub files: Vec<ProfiledFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(sl: u32, sc: u32, el: u32, ec: u32) -> Span {
        Span::new(Pos::new(sl, sc), Pos::new(el, ec))
    }

    fn record(span: Span, count: u64) -> CoverageRecord {
        CoverageRecord { span, num_stmt: 1, count }
    }

    #[test]
    fn test_parse_groups_sorts_and_merges() {
        let src = "mode: count
example.com/app/a.go:10.2,12.3 2 0
example.com/app/b.go:1.1,2.2 1 4
example.com/app/a.go:3.14,5.2 1 1
example.com/app/a.go:10.2,12.3 2 3
";
        let profile = CoverageProfile::parse(src).unwrap();
        assert_eq!(profile.mode, Some(CoverMode::Count));
        assert_eq!(profile.files.len(), 2);
        assert_eq!(profile.files[0].file, "example.com/app/a.go");
        assert_eq!(
            profile.files[0].records,
            vec![
                CoverageRecord { span: span(3, 14, 5, 2), num_stmt: 1, count: 1 },
                CoverageRecord { span: span(10, 2, 12, 3), num_stmt: 2, count: 3 },
            ]
        );
        assert_eq!(profile.files[1].file, "example.com/app/b.go");
        assert_eq!(profile.record_count(), 3);
    }

    #[test]
    fn test_set_mode_merge_does_not_sum() {
        let src = "mode: set\np/a.go:1.1,2.1 1 1\np/a.go:1.1,2.1 1 1\n";
        let profile = CoverageProfile::parse(src).unwrap();
        assert_eq!(profile.files[0].records[0].count, 1);
    }

    #[test]
    fn test_mode_line_is_optional() {
        let profile = CoverageProfile::parse("p/a.go:1.1,2.1 1 0\n").unwrap();
        assert_eq!(profile.mode, None);
        assert_eq!(profile.files[0].records.len(), 1);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let src = "mode: set\np/a.go:1.1,2.1 1 0\np/a.go:1.1-2.1 1 0\n";
        match CoverageProfile::parse(src) {
            Err(ProfileError::MalformedRecord { line_no, .. }) => assert_eq!(line_no, 3),
            other => panic!("expected malformed record, got {:?}", other),
        }
        assert!(matches!(
            CoverageProfile::parse("mode: sometimes\n"),
            Err(ProfileError::BadMode { line_no: 1, .. })
        ));
        assert!(CoverageProfile::parse("p/a.go:1.1,2.1 1\n").is_err());
        assert!(CoverageProfile::parse(":1.1,2.1 1 1\n").is_err());
    }

    #[test]
    fn test_sweep_marks_overlapping_extents() {
        let extents = Extents {
            funcs: vec![Extent { id: FuncId(0), span: span(3, 1, 9, 2) }],
            stmts: vec![
                Extent { id: StmtId(0), span: span(3, 13, 9, 2) },
                Extent { id: StmtId(1), span: span(4, 2, 8, 3) },
                Extent { id: StmtId(2), span: span(4, 32, 6, 3) },
                Extent { id: StmtId(3), span: span(5, 3, 5, 13) },
                Extent { id: StmtId(4), span: span(6, 9, 8, 3) },
                Extent { id: StmtId(5), span: span(7, 3, 7, 13) },
            ],
        };
        let records = vec![
            record(span(3, 13, 4, 32), 1),
            record(span(4, 32, 6, 3), 1),
            record(span(6, 3, 8, 3), 0),
        ];
        let reach = correlate(&extents, &records);
        assert!(reach.func(FuncId(0)));
        let flags: Vec<_> = (0..6).map(|i| reach.stmt(StmtId(i)).unwrap()).collect();
        assert_eq!(flags, vec![true, true, true, true, false, false]);
        assert_eq!(reach.reached_stmts(), 4);
    }

    #[test]
    fn test_even_records_mark_even_statements() {
        let n = 9;
        let extents = Extents {
            funcs: vec![],
            stmts: (0..n).map(|i| Extent { id: StmtId(i), span: span(i + 1, 2, i + 1, 12) }).collect(),
        };
        let records: Vec<_> =
            (0..n).map(|i| record(span(i + 1, 2, i + 1, 12), u64::from(i % 2 == 0))).collect();
        let reach = correlate(&extents, &records);
        for i in 0..n {
            assert_eq!(reach.stmt(StmtId(i)), Some(i % 2 == 0), "statement {}", i);
        }
    }

    #[test]
    fn test_exhausted_records_leave_rest_unreached() {
        let extents = Extents {
            funcs: vec![
                Extent { id: FuncId(0), span: span(1, 1, 3, 2) },
                Extent { id: FuncId(1), span: span(5, 1, 7, 2) },
            ],
            stmts: vec![],
        };
        let reach = correlate(&extents, &[record(span(1, 10, 3, 2), 2)]);
        assert!(reach.func(FuncId(0)));
        assert!(!reach.func(FuncId(1)));
        assert_eq!(reach.funcs.len(), 2);
    }

    #[test]
    fn test_empty_extent_without_records_is_unreached() {
        let extents = Extents {
            funcs: vec![Extent { id: FuncId(0), span: span(1, 1, 1, 12) }],
            stmts: vec![],
        };
        let reach = correlate(&extents, &[]);
        assert_eq!(reach.funcs.get(&FuncId(0)), Some(&false));
    }
}
