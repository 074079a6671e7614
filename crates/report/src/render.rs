//! Report grouping and text rendering

use chrono::{DateTime, Local};
use dirwatch_journal::{ChangeKind, ChangeRecord};
use std::fmt;

const RULE: &str = "======================================================================";
const SUB_RULE: &str = "--------------------------------------------------";

/// Records of one change kind, in time order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportGroup {
    pub kind: ChangeKind,
    pub records: Vec<ChangeRecord>,
}

/// A rendered-on-demand digest of one reporting window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    generated_at: DateTime<Local>,
    groups: Vec<ReportGroup>,
}

impl Report {
    /// Group `records` by kind, in the order each kind is first seen
    pub fn build(generated_at: DateTime<Local>, records: Vec<ChangeRecord>) -> Self {
        let mut groups: Vec<ReportGroup> = Vec::new();

        for record in records {
            match groups.iter_mut().find(|g| g.kind == record.kind) {
                Some(group) => group.records.push(record),
                None => groups.push(ReportGroup {
                    kind: record.kind,
                    records: vec![record],
                }),
            }
        }

        Self {
            generated_at,
            groups,
        }
    }

    pub fn groups(&self) -> &[ReportGroup] {
        &self.groups
    }

    /// Number of changes across all groups
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Render the full report text, newline terminated
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "【定時レポート】 {}",
            self.generated_at.format("%Y年%m月%d日 %H:%M")
        )?;
        writeln!(f, "{}", RULE)?;

        if self.is_empty() {
            writeln!(f, "変化なし")?;
        } else {
            writeln!(f, "検出された変更: {}件", self.total())?;
            writeln!(f, "{}", SUB_RULE)?;

            for group in &self.groups {
                writeln!(f)?;
                writeln!(f, "■ {} ({}件)", group.kind.label(), group.records.len())?;
                for record in &group.records {
                    writeln!(f, "{}", format_line(record))?;
                }
            }
        }

        writeln!(f, "{}", RULE)
    }
}

/// One indented record line
fn format_line(record: &ChangeRecord) -> String {
    let entry_type = if record.is_directory { "フォルダ" } else { "ファイル" };
    let target = match (&record.kind, &record.previous_path) {
        (ChangeKind::Moved, Some(previous)) => {
            format!("{} → {}", previous.display(), record.path.display())
        }
        _ => record.path.display().to_string(),
    };

    format!(
        "  {} [{}] {}",
        record.timestamp.format("%m/%d %H:%M"),
        entry_type,
        target
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 7, 1, h, m, 0).unwrap()
    }

    fn rec(h: u32, m: u32, kind: ChangeKind, path: &str, prev: Option<&str>) -> ChangeRecord {
        ChangeRecord::new(at(h, m), kind, path, false, prev.map(PathBuf::from))
    }

    #[test]
    fn test_empty_report_says_no_changes() {
        let report = Report::build(at(10, 0), Vec::new());
        let text = report.render();

        let expected = format!(
            "\n{rule}\n【定時レポート】 2024年07月01日 10:00\n{rule}\n変化なし\n{rule}\n",
            rule = RULE
        );
        assert_eq!(text, expected);
        assert!(report.is_empty());
    }

    #[test]
    fn test_mixed_batch_groups_and_move_arrow() {
        let records = vec![
            rec(8, 1, ChangeKind::Created, "/a/b.txt", None),
            rec(8, 2, ChangeKind::Deleted, "/a/c.txt", None),
            rec(8, 3, ChangeKind::Moved, "/a/new.txt", Some("/a/old.txt")),
        ];
        let report = Report::build(at(10, 0), records);
        let text = report.render();

        assert_eq!(report.total(), 3);
        assert!(text.contains("検出された変更: 3件"));
        assert!(text.contains("■ 新規作成 (1件)"));
        assert!(text.contains("■ 削除 (1件)"));
        assert!(text.contains("■ 移動・リネーム (1件)"));
        assert!(text.contains("  07/01 08:01 [ファイル] /a/b.txt\n"));
        assert!(text.contains("  07/01 08:03 [ファイル] /a/old.txt → /a/new.txt\n"));
        assert_eq!(text.matches("■ ").count(), 3);
    }

    #[test]
    fn test_groups_follow_first_seen_order() {
        let records = vec![
            rec(8, 0, ChangeKind::Deleted, "/x/1", None),
            rec(8, 1, ChangeKind::Modified, "/x/2", None),
            rec(8, 2, ChangeKind::Deleted, "/x/3", None),
            rec(8, 3, ChangeKind::Created, "/x/4", None),
        ];
        let report = Report::build(at(10, 0), records);

        let kinds: Vec<_> = report.groups().iter().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Deleted, ChangeKind::Modified, ChangeKind::Created]
        );
        assert_eq!(report.groups()[0].records.len(), 2);

        let text = report.render();
        let deleted = text.find("■ 削除 (2件)").unwrap();
        let modified = text.find("■ 更新 (1件)").unwrap();
        let created = text.find("■ 新規作成 (1件)").unwrap();
        assert!(deleted < modified && modified < created);
    }

    #[test]
    fn test_directory_entries_are_labelled() {
        let record = ChangeRecord::new(at(9, 5), ChangeKind::Created, "/a/dir", true, None);
        assert_eq!(format_line(&record), "  07/01 09:05 [フォルダ] /a/dir");
    }
}
