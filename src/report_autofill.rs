//! # Report Autofill
//!
//! Glue between a saved report and the to-do store. The caller invokes
//! [`autofill_required_items`] after the report is durably saved; persistence
//! goes through a [`RequiredItemSink`] so the storage layer stays outside this
//! crate. [`MemorySink`] is the in-process implementation.

use crate::localization::LocalizationManager;
use crate::need_config::{AutofillPolicy, AutofillSettings};
use crate::need_types::{NeededItem, ReportText};
use crate::text_processing::NeedExtractor;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Deal name used for reports not attached to a deal
pub const UNASSIGNED_DEAL: &str = "案件未指定";

/// Separator between accumulated note lines of an upserted record
pub const NOTE_LINE_SEPARATOR: &str = "\n";

/// A saved report, already resolved from the caller's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: i64,
    /// Author of the report, also the assignee of generated to-dos
    pub author: String,
    pub report_date: Option<NaiveDate>,
    pub deal_name: Option<String>,
    pub text: ReportText,
}

/// One to-do summarizing every item found in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoBatch {
    pub title: String,
    pub assignee: String,
    /// One bullet line per item
    pub body: String,
    pub is_done: bool,
}

/// One required-item record keyed by (report, name, unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredItemRecord {
    pub report_id: i64,
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub note: String,
}

/// What an autofill run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AutofillOutcome {
    pub items_found: usize,
    pub written: usize,
    pub removed: usize,
}

/// Storage for auto-generated to-dos
pub trait RequiredItemSink {
    /// Delete batches with this assignee and title, returning how many were removed
    fn delete_batches(&mut self, assignee: &str, title: &str) -> Result<usize>;

    fn create_batch(&mut self, batch: TodoBatch) -> Result<()>;

    /// Insert or accumulate into the record for (report, name, unit);
    /// returns `true` when a new record was created
    fn upsert_item(&mut self, report_id: i64, item: &NeededItem, note_line: &str) -> Result<bool>;
}

/// In-memory sink
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Vec<TodoBatch>,
    items: HashMap<(i64, String, Option<String>), RequiredItemRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[TodoBatch] {
        &self.batches
    }

    pub fn item(&self, report_id: i64, name: &str, unit: Option<&str>) -> Option<&RequiredItemRecord> {
        self.items
            .get(&(report_id, name.to_string(), unit.map(str::to_string)))
    }

    /// Records sorted by (report, name) for stable output
    pub fn items(&self) -> Vec<&RequiredItemRecord> {
        let mut records: Vec<&RequiredItemRecord> = self.items.values().collect();
        records.sort_by(|a, b| (a.report_id, &a.name, &a.unit).cmp(&(b.report_id, &b.name, &b.unit)));
        records
    }
}

impl RequiredItemSink for MemorySink {
    fn delete_batches(&mut self, assignee: &str, title: &str) -> Result<usize> {
        let before = self.batches.len();
        self.batches
            .retain(|batch| !(batch.assignee == assignee && batch.title == title));
        Ok(before - self.batches.len())
    }

    fn create_batch(&mut self, batch: TodoBatch) -> Result<()> {
        self.batches.push(batch);
        Ok(())
    }

    fn upsert_item(&mut self, report_id: i64, item: &NeededItem, note_line: &str) -> Result<bool> {
        let key = (report_id, item.name.clone(), item.unit.clone());
        match self.items.get_mut(&key) {
            Some(record) => {
                if let Some(quantity) = item.quantity {
                    record.quantity = Some(record.quantity.unwrap_or(0.0) + quantity);
                }
                if !record.note.is_empty() {
                    record.note.push_str(NOTE_LINE_SEPARATOR);
                }
                record.note.push_str(note_line);
                Ok(false)
            }
            None => {
                self.items.insert(
                    key,
                    RequiredItemRecord {
                        report_id,
                        name: item.name.clone(),
                        quantity: item.quantity,
                        unit: item.unit.clone(),
                        note: note_line.to_string(),
                    },
                );
                Ok(true)
            }
        }
    }
}

/// Extract needed items from a saved report and persist them through `sink`
pub fn autofill_required_items(
    extractor: &NeedExtractor,
    report: &ReportRecord,
    sink: &mut dyn RequiredItemSink,
    settings: &AutofillSettings,
    localization: &LocalizationManager,
) -> Result<AutofillOutcome> {
    autofill_required_items_at(extractor, report, sink, settings, localization, Local::now())
}

/// Same as [`autofill_required_items`] with an explicit clock
pub fn autofill_required_items_at(
    extractor: &NeedExtractor,
    report: &ReportRecord,
    sink: &mut dyn RequiredItemSink,
    settings: &AutofillSettings,
    localization: &LocalizationManager,
    now: DateTime<Local>,
) -> Result<AutofillOutcome> {
    if !settings.enabled {
        debug!("Autofill disabled, skipping report {}", report.id);
        return Ok(AutofillOutcome::default());
    }

    let text = report.text.compose();
    if text.is_empty() {
        info!("Report {} has no text to analyze, skipping autofill", report.id);
        return Ok(AutofillOutcome::default());
    }

    let items = extractor
        .extract(&text)
        .with_context(|| format!("Failed to extract needed items from report {}", report.id))?;
    info!("Report {}: {} needed items extracted", report.id, items.len());

    let outcome = match settings.policy {
        AutofillPolicy::ReplaceBatch => {
            replace_batch(report, &items, sink, &settings.locale, localization, now)?
        }
        AutofillPolicy::UpsertByKey => {
            upsert_items(report, &items, sink, &settings.locale, localization, now)?
        }
    };

    Ok(AutofillOutcome {
        items_found: items.len(),
        ..outcome
    })
}

fn replace_batch(
    report: &ReportRecord,
    items: &[NeededItem],
    sink: &mut dyn RequiredItemSink,
    locale: &str,
    localization: &LocalizationManager,
    now: DateTime<Local>,
) -> Result<AutofillOutcome> {
    let date = report.report_date.unwrap_or_else(|| now.date_naive());
    let date_label = date.format("%Y/%m/%d").to_string();
    let title = localization.get_message_with_args("todo-batch-title", locale, &[("date", date_label.as_str())]);

    let removed = sink
        .delete_batches(&report.author, &title)
        .with_context(|| format!("Failed to delete earlier batch '{}'", title))?;
    if removed > 0 {
        info!("Removed {} earlier batch(es) titled '{}'", removed, title);
    }

    if items.is_empty() {
        debug!("No items found, no batch created for report {}", report.id);
        return Ok(AutofillOutcome {
            removed,
            ..AutofillOutcome::default()
        });
    }

    let names: BTreeSet<&str> = items.iter().map(|item| item.name.as_str()).collect();
    let body = names
        .iter()
        .map(|name| localization.get_message_with_args("todo-batch-line", locale, &[("name", *name)]))
        .collect::<Vec<_>>()
        .join("\n");

    sink.create_batch(TodoBatch {
        title: title.clone(),
        assignee: report.author.clone(),
        body,
        is_done: false,
    })
    .with_context(|| format!("Failed to create batch '{}'", title))?;
    info!("Created batch '{}' with {} lines", title, names.len());

    Ok(AutofillOutcome {
        written: 1,
        removed,
        ..AutofillOutcome::default()
    })
}

fn upsert_items(
    report: &ReportRecord,
    items: &[NeededItem],
    sink: &mut dyn RequiredItemSink,
    locale: &str,
    localization: &LocalizationManager,
    now: DateTime<Local>,
) -> Result<AutofillOutcome> {
    let timestamp = now.format("%Y-%m-%d %H:%M").to_string();
    let report_id = report.id.to_string();
    let mut written = 0;

    for item in items {
        let note_line = localization.get_message_with_args(
            "autofill-note",
            locale,
            &[
                ("timestamp", timestamp.as_str()),
                ("report_id", report_id.as_str()),
                ("source", item.note.as_deref().unwrap_or_default()),
            ],
        );
        let created = sink
            .upsert_item(report.id, item, &note_line)
            .with_context(|| format!("Failed to upsert '{}' for report {}", item.name, report.id))?;
        debug!(
            "{} '{}' for report {}",
            if created { "Created" } else { "Accumulated" },
            item.name,
            report.id
        );
        written += 1;
    }

    Ok(AutofillOutcome {
        written,
        ..AutofillOutcome::default()
    })
}

/// Needed item names grouped by deal, de-duplicated and sorted per deal
pub fn summarize_by_deal<'a, I>(extractor: &NeedExtractor, reports: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a ReportRecord>,
{
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for report in reports {
        let deal = report
            .deal_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNASSIGNED_DEAL)
            .to_string();
        let names = match extractor.extract_names(&report.text.compose()) {
            Ok(names) => names,
            Err(err) => {
                warn!("Skipping report {} in summary: {}", report.id, err);
                continue;
            }
        };
        grouped.entry(deal).or_default().extend(names);
    }

    grouped
        .into_iter()
        .filter(|(_, names)| !names.is_empty())
        .map(|(deal, names)| (deal, names.into_iter().collect()))
        .collect()
}

/// Read a report body from a file; the whole content becomes the primary text
pub fn read_report_text(path: &Path) -> Result<ReportText> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report text from {}", path.display()))?;
    Ok(ReportText::new(&content, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(id: i64, primary: &str, secondary: &str) -> ReportRecord {
        ReportRecord {
            id,
            author: "tanaka".to_string(),
            report_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            deal_name: None,
            text: ReportText::new(primary, secondary),
        }
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap()
    }

    fn run(
        report: &ReportRecord,
        sink: &mut MemorySink,
        settings: &AutofillSettings,
    ) -> AutofillOutcome {
        let localization = LocalizationManager::new().unwrap();
        autofill_required_items_at(
            &NeedExtractor::new(),
            report,
            sink,
            settings,
            &localization,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_created_with_sorted_lines() {
        let mut sink = MemorySink::new();
        let outcome = run(
            &report(1, "配線工事", "USBメモリとHDMIケーブルが必要"),
            &mut sink,
            &AutofillSettings::default(),
        );

        assert_eq!(outcome, AutofillOutcome { items_found: 2, written: 1, removed: 0 });
        let batch = &sink.batches()[0];
        assert_eq!(batch.title, "2024/05/01の日報から自動作成");
        assert_eq!(batch.assignee, "tanaka");
        assert_eq!(batch.body, "・HDMIケーブル\n・USBメモリ");
        assert!(!batch.is_done);
    }

    #[test]
    fn test_resave_replaces_batch() {
        let mut sink = MemorySink::new();
        let settings = AutofillSettings::default();
        run(&report(1, "脚立が必要", ""), &mut sink, &settings);
        let outcome = run(&report(1, "脚立と養生テープが必要", ""), &mut sink, &settings);

        assert_eq!(outcome.removed, 1);
        assert_eq!(sink.batches().len(), 1);
        assert_eq!(sink.batches()[0].body, "・脚立\n・養生テープ");
    }

    #[test]
    fn test_no_items_removes_without_creating() {
        let mut sink = MemorySink::new();
        let settings = AutofillSettings::default();
        run(&report(1, "脚立が必要", ""), &mut sink, &settings);
        let outcome = run(&report(1, "特になし", ""), &mut sink, &settings);

        assert_eq!(outcome, AutofillOutcome { items_found: 0, written: 0, removed: 1 });
        assert!(sink.batches().is_empty());
    }

    #[test]
    fn test_empty_text_and_disabled_are_noops() {
        let mut sink = MemorySink::new();
        run(&report(1, "脚立が必要", ""), &mut sink, &AutofillSettings::default());

        let outcome = run(&report(1, "  ", "\n"), &mut sink, &AutofillSettings::default());
        assert_eq!(outcome, AutofillOutcome::default());

        let disabled = AutofillSettings {
            enabled: false,
            ..AutofillSettings::default()
        };
        let outcome = run(&report(1, "養生テープが必要", ""), &mut sink, &disabled);
        assert_eq!(outcome, AutofillOutcome::default());
        assert_eq!(sink.batches().len(), 1);
    }

    #[test]
    fn test_missing_date_uses_today() {
        let mut sink = MemorySink::new();
        let mut undated = report(1, "脚立が必要", "");
        undated.report_date = None;
        run(&undated, &mut sink, &AutofillSettings::default());
        assert_eq!(sink.batches()[0].title, "2024/05/01の日報から自動作成");
    }

    #[test]
    fn test_upsert_accumulates_quantities_and_notes() {
        let mut sink = MemorySink::new();
        let settings = AutofillSettings {
            policy: AutofillPolicy::UpsertByKey,
            ..AutofillSettings::default()
        };
        run(&report(7, "LANケーブル2本が必要", ""), &mut sink, &settings);
        let outcome = run(&report(7, "LANケーブル3本が必要", ""), &mut sink, &settings);

        assert_eq!(outcome.written, 1);
        let record = sink.item(7, "LANケーブル", Some("本")).unwrap();
        assert_eq!(record.quantity, Some(5.0));
        assert_eq!(
            record.note,
            "[自動抽出] 2024-05-01 18:30 / report_id=7 / 原文: LANケーブル2本が必要\n\
             [自動抽出] 2024-05-01 18:30 / report_id=7 / 原文: LANケーブル3本が必要"
        );
    }

    #[test]
    fn test_english_titles() {
        let mut sink = MemorySink::new();
        let settings = AutofillSettings {
            locale: "en".to_string(),
            ..AutofillSettings::default()
        };
        run(&report(1, "脚立が必要", ""), &mut sink, &settings);
        assert_eq!(sink.batches()[0].title, "Auto-created from the daily report of 2024/05/01");
        assert_eq!(sink.batches()[0].body, "- 脚立");
    }

    #[test]
    fn test_summarize_by_deal() {
        let mut with_deal = report(1, "脚立が必要", "");
        with_deal.deal_name = Some("A社改修".to_string());
        let mut same_deal = report(2, "養生テープと脚立が必要", "");
        same_deal.deal_name = Some("A社改修".to_string());
        let no_deal = report(3, "テスターが必要", "");
        let nothing = report(4, "特になし", "");

        let summary = summarize_by_deal(
            &NeedExtractor::new(),
            &[with_deal, same_deal, no_deal, nothing],
        );

        assert_eq!(summary.len(), 2);
        assert_eq!(summary["A社改修"], vec!["脚立".to_string(), "養生テープ".to_string()]);
        assert_eq!(summary[UNASSIGNED_DEAL], vec!["テスター".to_string()]);
    }
}
