use crate::error::{ErrorKind, ScanError};
use crate::scan::date_picker::{DateCandidate, DateOutcome, ReasonCode, pick_date};
use crate::scan::identifier::extract_identifier;
use crate::scan::walker::{ScanCandidate, WalkLimits, walk};
use crate::scan::warn;
use crate::storage::{RemoteItem, RemoteStore, TextExtractor};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier column value for documents whose name has no TASY number.
pub const MISSING_IDENTIFIER: &str = "NO_IDENTIFIER_IN_NAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoIdentifier,
    DownloadFailed(ErrorKind),
    ExtractionFailed(ErrorKind),
    NoDateFound(ReasonCode),
}

impl FailureReason {
    pub fn code(&self) -> String {
        match self {
            Self::NoIdentifier => "NO_IDENTIFIER".to_string(),
            Self::DownloadFailed(kind) => format!("DOWNLOAD_FAILED:{kind}"),
            Self::ExtractionFailed(kind) => format!("EXTRACTION_FAILED:{kind}"),
            Self::NoDateFound(reason) => reason.as_str().to_string(),
        }
    }

    fn stage(&self) -> &'static str {
        match self {
            Self::NoIdentifier => "identify",
            Self::DownloadFailed(_) => "download",
            Self::ExtractionFailed(_) => "extract",
            Self::NoDateFound(_) => "pick_date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub date: DateCandidate,
    pub year_label: String,
    pub path_hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub identifier: String,
    pub year_label: String,
    pub path_hint: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions<'a> {
    pub max_items: usize,
    pub max_depth: usize,
    pub max_pages: usize,
    pub name_filter: Option<&'a str>,
    pub keep_downloads: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub years: Vec<String>,
    pub results: BTreeMap<String, ResultRecord>,
    pub failures: Vec<FailureRecord>,
    pub processed: usize,
    pub cap_reached: bool,
}

enum Resolution {
    Upsert {
        identifier: String,
        record: ResultRecord,
    },
    Failure(FailureRecord),
}

pub struct Reconciler<'a> {
    store: &'a dyn RemoteStore,
    extractor: &'a dyn TextExtractor,
    options: ReconcileOptions<'a>,
    work_dir: &'a Path,
}

fn parse_year(name: &str) -> Option<u32> {
    if name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// Year folders directly under the root, oldest first.
pub fn year_folders(children: Vec<RemoteItem>) -> Vec<(u32, RemoteItem)> {
    let mut years: Vec<(u32, RemoteItem)> = children
        .into_iter()
        .filter(RemoteItem::is_folder)
        .filter_map(|item| parse_year(&item.name).map(|year| (year, item)))
        .collect();
    years.sort_by_key(|(year, _)| *year);
    years
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        extractor: &'a dyn TextExtractor,
        options: ReconcileOptions<'a>,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            store,
            extractor,
            options,
            work_dir,
        }
    }

    /// Scans every year folder under `root_id` in ascending year order.
    ///
    /// Results are upserted unconditionally, so for a repeated identifier the
    /// last document scanned wins. Per-document problems become failure
    /// records; only root and listing errors abort.
    pub fn run(&self, root_id: &str) -> Result<ScanOutcome, ScanError> {
        self.store
            .get(root_id)
            .map_err(|source| ScanError::RootInaccessible {
                root: root_id.to_string(),
                source,
            })?;

        let root_children =
            self.store
                .list_children(root_id, None)
                .map_err(|source| ScanError::ListingFailed {
                    folder: root_id.to_string(),
                    source,
                })?;

        let years = year_folders(root_children);
        let mut outcome = ScanOutcome {
            years: years.iter().map(|(_, folder)| folder.name.clone()).collect(),
            ..ScanOutcome::default()
        };

        for (_, folder) in &years {
            if outcome.processed >= self.options.max_items {
                outcome.cap_reached = true;
                break;
            }

            let limits = WalkLimits {
                max_depth: self.options.max_depth,
                max_items: self.options.max_items - outcome.processed,
                name_filter: self.options.name_filter,
            };
            let walked = walk(self.store, &folder.id, &folder.name, &limits)?;

            for candidate in &walked.candidates {
                match self.resolve(candidate, outcome.processed) {
                    Resolution::Upsert { identifier, record } => {
                        outcome.results.insert(identifier, record);
                    }
                    Resolution::Failure(failure) => outcome.failures.push(failure),
                }
                outcome.processed += 1;
            }

            if walked.truncated {
                outcome.cap_reached = true;
                break;
            }
        }

        Ok(outcome)
    }

    /// Downloads are named by scan ordinal; store ids can be arbitrarily long.
    fn local_path(&self, ordinal: usize) -> PathBuf {
        self.work_dir.join(format!("{ordinal:06}.pdf"))
    }

    fn fail(candidate: &ScanCandidate, identifier: &str, reason: FailureReason, err: &str) -> Resolution {
        warn::emit(
            &reason.code(),
            reason.stage(),
            &candidate.item.id,
            &candidate.path_hint,
            identifier,
            err,
        );
        Resolution::Failure(FailureRecord {
            identifier: identifier.to_string(),
            year_label: candidate.year_label.clone(),
            path_hint: candidate.path_hint.clone(),
            reason,
        })
    }

    fn resolve(&self, candidate: &ScanCandidate, ordinal: usize) -> Resolution {
        let Some(identifier) = extract_identifier(&candidate.item.name) else {
            return Self::fail(candidate, MISSING_IDENTIFIER, FailureReason::NoIdentifier, "");
        };

        let local = self.local_path(ordinal);
        if let Err(err) = self.store.download(&candidate.item.id, &local) {
            let _ = fs::remove_file(&local);
            return Self::fail(
                candidate,
                &identifier,
                FailureReason::DownloadFailed(err.kind),
                &err.message,
            );
        }

        let extracted = self.extractor.extract_text(&local, self.options.max_pages);
        if !self.options.keep_downloads {
            let _ = fs::remove_file(&local);
        }
        let text = match extracted {
            Ok(text) => text,
            Err(err) => {
                return Self::fail(
                    candidate,
                    &identifier,
                    FailureReason::ExtractionFailed(err.kind),
                    &err.message,
                );
            }
        };

        match pick_date(&text, &candidate.item.name) {
            DateOutcome::Found(date) => Resolution::Upsert {
                identifier,
                record: ResultRecord {
                    date,
                    year_label: candidate.year_label.clone(),
                    path_hint: candidate.path_hint.clone(),
                },
            },
            DateOutcome::Missing(reason) => Self::fail(
                candidate,
                &identifier,
                FailureReason::NoDateFound(reason),
                "",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilityError;
    use crate::scan::walker::tests::MemoryStore;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    /// Wraps the in-memory tree; downloads write a marker file unless the id
    /// is listed as failing.
    #[derive(Default)]
    struct FakeStore {
        tree: MemoryStore,
        failing_downloads: BTreeSet<String>,
    }

    impl RemoteStore for FakeStore {
        fn get(&self, id: &str) -> Result<RemoteItem, CapabilityError> {
            self.tree.get(id)
        }

        fn list_children(
            &self,
            parent_id: &str,
            name_filter: Option<&str>,
        ) -> Result<Vec<RemoteItem>, CapabilityError> {
            self.tree.list_children(parent_id, name_filter)
        }

        fn download(&self, id: &str, dest: &Path) -> Result<(), CapabilityError> {
            if self.failing_downloads.contains(id) {
                return Err(CapabilityError::new(ErrorKind::Http, "503 backend error"));
            }
            fs::write(dest, id)?;
            Ok(())
        }
    }

    /// Returns the text registered for the item id written by `FakeStore`.
    #[derive(Default)]
    struct FakeExtractor {
        texts: BTreeMap<String, String>,
    }

    impl TextExtractor for FakeExtractor {
        fn extract_text(&self, path: &Path, _max_pages: usize) -> Result<String, CapabilityError> {
            let id = fs::read_to_string(path)?;
            self.texts
                .get(&id)
                .cloned()
                .ok_or_else(|| CapabilityError::new(ErrorKind::ToolFailed, "not a pdf"))
        }
    }

    fn options(max_items: usize) -> ReconcileOptions<'static> {
        ReconcileOptions {
            max_items,
            max_depth: 10,
            max_pages: 2,
            name_filter: Some("tasy"),
            keep_downloads: true,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn two_year_fixture() -> (FakeStore, FakeExtractor) {
        let mut store = FakeStore::default();
        let mut extractor = FakeExtractor::default();
        store.tree.folder("root", "y25", "2025");
        store.tree.folder("root", "misc", "Modelos");
        store.tree.folder("root", "y24", "2024");
        store.tree.file("y24", "a24", "TASY-0042.pdf");
        store.tree.file("y25", "a25", "tasy 42 revisado.pdf");
        extractor
            .texts
            .insert("a24".into(), "Data: 10/03/2024\n".into());
        extractor
            .texts
            .insert("a25".into(), "Laudo emitido em 02/02/2025\n".into());
        (store, extractor)
    }

    #[test]
    fn later_year_overwrites_earlier_year() {
        let (store, extractor) = two_year_fixture();
        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(300), tmp.path())
            .run("root")
            .expect("run");

        assert_eq!(outcome.years, vec!["2024", "2025"]);
        assert_eq!(outcome.results.len(), 1);
        let record = &outcome.results["42"];
        assert_eq!(record.date.date, ymd(2025, 2, 2));
        assert_eq!(record.date.reason, ReasonCode::KeywordDate);
        assert_eq!(record.year_label, "2025");
        assert_eq!(record.path_hint, "2025/tasy 42 revisado.pdf");
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.processed, 2);
        assert!(!outcome.cap_reached);
    }

    #[test]
    fn later_year_wins_even_with_older_date() {
        let (store, mut extractor) = two_year_fixture();
        extractor
            .texts
            .insert("a25".into(), "Laudo emitido em 01/01/2019\n".into());
        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(300), tmp.path())
            .run("root")
            .expect("run");
        assert_eq!(outcome.results["42"].date.date, ymd(2019, 1, 1));
    }

    #[test]
    fn every_candidate_resolves_to_exactly_one_entry() {
        let mut store = FakeStore::default();
        let mut extractor = FakeExtractor::default();
        store.tree.folder("root", "y", "2024");
        store.tree.file("y", "ok", "tasy-10.pdf");
        store.tree.file("y", "noid", "relatorio geral.pdf");
        store.tree.file("y", "dl", "tasy-11.pdf");
        store.tree.file("y", "bad", "tasy-12.pdf");
        store.tree.file("y", "empty", "tasy-13.pdf");
        store.tree.file("y", "nodate", "tasy-14.pdf");
        store.failing_downloads.insert("dl".into());
        extractor.texts.insert("ok".into(), "Data: 01/02/2024".into());
        extractor.texts.insert("empty".into(), "  \n".into());
        extractor.texts.insert("nodate".into(), "sem datas".into());

        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(300), tmp.path())
            .run("root")
            .expect("run");

        assert_eq!(outcome.processed, 6);
        assert_eq!(outcome.results.len() + outcome.failures.len(), 6);
        let codes: Vec<(String, String)> = outcome
            .failures
            .iter()
            .map(|f| (f.identifier.clone(), f.reason.code()))
            .collect();
        assert_eq!(
            codes,
            vec![
                (MISSING_IDENTIFIER.to_string(), "NO_IDENTIFIER".to_string()),
                ("11".to_string(), "DOWNLOAD_FAILED:http".to_string()),
                ("12".to_string(), "EXTRACTION_FAILED:tool_failed".to_string()),
                ("13".to_string(), "NO_TEXT".to_string()),
                ("14".to_string(), "NO_DATE".to_string()),
            ]
        );
        assert_eq!(outcome.results["10"].date.reason, ReasonCode::HeaderDate);
    }

    #[test]
    fn cap_stops_mid_year_and_skips_later_years() {
        let mut store = FakeStore::default();
        let mut extractor = FakeExtractor::default();
        store.tree.folder("root", "y24", "2024");
        store.tree.folder("root", "y25", "2025");
        store.tree.file("y24", "a", "tasy-01.pdf");
        store.tree.file("y24", "b", "tasy-02.pdf");
        store.tree.file("y25", "c", "tasy-03.pdf");
        for id in ["a", "b", "c"] {
            extractor.texts.insert(id.into(), "Data: 01/01/2024".into());
        }

        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(2), tmp.path())
            .run("root")
            .expect("run");

        assert_eq!(outcome.processed, 2);
        assert!(outcome.cap_reached);
        assert_eq!(outcome.results.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert!(!store.tree.listed.borrow().contains(&"y25".to_string()));
    }

    #[test]
    fn cap_met_exactly_by_the_last_document_is_not_reported() {
        let (store, extractor) = two_year_fixture();
        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(2), tmp.path())
            .run("root")
            .expect("run");
        assert_eq!(outcome.processed, 2);
        assert!(!outcome.cap_reached);
    }

    #[test]
    fn within_a_year_the_last_folder_popped_wins() {
        let mut store = FakeStore::default();
        let mut extractor = FakeExtractor::default();
        store.tree.folder("root", "y", "2024");
        store.tree.folder("y", "a", "setor-a");
        store.tree.folder("y", "b", "setor-b");
        store.tree.file("a", "in-a", "tasy-7.pdf");
        store.tree.file("b", "in-b", "tasy-7.pdf");
        extractor.texts.insert("in-a".into(), "Data: 01/01/2020".into());
        extractor.texts.insert("in-b".into(), "Data: 01/01/2024".into());

        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(300), tmp.path())
            .run("root")
            .expect("run");

        // setor-b is listed last, so it is popped first and setor-a overwrites it.
        let record = &outcome.results["7"];
        assert_eq!(record.path_hint, "2024/setor-a/tasy-7.pdf");
        assert_eq!(record.date.date, ymd(2020, 1, 1));
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn long_store_ids_still_download() {
        let mut store = FakeStore::default();
        let mut extractor = FakeExtractor::default();
        let long_id = format!("/{}/tasy 123.pdf", "pasta-com-nome-bem-comprido/".repeat(20));
        store.tree.folder("root", "y", "2024");
        store.tree.file("y", &long_id, "tasy 123.pdf");
        extractor
            .texts
            .insert(long_id.clone(), "Data: 01/02/2024".into());

        let tmp = tempdir().expect("tempdir");
        let outcome = Reconciler::new(&store, &extractor, options(300), tmp.path())
            .run("root")
            .expect("run");
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.results["123"].date.date, ymd(2024, 2, 1));
    }

    #[test]
    fn documents_beyond_depth_appear_nowhere() {
        let mut store = FakeStore::default();
        let mut extractor = FakeExtractor::default();
        store.tree.folder("root", "y", "2024");
        store.tree.folder("y", "d1", "setor");
        store.tree.folder("d1", "d2", "sub");
        store.tree.file("d1", "in", "tasy-20.pdf");
        store.tree.file("d2", "deep", "tasy-21.pdf");
        extractor.texts.insert("in".into(), "Data: 01/01/2024".into());
        extractor.texts.insert("deep".into(), "Data: 01/01/2024".into());

        let tmp = tempdir().expect("tempdir");
        let opts = ReconcileOptions {
            max_depth: 1,
            ..options(300)
        };
        let outcome = Reconciler::new(&store, &extractor, opts, tmp.path())
            .run("root")
            .expect("run");

        assert!(outcome.results.contains_key("20"));
        assert!(!outcome.results.contains_key("21"));
        assert!(outcome.failures.iter().all(|f| f.identifier != "21"));
    }

    #[test]
    fn inaccessible_root_is_fatal() {
        let store = FakeStore::default();
        let extractor = FakeExtractor::default();
        let tmp = tempdir().expect("tempdir");
        let err = Reconciler::new(&store, &extractor, options(10), tmp.path())
            .run("nowhere")
            .expect_err("fatal");
        assert_eq!(err.code(), "ROOT_INACCESSIBLE");
    }

    #[test]
    fn downloads_are_removed_when_retention_is_off() {
        let (store, extractor) = two_year_fixture();
        let tmp = tempdir().expect("tempdir");
        let opts = ReconcileOptions {
            keep_downloads: false,
            ..options(300)
        };
        Reconciler::new(&store, &extractor, opts, tmp.path())
            .run("root")
            .expect("run");
        assert_eq!(fs::read_dir(tmp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn year_folders_need_exactly_four_digits() {
        let mut store = MemoryStore::default();
        store.folder("root", "a", "2026");
        store.folder("root", "b", "24");
        store.folder("root", "c", "2023");
        store.folder("root", "d", "2024 antigo");
        store.file("root", "e", "2025");
        let children = store.list_children("root", None).expect("list");
        let years: Vec<u32> = year_folders(children).into_iter().map(|(y, _)| y).collect();
        assert_eq!(years, vec![2023, 2026]);
    }
}
