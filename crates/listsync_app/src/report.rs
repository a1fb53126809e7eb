use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use listsync_core::{IntentAction, MutationIntent, SourceId, SourceRunResult};
use serde::Serialize;

/// JSON document handed to whatever applies the intents.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub generated_at: DateTime<Utc>,
    pub results: &'a [SourceRunResult],
    pub deferred: &'a [SourceId],
    pub intents: &'a [MutationIntent],
}

impl Report<'_> {
    pub fn count(&self, wanted: fn(&IntentAction) -> bool) -> usize {
        self.intents
            .iter()
            .filter(|intent| wanted(&intent.action))
            .count()
    }

    pub fn write(&self, output: Option<&Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing report")?;
        match output {
            Some(path) => fs::write(path, json + "\n")
                .with_context(|| format!("writing report {}", path.display())),
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}").context("writing report to stdout")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{TimeZone, Utc};
    use listsync_core::{
        AddDefaults, ImportListItem, IntentAction, MutationIntent, SkipReason, SourceRunResult,
    };
    use tempfile::TempDir;

    use super::Report;

    fn intent(action: IntentAction) -> MutationIntent {
        MutationIntent {
            action,
            item: ImportListItem::new("Frank Herbert", "58", "Dune", Some("234225".into()), 1),
            defaults: AddDefaults::default(),
        }
    }

    #[test]
    fn report_is_written_as_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("intents.json");
        let results = [SourceRunResult::success(1, 3, 2)];
        let intents = [
            intent(IntentAction::AddAuthor),
            intent(IntentAction::AddBook),
            intent(IntentAction::Skip(SkipReason::AlreadyInLibrary)),
        ];
        let report = Report {
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            results: &results,
            deferred: &[4],
            intents: &intents,
        };
        assert_eq!(report.count(|action| matches!(action, IntentAction::Skip(_))), 1);

        report.write(Some(&path)).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["intents"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["intents"][0]["action"], "AddAuthor");
        assert_eq!(value["intents"][1]["item"]["book_title"], "Dune");
        assert_eq!(value["results"][0]["status"], "Success");
        assert_eq!(value["deferred"][0], 4);
    }
}
