// 📋 Roster Import - CSV -> students
// Idempotent: re-importing the same roster skips names already registered.
//
// Expected shape:
//   name
//   Asha
//   Ben

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::LedgerError;
use crate::ledger::Ledger;

#[derive(Debug, Deserialize)]
struct RosterRow {
    name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterImport {
    pub created: usize,
    pub duplicates: usize,
}

pub fn import_roster(ledger: &mut Ledger, csv_path: &Path) -> Result<RosterImport> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open roster {}", csv_path.display()))?;
    import_roster_from_reader(ledger, file)
}

pub fn import_roster_from_reader<R: Read>(ledger: &mut Ledger, reader: R) -> Result<RosterImport> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut summary = RosterImport::default();

    for (line, result) in rdr.deserialize::<RosterRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to read roster row {}", line + 1))?;

        match ledger.create_student(&row.name) {
            Ok(_) => summary.created += 1,
            Err(LedgerError::DuplicateName(_)) => summary.duplicates += 1,
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to register '{}'", row.name))
            }
        }
    }

    info!(
        created = summary.created,
        duplicates = summary.duplicates,
        "roster imported"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    #[test]
    fn test_import_twice_is_idempotent() {
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default()).unwrap();
        let roster = "name\nAsha\nBen\n Chen \n";

        let first = import_roster_from_reader(&mut ledger, roster.as_bytes()).unwrap();
        assert_eq!(first, RosterImport { created: 3, duplicates: 0 });

        let second = import_roster_from_reader(&mut ledger, roster.as_bytes()).unwrap();
        assert_eq!(second, RosterImport { created: 0, duplicates: 3 });

        let names: Vec<String> = ledger
            .list_students()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Asha", "Ben", "Chen"]);

        println!("✅ Roster idempotency test PASSED");
    }

    #[test]
    fn test_import_rejects_empty_name() {
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default()).unwrap();
        let roster = "name\nAsha\n\"\"\n";

        assert!(import_roster_from_reader(&mut ledger, roster.as_bytes()).is_err());
        // the row before the bad one was committed on its own
        assert_eq!(ledger.list_students().unwrap().len(), 1);
    }

    #[test]
    fn test_import_missing_file() {
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default()).unwrap();
        assert!(import_roster(&mut ledger, Path::new("/nonexistent/roster.csv")).is_err());
    }
}
