//! CSV export of a (sorted and filtered) roster.

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::{error::BackendError, roster::RosterEntry};

pub const HEADER: [&str; 8] = [
    "ID",
    "Name",
    "Role",
    "Section",
    "Competitions",
    "Church",
    "Secretary",
    "Registered",
];

pub fn export_filename(today: NaiveDate) -> String {
    format!("participants-{}.csv", today.format("%Y-%m-%d"))
}

fn record(entry: &RosterEntry) -> [String; 8] {
    [
        entry.participant_id.clone(),
        entry.name.clone(),
        entry.role.clone(),
        entry.section.clone().unwrap_or_default(),
        entry.competitions.join("; "),
        entry.church.clone().unwrap_or_default(),
        entry.secretary.clone().unwrap_or_default(),
        entry.registered.format("%-m/%-d/%Y").to_string(),
    ]
}

/// Every field is quoted, including the header.
pub fn to_csv(entries: &[RosterEntry]) -> Result<String, BackendError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let csv_err = |e: csv::Error| BackendError::Unknown(format!("csv: {e}"));

    writer.write_record(HEADER).map_err(csv_err)?;
    for entry in entries {
        writer.write_record(record(entry)).map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BackendError::Unknown(format!("csv: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| BackendError::Unknown(format!("csv: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{export_filename, to_csv};
    use crate::roster::tests::entry;

    const HEADER_LINE: &str = "\"ID\",\"Name\",\"Role\",\"Section\",\"Competitions\",\"Church\",\"Secretary\",\"Registered\"\n";

    #[test]
    fn no_rows_is_just_the_header() {
        assert_eq!(to_csv(&[]).unwrap(), HEADER_LINE);
    }

    #[test]
    fn rows_are_quoted_and_joined() {
        let mut teacher = entry("T001", "Mary \"Mo\" Jones", 0);
        teacher.competitions = vec!["quiz".to_string(), "memory verse".to_string()];
        teacher.secretary = None;

        let csv = to_csv(&[teacher]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().map(|l| format!("{l}\n")).as_deref(), Some(HEADER_LINE));
        assert_eq!(
            lines.next(),
            Some(
                "\"T001\",\"Mary \"\"Mo\"\" Jones\",\"teacher\",\"\",\"quiz; memory verse\",\"Grace, Kochi\",\"\",\"6/1/2025\""
            )
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn filename_carries_the_date() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(export_filename(day), "participants-2025-03-09.csv");
    }
}
