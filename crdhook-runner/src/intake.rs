//! Reading intake records from CSV and JSON, and writing the CSV template.

use crdhook_core::{CoreError, IntakeRecord};
use std::io::{Read, Write};
use std::path::Path;

/// Column order of the intake spreadsheet.
pub const COLUMNS: [&str; 12] = [
    "firstName",
    "middleName",
    "lastName",
    "dateOfBirth",
    "subscriberId",
    "providerNpi",
    "organizationName",
    "practitionerFirstName",
    "practitionerLastName",
    "diagnosisCode",
    "cptCode",
    "serviceLocation",
];

/// Read every row of an intake CSV. Unknown columns are ignored, missing
/// columns and empty cells become `None`.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<IntakeRecord>, CoreError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize::<IntakeRecord>() {
        records.push(blank_to_none(row?));
    }
    Ok(records)
}

pub fn read_records_file(path: impl AsRef<Path>) -> Result<Vec<IntakeRecord>, CoreError> {
    let file = std::fs::File::open(path)?;
    read_records(file)
}

/// Read a single record from a JSON object.
pub fn read_record_json(path: impl AsRef<Path>) -> Result<IntakeRecord, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let record: IntakeRecord = serde_json::from_str(&content)?;
    Ok(blank_to_none(record))
}

/// Write the column header plus two example rows.
pub fn write_template<W: Write>(writer: W) -> Result<(), CoreError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COLUMNS)?;
    csv_writer.write_record([
        "John", "", "Doe", "1980-01-15", "SUB123456", "1234567890", "City Medical Center", "",
        "", "J45.909", "99213", "",
    ])?;
    csv_writer.write_record([
        "Jane", "M", "Smith", "1975-06-30", "SUB654321", "1987654321", "", "Alice", "Jones",
        "E11.9", "93000", "Main Street Clinic",
    ])?;
    csv_writer.flush()?;
    Ok(())
}

fn blank_to_none(mut record: IntakeRecord) -> IntakeRecord {
    for field in [
        &mut record.first_name,
        &mut record.middle_name,
        &mut record.last_name,
        &mut record.date_of_birth,
        &mut record.subscriber_id,
        &mut record.provider_npi,
        &mut record.organization_name,
        &mut record.practitioner_first_name,
        &mut record.practitioner_last_name,
        &mut record.diagnosis_code,
        &mut record.cpt_code,
        &mut record.service_location,
    ] {
        if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
            *field = None;
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdhook_core::{validate, ProviderIdentity};

    #[test]
    fn test_read_records_maps_columns() {
        let csv = "\
firstName,middleName,lastName,dateOfBirth,subscriberId,providerNpi,organizationName,practitionerFirstName,practitionerLastName,diagnosisCode,cptCode
John,,Doe,1980-01-15,SUB123456,1234567890,City Medical Center,,,J45.909,99213
Jane,M,Smith,1975-06-30,,1987654321,,Alice,Jones,E11.9,93000
";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let john = &records[0];
        assert_eq!(john.first_name.as_deref(), Some("John"));
        assert!(john.middle_name.is_none());
        assert_eq!(john.diagnosis_code.as_deref(), Some("J45.909"));
        assert!(john.service_location.is_none());

        let jane = validate(&records[1]).unwrap();
        assert!(jane.patient.subscriber_id.is_none());
        assert_eq!(
            jane.provider.identity,
            ProviderIdentity::Practitioner {
                first: "Alice".to_string(),
                last: "Jones".to_string(),
            }
        );
    }

    #[test]
    fn test_template_round_trips_through_reader() {
        let mut out = Vec::new();
        write_template(&mut out).unwrap();

        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with("firstName,middleName,lastName"));

        let records = read_records(out.as_slice()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| validate(r).is_ok()));
        assert_eq!(records[1].service_location.as_deref(), Some("Main Street Clinic"));
    }

    #[test]
    fn test_read_record_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(
            &path,
            r#"{"firstName": "John", "lastName": "Doe", "providerNpi": "1234567890",
                "organizationName": "City Medical Center", "diagnosisCode": "J45.909",
                "cptCode": "99213", "subscriberId": "  "}"#,
        )
        .unwrap();

        let record = read_record_json(&path).unwrap();
        assert_eq!(record.last_name.as_deref(), Some("Doe"));
        assert!(record.subscriber_id.is_none());
    }
}
