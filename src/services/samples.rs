//! Downloadable CSV templates, one per import kind

use crate::types::ImportKind;

const PEOPLE_SAMPLE: &str = "full_name,phone,email,blood_group,is_volunteer,skills\n\
John Doe,1234567890,john@example.com,A+,true,\"first-aid;driving\"\n";

const EVENTS_SAMPLE: &str = "title,description,location,start_time,end_time,status\n\
Community Meetup,Monthly gathering,Central Park,2025-01-01T10:00:00Z,2025-01-01T12:00:00Z,active\n";

const ATTENDANCE_SAMPLE: &str = "event_id,person_id,role,status\n\
uuid-of-event,uuid-of-person,attendee,attended\n";

const ADMINS_SAMPLE: &str = "user_id,role\n\
uuid-of-user,admin\n";

/// Fixed template CSV for `kind`
pub fn sample_csv(kind: ImportKind) -> &'static str {
    match kind {
        ImportKind::People => PEOPLE_SAMPLE,
        ImportKind::Events => EVENTS_SAMPLE,
        ImportKind::Attendance => ATTENDANCE_SAMPLE,
        ImportKind::Admins => ADMINS_SAMPLE,
    }
}

pub fn sample_file_name(kind: ImportKind) -> String {
    format!("sample_{}.csv", kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::csv_pipeline::CsvNormalizationPipeline;
    use crate::types::CellValue;

    #[test]
    fn test_every_sample_normalizes_to_one_record() {
        for kind in ImportKind::ALL {
            let records = CsvNormalizationPipeline::new(kind)
                .normalize(sample_csv(kind))
                .unwrap();
            assert_eq!(records.len(), 1, "sample for {}", kind);
        }
    }

    #[test]
    fn test_people_sample_skills_split_into_list() {
        let records = CsvNormalizationPipeline::new(ImportKind::People)
            .normalize(sample_csv(ImportKind::People))
            .unwrap();
        assert_eq!(
            records[0].get("skills"),
            Some(&CellValue::List(vec!["first-aid".into(), "driving".into()]))
        );
    }

    #[test]
    fn test_events_sample_location_is_kept() {
        let records = CsvNormalizationPipeline::new(ImportKind::Events)
            .normalize(sample_csv(ImportKind::Events))
            .unwrap();
        assert_eq!(records[0].text("location_name"), Some("Central Park"));
        assert_eq!(records[0].text("status"), Some("active"));
    }

    #[test]
    fn test_sample_file_name() {
        assert_eq!(sample_file_name(ImportKind::Attendance), "sample_attendance.csv");
    }
}
