//! Versioned JSON envelope format.
//!
//! ```text
//! {"format":"pagebook.scene","version":1,"records":[{...}, ...]}
//! ```
//!
//! Records are decoded one by one so a single bad entry only loses itself.

use crate::codec::{CodecResult, DecodeReport, DecodeWarning};
use crate::model::record::ObjectRecord;
use serde::{Deserialize, Serialize};

pub const FORMAT_TAG: &str = "pagebook.scene";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    format: &'static str,
    version: u32,
    records: Vec<&'a ObjectRecord>,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    format: String,
    version: u32,
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

pub fn encode<'a, I>(records: I) -> CodecResult<String>
where
    I: IntoIterator<Item = &'a ObjectRecord>,
{
    let mut records: Vec<&ObjectRecord> = records.into_iter().collect();
    records.sort_by_key(|record| record.id);
    let envelope = EnvelopeOut {
        format: FORMAT_TAG,
        version: FORMAT_VERSION,
        records,
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode(text: &str) -> DecodeReport {
    let mut report = DecodeReport::default();

    let envelope: EnvelopeIn = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            report
                .warnings
                .push(DecodeWarning::new(0, format!("invalid envelope: {err}")));
            return report;
        }
    };
    if envelope.format != FORMAT_TAG {
        report.warnings.push(DecodeWarning::new(
            0,
            format!("unexpected envelope format `{}`", envelope.format),
        ));
        return report;
    }
    if envelope.version > FORMAT_VERSION {
        report.warnings.push(DecodeWarning::new(
            0,
            format!(
                "envelope version {} is newer than supported {FORMAT_VERSION}",
                envelope.version
            ),
        ));
        return report;
    }

    for (index, value) in envelope.records.into_iter().enumerate() {
        match serde_json::from_value::<ObjectRecord>(value) {
            Ok(record) => report.accept(index, record),
            Err(err) => report.warnings.push(DecodeWarning::new(index, err.to_string())),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};
    use crate::model::geometry::{Quat, Transform, Vec3};
    use crate::model::record::{ObjectId, ObjectKind, ObjectRecord, Payload};
    use crate::scene::path::ContainerPath;

    fn sample() -> Vec<ObjectRecord> {
        vec![
            ObjectRecord::new(
                ObjectId(2),
                ObjectKind::Tab,
                ContainerPath::parse("Canvas/pages/page3/cards3"),
                Some(1),
            )
            .with_transform(
                Transform::at(Vec3::new(-12.375, 0.1, 3.0))
                    .with_rotation(Quat::from_euler_degrees(0.0, 180.0, 0.0)),
            )
            .with_payload(Payload::Text("shopping, milk; eggs \"fresh\"".to_string())),
            ObjectRecord::new(ObjectId(1), ObjectKind::Generic, ContainerPath::Detached, None),
        ]
    }

    #[test]
    fn roundtrip_is_exact() {
        let records = sample();
        let text = encode(&records).unwrap();
        let report = decode(&text);

        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.records.len(), 2);
        for record in &records {
            assert_eq!(report.records.get(&record.id), Some(record));
        }
    }

    #[test]
    fn detached_path_is_written_as_null() {
        let records = sample();
        let text = encode(&records[1..]).unwrap();
        assert!(text.contains("\"container_path\":null"), "{text}");
    }

    #[test]
    fn bad_entry_is_skipped_and_neighbours_survive() {
        let text = r#"{"format":"pagebook.scene","version":1,"records":[
            {"id":1,"kind":"tab","transform":{"position":{"x":1.0,"y":2.0,"z":0.0},"rotation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0},"scale":{"x":1.0,"y":1.0,"z":1.0}},"container_path":"Canvas","page":0},
            {"id":2,"kind":"tab","transform":"oops","container_path":"Canvas"}
        ]}"#;
        let report = decode(text);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].index, 1);
    }

    #[test]
    fn newer_version_is_rejected_with_warning() {
        let report = decode(r#"{"format":"pagebook.scene","version":99,"records":[]}"#);
        assert!(report.records.is_empty());
        assert!(report.warnings[0].reason.contains("newer"));
    }
}
