//! Positional delimited text format.
//!
//! Records are joined by `;` and fields by `,` in this fixed order:
//!
//! ```text
//! id,kind,px,py,pz,rx,ry,rz,rw,sx,sy,sz,page,path,payload
//! ```
//!
//! - `page` is empty for shared objects.
//! - `path` is the container path, `None` for root-level objects.
//! - `payload` is empty, `t:<text>` or `s:<sprite>`.
//! - `%`, `,` and `;` inside text fields are percent-escaped.
//! - Floats use shortest round-trip formatting; the integer and fractional
//!   parts are never split into separate fields.

use crate::codec::{DecodeReport, DecodeWarning};
use crate::model::geometry::{Quat, Transform, Vec3};
use crate::model::record::{ObjectId, ObjectKind, ObjectRecord, PageIndex, Payload};
use crate::scene::path::ContainerPath;

pub const RECORD_SEPARATOR: char = ';';
pub const FIELD_SEPARATOR: char = ',';
pub const FIELD_COUNT: usize = 15;

const TEXT_PREFIX: &str = "t:";
const SPRITE_PREFIX: &str = "s:";

pub fn encode<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a ObjectRecord>,
{
    let mut records: Vec<&ObjectRecord> = records.into_iter().collect();
    records.sort_by_key(|record| record.id);
    records
        .into_iter()
        .map(encode_record)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

pub fn decode(text: &str) -> DecodeReport {
    let mut report = DecodeReport::default();
    let chunks = text
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty());

    for (index, chunk) in chunks.enumerate() {
        match decode_record(chunk) {
            Ok(record) => report.accept(index, record),
            Err(reason) => report.warnings.push(DecodeWarning::new(index, reason)),
        }
    }
    report
}

fn encode_record(record: &ObjectRecord) -> String {
    let Transform {
        position,
        rotation,
        scale,
    } = record.transform;
    let payload = match &record.payload {
        Payload::None => String::new(),
        Payload::Text(text) => format!("{TEXT_PREFIX}{}", escape(text)),
        Payload::Sprite(sprite) => format!("{SPRITE_PREFIX}{}", escape(sprite)),
    };
    let fields = [
        record.id.to_string(),
        record.kind.as_str().to_string(),
        position.x.to_string(),
        position.y.to_string(),
        position.z.to_string(),
        rotation.x.to_string(),
        rotation.y.to_string(),
        rotation.z.to_string(),
        rotation.w.to_string(),
        scale.x.to_string(),
        scale.y.to_string(),
        scale.z.to_string(),
        record.page.map(|page| page.to_string()).unwrap_or_default(),
        escape(record.container_path.as_str()),
        payload,
    ];
    fields.join(&FIELD_SEPARATOR.to_string())
}

fn decode_record(chunk: &str) -> Result<ObjectRecord, String> {
    let fields: Vec<&str> = chunk.split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!(
            "expected {FIELD_COUNT} fields, found {}",
            fields.len()
        ));
    }

    let id = fields[0]
        .trim()
        .parse::<u64>()
        .map(ObjectId)
        .map_err(|_| format!("invalid id `{}`", fields[0]))?;
    let kind = ObjectKind::parse(fields[1].trim())
        .ok_or_else(|| format!("unknown kind `{}`", fields[1]))?;

    let float = |slot: usize, name: &str| -> Result<f32, String> {
        fields[slot]
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("invalid {name} `{}`", fields[slot]))
    };
    let transform = Transform {
        position: Vec3::new(float(2, "px")?, float(3, "py")?, float(4, "pz")?),
        rotation: Quat::new(
            float(5, "rx")?,
            float(6, "ry")?,
            float(7, "rz")?,
            float(8, "rw")?,
        ),
        scale: Vec3::new(float(9, "sx")?, float(10, "sy")?, float(11, "sz")?),
    };

    let page = match fields[12].trim() {
        "" => None,
        value => Some(
            value
                .parse::<PageIndex>()
                .map_err(|_| format!("invalid page `{value}`"))?,
        ),
    };
    let container_path = ContainerPath::parse(&unescape(fields[13])?);
    let payload = decode_payload(fields[14])?;

    Ok(ObjectRecord {
        id,
        kind,
        transform,
        container_path,
        page,
        payload,
    })
}

fn decode_payload(field: &str) -> Result<Payload, String> {
    if field.is_empty() {
        return Ok(Payload::None);
    }
    if let Some(text) = field.strip_prefix(TEXT_PREFIX) {
        return Ok(Payload::Text(unescape(text)?));
    }
    if let Some(sprite) = field.strip_prefix(SPRITE_PREFIX) {
        return Ok(Payload::Sprite(unescape(sprite)?));
    }
    Err(format!("unknown payload encoding `{field}`"))
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ',' => escaped.push_str("%2C"),
            ';' => escaped.push_str("%3B"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape(value: &str) -> Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(position) = rest.find('%') {
        out.push_str(&rest[..position]);
        let code = rest.get(position + 1..position + 3);
        match code {
            Some("25") => out.push('%'),
            Some("2C") | Some("2c") => out.push(','),
            Some("3B") | Some("3b") => out.push(';'),
            _ => return Err(format!("invalid escape sequence in `{value}`")),
        }
        rest = &rest[position + 3..];
    }
    out.push_str(rest);
    Ok(out)
}
