/// Logical WAL records.
///
/// Frame layout on disk:
///   [frame_len: u32]  length of everything after this field
///   [sequence: u64]
///   [op_kind: u8]
///   [table_len: u16] [table bytes]
///   [payload_len: u32] [payload bytes]   UTF-8 JSON
///   [crc32: u32]      over the bytes between frame_len and the CRC
///
/// Payloads: the new record for INSERT, `[old, new]` for UPDATE, the old
/// record for DELETE, `{"field": ...}` for CREATE_INDEX, empty for table
/// DDL.
use crate::error::{Result, SawitError};
use crate::types::Record;

pub type Seq = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum WalOp {
    Insert { table: String, record: Record },
    Update { table: String, old: Record, new: Record },
    Delete { table: String, old: Record },
    CreateTable { table: String },
    DropTable { table: String },
    CreateIndex { table: String, field: String },
}

const TAG_INSERT: u8 = 1;
const TAG_UPDATE: u8 = 2;
const TAG_DELETE: u8 = 3;
const TAG_CREATE_TABLE: u8 = 4;
const TAG_DROP_TABLE: u8 = 5;
const TAG_CREATE_INDEX: u8 = 6;

impl WalOp {
    pub fn table(&self) -> &str {
        match self {
            WalOp::Insert { table, .. }
            | WalOp::Update { table, .. }
            | WalOp::Delete { table, .. }
            | WalOp::CreateTable { table }
            | WalOp::DropTable { table }
            | WalOp::CreateIndex { table, .. } => table,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            WalOp::Insert { .. } => TAG_INSERT,
            WalOp::Update { .. } => TAG_UPDATE,
            WalOp::Delete { .. } => TAG_DELETE,
            WalOp::CreateTable { .. } => TAG_CREATE_TABLE,
            WalOp::DropTable { .. } => TAG_DROP_TABLE,
            WalOp::CreateIndex { .. } => TAG_CREATE_INDEX,
        }
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let to_json = |r: &Record| {
            serde_json::to_vec(r).map_err(|e| SawitError::WalCorrupt(e.to_string()))
        };
        match self {
            WalOp::Insert { record, .. } => to_json(record),
            WalOp::Update { old, new, .. } => serde_json::to_vec(&[old, new])
                .map_err(|e| SawitError::WalCorrupt(e.to_string())),
            WalOp::Delete { old, .. } => to_json(old),
            WalOp::CreateTable { .. } | WalOp::DropTable { .. } => Ok(Vec::new()),
            WalOp::CreateIndex { field, .. } => {
                let mut rec = Record::new();
                rec.set("field".into(), crate::types::Value::Str(field.clone()));
                to_json(&rec)
            }
        }
    }

    /// Build a complete frame, length prefix and checksum included.
    pub fn encode(&self, seq: Seq) -> Result<Vec<u8>> {
        let table = self.table().as_bytes();
        let payload = self.payload()?;

        let mut body = Vec::with_capacity(15 + table.len() + payload.len());
        body.extend_from_slice(&seq.to_le_bytes());
        body.push(self.tag());
        body.extend_from_slice(&(table.len() as u16).to_le_bytes());
        body.extend_from_slice(table);
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        body.extend_from_slice(&payload);

        let crc = crc32fast::hash(&body);
        let mut frame = Vec::with_capacity(4 + body.len() + 4);
        frame.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decode a frame body (the bytes between the length prefix and the
    /// CRC, already checksum-verified).
    pub fn decode(body: &[u8]) -> Result<(Seq, WalOp)> {
        let corrupt = |msg: &str| SawitError::WalCorrupt(msg.to_string());

        if body.len() < 15 {
            return Err(corrupt("record body too short"));
        }
        let seq = u64::from_le_bytes(body[0..8].try_into().unwrap());
        let tag = body[8];
        let table_len = u16::from_le_bytes(body[9..11].try_into().unwrap()) as usize;
        if body.len() < 11 + table_len + 4 {
            return Err(corrupt("record body truncated"));
        }
        let table = String::from_utf8(body[11..11 + table_len].to_vec())
            .map_err(|_| corrupt("table name is not UTF-8"))?;
        let mut offset = 11 + table_len;
        let payload_len =
            u32::from_le_bytes(body[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if body.len() < offset + payload_len {
            return Err(corrupt("payload truncated"));
        }
        let payload = &body[offset..offset + payload_len];

        let record = |bytes: &[u8]| {
            Record::from_bytes(bytes).map_err(|e| SawitError::WalCorrupt(e.to_string()))
        };

        let op = match tag {
            TAG_INSERT => WalOp::Insert {
                table,
                record: record(payload)?,
            },
            TAG_UPDATE => {
                let pair: Vec<Record> = serde_json::from_slice(payload)
                    .map_err(|e| SawitError::WalCorrupt(e.to_string()))?;
                let mut it = pair.into_iter();
                match (it.next(), it.next()) {
                    (Some(old), Some(new)) => WalOp::Update { table, old, new },
                    _ => return Err(corrupt("update payload is not a pair")),
                }
            }
            TAG_DELETE => WalOp::Delete {
                table,
                old: record(payload)?,
            },
            TAG_CREATE_TABLE => WalOp::CreateTable { table },
            TAG_DROP_TABLE => WalOp::DropTable { table },
            TAG_CREATE_INDEX => {
                let rec = record(payload)?;
                let field = match rec.get("field") {
                    Some(crate::types::Value::Str(f)) => f.clone(),
                    _ => return Err(corrupt("create-index payload missing field")),
                };
                WalOp::CreateIndex { table, field }
            }
            other => return Err(corrupt(&format!("unknown op kind {}", other))),
        };
        Ok((seq, op))
    }
}
