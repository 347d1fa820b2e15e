use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, SawitError};
use crate::wal::record::{Seq, WalOp};
use crate::wal::MAX_WAL_FRAME_LEN;

/// Iterates WAL frames for recovery.
///
/// A frame cut short by a crash (header or payload missing its tail) is
/// treated as end-of-log and discarded silently. A complete frame whose
/// checksum or structure is invalid is reported as `WalCorrupt`; recovery
/// keeps everything read before it.
pub struct WalReader {
    file: File,
    file_len: u64,
}

impl WalReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(WalReader { file, file_len })
    }

    pub fn next(&mut self) -> Result<Option<(Seq, WalOp)>> {
        let mut len_buf = [0u8; 4];
        match self.file.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let frame_len = u32::from_le_bytes(len_buf) as usize;
        let pos = self.file.stream_position()?;
        let remaining = self.file_len.saturating_sub(pos);

        // Torn tail: the header promises more bytes than the file holds.
        if frame_len as u64 > remaining {
            return Ok(None);
        }
        if frame_len < 19 || frame_len > MAX_WAL_FRAME_LEN {
            return Err(SawitError::WalCorrupt(format!(
                "implausible frame length {}",
                frame_len
            )));
        }

        let mut frame = vec![0u8; frame_len];
        match self.file.read_exact(&mut frame) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let body = &frame[..frame_len - 4];
        let stored_crc = u32::from_le_bytes(frame[frame_len - 4..].try_into().unwrap());
        if crc32fast::hash(body) != stored_crc {
            return Err(SawitError::WalCorrupt("checksum mismatch".into()));
        }

        WalOp::decode(body).map(Some)
    }

    pub fn read_all(&mut self) -> Result<Vec<(Seq, WalOp)>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut records = Vec::new();
        while let Some(entry) = self.next()? {
            records.push(entry);
        }
        Ok(records)
    }
}
