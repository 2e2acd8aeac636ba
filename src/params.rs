//! IPM parameter extract reading.
//!
//! A parameter extract is a VBS stream of fixed-layout text records. The
//! file opens with an `IP0000T1` expanded-table index that maps each
//! 3-character table sub-id to its 8-character table id, closed by a
//! trailer record; the data records follow. Extraction projects the records
//! of one requested table through configured character spans.

use crate::config::{ParamTables, TableLayout};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::vbs::VbsReader;
use std::collections::BTreeMap;
use std::io::Read;

/// Table id of the expanded-table index records.
const INDEX_TABLE_ID: &str = "IP0000T1";
/// First characters of the record closing the index.
const TRAILER_PREFIX: &str = "TRAILER RECORD IP0000T1";

/// Character positions of the index table id within any record.
const RECORD_TABLE_ID: (usize, usize) = (11, 19);
/// Character positions of the indexed table id within an index record.
const INDEX_ENTRY_TABLE_ID: (usize, usize) = (19, 27);
/// Character positions of the table sub-id within an index record.
const INDEX_ENTRY_SUB_ID: (usize, usize) = (243, 246);
/// Character positions of the table sub-id within a data record.
const RECORD_SUB_ID: (usize, usize) = (8, 11);

/// Slice a string by character positions, tolerating short records.
fn char_slice(text: &str, span: (usize, usize)) -> String {
    text.chars()
        .skip(span.0)
        .take(span.1.saturating_sub(span.0))
        .collect()
}

/// Iterator over the rows of one table in a parameter extract.
///
/// Construction consumes the expanded-table index (phase 1); iteration
/// yields a string-valued field map for each record of the requested table
/// (phase 2), skipping records of other tables.
#[derive(Debug)]
pub struct ParamReader<R: Read> {
    vbs: VbsReader<R>,
    encoding: Encoding,
    table_id: String,
    layout: TableLayout,
    table_index: BTreeMap<String, String>,
}

impl<R: Read> ParamReader<R> {
    /// Read a plain VBS parameter extract.
    pub fn new(
        inner: R,
        table_id: &str,
        encoding: Encoding,
        tables: &ParamTables,
    ) -> Result<Self> {
        Self::from_vbs(VbsReader::new(inner), table_id, encoding, tables)
    }

    /// Read a 1014-blocked parameter extract.
    pub fn new_blocked(
        inner: R,
        table_id: &str,
        encoding: Encoding,
        tables: &ParamTables,
    ) -> Result<Self> {
        Self::from_vbs(VbsReader::new_blocked(inner), table_id, encoding, tables)
    }

    fn from_vbs(
        mut vbs: VbsReader<R>,
        table_id: &str,
        encoding: Encoding,
        tables: &ParamTables,
    ) -> Result<Self> {
        let layout = tables
            .get(table_id)
            .cloned()
            .ok_or_else(|| Error::parameter(format!("unknown parameter table {table_id}")))?;

        let mut table_index = BTreeMap::new();
        loop {
            let Some(raw) = vbs.next() else {
                return Err(Error::parameter(format!(
                    "parameter file is missing the {INDEX_TABLE_ID} trailer record"
                )));
            };
            let record = encoding.decode(&raw?)?;
            if char_slice(&record, RECORD_TABLE_ID) == INDEX_TABLE_ID {
                let sub_id = char_slice(&record, INDEX_ENTRY_SUB_ID);
                let indexed = char_slice(&record, INDEX_ENTRY_TABLE_ID);
                log::debug!("table index entry {sub_id} -> {indexed}");
                table_index.insert(sub_id, indexed);
            }
            if record.starts_with(TRAILER_PREFIX) {
                break;
            }
        }

        Ok(Self {
            vbs,
            encoding,
            table_id: table_id.to_string(),
            layout,
            table_index,
        })
    }

    /// The sub-id to table-id index built from the file header.
    pub fn table_index(&self) -> &BTreeMap<String, String> {
        &self.table_index
    }
}

impl<R: Read> Iterator for ParamReader<R> {
    type Item = Result<BTreeMap<String, String>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.vbs.next()? {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e)),
            };
            let record = match self.encoding.decode(&raw) {
                Ok(record) => record,
                Err(e) => {
                    return Some(Err(e.in_record(
                        self.vbs.record_number(),
                        Some(self.vbs.last_record().to_vec()),
                    )))
                }
            };
            let sub_id = char_slice(&record, RECORD_SUB_ID);
            if self.table_index.get(&sub_id) != Some(&self.table_id) {
                continue;
            }
            let row = self
                .layout
                .iter()
                .map(|(name, span)| (name.clone(), char_slice(&record, (span.start, span.end))))
                .collect();
            return Some(Ok(row));
        }
    }
}
