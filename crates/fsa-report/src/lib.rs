#![forbid(unsafe_code)]
//! Ingestion of the column-tagged metadata report into a [`Snapshot`].
//!
//! The report is a line-oriented stream of comma-separated records. The first
//! column tags the record type; the closed set of tags is decoded up front
//! into the typed model from `fsa-types`. Any malformed record fails the
//! whole load with a [`ReportError`] — a silently dropped row would corrupt
//! every downstream audit invariant.
//!
//! | Tag          | Payload |
//! |--------------|---------|
//! | `SUPERBLOCK` | geometry: blocks, inodes, sizes, per-group counts, first non-reserved inode |
//! | `GROUP`      | group 0 descriptor: counts, bitmap and inode-table locations |
//! | `BFREE`      | one free block number |
//! | `IFREE`      | one free inode number |
//! | `INODE`      | inode table entry; 15 trailing block addresses for files and directories |
//! | `DIRENT`     | directory entry; the name field keeps its surrounding quotes |
//! | `INDIRECT`   | one pointer slot inside an indirect block |

use fsa_types::{
    BlockNumber, DirEntry, FileType, Group, Inode, IndirectRecord, InodeNumber, Snapshot,
    Superblock, BLOCK_ADDRESS_SLOTS,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Ingestion failure. Every variant names the 1-based report line so the
/// caller can point at the offending record.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error reading report: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: empty record")]
    EmptyRecord { line: usize },

    #[error("line {line}: unknown record tag {tag:?}")]
    UnknownTag { line: usize, tag: String },

    #[error("line {line}: {tag} record has {actual} fields, expected {expected}")]
    FieldCount {
        line: usize,
        tag: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("line {line}: {tag} field {field} is not a number: {value:?}")]
    InvalidNumber {
        line: usize,
        tag: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: INODE file type must be a single character, got {value:?}")]
    InvalidFileType { line: usize, value: String },

    #[error("line {line}: INODE {ino} of type {file_type} carries {actual} block addresses, expected {expected}")]
    BlockAddressCount {
        line: usize,
        ino: InodeNumber,
        file_type: FileType,
        expected: usize,
        actual: usize,
    },

    #[error("report has no SUPERBLOCK record")]
    MissingSuperblock,

    #[error("report has no GROUP record")]
    MissingGroup,
}

/// One split record with its provenance, used by the per-tag decoders.
struct Row<'a> {
    line: usize,
    tag: &'static str,
    /// Payload fields, tag excluded.
    fields: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn require(&self, expected: usize) -> Result<(), ReportError> {
        if self.fields.len() == expected {
            Ok(())
        } else {
            Err(ReportError::FieldCount {
                line: self.line,
                tag: self.tag,
                expected,
                actual: self.fields.len(),
            })
        }
    }

    fn require_at_least(&self, expected: usize) -> Result<(), ReportError> {
        if self.fields.len() >= expected {
            Ok(())
        } else {
            Err(ReportError::FieldCount {
                line: self.line,
                tag: self.tag,
                expected,
                actual: self.fields.len(),
            })
        }
    }

    fn number<T: std::str::FromStr>(
        &self,
        index: usize,
        field: &'static str,
    ) -> Result<T, ReportError> {
        let raw = self.fields[index];
        raw.parse().map_err(|_| ReportError::InvalidNumber {
            line: self.line,
            tag: self.tag,
            field,
            value: raw.to_owned(),
        })
    }

    fn block(&self, index: usize, field: &'static str) -> Result<BlockNumber, ReportError> {
        self.number(index, field).map(BlockNumber)
    }

    fn inode(&self, index: usize, field: &'static str) -> Result<InodeNumber, ReportError> {
        self.number(index, field).map(InodeNumber)
    }

    fn text(&self, index: usize) -> String {
        self.fields[index].to_owned()
    }
}

/// Read and decode a report file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, ReportError> {
    let text = fs::read_to_string(path)?;
    parse_report(&text)
}

/// Decode a full report from text.
pub fn parse_report(text: &str) -> Result<Snapshot, ReportError> {
    let mut superblock = None;
    let mut group = None;
    let mut free_blocks = BTreeSet::new();
    let mut free_inodes = BTreeSet::new();
    let mut inodes = Vec::new();
    let mut dirents = Vec::new();
    let mut indirects = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let raw_line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let mut parts = raw_line.split(',');
        let tag = parts.next().unwrap_or("");
        let fields: Vec<&str> = parts.collect();
        if tag.is_empty() && fields.is_empty() {
            return Err(ReportError::EmptyRecord { line });
        }

        match tag {
            "SUPERBLOCK" => superblock = Some(decode_superblock(Row { line, tag: "SUPERBLOCK", fields })?),
            "GROUP" => group = Some(decode_group(Row { line, tag: "GROUP", fields })?),
            "BFREE" => {
                let row = Row { line, tag: "BFREE", fields };
                row.require(1)?;
                free_blocks.insert(row.block(0, "block_number")?);
            }
            "IFREE" => {
                let row = Row { line, tag: "IFREE", fields };
                row.require(1)?;
                free_inodes.insert(row.inode(0, "inode_number")?);
            }
            "INODE" => inodes.push(decode_inode(Row { line, tag: "INODE", fields })?),
            "DIRENT" => dirents.push(decode_dirent(Row { line, tag: "DIRENT", fields })?),
            "INDIRECT" => indirects.push(decode_indirect(Row { line, tag: "INDIRECT", fields })?),
            other => {
                return Err(ReportError::UnknownTag {
                    line,
                    tag: other.to_owned(),
                });
            }
        }
    }

    let snapshot = Snapshot {
        superblock: superblock.ok_or(ReportError::MissingSuperblock)?,
        group: group.ok_or(ReportError::MissingGroup)?,
        free_blocks,
        free_inodes,
        inodes,
        dirents,
        indirects,
    };

    debug!(
        inodes = snapshot.inodes.len(),
        dirents = snapshot.dirents.len(),
        indirects = snapshot.indirects.len(),
        free_blocks = snapshot.free_blocks.len(),
        free_inodes = snapshot.free_inodes.len(),
        "report decoded"
    );

    Ok(snapshot)
}

fn decode_superblock(row: Row<'_>) -> Result<Superblock, ReportError> {
    row.require(7)?;
    Ok(Superblock {
        total_blocks: row.number(0, "total_blocks")?,
        total_inodes: row.number(1, "total_inodes")?,
        block_size: row.number(2, "block_size")?,
        inode_size: row.number(3, "inode_size")?,
        blocks_per_group: row.number(4, "blocks_per_group")?,
        inodes_per_group: row.number(5, "inodes_per_group")?,
        first_non_reserved_inode: row.inode(6, "first_non_reserved_inode")?,
    })
}

fn decode_group(row: Row<'_>) -> Result<Group, ReportError> {
    row.require(8)?;
    Ok(Group {
        group_no: row.number(0, "group_no")?,
        block_count: row.number(1, "block_count")?,
        inode_count: row.number(2, "inode_count")?,
        free_block_count: row.number(3, "free_block_count")?,
        free_inode_count: row.number(4, "free_inode_count")?,
        free_block_bitmap: row.block(5, "free_block_bitmap")?,
        free_inode_bitmap: row.block(6, "free_inode_bitmap")?,
        inode_table: row.block(7, "inode_table")?,
    })
}

fn decode_inode(row: Row<'_>) -> Result<Inode, ReportError> {
    // 11 fixed fields, then the block address list.
    row.require_at_least(11)?;

    let type_field = row.fields[1];
    let mut chars = type_field.chars();
    let (Some(tag), None) = (chars.next(), chars.next()) else {
        return Err(ReportError::InvalidFileType {
            line: row.line,
            value: type_field.to_owned(),
        });
    };
    let file_type = FileType::from_tag(tag);

    let mut block_addresses = Vec::with_capacity(row.fields.len() - 11);
    for index in 11..row.fields.len() {
        block_addresses.push(row.block(index, "block_address")?);
    }

    let inode = Inode {
        ino: row.inode(0, "inode_no")?,
        file_type,
        mode: row.text(2),
        owner: row.number(3, "owner")?,
        group: row.number(4, "group")?,
        link_count: row.number(5, "link_count")?,
        ctime: row.text(6),
        mtime: row.text(7),
        atime: row.text(8),
        size: row.number(9, "size")?,
        block_count: row.number(10, "block_count")?,
        block_addresses,
    };

    // Files and directories must carry the full 15-slot list; other types
    // (fast symlinks, devices) legitimately carry fewer.
    if inode.file_type.has_block_list() && inode.block_addresses.len() != BLOCK_ADDRESS_SLOTS {
        return Err(ReportError::BlockAddressCount {
            line: row.line,
            ino: inode.ino,
            file_type: inode.file_type,
            expected: BLOCK_ADDRESS_SLOTS,
            actual: inode.block_addresses.len(),
        });
    }

    Ok(inode)
}

fn decode_dirent(row: Row<'_>) -> Result<DirEntry, ReportError> {
    row.require(6)?;
    Ok(DirEntry {
        parent: row.inode(0, "parent_inode")?,
        byte_offset: row.number(1, "byte_offset")?,
        target: row.inode(2, "inode")?,
        entry_len: row.number(3, "entry_length")?,
        name_len: row.number(4, "name_length")?,
        name: row.text(5),
    })
}

fn decode_indirect(row: Row<'_>) -> Result<IndirectRecord, ReportError> {
    row.require(5)?;
    Ok(IndirectRecord {
        ino: row.inode(0, "inode_no")?,
        level: row.number(1, "level")?,
        logical_offset: row.number(2, "logical_block_offset")?,
        indirect_block: row.block(3, "indirect_block_loc")?,
        block: row.block(4, "block_number")?,
    })
}
