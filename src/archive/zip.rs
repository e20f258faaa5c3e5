use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

use crate::config::ZipCompression;
use crate::error::{Result, StorageError};

const LOCAL_HEADER_SIGNATURE: u32 = 0x04034b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;
const EOCD_SIGNATURE: u32 = 0x06054b50;

/// ZIP compression methods
const COMPRESSION_STORED: u16 = 0;
const COMPRESSION_DEFLATE: u16 = 8;

/// Version 2.0: deflate and data descriptors
const VERSION: u16 = 20;

/// Bit 3: sizes and CRC follow the data. Bit 11: names are UTF-8.
const FLAGS: u16 = (1 << 3) | (1 << 11);

const LOCAL_HEADER_SIZE: usize = 30;
const DATA_DESCRIPTOR_SIZE: usize = 16;
const CENTRAL_HEADER_SIZE: usize = 46;
const EOCD_SIZE: usize = 22;

/// Largest value a 32-bit field can carry without switching to ZIP64
const MAX_U32_FIELD: u64 = u32::MAX as u64 - 1;
const MAX_ENTRIES: usize = u16::MAX as usize;

/// Central directory record kept for every finished entry
#[derive(Debug)]
struct CentralRecord {
    name: String,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    offset: u32,
}

enum Compressor {
    Stored,
    Deflate(DeflateEncoder<Vec<u8>>),
}

struct OpenEntry {
    name: String,
    offset: u64,
    compressor: Compressor,
    hasher: crc32fast::Hasher,
    uncompressed: u64,
    compressed: u64,
}

/// Incremental ZIP writer.
///
/// Each call returns the bytes it produced, so an archive can be streamed
/// without ever holding more than one chunk of entry data. Entries are
/// written with a trailing data descriptor because sizes and CRC are only
/// known after the content has passed through.
pub struct ZipEncoder {
    compression: ZipCompression,
    records: Vec<CentralRecord>,
    current: Option<OpenEntry>,
    /// Bytes emitted so far
    offset: u64,
    time: u16,
    date: u16,
}

impl ZipEncoder {
    pub fn new(compression: ZipCompression) -> Self {
        let (time, date) = dos_datetime(Local::now().naive_local());
        ZipEncoder {
            compression,
            records: Vec::new(),
            current: None,
            offset: 0,
            time,
            date,
        }
    }

    /// Number of bytes produced so far
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Number of finished entries
    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    fn method(&self) -> u16 {
        match self.compression {
            ZipCompression::Stored => COMPRESSION_STORED,
            ZipCompression::Deflate => COMPRESSION_DEFLATE,
        }
    }

    /// Start a new entry and return its local file header
    pub fn begin_entry(&mut self, name: &str) -> Result<Bytes> {
        if let Some(open) = &self.current {
            return Err(StorageError::Archive(format!(
                "entry {} is still open",
                open.name
            )));
        }
        if self.records.len() >= MAX_ENTRIES {
            return Err(StorageError::Archive(format!(
                "more than {MAX_ENTRIES} entries would need ZIP64"
            )));
        }
        if name.len() > u16::MAX as usize {
            return Err(StorageError::Archive(format!(
                "entry name too long: {} bytes",
                name.len()
            )));
        }
        if self.offset > MAX_U32_FIELD {
            return Err(StorageError::Archive(
                "archive exceeds 4 GiB and would need ZIP64".into(),
            ));
        }

        let mut header = BytesMut::with_capacity(LOCAL_HEADER_SIZE + name.len());
        header.put_u32_le(LOCAL_HEADER_SIGNATURE);
        header.put_u16_le(VERSION);
        header.put_u16_le(FLAGS);
        header.put_u16_le(self.method());
        header.put_u16_le(self.time);
        header.put_u16_le(self.date);
        // CRC and sizes live in the data descriptor
        header.put_u32_le(0);
        header.put_u32_le(0);
        header.put_u32_le(0);
        header.put_u16_le(name.len() as u16);
        header.put_u16_le(0);
        header.put_slice(name.as_bytes());

        let compressor = match self.compression {
            ZipCompression::Stored => Compressor::Stored,
            ZipCompression::Deflate => {
                Compressor::Deflate(DeflateEncoder::new(Vec::new(), Compression::default()))
            }
        };
        self.current = Some(OpenEntry {
            name: name.to_string(),
            offset: self.offset,
            compressor,
            hasher: crc32fast::Hasher::new(),
            uncompressed: 0,
            compressed: 0,
        });

        self.offset += header.len() as u64;
        Ok(header.freeze())
    }

    /// Feed entry content; returns whatever compressed output is ready
    /// (possibly nothing).
    pub fn write(&mut self, data: &[u8]) -> Result<Bytes> {
        let open = self
            .current
            .as_mut()
            .ok_or_else(|| StorageError::Archive("no open entry".into()))?;

        open.hasher.update(data);
        open.uncompressed += data.len() as u64;
        if open.uncompressed > MAX_U32_FIELD {
            return Err(StorageError::Archive(format!(
                "entry {} exceeds 4 GiB and would need ZIP64",
                open.name
            )));
        }

        let out = match &mut open.compressor {
            Compressor::Stored => Bytes::copy_from_slice(data),
            Compressor::Deflate(encoder) => {
                encoder.write_all(data)?;
                Bytes::from(std::mem::take(encoder.get_mut()))
            }
        };
        open.compressed += out.len() as u64;
        self.offset += out.len() as u64;
        Ok(out)
    }

    /// Close the open entry: flush the compressor and append the data descriptor
    pub fn finish_entry(&mut self) -> Result<Bytes> {
        let open = self
            .current
            .take()
            .ok_or_else(|| StorageError::Archive("no open entry".into()))?;

        let tail = match open.compressor {
            Compressor::Stored => Vec::new(),
            Compressor::Deflate(encoder) => encoder.finish()?,
        };
        let compressed = open.compressed + tail.len() as u64;
        if compressed > MAX_U32_FIELD {
            return Err(StorageError::Archive(format!(
                "entry {} exceeds 4 GiB and would need ZIP64",
                open.name
            )));
        }

        let crc32 = open.hasher.finalize();
        let mut out = BytesMut::with_capacity(tail.len() + DATA_DESCRIPTOR_SIZE);
        out.put_slice(&tail);
        out.put_u32_le(DATA_DESCRIPTOR_SIGNATURE);
        out.put_u32_le(crc32);
        out.put_u32_le(compressed as u32);
        out.put_u32_le(open.uncompressed as u32);

        self.records.push(CentralRecord {
            name: open.name,
            crc32,
            compressed_size: compressed as u32,
            uncompressed_size: open.uncompressed as u32,
            offset: open.offset as u32,
        });

        self.offset += out.len() as u64;
        Ok(out.freeze())
    }

    /// Write the central directory and end record. Consumes the encoder.
    pub fn finish(self) -> Result<Bytes> {
        if let Some(open) = &self.current {
            return Err(StorageError::Archive(format!(
                "entry {} is still open",
                open.name
            )));
        }

        let directory_size: usize = self
            .records
            .iter()
            .map(|r| CENTRAL_HEADER_SIZE + r.name.len())
            .sum();
        if self.offset > MAX_U32_FIELD || self.offset + directory_size as u64 > MAX_U32_FIELD {
            return Err(StorageError::Archive(
                "archive exceeds 4 GiB and would need ZIP64".into(),
            ));
        }

        let mut out = BytesMut::with_capacity(directory_size + EOCD_SIZE);
        for record in &self.records {
            out.put_u32_le(CENTRAL_HEADER_SIGNATURE);
            out.put_u16_le(VERSION);
            out.put_u16_le(VERSION);
            out.put_u16_le(FLAGS);
            out.put_u16_le(self.method());
            out.put_u16_le(self.time);
            out.put_u16_le(self.date);
            out.put_u32_le(record.crc32);
            out.put_u32_le(record.compressed_size);
            out.put_u32_le(record.uncompressed_size);
            out.put_u16_le(record.name.len() as u16);
            // extra, comment, disk number, internal and external attributes
            out.put_u16_le(0);
            out.put_u16_le(0);
            out.put_u16_le(0);
            out.put_u16_le(0);
            out.put_u32_le(0);
            out.put_u32_le(record.offset);
            out.put_slice(record.name.as_bytes());
        }

        let count = self.records.len() as u16;
        out.put_u32_le(EOCD_SIGNATURE);
        out.put_u16_le(0);
        out.put_u16_le(0);
        out.put_u16_le(count);
        out.put_u16_le(count);
        out.put_u32_le(directory_size as u32);
        out.put_u32_le(self.offset as u32);
        out.put_u16_le(0);

        Ok(out.freeze())
    }
}

/// MS-DOS time and date fields. Dates before 1980 are clamped.
fn dos_datetime(at: NaiveDateTime) -> (u16, u16) {
    if at.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let time = (at.hour() << 11) | (at.minute() << 5) | (at.second() / 2);
    let date = (((at.year() - 1980) as u32) << 9) | (at.month() << 5) | at.day();
    (time as u16, date as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::{Cursor, Read};

    fn build(compression: ZipCompression, files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut encoder = ZipEncoder::new(compression);
        let mut out = Vec::new();
        for (name, data) in files {
            out.extend_from_slice(&encoder.begin_entry(name).unwrap());
            for chunk in data.chunks(3) {
                out.extend_from_slice(&encoder.write(chunk).unwrap());
            }
            out.extend_from_slice(&encoder.finish_entry().unwrap());
        }
        assert_eq!(encoder.bytes_written(), out.len() as u64);
        out.extend_from_slice(&encoder.finish().unwrap());
        out
    }

    fn read_back(archive: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut zip = ::zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut file = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_deflate_archive_reads_back() {
        let text = "hello hello hello hello".repeat(50);
        let archive = build(
            ZipCompression::Deflate,
            &[("a.txt", text.as_bytes()), ("nested/b.bin", &[0, 1, 2, 3])],
        );
        let entries = read_back(archive);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a.txt");
        assert_eq!(entries[0].1, text.as_bytes());
        assert_eq!(entries[1].0, "nested/b.bin");
        assert_eq!(entries[1].1, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_stored_archive_reads_back() {
        let archive = build(ZipCompression::Stored, &[("f1.txt", b"x"), ("日本.txt", b"")]);
        let entries = read_back(archive);
        assert_eq!(entries[0], ("f1.txt".to_string(), b"x".to_vec()));
        assert_eq!(entries[1], ("日本.txt".to_string(), Vec::new()));
    }

    #[test]
    fn test_empty_archive_is_just_the_end_record() {
        let archive = build(ZipCompression::Deflate, &[]);
        assert_eq!(archive.len(), EOCD_SIZE);
        assert!(archive.starts_with(&EOCD_SIGNATURE.to_le_bytes()));
        assert!(read_back(archive).is_empty());
    }

    #[test]
    fn test_local_header_layout() {
        let mut encoder = ZipEncoder::new(ZipCompression::Stored);
        let header = encoder.begin_entry("abc").unwrap();
        assert_eq!(header.len(), LOCAL_HEADER_SIZE + 3);
        assert_eq!(&header[0..4], &[0x50, 0x4b, 0x03, 0x04]);
        assert_eq!(u16::from_le_bytes([header[6], header[7]]), FLAGS);
        assert_eq!(u16::from_le_bytes([header[8], header[9]]), COMPRESSION_STORED);
        assert_eq!(&header[30..], b"abc");
    }

    #[test]
    fn test_stored_entry_sizes_follow_the_data() {
        let mut encoder = ZipEncoder::new(ZipCompression::Stored);
        let header = encoder.begin_entry("a").unwrap();
        // CRC and both sizes are left zero in the local header
        assert!(header[14..26].iter().all(|b| *b == 0));
        assert_eq!(encoder.write(b"xyz").unwrap().as_ref(), b"xyz");

        let descriptor = encoder.finish_entry().unwrap();
        assert_eq!(descriptor.len(), DATA_DESCRIPTOR_SIZE);
        assert_eq!(&descriptor[0..4], &DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
        assert_eq!(&descriptor[4..8], &crc32fast::hash(b"xyz").to_le_bytes());
        assert_eq!(&descriptor[8..12], &3u32.to_le_bytes());
        assert_eq!(&descriptor[12..16], &3u32.to_le_bytes());
    }

    #[test]
    fn test_misuse_is_an_archive_error() {
        let mut encoder = ZipEncoder::new(ZipCompression::Stored);
        assert!(matches!(encoder.write(b"x"), Err(StorageError::Archive(_))));
        assert!(matches!(encoder.finish_entry(), Err(StorageError::Archive(_))));

        encoder.begin_entry("a").unwrap();
        assert!(matches!(encoder.begin_entry("b"), Err(StorageError::Archive(_))));
        assert!(matches!(encoder.finish(), Err(StorageError::Archive(_))));
    }

    #[test]
    fn test_entry_limit() {
        let mut encoder = ZipEncoder::new(ZipCompression::Stored);
        for i in 0..MAX_ENTRIES {
            encoder.begin_entry(&format!("{i}")).unwrap();
            encoder.finish_entry().unwrap();
        }
        assert_eq!(encoder.entry_count(), MAX_ENTRIES);
        assert!(matches!(
            encoder.begin_entry("one-too-many"),
            Err(StorageError::Archive(_))
        ));
    }

    #[test]
    fn test_dos_datetime() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(13, 45, 31)
            .unwrap();
        let (time, date) = dos_datetime(at);
        assert_eq!(time, (13 << 11) | (45 << 5) | 15);
        assert_eq!(date, (44 << 9) | (3 << 5) | 15);

        let old = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(dos_datetime(old), (0, (1 << 5) | 1));
    }
}
