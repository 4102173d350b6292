//! Encoding and newline capture for round-trip-faithful writes.

use camino::Utf8Path;
use fs_err as fs;
use thiserror::Error;
use tracing::debug;

/// Character encoding of a file, as sniffed from its byte-order mark.
///
/// Files without a BOM are treated as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8 { bom: bool },
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    fn preamble(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 { bom: false } => &[],
            Encoding::Utf8 { bom: true } => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf16Be => &[0xFE, 0xFF],
        }
    }
}

/// Newline convention of a file, from its first line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }

    /// Platform convention, used when a file contains no line break at all.
    pub fn platform() -> Newline {
        if cfg!(windows) { Newline::CrLf } else { Newline::Lf }
    }
}

/// Per-file fidelity data captured at read time and reapplied at write time.
///
/// A rewritten file's encoding and newline convention must equal the
/// original's; this struct is how that invariant travels from read to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub encoding: Encoding,
    pub newline: Newline,
    pub had_trailing_newline: bool,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid {encoding}")]
    Decode { path: String, encoding: String },
}

/// Read a file into lines, capturing its snapshot.
///
/// Lines never include their terminator; mixed terminators are normalized to
/// the first one seen when the file is written back.
pub fn read_lines(path: &Utf8Path) -> Result<(Vec<String>, FileSnapshot), SnapshotError> {
    let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
        path: path.to_string(),
        source,
    })?;
    let (text, encoding) = decode(&bytes, path)?;

    let newline = sniff_newline(&text);
    let had_trailing_newline = text.ends_with('\n');

    let mut lines: Vec<String> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();
    // A trailing terminator yields one phantom empty segment.
    if had_trailing_newline {
        lines.pop();
    }

    debug!(%path, ?encoding, ?newline, lines = lines.len(), "captured file snapshot");
    Ok((
        lines,
        FileSnapshot {
            encoding,
            newline,
            had_trailing_newline,
        },
    ))
}

/// Write lines back, reapplying the snapshot's encoding preamble and newline
/// string. The file is truncated to the new length.
pub fn write_lines(
    path: &Utf8Path,
    lines: &[String],
    snapshot: FileSnapshot,
) -> Result<(), SnapshotError> {
    let mut text = lines.join(snapshot.newline.as_str());
    if snapshot.had_trailing_newline {
        text.push_str(snapshot.newline.as_str());
    }

    let mut bytes = snapshot.encoding.preamble().to_vec();
    match snapshot.encoding {
        Encoding::Utf8 { .. } => bytes.extend_from_slice(text.as_bytes()),
        Encoding::Utf16Le => {
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
        }
        Encoding::Utf16Be => {
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
        }
    }

    fs::write(path, bytes).map_err(|source| SnapshotError::Io {
        path: path.to_string(),
        source,
    })
}

fn decode(bytes: &[u8], path: &Utf8Path) -> Result<(String, Encoding), SnapshotError> {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        let text = decode_utf16(&bytes[2..], u16::from_le_bytes).ok_or_else(|| {
            SnapshotError::Decode {
                path: path.to_string(),
                encoding: "UTF-16LE".to_string(),
            }
        })?;
        return Ok((text, Encoding::Utf16Le));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let text = decode_utf16(&bytes[2..], u16::from_be_bytes).ok_or_else(|| {
            SnapshotError::Decode {
                path: path.to_string(),
                encoding: "UTF-16BE".to_string(),
            }
        })?;
        return Ok((text, Encoding::Utf16Be));
    }

    let (bom, body) = match bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]) {
        Some(rest) => (true, rest),
        None => (false, bytes),
    };
    let text = String::from_utf8(body.to_vec()).map_err(|_| SnapshotError::Decode {
        path: path.to_string(),
        encoding: "UTF-8".to_string(),
    })?;
    Ok((text, Encoding::Utf8 { bom }))
}

fn decode_utf16(bytes: &[u8], read: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| read([c[0], c[1]])).collect();
    String::from_utf16(&units).ok()
}

fn sniff_newline(text: &str) -> Newline {
    match text.find('\n') {
        Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => Newline::CrLf,
        Some(_) => Newline::Lf,
        None => Newline::platform(),
    }
}
