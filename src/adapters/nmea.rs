//! NMEA 0183 location adapter.
//!
//! Reads sentences line by line from any [`BufRead`] (serial device, replay
//! file, stdin) and turns valid `RMC` sentences into [`PositionFix`]es.
//!
//! ```text
//! $GPRMC,123519.00,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A
//!        time      st lat        lon          ...         date
//! ```
//!
//! - Any talker id is accepted (`GP`, `GN`, `GL`, ...).
//! - The `*hh` checksum is mandatory and verified.
//! - Sentences with status `V` (no fix) are skipped.
//! - Lines that fail to parse are logged at debug level and skipped; the
//!   subscription only ends when the reader does.

use core::fmt;
use std::io::{self, BufRead};

use log::{debug, warn};

use crate::app::payload::PositionFix;
use crate::app::ports::LocationSource;
use crate::error::LocationError;

use super::time::epoch_millis;

/// Longest sentence allowed by NMEA 0183, plus slack for CR/LF.
const MAX_SENTENCE_LEN: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmeaError {
    /// Line does not start with `$`.
    NoStart,
    /// Sentence exceeds the NMEA length limit.
    TooLong,
    /// Missing or non-hex checksum field.
    NoChecksum,
    /// Checksum mismatch.
    BadChecksum { expected: u8, computed: u8 },
    /// A field is missing or malformed; names the field.
    Field(&'static str),
}

impl fmt::Display for NmeaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStart => write!(f, "missing '$'"),
            Self::TooLong => write!(f, "sentence too long"),
            Self::NoChecksum => write!(f, "missing checksum"),
            Self::BadChecksum { expected, computed } => write!(
                f,
                "checksum mismatch (expected {:02X}, computed {:02X})",
                expected, computed
            ),
            Self::Field(name) => write!(f, "bad field: {}", name),
        }
    }
}

impl std::error::Error for NmeaError {}

/// XOR of all bytes between `$` and `*`.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Parse one sentence.
///
/// `Ok(None)` means the sentence is well formed but carries no usable fix
/// (a different sentence type, or an RMC with status `V`).
pub fn parse_sentence(line: &str) -> Result<Option<PositionFix>, NmeaError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.len() > MAX_SENTENCE_LEN {
        return Err(NmeaError::TooLong);
    }
    let rest = line.strip_prefix('$').ok_or(NmeaError::NoStart)?;
    let (body, sum) = rest.split_once('*').ok_or(NmeaError::NoChecksum)?;
    if sum.len() != 2 {
        return Err(NmeaError::NoChecksum);
    }
    let expected = u8::from_str_radix(sum, 16).map_err(|_| NmeaError::NoChecksum)?;
    let computed = checksum(body.as_bytes());
    if expected != computed {
        return Err(NmeaError::BadChecksum { expected, computed });
    }

    let fields: Vec<&str> = body.split(',').collect();
    let kind = fields[0];
    if kind.len() != 5 || !kind.ends_with("RMC") {
        return Ok(None);
    }
    if fields.len() < 10 {
        return Err(NmeaError::Field("field count"));
    }
    if fields[2] != "A" {
        return Ok(None);
    }

    let (secs_of_day, millis) = parse_time(fields[1])?;
    let (year, month, day) = parse_date(fields[9])?;
    let latitude = parse_coordinate(fields[3], 2, fields[4], 'N', 'S')
        .filter(|v| v.abs() <= 90.0)
        .ok_or(NmeaError::Field("latitude"))?;
    let longitude = parse_coordinate(fields[5], 3, fields[6], 'E', 'W')
        .filter(|v| v.abs() <= 180.0)
        .ok_or(NmeaError::Field("longitude"))?;

    Ok(Some(PositionFix::new(
        latitude,
        longitude,
        epoch_millis(year, month, day, secs_of_day, millis),
    )))
}

/// `hhmmss[.sss]` to (seconds of day, milliseconds).
fn parse_time(field: &str) -> Result<(u32, u32), NmeaError> {
    let err = NmeaError::Field("time");
    let (whole, frac) = field.split_once('.').unwrap_or((field, ""));
    if whole.len() != 6 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err);
    }
    let h: u32 = whole[0..2].parse().map_err(|_| err)?;
    let m: u32 = whole[2..4].parse().map_err(|_| err)?;
    let s: u32 = whole[4..6].parse().map_err(|_| err)?;
    if h > 23 || m > 59 || s > 60 {
        return Err(err);
    }
    let millis = if frac.is_empty() {
        0
    } else {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err);
        }
        let digits = &frac[..frac.len().min(3)];
        let v: u32 = digits.parse().map_err(|_| err)?;
        v * 10u32.pow(3 - digits.len() as u32)
    };
    Ok((h * 3600 + m * 60 + s, millis))
}

/// `ddmmyy` to (year, month, day).  Two-digit years pivot at 80.
fn parse_date(field: &str) -> Result<(i32, u32, u32), NmeaError> {
    let err = NmeaError::Field("date");
    if field.len() != 6 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err);
    }
    let d: u32 = field[0..2].parse().map_err(|_| err)?;
    let m: u32 = field[2..4].parse().map_err(|_| err)?;
    let yy: i32 = field[4..6].parse().map_err(|_| err)?;
    if !(1..=31).contains(&d) || !(1..=12).contains(&m) {
        return Err(err);
    }
    let year = if yy < 80 { 2000 + yy } else { 1900 + yy };
    Ok((year, m, d))
}

/// `(d)ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(
    value: &str,
    degree_digits: usize,
    hemisphere: &str,
    positive: char,
    negative: char,
) -> Option<f64> {
    if value.len() < degree_digits + 2 || !value.is_char_boundary(degree_digits) {
        return None;
    }
    let degrees: u32 = value[..degree_digits].parse().ok()?;
    let minutes: f64 = value[degree_digits..].parse().ok()?;
    if !(0.0..60.0).contains(&minutes) {
        return None;
    }
    let magnitude = f64::from(degrees) + minutes / 60.0;
    let mut hemi = hemisphere.chars();
    let sign = match (hemi.next(), hemi.next()) {
        (Some(c), None) if c == positive => 1.0,
        (Some(c), None) if c == negative => -1.0,
        _ => return None,
    };
    Some(sign * magnitude)
}

// ───────────────────────────────────────────────────────────────
// LocationSource adapter
// ───────────────────────────────────────────────────────────────

/// Location source backed by an NMEA byte stream.
pub struct NmeaLocationSource<R> {
    reader: R,
    permission: bool,
}

impl<R: BufRead> NmeaLocationSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            permission: true,
        }
    }

    /// Set the location permission gate.
    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = granted;
        self
    }
}

impl<R: BufRead> LocationSource for NmeaLocationSource<R> {
    type Fixes = NmeaFixes<R>;

    fn permission_granted(&self) -> bool {
        self.permission
    }

    fn subscribe(self, interval_ms: u32) -> Result<NmeaFixes<R>, LocationError> {
        if !self.permission {
            return Err(LocationError::PermissionDenied);
        }
        Ok(NmeaFixes {
            reader: self.reader,
            line: Vec::with_capacity(128),
            interval_ms: i64::from(interval_ms),
            last_yielded: None,
            skipped: 0,
        })
    }
}

/// Lazy fix sequence returned by [`NmeaLocationSource::subscribe`].
pub struct NmeaFixes<R> {
    reader: R,
    line: Vec<u8>,
    interval_ms: i64,
    last_yielded: Option<i64>,
    skipped: u32,
}

impl<R> NmeaFixes<R> {
    /// Lines rejected so far (non-UTF-8 noise, bad checksum, malformed fields).
    pub fn skipped(&self) -> u32 {
        self.skipped
    }
}

impl<R: BufRead> Iterator for NmeaFixes<R> {
    type Item = PositionFix;

    fn next(&mut self) -> Option<PositionFix> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("NMEA: read failed: {}", e);
                    return None;
                }
            }
            let Ok(line) = core::str::from_utf8(&self.line) else {
                self.skipped += 1;
                debug!("NMEA: skipped non-UTF-8 line ({} bytes)", self.line.len());
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            let fix = match parse_sentence(line) {
                Ok(Some(fix)) => fix,
                Ok(None) => continue,
                Err(e) => {
                    self.skipped += 1;
                    debug!("NMEA: skipped sentence: {}", e);
                    continue;
                }
            };
            if self
                .last_yielded
                .is_some_and(|last| fix.captured_at_millis - last < self.interval_ms)
            {
                continue;
            }
            self.last_yielded = Some(fix.captured_at_millis);
            return Some(fix);
        }
    }
}
