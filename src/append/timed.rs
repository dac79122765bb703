// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use jiff::Timestamp;
use jiff::Zoned;
use jiff::civil::Time;
use jiff::tz::TimeZone;

use crate::Error;
use crate::ErrorKind;
use crate::append::Append;
use crate::append::FileOptions;
use crate::append::file::FileWriter;
use crate::append::file::with_suffix;
use crate::append::lock;
use crate::record::Record;

const SECONDS_PER_DAY: i64 = 86_400;

/// The unit of a [`TimedRotation`] interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum When {
    Seconds,
    Minutes,
    #[default]
    Hours,
    Days,
    /// Roll over at midnight, or at the configured time of day.
    Midnight,
    /// Roll over on a weekday, `0` being Monday.
    Weekday(u8),
}

impl When {
    fn unit_seconds(&self) -> i64 {
        match self {
            When::Seconds => 1,
            When::Minutes => 60,
            When::Hours => 3_600,
            When::Days | When::Midnight => SECONDS_PER_DAY,
            When::Weekday(_) => SECONDS_PER_DAY * 7,
        }
    }

    /// The strftime pattern appended to rotated file names.
    pub fn suffix(&self) -> &'static str {
        match self {
            When::Seconds => "%Y-%m-%d_%H-%M-%S",
            When::Minutes => "%Y-%m-%d_%H-%M",
            When::Hours => "%Y-%m-%d_%H",
            When::Days | When::Midnight | When::Weekday(_) => "%Y-%m-%d",
        }
    }
}

impl FromStr for When {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "S" => Ok(When::Seconds),
            "M" => Ok(When::Minutes),
            "H" => Ok(When::Hours),
            "D" => Ok(When::Days),
            "MIDNIGHT" => Ok(When::Midnight),
            _ => match upper.strip_prefix('W').map(str::parse::<u8>) {
                Some(Ok(day)) if day <= 6 => Ok(When::Weekday(day)),
                _ => Err(Error::new(
                    ErrorKind::InvalidConfig,
                    format!("invalid rollover interval specified: {s}"),
                )),
            },
        }
    }
}

/// When and how a [`TimedRotatingFile`] rolls over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRotation {
    pub when: When,
    pub interval: u32,
    /// How many rotated files to keep; `0` keeps all of them.
    pub backup_count: usize,
    /// Compute boundaries and suffixes in UTC instead of local time.
    pub utc: bool,
    /// Time of day for [`When::Midnight`] and [`When::Weekday`] rollovers.
    pub at_time: Option<Time>,
}

impl Default for TimedRotation {
    fn default() -> Self {
        TimedRotation {
            when: When::default(),
            interval: 1,
            backup_count: 0,
            utc: false,
            at_time: None,
        }
    }
}

impl TimedRotation {
    fn interval_seconds(&self) -> i64 {
        self.when.unit_seconds() * i64::from(self.interval.max(1))
    }

    /// Returns the epoch second of the first boundary after `current`.
    fn compute_rollover(&self, current: i64, tz: &TimeZone) -> io::Result<i64> {
        let interval = self.interval_seconds();
        let mut result = current + interval;

        if matches!(self.when, When::Midnight | When::Weekday(_)) {
            let local = to_timestamp(current)?.to_zoned(tz.clone());
            let elapsed = (i64::from(local.hour()) * 60 + i64::from(local.minute())) * 60
                + i64::from(local.second());
            let mut day = local.weekday().to_monday_zero_offset();

            let rotate_at = match self.at_time {
                Some(at) => {
                    (i64::from(at.hour()) * 60 + i64::from(at.minute())) * 60
                        + i64::from(at.second())
                }
                None => SECONDS_PER_DAY,
            };
            let mut remaining = rotate_at - elapsed;
            if remaining <= 0 {
                remaining += SECONDS_PER_DAY;
                day = (day + 1) % 7;
            }
            result = current + remaining;

            if let When::Weekday(target) = self.when {
                let target = target as i8;
                if day != target {
                    let wait = if day < target {
                        target - day
                    } else {
                        6 - day + target + 1
                    };
                    result += i64::from(wait) * SECONDS_PER_DAY;
                }
                result += interval - SECONDS_PER_DAY * 7;
            } else {
                result += interval - SECONDS_PER_DAY;
            }
        }

        Ok(result)
    }
}

fn to_timestamp(second: i64) -> io::Result<Timestamp> {
    Timestamp::from_second(second).map_err(io::Error::other)
}

/// Turns a strftime suffix into a digit mask, e.g. `%Y-%m-%d` into `dddd-dd-dd`.
fn suffix_mask(suffix: &str) -> String {
    let mut mask = String::new();
    let mut chars = suffix.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('Y') => mask.push_str("dddd"),
                Some(_) => mask.push_str("dd"),
                None => mask.push('%'),
            }
        } else {
            mask.push(c);
        }
    }
    mask
}

fn matches_mask(candidate: &str, mask: &str) -> bool {
    if candidate.len() < mask.len() || !candidate.is_char_boundary(mask.len()) {
        return false;
    }
    let (head, rest) = candidate.split_at(mask.len());
    let head_matches = head.chars().zip(mask.chars()).all(|(c, m)| match m {
        'd' => c.is_ascii_digit(),
        m => c == m,
    });
    head_matches && (rest.is_empty() || rest.starts_with('.'))
}

/// Where rollover decisions read the current time from.
#[derive(Debug)]
enum Clock {
    System,
    #[cfg(test)]
    Fixed(Zoned),
}

impl Clock {
    fn now(&self) -> Zoned {
        match self {
            Clock::System => Zoned::now(),
            #[cfg(test)]
            Clock::Fixed(now) => now.clone(),
        }
    }
}

#[derive(Debug)]
struct State {
    writer: FileWriter,
    rotation: TimedRotation,
    clock: Clock,
    rollover_at: i64,
}

impl State {
    fn time_zone(&self) -> TimeZone {
        if self.rotation.utc {
            TimeZone::UTC
        } else {
            self.clock.now().time_zone().clone()
        }
    }

    fn rollover(&mut self, now: i64) -> io::Result<()> {
        self.writer.release()?;

        let tz = self.time_zone();
        let interval = self.rotation.interval_seconds();
        let start = to_timestamp(self.rollover_at - interval)?.to_zoned(tz.clone());
        let base = self.writer.path().to_path_buf();
        let target = with_suffix(&base, start.strftime(self.rotation.when.suffix()).to_string());

        if target.exists() {
            fs::remove_file(&target)?;
        }
        if base.exists() {
            fs::rename(&base, &target)?;
        }
        if self.rotation.backup_count > 0 {
            for expired in self.expired_files(&base)? {
                fs::remove_file(expired)?;
            }
        }
        self.writer.open()?;

        let mut next = self.rotation.compute_rollover(now, &tz)?;
        while next <= now {
            next += interval;
        }
        self.rollover_at = next;
        Ok(())
    }

    /// Rotated siblings beyond the backup count, oldest first.
    fn expired_files(&self, base: &Path) -> io::Result<Vec<PathBuf>> {
        let (Some(dir), Some(name)) = (base.parent(), base.file_name().and_then(|n| n.to_str()))
        else {
            return Ok(vec![]);
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let prefix = format!("{name}.");
        let mask = suffix_mask(self.rotation.when.suffix());

        let mut rotated = fs::read_dir(dir)?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let file_name = entry.file_name();
                let file_name = file_name.to_str()?;
                let stamp = file_name.strip_prefix(&prefix)?;
                matches_mask(stamp, &mask).then(|| entry.path())
            })
            .collect::<Vec<_>>();

        if rotated.len() <= self.rotation.backup_count {
            return Ok(vec![]);
        }
        rotated.sort();
        let excess = rotated.len() - self.rotation.backup_count;
        rotated.truncate(excess);
        Ok(rotated)
    }
}

/// A file appender that rolls over at time boundaries.
///
/// Rotated files are named `<file>.<timestamp>`, the timestamp marking the start of the
/// interval they cover.
#[derive(Debug)]
pub struct TimedRotatingFile {
    state: Mutex<State>,
}

impl TimedRotatingFile {
    pub fn new(
        path: impl Into<PathBuf>,
        options: FileOptions,
        rotation: TimedRotation,
    ) -> Result<Self, Error> {
        Self::with_clock(path.into(), options, rotation, Clock::System)
    }

    fn with_clock(
        path: PathBuf,
        options: FileOptions,
        rotation: TimedRotation,
        clock: Clock,
    ) -> Result<Self, Error> {
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| Timestamp::try_from(t).ok());
        let writer = FileWriter::new(path, options)?;

        let mut state = State {
            writer,
            rotation,
            clock,
            rollover_at: 0,
        };
        let start = modified.unwrap_or_else(|| state.clock.now().timestamp());
        let tz = state.time_zone();
        state.rollover_at = state
            .rotation
            .compute_rollover(start.as_second(), &tz)
            .map_err(|err| state.writer.error("failed to compute rollover time", err))?;

        Ok(TimedRotatingFile {
            state: Mutex::new(state),
        })
    }
}

impl Append for TimedRotatingFile {
    fn append(&self, _: &Record, formatted: &[u8]) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.writer.is_closed() {
            return Ok(());
        }

        let now = state.clock.now().timestamp().as_second();
        if now >= state.rollover_at {
            if let Err(err) = state.rollover(now) {
                return Err(state.writer.error("failed to rotate log file", err));
            }
        }

        match state.writer.write_line(formatted) {
            Ok(_) => Ok(()),
            Err(err) => Err(state.writer.error("failed to write log file", err)),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state
            .writer
            .flush()
            .map_err(|err| state.writer.error("failed to flush log file", err))
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state
            .writer
            .close()
            .map_err(|err| state.writer.error("failed to close log file", err))
    }
}
