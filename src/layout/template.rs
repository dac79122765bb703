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

use std::borrow::Cow;

use crate::Error;
use crate::ErrorKind;
use crate::Record;

/// A layout compiled from a `%(field)s` style template.
///
/// Each placeholder takes the form `%(field)[flags][width][.precision]type` where `type` is one
/// of `s`, `r`, `d`, `i` or `f`, and `%%` stands for a literal percent sign. The template is
/// checked once, when the layout is created; formatting a record cannot fail afterwards.
///
/// # Examples
///
/// ```
/// use logcompose::Record;
/// use logcompose::Severity;
/// use logcompose::layout::Layout;
///
/// let layout = Layout::new("[%(levelname)-8s] %(name)s: %(message)s").unwrap();
/// let record = Record::new("app.db", Severity::Info, "connected");
/// assert_eq!(layout.format(&record), b"[INFO    ] app.db: connected");
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    template: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Field, Spec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    LevelName,
    LevelNo,
    Message,
    Msg,
    AscTime,
    Created,
    Msecs,
    RelativeCreated,
    PathName,
    FileName,
    Module,
    FuncName,
    LineNo,
    Process,
    Thread,
    ThreadName,
}

impl Field {
    fn parse(name: &str) -> Option<Field> {
        let field = match name {
            "name" => Field::Name,
            "levelname" => Field::LevelName,
            "levelno" => Field::LevelNo,
            "message" => Field::Message,
            "msg" => Field::Msg,
            "asctime" => Field::AscTime,
            "created" => Field::Created,
            "msecs" => Field::Msecs,
            "relativeCreated" => Field::RelativeCreated,
            "pathname" => Field::PathName,
            "filename" => Field::FileName,
            "module" => Field::Module,
            "funcName" => Field::FuncName,
            "lineno" => Field::LineNo,
            "process" => Field::Process,
            "thread" => Field::Thread,
            "threadName" => Field::ThreadName,
            _ => return None,
        };
        Some(field)
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Field::LevelNo
                | Field::Created
                | Field::Msecs
                | Field::RelativeCreated
                | Field::LineNo
                | Field::Process
                | Field::Thread
        )
    }

    fn value<'a>(&self, record: &'a Record) -> Value<'a> {
        match self {
            Field::Name => Value::Str(Cow::Borrowed(record.name())),
            Field::LevelName => Value::Str(Cow::Borrowed(record.severity().as_str())),
            Field::LevelNo => Value::Int(i64::from(record.severity().value())),
            Field::Message | Field::Msg => Value::Str(Cow::Borrowed(record.message())),
            Field::AscTime => Value::Str(Cow::Owned(asctime(record))),
            Field::Created => Value::Float(record.created()),
            Field::Msecs => Value::Float(f64::from(record.time().subsec_nanosecond()) / 1e6),
            Field::RelativeCreated => Value::Float(record.relative_created()),
            Field::PathName => Value::Str(Cow::Borrowed(record.file().unwrap_or_default())),
            Field::FileName => Value::Str(Cow::Borrowed(filename(record))),
            Field::Module => {
                let filename = filename(record);
                let module = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
                Value::Str(Cow::Borrowed(module))
            }
            Field::FuncName => Value::Str(Cow::Borrowed(
                record.module_path().unwrap_or("(unknown function)"),
            )),
            Field::LineNo => Value::Int(i64::from(record.line().unwrap_or_default())),
            Field::Process => Value::Int(i64::from(record.process())),
            Field::Thread => Value::Int(record.thread() as i64),
            Field::ThreadName => {
                Value::Str(Cow::Borrowed(record.thread_name().unwrap_or("<unnamed>")))
            }
        }
    }
}

fn filename(record: &Record) -> &str {
    let path = record.file().unwrap_or_default();
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn asctime(record: &Record) -> String {
    let time = record.time();
    format!(
        "{},{:03}",
        time.strftime("%Y-%m-%d %H:%M:%S"),
        time.millisecond()
    )
}

enum Value<'a> {
    Str(Cow<'a, str>),
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Str,
    Repr,
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Spec {
    left_align: bool,
    zero_pad: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: Option<Conversion>,
}

impl Spec {
    fn render(&self, value: Value<'_>, out: &mut String) {
        let text: Cow<str> = match (self.conversion, value) {
            (Some(Conversion::Str), Value::Str(s)) => match self.precision {
                Some(n) => Cow::Owned(s.chars().take(n).collect()),
                None => s,
            },
            (Some(Conversion::Repr), Value::Str(s)) => Cow::Owned(format!("'{s}'")),
            (Some(Conversion::Int), Value::Int(i)) => Cow::Owned(i.to_string()),
            (Some(Conversion::Int), Value::Float(f)) => Cow::Owned((f.trunc() as i64).to_string()),
            (Some(Conversion::Float), Value::Int(i)) => {
                Cow::Owned(format!("{:.*}", self.precision.unwrap_or(6), i as f64))
            }
            (Some(Conversion::Float), Value::Float(f)) => {
                Cow::Owned(format!("{:.*}", self.precision.unwrap_or(6), f))
            }
            (_, Value::Int(i)) => Cow::Owned(i.to_string()),
            (_, Value::Float(f)) => Cow::Owned(f.to_string()),
            (_, Value::Str(s)) => s,
        };

        let len = text.chars().count();
        let pad = self.width.map_or(0, |w| w.saturating_sub(len));
        if pad == 0 {
            out.push_str(&text);
        } else if self.left_align {
            out.push_str(&text);
            out.extend(std::iter::repeat_n(' ', pad));
        } else if self.zero_pad && self.conversion != Some(Conversion::Str) {
            match text.strip_prefix('-') {
                Some(digits) => {
                    out.push('-');
                    out.extend(std::iter::repeat_n('0', pad));
                    out.push_str(digits);
                }
                None => {
                    out.extend(std::iter::repeat_n('0', pad));
                    out.push_str(&text);
                }
            }
        } else {
            out.extend(std::iter::repeat_n(' ', pad));
            out.push_str(&text);
        }
    }
}

impl Layout {
    /// Compiles a template.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidConfig`] error if the template references an unknown field,
    /// applies a numeric conversion to a text field, or ends inside a placeholder.
    pub fn new(template: impl Into<String>) -> Result<Self, Error> {
        let template = template.into();
        let segments = parse(&template).map_err(|message| {
            Error::new(ErrorKind::InvalidConfig, message).with_context("format", &template)
        })?;
        Ok(Layout { template, segments })
    }

    /// The template this layout was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Formats a record, without a trailing newline.
    pub fn format(&self, record: &Record) -> Vec<u8> {
        self.format_to_string(record).into_bytes()
    }

    /// Formats a record into a string, without a trailing newline.
    pub fn format_to_string(&self, record: &Record) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field, spec) => spec.render(field.value(record), &mut out),
            }
        }
        out
    }
}

/// The bare `%(message)s` layout.
impl Default for Layout {
    fn default() -> Self {
        let spec = Spec {
            conversion: Some(Conversion::Str),
            ..Spec::default()
        };
        Layout {
            template: "%(message)s".to_string(),
            segments: vec![Segment::Field(Field::Message, spec)],
        }
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, String> {
    let mut segments = vec![];
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }

        match chars.next() {
            Some((_, '%')) => literal.push('%'),
            Some((_, '(')) => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, ')')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(format!("unterminated placeholder at {pos}")),
                    }
                }
                let field = Field::parse(&name).ok_or_else(|| format!("unknown field: {name}"))?;

                let mut spec = Spec::default();
                while let Some(&(_, c)) = chars.peek() {
                    match c {
                        '-' => spec.left_align = true,
                        '0' => spec.zero_pad = true,
                        ' ' | '+' | '#' => {}
                        _ => break,
                    }
                    chars.next();
                }
                spec.width = take_number(&mut chars);
                if let Some(&(_, '.')) = chars.peek() {
                    chars.next();
                    spec.precision = Some(take_number(&mut chars).unwrap_or(0));
                }

                spec.conversion = match chars.next() {
                    Some((_, 's')) => Some(Conversion::Str),
                    Some((_, 'r')) => Some(Conversion::Repr),
                    Some((_, 'd' | 'i')) if field.is_numeric() => Some(Conversion::Int),
                    Some((_, 'f')) if field.is_numeric() => Some(Conversion::Float),
                    Some((_, c)) => {
                        return Err(format!("unsupported conversion '{c}' for field {name}"));
                    }
                    None => return Err(format!("incomplete placeholder for field {name}")),
                };

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(field, spec));
            }
            Some((_, c)) => return Err(format!("unsupported format character '{c}' at {pos}")),
            None => return Err("incomplete format: template ends with '%'".to_string()),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn take_number(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use jiff::Zoned;

    use super::*;
    use crate::Severity;
    use crate::layout::DEFAULT_FORMAT;

    fn record() -> Record {
        Record::new("app.db", Severity::Warning, "pool exhausted")
            .with_time(Zoned::from_str("2024-08-10T17:12:52.0458+08[+08]").unwrap())
            .with_file("src/db/pool.rs")
            .with_line(42)
            .with_module_path("app::db::pool")
    }

    fn render(template: &str) -> String {
        Layout::new(template).unwrap().format_to_string(&record())
    }

    #[test]
    fn test_default_format() {
        assert_eq!(
            render(DEFAULT_FORMAT),
            "2024-08-10 17:12:52,045 app.db - app::db::pool [WARNING]: pool exhausted"
        );
    }

    #[test]
    fn test_source_fields() {
        assert_eq!(
            render("%(pathname)s|%(filename)s|%(module)s|%(lineno)d"),
            "src/db/pool.rs|pool.rs|pool|42"
        );
    }

    #[test]
    fn test_width_precision_and_flags() {
        assert_eq!(render("[%(levelname)-8s]"), "[WARNING ]");
        assert_eq!(render("[%(levelname)9s]"), "[  WARNING]");
        assert_eq!(render("[%(levelname).4s]"), "[WARN]");
        assert_eq!(render("%(levelno)05d"), "00030");
        assert_eq!(render("%(msecs)03d"), "045");
        assert_eq!(render("%(name)r"), "'app.db'");
        assert_eq!(render("100%% %(levelno)s"), "100% 30");
    }

    #[test]
    fn test_created_is_epoch_seconds() {
        let rendered = render("%(created).3f");
        assert_eq!(rendered, "1723281172.046");
    }

    #[test]
    fn test_rejects_malformed_templates() {
        for template in [
            "%(nope)s",
            "%(name)d",
            "%(name",
            "%(name)",
            "50%",
            "%s",
            "%(levelno)x",
        ] {
            let err = Layout::new(template).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig, "{template}");
        }
    }

    #[test]
    fn test_default_is_message_only() {
        let layout = Layout::default();
        assert_eq!(layout.template(), "%(message)s");
        assert_eq!(
            layout.format_to_string(&record()),
            Layout::new("%(message)s").unwrap().format_to_string(&record())
        );
    }

    #[test]
    fn test_template_is_kept() {
        let layout = Layout::new(DEFAULT_FORMAT).unwrap();
        assert_eq!(layout.template(), DEFAULT_FORMAT);
    }
}
