//! Field extraction configuration.
//!
//! Two input modes produce the column set of a run:
//! - a JSON array of field records (config mode), validated into [`FieldSet`];
//! - ad-hoc `coord_<name>=<geometry>` / `reg_<name>=<regex>` arguments,
//!   parsed into [`AdHocFields`].
//!
//! Both are validated once at startup and are immutable afterwards. Regexes
//! are compiled here, never lazily during extraction.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of ad-hoc arguments that select coordinate extraction.
pub const COORDINATE_PREFIX: &str = "coord_";

/// Prefix of ad-hoc arguments that select regex extraction.
pub const REGEX_PREFIX: &str = "reg_";

/// A text backend consulted by the regex method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextSource {
    /// External text-extraction tool (xpdf `pdftotext`).
    ExternalTool,
    /// In-process PDF parser.
    NativeParser,
    /// OCR over the rasterized page.
    Ocr,
}

impl TextSource {
    /// Order used when a field does not name its own sources.
    pub const DEFAULT_PRIORITY: [TextSource; 3] =
        [TextSource::ExternalTool, TextSource::NativeParser, TextSource::Ocr];
}

impl FromStr for TextSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdftotext" | "xpdf" => Ok(TextSource::ExternalTool),
            "unipdf" | "native" => Ok(TextSource::NativeParser),
            "ocr" => Ok(TextSource::Ocr),
            other => Err(format!("unknown text source: {other}")),
        }
    }
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextSource::ExternalTool => write!(f, "pdftotext"),
            TextSource::NativeParser => write!(f, "native"),
            TextSource::Ocr => write!(f, "ocr"),
        }
    }
}

/// Machine-readable code symbologies the scan method can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    /// QR code.
    Qr,
    /// Code 128 linear barcode.
    Barcode128,
}

impl FromStr for CodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qrcode" | "qr" => Ok(CodeKind::Qr),
            "barcode128" | "code128" => Ok(CodeKind::Barcode128),
            other => Err(format!("unsupported code type: {other}")),
        }
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::Qr => write!(f, "qrcode"),
            CodeKind::Barcode128 => write!(f, "barcode128"),
        }
    }
}

/// Pixel rectangle `[min_x, min_y, max_x, max_y]` cropped out of a rasterized page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    fn from_values(values: &[i64]) -> Result<Self, String> {
        let [min_x, min_y, max_x, max_y] = values else {
            return Err(format!(
                "crop_coordinates needs 4 values, got {}",
                values.len()
            ));
        };
        let to_u32 = |v: i64| u32::try_from(v).map_err(|_| format!("invalid crop value {v}"));
        let crop = CropBox {
            min_x: to_u32(*min_x)?,
            min_y: to_u32(*min_y)?,
            max_x: to_u32(*max_x)?,
            max_y: to_u32(*max_y)?,
        };
        if crop.min_x >= crop.max_x || crop.min_y >= crop.max_y {
            return Err("crop_coordinates must satisfy min < max".to_string());
        }
        Ok(crop)
    }
}

/// How a field is extracted, with the data that method needs.
#[derive(Debug, Clone)]
pub enum FieldMethod {
    /// Text inside a page-anchored geometry.
    Coordinate { geometry: String },
    /// First capture group of a regex, tried against each text source in order.
    RegexText {
        pattern: Regex,
        sources: Vec<TextSource>,
    },
    /// Decode a code from the page's images, optionally retrying on a crop.
    Scan {
        code: CodeKind,
        crop: Option<CropBox>,
    },
}

impl FieldMethod {
    /// Short method name, as spelled in config files.
    pub fn name(&self) -> &'static str {
        match self {
            FieldMethod::Coordinate { .. } => "tet",
            FieldMethod::RegexText { .. } => "reg",
            FieldMethod::Scan { .. } => "scan",
        }
    }
}

/// One validated extraction rule: a named output column read from one page.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Output column name, unique within a [`FieldSet`].
    pub name: String,
    /// 1-based page number.
    pub page: u32,
    /// Extraction method.
    pub method: FieldMethod,
}

/// A field record as written in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFieldConfig {
    pub field_name: String,

    #[serde(default = "default_page")]
    pub page_num: i64,

    /// `tet`, `reg` or `scan` (case-insensitive).
    pub extract_method: String,

    /// Text source priority for `reg`; defaults to `[pdftotext, unipdf, ocr]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_extract_tool: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tet_coordinates: Vec<String>,

    /// `[min_x, min_y, max_x, max_y]`, used only as a scan fallback.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crop_coordinates: Vec<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reg_exp: String,

    /// `qrcode` or `barcode128`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_type: String,
}

fn default_page() -> i64 {
    1
}

impl RawFieldConfig {
    /// Validate the record and compile its pattern.
    pub fn validate(&self) -> Result<FieldConfig, ConfigError> {
        let name = self.field_name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "<unnamed>".to_string(),
                reason: "field_name is empty".to_string(),
            });
        }
        let invalid = |reason: String| ConfigError::InvalidField {
            field: name.to_string(),
            reason,
        };

        let page = u32::try_from(self.page_num)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| invalid(format!("page_num must be >= 1, got {}", self.page_num)))?;

        let method = match self.extract_method.trim().to_lowercase().as_str() {
            "tet" => {
                let geometry = self.tet_coordinates.join(" ");
                if geometry.trim().is_empty() {
                    return Err(invalid("tet_coordinates is empty".to_string()));
                }
                FieldMethod::Coordinate { geometry }
            }
            "reg" => {
                let pattern = compile_pattern(name, &self.reg_exp)?;
                let sources = match &self.text_extract_tool {
                    None => TextSource::DEFAULT_PRIORITY.to_vec(),
                    Some(tools) => {
                        let sources = tools
                            .iter()
                            .map(|t| t.parse::<TextSource>())
                            .collect::<Result<Vec<_>, _>>()
                            .map_err(invalid)?;
                        if sources.is_empty() {
                            return Err(invalid("text_extract_tool is empty".to_string()));
                        }
                        sources
                    }
                };
                FieldMethod::RegexText { pattern, sources }
            }
            "scan" => {
                if self.code_type.trim().is_empty() {
                    return Err(invalid("code_type is required for scan".to_string()));
                }
                let code = self.code_type.parse::<CodeKind>().map_err(invalid)?;
                let crop = if self.crop_coordinates.is_empty() {
                    None
                } else {
                    Some(CropBox::from_values(&self.crop_coordinates).map_err(invalid)?)
                };
                FieldMethod::Scan { code, crop }
            }
            other => return Err(invalid(format!("unknown extract_method: {other:?}"))),
        };

        Ok(FieldConfig {
            name: name.to_string(),
            page,
            method,
        })
    }
}

/// Compile a field pattern, requiring exactly one capture group.
pub fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidField {
            field: field.to_string(),
            reason: "reg_exp is empty".to_string(),
        });
    }
    let regex = Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        field: field.to_string(),
        source,
    })?;
    // Group 0 is the whole match.
    if regex.captures_len() != 2 {
        return Err(ConfigError::InvalidField {
            field: field.to_string(),
            reason: format!(
                "pattern must have exactly one capture group, found {}",
                regex.captures_len() - 1
            ),
        });
    }
    Ok(regex)
}

/// The ordered, validated field list of a config-mode run.
#[derive(Debug, Clone)]
pub struct FieldSet {
    fields: Vec<FieldConfig>,
}

impl FieldSet {
    /// Load and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON array of field records.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let raw: Vec<RawFieldConfig> = serde_json::from_str(content)?;
        Self::from_raw(&raw)
    }

    /// Validate raw records, preserving their order.
    pub fn from_raw(raw: &[RawFieldConfig]) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(raw.len());
        for record in raw {
            let field = record.validate()?;
            if !seen.insert(field.name.clone()) {
                return Err(ConfigError::DuplicateField(field.name));
            }
            fields.push(field);
        }

        Ok(Self { fields })
    }

    /// A single `code` column decoded from page 1, used by batch scans.
    pub fn scan(code: CodeKind) -> Self {
        Self {
            fields: vec![FieldConfig {
                name: "code".to_string(),
                page: 1,
                method: FieldMethod::Scan { code, crop: None },
            }],
        }
    }

    pub fn fields(&self) -> &[FieldConfig] {
        &self.fields
    }

    /// Output columns in config order.
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Whether any field reads past page 1, which requires splitting documents.
    pub fn needs_split(&self) -> bool {
        self.fields.iter().any(|f| f.page > 1)
    }

    /// Whether the set contains at least one coordinate field.
    pub fn has_coordinate_fields(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.method, FieldMethod::Coordinate { .. }))
    }
}

/// Fields supplied as ad-hoc `coord_`/`reg_` arguments.
#[derive(Debug, Clone, Default)]
pub struct AdHocFields {
    /// Field name to geometry, for coordinate extraction.
    pub coordinates: BTreeMap<String, String>,
    /// Field name to compiled pattern, for OCR + regex extraction.
    pub patterns: BTreeMap<String, Regex>,
}

impl AdHocFields {
    /// Parse raw arguments. Arguments without a known prefix are ignored;
    /// a repeated name keeps the last value.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let mut fields = AdHocFields::default();

        for arg in args {
            let arg = arg.as_ref();
            if let Some(rest) = arg.strip_prefix(COORDINATE_PREFIX) {
                let (name, geometry) = split_argument(arg, rest)?;
                fields.coordinates.insert(name.to_string(), geometry.to_string());
            } else if let Some(rest) = arg.strip_prefix(REGEX_PREFIX) {
                let (name, pattern) = split_argument(arg, rest)?;
                let regex = compile_pattern(name, pattern)?;
                fields.patterns.insert(name.to_string(), regex);
            }
        }

        if fields.coordinates.is_empty() && fields.patterns.is_empty() {
            return Err(ConfigError::NoArguments);
        }
        Ok(fields)
    }

    /// Deduplicated, lexicographically sorted field names.
    pub fn columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .coordinates
            .keys()
            .chain(self.patterns.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn split_argument<'a>(arg: &str, rest: &'a str) -> Result<(&'a str, &'a str), ConfigError> {
    let parts: Vec<&str> = rest.split('=').collect();
    match parts.as_slice() {
        [name, value] if !name.is_empty() => Ok((name, value)),
        _ => Err(ConfigError::MalformedArgument(arg.to_string())),
    }
}
