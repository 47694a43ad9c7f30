//! Import target fields and header auto-matching
//!
//! Column headers are matched against a declarative alias table. The
//! built-in table covers common retailer exports; users can extend it with a
//! TOML file:
//!
//! ```toml
//! [fields]
//! item_name = ["sku description"]
//! unit_price = ["net each"]
//! ```
//!
//! Extra aliases are appended to the built-in ones, never replacing them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// What kind of record each CSV row describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// One row per purchased item
    #[default]
    Items,
    /// One row per receipt (no items)
    Receipts,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Receipts => "receipts",
        }
    }

    /// Fields a user can map for this kind of import, in display order
    pub fn fields(&self) -> &'static [TargetField] {
        match self {
            Self::Items => &[
                TargetField::ItemName,
                TargetField::Quantity,
                TargetField::PurchaseDate,
                TargetField::Amount,
                TargetField::UnitPrice,
                TargetField::JobName,
                TargetField::StoreLocation,
            ],
            Self::Receipts => &[
                TargetField::JobName,
                TargetField::StoreLocation,
                TargetField::ReceiptDate,
                TargetField::Notes,
            ],
        }
    }
}

impl std::str::FromStr for ImportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "items" | "item" => Ok(Self::Items),
            "receipts" | "receipt" => Ok(Self::Receipts),
            _ => Err(format!("Unknown import kind: {}", s)),
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A domain field a CSV column can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    ItemName,
    Quantity,
    PurchaseDate,
    Amount,
    UnitPrice,
    JobName,
    StoreLocation,
    ReceiptDate,
    Notes,
}

impl TargetField {
    pub const ALL: [TargetField; 9] = [
        Self::ItemName,
        Self::Quantity,
        Self::PurchaseDate,
        Self::Amount,
        Self::UnitPrice,
        Self::JobName,
        Self::StoreLocation,
        Self::ReceiptDate,
        Self::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemName => "item_name",
            Self::Quantity => "quantity",
            Self::PurchaseDate => "purchase_date",
            Self::Amount => "amount",
            Self::UnitPrice => "unit_price",
            Self::JobName => "job_name",
            Self::StoreLocation => "store_location",
            Self::ReceiptDate => "receipt_date",
            Self::Notes => "notes",
        }
    }

    /// Human-readable name for prompts and error messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::ItemName => "Item Name",
            Self::Quantity => "Quantity",
            Self::PurchaseDate => "Purchase Date",
            Self::Amount => "Amount",
            Self::UnitPrice => "Unit Price",
            Self::JobName => "Job Name",
            Self::StoreLocation => "Store Location",
            Self::ReceiptDate => "Receipt Date",
            Self::Notes => "Notes",
        }
    }

    fn builtin_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::ItemName => &[
                "item",
                "itemname",
                "description",
                "product",
                "productname",
                "name",
                "desc",
            ],
            Self::Quantity => &["qty", "quantity", "count", "units"],
            Self::PurchaseDate => &["date", "purchasedate", "orderdate", "transactiondate"],
            Self::Amount => &[
                "total",
                "amount",
                "price",
                "extendedprice",
                "extendedretail",
                "linetotal",
                "subtotal",
            ],
            Self::UnitPrice => &[
                "unitprice",
                "unit",
                "eachprice",
                "priceperunit",
                "retail",
                "discountedprice",
            ],
            Self::JobName => &["job", "jobname", "project", "projectname"],
            Self::StoreLocation => &["store", "storelocation", "location", "vendor"],
            Self::ReceiptDate => &["date", "receiptdate", "purchasedate"],
            Self::Notes => &["notes", "note", "memo", "comments"],
        }
    }
}

impl std::str::FromStr for TargetField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = normalize_header(s);
        Self::ALL
            .into_iter()
            .find(|f| normalize_header(f.as_str()) == normalized)
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}

impl std::fmt::Display for TargetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lower-case a header and strip underscores, hyphens and whitespace
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Field → column index. Unmapped fields are skipped during import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<TargetField, usize>);

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: TargetField, column: usize) {
        self.0.insert(field, column);
    }

    pub fn with(mut self, field: TargetField, column: usize) -> Self {
        self.set(field, column);
        self
    }

    pub fn skip(&mut self, field: TargetField) {
        self.0.remove(&field);
    }

    pub fn get(&self, field: TargetField) -> Option<usize> {
        self.0.get(&field).copied()
    }

    pub fn contains(&self, field: TargetField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetField, usize)> + '_ {
        self.0.iter().map(|(f, c)| (*f, *c))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Alias table used for header auto-matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    aliases: BTreeMap<TargetField, Vec<String>>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        let aliases = TargetField::ALL
            .into_iter()
            .map(|field| {
                let list = field
                    .builtin_aliases()
                    .iter()
                    .map(|a| a.to_string())
                    .collect();
                (field, list)
            })
            .collect();
        Self { aliases }
    }
}

impl FieldAliases {
    /// Built-in aliases plus, when present, the user's override file.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut aliases = Self::default();

        let path = match override_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::InvalidData(format!(
                        "Alias file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => default_config_path().filter(|p| p.exists()),
        };

        if let Some(path) = path {
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::InvalidData(format!("Failed to read alias file: {}", e)))?;
            aliases.extend_from_toml(&content)?;
            debug!(path = %path.display(), "Loaded column aliases");
        }

        Ok(aliases)
    }

    /// Append aliases from TOML content
    pub fn extend_from_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawAliases = toml::from_str(content)
            .map_err(|e| Error::InvalidData(format!("Invalid alias TOML: {}", e)))?;

        for (name, extra) in raw.fields.unwrap_or_default() {
            let field: TargetField = name.parse().map_err(Error::InvalidData)?;
            let list = self.aliases.entry(field).or_default();
            for alias in extra {
                let alias = normalize_header(&alias);
                if !alias.is_empty() && !list.contains(&alias) {
                    list.push(alias);
                }
            }
        }
        Ok(())
    }

    pub fn aliases(&self, field: TargetField) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a raw header names the given field
    pub fn matches(&self, header: &str, field: TargetField) -> bool {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            return false;
        }
        normalized == normalize_header(field.as_str())
            || self.aliases(field).iter().any(|a| *a == normalized)
    }

    /// Suggest a mapping: for each field of `kind`, the first matching column
    pub fn suggest_mapping(&self, headers: &[String], kind: ImportKind) -> ColumnMapping {
        let mut mapping = ColumnMapping::new();
        for field in kind.fields() {
            if let Some(idx) = headers.iter().position(|h| self.matches(h, *field)) {
                mapping.set(*field, idx);
            }
        }
        mapping
    }
}

/// Default location of the user's alias override file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("aliases.toml"))
}

#[derive(Debug, Deserialize)]
struct RawAliases {
    fields: Option<HashMap<String, Vec<String>>>,
}
