use std::fmt;
use std::str::FromStr;

use serde::{de, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{CellqlError, Result};

/// Semantic type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Id,
    ForeignKey,
    SingleLineText,
    LongText,
    Email,
    PhoneNumber,
    Url,
    Number,
    Decimal,
    Currency,
    Percent,
    Duration,
    Rating,
    Checkbox,
    Date,
    DateTime,
    Time,
    Year,
    CreatedTime,
    LastModifiedTime,
    AutoNumber,
    SingleSelect,
    MultiSelect,
    LinkToAnotherRecord,
    Links,
    Lookup,
    Rollup,
    Formula,
    Attachment,
    Json,
}

impl ColumnType {
    /// Virtual columns have no physical storage on their own table.
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            ColumnType::LinkToAnotherRecord
                | ColumnType::Links
                | ColumnType::Lookup
                | ColumnType::Rollup
                | ColumnType::Formula
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnType::Number
                | ColumnType::Decimal
                | ColumnType::Currency
                | ColumnType::Percent
                | ColumnType::Duration
                | ColumnType::Rating
                | ColumnType::Year
                | ColumnType::AutoNumber
        )
    }

    pub fn is_date(self) -> bool {
        matches!(
            self,
            ColumnType::Date
                | ColumnType::DateTime
                | ColumnType::CreatedTime
                | ColumnType::LastModifiedTime
        )
    }

    pub fn is_system(self) -> bool {
        matches!(
            self,
            ColumnType::Id
                | ColumnType::ForeignKey
                | ColumnType::AutoNumber
                | ColumnType::CreatedTime
                | ColumnType::LastModifiedTime
        )
    }

    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            ColumnType::SingleLineText
                | ColumnType::LongText
                | ColumnType::Email
                | ColumnType::PhoneNumber
                | ColumnType::Url
                | ColumnType::SingleSelect
                | ColumnType::MultiSelect
        )
    }

    pub fn is_link(self) -> bool {
        matches!(self, ColumnType::LinkToAnotherRecord | ColumnType::Links)
    }

    /// Whether an aggregation category applies to a value of this type.
    ///
    /// Virtual types are expected to be mapped to their effective type first;
    /// only the common category applies to them directly.
    pub fn supports_aggregation(self, category: AggregationCategory) -> bool {
        match category {
            AggregationCategory::Common => true,
            AggregationCategory::Numerical => self.is_numeric(),
            AggregationCategory::Boolean => self == ColumnType::Checkbox,
            AggregationCategory::Date => self.is_date(),
            AggregationCategory::Attachment => self == ColumnType::Attachment,
        }
    }
}

/// Cardinality of a link between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    HasMany,
    BelongsTo,
    ManyToMany,
    OneToOne,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::HasMany => "has_many",
            RelationType::BelongsTo => "belongs_to",
            RelationType::ManyToMany => "many_to_many",
            RelationType::OneToOne => "one_to_one",
        }
    }

    /// BelongsTo and OneToOne reach at most one related row.
    pub fn is_to_one(self) -> bool {
        matches!(self, RelationType::BelongsTo | RelationType::OneToOne)
    }

    /// Parse a relation type for a given link column.
    pub fn parse_for(column: &str, raw: &str) -> Result<Self> {
        raw.parse().map_err(|_| CellqlError::UnsupportedRelation {
            column: column.to_string(),
            relation: raw.to_string(),
        })
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "has_many" | "hm" => Ok(RelationType::HasMany),
            "belongs_to" | "bt" => Ok(RelationType::BelongsTo),
            "many_to_many" | "mm" => Ok(RelationType::ManyToMany),
            "one_to_one" | "oo" => Ok(RelationType::OneToOne),
            other => Err(format!("unsupported relation type '{other}'")),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RelationType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Junction (many-to-many) table reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JunctionOptions {
    pub model: String,
    /// Junction column pointing at the child (current) side.
    pub child_column: String,
    /// Junction column pointing at the parent (related) side.
    pub parent_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationOptions {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub child_column: String,
    pub parent_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction: Option<JunctionOptions>,
}

/// Aggregate functions a rollup may apply. The enum is the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Avg,
    Sum,
    #[serde(alias = "countDistinct")]
    CountDistinct,
    #[serde(alias = "sumDistinct")]
    SumDistinct,
    #[serde(alias = "avgDistinct")]
    AvgDistinct,
}

impl AggregateFunction {
    /// MIN/MAX yield a value of the aggregated column's own type.
    pub fn preserves_type(self) -> bool {
        matches!(self, AggregateFunction::Min | AggregateFunction::Max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollupOptions {
    pub relation_column: String,
    pub target_column: String,
    pub function: AggregateFunction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupOptions {
    pub relation_column: String,
    pub target_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaResultType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

/// Opaque formula handle. Only the formula compiler looks inside `expression`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaOptions {
    pub expression: String,
    #[serde(default)]
    pub result_type: FormulaResultType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOptions {
    Relation(RelationOptions),
    Rollup(RollupOptions),
    Lookup(LookupOptions),
    Formula(FormulaOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub id: String,
    pub title: String,
    /// Physical column name; `None` for virtual columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub model_id: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub options: Option<ColumnOptions>,
}

impl Column {
    /// A column backed by a physical table column.
    pub fn physical(
        id: impl Into<String>,
        column_name: impl Into<String>,
        column_type: ColumnType,
        model_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Column {
            title: id.clone(),
            id,
            column_name: Some(column_name.into()),
            column_type,
            model_id: model_id.into(),
            options: None,
        }
    }

    /// A virtual column described entirely by its options.
    pub fn virtual_column(
        id: impl Into<String>,
        column_type: ColumnType,
        model_id: impl Into<String>,
        options: ColumnOptions,
    ) -> Self {
        let id = id.into();
        Column {
            title: id.clone(),
            id,
            column_name: None,
            column_type,
            model_id: model_id.into(),
            options: Some(options),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn relation_options(&self) -> Option<&RelationOptions> {
        match &self.options {
            Some(ColumnOptions::Relation(opts)) => Some(opts),
            _ => None,
        }
    }

    pub fn rollup_options(&self) -> Option<&RollupOptions> {
        match &self.options {
            Some(ColumnOptions::Rollup(opts)) => Some(opts),
            _ => None,
        }
    }

    pub fn lookup_options(&self) -> Option<&LookupOptions> {
        match &self.options {
            Some(ColumnOptions::Lookup(opts)) => Some(opts),
            _ => None,
        }
    }

    pub fn formula_options(&self) -> Option<&FormulaOptions> {
        match &self.options {
            Some(ColumnOptions::Formula(opts)) => Some(opts),
            _ => None,
        }
    }

    /// Physical name, or a metadata error for virtual columns.
    pub fn physical_name(&self) -> Result<&str> {
        self.column_name.as_deref().ok_or_else(|| {
            CellqlError::Metadata(format!(
                "column {} ({:?}) has no physical column name",
                self.id, self.column_type
            ))
        })
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawRelation {
            #[serde(rename = "type")]
            relation_type: String,
            child_column: String,
            parent_column: String,
            #[serde(default)]
            junction: Option<JunctionOptions>,
        }

        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            id: String,
            #[serde(default)]
            title: Option<String>,
            #[serde(default)]
            column_name: Option<String>,
            #[serde(rename = "type")]
            column_type: ColumnType,
            #[serde(default)]
            model_id: Option<String>,
            #[serde(default)]
            relation: Option<RawRelation>,
            #[serde(default)]
            rollup: Option<RollupOptions>,
            #[serde(default)]
            lookup: Option<LookupOptions>,
            #[serde(default)]
            formula: Option<FormulaOptions>,
        }

        let raw = Raw::deserialize(deserializer)?;

        let blocks = [
            raw.relation.is_some(),
            raw.rollup.is_some(),
            raw.lookup.is_some(),
            raw.formula.is_some(),
        ];
        if blocks.iter().filter(|b| **b).count() > 1 {
            return Err(de::Error::custom(format!(
                "column {} declares more than one of relation/rollup/lookup/formula",
                raw.id
            )));
        }

        let options = match raw.column_type {
            ColumnType::LinkToAnotherRecord | ColumnType::Links => {
                let rel = raw.relation.ok_or_else(|| {
                    de::Error::custom(format!("link column {} requires a relation block", raw.id))
                })?;
                let relation_type =
                    RelationType::parse_for(&raw.id, &rel.relation_type).map_err(de::Error::custom)?;
                Some(ColumnOptions::Relation(RelationOptions {
                    relation_type,
                    child_column: rel.child_column,
                    parent_column: rel.parent_column,
                    junction: rel.junction,
                }))
            }
            ColumnType::Rollup => Some(ColumnOptions::Rollup(raw.rollup.ok_or_else(|| {
                de::Error::custom(format!("rollup column {} requires a rollup block", raw.id))
            })?)),
            ColumnType::Lookup => Some(ColumnOptions::Lookup(raw.lookup.ok_or_else(|| {
                de::Error::custom(format!("lookup column {} requires a lookup block", raw.id))
            })?)),
            ColumnType::Formula => Some(ColumnOptions::Formula(raw.formula.ok_or_else(|| {
                de::Error::custom(format!("formula column {} requires a formula block", raw.id))
            })?)),
            other => {
                if blocks.iter().any(|b| *b) {
                    return Err(de::Error::custom(format!(
                        "column {} of type {other:?} cannot carry relation/rollup/lookup/formula options",
                        raw.id
                    )));
                }
                if raw.column_name.is_none() {
                    return Err(de::Error::custom(format!(
                        "column {} of type {other:?} requires column_name",
                        raw.id
                    )));
                }
                None
            }
        };

        Ok(Column {
            title: raw.title.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            column_name: raw.column_name,
            column_type: raw.column_type,
            model_id: raw.model_id.unwrap_or_default(),
            options,
        })
    }
}

/// A table as seen by the schema designer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub id: String,
    pub title: String,
    pub table_name: String,
    pub primary_key: Option<String>,
    pub display_column: Option<String>,
    pub columns: Vec<Column>,
}

impl Model {
    pub fn new(id: impl Into<String>, table_name: impl Into<String>) -> Self {
        let id = id.into();
        Model {
            title: id.clone(),
            id,
            table_name: table_name.into(),
            primary_key: None,
            display_column: None,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.title == title)
    }

    /// Declared primary key, else the first `id`-typed column.
    pub fn primary_key_column(&self) -> Option<&Column> {
        match &self.primary_key {
            Some(id) => self.column(id),
            None => self
                .columns
                .iter()
                .find(|c| c.column_type == ColumnType::Id),
        }
    }

    /// Column that represents a row when it is shown through a link.
    pub fn display_column(&self) -> Option<&Column> {
        match &self.display_column {
            Some(id) => self.column(id),
            None => self.primary_key_column(),
        }
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            id: String,
            #[serde(default)]
            title: Option<String>,
            table_name: String,
            #[serde(default)]
            primary_key: Option<String>,
            #[serde(default)]
            display_column: Option<String>,
            #[serde(default)]
            columns: Vec<Column>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let mut columns = raw.columns;
        for column in &mut columns {
            if column.model_id.is_empty() {
                column.model_id = raw.id.clone();
            } else if column.model_id != raw.id {
                return Err(de::Error::custom(format!(
                    "column {} declares model {} but is listed under model {}",
                    column.id, column.model_id, raw.id
                )));
            }
        }

        Ok(Model {
            title: raw.title.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            table_name: raw.table_name,
            primary_key: raw.primary_key,
            display_column: raw.display_column,
            columns,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationCategory {
    Common,
    Numerical,
    Boolean,
    Date,
    Attachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommonAggregation {
    Count,
    CountEmpty,
    CountFilled,
    CountUnique,
    PercentEmpty,
    PercentFilled,
    PercentUnique,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericalAggregation {
    Avg,
    Min,
    Max,
    Sum,
    StandardDeviation,
    Range,
    Median,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanAggregation {
    Checked,
    Unchecked,
    PercentChecked,
    PercentUnchecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateAggregation {
    EarliestDate,
    LatestDate,
    DateRange,
    MonthRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentAggregation {
    AttachmentSize,
}

/// An aggregation kind together with its category.
///
/// Serialized as `{"category": "common", "kind": "percent_unique"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "category", content = "kind", rename_all = "snake_case")]
pub enum Aggregation {
    Common(CommonAggregation),
    Numerical(NumericalAggregation),
    Boolean(BooleanAggregation),
    Date(DateAggregation),
    Attachment(AttachmentAggregation),
}

impl Aggregation {
    pub fn category(&self) -> AggregationCategory {
        match self {
            Aggregation::Common(_) => AggregationCategory::Common,
            Aggregation::Numerical(_) => AggregationCategory::Numerical,
            Aggregation::Boolean(_) => AggregationCategory::Boolean,
            Aggregation::Date(_) => AggregationCategory::Date,
            Aggregation::Attachment(_) => AggregationCategory::Attachment,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Common(kind) => write!(f, "common/{kind:?}"),
            Aggregation::Numerical(kind) => write!(f, "numerical/{kind:?}"),
            Aggregation::Boolean(kind) => write!(f, "boolean/{kind:?}"),
            Aggregation::Date(kind) => write!(f, "date/{kind:?}"),
            Aggregation::Attachment(kind) => write!(f, "attachment/{kind:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        SortSpec {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        SortSpec {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub column: String,
    pub aggregation: Aggregation,
    /// Output alias; defaults to the column id.
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    pub model: String,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub model: String,
    #[serde(default)]
    pub aggregations: Vec<AggregationRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_yaml_requires_matching_block() {
        let yaml = r#"
id: orders_total
type: rollup
lookup:
  relation_column: a
  target_column: b
"#;
        let err = serde_yaml::from_str::<Column>(yaml).unwrap_err();
        assert!(err.to_string().contains("requires a rollup block"));
    }

    #[test]
    fn unknown_relation_type_names_the_column() {
        let yaml = r#"
id: orders_customer
type: link_to_another_record
relation:
  type: polymorphic
  child_column: a
  parent_column: b
"#;
        let err = serde_yaml::from_str::<Column>(yaml).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("polymorphic"));
        assert!(msg.contains("orders_customer"));
    }

    #[test]
    fn model_fills_column_model_ids() {
        let yaml = r#"
id: orders
table_name: orders
columns:
  - id: orders_id
    type: id
    column_name: id
"#;
        let model: Model = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(model.columns[0].model_id, "orders");
        assert_eq!(model.primary_key_column().unwrap().id, "orders_id");
        assert_eq!(model.display_column().unwrap().id, "orders_id");
    }

    #[test]
    fn aggregation_is_adjacently_tagged() {
        let agg: Aggregation =
            serde_json::from_str(r#"{"category":"common","kind":"percent_unique"}"#).unwrap();
        assert_eq!(agg, Aggregation::Common(CommonAggregation::PercentUnique));
        assert_eq!(agg.category(), AggregationCategory::Common);
    }

    #[test]
    fn rollup_function_accepts_camel_case_aliases() {
        let f: AggregateFunction = serde_json::from_str(r#""countDistinct""#).unwrap();
        assert_eq!(f, AggregateFunction::CountDistinct);
    }
}
