//! Query constraints decoded from the host.
//!
//! A [`ConstraintExpression`] is a tree of comparisons joined by `and`, `or` and `not`. It is
//! built once by the [`Decoder`](crate::Decoder), never mutated, and can be rendered back to the
//! exact grammar the decoder accepts or evaluated against a [`HealthRecord`].

use crate::number::format_bridge;
use crate::wf::Element;
use crate::{WireError, WireResult};
use bridge_types::format_timestamp;
use chrono::{DateTime, Utc};
use health_records::{DefaultUnits, HealthRecord, MetadataValue};
use std::cmp::Ordering;

/// Type of a literal operand, as named by the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralType {
    Date,
    Number,
    Text,
}

impl LiteralType {
    pub fn as_str(self) -> &'static str {
        match self {
            LiteralType::Date => "date",
            LiteralType::Number => "number",
            LiteralType::Text => "string",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "date" => Some(LiteralType::Date),
            "number" => Some(LiteralType::Number),
            "string" => Some(LiteralType::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Date(DateTime<Utc>),
    Number(f64),
    Text(String),
}

impl Literal {
    pub fn literal_type(&self) -> LiteralType {
        match self {
            Literal::Date(_) => LiteralType::Date,
            Literal::Number(_) => LiteralType::Number,
            Literal::Text(_) => LiteralType::Text,
        }
    }

    /// Wire form of the value.
    pub fn render(&self) -> String {
        match self {
            Literal::Date(date) => format_timestamp(date),
            Literal::Number(n) => format_bridge(*n),
            Literal::Text(text) => text.clone(),
        }
    }

    fn compare(&self, other: &Literal) -> Option<Ordering> {
        match (self, other) {
            (Literal::Date(a), Literal::Date(b)) => Some(a.cmp(b)),
            (Literal::Number(a), Literal::Number(b)) => a.partial_cmp(b),
            (Literal::Text(a), Literal::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Between,
    Contains,
    BeginsWith,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::Between,
        Operator::Contains,
        Operator::BeginsWith,
    ];

    /// Tag written on the wire.
    pub fn tag(self) -> &'static str {
        match self {
            Operator::Equals => "eq",
            Operator::NotEquals => "ne",
            Operator::LessThan => "lt",
            Operator::LessThanOrEqual => "le",
            Operator::GreaterThan => "gt",
            Operator::GreaterThanOrEqual => "ge",
            Operator::Between => "between",
            Operator::Contains => "contains",
            Operator::BeginsWith => "beginsWith",
        }
    }

    fn long_tag(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            other => other.tag(),
        }
    }

    /// Accepts both the short and the long tag.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.tag() == tag || op.long_tag() == tag)
    }

    pub fn is_text_only(self) -> bool {
        matches!(self, Operator::Contains | Operator::BeginsWith)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Literal),
    Range(Literal, Literal),
}

/// A `field OP literal` leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    field: String,
    operator: Operator,
    operand: Operand,
}

impl Comparison {
    /// # Errors
    ///
    /// Returns [`WireError::MalformedConstraint`] when the operand shape does not suit the
    /// operator: `between` needs a range of one type, `contains`/`beginsWith` need text, every
    /// other operator needs a single literal.
    pub fn new(field: impl Into<String>, operator: Operator, operand: Operand) -> WireResult<Self> {
        let field = field.into();
        let fragment = || format!("{} {} {:?}", field, operator.tag(), operand);
        if field.trim().is_empty() {
            return Err(WireError::malformed_constraint("missing field", fragment()));
        }
        match (&operand, operator) {
            (Operand::Range(lower, upper), Operator::Between) => {
                if lower.literal_type() != upper.literal_type() {
                    return Err(WireError::malformed_constraint(
                        "range bounds differ in type",
                        fragment(),
                    ));
                }
            }
            (Operand::Range(..), _) | (Operand::Single(_), Operator::Between) => {
                return Err(WireError::malformed_constraint(
                    "operand does not match operator",
                    fragment(),
                ));
            }
            (Operand::Single(literal), op) if op.is_text_only() => {
                if literal.literal_type() != LiteralType::Text {
                    return Err(WireError::malformed_constraint(
                        format!("{} only applies to strings", op.tag()),
                        fragment(),
                    ));
                }
            }
            (Operand::Single(_), _) => {}
        }
        Ok(Self {
            field,
            operator,
            operand,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    fn literal_type(&self) -> LiteralType {
        match &self.operand {
            Operand::Single(literal) | Operand::Range(literal, _) => literal.literal_type(),
        }
    }

    fn holds_for(&self, value: &Literal) -> bool {
        let ordering = |literal: &Literal| value.compare(literal);
        match (&self.operand, self.operator) {
            (Operand::Range(lower, upper), _) => {
                matches!(ordering(lower), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ordering(upper), Some(Ordering::Less | Ordering::Equal))
            }
            (Operand::Single(literal), Operator::Equals) => ordering(literal) == Some(Ordering::Equal),
            (Operand::Single(literal), Operator::NotEquals) => {
                matches!(ordering(literal), Some(Ordering::Less | Ordering::Greater))
            }
            (Operand::Single(literal), Operator::LessThan) => ordering(literal) == Some(Ordering::Less),
            (Operand::Single(literal), Operator::LessThanOrEqual) => {
                matches!(ordering(literal), Some(Ordering::Less | Ordering::Equal))
            }
            (Operand::Single(literal), Operator::GreaterThan) => {
                ordering(literal) == Some(Ordering::Greater)
            }
            (Operand::Single(literal), Operator::GreaterThanOrEqual) => {
                matches!(ordering(literal), Some(Ordering::Greater | Ordering::Equal))
            }
            (Operand::Single(Literal::Text(needle)), Operator::Contains) => {
                matches!(value, Literal::Text(hay) if hay.contains(needle.as_str()))
            }
            (Operand::Single(Literal::Text(prefix)), Operator::BeginsWith) => {
                matches!(value, Literal::Text(hay) if hay.starts_with(prefix.as_str()))
            }
            _ => false,
        }
    }

    fn to_wire(&self) -> Element {
        let element = Element::new(self.operator.tag())
            .attr("field", self.field.as_str())
            .attr("type", self.literal_type().as_str());
        match &self.operand {
            Operand::Single(literal) => element.attr("value", literal.render()),
            Operand::Range(lower, upper) => element
                .attr("lower", lower.render())
                .attr("upper", upper.render()),
        }
    }
}

/// A predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintExpression {
    Comparison(Comparison),
    And(Vec<ConstraintExpression>),
    Or(Vec<ConstraintExpression>),
    Not(Box<ConstraintExpression>),
}

impl ConstraintExpression {
    /// Whether `record` satisfies the tree.
    ///
    /// Quantity values are compared in the default unit of their type. A comparison whose field is
    /// absent from the record, or whose literal has a different type than the field, is false.
    pub fn matches(&self, record: &HealthRecord, units: &DefaultUnits) -> bool {
        match self {
            ConstraintExpression::Comparison(comparison) => {
                field_value(record, comparison.field(), comparison.literal_type(), units)
                    .is_some_and(|value| comparison.holds_for(&value))
            }
            ConstraintExpression::And(children) => children.iter().all(|c| c.matches(record, units)),
            ConstraintExpression::Or(children) => children.iter().any(|c| c.matches(record, units)),
            ConstraintExpression::Not(child) => !child.matches(record, units),
        }
    }

    pub fn to_wire(&self) -> Element {
        match self {
            ConstraintExpression::Comparison(comparison) => comparison.to_wire(),
            ConstraintExpression::And(children) => children
                .iter()
                .fold(Element::new("and"), |el, c| el.child(c.to_wire())),
            ConstraintExpression::Or(children) => children
                .iter()
                .fold(Element::new("or"), |el, c| el.child(c.to_wire())),
            ConstraintExpression::Not(child) => Element::new("not").child(child.to_wire()),
        }
    }

    pub fn to_xml(&self) -> String {
        self.to_wire().to_xml()
    }
}

/// Read one named field of a record, shaped as the requested literal type where that makes sense.
fn field_value(
    record: &HealthRecord,
    field: &str,
    wanted: LiteralType,
    units: &DefaultUnits,
) -> Option<Literal> {
    if let Some(key) = field.strip_prefix("metadata.") {
        let value = record.header()?.metadata.get(key)?;
        return metadata_literal(value, wanted);
    }

    match field {
        "startDate" => record.start().map(Literal::Date),
        "endDate" => record.end().map(Literal::Date),
        "type" | "dataType" => record
            .data_type()
            .map(|t| Literal::Text(t.identifier().to_owned())),
        "uuid" => record
            .header()
            .and_then(|h| h.uuid)
            .map(|u| Literal::Text(u.to_string())),
        "source" | "sourceName" => record
            .header()
            .and_then(|h| h.source.as_ref())
            .map(|s| Literal::Text(s.name.as_str().to_owned())),
        "bundleID" => record
            .header()
            .and_then(|h| h.source.as_ref())
            .map(|s| Literal::Text(s.bundle_id.as_str().to_owned())),
        "value" => value_field(record, wanted, units),
        "unit" => match record {
            HealthRecord::Quantity(sample) => units
                .resolve(&sample.data_type)
                .ok()
                .map(|u| Literal::Text(u.symbol().to_owned())),
            _ => None,
        },
        "duration" => match record {
            HealthRecord::Workout(workout) => workout.duration.map(Literal::Number),
            other => {
                let (start, end) = (other.start()?, other.end()?);
                Some(Literal::Number((end - start).num_milliseconds() as f64 / 1000.0))
            }
        },
        "activityType" => match record {
            HealthRecord::Workout(workout) => Some(match wanted {
                LiteralType::Text => Literal::Text(workout.activity_type.label().to_owned()),
                _ => Literal::Number(workout.activity_type.code() as f64),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn value_field(record: &HealthRecord, wanted: LiteralType, units: &DefaultUnits) -> Option<Literal> {
    match record {
        HealthRecord::Quantity(sample) => {
            let unit = units.resolve(&sample.data_type).ok()?;
            sample.quantity.value_in(unit).ok().map(Literal::Number)
        }
        HealthRecord::Category(sample) => match wanted {
            LiteralType::Text => sample.label().map(|l| Literal::Text(l.to_owned())),
            _ => Some(Literal::Number(sample.value as f64)),
        },
        HealthRecord::CombinedTotal(total) => {
            let unit = units.resolve(&total.data_type).ok()?;
            total.value.value_in(unit).ok().map(Literal::Number)
        }
        HealthRecord::Pedometer(summary) => Some(Literal::Number(summary.steps as f64)),
        _ => None,
    }
}

fn metadata_literal(value: &MetadataValue, wanted: LiteralType) -> Option<Literal> {
    match value {
        MetadataValue::Text(text) => Some(Literal::Text(text.clone())),
        MetadataValue::Number(n) => Some(Literal::Number(*n)),
        MetadataValue::Date(date) => Some(Literal::Date(*date)),
        MetadataValue::Quantity(quantity) => Some(Literal::Number(quantity.value)),
        MetadataValue::Bool(b) => Some(match wanted {
            LiteralType::Number => Literal::Number(if *b { 1.0 } else { 0.0 }),
            _ => Literal::Text(b.to_string()),
        }),
        MetadataValue::Dictionary(_) => None,
    }
}
