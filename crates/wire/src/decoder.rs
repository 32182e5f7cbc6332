//! Constraint Decoder: host strings in, typed query constraints out.

use crate::constraint::{Comparison, ConstraintExpression, Literal, LiteralType, Operand, Operator};
use crate::number::{parse_bridge, NumberFormat, NumberLocale};
use crate::wf::{tags, Element};
use crate::{WireError, WireResult};
use bridge_types::parse_timestamp;
use chrono::{DateTime, Utc};
use health_records::{CalendarUnit, DataType, IntervalSpec, RecordsError, StatisticsOption};

const LEGACY_TIMESPAN: &str = "timespan";
const PREDICATE_WRAPPER: &str = "predicate";

const COMPARISON_ATTRIBUTES: &[&str] = &["field", "type", "value", "localized"];
const BETWEEN_ATTRIBUTES: &[&str] = &["field", "type", "lower", "upper", "localized"];

/// Decodes host strings. Holds the user's locale for locale-aware numbers.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    locale: NumberLocale,
}

impl Decoder {
    pub fn new(locale: NumberLocale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> &NumberLocale {
        &self.locale
    }

    /// Parse a predicate document.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MalformedConstraint`] for malformed XML, unknown tags or types,
    /// missing fields or operands, unparseable literals and combinators with the wrong number of
    /// operands. The fragment is the offending node re-rendered, or the raw input when the XML
    /// itself does not parse.
    pub fn decode_predicate(&self, xml: &str) -> WireResult<ConstraintExpression> {
        let root = parse_constraint_xml(xml)?;
        let root = if root.tag == PREDICATE_WRAPPER {
            unwrap_predicate(root)?
        } else {
            root
        };
        self.expression(&root)
    }

    /// Parse an interval document.
    ///
    /// Accepts `<interval day="1" hour="6"/>` and the older
    /// `<timespan><d>1</d><H>6</H></timespan>` form. An all-zero interval is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MalformedConstraint`] for unknown units, non-integer counts and
    /// unknown root tags.
    pub fn decode_date_components(&self, xml: &str) -> WireResult<IntervalSpec> {
        let root = parse_constraint_xml(xml)?;
        match root.tag.as_str() {
            tags::INTERVAL => interval_from_attributes(&root),
            LEGACY_TIMESPAN => interval_from_timespan(&root),
            other => Err(WireError::malformed_constraint(
                format!("expected <interval>, found <{other}>"),
                root.to_xml(),
            )),
        }
    }

    /// Parse a number in the given format.
    ///
    /// `text` may be the bare number or a `<number value=".."/>` node.
    pub fn decode_number(&self, text: &str, format: NumberFormat) -> WireResult<f64> {
        let trimmed = text.trim();
        if trimmed.starts_with('<') {
            let element = parse_constraint_xml(trimmed)?;
            let value = element
                .attribute("value")
                .map(str::to_owned)
                .or_else(|| element.text.clone())
                .ok_or_else(|| WireError::malformed_constraint("missing operand", element.to_xml()))?;
            return self.number(&value, format);
        }
        self.number(trimmed, format)
    }

    fn number(&self, text: &str, format: NumberFormat) -> WireResult<f64> {
        match format {
            NumberFormat::Bridge => parse_bridge(text),
            NumberFormat::Localized => self.locale.parse(text),
        }
    }

    pub fn decode_timestamp(&self, text: &str) -> WireResult<DateTime<Utc>> {
        parse_timestamp(text.trim()).map_err(|e| WireError::Records(RecordsError::from(e)))
    }

    pub fn decode_data_type(&self, identifier: &str) -> WireResult<DataType> {
        Ok(DataType::parse(identifier)?)
    }

    pub fn decode_statistics_option(&self, text: &str) -> WireResult<StatisticsOption> {
        Ok(StatisticsOption::parse(text)?)
    }

    fn expression(&self, node: &Element) -> WireResult<ConstraintExpression> {
        match node.tag.as_str() {
            "and" | "or" => {
                reject_attributes(node, &[])?;
                if node.children.is_empty() {
                    return Err(WireError::malformed_constraint(
                        format!("<{}> needs at least one operand", node.tag),
                        node.to_xml(),
                    ));
                }
                let children = node
                    .children
                    .iter()
                    .map(|child| self.expression(child))
                    .collect::<WireResult<Vec<_>>>()?;
                Ok(if node.tag == "and" {
                    ConstraintExpression::And(children)
                } else {
                    ConstraintExpression::Or(children)
                })
            }
            "not" => {
                reject_attributes(node, &[])?;
                match node.children.as_slice() {
                    [child] => Ok(ConstraintExpression::Not(Box::new(self.expression(child)?))),
                    _ => Err(WireError::malformed_constraint(
                        "<not> needs exactly one operand",
                        node.to_xml(),
                    )),
                }
            }
            tag => match Operator::parse(tag) {
                Some(operator) => self.comparison(node, operator),
                None => Err(WireError::malformed_constraint(
                    format!("unknown operator '{tag}'"),
                    node.to_xml(),
                )),
            },
        }
    }

    fn comparison(&self, node: &Element, operator: Operator) -> WireResult<ConstraintExpression> {
        let malformed = |reason: String| WireError::malformed_constraint(reason, node.to_xml());

        if !node.children.is_empty() || node.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            return Err(malformed(format!("<{}> cannot have children", node.tag)));
        }
        let allowed = if operator == Operator::Between {
            BETWEEN_ATTRIBUTES
        } else {
            COMPARISON_ATTRIBUTES
        };
        reject_attributes(node, allowed)?;

        let field = node
            .attribute("field")
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| malformed("missing field".into()))?;
        let literal_type = match node.attribute("type") {
            None => LiteralType::Text,
            Some(name) => LiteralType::parse(name)
                .ok_or_else(|| malformed(format!("unknown literal type '{name}'")))?,
        };
        let localized = match node.attribute("localized") {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => return Err(malformed(format!("invalid localized flag '{other}'"))),
        };

        let literal = |name: &str| -> WireResult<Literal> {
            let raw = node
                .attribute(name)
                .ok_or_else(|| malformed("missing operand".into()))?;
            self.literal(raw, literal_type, localized)
                .ok_or_else(|| malformed(format!("invalid {} literal '{raw}'", literal_type.as_str())))
        };
        let operand = if operator == Operator::Between {
            Operand::Range(literal("lower")?, literal("upper")?)
        } else {
            Operand::Single(literal("value")?)
        };

        Comparison::new(field, operator, operand)
            .map(ConstraintExpression::Comparison)
            .map_err(|err| match err {
                WireError::MalformedConstraint { reason, .. } => malformed(reason),
                other => other,
            })
    }

    fn literal(&self, raw: &str, literal_type: LiteralType, localized: bool) -> Option<Literal> {
        match literal_type {
            LiteralType::Text => Some(Literal::Text(raw.to_owned())),
            LiteralType::Date => parse_timestamp(raw).ok().map(Literal::Date),
            LiteralType::Number => {
                let format = if localized {
                    NumberFormat::Localized
                } else {
                    NumberFormat::Bridge
                };
                self.number(raw, format).ok().map(Literal::Number)
            }
        }
    }
}

fn parse_constraint_xml(xml: &str) -> WireResult<Element> {
    Element::parse(xml).map_err(|err| match err {
        WireError::Xml(reason) => WireError::malformed_constraint(reason, xml),
        other => other,
    })
}

fn unwrap_predicate(wrapper: Element) -> WireResult<Element> {
    reject_attributes(&wrapper, &[])?;
    let fragment = wrapper.to_xml();
    let mut children = wrapper.children.into_iter();
    match (children.next(), children.next()) {
        (Some(only), None) => Ok(only),
        _ => Err(WireError::malformed_constraint(
            "<predicate> must wrap exactly one expression",
            fragment,
        )),
    }
}

fn reject_attributes(node: &Element, allowed: &[&str]) -> WireResult<()> {
    match node.attributes().find(|(key, _)| !allowed.contains(key)) {
        Some((key, _)) => Err(WireError::malformed_constraint(
            format!("unexpected attribute '{key}' on <{}>", node.tag),
            node.to_xml(),
        )),
        None => Ok(()),
    }
}

fn count(raw: &str, node: &Element) -> WireResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        WireError::malformed_constraint(format!("invalid count '{raw}'"), node.to_xml())
    })
}

fn interval_from_attributes(node: &Element) -> WireResult<IntervalSpec> {
    if !node.children.is_empty() {
        return Err(WireError::malformed_constraint(
            "<interval> cannot have children",
            node.to_xml(),
        ));
    }
    let mut spec = IntervalSpec::new();
    for (name, value) in node.attributes() {
        let unit = CalendarUnit::parse(name).map_err(|_| {
            WireError::malformed_constraint(format!("unknown calendar unit '{name}'"), node.to_xml())
        })?;
        spec.set(unit, count(value, node)?);
    }
    Ok(spec)
}

/// Unit tags of the older `timespan` payload.
fn legacy_unit(tag: &str) -> Option<CalendarUnit> {
    match tag {
        "s" => Some(CalendarUnit::Second),
        "m" => Some(CalendarUnit::Minute),
        "H" => Some(CalendarUnit::Hour),
        "d" => Some(CalendarUnit::Day),
        "w" => Some(CalendarUnit::Week),
        "M" => Some(CalendarUnit::Month),
        "y" => Some(CalendarUnit::Year),
        _ => None,
    }
}

fn interval_from_timespan(node: &Element) -> WireResult<IntervalSpec> {
    let mut spec = IntervalSpec::new();
    for child in &node.children {
        let unit = legacy_unit(&child.tag).ok_or_else(|| {
            WireError::malformed_constraint(
                format!("unknown calendar unit '{}'", child.tag),
                child.to_xml(),
            )
        })?;
        if spec.get(unit).is_some() {
            return Err(WireError::malformed_constraint(
                format!("unit '{}' given twice", child.tag),
                node.to_xml(),
            ));
        }
        let raw = child.text.as_deref().unwrap_or_default();
        spec.set(unit, count(raw, child)?);
    }
    Ok(spec)
}

/// Wire node for an interval, the inverse of [`Decoder::decode_date_components`].
pub fn interval_element(spec: &IntervalSpec) -> Element {
    spec.components().fold(Element::new(tags::INTERVAL), |el, (unit, n)| {
        el.attr(unit.as_str(), n.to_string())
    })
}

pub fn encode_interval(spec: &IntervalSpec) -> String {
    interval_element(spec).to_xml()
}
