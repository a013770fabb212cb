//! Association of extracted property text with components.
//!
//! Raw keys are normalized to a [`PropertyName`], values are parsed as
//! measured quantities and converted to canonical units. Layout-wide general
//! properties fill gaps, per-kind defaults fill what is still missing, and
//! required properties are enforced last.

use std::collections::BTreeMap;

use log::{debug, info, trace, warn};

use floorplan_core::{
    identifier::Id,
    semantic::{Component, ComponentKind, PropertyName},
    units::Unit,
};
use floorplan_parser::{ExtractedProperties, PropertyText, parse_quantity};

use crate::{
    config::PropertiesConfig,
    error::{FloorplanError, OrientationError, PropertyValidationError},
    model::LayoutModel,
};

/// Which properties a component kind needs, defaults and accepts.
struct KindRules {
    required: &'static [PropertyName],
    defaults: &'static [(PropertyName, f64)],
    optional: &'static [PropertyName],
}

impl KindRules {
    fn of(kind: ComponentKind) -> Self {
        use PropertyName::*;

        match kind {
            ComponentKind::Source => Self {
                required: &[],
                defaults: &[(Interval, 60.0)],
                optional: &[],
            },
            ComponentKind::Conveyor => Self {
                required: &[Length, Speed],
                defaults: &[(Width, 0.5)],
                optional: &[],
            },
            ComponentKind::Machine => Self {
                required: &[ProcessingTime],
                defaults: &[(Capacity, 1.0)],
                optional: &[Mttr, Mtbf],
            },
            ComponentKind::Diverter => Self {
                required: &[],
                defaults: &[(Speed, 0.2)],
                optional: &[Length, Width],
            },
            ComponentKind::Sink => Self {
                required: &[],
                defaults: &[],
                optional: &[],
            },
        }
    }

    fn accepts(&self, name: PropertyName) -> bool {
        self.required.contains(&name)
            || self.optional.contains(&name)
            || self.defaults.iter().any(|(default, _)| *default == name)
    }
}

/// Merges extracted properties onto the components of a resolved model.
#[derive(Debug, Clone, Default)]
pub struct PropertyAssociator {
    config: PropertiesConfig,
}

impl PropertyAssociator {
    pub fn new(config: &PropertiesConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Returns a copy of `model` whose components carry validated properties.
    ///
    /// # Errors
    ///
    /// - [`OrientationError::MissingAssignment`] when a component has no
    ///   orientation.
    /// - [`PropertyValidationError::Missing`] when a required property is
    ///   absent after general properties and defaults are applied.
    /// - [`PropertyValidationError::Malformed`] when a value cannot be read,
    ///   has the wrong dimension, is negative or falls outside its configured
    ///   range.
    pub fn associate(
        &self,
        model: &LayoutModel,
        extracted: &ExtractedProperties,
    ) -> Result<LayoutModel, FloorplanError> {
        info!(
            components = model.component_count(),
            general = extracted.general().len();
            "Associating properties"
        );

        let mut ids: Vec<Id> = model.components().map(Component::id).collect();
        ids.sort();
        if let Some(id) = ids.into_iter().find(|id| model.orientation(*id).is_none()) {
            return Err(OrientationError::MissingAssignment(id).into());
        }

        for id in extracted.components().keys() {
            if !model.contains(Id::new(id)) {
                warn!(component = id.as_str(); "Properties for unknown component ignored");
            }
        }
        let general = Self::normalize_keys(extracted.general(), "general");

        let components = model
            .components()
            .map(|component| {
                let own = extracted
                    .component(&component.id().to_string())
                    .map(|text| Self::normalize_keys(text, "component"))
                    .unwrap_or_default();
                let properties = self.resolve(component, &own, &general)?;
                Ok(component.clone().with_properties(properties))
            })
            .collect::<Result<Vec<_>, PropertyValidationError>>()?;

        info!(components = components.len(); "Properties associated");
        Ok(model.clone().with_components(components))
    }

    /// Normalizes raw keys; the first key mapping to a name wins.
    fn normalize_keys<'a>(text: &'a PropertyText, scope: &str) -> BTreeMap<PropertyName, &'a str> {
        let mut normalized = BTreeMap::new();
        for (key, value) in text {
            match PropertyName::normalize(key) {
                Some(name) if normalized.contains_key(&name) => {
                    warn!(
                        key = key.as_str(),
                        property:% = name,
                        scope;
                        "Duplicate property key ignored"
                    );
                }
                Some(name) => {
                    normalized.insert(name, value.as_str());
                }
                None => {
                    warn!(key = key.as_str(), scope; "Unknown property key ignored");
                }
            }
        }
        normalized
    }

    fn resolve(
        &self,
        component: &Component,
        own: &BTreeMap<PropertyName, &str>,
        general: &BTreeMap<PropertyName, &str>,
    ) -> Result<BTreeMap<PropertyName, f64>, PropertyValidationError> {
        let id = component.id();
        let rules = KindRules::of(component.kind());
        let mut properties = BTreeMap::new();

        for (&name, &text) in own {
            if !rules.accepts(name) {
                warn!(
                    component:% = id,
                    kind:% = component.kind(),
                    property:% = name;
                    "Property not accepted by kind ignored"
                );
                continue;
            }
            properties.insert(name, self.measure(id, name, text)?);
        }

        for (&name, &text) in general {
            if rules.accepts(name) && !properties.contains_key(&name) {
                trace!(component:% = id, property:% = name; "Applying general property");
                properties.insert(name, self.measure(id, name, text)?);
            }
        }

        for &(name, value) in rules.defaults {
            properties.entry(name).or_insert_with(|| {
                trace!(component:% = id, property:% = name, value; "Applying default");
                value
            });
        }

        if let Some(&missing) = rules
            .required
            .iter()
            .find(|name| !properties.contains_key(name))
        {
            return Err(PropertyValidationError::Missing {
                id,
                property: missing,
            });
        }

        debug!(component:% = id, properties = properties.len(); "Properties resolved");
        Ok(properties)
    }

    /// Parses `text` and converts it to the canonical unit of `name`.
    fn measure(
        &self,
        id: Id,
        name: PropertyName,
        text: &str,
    ) -> Result<f64, PropertyValidationError> {
        let malformed = |reason: String| PropertyValidationError::Malformed {
            id,
            property: name,
            reason,
        };

        let quantity = parse_quantity(text).map_err(|err| malformed(format!("`{text}`: {err}")))?;

        let expected = name.dimension();
        if quantity.unit() != Unit::Unitless && quantity.dimension() != expected {
            return Err(malformed(format!(
                "expected a {expected} value, found `{}` ({})",
                quantity.unit(),
                quantity.dimension()
            )));
        }

        let value = quantity.to_canonical();
        if value < 0.0 {
            return Err(malformed(format!("`{text}` must not be negative")));
        }
        if let Some(range) = self.config.range(name).filter(|r| !r.contains(value)) {
            return Err(malformed(format!(
                "{value} is outside the accepted range [{}, {}]",
                range.min().map_or("-inf".to_string(), |min| min.to_string()),
                range.max().map_or("inf".to_string(), |max| max.to_string()),
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use floorplan_core::{
        geometry::{Point, Size},
        semantic::Orientation,
    };

    use super::*;
    use crate::{
        config::ValueRange,
        model::{Connection, Section},
    };

    fn resolved_model(ids: &[&str]) -> LayoutModel {
        let components: Vec<Component> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let kind = id
                    .chars()
                    .next()
                    .and_then(ComponentKind::from_prefix)
                    .expect("test ids use known prefixes");
                Component::new(
                    Id::new(id),
                    kind,
                    Point::new(i as f64 * 10.0, 0.0),
                    Size::new(4.0, 2.0),
                )
            })
            .collect();
        let orientations = components
            .iter()
            .map(|c| (c.id(), Orientation::Deg0))
            .collect();
        let members = components.iter().map(Component::id).collect();
        let section = Section::new(0, Id::new(ids[0]), 0, members);
        LayoutModel::new(components, Vec::<Connection>::new(), vec![section])
            .with_orientations(orientations)
    }

    fn property(model: &LayoutModel, id: &str, name: PropertyName) -> Option<f64> {
        model.component(Id::new(id)).and_then(|c| c.property(name))
    }

    fn assert_property(model: &LayoutModel, id: &str, name: PropertyName, expected: f64) {
        let value = property(model, id, name).unwrap_or_else(|| panic!("{id} has no {name}"));
        assert!(approx_eq!(f64, value, expected), "{id} {name}: {value} != {expected}");
    }

    #[test]
    fn test_component_properties_are_normalized() {
        let model = resolved_model(&["L1", "C1", "M1", "U1"]);
        let extracted = ExtractedProperties::new()
            .with_component("C1", "length", "2.5m")
            .with_component("C1", "Conveyor speed", "30 m/min")
            .with_component("M1", "Proc time", "8 sec")
            .with_component("M1", "MTTR", "1440 sec")
            .with_component("M1", "MTBF", "12 h");

        let associated = PropertyAssociator::default().associate(&model, &extracted).unwrap();

        assert_property(&associated, "C1", PropertyName::Length, 2.5);
        assert_property(&associated, "C1", PropertyName::Speed, 0.5);
        assert_property(&associated, "C1", PropertyName::Width, 0.5);
        assert_property(&associated, "M1", PropertyName::ProcessingTime, 8.0);
        assert_property(&associated, "M1", PropertyName::Mtbf, 43200.0);
        assert_property(&associated, "M1", PropertyName::Capacity, 1.0);
        assert_property(&associated, "L1", PropertyName::Interval, 60.0);
        assert!(
            associated
                .component(Id::new("U1"))
                .unwrap()
                .properties()
                .is_empty()
        );
    }

    #[test]
    fn test_general_properties_fill_gaps() {
        let model = resolved_model(&["C1", "C2", "D1"]);
        let extracted = ExtractedProperties::new()
            .with_general("Conveyor speed", "1.0 m/s")
            .with_component("C1", "length", "2 m")
            .with_component("C2", "length", "3 m")
            .with_component("C2", "speed", "0.4 m/s");

        let associated = PropertyAssociator::default().associate(&model, &extracted).unwrap();

        assert_property(&associated, "C1", PropertyName::Speed, 1.0);
        assert_property(&associated, "C2", PropertyName::Speed, 0.4);
        assert_property(&associated, "D1", PropertyName::Speed, 1.0);
    }

    #[test]
    fn test_machine_without_processing_time() {
        let model = resolved_model(&["L1", "M1", "U1"]);
        let extracted = ExtractedProperties::new().with_component("M1", "MTTR", "10 min");

        let err = PropertyAssociator::default()
            .associate(&model, &extracted)
            .unwrap_err();

        match err {
            FloorplanError::Property(PropertyValidationError::Missing { id, property }) => {
                assert_eq!(id, Id::new("M1"));
                assert_eq!(property, PropertyName::ProcessingTime);
            }
            other => panic!("expected a missing property error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_values() {
        let model = resolved_model(&["M1"]);
        let cases = [
            ("Proc time", "fast"),
            ("Proc time", "8 m"),
            ("Proc time", "-3 s"),
            ("Proc time", "8 parsecs"),
        ];

        for (key, value) in cases {
            let extracted = ExtractedProperties::new().with_component("M1", key, value);
            let err = PropertyAssociator::default()
                .associate(&model, &extracted)
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    FloorplanError::Property(PropertyValidationError::Malformed {
                        property: PropertyName::ProcessingTime,
                        ..
                    })
                ),
                "`{value}` should be malformed, got {err:?}"
            );
        }
    }

    #[test]
    fn test_values_outside_configured_range_are_malformed() {
        let model = resolved_model(&["C1"]);
        let config = PropertiesConfig::default()
            .with_range(PropertyName::Speed, ValueRange::new(Some(0.1), Some(2.0)));
        let associator = PropertyAssociator::new(&config);

        let extracted = ExtractedProperties::new()
            .with_component("C1", "length", "4 m")
            .with_component("C1", "speed", "3 m/s");
        let err = associator.associate(&model, &extracted).unwrap_err();
        assert!(matches!(
            err,
            FloorplanError::Property(PropertyValidationError::Malformed {
                property: PropertyName::Speed,
                ..
            })
        ));

        // Bounds apply after conversion to the canonical unit.
        let extracted = ExtractedProperties::new()
            .with_component("C1", "length", "4 m")
            .with_component("C1", "speed", "90 m/min");
        let associated = associator.associate(&model, &extracted).unwrap();
        assert_property(&associated, "C1", PropertyName::Speed, 1.5);
    }

    #[test]
    fn test_unitless_values_use_canonical_unit() {
        let model = resolved_model(&["M1"]);
        let extracted = ExtractedProperties::new()
            .with_component("M1", "processing_time", "12")
            .with_component("M1", "capacity", "4");

        let associated = PropertyAssociator::default().associate(&model, &extracted).unwrap();

        assert_property(&associated, "M1", PropertyName::ProcessingTime, 12.0);
        assert_property(&associated, "M1", PropertyName::Capacity, 4.0);
    }

    #[test]
    fn test_unknown_and_unaccepted_keys_are_ignored() {
        let model = resolved_model(&["U1"]);
        let extracted = ExtractedProperties::new()
            .with_component("U1", "colour", "blue")
            .with_component("U1", "speed", "1 m/s")
            .with_component("X9", "length", "1 m");

        let associated = PropertyAssociator::default().associate(&model, &extracted).unwrap();

        assert!(
            associated
                .component(Id::new("U1"))
                .unwrap()
                .properties()
                .is_empty()
        );
    }

    #[test]
    fn test_missing_orientation() {
        let model = resolved_model(&["L1", "U1"]);
        let mut orientations = model.orientations().clone();
        orientations.remove(&Id::new("U1"));
        let model = model.with_orientations(orientations);

        let err = PropertyAssociator::default()
            .associate(&model, &ExtractedProperties::new())
            .unwrap_err();

        assert!(matches!(
            err,
            FloorplanError::Orientation(OrientationError::MissingAssignment(id)) if id == Id::new("U1")
        ));
    }
}
