//! The attribute catalogue: every named register attribute of both device kinds.
//!
//! The map is built once on first use and only read afterwards. Lookups are
//! per [`DeviceKind`]; names are unique within a kind, and the same name (for
//! example `status`) may live at different addresses on the hub and on a
//! smartbox.

mod hub;
mod info;
mod smartbox;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::conversion::Conversion;
use crate::device::DeviceKind;
use crate::error::{
    AddressingError, ConversionError, NotWritableError, PasdError, UnknownAttributeError,
};
use crate::value::AttributeValue;

/// Whether the attribute accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Scalar attributes decode to one value, arrays to a `List` of `n` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Array(u16),
}

impl Shape {
    const fn elements(self) -> u16 {
        match self {
            Self::Scalar => 1,
            Self::Array(count) => count,
        }
    }
}

/// One named attribute bound to a register range.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinition {
    pub name: &'static str,
    pub kind: DeviceKind,
    pub address: u16,
    pub conversion: Conversion,
    pub shape: Shape,
    pub access: Access,
}

impl AttributeDefinition {
    const fn new(kind: DeviceKind, name: &'static str, address: u16, conversion: Conversion) -> Self {
        Self {
            name,
            kind,
            address,
            conversion,
            shape: Shape::Scalar,
            access: Access::ReadOnly,
        }
    }

    const fn array(mut self, count: u16) -> Self {
        self.shape = Shape::Array(count);
        self
    }

    const fn writable(mut self) -> Self {
        self.access = Access::ReadWrite;
        self
    }

    /// Number of registers consumed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn length(&self) -> u16 {
        // Widths are at most eight words.
        self.conversion.width() as u16 * self.shape.elements()
    }

    /// One past the last register, widened so it cannot overflow.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.address as u32 + self.length() as u32
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        matches!(self.access, Access::ReadWrite)
    }

    /// Bits of each covered word this attribute owns: a port field's own
    /// bits, every bit otherwise.
    #[must_use]
    pub const fn bit_mask(&self) -> u16 {
        match self.conversion {
            Conversion::Port(field) => field.mask(),
            _ => u16::MAX,
        }
    }

    /// Whether register `address` belongs to this attribute.
    #[must_use]
    pub const fn covers(&self, address: u16) -> bool {
        address >= self.address && (address as u32) < self.end()
    }

    /// Decode the attribute from exactly [`length`](Self::length) words.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when the word count is wrong or any
    /// element fails to decode.
    pub fn decode(&self, words: &[u16]) -> Result<AttributeValue, ConversionError> {
        if words.len() != usize::from(self.length()) {
            return Err(ConversionError::WordCount {
                expected: usize::from(self.length()),
                actual: words.len(),
            });
        }
        match self.shape {
            Shape::Scalar => self.conversion.decode(words),
            Shape::Array(_) => words
                .chunks(self.conversion.width())
                .map(|element| self.conversion.decode(element))
                .collect::<Result<Vec<_>, _>>()
                .map(AttributeValue::List),
        }
    }

    /// Encode a value into exactly [`length`](Self::length) words.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when an array value has the wrong number
    /// of elements or any element fails to encode.
    pub fn encode(&self, value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
        self.encode_with(value, Conversion::encode)
    }

    /// Like [`encode`](Self::encode), also accepting the display text of
    /// flag and LED attributes as read back from a backend.
    ///
    /// # Errors
    ///
    /// Same as [`encode`](Self::encode).
    pub fn reencode(&self, value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
        self.encode_with(value, Conversion::reencode)
    }

    fn encode_with(
        &self,
        value: &AttributeValue,
        encode: fn(&Conversion, &AttributeValue) -> Result<Vec<u16>, ConversionError>,
    ) -> Result<Vec<u16>, ConversionError> {
        match self.shape {
            Shape::Scalar => encode(&self.conversion, value),
            Shape::Array(count) => {
                let elements = value.as_list().ok_or(ConversionError::UnexpectedType {
                    expected: "list",
                })?;
                if elements.len() != usize::from(count) {
                    return Err(ConversionError::ElementCount {
                        expected: usize::from(count),
                        actual: elements.len(),
                    });
                }
                let mut words = Vec::with_capacity(usize::from(self.length()));
                for element in elements {
                    words.extend(encode(&self.conversion, element)?);
                }
                Ok(words)
            }
        }
    }
}

#[derive(Debug)]
struct KindMap {
    /// Sorted by address, then by name.
    definitions: Vec<AttributeDefinition>,
    by_name: HashMap<&'static str, usize>,
}

impl KindMap {
    fn new(mut definitions: Vec<AttributeDefinition>) -> Self {
        definitions.sort_by(|a, b| a.address.cmp(&b.address).then(a.name.cmp(b.name)));
        let by_name = definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| (definition.name, index))
            .collect();
        Self {
            definitions,
            by_name,
        }
    }
}

/// Lookup table of every attribute, per device kind.
#[derive(Debug)]
pub struct RegisterMap {
    hub: KindMap,
    smartbox: KindMap,
}

static REGISTER_MAP: LazyLock<RegisterMap> = LazyLock::new(|| RegisterMap {
    hub: KindMap::new(hub::definitions()),
    smartbox: KindMap::new(smartbox::definitions()),
});

/// The shared catalogue.
#[must_use]
pub fn register_map() -> &'static RegisterMap {
    &REGISTER_MAP
}

impl RegisterMap {
    fn kind(&self, kind: DeviceKind) -> &KindMap {
        match kind {
            DeviceKind::Hub => &self.hub,
            DeviceKind::Smartbox => &self.smartbox,
        }
    }

    /// Every attribute of `kind`, in address order.
    pub fn attributes(&self, kind: DeviceKind) -> impl Iterator<Item = &AttributeDefinition> {
        self.kind(kind).definitions.iter()
    }

    /// Look one attribute up by name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownAttributeError`] when `kind` has no such attribute.
    pub fn resolve(
        &self,
        kind: DeviceKind,
        name: &str,
    ) -> Result<&AttributeDefinition, UnknownAttributeError> {
        let map = self.kind(kind);
        map.by_name
            .get(name)
            .map(|index| &map.definitions[*index])
            .ok_or_else(|| UnknownAttributeError {
                kind,
                name: name.to_string(),
            })
    }

    /// Look several attributes up, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownAttributeError`] for the first unknown name.
    pub fn resolve_many<N: AsRef<str>>(
        &self,
        kind: DeviceKind,
        names: &[N],
    ) -> Result<Vec<&AttributeDefinition>, UnknownAttributeError> {
        names
            .iter()
            .map(|name| self.resolve(kind, name.as_ref()))
            .collect()
    }

    /// Look an attribute up for writing.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::UnknownAttribute`] for an unknown name and
    /// [`PasdError::NotWritable`] for a read-only attribute.
    pub fn resolve_writable(
        &self,
        kind: DeviceKind,
        name: &str,
    ) -> Result<&AttributeDefinition, PasdError> {
        let definition = self.resolve(kind, name)?;
        if definition.is_writable() {
            Ok(definition)
        } else {
            Err(NotWritableError {
                name: definition.name.to_string(),
            }
            .into())
        }
    }

    /// Every attribute overlapping `count` registers from `address`, in address order.
    ///
    /// # Errors
    ///
    /// Returns [`AddressingError::SpanOverflow`] when the span runs past the
    /// address space, [`AddressingError::InvalidQuantity`] for an empty span,
    /// and [`AddressingError::UnmappedRegister`] for the first register no
    /// attribute covers.
    pub fn attributes_in_span(
        &self,
        kind: DeviceKind,
        address: u16,
        count: u16,
    ) -> Result<Vec<&AttributeDefinition>, AddressingError> {
        if count == 0 {
            return Err(AddressingError::InvalidQuantity {
                count,
                max: u16::MAX,
            });
        }
        let end = u32::from(address) + u32::from(count);
        if end > u32::from(u16::MAX) + 1 {
            return Err(AddressingError::SpanOverflow { address, count });
        }

        let overlapping: Vec<&AttributeDefinition> = self
            .attributes(kind)
            .filter(|definition| u32::from(definition.address) < end && definition.end() > u32::from(address))
            .collect();

        let mut cursor = u32::from(address);
        for definition in &overlapping {
            if u32::from(definition.address) > cursor {
                break;
            }
            cursor = cursor.max(definition.end());
        }
        if cursor < end {
            return Err(AddressingError::UnmappedRegister {
                kind,
                address: u16::try_from(cursor).unwrap_or(u16::MAX),
            });
        }
        Ok(overlapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [DeviceKind; 2] = [DeviceKind::Hub, DeviceKind::Smartbox];

    #[test]
    fn should_resolve_known_attribute() {
        let definition = register_map()
            .resolve(DeviceKind::Hub, "psu48v_voltages")
            .unwrap();
        assert_eq!(definition.address, 16);
        assert_eq!(definition.length(), 2);
    }

    #[test]
    fn should_resolve_same_name_per_kind() {
        let hub = register_map().resolve(DeviceKind::Hub, "status").unwrap();
        let smartbox = register_map().resolve(DeviceKind::Smartbox, "status").unwrap();
        assert_eq!(hub.address, 24);
        assert_eq!(smartbox.address, 21);
    }

    #[test]
    fn should_fail_when_attribute_unknown() {
        let err = register_map()
            .resolve(DeviceKind::Smartbox, "psu48v_current")
            .unwrap_err();
        assert_eq!(err.name, "psu48v_current");
        assert_eq!(err.kind, DeviceKind::Smartbox);
    }

    #[test]
    fn should_name_first_unknown_when_resolving_many() {
        let err = register_map()
            .resolve_many(DeviceKind::Hub, &["uptime", "bogus", "also_bogus"])
            .unwrap_err();
        assert_eq!(err.name, "bogus");
    }

    #[test]
    fn should_reject_read_only_attribute_for_writing() {
        let err = register_map()
            .resolve_writable(DeviceKind::Hub, "uptime")
            .unwrap_err();
        assert!(matches!(err, PasdError::NotWritable(_)));
        assert!(
            register_map()
                .resolve_writable(DeviceKind::Hub, "ports_desired_power_when_online")
                .is_ok()
        );
    }

    #[test]
    fn should_only_overlap_between_port_projections_with_identical_ranges() {
        for kind in KINDS {
            let definitions: Vec<_> = register_map().attributes(kind).collect();
            for (index, a) in definitions.iter().enumerate() {
                for b in &definitions[index + 1..] {
                    let overlap = u32::from(a.address) < b.end() && u32::from(b.address) < a.end();
                    if !overlap {
                        continue;
                    }
                    assert_eq!(
                        (a.address, a.length()),
                        (b.address, b.length()),
                        "{kind}: {} and {} overlap with different ranges",
                        a.name,
                        b.name
                    );
                    assert!(a.conversion.is_projection() && b.conversion.is_projection());
                }
            }
        }
    }

    #[test]
    fn should_list_attributes_in_address_order() {
        for kind in KINDS {
            let addresses: Vec<u16> = register_map().attributes(kind).map(|d| d.address).collect();
            let mut sorted = addresses.clone();
            sorted.sort_unstable();
            assert_eq!(addresses, sorted);
        }
    }

    #[test]
    fn should_map_port_arrays_to_one_word_per_port() {
        let hub = register_map().resolve(DeviceKind::Hub, "port_forcings").unwrap();
        assert_eq!((hub.address, hub.length()), (36, 28));
        let smartbox = register_map()
            .resolve(DeviceKind::Smartbox, "port_breakers_tripped")
            .unwrap();
        assert_eq!((smartbox.address, smartbox.length()), (35, 12));
    }

    #[test]
    fn should_find_every_attribute_in_span() {
        let names: Vec<_> = register_map()
            .attributes_in_span(DeviceKind::Hub, 12, 4)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["firmware_version", "uptime", "sys_address"]);
    }

    #[test]
    fn should_include_partially_covered_attributes_in_span() {
        let names: Vec<_> = register_map()
            .attributes_in_span(DeviceKind::Hub, 5, 1)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["chip_id"]);
    }

    #[test]
    fn should_fail_when_span_has_unmapped_register() {
        let err = register_map()
            .attributes_in_span(DeviceKind::Hub, 28, 4)
            .unwrap_err();
        assert_eq!(
            err,
            AddressingError::UnmappedRegister {
                kind: DeviceKind::Hub,
                address: 30
            }
        );
    }

    #[test]
    fn should_fail_when_span_is_entirely_unmapped() {
        assert!(matches!(
            register_map().attributes_in_span(DeviceKind::Smartbox, 5000, 2),
            Err(AddressingError::UnmappedRegister { address: 5000, .. })
        ));
    }

    #[test]
    fn should_fail_when_span_overflows_address_space() {
        assert!(matches!(
            register_map().attributes_in_span(DeviceKind::Hub, u16::MAX, 2),
            Err(AddressingError::SpanOverflow { .. })
        ));
    }

    #[test]
    fn should_decode_array_element_wise() {
        let definition = register_map()
            .resolve(DeviceKind::Hub, "psu48v_voltages")
            .unwrap();
        assert_eq!(
            definition.decode(&[4800, 4790]).unwrap(),
            AttributeValue::from(vec![48.0, 47.9])
        );
    }

    #[test]
    fn should_reject_array_with_wrong_element_count() {
        let definition = register_map()
            .resolve(DeviceKind::Smartbox, "fem_case_temperatures")
            .unwrap();
        let err = definition
            .encode(&AttributeValue::from(vec![20.0]))
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::ElementCount {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn should_roundtrip_every_reversible_attribute_from_zero_words() {
        for kind in KINDS {
            for definition in register_map().attributes(kind) {
                if !definition.conversion.is_reversible() {
                    continue;
                }
                let words = vec![0; usize::from(definition.length())];
                let value = definition.decode(&words).unwrap();
                assert_eq!(definition.encode(&value).unwrap(), words, "{}", definition.name);
            }
        }
    }
}
