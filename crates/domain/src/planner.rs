//! Read planning: turn a list of attributes into as few register reads as possible.
//!
//! Attributes are sorted by start address and contiguous or overlapping
//! ranges are merged into one [`Span`], unless the merged span would exceed
//! [`MAX_READ_REGISTERS`]. Each attribute is then sliced back out of the span
//! that holds it, and the decoded values are returned in the caller's order.

use crate::catalogue::{AttributeDefinition, register_map};
use crate::device::DeviceKind;
use crate::error::{ConfigurationError, ConversionError, PasdError};
use crate::value::AttributeValue;

/// Largest quantity of a single read (function 0x03).
pub const MAX_READ_REGISTERS: u16 = 125;

/// Largest quantity of a single multi-register write (function 0x10).
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// A contiguous run of registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub address: u16,
    pub count: u16,
}

impl Span {
    #[must_use]
    pub const fn new(address: u16, count: u16) -> Self {
        Self { address, count }
    }

    #[must_use]
    pub const fn end(&self) -> u32 {
        self.address as u32 + self.count as u32
    }

    /// Whether `other` lies entirely inside this span.
    #[must_use]
    pub const fn contains(&self, other: &Span) -> bool {
        other.address >= self.address && other.end() <= self.end()
    }
}

impl From<&AttributeDefinition> for Span {
    fn from(definition: &AttributeDefinition) -> Self {
        Self::new(definition.address, definition.length())
    }
}

/// Merge spans into the fewest reads of at most [`MAX_READ_REGISTERS`] each.
#[must_use]
pub fn coalesce(spans: impl IntoIterator<Item = Span>) -> Vec<Span> {
    let mut sorted: Vec<Span> = spans.into_iter().collect();
    sorted.sort_by_key(|span| (span.address, span.count));

    let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
    for span in sorted {
        if let Some(last) = merged.last_mut() {
            let end = last.end().max(span.end());
            let count = end - u32::from(last.address);
            if u32::from(span.address) <= last.end() && count <= u32::from(MAX_READ_REGISTERS) {
                // Bounded by MAX_READ_REGISTERS above.
                last.count = u16::try_from(count).unwrap_or(MAX_READ_REGISTERS);
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

/// Planned reads for an ordered list of attributes of one device kind.
#[derive(Debug, Clone)]
pub struct ReadPlan<'a> {
    attributes: Vec<&'a AttributeDefinition>,
    spans: Vec<Span>,
}

impl ReadPlan<'static> {
    /// Resolve `names` against the shared catalogue and plan their reads.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::UnknownAttribute`] for the first unknown name and
    /// [`PasdError::Configuration`] when two attributes share a start address
    /// with different lengths.
    pub fn for_names<N: AsRef<str>>(kind: DeviceKind, names: &[N]) -> Result<Self, PasdError> {
        let attributes = register_map().resolve_many(kind, names)?;
        Ok(Self::new(attributes)?)
    }
}

impl<'a> ReadPlan<'a> {
    /// Plan reads for already resolved attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ConflictingLength`] when two attributes
    /// start at the same address but span different lengths.
    pub fn new(attributes: Vec<&'a AttributeDefinition>) -> Result<Self, ConfigurationError> {
        let mut by_address = attributes.clone();
        by_address.sort_by_key(|definition| definition.address);
        for pair in by_address.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.address == second.address && first.length() != second.length() {
                return Err(ConfigurationError::ConflictingLength {
                    address: first.address,
                    first: first.name,
                    second: second.name,
                });
            }
        }
        let spans = coalesce(attributes.iter().map(|definition| Span::from(*definition)));
        Ok(Self { attributes, spans })
    }

    /// Physical reads to issue, in address order.
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// The planned attributes, in the caller's order.
    #[must_use]
    pub fn attributes(&self) -> &[&'a AttributeDefinition] {
        &self.attributes
    }

    /// Slice `reads` (one word vector per span) back into decoded values.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::WordCount`] when a read returned the wrong
    /// number of words, or the first attribute decoding error.
    pub fn decode(&self, reads: &[Vec<u16>]) -> Result<Vec<AttributeValue>, ConversionError> {
        if reads.len() != self.spans.len() {
            return Err(ConversionError::ElementCount {
                expected: self.spans.len(),
                actual: reads.len(),
            });
        }
        for (span, words) in self.spans.iter().zip(reads) {
            if words.len() != usize::from(span.count) {
                return Err(ConversionError::WordCount {
                    expected: usize::from(span.count),
                    actual: words.len(),
                });
            }
        }

        self.attributes
            .iter()
            .map(|definition| {
                let wanted = Span::from(*definition);
                let (span, words) = self
                    .spans
                    .iter()
                    .zip(reads)
                    .find(|(span, _)| span.contains(&wanted))
                    .ok_or(ConversionError::WordCount {
                        expected: usize::from(wanted.count),
                        actual: 0,
                    })?;
                let offset = usize::from(wanted.address - span.address);
                definition.decode(&words[offset..offset + usize::from(wanted.count)])
            })
            .collect()
    }
}
