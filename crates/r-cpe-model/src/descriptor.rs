//! ---
//! cpe_section: "02-object-model"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Provisioner type-descriptor grammar and parser."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parse failure for a provisioner type descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The descriptor does not contain the expected `<Type<Kind<...>>>`
    /// nesting.
    #[error("descriptor {0:?} is missing a '<'-delimited segment")]
    MissingSegment(String),
    /// The innermost segment is not terminated by `>>>`.
    #[error("descriptor {0:?} does not close its specific segment with '>>>'")]
    UnterminatedSpecific(String),
    /// The specific segment does not split into vendor:product:variant:version.
    #[error("specific segment {0:?} must be vendor:product:variant:version")]
    MalformedSpecific(String),
}

/// Vendor-qualified identity of a provisionable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificDescriptor {
    pub vendor: String,
    pub product: String,
    pub variant: String,
    pub version: String,
}

/// Parsed form of a descriptor such as `<Database<SQL<acme:pg:ha:14>>>`.
///
/// The extracted fields are used once to stamp discovery labels onto the
/// owning provisioner; afterwards the labels are treated as stable metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub kind: String,
    pub specific: SpecificDescriptor,
}

impl TypeDescriptor {
    /// Discovery labels derived from the descriptor fields.
    pub fn discovery_labels(&self) -> IndexMap<String, String> {
        let mut labels = IndexMap::new();
        labels.insert("type".to_owned(), self.type_name.clone());
        labels.insert("kind".to_owned(), self.kind.clone());
        labels.insert("vendor".to_owned(), self.specific.vendor.clone());
        labels.insert("product".to_owned(), self.specific.product.clone());
        labels.insert("variant".to_owned(), self.specific.variant.clone());
        labels.insert("version".to_owned(), self.specific.version.clone());
        labels
    }
}

impl FromStr for TypeDescriptor {
    type Err = DescriptorError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = src.split('<').collect();
        // A well-formed descriptor opens with three '<' in a row, so the
        // split yields an empty leading element plus three segments.
        if parts.len() != 4 || !parts[0].is_empty() {
            return Err(DescriptorError::MissingSegment(src.to_owned()));
        }
        let type_name = parts[1];
        let kind = parts[2];
        if type_name.is_empty() || kind.is_empty() {
            return Err(DescriptorError::MissingSegment(src.to_owned()));
        }
        let specific = parts[3]
            .strip_suffix(">>>")
            .ok_or_else(|| DescriptorError::UnterminatedSpecific(src.to_owned()))?;
        Ok(Self {
            type_name: type_name.to_owned(),
            kind: kind.to_owned(),
            specific: specific.parse()?,
        })
    }
}

impl FromStr for SpecificDescriptor {
    type Err = DescriptorError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = src.split(':').collect();
        let [vendor, product, variant, version] = fields.as_slice() else {
            return Err(DescriptorError::MalformedSpecific(src.to_owned()));
        };
        if vendor.is_empty() || product.is_empty() || variant.is_empty() || version.is_empty() {
            return Err(DescriptorError::MalformedSpecific(src.to_owned()));
        }
        Ok(Self {
            vendor: (*vendor).to_owned(),
            product: (*product).to_owned(),
            variant: (*variant).to_owned(),
            version: (*version).to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_descriptor() {
        let descriptor: TypeDescriptor = "<Database<SQL<acme:pg:ha:14>>>".parse().unwrap();
        assert_eq!(descriptor.type_name, "Database");
        assert_eq!(descriptor.kind, "SQL");
        assert_eq!(descriptor.specific.vendor, "acme");
        assert_eq!(descriptor.specific.product, "pg");
        assert_eq!(descriptor.specific.variant, "ha");
        assert_eq!(descriptor.specific.version, "14");
    }

    #[test]
    fn missing_bracket_segment_is_an_error() {
        let err = "<Database<SQL>>".parse::<TypeDescriptor>().unwrap_err();
        assert!(matches!(err, DescriptorError::MissingSegment(_)));

        let err = "Database".parse::<TypeDescriptor>().unwrap_err();
        assert!(matches!(err, DescriptorError::MissingSegment(_)));
    }

    #[test]
    fn unterminated_specific_is_an_error() {
        let err = "<Database<SQL<acme:pg:ha:14"
            .parse::<TypeDescriptor>()
            .unwrap_err();
        assert!(matches!(err, DescriptorError::UnterminatedSpecific(_)));
    }

    #[test]
    fn short_specific_is_an_error() {
        let err = "<Database<SQL<acme:pg:14>>>"
            .parse::<TypeDescriptor>()
            .unwrap_err();
        assert!(matches!(err, DescriptorError::MalformedSpecific(_)));
    }

    #[test]
    fn discovery_labels_cover_all_fields() {
        let descriptor: TypeDescriptor = "<Database<SQL<acme:pg:ha:14>>>".parse().unwrap();
        let labels = descriptor.discovery_labels();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels.get("type").map(String::as_str), Some("Database"));
        assert_eq!(labels.get("version").map(String::as_str), Some("14"));
    }
}
